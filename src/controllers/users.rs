use crate::controllers::functions;
use crate::insertables::NewUser;
use actix_web::{get, post, put, web, HttpResponse};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use ecommerce_api::auth::{self, AuthUser};
use ecommerce_api::config::AppConfig;
use ecommerce_api::errors::ApiError;
use ecommerce_api::models::{User, UserRole};
use ecommerce_api::schema::users;
use serde::Deserialize;
use serde_json::json;

type DbPool = Pool<ConnectionManager<PgConnection>>;

#[derive(Deserialize)]
pub struct RegisterDto {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginDto {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct UpdateProfileDto {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: Option<String>,
}

#[derive(AsChangeset)]
#[diesel(table_name = users)]
struct ProfileChanges {
    first_name: Option<String>,
    last_name: Option<String>,
    password_hash: Option<String>,
}

fn requested_role(role: Option<&str>) -> Result<UserRole, ApiError> {
    match role {
        None => Ok(UserRole::Customer),
        // Admin accounts are provisioned out of band, never self-registered.
        Some("admin") => Err(ApiError::Validation(
            "Admin accounts cannot be self-registered".to_string(),
        )),
        Some(other) => UserRole::parse(other)
            .ok_or_else(|| ApiError::Validation(format!("Unknown role: {other}"))),
    }
}

pub fn register_user(
    conn: &mut PgConnection,
    dto: RegisterDto,
    config: &AppConfig,
) -> Result<(User, String), ApiError> {
    let email = functions::normalize_email(&dto.email);
    if !email.contains('@') {
        return Err(ApiError::Validation("Invalid email address".to_string()));
    }
    if dto.password.len() < 8 {
        return Err(ApiError::Validation(
            "Password must be at least 8 characters".to_string(),
        ));
    }
    let role = requested_role(dto.role.as_deref())?;

    let existing = users::table
        .filter(users::email.eq(&email))
        .select(User::as_select())
        .first::<User>(conn)
        .optional()?;
    if existing.is_some() {
        return Err(ApiError::Conflict("User already exists".to_string()));
    }

    let new_user = NewUser {
        email,
        password_hash: auth::hash_password(&dto.password)?,
        role: role.as_str().to_string(),
        first_name: dto.first_name,
        last_name: dto.last_name,
    };
    let user: User = diesel::insert_into(users::table)
        .values(&new_user)
        .get_result(conn)?;
    let token = auth::issue_token(user.id, role, config)?;
    Ok((user, token))
}

pub fn login_user(
    conn: &mut PgConnection,
    dto: LoginDto,
    config: &AppConfig,
) -> Result<(User, String), ApiError> {
    let email = functions::normalize_email(&dto.email);
    let user = users::table
        .filter(users::email.eq(&email))
        .select(User::as_select())
        .first::<User>(conn)
        .optional()?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    if !auth::verify_password(&dto.password, &user.password_hash)? {
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    }
    let role = user
        .role()
        .ok_or_else(|| ApiError::internal("user row carries an unknown role"))?;
    let token = auth::issue_token(user.id, role, config)?;
    Ok((user, token))
}

pub fn get_user_by_id(conn: &mut PgConnection, user_id: i32) -> Result<User, ApiError> {
    users::table
        .find(user_id)
        .select(User::as_select())
        .first::<User>(conn)
        .optional()?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

pub fn update_profile(
    conn: &mut PgConnection,
    user_id: i32,
    dto: UpdateProfileDto,
) -> Result<User, ApiError> {
    if dto.first_name.is_none() && dto.last_name.is_none() && dto.password.is_none() {
        return Err(ApiError::Validation("No profile fields to update".to_string()));
    }
    let password_hash = match dto.password.as_deref() {
        Some(raw) if raw.len() < 8 => {
            return Err(ApiError::Validation(
                "Password must be at least 8 characters".to_string(),
            ))
        }
        Some(raw) => Some(auth::hash_password(raw)?),
        None => None,
    };
    let changes = ProfileChanges {
        first_name: dto.first_name,
        last_name: dto.last_name,
        password_hash,
    };
    Ok(diesel::update(users::table.find(user_id))
        .set(&changes)
        .get_result(conn)?)
}

#[post("/api/users/register")]
async fn register(
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    form: web::Json<RegisterDto>,
) -> Result<HttpResponse, ApiError> {
    let config = config.get_ref().clone();
    let (user, token) = web::block(move || {
        let mut conn = pool.get()?;
        register_user(&mut conn, form.into_inner(), &config)
    })
    .await??;
    Ok(HttpResponse::Created().json(json!({
        "message": "User registered successfully",
        "user": user,
        "token": token,
    })))
}

#[post("/api/users/login")]
async fn login(
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    form: web::Json<LoginDto>,
) -> Result<HttpResponse, ApiError> {
    let config = config.get_ref().clone();
    let (_user, token) = web::block(move || {
        let mut conn = pool.get()?;
        login_user(&mut conn, form.into_inner(), &config)
    })
    .await??;
    Ok(HttpResponse::Ok().json(json!({
        "token": token,
        "message": "Login successful",
    })))
}

#[get("/api/users/profile")]
async fn get_profile(pool: web::Data<DbPool>, principal: AuthUser) -> Result<HttpResponse, ApiError> {
    let user = web::block(move || {
        let mut conn = pool.get()?;
        get_user_by_id(&mut conn, principal.id)
    })
    .await??;
    Ok(HttpResponse::Ok().json(user))
}

#[put("/api/users/profile")]
async fn put_profile(
    pool: web::Data<DbPool>,
    principal: AuthUser,
    form: web::Json<UpdateProfileDto>,
) -> Result<HttpResponse, ApiError> {
    let user = web::block(move || {
        let mut conn = pool.get()?;
        update_profile(&mut conn, principal.id, form.into_inner())
    })
    .await??;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Profile updated successfully",
        "user": user,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_signup_defaults_to_customer() {
        assert_eq!(requested_role(None).unwrap(), UserRole::Customer);
        assert_eq!(requested_role(Some("vendor")).unwrap(), UserRole::Vendor);
    }

    #[test]
    fn self_signup_cannot_claim_admin() {
        assert!(requested_role(Some("admin")).is_err());
        assert!(requested_role(Some("root")).is_err());
    }
}
