use crate::config::AppConfig;
use crate::errors::ApiError;
use crate::models::{User, UserRole};
use crate::schema::users;
use actix_web::http::header;
use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use chrono::{Duration, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use futures::future::LocalBoxFuture;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

type DbPool = Pool<ConnectionManager<PgConnection>>;

/// Token payload: subject user id, role at issuance, unix expiry.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i32,
    pub role: String,
    pub exp: i64,
}

pub fn issue_token(user_id: i32, role: UserRole, config: &AppConfig) -> Result<String, ApiError> {
    let claims = Claims {
        sub: user_id,
        role: role.as_str().to_string(),
        exp: (Utc::now() + Duration::hours(config.token_ttl_hours)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(ApiError::internal)
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::Unauthorized("Token is not valid".to_string()))
}

pub fn hash_password(raw: &str) -> Result<String, ApiError> {
    Ok(bcrypt::hash(raw, bcrypt::DEFAULT_COST)?)
}

pub fn verify_password(raw: &str, hash: &str) -> Result<bool, ApiError> {
    Ok(bcrypt::verify(raw, hash)?)
}

/// Strips the `Bearer ` scheme off an `Authorization` header value.
pub fn parse_bearer(header_value: Option<&str>) -> Option<&str> {
    header_value?.strip_prefix("Bearer ").map(str::trim)
}

/// Authenticated principal, attached to a request once the bearer token checks
/// out and the referenced user still exists. The role comes from the user row,
/// not the token, so a stale token cannot keep a revoked role alive.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: i32,
    pub role: UserRole,
}

pub fn authorize(principal: &AuthUser, allowed: &[UserRole]) -> Result<(), ApiError> {
    if allowed.contains(&principal.role) {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Access denied".to_string()))
    }
}

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move {
            let config = req
                .app_data::<web::Data<AppConfig>>()
                .ok_or_else(|| ApiError::internal("AppConfig not registered"))?
                .clone();
            let pool = req
                .app_data::<web::Data<DbPool>>()
                .ok_or_else(|| ApiError::internal("DbPool not registered"))?
                .clone();
            let header_value = req
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok());
            let token = parse_bearer(header_value).ok_or_else(|| {
                ApiError::Unauthorized("No token, authorization denied".to_string())
            })?;
            let claims = decode_token(token, &config.jwt_secret)?;

            let user = web::block(move || -> Result<Option<User>, ApiError> {
                let mut conn = pool.get()?;
                Ok(users::table
                    .find(claims.sub)
                    .select(User::as_select())
                    .first::<User>(&mut conn)
                    .optional()?)
            })
            .await??
            .ok_or_else(|| ApiError::Unauthorized("User not found".to_string()))?;

            let role = user
                .role()
                .ok_or_else(|| ApiError::internal("user row carries an unknown role"))?;
            Ok(AuthUser { id: user.id, role })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(secret: &str, ttl: i64) -> AppConfig {
        AppConfig {
            port: 0,
            database_url: String::new(),
            jwt_secret: secret.to_string(),
            token_ttl_hours: ttl,
        }
    }

    #[test]
    fn token_round_trips_id_and_role() {
        let cfg = config("test-secret", 1);
        let token = issue_token(42, UserRole::Vendor, &cfg).unwrap();
        let claims = decode_token(&token, "test-secret").unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.role, "vendor");
    }

    #[test]
    fn token_is_rejected_with_wrong_secret() {
        let cfg = config("test-secret", 1);
        let token = issue_token(42, UserRole::Customer, &cfg).unwrap();
        assert!(decode_token(&token, "other-secret").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let cfg = config("test-secret", -2);
        let token = issue_token(42, UserRole::Customer, &cfg).unwrap();
        assert!(decode_token(&token, "test-secret").is_err());
    }

    #[test]
    fn bearer_scheme_is_required() {
        assert_eq!(parse_bearer(Some("Bearer abc.def.ghi")), Some("abc.def.ghi"));
        assert_eq!(parse_bearer(Some("Basic abc")), None);
        assert_eq!(parse_bearer(None), None);
    }

    #[test]
    fn password_hash_verifies_and_rejects() {
        let hash = hash_password("hunter2").unwrap();
        assert_ne!(hash, "hunter2");
        assert!(verify_password("hunter2", &hash).unwrap());
        assert!(!verify_password("hunter3", &hash).unwrap());
    }

    #[test]
    fn authorize_gates_on_role() {
        let customer = AuthUser {
            id: 1,
            role: UserRole::Customer,
        };
        let vendor = AuthUser {
            id: 2,
            role: UserRole::Vendor,
        };
        let admin = AuthUser {
            id: 3,
            role: UserRole::Admin,
        };
        let allowed = [UserRole::Vendor, UserRole::Admin];
        assert!(authorize(&customer, &allowed).is_err());
        assert!(authorize(&vendor, &allowed).is_ok());
        assert!(authorize(&admin, &allowed).is_ok());
    }
}
