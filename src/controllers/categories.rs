use crate::insertables::NewCategory;
use actix_web::{get, post, web, HttpResponse};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use ecommerce_api::auth::{authorize, AuthUser};
use ecommerce_api::errors::ApiError;
use ecommerce_api::models::{Category, UserRole};
use ecommerce_api::schema::categories;
use serde::Deserialize;
use serde_json::json;

type DbPool = Pool<ConnectionManager<PgConnection>>;

#[derive(Deserialize)]
pub struct CreateCategoryDto {
    pub name: String,
}

pub fn get_all_categories(conn: &mut PgConnection) -> Result<Vec<Category>, ApiError> {
    Ok(categories::table
        .select(Category::as_select())
        .order(categories::name.asc())
        .load(conn)?)
}

pub fn insert_new_category(conn: &mut PgConnection, name: &str) -> Result<Category, ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::Validation(
            "Category name must not be empty".to_string(),
        ));
    }
    // Unique index on name turns a duplicate into a 409 via the error mapping.
    Ok(diesel::insert_into(categories::table)
        .values(&NewCategory {
            name: name.to_string(),
        })
        .get_result(conn)?)
}

#[get("/api/categories")]
async fn get_categories(pool: web::Data<DbPool>) -> Result<HttpResponse, ApiError> {
    let all_categories = web::block(move || {
        let mut conn = pool.get()?;
        get_all_categories(&mut conn)
    })
    .await??;
    Ok(HttpResponse::Ok().json(all_categories))
}

#[post("/api/categories")]
async fn create_category(
    pool: web::Data<DbPool>,
    principal: AuthUser,
    form: web::Json<CreateCategoryDto>,
) -> Result<HttpResponse, ApiError> {
    authorize(&principal, &[UserRole::Admin])?;
    let category = web::block(move || {
        let mut conn = pool.get()?;
        insert_new_category(&mut conn, &form.name)
    })
    .await??;
    Ok(HttpResponse::Created().json(json!({
        "message": "Category created successfully",
        "category": category,
    })))
}
