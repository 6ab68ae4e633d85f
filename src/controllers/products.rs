use crate::controllers::functions;
use crate::insertables::NewProduct;
use actix_web::{delete, get, patch, post, web, HttpResponse};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use ecommerce_api::auth::{authorize, AuthUser};
use ecommerce_api::errors::ApiError;
use ecommerce_api::models::{Product, UserRole};
use ecommerce_api::schema::{categories, products};
use serde::Deserialize;
use serde_json::json;

type DbPool = Pool<ConnectionManager<PgConnection>>;

const DEFAULT_PAGE_SIZE: i64 = 10;

#[derive(Deserialize)]
pub struct ProductQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub category: Option<i32>,
    pub brand: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

#[derive(Deserialize)]
pub struct CreateProductDto {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub category_id: i32,
    pub brand: String,
    pub stock_quantity: i32,
    pub images: Option<Vec<String>>,
    pub discount_percentage: Option<f64>,
}

#[derive(Deserialize)]
pub struct UpdateProductDto {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub category_id: Option<i32>,
    pub brand: Option<String>,
    pub stock_quantity: Option<i32>,
    pub images: Option<Vec<String>>,
    pub discount_percentage: Option<f64>,
    pub is_active: Option<bool>,
}

#[derive(AsChangeset)]
#[diesel(table_name = products)]
struct ProductChanges {
    name: Option<String>,
    description: Option<String>,
    price: Option<f64>,
    category_id: Option<i32>,
    brand: Option<String>,
    stock_quantity: Option<i32>,
    images: Option<Vec<String>>,
    discount_percentage: Option<f64>,
    is_active: Option<bool>,
}

fn validate_numbers(
    price: Option<f64>,
    stock: Option<i32>,
    discount: Option<f64>,
) -> Result<(), ApiError> {
    if matches!(price, Some(p) if p < 0.0) {
        return Err(ApiError::Validation("Price must not be negative".to_string()));
    }
    if matches!(stock, Some(s) if s < 0) {
        return Err(ApiError::Validation(
            "Stock quantity must not be negative".to_string(),
        ));
    }
    if matches!(discount, Some(d) if !(0.0..=100.0).contains(&d)) {
        return Err(ApiError::Validation(
            "Discount percentage must be between 0 and 100".to_string(),
        ));
    }
    Ok(())
}

fn filtered(query: &ProductQuery) -> products::BoxedQuery<'static, Pg> {
    let mut filter = products::table
        .filter(products::is_active.eq(true))
        .into_boxed();
    if let Some(category) = query.category {
        filter = filter.filter(products::category_id.eq(category));
    }
    if let Some(brand) = &query.brand {
        filter = filter.filter(products::brand.eq(brand.clone()));
    }
    if let Some(min_price) = query.min_price {
        filter = filter.filter(products::price.ge(min_price));
    }
    if let Some(max_price) = query.max_price {
        filter = filter.filter(products::price.le(max_price));
    }
    filter
}

pub fn list_products(
    conn: &mut PgConnection,
    query: &ProductQuery,
) -> Result<(Vec<Product>, i64, i64), ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, 100);

    let total: i64 = filtered(query).count().get_result(conn)?;
    let page_products = filtered(query)
        .select(Product::as_select())
        .order(products::created_at.desc())
        .limit(limit)
        .offset((page - 1) * limit)
        .load(conn)?;
    Ok((page_products, functions::total_pages(total, limit), page))
}

pub fn get_product_by_id(conn: &mut PgConnection, product_id: i32) -> Result<Product, ApiError> {
    products::table
        .find(product_id)
        .select(Product::as_select())
        .first::<Product>(conn)
        .optional()?
        .ok_or_else(|| ApiError::NotFound("Product not found".to_string()))
}

pub fn insert_new_product(
    conn: &mut PgConnection,
    vendor_id: i32,
    dto: CreateProductDto,
) -> Result<Product, ApiError> {
    validate_numbers(Some(dto.price), Some(dto.stock_quantity), dto.discount_percentage)?;
    let category_exists: i64 = categories::table
        .filter(categories::id.eq(dto.category_id))
        .count()
        .get_result(conn)?;
    if category_exists == 0 {
        return Err(ApiError::NotFound("Category not found".to_string()));
    }
    let new_product = NewProduct {
        name: dto.name,
        description: dto.description,
        price: dto.price,
        category_id: dto.category_id,
        brand: dto.brand,
        stock_quantity: dto.stock_quantity,
        images: dto.images.unwrap_or_default(),
        vendor_id,
        discount_percentage: dto.discount_percentage.unwrap_or(0.0),
        is_active: true,
    };
    Ok(diesel::insert_into(products::table)
        .values(&new_product)
        .get_result(conn)?)
}

/// Catalog mutation is gated on ownership: the owning vendor or an admin.
fn check_ownership(product: &Product, principal: &AuthUser) -> Result<(), ApiError> {
    if product.vendor_id != principal.id && principal.role != UserRole::Admin {
        return Err(ApiError::Forbidden(
            "Not allowed to modify this product".to_string(),
        ));
    }
    Ok(())
}

pub fn update_product_by_id(
    conn: &mut PgConnection,
    product_id: i32,
    principal: &AuthUser,
    dto: UpdateProductDto,
) -> Result<Product, ApiError> {
    let product = get_product_by_id(conn, product_id)?;
    check_ownership(&product, principal)?;
    validate_numbers(dto.price, dto.stock_quantity, dto.discount_percentage)?;

    let changes = ProductChanges {
        name: dto.name,
        description: dto.description,
        price: dto.price,
        category_id: dto.category_id,
        brand: dto.brand,
        stock_quantity: dto.stock_quantity,
        images: dto.images,
        discount_percentage: dto.discount_percentage,
        is_active: dto.is_active,
    };
    Ok(diesel::update(products::table.find(product_id))
        .set(&changes)
        .get_result(conn)?)
}

pub fn delete_product_by_id(
    conn: &mut PgConnection,
    product_id: i32,
    principal: &AuthUser,
) -> Result<(), ApiError> {
    let product = get_product_by_id(conn, product_id)?;
    check_ownership(&product, principal)?;
    diesel::delete(products::table.find(product_id)).execute(conn)?;
    Ok(())
}

#[get("/api/products")]
async fn get_products(
    pool: web::Data<DbPool>,
    query: web::Query<ProductQuery>,
) -> Result<HttpResponse, ApiError> {
    let (page_products, total_pages, current_page) = web::block(move || {
        let mut conn = pool.get()?;
        list_products(&mut conn, &query)
    })
    .await??;
    Ok(HttpResponse::Ok().json(json!({
        "products": page_products,
        "total_pages": total_pages,
        "current_page": current_page,
    })))
}

#[get("/api/products/{product_id}")]
async fn get_product(
    pool: web::Data<DbPool>,
    product_id: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let product = web::block(move || {
        let mut conn = pool.get()?;
        get_product_by_id(&mut conn, *product_id)
    })
    .await??;
    Ok(HttpResponse::Ok().json(product))
}

#[post("/api/products")]
async fn create_product(
    pool: web::Data<DbPool>,
    principal: AuthUser,
    form: web::Json<CreateProductDto>,
) -> Result<HttpResponse, ApiError> {
    authorize(&principal, &[UserRole::Vendor, UserRole::Admin])?;
    let product = web::block(move || {
        let mut conn = pool.get()?;
        insert_new_product(&mut conn, principal.id, form.into_inner())
    })
    .await??;
    Ok(HttpResponse::Created().json(json!({
        "message": "Product created successfully",
        "product": product,
    })))
}

#[patch("/api/products/{product_id}")]
async fn update_product(
    pool: web::Data<DbPool>,
    principal: AuthUser,
    product_id: web::Path<i32>,
    form: web::Json<UpdateProductDto>,
) -> Result<HttpResponse, ApiError> {
    authorize(&principal, &[UserRole::Vendor, UserRole::Admin])?;
    let product = web::block(move || {
        let mut conn = pool.get()?;
        update_product_by_id(&mut conn, *product_id, &principal, form.into_inner())
    })
    .await??;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Product updated successfully",
        "product": product,
    })))
}

#[delete("/api/products/{product_id}")]
async fn delete_product(
    pool: web::Data<DbPool>,
    principal: AuthUser,
    product_id: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    authorize(&principal, &[UserRole::Vendor, UserRole::Admin])?;
    web::block(move || {
        let mut conn = pool.get()?;
        delete_product_by_id(&mut conn, *product_id, &principal)
    })
    .await??;
    Ok(HttpResponse::Ok().json(json!({ "message": "Product deleted successfully" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn product(vendor_id: i32) -> Product {
        Product {
            id: 1,
            name: "Keyboard".to_string(),
            description: "desc".to_string(),
            price: 45.0,
            category_id: 1,
            brand: "Acme".to_string(),
            stock_quantity: 5,
            images: vec![],
            vendor_id,
            discount_percentage: 0.0,
            is_active: true,
            average_rating: 0.0,
            total_reviews: 0,
            created_at: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn owner_and_admin_pass_ownership_check() {
        let owner = AuthUser {
            id: 5,
            role: UserRole::Vendor,
        };
        let admin = AuthUser {
            id: 9,
            role: UserRole::Admin,
        };
        assert!(check_ownership(&product(5), &owner).is_ok());
        assert!(check_ownership(&product(5), &admin).is_ok());
    }

    #[test]
    fn foreign_vendor_is_rejected() {
        let other_vendor = AuthUser {
            id: 6,
            role: UserRole::Vendor,
        };
        assert!(check_ownership(&product(5), &other_vendor).is_err());
    }

    #[test]
    fn numeric_fields_are_range_checked() {
        assert!(validate_numbers(Some(10.0), Some(0), Some(0.0)).is_ok());
        assert!(validate_numbers(Some(-1.0), None, None).is_err());
        assert!(validate_numbers(None, Some(-1), None).is_err());
        assert!(validate_numbers(None, None, Some(101.0)).is_err());
        assert!(validate_numbers(None, None, Some(100.0)).is_ok());
    }
}
