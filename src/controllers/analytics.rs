use crate::controllers::functions;
use actix_web::{get, web, HttpResponse};
use chrono::{Datelike, Duration, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use ecommerce_api::auth::{authorize, AuthUser};
use ecommerce_api::errors::ApiError;
use ecommerce_api::models::{Category, Order, OrderItem, OrderStatus, Product, User, UserRole};
use ecommerce_api::schema::{categories, order_items, orders, products, users};
use serde_json::json;

type DbPool = Pool<ConnectionManager<PgConnection>>;

const LOW_STOCK_THRESHOLD: i32 = 10;
const TOP_PRODUCT_LIMIT: usize = 10;

// Every report loads the rows it needs and aggregates in Rust; nothing is
// cached between requests.

pub fn sales_overview(conn: &mut PgConnection) -> Result<serde_json::Value, ApiError> {
    let all_orders: Vec<Order> = orders::table.select(Order::as_select()).load(conn)?;
    let delivered_ids: Vec<i32> = all_orders
        .iter()
        .filter(|order| order.status() == Some(OrderStatus::Delivered))
        .map(|order| order.id)
        .collect();
    let delivered_items: Vec<OrderItem> = order_items::table
        .filter(order_items::order_id.eq_any(&delivered_ids))
        .select(OrderItem::as_select())
        .load(conn)?;
    let all_products: Vec<Product> = products::table.select(Product::as_select()).load(conn)?;
    let all_categories: Vec<Category> = categories::table
        .select(Category::as_select())
        .load(conn)?;

    let monthly = functions::monthly_sales(&all_orders, Utc::now().year());
    let kpis = functions::sales_kpis(&monthly);
    let top_products =
        functions::top_products_by_quantity(&delivered_items, &all_products, TOP_PRODUCT_LIMIT);
    let revenue_by_category =
        functions::revenue_by_category(&delivered_items, &all_products, &all_categories);

    Ok(json!({
        "monthly_sales": monthly,
        "top_products": top_products,
        "revenue_by_category": revenue_by_category,
        "kpis": kpis,
    }))
}

pub fn user_analytics(conn: &mut PgConnection) -> Result<serde_json::Value, ApiError> {
    let all_users: Vec<User> = users::table.select(User::as_select()).load(conn)?;
    let all_orders: Vec<Order> = orders::table.select(Order::as_select()).load(conn)?;
    let cutoff = Utc::now().naive_utc() - Duration::days(30);

    Ok(json!({
        "user_growth": functions::user_growth(&all_users),
        "user_segmentation": functions::users_by_role(&all_users),
        "active_user_count": functions::active_user_count(&all_orders, cutoff),
    }))
}

pub fn inventory_analytics(conn: &mut PgConnection) -> Result<serde_json::Value, ApiError> {
    let all_products: Vec<Product> = products::table.select(Product::as_select()).load(conn)?;
    let all_items: Vec<OrderItem> = order_items::table
        .select(OrderItem::as_select())
        .load(conn)?;

    Ok(json!({
        "low_stock_products": functions::low_stock_products(&all_products, LOW_STOCK_THRESHOLD),
        "inventory_value": functions::inventory_value(&all_products),
        "product_performance": functions::product_performance(&all_products, &all_items, TOP_PRODUCT_LIMIT),
    }))
}

#[get("/api/analytics/sales")]
async fn get_sales_overview(
    pool: web::Data<DbPool>,
    principal: AuthUser,
) -> Result<HttpResponse, ApiError> {
    authorize(&principal, &[UserRole::Admin])?;
    let report = web::block(move || {
        let mut conn = pool.get()?;
        sales_overview(&mut conn)
    })
    .await??;
    Ok(HttpResponse::Ok().json(report))
}

#[get("/api/analytics/users")]
async fn get_user_analytics(
    pool: web::Data<DbPool>,
    principal: AuthUser,
) -> Result<HttpResponse, ApiError> {
    authorize(&principal, &[UserRole::Admin])?;
    let report = web::block(move || {
        let mut conn = pool.get()?;
        user_analytics(&mut conn)
    })
    .await??;
    Ok(HttpResponse::Ok().json(report))
}

#[get("/api/analytics/inventory")]
async fn get_inventory_analytics(
    pool: web::Data<DbPool>,
    principal: AuthUser,
) -> Result<HttpResponse, ApiError> {
    authorize(&principal, &[UserRole::Admin])?;
    let report = web::block(move || {
        let mut conn = pool.get()?;
        inventory_analytics(&mut conn)
    })
    .await??;
    Ok(HttpResponse::Ok().json(report))
}
