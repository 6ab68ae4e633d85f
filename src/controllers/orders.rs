use crate::insertables::{NewOrder, NewOrderItem};
use actix_web::{delete, get, post, put, web, HttpResponse};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use ecommerce_api::auth::{authorize, AuthUser};
use ecommerce_api::errors::ApiError;
use ecommerce_api::models::{Order, OrderItem, OrderStatus, PaymentStatus, Product, User, UserRole};
use ecommerce_api::schema::{order_items, orders, products, users};
use serde::{Deserialize, Serialize};
use serde_json::json;

type DbPool = Pool<ConnectionManager<PgConnection>>;

const PAYMENT_METHODS: [&str; 3] = ["credit_card", "paypal", "stripe"];

#[derive(Deserialize)]
pub struct ShippingAddressDto {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
}

#[derive(Deserialize)]
pub struct OrderItemDto {
    pub product_id: i32,
    pub quantity: i32,
    pub price: f64,
}

#[derive(Deserialize)]
pub struct CreateOrderDto {
    pub user_id: i32,
    pub items: Vec<OrderItemDto>,
    pub total_price: f64,
    pub shipping_address: ShippingAddressDto,
    pub payment_method: String,
}

#[derive(Deserialize)]
pub struct UpdateOrderDto {
    pub status: Option<String>,
    pub tracking_number: Option<String>,
}

#[derive(AsChangeset)]
#[diesel(table_name = orders)]
struct OrderChanges {
    status: Option<String>,
    tracking_number: Option<String>,
}

#[derive(Serialize)]
pub struct OrderItemView {
    pub id: i32,
    // None when the product was removed from the catalog after the sale.
    pub product: Option<Product>,
    pub quantity: i32,
    pub price: f64,
}

#[derive(Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub user: User,
    pub items: Vec<OrderItemView>,
}

fn assemble_views(
    conn: &mut PgConnection,
    orders_list: Vec<Order>,
) -> Result<Vec<OrderView>, ApiError> {
    let items: Vec<OrderItem> = OrderItem::belonging_to(&orders_list)
        .select(OrderItem::as_select())
        .load(conn)?;
    let product_ids: Vec<i32> = items.iter().map(|item| item.product_id).collect();
    let order_products: Vec<Product> = products::table
        .filter(products::id.eq_any(&product_ids))
        .select(Product::as_select())
        .load(conn)?;
    let user_ids: Vec<i32> = orders_list.iter().map(|order| order.user_id).collect();
    let order_users: Vec<User> = users::table
        .filter(users::id.eq_any(&user_ids))
        .select(User::as_select())
        .load(conn)?;

    orders_list
        .into_iter()
        .map(|order| {
            let user = order_users
                .iter()
                .find(|user| user.id == order.user_id)
                .cloned()
                .ok_or_else(|| ApiError::internal("order references a missing user"))?;
            let order_item_views = items
                .iter()
                .filter(|item| item.order_id == order.id)
                .map(|item| OrderItemView {
                    id: item.id,
                    product: order_products
                        .iter()
                        .find(|product| product.id == item.product_id)
                        .cloned(),
                    quantity: item.quantity,
                    price: item.price,
                })
                .collect::<Vec<_>>();
            Ok(OrderView {
                order,
                user,
                items: order_item_views,
            })
        })
        .collect()
}

pub fn insert_new_order(
    conn: &mut PgConnection,
    principal: &AuthUser,
    dto: CreateOrderDto,
) -> Result<OrderView, ApiError> {
    if principal.role != UserRole::Admin && dto.user_id != principal.id {
        return Err(ApiError::Forbidden(
            "Cannot create an order for another user".to_string(),
        ));
    }
    if dto.items.is_empty() {
        return Err(ApiError::Validation(
            "Order must contain at least one item".to_string(),
        ));
    }
    for item in &dto.items {
        if item.quantity < 1 {
            return Err(ApiError::Validation(
                "Item quantity must be at least 1".to_string(),
            ));
        }
        if item.price < 0.0 {
            return Err(ApiError::Validation(
                "Item price must not be negative".to_string(),
            ));
        }
    }
    if !PAYMENT_METHODS.contains(&dto.payment_method.as_str()) {
        return Err(ApiError::Validation(format!(
            "Unknown payment method: {}",
            dto.payment_method
        )));
    }

    let user_exists: i64 = users::table
        .filter(users::id.eq(dto.user_id))
        .count()
        .get_result(conn)?;
    if user_exists == 0 {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    let order = conn.transaction::<Order, ApiError, _>(|conn| {
        let new_order = NewOrder {
            user_id: dto.user_id,
            total_price: dto.total_price,
            shipping_street: dto.shipping_address.street.clone(),
            shipping_city: dto.shipping_address.city.clone(),
            shipping_state: dto.shipping_address.state.clone(),
            shipping_zip_code: dto.shipping_address.zip_code.clone(),
            shipping_country: dto.shipping_address.country.clone(),
            status: OrderStatus::Pending.as_str().to_string(),
            payment_method: dto.payment_method.clone(),
            payment_status: PaymentStatus::Pending.as_str().to_string(),
        };
        let order: Order = diesel::insert_into(orders::table)
            .values(&new_order)
            .get_result(conn)?;
        // Item prices are snapshotted as submitted and never touched again,
        // even if the catalog price changes later.
        for item in &dto.items {
            diesel::insert_into(order_items::table)
                .values(&NewOrderItem {
                    order_id: order.id,
                    product_id: item.product_id,
                    quantity: item.quantity,
                    price: item.price,
                })
                .execute(conn)?;
        }
        Ok(order)
    })?;

    let mut views = assemble_views(conn, vec![order])?;
    views
        .pop()
        .ok_or_else(|| ApiError::internal("created order vanished"))
}

pub fn get_all_orders(conn: &mut PgConnection) -> Result<Vec<OrderView>, ApiError> {
    let all_orders = orders::table
        .select(Order::as_select())
        .order(orders::created_at.desc())
        .load(conn)?;
    assemble_views(conn, all_orders)
}

pub fn get_order_by_id(
    conn: &mut PgConnection,
    order_id: i32,
    principal: &AuthUser,
) -> Result<OrderView, ApiError> {
    let order = orders::table
        .find(order_id)
        .select(Order::as_select())
        .first::<Order>(conn)
        .optional()?
        .ok_or_else(|| ApiError::NotFound("Order not found".to_string()))?;
    if principal.role != UserRole::Admin && order.user_id != principal.id {
        return Err(ApiError::Forbidden(
            "Not allowed to view this order".to_string(),
        ));
    }
    let mut views = assemble_views(conn, vec![order])?;
    views
        .pop()
        .ok_or_else(|| ApiError::internal("order view vanished"))
}

pub fn update_order_by_id(
    conn: &mut PgConnection,
    order_id: i32,
    dto: UpdateOrderDto,
) -> Result<OrderView, ApiError> {
    if dto.status.is_none() && dto.tracking_number.is_none() {
        return Err(ApiError::Validation(
            "No order fields to update".to_string(),
        ));
    }
    let order = orders::table
        .find(order_id)
        .select(Order::as_select())
        .first::<Order>(conn)
        .optional()?
        .ok_or_else(|| ApiError::NotFound("Order not found".to_string()))?;

    if let Some(next) = dto.status.as_deref() {
        let next = OrderStatus::parse(next)
            .ok_or_else(|| ApiError::Validation(format!("Unknown order status: {next}")))?;
        let current = order
            .status()
            .ok_or_else(|| ApiError::internal("order row carries an unknown status"))?;
        if !current.can_transition_to(next) {
            return Err(ApiError::Validation(format!(
                "Illegal status transition: {} -> {}",
                current.as_str(),
                next.as_str()
            )));
        }
    }

    let updated: Order = diesel::update(orders::table.find(order_id))
        .set(&OrderChanges {
            status: dto.status,
            tracking_number: dto.tracking_number,
        })
        .get_result(conn)?;
    let mut views = assemble_views(conn, vec![updated])?;
    views
        .pop()
        .ok_or_else(|| ApiError::internal("updated order vanished"))
}

pub fn delete_order_by_id(conn: &mut PgConnection, order_id: i32) -> Result<(), ApiError> {
    conn.transaction::<(), ApiError, _>(|conn| {
        diesel::delete(order_items::table.filter(order_items::order_id.eq(order_id)))
            .execute(conn)?;
        let deleted = diesel::delete(orders::table.find(order_id)).execute(conn)?;
        if deleted == 0 {
            return Err(ApiError::NotFound("Order not found".to_string()));
        }
        Ok(())
    })
}

#[post("/api/orders")]
async fn create_order(
    pool: web::Data<DbPool>,
    principal: AuthUser,
    form: web::Json<CreateOrderDto>,
) -> Result<HttpResponse, ApiError> {
    let order = web::block(move || {
        let mut conn = pool.get()?;
        insert_new_order(&mut conn, &principal, form.into_inner())
    })
    .await??;
    Ok(HttpResponse::Created().json(json!({ "order": order })))
}

#[get("/api/orders")]
async fn get_orders(pool: web::Data<DbPool>, principal: AuthUser) -> Result<HttpResponse, ApiError> {
    authorize(&principal, &[UserRole::Admin])?;
    let all_orders = web::block(move || {
        let mut conn = pool.get()?;
        get_all_orders(&mut conn)
    })
    .await??;
    Ok(HttpResponse::Ok().json(json!({ "orders": all_orders })))
}

#[get("/api/orders/{order_id}")]
async fn get_order(
    pool: web::Data<DbPool>,
    principal: AuthUser,
    order_id: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let order = web::block(move || {
        let mut conn = pool.get()?;
        get_order_by_id(&mut conn, *order_id, &principal)
    })
    .await??;
    Ok(HttpResponse::Ok().json(json!({ "order": order })))
}

#[put("/api/orders/{order_id}")]
async fn update_order(
    pool: web::Data<DbPool>,
    principal: AuthUser,
    order_id: web::Path<i32>,
    form: web::Json<UpdateOrderDto>,
) -> Result<HttpResponse, ApiError> {
    authorize(&principal, &[UserRole::Admin])?;
    let order = web::block(move || {
        let mut conn = pool.get()?;
        update_order_by_id(&mut conn, *order_id, form.into_inner())
    })
    .await??;
    Ok(HttpResponse::Ok().json(json!({ "order": order })))
}

#[delete("/api/orders/{order_id}")]
async fn delete_order(
    pool: web::Data<DbPool>,
    principal: AuthUser,
    order_id: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    authorize(&principal, &[UserRole::Admin])?;
    web::block(move || {
        let mut conn = pool.get()?;
        delete_order_by_id(&mut conn, *order_id)
    })
    .await??;
    Ok(HttpResponse::NoContent().finish())
}
