use crate::controllers::functions::{self, CartLine};
use crate::insertables::{NewCart, NewCartItem};
use actix_web::{delete, get, post, web, HttpResponse};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use ecommerce_api::auth::AuthUser;
use ecommerce_api::errors::ApiError;
use ecommerce_api::models::{Cart, CartItem, Product};
use ecommerce_api::schema::{cart_items, carts, products};
use serde::{Deserialize, Serialize};
use serde_json::json;

type DbPool = Pool<ConnectionManager<PgConnection>>;

#[derive(Deserialize)]
pub struct AddToCartDto {
    pub product_id: i32,
    pub quantity: i32,
}

#[derive(Serialize)]
pub struct CartItemView {
    pub id: i32,
    pub product: Product,
    pub quantity: i32,
    pub price: f64,
}

#[derive(Serialize)]
pub struct CartView {
    pub id: i32,
    pub user_id: i32,
    pub items: Vec<CartItemView>,
    pub total_price: f64,
}

fn load_cart_view(conn: &mut PgConnection, cart: &Cart) -> Result<CartView, ApiError> {
    let rows: Vec<(CartItem, Product)> = cart_items::table
        .filter(cart_items::cart_id.eq(cart.id))
        .inner_join(products::table)
        .select((CartItem::as_select(), Product::as_select()))
        .order(cart_items::id.asc())
        .load(conn)?;
    Ok(CartView {
        id: cart.id,
        user_id: cart.user_id,
        items: rows
            .into_iter()
            .map(|(item, product)| CartItemView {
                id: item.id,
                product,
                quantity: item.quantity,
                price: item.price,
            })
            .collect(),
        total_price: cart.total_price,
    })
}

fn find_cart(conn: &mut PgConnection, user_id: i32) -> Result<Option<Cart>, ApiError> {
    Ok(carts::table
        .filter(carts::user_id.eq(user_id))
        .select(Cart::as_select())
        .first::<Cart>(conn)
        .optional()?)
}

fn recompute_total(conn: &mut PgConnection, cart_id: i32) -> Result<Cart, ApiError> {
    let items: Vec<CartItem> = cart_items::table
        .filter(cart_items::cart_id.eq(cart_id))
        .select(CartItem::as_select())
        .load(conn)?;
    let lines: Vec<CartLine> = items
        .iter()
        .map(|item| CartLine {
            product_id: item.product_id,
            quantity: item.quantity,
            price: item.price,
        })
        .collect();
    Ok(diesel::update(carts::table.find(cart_id))
        .set(carts::total_price.eq(functions::line_total(&lines)))
        .get_result(conn)?)
}

pub fn add_to_cart(
    conn: &mut PgConnection,
    user_id: i32,
    dto: &AddToCartDto,
) -> Result<CartView, ApiError> {
    if dto.quantity < 1 {
        return Err(ApiError::Validation(
            "Quantity must be at least 1".to_string(),
        ));
    }
    let product = products::table
        .find(dto.product_id)
        .select(Product::as_select())
        .first::<Product>(conn)
        .optional()?
        .ok_or_else(|| ApiError::NotFound("Product not found".to_string()))?;
    if product.stock_quantity < dto.quantity {
        return Err(ApiError::InsufficientStock {
            available: product.stock_quantity,
        });
    }

    let cart = conn.transaction::<Cart, ApiError, _>(|conn| {
        let cart = match find_cart(conn, user_id)? {
            Some(cart) => cart,
            None => diesel::insert_into(carts::table)
                .values(&NewCart {
                    user_id,
                    total_price: 0.0,
                })
                .get_result(conn)?,
        };

        let items: Vec<CartItem> = cart_items::table
            .filter(cart_items::cart_id.eq(cart.id))
            .select(CartItem::as_select())
            .load(conn)?;
        let mut lines: Vec<CartLine> = items
            .iter()
            .map(|item| CartLine {
                product_id: item.product_id,
                quantity: item.quantity,
                price: item.price,
            })
            .collect();
        let merged = functions::add_line(
            &mut lines,
            dto.product_id,
            dto.quantity,
            product.price_after_discount(),
        );
        let line = lines
            .iter()
            .find(|line| line.product_id == dto.product_id)
            .ok_or_else(|| ApiError::internal("merged cart line vanished"))?;

        if merged {
            diesel::update(
                cart_items::table
                    .filter(cart_items::cart_id.eq(cart.id))
                    .filter(cart_items::product_id.eq(dto.product_id)),
            )
            .set(cart_items::quantity.eq(line.quantity))
            .execute(conn)?;
        } else {
            diesel::insert_into(cart_items::table)
                .values(&NewCartItem {
                    cart_id: cart.id,
                    product_id: line.product_id,
                    quantity: line.quantity,
                    price: line.price,
                })
                .execute(conn)?;
        }
        recompute_total(conn, cart.id)
    })?;
    load_cart_view(conn, &cart)
}

pub fn get_cart(conn: &mut PgConnection, user_id: i32) -> Result<CartView, ApiError> {
    let cart = find_cart(conn, user_id)?
        .ok_or_else(|| ApiError::NotFound("Cart not found".to_string()))?;
    load_cart_view(conn, &cart)
}

/// Removes every line for the product. Removing something not in the cart is a
/// no-op, not an error.
pub fn remove_from_cart(
    conn: &mut PgConnection,
    user_id: i32,
    product_id: i32,
) -> Result<CartView, ApiError> {
    let cart = find_cart(conn, user_id)?
        .ok_or_else(|| ApiError::NotFound("Cart not found".to_string()))?;
    let cart = conn.transaction::<Cart, ApiError, _>(|conn| {
        diesel::delete(
            cart_items::table
                .filter(cart_items::cart_id.eq(cart.id))
                .filter(cart_items::product_id.eq(product_id)),
        )
        .execute(conn)?;
        recompute_total(conn, cart.id)
    })?;
    load_cart_view(conn, &cart)
}

#[post("/api/cart/add")]
async fn add_item(
    pool: web::Data<DbPool>,
    principal: AuthUser,
    form: web::Json<AddToCartDto>,
) -> Result<HttpResponse, ApiError> {
    let cart = web::block(move || {
        let mut conn = pool.get()?;
        add_to_cart(&mut conn, principal.id, &form)
    })
    .await??;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Item added to cart",
        "cart": cart,
    })))
}

#[get("/api/cart")]
async fn get_user_cart(
    pool: web::Data<DbPool>,
    principal: AuthUser,
) -> Result<HttpResponse, ApiError> {
    let cart = web::block(move || {
        let mut conn = pool.get()?;
        get_cart(&mut conn, principal.id)
    })
    .await??;
    Ok(HttpResponse::Ok().json(cart))
}

#[delete("/api/cart/remove/{product_id}")]
async fn remove_item(
    pool: web::Data<DbPool>,
    principal: AuthUser,
    product_id: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let cart = web::block(move || {
        let mut conn = pool.get()?;
        remove_from_cart(&mut conn, principal.id, *product_id)
    })
    .await??;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Item removed from cart",
        "cart": cart,
    })))
}
