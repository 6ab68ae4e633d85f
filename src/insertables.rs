use diesel::Insertable;
use ecommerce_api::schema::{
    cart_items, carts, categories, order_items, orders, products, reviews, users,
};

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name=users)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name=categories)]
pub struct NewCategory {
    pub name: String,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name=products)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub category_id: i32,
    pub brand: String,
    pub stock_quantity: i32,
    pub images: Vec<String>,
    pub vendor_id: i32,
    pub discount_percentage: f64,
    pub is_active: bool,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name=carts)]
pub struct NewCart {
    pub user_id: i32,
    pub total_price: f64,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name=cart_items)]
pub struct NewCartItem {
    pub cart_id: i32,
    pub product_id: i32,
    pub quantity: i32,
    pub price: f64,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name=orders)]
pub struct NewOrder {
    pub user_id: i32,
    pub total_price: f64,
    pub shipping_street: String,
    pub shipping_city: String,
    pub shipping_state: String,
    pub shipping_zip_code: String,
    pub shipping_country: String,
    pub status: String,
    pub payment_method: String,
    pub payment_status: String,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name=order_items)]
pub struct NewOrderItem {
    pub order_id: i32,
    pub product_id: i32,
    pub quantity: i32,
    pub price: f64,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name=reviews)]
pub struct NewReview {
    pub user_id: i32,
    pub product_id: i32,
    pub order_id: i32,
    pub rating: i32,
    pub comment: String,
    pub images: Vec<String>,
    pub is_verified_purchase: bool,
}
