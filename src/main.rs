mod controllers {
    pub mod analytics;
    pub mod cart;
    pub mod categories;
    pub mod functions;
    pub mod orders;
    pub mod products;
    pub mod reviews;
    pub mod users;
}
mod insertables;
use actix_web::{get, web, App, HttpResponse, HttpServer};
use chrono::Utc;
use controllers::analytics;
use controllers::cart;
use controllers::categories;
use controllers::orders;
use controllers::products;
use controllers::reviews;
use controllers::users;
use diesel::{r2d2, PgConnection};
use dotenvy::dotenv;
use ecommerce_api::config::AppConfig;
use serde_json::json;
type DbPool = r2d2::Pool<r2d2::ConnectionManager<PgConnection>>;

#[get("/health")]
async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = AppConfig::from_env()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err))?;
    let db_pool = initialize_db_pool(&config);
    let port = config.port;
    tracing::info!(port, "starting server");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(db_pool.clone()))
            .app_data(web::Data::new(config.clone()))
            .service(health)
            .service(users::register)
            .service(users::login)
            .service(users::get_profile)
            .service(users::put_profile)
            .service(products::get_products)
            .service(products::get_product)
            .service(products::create_product)
            .service(products::update_product)
            .service(products::delete_product)
            .service(categories::get_categories)
            .service(categories::create_category)
            .service(cart::add_item)
            .service(cart::get_user_cart)
            .service(cart::remove_item)
            .service(orders::create_order)
            .service(orders::get_orders)
            .service(orders::get_order)
            .service(orders::update_order)
            .service(orders::delete_order)
            .service(reviews::post_review)
            .service(reviews::get_reviews)
            .service(analytics::get_sales_overview)
            .service(analytics::get_user_analytics)
            .service(analytics::get_inventory_analytics)
    })
    .bind(("127.0.0.1", port))?
    .run()
    .await
}

fn initialize_db_pool(config: &AppConfig) -> DbPool {
    let manager = r2d2::ConnectionManager::<PgConnection>::new(&config.database_url);
    r2d2::Pool::builder().build(manager).expect("DB Error")
}
