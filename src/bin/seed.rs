use diesel::insert_into;
use diesel::prelude::*;
use dotenvy::dotenv;
use ecommerce_api::auth;
use ecommerce_api::models::UserRole;
use ecommerce_api::schema::{categories, users};
use serde::Deserialize;
use std::env;
use std::fs;

#[derive(Deserialize, Insertable)]
#[diesel(table_name = categories)]
struct Category {
    name: String,
}

#[derive(Insertable)]
#[diesel(table_name = users)]
struct AdminUser {
    email: String,
    password_hash: String,
    role: String,
    first_name: String,
    last_name: String,
}

fn main() -> std::io::Result<()> {
    dotenv().ok();
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL not set");
    let connection = &mut PgConnection::establish(&database_url).expect("connection failed");

    let categories_json =
        fs::read_to_string("src/bin/categories.json").expect("can't open categories.json");
    insert_into(categories::table)
        .values(serde_json::from_str::<Vec<Category>>(&categories_json).expect("bad json"))
        .on_conflict(categories::name)
        .do_nothing()
        .execute(connection)
        .expect("category seed failed");

    let admin_email = env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@example.com".to_string());
    let admin_password = env::var("ADMIN_PASSWORD").expect("ADMIN_PASSWORD not set");
    insert_into(users::table)
        .values(&AdminUser {
            email: admin_email.trim().to_lowercase(),
            password_hash: auth::hash_password(&admin_password).expect("hash failed"),
            role: UserRole::Admin.as_str().to_string(),
            first_name: "Site".to_string(),
            last_name: "Admin".to_string(),
        })
        .on_conflict(users::email)
        .do_nothing()
        .execute(connection)
        .expect("admin seed failed");
    Ok(())
}
