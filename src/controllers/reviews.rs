use crate::controllers::functions;
use crate::insertables::NewReview;
use actix_web::{get, post, web, HttpResponse};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use ecommerce_api::auth::AuthUser;
use ecommerce_api::errors::ApiError;
use ecommerce_api::models::{Order, OrderItem, Product, Review, User};
use ecommerce_api::schema::{order_items, orders, products, reviews, users};
use serde::{Deserialize, Serialize};
use serde_json::json;

type DbPool = Pool<ConnectionManager<PgConnection>>;

const DEFAULT_PAGE_SIZE: i64 = 10;

#[derive(Deserialize)]
pub struct CreateReviewDto {
    pub product_id: i32,
    pub order_id: i32,
    pub rating: i32,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Deserialize)]
pub struct ReviewQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub min_rating: Option<i32>,
}

#[derive(Serialize)]
pub struct ReviewerView {
    pub first_name: String,
    pub last_name: String,
}

#[derive(Serialize)]
pub struct ReviewView {
    #[serde(flatten)]
    pub review: Review,
    pub reviewer: ReviewerView,
}

pub fn create_review(
    conn: &mut PgConnection,
    requester_id: i32,
    dto: CreateReviewDto,
) -> Result<Review, ApiError> {
    functions::validate_review_input(dto.rating, &dto.comment, &dto.images)?;

    let order = orders::table
        .find(dto.order_id)
        .select(Order::as_select())
        .first::<Order>(conn)
        .optional()?
        .ok_or_else(|| ApiError::Validation("Invalid order for review".to_string()))?;
    let items: Vec<OrderItem> = order_items::table
        .filter(order_items::order_id.eq(order.id))
        .select(OrderItem::as_select())
        .load(conn)?;
    functions::check_review_eligibility(&order, &items, requester_id, dto.product_id)?;

    conn.transaction::<Review, ApiError, _>(|conn| {
        // Lock the product row first so concurrent recomputes for the same
        // product serialize and the full-scan aggregate stays consistent.
        products::table
            .find(dto.product_id)
            .select(Product::as_select())
            .for_update()
            .first::<Product>(conn)
            .optional()?
            .ok_or_else(|| ApiError::NotFound("Product not found".to_string()))?;

        let duplicate: i64 = reviews::table
            .filter(reviews::order_id.eq(dto.order_id))
            .filter(reviews::product_id.eq(dto.product_id))
            .count()
            .get_result(conn)?;
        if duplicate > 0 {
            return Err(ApiError::Conflict(
                "Review already submitted for this product".to_string(),
            ));
        }

        let review: Review = diesel::insert_into(reviews::table)
            .values(&NewReview {
                user_id: requester_id,
                product_id: dto.product_id,
                order_id: dto.order_id,
                rating: dto.rating,
                comment: dto.comment,
                images: dto.images,
                is_verified_purchase: true,
            })
            .get_result(conn)?;

        // Full scan rather than an incremental adjustment, so the aggregate
        // can never drift from the review rows.
        let ratings: Vec<i32> = reviews::table
            .filter(reviews::product_id.eq(dto.product_id))
            .select(reviews::rating)
            .load(conn)?;
        diesel::update(products::table.find(dto.product_id))
            .set((
                products::average_rating.eq(functions::average_rating(&ratings)),
                products::total_reviews.eq(ratings.len() as i32),
            ))
            .execute(conn)?;
        Ok(review)
    })
}

pub fn get_product_reviews(
    conn: &mut PgConnection,
    product_id: i32,
    query: &ReviewQuery,
) -> Result<(Vec<ReviewView>, i64, i64), ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, 100);

    let mut count_query = reviews::table
        .filter(reviews::product_id.eq(product_id))
        .into_boxed();
    let mut page_query = reviews::table
        .filter(reviews::product_id.eq(product_id))
        .inner_join(users::table)
        .into_boxed();
    if let Some(min_rating) = query.min_rating {
        count_query = count_query.filter(reviews::rating.ge(min_rating));
        page_query = page_query.filter(reviews::rating.ge(min_rating));
    }

    let total: i64 = count_query.count().get_result(conn)?;
    let rows: Vec<(Review, User)> = page_query
        .select((Review::as_select(), User::as_select()))
        .order(reviews::created_at.desc())
        .limit(limit)
        .offset((page - 1) * limit)
        .load(conn)?;

    let views = rows
        .into_iter()
        .map(|(review, user)| ReviewView {
            review,
            reviewer: ReviewerView {
                first_name: user.first_name,
                last_name: user.last_name,
            },
        })
        .collect();
    Ok((views, functions::total_pages(total, limit), page))
}

#[post("/api/review")]
async fn post_review(
    pool: web::Data<DbPool>,
    principal: AuthUser,
    form: web::Json<CreateReviewDto>,
) -> Result<HttpResponse, ApiError> {
    let review = web::block(move || {
        let mut conn = pool.get()?;
        create_review(&mut conn, principal.id, form.into_inner())
    })
    .await??;
    Ok(HttpResponse::Created().json(json!({
        "message": "Review submitted successfully",
        "review": review,
    })))
}

#[get("/api/review/product/{product_id}")]
async fn get_reviews(
    pool: web::Data<DbPool>,
    product_id: web::Path<i32>,
    query: web::Query<ReviewQuery>,
) -> Result<HttpResponse, ApiError> {
    let (review_views, total_pages, current_page) = web::block(move || {
        let mut conn = pool.get()?;
        get_product_reviews(&mut conn, *product_id, &query)
    })
    .await??;
    Ok(HttpResponse::Ok().json(json!({
        "reviews": review_views,
        "total_pages": total_pages,
        "current_page": current_page,
    })))
}
