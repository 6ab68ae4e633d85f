use chrono::{Datelike, NaiveDateTime};
use ecommerce_api::errors::ApiError;
use ecommerce_api::models::{Category, Order, OrderItem, OrderStatus, Product, User};
use serde::Serialize;
use std::collections::BTreeMap;

/// One cart line as the pricing logic sees it, independent of row ids.
#[derive(Debug, Clone, PartialEq)]
pub struct CartLine {
    pub product_id: i32,
    pub quantity: i32,
    pub price: f64,
}

/// Merges a product into the line set: an existing line for the product gets
/// its quantity bumped, otherwise a new line is appended at the given unit
/// price. Returns true when it merged into an existing line.
pub fn add_line(lines: &mut Vec<CartLine>, product_id: i32, quantity: i32, unit_price: f64) -> bool {
    if let Some(line) = lines.iter_mut().find(|line| line.product_id == product_id) {
        line.quantity += quantity;
        true
    } else {
        lines.push(CartLine {
            product_id,
            quantity,
            price: unit_price,
        });
        false
    }
}

pub fn line_total(lines: &[CartLine]) -> f64 {
    lines
        .iter()
        .map(|line| line.price * f64::from(line.quantity))
        .sum()
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub fn total_pages(total: i64, limit: i64) -> i64 {
    if limit <= 0 {
        return 0;
    }
    (total + limit - 1) / limit
}

pub fn is_image_url(url: &str) -> bool {
    let lower = url.to_lowercase();
    let rest = match lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))
    {
        Some(rest) => rest,
        None => return false,
    };
    [".jpg", ".jpeg", ".png", ".gif"]
        .iter()
        .any(|ext| rest.ends_with(ext) && rest.len() > ext.len())
}

pub fn validate_review_input(rating: i32, comment: &str, images: &[String]) -> Result<(), ApiError> {
    if !(1..=5).contains(&rating) {
        return Err(ApiError::Validation(
            "Rating must be between 1 and 5".to_string(),
        ));
    }
    if comment.chars().count() > 500 {
        return Err(ApiError::Validation(
            "Comment must be at most 500 characters".to_string(),
        ));
    }
    for image in images {
        if !is_image_url(image) {
            return Err(ApiError::Validation(format!("Invalid image URL: {image}")));
        }
    }
    Ok(())
}

/// A review is allowed only against the requester's own delivered order, and
/// only for a product that order actually contains.
pub fn check_review_eligibility(
    order: &Order,
    items: &[OrderItem],
    requester_id: i32,
    product_id: i32,
) -> Result<(), ApiError> {
    if order.user_id != requester_id || order.status() != Some(OrderStatus::Delivered) {
        return Err(ApiError::Validation("Invalid order for review".to_string()));
    }
    if !items.iter().any(|item| item.product_id == product_id) {
        return Err(ApiError::Validation(
            "Product not found in order".to_string(),
        ));
    }
    Ok(())
}

/// Full-scan mean; 0.0 for an unreviewed product.
pub fn average_rating(ratings: &[i32]) -> f64 {
    if ratings.is_empty() {
        return 0.0;
    }
    f64::from(ratings.iter().sum::<i32>()) / ratings.len() as f64
}

#[derive(Debug, Serialize, PartialEq)]
pub struct MonthlySales {
    pub month: u32,
    pub total_sales: f64,
    pub order_count: i64,
}

/// Delivered orders of the given calendar year, grouped by month.
pub fn monthly_sales(orders: &[Order], year: i32) -> Vec<MonthlySales> {
    let mut by_month: BTreeMap<u32, (f64, i64)> = BTreeMap::new();
    for order in orders {
        if order.status() != Some(OrderStatus::Delivered) || order.created_at.year() != year {
            continue;
        }
        let entry = by_month.entry(order.created_at.month()).or_insert((0.0, 0));
        entry.0 += order.total_price;
        entry.1 += 1;
    }
    by_month
        .into_iter()
        .map(|(month, (total_sales, order_count))| MonthlySales {
            month,
            total_sales,
            order_count,
        })
        .collect()
}

#[derive(Debug, Serialize, PartialEq)]
pub struct SalesKpis {
    pub total_revenue: f64,
    pub total_orders: i64,
    pub average_order_value: f64,
}

pub fn sales_kpis(monthly: &[MonthlySales]) -> SalesKpis {
    let total_revenue: f64 = monthly.iter().map(|m| m.total_sales).sum();
    let total_orders: i64 = monthly.iter().map(|m| m.order_count).sum();
    let average_order_value = if total_orders == 0 {
        0.0
    } else {
        total_revenue / total_orders as f64
    };
    SalesKpis {
        total_revenue,
        total_orders,
        average_order_value,
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ProductSales {
    pub product_id: i32,
    pub name: String,
    pub total_quantity: i64,
    pub total_revenue: f64,
}

/// Top sellers by units across the given line items, joined to product names.
pub fn top_products_by_quantity(
    items: &[OrderItem],
    products: &[Product],
    limit: usize,
) -> Vec<ProductSales> {
    let mut by_product: BTreeMap<i32, (i64, f64)> = BTreeMap::new();
    for item in items {
        let entry = by_product.entry(item.product_id).or_insert((0, 0.0));
        entry.0 += i64::from(item.quantity);
        entry.1 += item.price * f64::from(item.quantity);
    }
    let mut sales: Vec<ProductSales> = by_product
        .into_iter()
        .filter_map(|(pid, (total_quantity, total_revenue))| {
            let product = products.iter().find(|p| p.id == pid)?;
            Some(ProductSales {
                product_id: pid,
                name: product.name.clone(),
                total_quantity,
                total_revenue,
            })
        })
        .collect();
    sales.sort_by(|a, b| b.total_quantity.cmp(&a.total_quantity));
    sales.truncate(limit);
    sales
}

#[derive(Debug, Serialize, PartialEq)]
pub struct CategoryRevenue {
    pub category_id: i32,
    pub category_name: String,
    pub total_revenue: f64,
    pub total_sales: i64,
}

pub fn revenue_by_category(
    items: &[OrderItem],
    products: &[Product],
    categories: &[Category],
) -> Vec<CategoryRevenue> {
    let mut by_category: BTreeMap<i32, (f64, i64)> = BTreeMap::new();
    for item in items {
        let Some(product) = products.iter().find(|p| p.id == item.product_id) else {
            continue;
        };
        let entry = by_category.entry(product.category_id).or_insert((0.0, 0));
        entry.0 += item.price * f64::from(item.quantity);
        entry.1 += i64::from(item.quantity);
    }
    let mut revenue: Vec<CategoryRevenue> = by_category
        .into_iter()
        .filter_map(|(cid, (total_revenue, total_sales))| {
            let category = categories.iter().find(|c| c.id == cid)?;
            Some(CategoryRevenue {
                category_id: cid,
                category_name: category.name.clone(),
                total_revenue,
                total_sales,
            })
        })
        .collect();
    revenue.sort_by(|a, b| b.total_revenue.total_cmp(&a.total_revenue));
    revenue
}

#[derive(Debug, Serialize, PartialEq)]
pub struct UserGrowth {
    pub year: i32,
    pub month: u32,
    pub user_count: i64,
}

pub fn user_growth(users: &[User]) -> Vec<UserGrowth> {
    let mut by_period: BTreeMap<(i32, u32), i64> = BTreeMap::new();
    for user in users {
        *by_period
            .entry((user.created_at.year(), user.created_at.month()))
            .or_insert(0) += 1;
    }
    by_period
        .into_iter()
        .map(|((year, month), user_count)| UserGrowth {
            year,
            month,
            user_count,
        })
        .collect()
}

#[derive(Debug, Serialize, PartialEq)]
pub struct RoleCount {
    pub role: String,
    pub count: i64,
}

pub fn users_by_role(users: &[User]) -> Vec<RoleCount> {
    let mut by_role: BTreeMap<&str, i64> = BTreeMap::new();
    for user in users {
        *by_role.entry(user.role.as_str()).or_insert(0) += 1;
    }
    by_role
        .into_iter()
        .map(|(role, count)| RoleCount {
            role: role.to_string(),
            count,
        })
        .collect()
}

/// Distinct users with at least one order placed since the cutoff.
pub fn active_user_count(orders: &[Order], since: NaiveDateTime) -> i64 {
    let mut seen: Vec<i32> = orders
        .iter()
        .filter(|order| order.created_at >= since)
        .map(|order| order.user_id)
        .collect();
    seen.sort_unstable();
    seen.dedup();
    seen.len() as i64
}

#[derive(Debug, Serialize, PartialEq)]
pub struct LowStockProduct {
    pub product_id: i32,
    pub name: String,
    pub brand: String,
    pub stock_quantity: i32,
}

pub fn low_stock_products(products: &[Product], threshold: i32) -> Vec<LowStockProduct> {
    let mut low: Vec<LowStockProduct> = products
        .iter()
        .filter(|p| p.is_active && p.stock_quantity < threshold)
        .map(|p| LowStockProduct {
            product_id: p.id,
            name: p.name.clone(),
            brand: p.brand.clone(),
            stock_quantity: p.stock_quantity,
        })
        .collect();
    low.sort_by_key(|p| p.stock_quantity);
    low
}

#[derive(Debug, Serialize, PartialEq)]
pub struct InventoryValue {
    pub total_value: f64,
    pub total_products: i64,
}

pub fn inventory_value(products: &[Product]) -> InventoryValue {
    InventoryValue {
        total_value: products
            .iter()
            .map(|p| p.price * f64::from(p.stock_quantity))
            .sum(),
        total_products: products.len() as i64,
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ProductPerformance {
    pub product_id: i32,
    pub name: String,
    pub stock_quantity: i32,
    pub total_sold: i64,
    pub total_revenue: f64,
}

/// Units sold and revenue per product over every order's line items, products
/// with no sales included at zero. Sorted by units sold, top `limit` kept.
pub fn product_performance(
    products: &[Product],
    items: &[OrderItem],
    limit: usize,
) -> Vec<ProductPerformance> {
    let mut performance: Vec<ProductPerformance> = products
        .iter()
        .map(|product| {
            let (total_sold, total_revenue) = items
                .iter()
                .filter(|item| item.product_id == product.id)
                .fold((0_i64, 0.0_f64), |(sold, revenue), item| {
                    (
                        sold + i64::from(item.quantity),
                        revenue + item.price * f64::from(item.quantity),
                    )
                });
            ProductPerformance {
                product_id: product.id,
                name: product.name.clone(),
                stock_quantity: product.stock_quantity,
                total_sold,
                total_revenue,
            }
        })
        .collect();
    performance.sort_by(|a, b| b.total_sold.cmp(&a.total_sold));
    performance.truncate(limit);
    performance
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::ResponseError;
    use chrono::NaiveDate;
    use ecommerce_api::models::UserRole;

    fn ts(year: i32, month: u32, day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn order(id: i32, user_id: i32, total: f64, status: &str, created: NaiveDateTime) -> Order {
        Order {
            id,
            user_id,
            total_price: total,
            shipping_street: "1 Main St".to_string(),
            shipping_city: "Springfield".to_string(),
            shipping_state: "IL".to_string(),
            shipping_zip_code: "62701".to_string(),
            shipping_country: "US".to_string(),
            status: status.to_string(),
            payment_method: "credit_card".to_string(),
            payment_status: "pending".to_string(),
            tracking_number: None,
            created_at: created,
        }
    }

    fn order_item(id: i32, order_id: i32, product_id: i32, quantity: i32, price: f64) -> OrderItem {
        OrderItem {
            id,
            order_id,
            product_id,
            quantity,
            price,
        }
    }

    fn product(id: i32, name: &str, price: f64, category_id: i32, stock: i32) -> Product {
        Product {
            id,
            name: name.to_string(),
            description: "desc".to_string(),
            price,
            category_id,
            brand: "Acme".to_string(),
            stock_quantity: stock,
            images: vec![],
            vendor_id: 1,
            discount_percentage: 0.0,
            is_active: true,
            average_rating: 0.0,
            total_reviews: 0,
            created_at: ts(2024, 1, 1),
        }
    }

    fn user(id: i32, role: UserRole, created: NaiveDateTime) -> User {
        User {
            id,
            email: format!("user{id}@example.com"),
            password_hash: "hash".to_string(),
            role: role.as_str().to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            created_at: created,
        }
    }

    #[test]
    fn adding_same_product_twice_merges_lines() {
        let mut lines = vec![];
        assert!(!add_line(&mut lines, 7, 2, 45.0));
        assert!(add_line(&mut lines, 7, 3, 45.0));
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 5);
        assert_eq!(line_total(&lines), 225.0);
    }

    #[test]
    fn merged_line_keeps_its_original_snapshot_price() {
        let mut lines = vec![];
        add_line(&mut lines, 7, 1, 45.0);
        // Catalog price changed between adds; the line price must not.
        add_line(&mut lines, 7, 1, 99.0);
        assert_eq!(lines[0].price, 45.0);
        assert_eq!(line_total(&lines), 90.0);
    }

    #[test]
    fn total_sums_across_distinct_lines() {
        let mut lines = vec![];
        add_line(&mut lines, 1, 2, 10.0);
        add_line(&mut lines, 2, 1, 5.5);
        assert_eq!(line_total(&lines), 25.5);
    }

    #[test]
    fn email_is_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
    }

    #[test]
    fn image_urls_must_be_http_with_image_extension() {
        assert!(is_image_url("https://cdn.example.com/a.jpg"));
        assert!(is_image_url("http://cdn.example.com/a.PNG"));
        assert!(!is_image_url("ftp://cdn.example.com/a.jpg"));
        assert!(!is_image_url("https://cdn.example.com/a.pdf"));
        assert!(!is_image_url("https://.jpg"));
    }

    #[test]
    fn review_input_bounds_are_enforced() {
        assert!(validate_review_input(1, "fine", &[]).is_ok());
        assert!(validate_review_input(0, "fine", &[]).is_err());
        assert!(validate_review_input(6, "fine", &[]).is_err());
        assert!(validate_review_input(3, &"x".repeat(501), &[]).is_err());
        assert!(validate_review_input(3, "ok", &["https://x.test/a.gif".to_string()]).is_ok());
        assert!(validate_review_input(3, "ok", &["not-a-url".to_string()]).is_err());
    }

    #[test]
    fn review_requires_own_delivered_order_containing_product() {
        let delivered = order(1, 10, 90.0, "delivered", ts(2025, 3, 1));
        let items = vec![order_item(1, 1, 7, 2, 45.0)];

        assert!(check_review_eligibility(&delivered, &items, 10, 7).is_ok());
        // Wrong requester.
        assert!(check_review_eligibility(&delivered, &items, 11, 7).is_err());
        // Product not in the order.
        assert!(check_review_eligibility(&delivered, &items, 10, 8).is_err());
        // Not delivered yet.
        let shipped = order(2, 10, 90.0, "shipped", ts(2025, 3, 1));
        assert!(check_review_eligibility(&shipped, &items, 10, 7).is_err());
    }

    #[test]
    fn eligibility_failures_map_to_bad_request() {
        let shipped = order(2, 10, 90.0, "shipped", ts(2025, 3, 1));
        let err = check_review_eligibility(&shipped, &[], 10, 7).unwrap_err();
        assert_eq!(err.status_code(), actix_web::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn average_rating_is_full_scan_mean() {
        assert_eq!(average_rating(&[]), 0.0);
        assert_eq!(average_rating(&[4]), 4.0);
        assert_eq!(average_rating(&[5, 4, 3]), 4.0);
        assert_eq!(average_rating(&[1, 2]), 1.5);
    }

    #[test]
    fn monthly_sales_groups_delivered_orders_of_the_year() {
        let orders = vec![
            order(1, 1, 100.0, "delivered", ts(2025, 1, 5)),
            order(2, 1, 50.0, "delivered", ts(2025, 1, 20)),
            order(3, 2, 75.0, "delivered", ts(2025, 3, 2)),
            order(4, 2, 999.0, "pending", ts(2025, 3, 3)),
            order(5, 2, 42.0, "delivered", ts(2024, 12, 31)),
        ];
        let monthly = monthly_sales(&orders, 2025);
        assert_eq!(
            monthly,
            vec![
                MonthlySales {
                    month: 1,
                    total_sales: 150.0,
                    order_count: 2
                },
                MonthlySales {
                    month: 3,
                    total_sales: 75.0,
                    order_count: 1
                },
            ]
        );
    }

    #[test]
    fn kpis_avoid_division_by_zero() {
        let kpis = sales_kpis(&[]);
        assert_eq!(kpis.total_orders, 0);
        assert_eq!(kpis.average_order_value, 0.0);
    }

    #[test]
    fn kpis_average_over_order_count() {
        let monthly = vec![
            MonthlySales {
                month: 1,
                total_sales: 150.0,
                order_count: 2,
            },
            MonthlySales {
                month: 2,
                total_sales: 50.0,
                order_count: 2,
            },
        ];
        let kpis = sales_kpis(&monthly);
        assert_eq!(kpis.total_revenue, 200.0);
        assert_eq!(kpis.total_orders, 4);
        assert_eq!(kpis.average_order_value, 50.0);
    }

    #[test]
    fn top_products_ranks_by_units_sold() {
        let products = vec![product(1, "Keyboard", 45.0, 1, 5), product(2, "Mouse", 20.0, 1, 5)];
        let items = vec![
            order_item(1, 1, 1, 2, 45.0),
            order_item(2, 2, 2, 5, 20.0),
            order_item(3, 3, 1, 1, 45.0),
        ];
        let top = top_products_by_quantity(&items, &products, 10);
        assert_eq!(top[0].product_id, 2);
        assert_eq!(top[0].total_quantity, 5);
        assert_eq!(top[0].total_revenue, 100.0);
        assert_eq!(top[1].product_id, 1);
        assert_eq!(top[1].total_quantity, 3);
        assert_eq!(top[1].total_revenue, 135.0);
    }

    #[test]
    fn category_revenue_joins_items_to_categories() {
        let categories = vec![
            Category {
                id: 1,
                name: "Peripherals".to_string(),
            },
            Category {
                id: 2,
                name: "Audio".to_string(),
            },
        ];
        let products = vec![
            product(1, "Keyboard", 45.0, 1, 5),
            product(2, "Headphones", 80.0, 2, 5),
        ];
        let items = vec![order_item(1, 1, 1, 2, 45.0), order_item(2, 1, 2, 1, 80.0)];
        let revenue = revenue_by_category(&items, &products, &categories);
        assert_eq!(revenue[0].category_name, "Peripherals");
        assert_eq!(revenue[0].total_revenue, 90.0);
        assert_eq!(revenue[0].total_sales, 2);
        assert_eq!(revenue[1].category_name, "Audio");
        assert_eq!(revenue[1].total_revenue, 80.0);
    }

    #[test]
    fn user_growth_groups_by_year_and_month() {
        let users = vec![
            user(1, UserRole::Customer, ts(2024, 11, 1)),
            user(2, UserRole::Customer, ts(2025, 1, 5)),
            user(3, UserRole::Vendor, ts(2025, 1, 9)),
        ];
        let growth = user_growth(&users);
        assert_eq!(
            growth,
            vec![
                UserGrowth {
                    year: 2024,
                    month: 11,
                    user_count: 1
                },
                UserGrowth {
                    year: 2025,
                    month: 1,
                    user_count: 2
                },
            ]
        );
    }

    #[test]
    fn role_counts_cover_every_role_present() {
        let users = vec![
            user(1, UserRole::Customer, ts(2025, 1, 1)),
            user(2, UserRole::Customer, ts(2025, 1, 2)),
            user(3, UserRole::Admin, ts(2025, 1, 3)),
        ];
        let counts = users_by_role(&users);
        assert!(counts.contains(&RoleCount {
            role: "customer".to_string(),
            count: 2
        }));
        assert!(counts.contains(&RoleCount {
            role: "admin".to_string(),
            count: 1
        }));
    }

    #[test]
    fn active_users_are_distinct_within_window() {
        let orders = vec![
            order(1, 1, 10.0, "pending", ts(2025, 8, 10)),
            order(2, 1, 10.0, "delivered", ts(2025, 8, 12)),
            order(3, 2, 10.0, "pending", ts(2025, 8, 14)),
            order(4, 3, 10.0, "pending", ts(2025, 6, 1)),
        ];
        assert_eq!(active_user_count(&orders, ts(2025, 8, 1)), 2);
    }

    #[test]
    fn low_stock_lists_active_products_ascending() {
        let mut inactive = product(3, "Ghost", 5.0, 1, 0);
        inactive.is_active = false;
        let products = vec![
            product(1, "Keyboard", 45.0, 1, 9),
            product(2, "Mouse", 20.0, 1, 2),
            inactive,
            product(4, "Monitor", 200.0, 1, 50),
        ];
        let low = low_stock_products(&products, 10);
        assert_eq!(low.len(), 2);
        assert_eq!(low[0].product_id, 2);
        assert_eq!(low[1].product_id, 1);
    }

    #[test]
    fn inventory_value_sums_price_times_stock() {
        let products = vec![product(1, "Keyboard", 45.0, 1, 2), product(2, "Mouse", 20.0, 1, 3)];
        let value = inventory_value(&products);
        assert_eq!(value.total_value, 150.0);
        assert_eq!(value.total_products, 2);
    }

    #[test]
    fn product_performance_counts_unsold_products_as_zero() {
        let products = vec![product(1, "Keyboard", 45.0, 1, 5), product(2, "Mouse", 20.0, 1, 5)];
        let items = vec![order_item(1, 1, 1, 2, 45.0)];
        let performance = product_performance(&products, &items, 10);
        assert_eq!(performance[0].product_id, 1);
        assert_eq!(performance[0].total_sold, 2);
        assert_eq!(performance[0].total_revenue, 90.0);
        assert_eq!(performance[1].total_sold, 0);
        assert_eq!(performance[1].total_revenue, 0.0);
    }

    // End-to-end over the pure layer: discount -> cart snapshot -> order
    // snapshot -> delivery -> review -> rating aggregate.
    #[test]
    fn purchase_to_review_pipeline_holds_snapshots_and_averages() {
        let mut catalog_entry = product(7, "Lamp", 50.0, 1, 10);
        catalog_entry.discount_percentage = 10.0;
        let effective = catalog_entry.price_after_discount();
        assert_eq!(effective, 45.0);

        let mut lines = vec![];
        add_line(&mut lines, 7, 2, effective);
        assert_eq!(line_total(&lines), 90.0);

        // Catalog price changes after the order snapshot was taken.
        catalog_entry.price = 80.0;
        let placed = order(1, 10, 90.0, "delivered", ts(2025, 4, 1));
        let items = vec![order_item(1, 1, 7, 2, 45.0)];
        assert_eq!(items[0].price, 45.0);

        check_review_eligibility(&placed, &items, 10, 7).unwrap();
        assert_eq!(average_rating(&[4]), 4.0);
    }
}
