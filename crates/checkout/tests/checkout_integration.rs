//! End-to-end placement and reconciliation tests against PostgreSQL.
//!
//! These tests share one PostgreSQL container. Run with:
//!
//! ```bash
//! cargo test -p checkout --test checkout_integration
//! ```

use std::sync::Arc;

use checkout::{
    CheckoutError, Coordinator, InMemoryPublisher, OrderLine, PlacementRequest, WebhookOutcome,
    WebhookReconciler, sign,
};
use common::{AddressId, ProductId, UserId, VariantId};
use domain::{OrderStatus, PaymentStatus};
use rust_decimal::Decimal;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

const WEBHOOK_SECRET: &str = "whsec_integration";

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!("../../../migrations/001_init.sql"))
                .execute(&temp_pool)
                .await
                .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh pool with cleared tables
async fn get_test_pool() -> PgPool {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query(
        "TRUNCATE TABLE payments, order_items, orders, inventory, product_variants, products, addresses CASCADE",
    )
    .execute(&pool)
    .await
    .unwrap();

    pool
}

async fn seed_product(pool: &PgPool, name: &str, base_price: Decimal, stock: i32) -> ProductId {
    let id = ProductId::new();
    sqlx::query("INSERT INTO products (id, name, base_price, is_active) VALUES ($1, $2, $3, TRUE)")
        .bind(id.as_uuid())
        .bind(name)
        .bind(base_price)
        .execute(pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO inventory (product_id, quantity, low_stock_threshold) VALUES ($1, $2, 0)")
        .bind(id.as_uuid())
        .bind(stock)
        .execute(pool)
        .await
        .unwrap();
    id
}

async fn seed_variant(
    pool: &PgPool,
    product_id: ProductId,
    name: &str,
    price_modifier: Decimal,
) -> VariantId {
    let id = VariantId::new();
    sqlx::query(
        "INSERT INTO product_variants (id, product_id, name, price_modifier) VALUES ($1, $2, $3, $4)",
    )
    .bind(id.as_uuid())
    .bind(product_id.as_uuid())
    .bind(name)
    .bind(price_modifier)
    .execute(pool)
    .await
    .unwrap();
    id
}

async fn seed_address(pool: &PgPool, user_id: UserId) -> AddressId {
    let id = AddressId::new();
    sqlx::query(
        "INSERT INTO addresses (id, user_id, line1, city, postal_code) VALUES ($1, $2, '1 Main St', 'Lagos', '')",
    )
    .bind(id.as_uuid())
    .bind(user_id.as_uuid())
    .execute(pool)
    .await
    .unwrap();
    id
}

async fn deactivate_product(pool: &PgPool, product_id: ProductId) {
    sqlx::query("UPDATE products SET is_active = FALSE WHERE id = $1")
        .bind(product_id.as_uuid())
        .execute(pool)
        .await
        .unwrap();
}

async fn stock_of(pool: &PgPool, product_id: ProductId) -> i32 {
    store::inventory::stock_level(pool, product_id)
        .await
        .unwrap()
        .unwrap()
        .quantity
}

fn request(
    user_id: UserId,
    address_id: AddressId,
    lines: Vec<OrderLine>,
) -> PlacementRequest {
    PlacementRequest {
        user_id,
        delivery_address_id: address_id,
        payment_method: "card".to_string(),
        lines,
    }
}

fn line(product_id: ProductId, variant_id: Option<VariantId>, quantity: i32) -> OrderLine {
    OrderLine {
        product_id,
        variant_id,
        quantity,
    }
}

fn charge_success_body(reference: &str) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "event": "charge.success",
        "data": { "reference": reference, "channel": "card" },
    }))
    .unwrap()
}

#[tokio::test]
#[serial_test::serial]
async fn placement_prices_variants_and_snapshots_totals() {
    let pool = get_test_pool().await;
    let user_id = UserId::new();
    let address_id = seed_address(&pool, user_id).await;
    let product_id = seed_product(&pool, "Coffee", Decimal::new(1000, 2), 10).await;
    let variant_id = seed_variant(&pool, product_id, "Large", Decimal::new(200, 2)).await;

    let publisher = InMemoryPublisher::new();
    let coordinator = Coordinator::new(pool.clone(), publisher.clone());

    let placed = coordinator
        .place_order(request(
            user_id,
            address_id,
            vec![line(product_id, Some(variant_id), 3)],
        ))
        .await
        .unwrap();

    // 3 x (10.00 + 2.00)
    assert_eq!(placed.order.total_amount, Decimal::new(3600, 2));
    assert_eq!(placed.order.status, OrderStatus::Pending);
    assert_eq!(placed.items.len(), 1);
    assert_eq!(placed.items[0].unit_price, Decimal::new(1200, 2));
    assert_eq!(placed.items[0].product_name, "Coffee");
    assert_eq!(placed.items[0].variant_name.as_deref(), Some("Large"));

    assert_eq!(stock_of(&pool, product_id).await, 7);

    let payment = store::payments::payment_for_order(&pool, placed.order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(payment.amount, placed.order.total_amount);
    assert!(payment.transaction_ref.starts_with("TXN-"));

    assert_eq!(publisher.published(), vec![placed.order.id]);
}

#[tokio::test]
#[serial_test::serial]
async fn duplicate_lines_are_merged_before_reservation() {
    let pool = get_test_pool().await;
    let user_id = UserId::new();
    let address_id = seed_address(&pool, user_id).await;
    let product_id = seed_product(&pool, "Coffee", Decimal::new(1000, 2), 10).await;

    let coordinator = Coordinator::new(pool.clone(), InMemoryPublisher::new());
    let placed = coordinator
        .place_order(request(
            user_id,
            address_id,
            vec![line(product_id, None, 1), line(product_id, None, 2)],
        ))
        .await
        .unwrap();

    assert_eq!(placed.items.len(), 1);
    assert_eq!(placed.items[0].quantity, 3);
    assert_eq!(placed.order.total_amount, Decimal::new(3000, 2));
    assert_eq!(stock_of(&pool, product_id).await, 7);
}

#[tokio::test]
#[serial_test::serial]
async fn insufficient_stock_names_product_and_leaves_inventory_unchanged() {
    let pool = get_test_pool().await;
    let user_id = UserId::new();
    let address_id = seed_address(&pool, user_id).await;
    let product_id = seed_product(&pool, "Scarce", Decimal::new(500, 2), 2).await;

    let coordinator = Coordinator::new(pool.clone(), InMemoryPublisher::new());
    let err = coordinator
        .place_order(request(user_id, address_id, vec![line(product_id, None, 3)]))
        .await
        .unwrap_err();

    match err {
        CheckoutError::InsufficientStock {
            product_id: p,
            product_name,
            requested,
            available,
        } => {
            assert_eq!(p, product_id);
            assert_eq!(product_name, "Scarce");
            assert_eq!(requested, 3);
            assert_eq!(available, 2);
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }

    assert_eq!(stock_of(&pool, product_id).await, 2);
    assert!(store::orders::all_orders(&pool).await.unwrap().is_empty());
}

#[tokio::test]
#[serial_test::serial]
async fn failed_line_rolls_back_earlier_reservations() {
    let pool = get_test_pool().await;
    let user_id = UserId::new();
    let address_id = seed_address(&pool, user_id).await;
    let plentiful = seed_product(&pool, "Plentiful", Decimal::new(1000, 2), 10).await;
    let scarce = seed_product(&pool, "Scarce", Decimal::new(500, 2), 2).await;

    let coordinator = Coordinator::new(pool.clone(), InMemoryPublisher::new());
    let err = coordinator
        .place_order(request(
            user_id,
            address_id,
            vec![line(plentiful, None, 1), line(scarce, None, 3)],
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::InsufficientStock { .. }));
    assert_eq!(stock_of(&pool, plentiful).await, 10);
    assert_eq!(stock_of(&pool, scarce).await, 2);
    assert!(store::orders::all_orders(&pool).await.unwrap().is_empty());
}

#[tokio::test]
#[serial_test::serial]
async fn concurrent_placements_for_last_unit_admit_exactly_one() {
    let pool = get_test_pool().await;
    let user_id = UserId::new();
    let address_id = seed_address(&pool, user_id).await;
    let product_id = seed_product(&pool, "Last One", Decimal::new(1000, 2), 1).await;

    let coordinator = Arc::new(Coordinator::new(pool.clone(), InMemoryPublisher::new()));

    let a = {
        let coordinator = coordinator.clone();
        let req = request(user_id, address_id, vec![line(product_id, None, 1)]);
        tokio::spawn(async move { coordinator.place_order(req).await })
    };
    let b = {
        let coordinator = coordinator.clone();
        let req = request(user_id, address_id, vec![line(product_id, None, 1)]);
        tokio::spawn(async move { coordinator.place_order(req).await })
    };

    let results = [a.await.unwrap(), b.await.unwrap()];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);

    // The loser sees either the lock held or the stock already gone.
    let loser = results.iter().find(|r| r.is_err()).unwrap();
    assert!(matches!(
        loser.as_ref().unwrap_err(),
        CheckoutError::StockContended { .. } | CheckoutError::InsufficientStock { .. }
    ));

    assert_eq!(stock_of(&pool, product_id).await, 0);
    assert_eq!(store::orders::all_orders(&pool).await.unwrap().len(), 1);
}

#[tokio::test]
#[serial_test::serial]
async fn placement_rejects_bad_requests_without_touching_the_database() {
    let pool = get_test_pool().await;
    let user_id = UserId::new();
    let address_id = seed_address(&pool, user_id).await;
    let product_id = seed_product(&pool, "Coffee", Decimal::new(1000, 2), 10).await;

    let coordinator = Coordinator::new(pool.clone(), InMemoryPublisher::new());

    let err = coordinator
        .place_order(request(user_id, address_id, vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::EmptyOrder));

    let err = coordinator
        .place_order(request(user_id, address_id, vec![line(product_id, None, 0)]))
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::InvalidQuantity { .. }));

    assert_eq!(stock_of(&pool, product_id).await, 10);
}

#[tokio::test]
#[serial_test::serial]
async fn placement_rejects_foreign_address_inactive_product_and_mismatched_variant() {
    let pool = get_test_pool().await;
    let user_id = UserId::new();
    let address_id = seed_address(&pool, user_id).await;
    let product_id = seed_product(&pool, "Coffee", Decimal::new(1000, 2), 10).await;
    let other_product = seed_product(&pool, "Tea", Decimal::new(800, 2), 10).await;
    let other_variant = seed_variant(&pool, other_product, "Green", Decimal::ZERO).await;

    let coordinator = Coordinator::new(pool.clone(), InMemoryPublisher::new());

    let foreign_address = seed_address(&pool, UserId::new()).await;
    let err = coordinator
        .place_order(request(
            user_id,
            foreign_address,
            vec![line(product_id, None, 1)],
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::AddressNotFound { .. }));

    // A variant priced for one product cannot be attached to another.
    let err = coordinator
        .place_order(request(
            user_id,
            address_id,
            vec![line(product_id, Some(other_variant), 1)],
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::VariantNotFound { .. }));

    deactivate_product(&pool, product_id).await;
    let err = coordinator
        .place_order(request(user_id, address_id, vec![line(product_id, None, 1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::ProductNotFound { .. }));

    assert_eq!(stock_of(&pool, product_id).await, 10);
    assert_eq!(stock_of(&pool, other_product).await, 10);
}

#[tokio::test]
#[serial_test::serial]
async fn publisher_failure_does_not_roll_back_the_order() {
    let pool = get_test_pool().await;
    let user_id = UserId::new();
    let address_id = seed_address(&pool, user_id).await;
    let product_id = seed_product(&pool, "Coffee", Decimal::new(1000, 2), 10).await;

    let publisher = InMemoryPublisher::new();
    publisher.set_fail_on_publish(true);
    let coordinator = Coordinator::new(pool.clone(), publisher.clone());

    let placed = coordinator
        .place_order(request(user_id, address_id, vec![line(product_id, None, 1)]))
        .await
        .unwrap();

    assert!(publisher.published().is_empty());
    assert!(
        store::orders::order_by_id(&pool, placed.order.id)
            .await
            .unwrap()
            .is_some()
    );
    assert_eq!(stock_of(&pool, product_id).await, 9);
}

#[tokio::test]
#[serial_test::serial]
async fn webhook_confirms_payment_once_and_ignores_redelivery() {
    let pool = get_test_pool().await;
    let user_id = UserId::new();
    let address_id = seed_address(&pool, user_id).await;
    let product_id = seed_product(&pool, "Coffee", Decimal::new(1000, 2), 10).await;

    let coordinator = Coordinator::new(pool.clone(), InMemoryPublisher::new());
    let placed = coordinator
        .place_order(request(user_id, address_id, vec![line(product_id, None, 1)]))
        .await
        .unwrap();

    let payment = store::payments::payment_for_order(&pool, placed.order.id)
        .await
        .unwrap()
        .unwrap();

    let reconciler = WebhookReconciler::new(pool.clone(), WEBHOOK_SECRET);
    let body = charge_success_body(&payment.transaction_ref);
    let signature = sign(WEBHOOK_SECRET, &body);

    let outcome = reconciler.process(&body, Some(&signature)).await.unwrap();
    assert_eq!(
        outcome,
        WebhookOutcome::Confirmed {
            order_id: placed.order.id
        }
    );

    let payment = store::payments::payment_for_order(&pool, placed.order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Completed);
    assert!(payment.gateway_response.is_some());

    let order = store::orders::order_by_id(&pool, placed.order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.order.status, OrderStatus::Confirmed);

    // Second delivery of the same event changes nothing.
    let outcome = reconciler.process(&body, Some(&signature)).await.unwrap();
    assert_eq!(
        outcome,
        WebhookOutcome::AlreadyProcessed {
            reference: payment.transaction_ref.clone()
        }
    );
    let order = store::orders::order_by_id(&pool, placed.order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.order.status, OrderStatus::Confirmed);
}

#[tokio::test]
#[serial_test::serial]
async fn webhook_rejects_tampered_payloads_without_state_change() {
    let pool = get_test_pool().await;
    let user_id = UserId::new();
    let address_id = seed_address(&pool, user_id).await;
    let product_id = seed_product(&pool, "Coffee", Decimal::new(1000, 2), 10).await;

    let coordinator = Coordinator::new(pool.clone(), InMemoryPublisher::new());
    let placed = coordinator
        .place_order(request(user_id, address_id, vec![line(product_id, None, 1)]))
        .await
        .unwrap();
    let payment = store::payments::payment_for_order(&pool, placed.order.id)
        .await
        .unwrap()
        .unwrap();

    let reconciler = WebhookReconciler::new(pool.clone(), WEBHOOK_SECRET);
    let body = charge_success_body(&payment.transaction_ref);
    let signature = sign("some-other-secret", &body);

    let err = reconciler.process(&body, Some(&signature)).await.unwrap_err();
    assert!(matches!(err, checkout::WebhookError::InvalidSignature));

    let payment = store::payments::payment_for_order(&pool, placed.order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
    let order = store::orders::order_by_id(&pool, placed.order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.order.status, OrderStatus::Pending);
}

#[tokio::test]
#[serial_test::serial]
async fn webhook_acknowledges_unknown_references_and_foreign_events() {
    let pool = get_test_pool().await;
    let reconciler = WebhookReconciler::new(pool.clone(), WEBHOOK_SECRET);

    let body = charge_success_body("TXN-nobody-knows");
    let signature = sign(WEBHOOK_SECRET, &body);
    let outcome = reconciler.process(&body, Some(&signature)).await.unwrap();
    assert_eq!(
        outcome,
        WebhookOutcome::UnknownReference {
            reference: "TXN-nobody-knows".to_string()
        }
    );

    let body = serde_json::to_vec(&serde_json::json!({
        "event": "transfer.success",
        "data": { "reference": "TXN-nobody-knows" },
    }))
    .unwrap();
    let signature = sign(WEBHOOK_SECRET, &body);
    let outcome = reconciler.process(&body, Some(&signature)).await.unwrap();
    assert_eq!(
        outcome,
        WebhookOutcome::Ignored {
            event: "transfer.success".to_string()
        }
    );
}

#[tokio::test]
#[serial_test::serial]
async fn pending_orders_can_be_deleted_and_confirmed_orders_cannot() {
    let pool = get_test_pool().await;
    let user_id = UserId::new();
    let address_id = seed_address(&pool, user_id).await;
    let product_id = seed_product(&pool, "Coffee", Decimal::new(1000, 2), 10).await;

    let coordinator = Coordinator::new(pool.clone(), InMemoryPublisher::new());

    let deletable = coordinator
        .place_order(request(user_id, address_id, vec![line(product_id, None, 1)]))
        .await
        .unwrap();
    coordinator
        .delete_order(deletable.order.id, user_id)
        .await
        .unwrap();
    assert!(
        store::orders::order_by_id(&pool, deletable.order.id)
            .await
            .unwrap()
            .is_none()
    );

    let kept = coordinator
        .place_order(request(user_id, address_id, vec![line(product_id, None, 1)]))
        .await
        .unwrap();
    coordinator
        .update_status(kept.order.id, OrderStatus::Confirmed)
        .await
        .unwrap();

    let err = coordinator
        .delete_order(kept.order.id, user_id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::NotDeletable {
            status: OrderStatus::Confirmed,
            ..
        }
    ));

    // Another user cannot delete or even see the order.
    let err = coordinator
        .delete_order(kept.order.id, UserId::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::OrderNotFound { .. }));
}

#[tokio::test]
#[serial_test::serial]
async fn status_updates_follow_the_transition_table() {
    let pool = get_test_pool().await;
    let user_id = UserId::new();
    let address_id = seed_address(&pool, user_id).await;
    let product_id = seed_product(&pool, "Coffee", Decimal::new(1000, 2), 10).await;

    let coordinator = Coordinator::new(pool.clone(), InMemoryPublisher::new());
    let placed = coordinator
        .place_order(request(user_id, address_id, vec![line(product_id, None, 1)]))
        .await
        .unwrap();
    let order_id = placed.order.id;

    // PENDING cannot jump straight to DELIVERED.
    let err = coordinator
        .update_status(order_id, OrderStatus::Delivered)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::IllegalTransition {
            from: OrderStatus::Pending,
            to: OrderStatus::Delivered,
        }
    ));

    for next in [
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::InTransit,
        OrderStatus::Delivered,
    ] {
        let order = coordinator.update_status(order_id, next).await.unwrap();
        assert_eq!(order.status, next);
    }

    // DELIVERED is terminal except for refunds.
    let err = coordinator
        .update_status(order_id, OrderStatus::Cancelled)
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::IllegalTransition { .. }));

    let order = coordinator
        .update_status(order_id, OrderStatus::Refunded)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Refunded);
}
