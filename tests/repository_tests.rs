/// Repository and query tests
///
/// Verify staged-instance lookups, implicit filtering (tenant, soft
/// delete), removal semantics and the query combinators.
/// Run with: cargo test --test repository_tests
mod common;

use std::sync::Arc;

use common::*;
use unitdb::prelude::*;

#[tokio::test]
async fn test_get_by_key_sees_staged_instance_before_flush() {
    let uow = UnitOfWork::new(session_for("Acme").await);
    let orders = uow.repository::<Order>().unwrap();

    orders.add(order(1, "Alice", 1999)).await.unwrap();

    // Staged but not flushed: visible by key, not yet in the store.
    let staged = orders.get_by_key(&1).await.unwrap().unwrap();
    assert_eq!(staged.customer, "Alice");
    assert!(orders.get_all().await.unwrap().is_empty());

    uow.save_changes().await.unwrap();
    assert_eq!(orders.get_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_get_by_key_missing_is_none() {
    let uow = UnitOfWork::new(session_for("Acme").await);
    let orders = uow.repository::<Order>().unwrap();

    assert!(orders.get_by_key(&42).await.unwrap().is_none());
}

#[tokio::test]
async fn test_soft_deleted_hidden_but_recoverable() {
    let uow = UnitOfWork::new(session_for("Acme").await);
    let orders = uow.repository::<Order>().unwrap();

    orders.add(order(1, "Alice", 1999)).await.unwrap();
    uow.save_changes().await.unwrap();

    let stored = orders.get_by_key(&1).await.unwrap().unwrap();
    orders.remove(stored).await.unwrap();
    uow.save_changes().await.unwrap();

    // Filtered reads no longer see the row.
    assert!(orders.get_by_key(&1).await.unwrap().is_none());
    assert!(orders.get_all().await.unwrap().is_empty());

    // But the row is still there, marked deleted.
    let raw = orders.query().ignore_filters().all().await.unwrap();
    assert_eq!(raw.len(), 1);
    assert!(raw[0].is_deleted);
    assert!(raw[0].deleted_at.is_some());
}

#[tokio::test]
async fn test_hard_delete_when_soft_delete_disabled() {
    let session = Session::connect(
        DatabaseOptions::new("memory://orders")
            .tenant("Acme")
            .correlation("corr-1")
            .ensure_created(true),
        registry(),
    )
    .await
    .unwrap();
    let uow = UnitOfWork::new(session);
    let orders = uow.repository::<Order>().unwrap();

    orders.add(order(1, "Alice", 1999)).await.unwrap();
    uow.save_changes().await.unwrap();

    orders.remove_by_key(&1).await.unwrap();
    assert_eq!(uow.save_changes().await.unwrap(), 1);

    // Gone outright, not just hidden.
    assert!(orders.query().ignore_filters().all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_remove_by_key_missing_is_not_found() {
    let uow = UnitOfWork::new(session_for("Acme").await);
    let orders = uow.repository::<Order>().unwrap();

    let err = orders.remove_by_key(&99).await.unwrap_err();
    assert!(matches!(
        err,
        DbError::NotFound {
            entity: "Order",
            ..
        }
    ));
    assert_eq!(uow.session().staged_count().unwrap(), 0);
}

#[tokio::test]
async fn test_tenant_isolation_across_sessions() {
    let registry = Arc::new(registry());
    let storage = Arc::new(MemoryStorage::new());

    let acme = Session::attach(
        DatabaseOptions::new("memory://orders")
            .tenant("Acme")
            .correlation("corr-1")
            .ensure_created(true),
        Arc::clone(&registry),
        Arc::clone(&storage),
    )
    .await
    .unwrap();
    let globex = Session::attach(
        DatabaseOptions::new("memory://orders")
            .tenant("Globex")
            .correlation("corr-1"),
        registry,
        storage,
    )
    .await
    .unwrap();

    let acme_uow = UnitOfWork::new(acme);
    let acme_orders = acme_uow.repository::<Order>().unwrap();
    acme_orders.add(order(1, "Alice", 1999)).await.unwrap();
    acme_uow.save_changes().await.unwrap();

    let globex_uow = UnitOfWork::new(globex);
    let globex_orders = globex_uow.repository::<Order>().unwrap();

    // Same store, different tenant: nothing visible through the filters.
    assert!(globex_orders.get_all().await.unwrap().is_empty());
    assert!(globex_orders.get_by_key(&1).await.unwrap().is_none());
    assert_eq!(acme_orders.get_all().await.unwrap().len(), 1);

    // The row itself is shared; only the filter differs.
    let raw = globex_orders.query().ignore_filters().all().await.unwrap();
    assert_eq!(raw.len(), 1);
    assert_eq!(raw[0].tenant_id, "Acme");
}

#[tokio::test]
async fn test_repository_scope_override_is_isolated() {
    let uow = UnitOfWork::new(session_for("Acme").await);
    let default_orders = uow.repository::<Order>().unwrap();
    let globex_orders = uow
        .repository_with::<Order>(|options| options.tenant_id = "Globex".into())
        .unwrap();

    default_orders.add(order(1, "Alice", 1999)).await.unwrap();
    globex_orders.add(order(2, "Bob", 2999)).await.unwrap();
    uow.save_changes().await.unwrap();

    // Each repository reads its own tenant; the session default is
    // untouched by the override.
    let acme_rows = default_orders.get_all().await.unwrap();
    assert_eq!(acme_rows.len(), 1);
    assert_eq!(acme_rows[0].tenant_id, "Acme");

    let globex_rows = globex_orders.get_all().await.unwrap();
    assert_eq!(globex_rows.len(), 1);
    assert_eq!(globex_rows[0].tenant_id, "Globex");

    assert_eq!(uow.session().options().unwrap().tenant_id, "Acme");
}

#[tokio::test]
async fn test_query_combinators() {
    let uow = UnitOfWork::new(session_for("Acme").await);
    let orders = uow.repository::<Order>().unwrap();

    orders
        .add_many((1..=5).map(|id| order(id, "Alice", i64::from(id) * 1000)))
        .await
        .unwrap();
    uow.save_changes().await.unwrap();

    let expensive = orders
        .query()
        .filter(|order: &Order| order.total_cents >= 2000)
        .count()
        .await
        .unwrap();
    assert_eq!(expensive, 4);

    let mut page = orders
        .query()
        .filter(|order: &Order| order.total_cents >= 2000)
        .skip(1)
        .take(2)
        .all()
        .await
        .unwrap();
    assert_eq!(page.len(), 2);

    page.sort_by_key(|order| order.id);
    for row in &page {
        assert!(row.total_cents >= 2000);
    }

    let one = orders
        .get_one(|order: &Order| order.total_cents == 3000)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(one.id, 3);
}

#[tokio::test]
async fn test_get_all_is_idempotent() {
    let uow = UnitOfWork::new(session_for("Acme").await);
    let orders = uow.repository::<Order>().unwrap();

    orders.add(order(1, "Alice", 1999)).await.unwrap();
    orders.add(order(2, "Bob", 2999)).await.unwrap();
    uow.save_changes().await.unwrap();

    let mut first = orders.get_all().await.unwrap();
    let mut second = orders.get_all().await.unwrap();
    first.sort_by_key(|order| order.id);
    second.sort_by_key(|order| order.id);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_flush_order_last_write_wins() {
    let uow = UnitOfWork::new(session_for("Acme").await);
    let orders = uow.repository::<Order>().unwrap();

    orders.add(order(1, "Alice", 1000)).await.unwrap();
    let revised = Order {
        tenant_id: "Acme".into(),
        ..order(1, "Alice", 5000)
    };
    orders.update(revised).await.unwrap();
    uow.save_changes().await.unwrap();

    let stored = orders.get_by_key(&1).await.unwrap().unwrap();
    assert_eq!(stored.total_cents, 5000);
}
