mod support;

use std::{
    collections::HashMap,
    future::Future,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
        Mutex,
    },
    time::Duration,
};

use accrual_tools::{AccrualApiError, AccrualGateway, AccrualOutcome, ResolvedAccrual};
use loyalty_engine::{
    AccountApi,
    AccountManagement,
    OrderManagement,
    ReconciliationApi,
    ReconciliationError,
    ReconciliationOptions,
    SqliteDatabase,
    UnresolvedReason,
};
use lps_common::{Money, OrderStatusType};
use support::{prepare_test_env, ORDER_NUMBERS};
use tokio_util::sync::CancellationToken;

/// An accrual service that answers from a script. Unknown orders are reported as not registered.
#[derive(Clone, Default)]
struct ScriptedGateway {
    answers: Arc<Mutex<HashMap<String, AccrualOutcome>>>,
    delay: Duration,
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl ScriptedGateway {
    fn with_delay(delay: Duration) -> Self {
        Self { delay, ..Default::default() }
    }

    fn answer(&self, order_number: &str, outcome: AccrualOutcome) {
        self.answers.lock().unwrap().insert(order_number.to_string(), outcome);
    }

    fn resolve(&self, order_number: &str, status: OrderStatusType, hundredths: i64) {
        let resolved = ResolvedAccrual {
            order_number: order_number.to_string(),
            status,
            accrual: Money::from_hundredths(hundredths),
        };
        self.answer(order_number, AccrualOutcome::Resolved(resolved));
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AccrualGateway for ScriptedGateway {
    fn lookup(&self, order_number: &str) -> impl Future<Output = AccrualOutcome> + Send {
        let outcome =
            self.answers.lock().unwrap().get(order_number).cloned().unwrap_or(AccrualOutcome::NotYetRegistered);
        let gateway = self.clone();
        async move {
            gateway.calls.fetch_add(1, Ordering::SeqCst);
            let now = gateway.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            gateway.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(gateway.delay).await;
            gateway.in_flight.fetch_sub(1, Ordering::SeqCst);
            outcome
        }
    }
}

fn reconciler(db: &SqliteDatabase, gateway: &ScriptedGateway) -> ReconciliationApi<SqliteDatabase, ScriptedGateway> {
    ReconciliationApi::new(db.clone(), gateway.clone(), ReconciliationOptions::default())
}

async fn user_with_orders(db: &SqliteDatabase, login: &str, orders: &[&str]) -> i64 {
    let api = AccountApi::new(db.clone());
    let id = api.create_account(login).await.unwrap();
    for number in orders {
        api.register_order(id, number).await.unwrap();
    }
    id
}

async fn status_of(db: &SqliteDatabase, order_number: &str) -> (OrderStatusType, Money) {
    let order = db.fetch_order_by_number(order_number).await.unwrap().unwrap();
    (order.status, order.accrual)
}

async fn current_balance(db: &SqliteDatabase, user_id: i64) -> Money {
    db.fetch_balance(user_id).await.unwrap().unwrap().current
}

#[tokio::test]
async fn nothing_to_reconcile() {
    let db = prepare_test_env().await;
    let gateway = ScriptedGateway::default();
    let result = reconciler(&db, &gateway).reconcile_non_terminal_orders(&CancellationToken::new()).await.unwrap();
    assert_eq!(result.fetched, 0);
    assert_eq!(result.committed_count(), 0);
    assert_eq!(gateway.calls(), 0);
}

#[tokio::test]
async fn registered_orders_stay_new() {
    let db = prepare_test_env().await;
    let gateway = ScriptedGateway::default();
    user_with_orders(&db, "alice", &[ORDER_NUMBERS[0]]).await;
    gateway.resolve(ORDER_NUMBERS[0], OrderStatusType::New, 0);

    let result = reconciler(&db, &gateway).reconcile_non_terminal_orders(&CancellationToken::new()).await.unwrap();
    assert_eq!(result.fetched, 1);
    assert_eq!(result.committed_count(), 0);
    assert_eq!(result.unchanged, 1);
    assert_eq!(status_of(&db, ORDER_NUMBERS[0]).await, (OrderStatusType::New, Money::ZERO));
}

#[tokio::test]
async fn processed_orders_are_credited() {
    let db = prepare_test_env().await;
    let gateway = ScriptedGateway::default();
    let alice = user_with_orders(&db, "alice", &[ORDER_NUMBERS[0]]).await;
    gateway.resolve(ORDER_NUMBERS[0], OrderStatusType::Processed, 72998);

    let result = reconciler(&db, &gateway).reconcile_non_terminal_orders(&CancellationToken::new()).await.unwrap();
    assert_eq!(result.committed_count(), 1);
    assert_eq!(result.total_credited(), Money::from_hundredths(72998));
    assert_eq!(status_of(&db, ORDER_NUMBERS[0]).await, (OrderStatusType::Processed, Money::from_hundredths(72998)));
    assert_eq!(current_balance(&db, alice).await, Money::from_hundredths(72998));
}

#[tokio::test]
async fn rate_limited_orders_are_retried() {
    let db = prepare_test_env().await;
    let gateway = ScriptedGateway::default();
    let alice = user_with_orders(&db, "alice", &[ORDER_NUMBERS[0]]).await;
    gateway.answer(ORDER_NUMBERS[0], AccrualOutcome::RateLimited);
    let api = reconciler(&db, &gateway);

    let result = api.reconcile_non_terminal_orders(&CancellationToken::new()).await.unwrap();
    assert_eq!(result.unresolved_count(), 1);
    assert!(matches!(result.unresolved[0].reason, UnresolvedReason::RateLimited));
    assert_eq!(status_of(&db, ORDER_NUMBERS[0]).await, (OrderStatusType::New, Money::ZERO));

    gateway.resolve(ORDER_NUMBERS[0], OrderStatusType::Processed, 500);
    let result = api.reconcile_non_terminal_orders(&CancellationToken::new()).await.unwrap();
    assert_eq!(result.committed_count(), 1);
    assert_eq!(current_balance(&db, alice).await, Money::from_points(5));
}

#[tokio::test]
async fn unknown_and_failed_lookups_leave_orders_alone() {
    let db = prepare_test_env().await;
    let gateway = ScriptedGateway::default();
    user_with_orders(&db, "alice", &ORDER_NUMBERS[..2]).await;
    gateway.answer(ORDER_NUMBERS[1], AccrualOutcome::TransportError(AccrualApiError::UnexpectedStatus(500)));

    let result = reconciler(&db, &gateway).reconcile_non_terminal_orders(&CancellationToken::new()).await.unwrap();
    assert_eq!(result.fetched, 2);
    assert_eq!(result.unresolved_count(), 2);
    assert_eq!(result.committed_count(), 0);
    let mut reasons = result.unresolved.iter().map(|u| (u.order_number.as_str(), &u.reason)).collect::<Vec<_>>();
    reasons.sort_by_key(|(n, _)| *n);
    assert!(matches!(reasons[0].1, UnresolvedReason::NotYetRegistered));
    assert!(matches!(reasons[1].1, UnresolvedReason::TransportError(AccrualApiError::UnexpectedStatus(500))));
    for number in &ORDER_NUMBERS[..2] {
        assert_eq!(status_of(&db, number).await.0, OrderStatusType::New);
    }
}

#[tokio::test]
async fn invalid_orders_earn_nothing() {
    let db = prepare_test_env().await;
    let gateway = ScriptedGateway::default();
    let alice = user_with_orders(&db, "alice", &[ORDER_NUMBERS[0]]).await;
    gateway.resolve(ORDER_NUMBERS[0], OrderStatusType::Invalid, 1000);

    let result = reconciler(&db, &gateway).reconcile_non_terminal_orders(&CancellationToken::new()).await.unwrap();
    assert_eq!(result.committed_count(), 1);
    assert_eq!(status_of(&db, ORDER_NUMBERS[0]).await, (OrderStatusType::Invalid, Money::ZERO));
    assert_eq!(current_balance(&db, alice).await, Money::ZERO);
}

#[tokio::test]
async fn orders_move_through_processing_and_settle() {
    let db = prepare_test_env().await;
    let gateway = ScriptedGateway::default();
    let alice = user_with_orders(&db, "alice", &[ORDER_NUMBERS[0]]).await;
    let api = reconciler(&db, &gateway);
    let shutdown = CancellationToken::new();

    gateway.resolve(ORDER_NUMBERS[0], OrderStatusType::Processing, 0);
    assert_eq!(api.reconcile_non_terminal_orders(&shutdown).await.unwrap().committed_count(), 1);
    assert_eq!(status_of(&db, ORDER_NUMBERS[0]).await.0, OrderStatusType::Processing);

    // The service briefly reports the order as registered again. That must not move it backwards.
    gateway.resolve(ORDER_NUMBERS[0], OrderStatusType::New, 0);
    let result = api.reconcile_non_terminal_orders(&shutdown).await.unwrap();
    assert_eq!(result.unchanged, 1);
    assert_eq!(status_of(&db, ORDER_NUMBERS[0]).await.0, OrderStatusType::Processing);

    gateway.resolve(ORDER_NUMBERS[0], OrderStatusType::Processed, 2500);
    assert_eq!(api.reconcile_non_terminal_orders(&shutdown).await.unwrap().committed_count(), 1);
    assert_eq!(current_balance(&db, alice).await, Money::from_points(25));

    // Settled orders are never looked up again, and never credited twice
    let calls = gateway.calls();
    let result = api.reconcile_non_terminal_orders(&shutdown).await.unwrap();
    assert_eq!(result.fetched, 0);
    assert_eq!(gateway.calls(), calls);
    assert_eq!(current_balance(&db, alice).await, Money::from_points(25));
}

#[tokio::test]
async fn mixed_batch_across_users() {
    let db = prepare_test_env().await;
    let gateway = ScriptedGateway::default();
    let alice = user_with_orders(&db, "alice", &ORDER_NUMBERS[..3]).await;
    let bob = user_with_orders(&db, "bob", &ORDER_NUMBERS[3..6]).await;
    gateway.resolve(ORDER_NUMBERS[0], OrderStatusType::Processed, 100);
    gateway.resolve(ORDER_NUMBERS[1], OrderStatusType::Processed, 250);
    gateway.resolve(ORDER_NUMBERS[2], OrderStatusType::Invalid, 0);
    gateway.resolve(ORDER_NUMBERS[3], OrderStatusType::Processed, 1000);
    gateway.resolve(ORDER_NUMBERS[4], OrderStatusType::Processing, 0);
    gateway.answer(ORDER_NUMBERS[5], AccrualOutcome::RateLimited);

    let result = reconciler(&db, &gateway).reconcile_non_terminal_orders(&CancellationToken::new()).await.unwrap();
    assert_eq!(result.fetched, 6);
    assert_eq!(result.committed_count(), 5);
    assert_eq!(result.unresolved_count(), 1);
    assert_eq!(result.abandoned, 0);
    assert_eq!(current_balance(&db, alice).await, Money::from_hundredths(350));
    assert_eq!(current_balance(&db, bob).await, Money::from_hundredths(1000));
    assert_eq!(result.total_credited(), Money::from_hundredths(1350));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn lookups_respect_the_rate_limit() {
    let db = prepare_test_env().await;
    let gateway = ScriptedGateway::with_delay(Duration::from_millis(20));
    user_with_orders(&db, "alice", &ORDER_NUMBERS[..10]).await;
    for number in &ORDER_NUMBERS[..10] {
        gateway.resolve(number, OrderStatusType::Processed, 100);
    }
    let options = ReconciliationOptions { rate_limit: 2, tick_timeout: Duration::from_secs(10) };
    let api = ReconciliationApi::new(db.clone(), gateway.clone(), options);
    let result = api.reconcile_non_terminal_orders(&CancellationToken::new()).await.unwrap();
    assert_eq!(result.committed_count(), 10);
    assert_eq!(gateway.calls(), 10);
    assert!(gateway.max_in_flight.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn huge_rate_limits_only_spawn_what_the_batch_needs() {
    let db = prepare_test_env().await;
    let gateway = ScriptedGateway::default();
    let alice = user_with_orders(&db, "alice", &ORDER_NUMBERS[..3]).await;
    for number in &ORDER_NUMBERS[..3] {
        gateway.resolve(number, OrderStatusType::Processed, 100);
    }
    let options = ReconciliationOptions { rate_limit: usize::MAX, tick_timeout: Duration::from_secs(10) };
    let api = ReconciliationApi::new(db.clone(), gateway.clone(), options);
    let result = api.reconcile_non_terminal_orders(&CancellationToken::new()).await.unwrap();
    assert_eq!(result.committed_count(), 3);
    assert_eq!(gateway.calls(), 3);
    assert_eq!(current_balance(&db, alice).await, Money::from_points(3));
}

#[tokio::test]
async fn shutdown_discards_the_pass() {
    let db = prepare_test_env().await;
    let gateway = ScriptedGateway::default();
    let alice = user_with_orders(&db, "alice", &ORDER_NUMBERS[..3]).await;
    for number in &ORDER_NUMBERS[..3] {
        gateway.resolve(number, OrderStatusType::Processed, 100);
    }
    let shutdown = CancellationToken::new();
    shutdown.cancel();
    let result = reconciler(&db, &gateway).reconcile_non_terminal_orders(&shutdown).await.unwrap();
    assert!(result.shutdown);
    assert_eq!(result.committed_count(), 0);
    assert_eq!(result.abandoned, 3);
    assert_eq!(current_balance(&db, alice).await, Money::ZERO);
    for number in &ORDER_NUMBERS[..3] {
        assert_eq!(status_of(&db, number).await.0, OrderStatusType::New);
    }
}

#[tokio::test]
async fn tick_timeout_commits_what_was_resolved() {
    let db = prepare_test_env().await;
    let gateway = ScriptedGateway::with_delay(Duration::from_millis(300));
    let alice = user_with_orders(&db, "alice", &ORDER_NUMBERS[..3]).await;
    for number in &ORDER_NUMBERS[..3] {
        gateway.resolve(number, OrderStatusType::Processed, 100);
    }
    let options = ReconciliationOptions { rate_limit: 1, tick_timeout: Duration::from_millis(50) };
    let api = ReconciliationApi::new(db.clone(), gateway.clone(), options);
    let result = api.reconcile_non_terminal_orders(&CancellationToken::new()).await.unwrap();
    assert!(!result.shutdown);
    // The lookup in flight when time ran out still completes; the queued ones are abandoned
    assert_eq!(result.committed_count(), 1);
    assert_eq!(result.abandoned, 2);
    assert_eq!(gateway.calls(), 1);
    assert_eq!(current_balance(&db, alice).await, Money::from_points(1));
}

#[tokio::test]
async fn storage_failures_are_reported() {
    let db = prepare_test_env().await;
    let gateway = ScriptedGateway::default();
    user_with_orders(&db, "alice", &[ORDER_NUMBERS[0]]).await;
    let api = reconciler(&db, &gateway);
    db.close().await;
    let err = api.reconcile_non_terminal_orders(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, ReconciliationError::Ledger(_)));
}
