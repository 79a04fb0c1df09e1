use std::future::Future;

use crate::{AccrualApi, AccrualOutcome};

/// Anything that can tell us what the accrual service thinks about an order.
///
/// Implementations are shared between all the workers of a pool, so they must be safe to call concurrently.
pub trait AccrualGateway: Send + Sync + 'static {
    fn lookup(&self, order_number: &str) -> impl Future<Output = AccrualOutcome> + Send;
}

impl AccrualGateway for AccrualApi {
    async fn lookup(&self, order_number: &str) -> AccrualOutcome {
        self.fetch_order_accrual(order_number).await
    }
}
