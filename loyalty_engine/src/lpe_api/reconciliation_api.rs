//! One reconciliation pass over the orders still waiting for a decision from the accrual service.
//!
//! Every New or Processing order is looked up through a [`WorkerPool`] sized to the accrual service's rate limit.
//! Resolved answers that move an order forward are committed to the ledger in a single transaction. Everything else
//! is logged and left for the next pass.
use std::{fmt::Debug, sync::Arc, time::Duration};

use accrual_tools::{AccrualGateway, AccrualOutcome, ResolvedAccrual};
use futures_util::FutureExt;
use log::*;
use lps_common::NON_TERMINAL_STATUSES;
use tokio_util::sync::CancellationToken;

use crate::{
    db::traits::OrderManagement,
    db_types::{AccrualUpdate, Order},
    lpe_api::{
        errors::ReconciliationError,
        reconciliation_objects::{accrual_update_for, ReconciliationResult, UnresolvedOrder, UnresolvedReason},
    },
    worker_pool::{JobHandler, WorkerPool},
};

type Lookup = (Order, ResolvedAccrual);

#[derive(Debug, Clone, Copy)]
pub struct ReconciliationOptions {
    /// The maximum number of concurrent requests to the accrual service
    pub rate_limit: usize,
    /// How long a single pass may spend on lookups before the remaining orders are abandoned
    pub tick_timeout: Duration,
}

impl Default for ReconciliationOptions {
    fn default() -> Self {
        Self { rate_limit: 2, tick_timeout: Duration::from_secs(20) }
    }
}

pub struct ReconciliationApi<B, G> {
    db: B,
    gateway: Arc<G>,
    options: ReconciliationOptions,
}

impl<B: Debug, G> Debug for ReconciliationApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi ({:?}, {:?})", self.db, self.options)
    }
}

impl<B, G> ReconciliationApi<B, G>
where
    B: OrderManagement,
    G: AccrualGateway,
{
    pub fn new(db: B, gateway: G, options: ReconciliationOptions) -> Self {
        Self { db, gateway: Arc::new(gateway), options }
    }

    pub fn options(&self) -> &ReconciliationOptions {
        &self.options
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    /// Runs one reconciliation pass.
    ///
    /// Cancelling `shutdown` stops the lookups early and discards their results; nothing is committed. Running out
    /// of `tick_timeout` also stops the lookups, but the answers collected so far are still committed.
    ///
    /// Only storage and pool start-up failures are returned as errors. When committing fails, no part of the batch is
    /// written.
    pub async fn reconcile_non_terminal_orders(
        &self,
        shutdown: &CancellationToken,
    ) -> Result<ReconciliationResult, ReconciliationError> {
        let orders = self.db.fetch_orders_with_status(&NON_TERMINAL_STATUSES).await?;
        let mut result = ReconciliationResult::with_fetched(orders.len());
        if orders.is_empty() {
            debug!("🔄️ No orders are waiting for an accrual decision. Nothing to reconcile.");
            return Ok(result);
        }
        debug!("🔄️ Reconciling {} orders with the accrual service", orders.len());

        let tick = shutdown.child_token();
        let deadline = tokio::spawn(cancel_after(tick.clone(), self.options.tick_timeout));
        let lookups = self.look_up_all(orders, tick).await;
        deadline.abort();
        let (resolved, unresolved) = lookups?;

        result.abandoned = result.fetched - resolved.len() - unresolved.len();
        result.unresolved = unresolved;
        if shutdown.is_cancelled() {
            info!(
                "🔄️ Shutdown requested during reconciliation. {} resolved accrual decisions will be fetched again on \
                 the next run.",
                resolved.len()
            );
            result.shutdown = true;
            return Ok(result);
        }

        let updates: Vec<AccrualUpdate> =
            resolved.iter().filter_map(|(order, answer)| accrual_update_for(order, answer)).collect();
        result.unchanged = resolved.len() - updates.len();
        if !updates.is_empty() {
            result.committed = self.db.apply_accrual_updates(&updates).await?;
            // Orders that changed between the fetch and the commit are skipped by the ledger
            result.unchanged += updates.len() - result.committed.len();
        }
        info!("🔄️ Reconciliation complete. {result}");
        Ok(result)
    }

    async fn look_up_all(
        &self,
        orders: Vec<Order>,
        tick: CancellationToken,
    ) -> Result<(Vec<Lookup>, Vec<UnresolvedOrder>), ReconciliationError> {
        // No point in spawning more workers than there are orders to look up
        let workers = self.options.rate_limit.min(orders.len()).max(1);
        let mut pool = WorkerPool::new(workers, workers.saturating_mul(2), tick, self.lookup_handler())?;
        for order in orders {
            if let Err(e) = pool.submit(order).await {
                warn!("🔄️ Stopped submitting accrual lookups: {e}. The remaining orders will be retried next run.");
                break;
            }
        }
        pool.stop_and_wait().await;
        let mut resolved = Vec::new();
        let mut unresolved = Vec::new();
        for outcome in pool.outcomes() {
            match outcome {
                Ok(lookup) => resolved.push(lookup),
                Err(u) => {
                    log_unresolved(&u);
                    unresolved.push(u);
                },
            }
        }
        Ok((resolved, unresolved))
    }

    fn lookup_handler(&self) -> JobHandler<Order, Lookup, UnresolvedOrder> {
        let gateway = Arc::clone(&self.gateway);
        Arc::new(move |_cancel: CancellationToken, order: Order| {
            let gateway = Arc::clone(&gateway);
            async move {
                match gateway.lookup(&order.order_number).await {
                    AccrualOutcome::Resolved(answer) => Ok((order, answer)),
                    AccrualOutcome::NotYetRegistered => {
                        Err(UnresolvedOrder::new(&order, UnresolvedReason::NotYetRegistered))
                    },
                    AccrualOutcome::RateLimited => Err(UnresolvedOrder::new(&order, UnresolvedReason::RateLimited)),
                    AccrualOutcome::TransportError(e) => {
                        Err(UnresolvedOrder::new(&order, UnresolvedReason::TransportError(e)))
                    },
                }
            }
            .boxed()
        })
    }
}

async fn cancel_after(token: CancellationToken, timeout: Duration) {
    tokio::time::sleep(timeout).await;
    if !token.is_cancelled() {
        warn!("🔄️ Reconciliation ran out of time after {timeout:?}. Abandoning the remaining lookups.");
        token.cancel();
    }
}

fn log_unresolved(order: &UnresolvedOrder) {
    match &order.reason {
        UnresolvedReason::TransportError(_) => {
            warn!("🔄️ Could not get an accrual decision for order {}: {}", order.order_number, order.reason)
        },
        _ => info!("🔄️ Order {} is {}. Will retry.", order.order_number, order.reason),
    }
}
