use std::fmt::Display;

use accrual_tools::{AccrualApiError, ResolvedAccrual};
use lps_common::{Money, OrderStatusType};

use crate::db_types::{AccrualUpdate, Order};

/// Why an order was left untouched by a reconciliation pass. All of these are retried on the next pass.
#[derive(Debug, Clone)]
pub enum UnresolvedReason {
    NotYetRegistered,
    RateLimited,
    TransportError(AccrualApiError),
}

impl Display for UnresolvedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnresolvedReason::NotYetRegistered => write!(f, "not yet registered with the accrual service"),
            UnresolvedReason::RateLimited => write!(f, "rate limited by the accrual service"),
            UnresolvedReason::TransportError(e) => write!(f, "{e}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UnresolvedOrder {
    pub order_number: String,
    pub reason: UnresolvedReason,
}

impl UnresolvedOrder {
    pub fn new(order: &Order, reason: UnresolvedReason) -> Self {
        Self { order_number: order.order_number.clone(), reason }
    }
}

/// A summary of one reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct ReconciliationResult {
    /// Orders that were waiting for a decision when the pass started
    pub fetched: usize,
    /// Orders whose new status (and any accrual) was committed
    pub committed: Vec<Order>,
    /// Orders that the accrual service answered for, but whose status did not move forward
    pub unchanged: usize,
    pub unresolved: Vec<UnresolvedOrder>,
    /// Orders that were never looked up, because the pass was cancelled or ran out of time
    pub abandoned: usize,
    /// True if shutdown was requested during the pass. Nothing is committed in that case.
    pub shutdown: bool,
}

impl ReconciliationResult {
    pub fn with_fetched(fetched: usize) -> Self {
        Self { fetched, ..Default::default() }
    }

    pub fn committed_count(&self) -> usize {
        self.committed.len()
    }

    pub fn unresolved_count(&self) -> usize {
        self.unresolved.len()
    }

    /// The total points credited by this pass.
    pub fn total_credited(&self) -> Money {
        self.committed.iter().filter(|o| o.status == OrderStatusType::Processed).map(|o| o.accrual).sum()
    }
}

impl Display for ReconciliationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} orders fetched, {} committed ({} points credited), {} unchanged, {} unresolved, {} abandoned",
            self.fetched,
            self.committed_count(),
            self.total_credited(),
            self.unchanged,
            self.unresolved_count(),
            self.abandoned
        )
    }
}

/// Turns the accrual service's answer for `order` into a ledger update, if the answer moves the order forward.
///
/// Only processed orders carry an accrual into the ledger.
pub fn accrual_update_for(order: &Order, resolved: &ResolvedAccrual) -> Option<AccrualUpdate> {
    if !order.status.can_transition_to(resolved.status) {
        return None;
    }
    let accrual = if resolved.status == OrderStatusType::Processed { resolved.accrual } else { Money::ZERO };
    Some(AccrualUpdate {
        order_number: order.order_number.clone(),
        user_id: order.user_id,
        status: resolved.status,
        accrual,
    })
}
