use thiserror::Error;

use crate::{db::traits::LedgerError, worker_pool::WorkerPoolError};

#[derive(Debug, Clone, Error)]
pub enum AccountApiError {
    #[error("'{0}' is not a valid order number")]
    InvalidOrderNumber(String),
    #[error("Withdrawals must be for a positive amount")]
    InvalidAmount,
    #[error("{0}")]
    Ledger(#[from] LedgerError),
}

/// Infrastructure failures that abort a reconciliation pass. Per-order lookup problems are not errors; they are
/// reported in the [`crate::ReconciliationResult`].
#[derive(Debug, Clone, Error)]
pub enum ReconciliationError {
    #[error("Reconciliation storage error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("Could not run accrual lookups: {0}")]
    WorkerPool(#[from] WorkerPoolError),
}
