//! Loyalty Engine
//!
//! The loyalty engine keeps user point balances in step with the decisions of the external accrual service.
//!
//! The library is divided into three main sections:
//! 1. Database management and control ([`mod@db`]). SQLite is the supported backend. The data types used in the
//!    database are defined in the [`db_types`] module and are public; everything else goes through the traits
//!    [`OrderManagement`] and [`AccountManagement`].
//! 2. The [`worker_pool`]: a generic, bounded pool of async workers with backpressure on submission.
//! 3. The public API ([`mod@lpe_api`]). [`ReconciliationApi`] drives unresolved orders through the worker pool and the
//!    accrual service and folds the answers back into the ledger. [`AccountApi`] offers the account-facing ledger
//!    operations: registering orders, reading balances and withdrawing points.
mod db;

pub mod db_types;
mod lpe_api;
pub mod worker_pool;

#[cfg(feature = "sqlite")]
pub use db::sqlite::{SqliteDatabase, SqliteDatabaseError};
pub use db::traits::{AccountManagement, InsertOrderResult, LedgerError, OrderManagement};
pub use lpe_api::{
    accounts_api::AccountApi,
    errors::{AccountApiError, ReconciliationError},
    reconciliation_api::{ReconciliationApi, ReconciliationOptions},
    reconciliation_objects::{ReconciliationResult, UnresolvedOrder, UnresolvedReason},
};
