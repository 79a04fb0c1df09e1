//! # Loyalty engine public API
//!
//! * [`accounts_api`] provides the account-facing ledger operations: creating accounts, uploading orders, reading
//!   balances and withdrawing points.
//! * [`reconciliation_api`] runs one reconciliation pass over the orders that are still waiting for a decision from
//!   the accrual service.
//!
//! An API instance is created by supplying a database backend that implements the backend traits the API needs:
//!
//! ```rust,ignore
//! use loyalty_engine::{AccountApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/loyalty_store.db", 5).await?;
//! let api = AccountApi::new(db);
//! let balance = api.balance(user_id).await?;
//! ```
pub mod accounts_api;
pub mod errors;
pub mod reconciliation_api;
pub mod reconciliation_objects;
