//! #  Database management and control.
//!
//! This module provides the interfaces that define the contracts of the loyalty engine database *backends*.
//!
//! * [`OrderManagement`] covers uploading orders, finding the orders that still await a decision from the accrual
//!   service, and folding those decisions back into order state and balances.
//! * [`AccountManagement`] covers user accounts, balances and withdrawals.
//!
//! Backends report failures through their own error types and convert them into the backend-agnostic
//! [`LedgerError`] at the trait boundary.
mod account_management;
mod data_objects;
mod errors;
mod order_management;

pub use account_management::AccountManagement;
pub use data_objects::InsertOrderResult;
pub use errors::LedgerError;
pub use order_management::OrderManagement;
