//! # Accrual tools
//!
//! A thin client for the external accrual service. The service decides how many loyalty points an order earns. It is
//! rate limited and slow to make up its mind, so every lookup is classified into an [`AccrualOutcome`] and the caller
//! decides what to do with orders that are not resolved yet.
//!
//! The [`AccrualGateway`] trait is the seam that the reconciliation engine depends on. [`AccrualApi`] is the HTTP
//! implementation of it.
mod api;
mod config;
mod data_objects;
mod error;
mod gateway;

pub use api::AccrualApi;
pub use config::AccrualConfig;
pub use data_objects::{AccrualOutcome, AccrualResponse, AccrualStatus, ResolvedAccrual};
pub use error::AccrualApiError;
pub use gateway::AccrualGateway;
