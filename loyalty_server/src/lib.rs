//! # Loyalty points server
//! The server keeps users' loyalty balances in step with the external accrual service. It is responsible for:
//! * Running the accrual worker, which periodically asks the accrual service about every order that is still waiting
//!   for a decision, and credits the points it grants.
//! * Serving a liveness endpoint.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
pub mod accrual_worker;
pub mod cli;
pub mod config;
pub mod errors;
pub mod routes;
pub mod server;
