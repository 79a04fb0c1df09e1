use std::time::Duration;

use accrual_tools::AccrualApi;
use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, App, HttpServer};
use log::*;
use loyalty_engine::SqliteDatabase;
use tokio_util::sync::CancellationToken;

use crate::{accrual_worker::start_accrual_worker, config::ServerConfig, errors::ServerError, routes::health};

/// Runs the health endpoint and the accrual worker until the server receives a shutdown signal.
///
/// The accrual worker is stopped after the HTTP server has shut down, and is given the chance to finish its current
/// database transaction before the connection pool is closed.
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(config.database_url.reveal(), 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateway = AccrualApi::new(config.accrual.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let srv = create_server_instance(&config)?;

    let shutdown = CancellationToken::new();
    let worker = start_accrual_worker(db.clone(), gateway, config.worker, shutdown.clone());
    let result = srv.await.map_err(|e| ServerError::Unspecified(e.to_string()));

    info!("🚀️ Server stopped. Waiting for the accrual worker to finish.");
    shutdown.cancel();
    if let Err(e) = worker.await {
        error!("🚀️ The accrual worker did not shut down cleanly: {e}");
    }
    db.close().await;
    result
}

pub fn create_server_instance(config: &ServerConfig) -> Result<Server, ServerError> {
    let srv = HttpServer::new(|| {
        App::new().wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("lps::access_log")).service(health)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
