use accrual_tools::AccrualGateway;
use log::*;
use loyalty_engine::{db_types::Order, ReconciliationApi, SqliteDatabase};
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::AccrualWorkerConfig;

/// Starts the accrual worker, which reconciles unresolved orders with the accrual service every `poll_interval`.
///
/// Runs never overlap. A run that overshoots the interval delays the next one instead of causing a burst. The worker
/// exits once `shutdown` is cancelled, abandoning the run in progress, so await the returned handle only after
/// cancelling.
pub fn start_accrual_worker<G: AccrualGateway>(
    db: SqliteDatabase,
    gateway: G,
    config: AccrualWorkerConfig,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(config.poll_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let api = ReconciliationApi::new(db, gateway, config.reconciliation_options());
        info!(
            "🕰️ Accrual worker started. Polling every {:?} with up to {} concurrent requests",
            config.poll_interval, config.rate_limit
        );
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = timer.tick() => {},
            }
            trace!("🕰️ Running accrual reconciliation job");
            match api.reconcile_non_terminal_orders(&shutdown).await {
                Ok(result) if result.shutdown => {
                    info!("🕰️ Accrual reconciliation interrupted by shutdown");
                    break;
                },
                Ok(result) if result.fetched == 0 => {},
                Ok(result) => {
                    info!("🕰️ {} of {} orders settled or advanced", result.committed_count(), result.fetched);
                    debug!("🕰️ Updated orders: {}", order_list(&result.committed));
                },
                Err(e) => {
                    error!("🕰️ Error running accrual reconciliation job: {e}");
                },
            }
        }
        info!("🕰️ Accrual worker stopped");
    })
}

fn order_list(orders: &[Order]) -> String {
    orders
        .iter()
        .map(|o| format!("[{}] {} {} ({})", o.id, o.order_number, o.status, o.accrual))
        .collect::<Vec<String>>()
        .join(", ")
}
