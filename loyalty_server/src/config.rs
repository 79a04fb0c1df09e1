use std::{env, time::Duration};

use accrual_tools::AccrualConfig;
use log::*;
use loyalty_engine::ReconciliationOptions;
use lps_common::Secret;

use crate::errors::ServerError;

const DEFAULT_LPS_HOST: &str = "127.0.0.1";
const DEFAULT_LPS_PORT: u16 = 8360;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/loyalty_store.db";
const DEFAULT_RATE_LIMIT: usize = 2;
const MAX_RATE_LIMIT: usize = 64;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_TICK_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: Secret<String>,
    /// Where and how to reach the accrual service
    pub accrual: AccrualConfig,
    pub worker: AccrualWorkerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_LPS_HOST.to_string(),
            port: DEFAULT_LPS_PORT,
            database_url: Secret::new(DEFAULT_DATABASE_URL.to_string()),
            accrual: AccrualConfig::default(),
            worker: AccrualWorkerConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("LPS_HOST").ok().unwrap_or_else(|| DEFAULT_LPS_HOST.into());
        let port = env::var("LPS_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for LPS_PORT. {e} Using the default, {DEFAULT_LPS_PORT}, instead."
                    );
                    DEFAULT_LPS_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_LPS_PORT);
        let database_url = env::var("LPS_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ LPS_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let accrual = AccrualConfig::new_from_env_or_default();
        let worker = AccrualWorkerConfig::from_env_or_default();
        Self { host, port, database_url: Secret::new(database_url), accrual, worker }
    }
}

/// Settings for the timer-driven accrual worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccrualWorkerConfig {
    /// The maximum number of requests in flight to the accrual service
    pub rate_limit: usize,
    /// Time between the start of consecutive reconciliation runs
    pub poll_interval: Duration,
    /// Time after which a reconciliation run stops waiting for the accrual service
    pub tick_timeout: Duration,
}

impl Default for AccrualWorkerConfig {
    fn default() -> Self {
        Self { rate_limit: DEFAULT_RATE_LIMIT, poll_interval: DEFAULT_POLL_INTERVAL, tick_timeout: DEFAULT_TICK_TIMEOUT }
    }
}

impl AccrualWorkerConfig {
    pub fn new(rate_limit: usize, poll_interval: Duration, tick_timeout: Duration) -> Result<Self, ServerError> {
        if rate_limit == 0 || rate_limit > MAX_RATE_LIMIT {
            return Err(ServerError::ConfigurationError(format!(
                "The accrual rate limit must be between 1 and {MAX_RATE_LIMIT}. Got {rate_limit}"
            )));
        }
        if poll_interval.is_zero() || tick_timeout.is_zero() {
            return Err(ServerError::ConfigurationError(
                "The accrual poll interval and tick timeout must be longer than zero".into(),
            ));
        }
        Ok(Self { rate_limit, poll_interval, tick_timeout })
    }

    pub fn from_env_or_default() -> Self {
        let rate_limit = capped_rate_limit(positive_from_env("LPS_ACCRUAL_RATE_LIMIT", DEFAULT_RATE_LIMIT as u64));
        let poll_interval = positive_from_env("LPS_ACCRUAL_POLL_INTERVAL", DEFAULT_POLL_INTERVAL.as_secs());
        let tick_timeout = positive_from_env("LPS_ACCRUAL_TICK_TIMEOUT", DEFAULT_TICK_TIMEOUT.as_secs());
        let poll_interval = Duration::from_secs(poll_interval);
        let tick_timeout = Duration::from_secs(tick_timeout);
        if tick_timeout > poll_interval {
            warn!(
                "🪛️ LPS_ACCRUAL_TICK_TIMEOUT ({}s) is longer than LPS_ACCRUAL_POLL_INTERVAL ({}s). Runs that take \
                 longer than the interval delay the next one.",
                tick_timeout.as_secs(),
                poll_interval.as_secs()
            );
        }
        Self { rate_limit, poll_interval, tick_timeout }
    }

    pub fn reconciliation_options(&self) -> ReconciliationOptions {
        ReconciliationOptions { rate_limit: self.rate_limit, tick_timeout: self.tick_timeout }
    }
}

fn positive_from_env(name: &str, default: u64) -> u64 {
    match env::var(name) {
        Ok(s) => parse_positive(&s).unwrap_or_else(|| {
            warn!("🪛️ {s} is not a valid value for {name}. Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            debug!("🪛️ {name} is not set. Using the default, {default}.");
            default
        },
    }
}

fn capped_rate_limit(requested: u64) -> usize {
    match usize::try_from(requested) {
        Ok(v) if v <= MAX_RATE_LIMIT => v,
        _ => {
            warn!("🪛️ LPS_ACCRUAL_RATE_LIMIT of {requested} is too high. Using the maximum, {MAX_RATE_LIMIT}, instead.");
            MAX_RATE_LIMIT
        },
    }
}

fn parse_positive(s: &str) -> Option<u64> {
    s.trim().parse::<u64>().ok().filter(|&v| v > 0)
}
