use std::time::Duration;

use log::*;

const DEFAULT_ACCRUAL_ADDRESS: &str = "localhost:8081";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct AccrualConfig {
    /// The address of the accrual service, e.g. "localhost:8081" or "https://accrual.example.com". Addresses without
    /// a scheme are assumed to be plain http.
    pub address: String,
    /// Upper bound on the duration of a single lookup, including connecting and reading the body.
    pub request_timeout: Duration,
}

impl Default for AccrualConfig {
    fn default() -> Self {
        Self { address: DEFAULT_ACCRUAL_ADDRESS.to_string(), request_timeout: DEFAULT_REQUEST_TIMEOUT }
    }
}

impl AccrualConfig {
    pub fn new<S: Into<String>>(address: S) -> Self {
        Self { address: address.into(), ..Default::default() }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn new_from_env_or_default() -> Self {
        let address = std::env::var("LPS_ACCRUAL_SYSTEM_ADDRESS").unwrap_or_else(|_| {
            warn!("📡️ LPS_ACCRUAL_SYSTEM_ADDRESS not set, using {DEFAULT_ACCRUAL_ADDRESS} as default");
            DEFAULT_ACCRUAL_ADDRESS.to_string()
        });
        let request_timeout = std::env::var("LPS_ACCRUAL_REQUEST_TIMEOUT")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .ok()
                    .filter(|&secs| secs > 0)
                    .or_else(|| {
                        warn!("📡️ Invalid value for LPS_ACCRUAL_REQUEST_TIMEOUT ({s}). Using the default.");
                        None
                    })
            })
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);
        Self { address, request_timeout }
    }

    /// The normalised base url of the accrual service, without a trailing slash.
    pub fn base_url(&self) -> String {
        let address = self.address.trim().trim_end_matches('/');
        if address.contains("://") {
            address.to_string()
        } else {
            format!("http://{address}")
        }
    }
}
