use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT},
    Client,
    Response,
    StatusCode,
};

use crate::{AccrualApiError, AccrualConfig, AccrualOutcome, AccrualResponse, ResolvedAccrual};

/// HTTP client for the accrual service. Cloning is cheap; all clones share the same connection pool.
#[derive(Clone)]
pub struct AccrualApi {
    base_url: String,
    client: Arc<Client>,
}

impl AccrualApi {
    pub fn new(config: AccrualConfig) -> Result<Self, AccrualApiError> {
        let mut headers = HeaderMap::with_capacity(1);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AccrualApiError::Initialization(e.to_string()))?;
        let base_url = config.base_url();
        debug!("📡️ Accrual client configured for {base_url}");
        Ok(Self { base_url, client: Arc::new(client) })
    }

    pub fn url(&self, order_number: &str) -> String {
        format!("{}/api/orders/{order_number}", self.base_url)
    }

    /// Asks the accrual service about a single order. This never retries; a failed lookup is reported as
    /// [`AccrualOutcome::TransportError`] and it is up to the caller to ask again later.
    pub async fn fetch_order_accrual(&self, order_number: &str) -> AccrualOutcome {
        let url = self.url(order_number);
        trace!("📡️ GET {url}");
        match self.client.get(url).send().await {
            Ok(response) => classify_response(order_number, response).await,
            Err(e) => {
                debug!("📡️ Accrual lookup for order {order_number} failed. {e}");
                AccrualOutcome::TransportError(AccrualApiError::Transport(e.to_string()))
            },
        }
    }
}

async fn classify_response(order_number: &str, response: Response) -> AccrualOutcome {
    match response.status() {
        StatusCode::OK => {
            let body = match response.bytes().await {
                Ok(body) => body,
                Err(e) => return AccrualOutcome::TransportError(AccrualApiError::Transport(e.to_string())),
            };
            match serde_json::from_slice::<AccrualResponse>(&body) {
                Ok(accrual) => validate_response(order_number, accrual),
                Err(e) => AccrualOutcome::TransportError(AccrualApiError::Decode(e.to_string())),
            }
        },
        StatusCode::NO_CONTENT => AccrualOutcome::NotYetRegistered,
        StatusCode::TOO_MANY_REQUESTS => {
            if let Some(retry_after) = response.headers().get("Retry-After").and_then(|v| v.to_str().ok()) {
                debug!("📡️ Accrual service is rate limiting us. Retry-After: {retry_after}");
            }
            AccrualOutcome::RateLimited
        },
        status => AccrualOutcome::TransportError(AccrualApiError::UnexpectedStatus(status.as_u16())),
    }
}

fn validate_response(order_number: &str, response: AccrualResponse) -> AccrualOutcome {
    if response.order != order_number {
        return AccrualOutcome::TransportError(AccrualApiError::OrderMismatch {
            expected: order_number.to_string(),
            received: response.order,
        });
    }
    if response.accrual.is_negative() {
        return AccrualOutcome::TransportError(AccrualApiError::NegativeAccrual {
            order_number: response.order,
            accrual: response.accrual.to_string(),
        });
    }
    trace!("📡️ Order {order_number} is {:?} with accrual {}", response.status, response.accrual);
    AccrualOutcome::Resolved(ResolvedAccrual::from(response))
}
