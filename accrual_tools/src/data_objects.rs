use lps_common::{Money, OrderStatusType};
use serde::{Deserialize, Deserializer, Serialize};

use crate::AccrualApiError;

/// The status vocabulary of the accrual service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccrualStatus {
    Registered,
    Processing,
    Invalid,
    Processed,
    /// Anything the service might add in the future. Treated as a refusal.
    #[serde(other)]
    Unknown,
}

impl From<AccrualStatus> for OrderStatusType {
    fn from(status: AccrualStatus) -> Self {
        match status {
            AccrualStatus::Registered => OrderStatusType::New,
            AccrualStatus::Processing => OrderStatusType::Processing,
            AccrualStatus::Processed => OrderStatusType::Processed,
            AccrualStatus::Invalid | AccrualStatus::Unknown => OrderStatusType::Invalid,
        }
    }
}

/// The body of a `200 OK` response from `GET /api/orders/{number}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccrualResponse {
    pub order: String,
    pub status: AccrualStatus,
    /// Only present once the order is processed. An explicit `null` counts as zero.
    #[serde(default, deserialize_with = "null_as_zero")]
    pub accrual: Money,
}

fn null_as_zero<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Money, D::Error> {
    Ok(Option::<Money>::deserialize(deserializer)?.unwrap_or_default())
}

/// A decision from the accrual service, already translated into our own status vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAccrual {
    pub order_number: String,
    pub status: OrderStatusType,
    pub accrual: Money,
}

impl From<AccrualResponse> for ResolvedAccrual {
    fn from(response: AccrualResponse) -> Self {
        Self { order_number: response.order, status: response.status.into(), accrual: response.accrual }
    }
}

/// The result of a single lookup against the accrual service.
#[derive(Debug, Clone)]
pub enum AccrualOutcome {
    /// The service has an answer for the order. The answer may still be non-terminal.
    Resolved(ResolvedAccrual),
    /// `204 No Content`: the service does not know the order (yet).
    NotYetRegistered,
    /// `429 Too Many Requests`: back off and ask again later.
    RateLimited,
    /// Network failures, undecodable bodies and unexpected status codes.
    TransportError(AccrualApiError),
}
