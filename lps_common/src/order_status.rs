use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
/// The lifecycle of an order, as seen by the loyalty system.
///
/// `New -> Processing -> {Processed, Invalid}`. The two last states are terminal: once an order is there, its status
/// and accrual never change again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatusType {
    /// The order has been uploaded, but the accrual service has not started working on it.
    New,
    /// The accrual service is calculating the reward.
    Processing,
    /// The accrual service refused to grant a reward for this order.
    Invalid,
    /// The reward has been calculated and credited.
    Processed,
}

/// The statuses that the reconciliation loop keeps polling for.
pub const NON_TERMINAL_STATUSES: [OrderStatusType; 2] = [OrderStatusType::New, OrderStatusType::Processing];

impl OrderStatusType {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Invalid | Self::Processed)
    }

    fn rank(&self) -> u8 {
        match self {
            Self::New => 0,
            Self::Processing => 1,
            Self::Invalid | Self::Processed => 2,
        }
    }

    /// Transitions only ever move forward. Staying put is not a transition.
    pub fn can_transition_to(&self, next: OrderStatusType) -> bool {
        next.rank() > self.rank()
    }

    /// All the statuses an order may be in for it to move to `self`.
    pub fn predecessors(&self) -> &'static [OrderStatusType] {
        match self {
            Self::New => &[],
            Self::Processing => &[Self::New],
            Self::Invalid | Self::Processed => &NON_TERMINAL_STATUSES,
        }
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::New => write!(f, "NEW"),
            Self::Processing => write!(f, "PROCESSING"),
            Self::Invalid => write!(f, "INVALID"),
            Self::Processed => write!(f, "PROCESSED"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid order status: {0}")]
pub struct OrderStatusConversionError(String);

impl FromStr for OrderStatusType {
    type Err = OrderStatusConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(Self::New),
            "PROCESSING" => Ok(Self::Processing),
            "INVALID" => Ok(Self::Invalid),
            "PROCESSED" => Ok(Self::Processed),
            s => Err(OrderStatusConversionError(s.to_string())),
        }
    }
}
