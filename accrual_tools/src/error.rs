use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AccrualApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Request to the accrual service failed: {0}")]
    Transport(String),
    #[error("Could not deserialize accrual response: {0}")]
    Decode(String),
    #[error("Accrual service responded with unexpected status {0}")]
    UnexpectedStatus(u16),
    #[error("Asked about order {expected}, but the accrual service answered for order {received}")]
    OrderMismatch { expected: String, received: String },
    #[error("Accrual service granted a negative accrual ({accrual}) for order {order_number}")]
    NegativeAccrual { order_number: String, accrual: String },
}
