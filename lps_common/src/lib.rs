mod money;
mod order_status;

pub mod helpers;
pub mod op;
mod secret;

pub use money::{Money, MoneyConversionError};
pub use order_status::{OrderStatusConversionError, OrderStatusType, NON_TERMINAL_STATUSES};
pub use secret::Secret;
