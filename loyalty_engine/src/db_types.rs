use chrono::{DateTime, Utc};
use lps_common::{Money, OrderStatusType};
use sqlx::FromRow;

//--------------------------------------     UserAccount       ---------------------------------------------------------
#[derive(Debug, Clone, FromRow)]
pub struct UserAccount {
    pub id: i64,
    pub login: String,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------        Balance        ---------------------------------------------------------
/// The spendable (`current`) and lifetime withdrawn amounts of a user. Both are never negative after a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct Balance {
    pub user_id: i64,
    pub current: Money,
    pub withdrawn: Money,
}

//--------------------------------------         Order         ---------------------------------------------------------
#[derive(Debug, Clone, FromRow)]
pub struct Order {
    pub id: i64,
    /// The account that uploaded the order
    pub user_id: i64,
    /// The order number as supplied by the user. Unique across all users.
    pub order_number: String,
    pub status: OrderStatusType,
    /// Zero until the order is processed
    pub accrual: Money,
    pub uploaded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------      Withdrawal       ---------------------------------------------------------
#[derive(Debug, Clone, FromRow)]
pub struct Withdrawal {
    pub id: i64,
    pub user_id: i64,
    /// The order the points were spent on
    pub order_number: String,
    pub sum: Money,
    pub processed_at: DateTime<Utc>,
}

//--------------------------------------     AccrualUpdate     ---------------------------------------------------------
/// A status change for an order, as decided by the accrual service.
///
/// `accrual` is credited to the owner's balance when `status` is [`OrderStatusType::Processed`] and must be zero
/// otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccrualUpdate {
    pub order_number: String,
    pub user_id: i64,
    pub status: OrderStatusType,
    pub accrual: Money,
}
