use lps_common::OrderStatusType;

use crate::{
    db::traits::{InsertOrderResult, LedgerError},
    db_types::{AccrualUpdate, Order},
};

/// The `OrderManagement` trait defines the behaviour for storing orders and applying accrual decisions to them.
#[allow(async_fn_in_trait)]
pub trait OrderManagement: Clone {
    /// Stores a new order with status `NEW` for the given user. Uploading an order that is already present is not an
    /// error; the result says who owns it.
    async fn insert_order(&self, user_id: i64, order_number: &str) -> Result<InsertOrderResult, LedgerError>;

    async fn fetch_order_by_number(&self, order_number: &str) -> Result<Option<Order>, LedgerError>;

    /// All orders uploaded by the user, oldest first.
    async fn fetch_orders_for_account(&self, user_id: i64) -> Result<Vec<Order>, LedgerError>;

    /// All orders whose status is one of `statuses`, oldest first.
    async fn fetch_orders_with_status(&self, statuses: &[OrderStatusType]) -> Result<Vec<Order>, LedgerError>;

    /// Applies a batch of accrual decisions in a single all-or-nothing transaction.
    ///
    /// An update is only applied if the order's stored status may legally move to the new status. Updates that would
    /// not advance the order are skipped without error. Processed orders have their accrual credited to the owner's
    /// balance in the same transaction.
    ///
    /// Returns the orders that were changed.
    async fn apply_accrual_updates(&self, updates: &[AccrualUpdate]) -> Result<Vec<Order>, LedgerError>;
}
