//! Account-facing ledger operations.

use std::fmt::Debug;

use log::debug;
use lps_common::{helpers::is_valid_luhn, Money};

use crate::{
    db::traits::{AccountManagement, InsertOrderResult, LedgerError, OrderManagement},
    db_types::{Balance, Order, UserAccount, Withdrawal},
    lpe_api::errors::AccountApiError,
};

pub struct AccountApi<B> {
    db: B,
}

impl<B: Debug> Debug for AccountApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccountApi ({:?})", self.db)
    }
}

impl<B> AccountApi<B>
where B: AccountManagement + OrderManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Creates an account with a zero balance and returns its id.
    pub async fn create_account(&self, login: &str) -> Result<i64, AccountApiError> {
        let id = self.db.create_account(login).await?;
        Ok(id)
    }

    pub async fn account_by_id(&self, user_id: i64) -> Result<Option<UserAccount>, AccountApiError> {
        let account = self.db.fetch_user_account(user_id).await?;
        Ok(account)
    }

    /// Uploads an order for the user. The order starts out as `NEW` and is picked up by the next reconciliation pass.
    pub async fn register_order(&self, user_id: i64, order_number: &str) -> Result<InsertOrderResult, AccountApiError> {
        let order_number = validated_order_number(order_number)?;
        let result = self.db.insert_order(user_id, order_number).await?;
        debug!("Order {order_number} registered for account #{user_id}: {result:?}");
        Ok(result)
    }

    pub async fn orders_for_account(&self, user_id: i64) -> Result<Vec<Order>, AccountApiError> {
        let orders = self.db.fetch_orders_for_account(user_id).await?;
        Ok(orders)
    }

    pub async fn balance(&self, user_id: i64) -> Result<Balance, AccountApiError> {
        let balance = self.db.fetch_balance(user_id).await?.ok_or(LedgerError::AccountNotFound(user_id))?;
        Ok(balance)
    }

    pub async fn withdrawals(&self, user_id: i64) -> Result<Vec<Withdrawal>, AccountApiError> {
        let withdrawals = self.db.fetch_withdrawals(user_id).await?;
        Ok(withdrawals)
    }

    /// Spends `sum` points against `order_number` and returns the new balance.
    pub async fn withdraw(&self, user_id: i64, order_number: &str, sum: Money) -> Result<Balance, AccountApiError> {
        let order_number = validated_order_number(order_number)?;
        if !sum.is_positive() {
            return Err(AccountApiError::InvalidAmount);
        }
        let balance = self.db.withdraw(user_id, order_number, sum).await?;
        Ok(balance)
    }
}

fn validated_order_number(order_number: &str) -> Result<&str, AccountApiError> {
    let trimmed = order_number.trim();
    if is_valid_luhn(trimmed) {
        Ok(trimmed)
    } else {
        Err(AccountApiError::InvalidOrderNumber(order_number.to_string()))
    }
}
