use std::fmt::Debug;

use log::*;
use lps_common::{Money, OrderStatusType};
use sqlx::SqlitePool;

use super::{balances, db_url, new_pool, orders, user_accounts, withdrawals, SqliteDatabaseError};
use crate::{
    db::{
        sqlite::orders::OrderQueryFilter,
        traits::{AccountManagement, InsertOrderResult, LedgerError, OrderManagement},
    },
    db_types::{AccrualUpdate, Balance, Order, UserAccount, Withdrawal},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in `LPS_DATABASE_URL`, or the default location.
    pub async fn new(max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    /// Creates a new database API object. The database file is created if it does not exist.
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let pool = new_pool(url, max_connections).await?;
        trace!("🗃️ Opened connection pool for {url}");
        Ok(Self { url: url.to_string(), pool })
    }

    /// Brings the schema up to date.
    pub async fn run_migrations(&self) -> Result<(), SqliteDatabaseError> {
        sqlx::migrate!("./src/db/sqlite/migrations").run(&self.pool).await?;
        debug!("🗃️ Database migrations are up to date");
        Ok(())
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("🗃️ Database connection pool closed");
    }

    pub async fn fetch_user_account_by_login(&self, login: &str) -> Result<Option<UserAccount>, SqliteDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        user_accounts::user_account_by_login(login, &mut conn).await
    }
}

impl OrderManagement for SqliteDatabase {
    async fn insert_order(&self, user_id: i64, order_number: &str) -> Result<InsertOrderResult, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let result = orders::idempotent_insert(user_id, order_number, &mut conn).await?;
        Ok(result)
    }

    async fn fetch_order_by_number(&self, order_number: &str) -> Result<Option<Order>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_number(order_number, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_orders_for_account(&self, user_id: i64) -> Result<Vec<Order>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let query = OrderQueryFilter::default().with_user_id(user_id);
        let orders = orders::fetch_orders(query, &mut conn).await?;
        Ok(orders)
    }

    async fn fetch_orders_with_status(&self, statuses: &[OrderStatusType]) -> Result<Vec<Order>, LedgerError> {
        if statuses.is_empty() {
            return Ok(vec![]);
        }
        let mut conn = self.pool.acquire().await?;
        let query = OrderQueryFilter::default().with_statuses(statuses);
        let orders = orders::fetch_orders(query, &mut conn).await?;
        Ok(orders)
    }

    /// Any failure rolls back every update in the batch, so no order is left with a new status but without its
    /// balance credit.
    async fn apply_accrual_updates(&self, updates: &[AccrualUpdate]) -> Result<Vec<Order>, LedgerError> {
        if updates.is_empty() {
            return Ok(vec![]);
        }
        let mut tx = self.pool.begin().await?;
        let mut changed = Vec::with_capacity(updates.len());
        for update in updates {
            if let Some(order) = orders::apply_accrual(update, &mut tx).await? {
                changed.push(order);
            }
        }
        tx.commit().await?;
        debug!("🗃️ Committed {} of {} accrual updates", changed.len(), updates.len());
        Ok(changed)
    }
}

impl AccountManagement for SqliteDatabase {
    async fn create_account(&self, login: &str) -> Result<i64, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let id = user_accounts::create_account(login, &mut tx).await?;
        tx.commit().await?;
        Ok(id)
    }

    async fn fetch_user_account(&self, user_id: i64) -> Result<Option<UserAccount>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let account = user_accounts::user_account_by_id(user_id, &mut conn).await?;
        Ok(account)
    }

    async fn fetch_balance(&self, user_id: i64) -> Result<Option<Balance>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let balance = balances::fetch_balance(user_id, &mut conn).await?;
        Ok(balance)
    }

    async fn fetch_withdrawals(&self, user_id: i64) -> Result<Vec<Withdrawal>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let withdrawals = withdrawals::fetch_withdrawals_for_user(user_id, &mut conn).await?;
        Ok(withdrawals)
    }

    async fn withdraw(&self, user_id: i64, order_number: &str, sum: Money) -> Result<Balance, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let balance = balances::debit(user_id, sum, &mut tx)
            .await?
            .ok_or_else(|| SqliteDatabaseError::AccountNotFound(user_id))?;
        if balance.current.is_negative() {
            tx.rollback().await?;
            debug!("🗃️ Account #{user_id} cannot cover a withdrawal of {sum}. Rolled back.");
            return Err(SqliteDatabaseError::NegativeBalance { user_id, requested: sum }.into());
        }
        // Dropping the transaction on error rolls the debit back
        withdrawals::insert_withdrawal(user_id, order_number, sum, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Account #{user_id} withdrew {sum} against order {order_number}. {} remaining", balance.current);
        Ok(balance)
    }
}
