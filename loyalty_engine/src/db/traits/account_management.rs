use lps_common::Money;

use crate::{
    db::traits::LedgerError,
    db_types::{Balance, UserAccount, Withdrawal},
};

/// Methods for creating user accounts and for reading and spending their balances.
#[allow(async_fn_in_trait)]
pub trait AccountManagement: Clone {
    /// Creates a new account along with a zeroed balance. Returns the account id.
    async fn create_account(&self, login: &str) -> Result<i64, LedgerError>;

    async fn fetch_user_account(&self, user_id: i64) -> Result<Option<UserAccount>, LedgerError>;

    async fn fetch_balance(&self, user_id: i64) -> Result<Option<Balance>, LedgerError>;

    /// The user's withdrawals, oldest first.
    async fn fetch_withdrawals(&self, user_id: i64) -> Result<Vec<Withdrawal>, LedgerError>;

    /// Spends `sum` points of the user's balance against `order_number`.
    ///
    /// The debit and the withdrawal record are written in one transaction. If the balance would go negative, nothing
    /// is written and [`LedgerError::NegativeBalance`] is returned. Returns the balance after the withdrawal.
    async fn withdraw(&self, user_id: i64, order_number: &str, sum: Money) -> Result<Balance, LedgerError>;
}
