use lps_common::Money;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Account not found: {0}")]
    AccountNotFound(i64),
    #[error("The login '{0}' is already taken")]
    LoginTaken(String),
    #[error("Account #{user_id} does not have enough points to withdraw {requested}")]
    NegativeBalance { user_id: i64, requested: Money },
    #[error("A withdrawal against order {0} has already been made")]
    DuplicateWithdrawal(String),
}
