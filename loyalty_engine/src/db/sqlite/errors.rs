use lps_common::Money;
use thiserror::Error;

use crate::db::traits::LedgerError;

#[derive(Debug, Error)]
pub enum SqliteDatabaseError {
    #[error("Database connection error: {0}")]
    DriverError(#[from] sqlx::Error),
    #[error("Could not run database migrations: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),
    #[error("Account not found: {0}")]
    AccountNotFound(i64),
    #[error("The login '{0}' is already taken")]
    LoginTaken(String),
    #[error("Account #{user_id} cannot cover a withdrawal of {requested}")]
    NegativeBalance { user_id: i64, requested: Money },
    #[error("Cannot process duplicate withdrawal for order {0}")]
    DuplicateWithdrawal(String),
}

impl From<SqliteDatabaseError> for LedgerError {
    fn from(e: SqliteDatabaseError) -> Self {
        match e {
            SqliteDatabaseError::AccountNotFound(id) => LedgerError::AccountNotFound(id),
            SqliteDatabaseError::LoginTaken(login) => LedgerError::LoginTaken(login),
            SqliteDatabaseError::NegativeBalance { user_id, requested } => {
                LedgerError::NegativeBalance { user_id, requested }
            },
            SqliteDatabaseError::DuplicateWithdrawal(order) => LedgerError::DuplicateWithdrawal(order),
            e => LedgerError::DatabaseError(e.to_string()),
        }
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        SqliteDatabaseError::from(e).into()
    }
}
