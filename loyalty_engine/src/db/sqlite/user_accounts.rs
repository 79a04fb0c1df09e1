use log::debug;
use sqlx::SqliteConnection;

use super::{balances, is_unique_violation, SqliteDatabaseError};
use crate::db_types::UserAccount;

/// Creates the account and its balance row. This is not atomic. Call it inside a transaction.
pub async fn create_account(login: &str, conn: &mut SqliteConnection) -> Result<i64, SqliteDatabaseError> {
    let id: i64 = sqlx::query_scalar("INSERT INTO user_accounts (login) VALUES ($1) RETURNING id")
        .bind(login)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| match e {
            e if is_unique_violation(&e) => SqliteDatabaseError::LoginTaken(login.to_string()),
            e => e.into(),
        })?;
    balances::create_balance(id, conn).await?;
    debug!("🗃️ Created account #{id} for '{login}'");
    Ok(id)
}

pub async fn user_account_by_id(
    user_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<UserAccount>, SqliteDatabaseError> {
    let account = sqlx::query_as("SELECT id, login, created_at FROM user_accounts WHERE id = $1")
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
    Ok(account)
}

pub async fn user_account_by_login(
    login: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<UserAccount>, SqliteDatabaseError> {
    let account = sqlx::query_as("SELECT id, login, created_at FROM user_accounts WHERE login = $1")
        .bind(login)
        .fetch_optional(conn)
        .await?;
    Ok(account)
}
