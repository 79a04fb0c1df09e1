use log::trace;
use lps_common::Money;
use sqlx::SqliteConnection;

use super::SqliteDatabaseError;
use crate::db_types::Balance;

/// Creates the zeroed balance row that goes with every new account.
pub async fn create_balance(user_id: i64, conn: &mut SqliteConnection) -> Result<(), SqliteDatabaseError> {
    sqlx::query("INSERT INTO balances (user_id) VALUES ($1)").bind(user_id).execute(conn).await?;
    Ok(())
}

pub async fn fetch_balance(user_id: i64, conn: &mut SqliteConnection) -> Result<Option<Balance>, SqliteDatabaseError> {
    let balance =
        sqlx::query_as("SELECT user_id, current, withdrawn FROM balances WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(conn)
            .await?;
    Ok(balance)
}

pub async fn credit(user_id: i64, amount: Money, conn: &mut SqliteConnection) -> Result<(), SqliteDatabaseError> {
    let result = sqlx::query(
        "UPDATE balances SET current = current + $1, updated_at = CURRENT_TIMESTAMP WHERE user_id = $2",
    )
    .bind(amount)
    .bind(user_id)
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(SqliteDatabaseError::AccountNotFound(user_id));
    }
    trace!("🗃️ Credited {amount} to account #{user_id}");
    Ok(())
}

/// Moves `amount` from `current` to `withdrawn` and returns the resulting balance, which may be negative. The caller
/// decides whether to commit.
///
/// Because the first statement of the transaction is a write, SQLite takes the write lock here, so concurrent
/// withdrawals for the same account see each other's results.
pub async fn debit(
    user_id: i64,
    amount: Money,
    conn: &mut SqliteConnection,
) -> Result<Option<Balance>, SqliteDatabaseError> {
    let balances: Vec<Balance> = sqlx::query_as(
        r#"
            UPDATE balances
            SET withdrawn = withdrawn + $1, current = current - $1, updated_at = CURRENT_TIMESTAMP
            WHERE user_id = $2
            RETURNING user_id, current, withdrawn;
        "#,
    )
    .bind(amount)
    .bind(user_id)
    .fetch_all(conn)
    .await?;
    Ok(balances.into_iter().next())
}
