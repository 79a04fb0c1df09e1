use lps_common::Money;
use sqlx::SqliteConnection;

use super::{is_unique_violation, SqliteDatabaseError};
use crate::db_types::Withdrawal;

pub async fn insert_withdrawal(
    user_id: i64,
    order_number: &str,
    sum: Money,
    conn: &mut SqliteConnection,
) -> Result<i64, SqliteDatabaseError> {
    sqlx::query_scalar("INSERT INTO withdrawals (user_id, order_number, sum) VALUES ($1, $2, $3) RETURNING id")
        .bind(user_id)
        .bind(order_number)
        .bind(sum)
        .fetch_one(conn)
        .await
        .map_err(|e| match e {
            e if is_unique_violation(&e) => SqliteDatabaseError::DuplicateWithdrawal(order_number.to_string()),
            e => e.into(),
        })
}

pub async fn fetch_withdrawals_for_user(
    user_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Withdrawal>, SqliteDatabaseError> {
    let withdrawals = sqlx::query_as(
        r#"
            SELECT id, user_id, order_number, sum, processed_at
            FROM withdrawals
            WHERE user_id = $1
            ORDER BY processed_at ASC, id ASC;
        "#,
    )
    .bind(user_id)
    .fetch_all(conn)
    .await?;
    Ok(withdrawals)
}
