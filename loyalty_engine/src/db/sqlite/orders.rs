use log::{debug, trace};
use lps_common::{Money, OrderStatusType};
use sqlx::{QueryBuilder, SqliteConnection};

use super::{balances, is_foreign_key_violation, SqliteDatabaseError};
use crate::{
    db::traits::InsertOrderResult,
    db_types::{AccrualUpdate, Order},
};

const ORDER_COLUMNS: &str = "id, user_id, order_number, status, accrual, uploaded_at, updated_at";

/// Stores the order for the user, unless the order number is already known.
///
/// The insert and the ownership check happen in a single statement followed by a read, so two users racing to upload
/// the same number cannot both succeed.
pub async fn idempotent_insert(
    user_id: i64,
    order_number: &str,
    conn: &mut SqliteConnection,
) -> Result<InsertOrderResult, SqliteDatabaseError> {
    // Outside a transaction, the insert only commits once the statement has run to completion, so drive it with
    // fetch_all rather than stopping at the first row
    let inserted: Vec<i64> = sqlx::query_scalar(
        r#"
            INSERT INTO orders (order_number, user_id) VALUES ($1, $2)
            ON CONFLICT (order_number) DO NOTHING
            RETURNING id;
        "#,
    )
    .bind(order_number)
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| match e {
        e if is_foreign_key_violation(&e) => SqliteDatabaseError::AccountNotFound(user_id),
        e => e.into(),
    })?;
    if let Some(&id) = inserted.first() {
        debug!("🗃️ Order {order_number} uploaded by #{user_id} stored with id {id}");
        return Ok(InsertOrderResult::Inserted(id));
    }
    let existing = fetch_order_by_number(order_number, conn).await?;
    let result = match existing {
        Some(order) if order.user_id == user_id => InsertOrderResult::AlreadyUploadedByUser(order.id),
        Some(_) => InsertOrderResult::UploadedByAnotherUser,
        // Only reachable if the row was deleted between the two statements
        None => return Err(SqliteDatabaseError::DriverError(sqlx::Error::RowNotFound)),
    };
    trace!("🗃️ Order {order_number} was already uploaded: {result:?}");
    Ok(result)
}

pub async fn fetch_order_by_number(
    order_number: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, SqliteDatabaseError> {
    let order = sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = $1"))
        .bind(order_number)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

#[derive(Debug, Clone, Default)]
pub struct OrderQueryFilter {
    user_id: Option<i64>,
    statuses: Vec<OrderStatusType>,
}

impl OrderQueryFilter {
    pub fn with_user_id(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_statuses(mut self, statuses: &[OrderStatusType]) -> Self {
        self.statuses.extend_from_slice(statuses);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.user_id.is_none() && self.statuses.is_empty()
    }
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`
///
/// Resulting orders are ordered by `uploaded_at` in ascending order
pub async fn fetch_orders(
    query: OrderQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, SqliteDatabaseError> {
    let mut builder = QueryBuilder::new(format!("SELECT {ORDER_COLUMNS} FROM orders "));
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(id) = query.user_id {
        where_clause.push("user_id = ");
        where_clause.push_bind_unseparated(id);
    }
    if !query.statuses.is_empty() {
        where_clause.push("status IN (");
        for (i, status) in query.statuses.into_iter().enumerate() {
            if i > 0 {
                where_clause.push_unseparated(", ");
            }
            where_clause.push_bind_unseparated(status);
        }
        where_clause.push_unseparated(")");
    }
    builder.push(" ORDER BY uploaded_at ASC, id ASC");
    trace!("🗃️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    trace!("🗃️ Result of fetch_orders: {} orders", orders.len());
    Ok(orders)
}

/// Moves the order to the status in `update`, provided its stored status is one of the predecessors of the new status.
/// When the new status is `PROCESSED`, the accrual is credited to the owner's balance.
///
/// Returns the updated order, or `None` if the order could not legally be moved. This is not atomic. Call it inside a
/// transaction and pass `&mut *tx` as the connection argument.
pub async fn apply_accrual(
    update: &AccrualUpdate,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, SqliteDatabaseError> {
    let predecessors = update.status.predecessors();
    if predecessors.is_empty() {
        return Ok(None);
    }
    let accrual = if update.status == OrderStatusType::Processed { update.accrual } else { Money::ZERO };
    let mut builder = QueryBuilder::new("UPDATE orders SET updated_at = CURRENT_TIMESTAMP, status = ");
    builder.push_bind(update.status);
    builder.push(", accrual = ");
    builder.push_bind(accrual);
    builder.push(" WHERE order_number = ");
    builder.push_bind(update.order_number.as_str());
    builder.push(" AND status IN (");
    let mut statuses = builder.separated(", ");
    for status in predecessors {
        statuses.push_bind(*status);
    }
    builder.push(format!(") RETURNING {ORDER_COLUMNS}"));
    trace!("🗃️ Executing query: {}", builder.sql());
    let updated = builder.build_query_as::<Order>().fetch_all(&mut *conn).await?;
    let Some(order) = updated.into_iter().next() else {
        trace!("🗃️ Order {} cannot move to {}. Skipping.", update.order_number, update.status);
        return Ok(None);
    };
    if update.status == OrderStatusType::Processed && accrual.is_positive() {
        balances::credit(order.user_id, accrual, conn).await?;
        debug!("🗃️ Order {} processed. {accrual} credited to account #{}", order.order_number, order.user_id);
    } else {
        debug!("🗃️ Order {} moved to {}", order.order_number, order.status);
    }
    Ok(Some(order))
}
