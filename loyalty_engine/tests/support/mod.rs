#![allow(dead_code)]
use std::env;

use log::*;
use loyalty_engine::{db_types::AccrualUpdate, AccountApi, OrderManagement, SqliteDatabase};
use lps_common::{Money, OrderStatusType};
use sqlx::{migrate::MigrateDatabase, Sqlite};

/// Valid (Luhn-checked) order numbers for use in tests
pub const ORDER_NUMBERS: [&str; 16] = [
    "10001006", "10001014", "10001022", "10001030", "10001048", "10001055", "10001063", "10001071", "10001089",
    "10001097", "10001105", "10001113", "10001121", "10001139", "10001147", "10001154",
];

/// Creates a fresh, migrated database in the temp directory. Each call returns a separate database, so tests can run
/// in parallel.
pub async fn prepare_test_env() -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    let url = random_db_url();
    Sqlite::create_database(&url).await.expect("Error creating database");
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
    db.run_migrations().await.expect("Error running DB migrations");
    debug!("🚀 Created test database at {url}");
    db
}

pub fn random_db_url() -> String {
    let path = env::temp_dir().join(format!("lps_test_{:016x}.db", rand::random::<u64>()));
    format!("sqlite://{}", path.display())
}

pub fn processed(order_number: &str, user_id: i64, hundredths: i64) -> AccrualUpdate {
    AccrualUpdate {
        order_number: order_number.to_string(),
        user_id,
        status: OrderStatusType::Processed,
        accrual: Money::from_hundredths(hundredths),
    }
}

/// Creates an account whose balance has been credited with `hundredths` through a processed order.
pub async fn account_with_points(db: &SqliteDatabase, login: &str, order_number: &str, hundredths: i64) -> i64 {
    let api = AccountApi::new(db.clone());
    let user_id = api.create_account(login).await.expect("Error creating account");
    api.register_order(user_id, order_number).await.expect("Error registering order");
    let changed = db.apply_accrual_updates(&[processed(order_number, user_id, hundredths)]).await.unwrap();
    assert_eq!(changed.len(), 1);
    user_id
}
