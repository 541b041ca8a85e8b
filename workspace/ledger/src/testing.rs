//! Shared fixtures for the engine's unit tests: an in-memory SQLite
//! database with migrations applied and one seeded user, account, and
//! category.

use migration::{Migrator, MigratorTrait};
use model::entities::{account, category, user};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Database, DatabaseConnection, Set};

/// Ids of the seeded rows.
pub struct Fixture {
    pub user_id: i32,
    pub account_id: i32,
    pub category_id: i32,
}

pub async fn setup() -> (DatabaseConnection, Fixture) {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory database");
    db.execute_unprepared("PRAGMA foreign_keys = ON;")
        .await
        .expect("Failed to enable foreign keys");
    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    let user = user::ActiveModel {
        username: Set("tester".to_string()),
        currency_code: Set("USD".to_string()),
        ..Default::default()
    }
    .insert(&db)
    .await
    .expect("Failed to seed user");

    let account = seed_account(&db, user.id, "Checking").await;

    let category = category::ActiveModel {
        user_id: Set(user.id),
        name: Set("Groceries".to_string()),
        ..Default::default()
    }
    .insert(&db)
    .await
    .expect("Failed to seed category");

    (
        db,
        Fixture {
            user_id: user.id,
            account_id: account,
            category_id: category.id,
        },
    )
}

/// Adds another zero-balance account for the fixture user.
pub async fn seed_account(db: &DatabaseConnection, user_id: i32, name: &str) -> i32 {
    account::ActiveModel {
        user_id: Set(user_id),
        name: Set(name.to_string()),
        institution: Set(None),
        kind: Set(account::AccountKind::Checking),
        currency_code: Set("USD".to_string()),
        balance: Set(Decimal::ZERO),
        is_active: Set(true),
        is_manual: Set(true),
        last_synced_at: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to seed account")
    .id
}
