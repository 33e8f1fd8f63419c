//! Database configuration module.
//!
//! This module handles the database connection and table creation using `SeaORM`.
//! The `operations` table is generated from the entity definition with
//! `Schema::create_table_from_entity`; the composite unique index that keeps one
//! instance per template and due date is added on top of it. Both statements are
//! idempotent so the binary can run them on every start.

use crate::entities::{Operation, operation};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema, sea_query::Index};
use tracing::debug;

const DEFAULT_DATABASE_URL: &str = "sqlite://data/finuch.sqlite?mode=rwc";

/// Name of the index enforcing one instance per (template, date).
pub const PARENT_DATE_INDEX: &str = "idx_operations_parent_date";

/// Gets the database URL from the `DATABASE_URL` environment variable, falling back
/// to a local `SQLite` file.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the database named by [`get_database_url`].
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    debug!("Connecting to {}", database_url);

    Database::connect(&database_url).await.map_err(Into::into)
}

/// Creates the `operations` table and its (template, date) unique index if missing.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut operation_table = schema.create_table_from_entity(Operation);
    operation_table.if_not_exists();

    let parent_date_index = Index::create()
        .name(PARENT_DATE_INDEX)
        .table(Operation)
        .col(operation::Column::RecurrenceParentId)
        .col(operation::Column::OperationDate)
        .unique()
        .if_not_exists()
        .to_owned();

    db.execute(builder.build(&operation_table)).await?;
    db.execute(builder.build(&parent_date_index)).await?;

    Ok(())
}
