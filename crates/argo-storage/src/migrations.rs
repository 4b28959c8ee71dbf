//! Database schema migrations.
//!
//! Applies the initial schema: users, conversations, objects, and the
//! schema_migrations bookkeeping table.

use rusqlite::Connection;
use tracing::info;

use argo_core::error::ArgoError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), ArgoError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| ArgoError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| ArgoError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: initial_schema");
    }

    Ok(())
}

/// Version 1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<(), ArgoError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id                  TEXT PRIMARY KEY NOT NULL,
            email               TEXT NOT NULL UNIQUE,
            name                TEXT,
            bank_access_token   TEXT,
            bank_item_id        TEXT,
            api_token_hash      TEXT UNIQUE,
            created_at          INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );

        -- Keyed by (user_id, conversation_id) so every lookup is owner-scoped.
        CREATE TABLE IF NOT EXISTS conversations (
            user_id             TEXT NOT NULL,
            conversation_id     TEXT NOT NULL,
            title               TEXT NOT NULL,
            updated_at          INTEGER NOT NULL,
            attachment_ids      TEXT NOT NULL DEFAULT '[]',
            PRIMARY KEY (user_id, conversation_id)
        );

        CREATE INDEX IF NOT EXISTS idx_conversations_updated
            ON conversations (user_id, updated_at DESC);

        CREATE TABLE IF NOT EXISTS objects (
            bucket              TEXT NOT NULL,
            key                 TEXT NOT NULL,
            content_type        TEXT NOT NULL,
            body                BLOB NOT NULL,
            updated_at          INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            PRIMARY KEY (bucket, key)
        );

        INSERT INTO schema_migrations (version, name) VALUES (1, 'initial_schema');
        ",
    )
    .map_err(|e| ArgoError::Storage(format!("Failed to apply migration v1: {}", e)))?;

    Ok(())
}
