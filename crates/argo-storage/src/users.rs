//! User records: identity, linked bank item and API tokens.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::info;

use argo_core::error::ArgoError;
use argo_core::types::User;

use crate::db::{storage_err, Database, OptionalExt};

/// Repository for the `users` table.
pub struct UserRepository {
    db: Arc<Database>,
}

impl UserRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Fetch a user, creating the record on first sight of the email.
    pub fn get_or_create(&self, email: &str, name: Option<&str>) -> Result<User, ArgoError> {
        let id = User::id_for_email(email);
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO users (id, email, name) VALUES (?1, ?2, ?3)",
                rusqlite::params![id, email, name],
            )
            .map_err(|e| ArgoError::Storage(format!("Failed to create user: {}", e)))?;
            Ok(())
        })?;
        self.get(&id)?
            .ok_or_else(|| ArgoError::Storage(format!("user {} vanished after insert", id)))
    }

    pub fn get(&self, id: &str) -> Result<Option<User>, ArgoError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT id, email, name, bank_access_token, bank_item_id
                 FROM users WHERE id = ?1",
                rusqlite::params![id],
                row_to_user,
            )
            .optional()
            .map_err(storage_err)
        })
    }

    pub fn get_by_email(&self, email: &str) -> Result<Option<User>, ArgoError> {
        self.get(&User::id_for_email(email))
    }

    /// Store the credentials of a completed bank link.
    pub fn link_bank(
        &self,
        user_id: &str,
        access_token: &str,
        item_id: &str,
    ) -> Result<(), ArgoError> {
        let updated = self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET bank_access_token = ?2, bank_item_id = ?3 WHERE id = ?1",
                rusqlite::params![user_id, access_token, item_id],
            )
            .map_err(storage_err)
        })?;
        if updated == 0 {
            return Err(ArgoError::NotFound(format!("user {}", user_id)));
        }
        info!(user_id, item_id, "bank item linked");
        Ok(())
    }

    /// Bind an API token to a user, replacing any previous one. Only the
    /// token's digest is stored.
    pub fn set_api_token(&self, user_id: &str, token: &str) -> Result<(), ArgoError> {
        let digest = token_digest(token);
        let updated = self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET api_token_hash = ?2 WHERE id = ?1",
                rusqlite::params![user_id, digest],
            )
            .map_err(storage_err)
        })?;
        if updated == 0 {
            return Err(ArgoError::NotFound(format!("user {}", user_id)));
        }
        Ok(())
    }

    /// Resolve a bearer token to its user.
    pub fn find_by_api_token(&self, token: &str) -> Result<Option<User>, ArgoError> {
        let digest = token_digest(token);
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT id, email, name, bank_access_token, bank_item_id
                 FROM users WHERE api_token_hash = ?1",
                rusqlite::params![digest],
                row_to_user,
            )
            .optional()
            .map_err(storage_err)
        })
    }
}

fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn row_to_user(row: &rusqlite::Row<'_>) -> Result<User, rusqlite::Error> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        bank_access_token: row.get(3)?,
        bank_item_id: row.get(4)?,
    })
}
