//! API key store.
//!
//! Keys are random 32-byte values rendered as `parley_<hex>`. Only the SHA-256
//! hash is stored; the plaintext is shown once at creation.

use aes_gcm::aead::{OsRng, rand_core::RngCore};
use chrono::Utc;
use parley_types::chat::UserId;
use sha2::{Digest, Sha256};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

pub const API_KEY_PREFIX: &str = "parley_";

/// A freshly created key. `plaintext` is never stored.
#[derive(Debug, Clone)]
pub struct CreatedApiKey {
    pub id: Uuid,
    pub user_id: UserId,
    pub name: String,
    pub plaintext: String,
}

/// Compute SHA-256 hash of an API key (lowercase hex).
pub fn hash_api_key(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    format!("{:x}", digest)
}

/// Generate a new plaintext key.
pub fn generate_api_key() -> String {
    let mut key_bytes = [0u8; 32];
    OsRng.fill_bytes(&mut key_bytes);
    format!(
        "{API_KEY_PREFIX}{}",
        key_bytes.iter().map(|b| format!("{b:02x}")).collect::<String>()
    )
}

/// SQLite-backed API key store mapping key hashes to principals.
#[derive(Clone)]
pub struct SqliteApiKeyStore {
    pool: DatabasePool,
}

impl SqliteApiKeyStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Create a key for `user_id` and return its plaintext.
    pub async fn create(&self, user_id: &UserId, name: &str) -> anyhow::Result<CreatedApiKey> {
        let plaintext = generate_api_key();
        let id = Uuid::now_v7();

        sqlx::query(
            "INSERT INTO api_keys (id, user_id, key_hash, name, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(user_id.as_str())
        .bind(hash_api_key(&plaintext))
        .bind(name)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool.writer)
        .await?;

        tracing::info!(user_id = %user_id, key_id = %id, "Created API key");

        Ok(CreatedApiKey {
            id,
            user_id: user_id.clone(),
            name: name.to_string(),
            plaintext,
        })
    }

    /// The principal owning `key`, if it is known.
    ///
    /// Records `last_used_at` on a hit (best effort).
    pub async fn authenticate(&self, key: &str) -> anyhow::Result<Option<UserId>> {
        let row = sqlx::query("SELECT id, user_id FROM api_keys WHERE key_hash = ?")
            .bind(hash_api_key(key))
            .fetch_optional(&self.pool.reader)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let id: String = row.try_get("id")?;
        let user_id: String = row.try_get("user_id")?;

        if let Err(e) = sqlx::query("UPDATE api_keys SET last_used_at = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(&id)
            .execute(&self.pool.writer)
            .await
        {
            tracing::debug!(key_id = %id, "Failed to record API key use: {e}");
        }

        Ok(Some(UserId::new(user_id)))
    }
}
