use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use std::sync::Arc;

use crate::error::Result;
use crate::types::ParkingLot;

pub const KEY_USER_CREDENTIALS: &str = "user_credentials";
pub const KEY_FAVORITE_PARKING_LOT: &str = "favorite_parking_lot";
pub const KEY_CACHED_PARKING_LOTS: &str = "cached_parking_lots";

/// Durable string key-value storage that survives restarts.
///
/// Encryption at rest, where required, is the backing store's job.
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

/// [`LocalStore`] backed by the `kv_store` table.
#[derive(Clone)]
pub struct SqliteLocalStore {
    pool: SqlitePool,
}

impl SqliteLocalStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LocalStore for SqliteLocalStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?, ?, datetime('now'))
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM kv_store").execute(&self.pool).await?;
        Ok(())
    }
}

/// Typed accessors over the fixed keys the app persists.
#[derive(Clone)]
pub struct LocalStorage {
    store: Arc<dyn LocalStore>,
}

impl LocalStorage {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    pub async fn save_user_credentials(&self, credentials: &str) -> Result<()> {
        self.store.set(KEY_USER_CREDENTIALS, credentials).await
    }

    pub async fn user_credentials(&self) -> Result<Option<String>> {
        self.store.get(KEY_USER_CREDENTIALS).await
    }

    pub async fn save_favorite_parking_lot(&self, parking_lot_id: &str) -> Result<()> {
        self.store.set(KEY_FAVORITE_PARKING_LOT, parking_lot_id).await
    }

    pub async fn favorite_parking_lot(&self) -> Result<Option<String>> {
        self.store.get(KEY_FAVORITE_PARKING_LOT).await
    }

    pub async fn save_parking_lots(&self, parking_lots: &[ParkingLot]) -> Result<()> {
        let json = serde_json::to_string(parking_lots)?;
        self.store.set(KEY_CACHED_PARKING_LOTS, &json).await
    }

    /// The persisted listing, empty when nothing (readable) is stored.
    pub async fn cached_parking_lots(&self) -> Result<Vec<ParkingLot>> {
        let Some(json) = self.store.get(KEY_CACHED_PARKING_LOTS).await? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&json) {
            Ok(lots) => Ok(lots),
            Err(e) => {
                tracing::warn!("Ignoring unreadable cached parking lots: {e}");
                Ok(Vec::new())
            }
        }
    }

    pub async fn clear_all(&self) -> Result<()> {
        self.store.clear().await
    }
}

/// The single string stored under [`KEY_USER_CREDENTIALS`].
pub fn credentials_string(username: &str, token: &str) -> String {
    format!("{username}:{token}")
}
