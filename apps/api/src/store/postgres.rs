//! Postgres-backed State Store.
//!
//! One `user_state` table, one row per (user, key), value as JSONB. The
//! upsert overwrites the whole value, matching the store contract.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;

use crate::store::{StateKey, StateStore, StoreError};

pub struct PgStateStore {
    pool: PgPool,
}

impl PgStateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StateStore for PgStateStore {
    async fn get(&self, user_id: &str, key: StateKey) -> Result<Option<Value>, StoreError> {
        let value: Option<Value> =
            sqlx::query_scalar("SELECT value FROM user_state WHERE user_id = $1 AND key = $2")
                .bind(user_id)
                .bind(key.as_str())
                .fetch_optional(&self.pool)
                .await?;
        Ok(value)
    }

    async fn set(&self, user_id: &str, key: StateKey, value: Value) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO user_state (user_id, key, value, updated_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (user_id, key)
            DO UPDATE SET value = EXCLUDED.value, updated_at = now()
            "#,
        )
        .bind(user_id)
        .bind(key.as_str())
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_all(&self, user_id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM user_state WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
