//! State Store — durable, per-user key-value persistence.
//!
//! The store is the only durable surface in the engine. Every persisted
//! collection lives under one fixed key as a whole JSON value; writes are
//! whole-value overwrites, so all higher-level mutations are
//! read-modify-write of the entire collection. Two concurrent invocations
//! for the same user can therefore lose an update; the design tolerates
//! this because collections are small and mutation is rare.
//!
//! Reads never distinguish "key missing" from "key empty": `read` returns
//! the typed default for absent and for malformed values alike.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

pub use memory::MemoryStore;
pub use postgres::PgStateStore;

/// The closed set of per-user state keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKey {
    LastOpenTs,
    UnresolvedThreadIds,
    SnoozedUntil,
    DismissedSet,
    UserKeywords,
    AnalysisCacheTtlMin,
    SavedTasks,
    FlaggedMails,
    CustomTags,
    DeadlineOverrides,
}

impl StateKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateKey::LastOpenTs => "last_open_ts",
            StateKey::UnresolvedThreadIds => "unresolved_thread_ids",
            StateKey::SnoozedUntil => "snoozed_until",
            StateKey::DismissedSet => "dismissed_set",
            StateKey::UserKeywords => "user_keywords",
            StateKey::AnalysisCacheTtlMin => "analysis_cache_ttl_min",
            StateKey::SavedTasks => "saved_tasks",
            StateKey::FlaggedMails => "flagged_mails",
            StateKey::CustomTags => "custom_tags",
            StateKey::DeadlineOverrides => "deadline_overrides",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Durable per-user key-value persistence. Injected as `Arc<dyn StateStore>`
/// so components never touch ambient storage directly.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, user_id: &str, key: StateKey) -> Result<Option<Value>, StoreError>;

    /// Whole-value overwrite. There is deliberately no partial-update
    /// primitive; see the module docs for the concurrency consequence.
    async fn set(&self, user_id: &str, key: StateKey, value: Value) -> Result<(), StoreError>;

    async fn delete_all(&self, user_id: &str) -> Result<(), StoreError>;
}

/// Typed read with fallback-to-default on absent or malformed values.
pub async fn read<T>(store: &dyn StateStore, user_id: &str, key: StateKey) -> Result<T, StoreError>
where
    T: DeserializeOwned + Default,
{
    let Some(raw) = store.get(user_id, key).await? else {
        return Ok(T::default());
    };
    match serde_json::from_value(raw) {
        Ok(value) => Ok(value),
        Err(e) => {
            warn!(
                key = key.as_str(),
                error = %e,
                "malformed persisted value, falling back to typed default"
            );
            Ok(T::default())
        }
    }
}

/// Typed whole-value write.
pub async fn write<T>(
    store: &dyn StateStore,
    user_id: &str,
    key: StateKey,
    value: &T,
) -> Result<(), StoreError>
where
    T: Serialize,
{
    let raw = serde_json::to_value(value)?;
    store.set(user_id, key, raw).await
}

/// Last session boundary, stored as epoch millis.
pub async fn read_last_open(
    store: &dyn StateStore,
    user_id: &str,
) -> Result<Option<DateTime<Utc>>, StoreError> {
    let millis: Option<i64> = read(store, user_id, StateKey::LastOpenTs).await?;
    Ok(millis.and_then(|m| Utc.timestamp_millis_opt(m).single()))
}

pub async fn write_last_open(
    store: &dyn StateStore,
    user_id: &str,
    at: DateTime<Utc>,
) -> Result<(), StoreError> {
    write(store, user_id, StateKey::LastOpenTs, &at.timestamp_millis()).await
}
