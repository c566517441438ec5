//! Action handlers: the state-mutating operations behind user actions.
//!
//! Every mutation is a read-modify-write of one whole collection, followed
//! by cache invalidation where the action calls for it. The HTTP layer
//! re-derives the presentation groupings afterwards.

pub mod handlers;

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::analysis::cache::AnalysisCache;
use crate::models::state::{
    DeadlineOverride, FlaggedMail, SavedTask, UserKeyword, DEFAULT_TAGS,
};
use crate::store::{self, StateKey, StateStore, StoreError};
use crate::sync::SettingsSync;

/// Removes the conversation from the unresolved pool and drops its cached
/// analysis. Dismissed/saved/flagged state is deliberately untouched.
pub async fn mark_done(
    store: &dyn StateStore,
    cache: &AnalysisCache,
    user_id: &str,
    conversation_id: &str,
) -> Result<(), StoreError> {
    let mut pool: Vec<String> = store::read(store, user_id, StateKey::UnresolvedThreadIds).await?;
    pool.retain(|id| id != conversation_id);
    store::write(store, user_id, StateKey::UnresolvedThreadIds, &pool).await?;
    cache.invalidate(conversation_id);
    info!(user_id, conversation_id, "marked done");
    Ok(())
}

/// Upserts the wake-up instant. The entry goes inert (not deleted) once the
/// wake time passes; visibility filtering handles the rest.
pub async fn snooze(
    store: &dyn StateStore,
    user_id: &str,
    conversation_id: &str,
    until: DateTime<Utc>,
) -> Result<(), StoreError> {
    let mut snoozes: HashMap<String, DateTime<Utc>> =
        store::read(store, user_id, StateKey::SnoozedUntil).await?;
    snoozes.insert(conversation_id.to_string(), until);
    store::write(store, user_id, StateKey::SnoozedUntil, &snoozes).await?;
    info!(user_id, conversation_id, %until, "snoozed");
    Ok(())
}

/// Adds to the dismissed set (idempotent) and drops the cached analysis.
pub async fn dismiss(
    store: &dyn StateStore,
    cache: &AnalysisCache,
    user_id: &str,
    conversation_id: &str,
) -> Result<(), StoreError> {
    let mut dismissed: BTreeSet<String> =
        store::read(store, user_id, StateKey::DismissedSet).await?;
    dismissed.insert(conversation_id.to_string());
    store::write(store, user_id, StateKey::DismissedSet, &dismissed).await?;
    cache.invalidate(conversation_id);
    info!(user_id, conversation_id, "dismissed");
    Ok(())
}

/// Upserts a flagged conversation; re-flagging replaces the tags and
/// refreshes `flagged_at` in place.
pub async fn flag(
    store: &dyn StateStore,
    user_id: &str,
    conversation_id: &str,
    subject: &str,
    tags: BTreeSet<String>,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    let mut flagged: Vec<FlaggedMail> = store::read(store, user_id, StateKey::FlaggedMails).await?;
    match flagged
        .iter_mut()
        .find(|f| f.conversation_id == conversation_id)
    {
        Some(existing) => {
            existing.tags = tags;
            existing.flagged_at = now;
        }
        None => flagged.push(FlaggedMail {
            conversation_id: conversation_id.to_string(),
            subject: subject.to_string(),
            flagged_at: now,
            tags,
        }),
    }
    store::write(store, user_id, StateKey::FlaggedMails, &flagged).await?;
    info!(user_id, conversation_id, "flagged");
    Ok(())
}

/// Removes the flag. Returns whether anything was removed.
pub async fn unflag(
    store: &dyn StateStore,
    user_id: &str,
    conversation_id: &str,
) -> Result<bool, StoreError> {
    let mut flagged: Vec<FlaggedMail> = store::read(store, user_id, StateKey::FlaggedMails).await?;
    let before = flagged.len();
    flagged.retain(|f| f.conversation_id != conversation_id);
    let removed = flagged.len() != before;
    store::write(store, user_id, StateKey::FlaggedMails, &flagged).await?;
    Ok(removed)
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSavedTask {
    pub conversation_id: String,
    pub title: String,
    #[serde(default)]
    pub deadline: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
}

/// Appends a saved task under a collision-resistant generated id.
pub async fn save_task(
    store: &dyn StateStore,
    user_id: &str,
    new: NewSavedTask,
    now: DateTime<Utc>,
) -> Result<SavedTask, StoreError> {
    let task = SavedTask {
        task_id: format!("task_{}", Uuid::new_v4()),
        conversation_id: new.conversation_id,
        title: new.title,
        deadline: new.deadline,
        owner: new.owner,
        saved_at: now,
    };
    let mut saved: Vec<SavedTask> = store::read(store, user_id, StateKey::SavedTasks).await?;
    saved.push(task.clone());
    store::write(store, user_id, StateKey::SavedTasks, &saved).await?;
    info!(user_id, task_id = %task.task_id, "task saved");
    Ok(task)
}

/// Removes a saved task by id. Returns whether anything was removed.
pub async fn unsave_task(
    store: &dyn StateStore,
    user_id: &str,
    task_id: &str,
) -> Result<bool, StoreError> {
    let mut saved: Vec<SavedTask> = store::read(store, user_id, StateKey::SavedTasks).await?;
    let before = saved.len();
    saved.retain(|t| t.task_id != task_id);
    let removed = saved.len() != before;
    store::write(store, user_id, StateKey::SavedTasks, &saved).await?;
    Ok(removed)
}

/// Applies a batch of keyword additions (upsert by term) and removals, then
/// forwards the change to the settings-sync collaborator. The forward is
/// best-effort and runs after the local write.
pub async fn update_keywords(
    store: &dyn StateStore,
    sync: &SettingsSync,
    user_id: &str,
    add: Vec<UserKeyword>,
    remove: Vec<String>,
) -> Result<Vec<UserKeyword>, StoreError> {
    let mut keywords: Vec<UserKeyword> =
        store::read(store, user_id, StateKey::UserKeywords).await?;

    for incoming in &add {
        match keywords
            .iter_mut()
            .find(|k| k.term.eq_ignore_ascii_case(&incoming.term))
        {
            Some(existing) => *existing = incoming.clone(),
            None => keywords.push(incoming.clone()),
        }
    }
    for term in &remove {
        keywords.retain(|k| !k.term.eq_ignore_ascii_case(term));
    }

    store::write(store, user_id, StateKey::UserKeywords, &keywords).await?;

    let add_values: Vec<Value> = add
        .iter()
        .filter_map(|k| serde_json::to_value(k).ok())
        .collect();
    sync.push(user_id, &add_values, &remove).await;

    Ok(keywords)
}

/// Tag vocabulary with the seed set applied for users who never edited it.
pub async fn custom_tags(
    store: &dyn StateStore,
    user_id: &str,
) -> Result<Vec<String>, StoreError> {
    let tags: Vec<String> = store::read(store, user_id, StateKey::CustomTags).await?;
    if tags.is_empty() {
        return Ok(DEFAULT_TAGS.iter().map(|t| t.to_string()).collect());
    }
    Ok(tags)
}

pub async fn add_tag(
    store: &dyn StateStore,
    sync: &SettingsSync,
    user_id: &str,
    tag: &str,
) -> Result<Vec<String>, StoreError> {
    let mut tags = custom_tags(store, user_id).await?;
    if !tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
        tags.push(tag.to_string());
    }
    store::write(store, user_id, StateKey::CustomTags, &tags).await?;
    sync.push(user_id, &[Value::String(tag.to_string())], &[]).await;
    Ok(tags)
}

pub async fn remove_tag(
    store: &dyn StateStore,
    sync: &SettingsSync,
    user_id: &str,
    tag: &str,
) -> Result<Vec<String>, StoreError> {
    let mut tags = custom_tags(store, user_id).await?;
    tags.retain(|t| !t.eq_ignore_ascii_case(tag));
    store::write(store, user_id, StateKey::CustomTags, &tags).await?;
    sync.push(user_id, &[], &[tag.to_string()]).await;
    Ok(tags)
}

/// Upserts a per-task deadline override, addressed by (conversation, index).
pub async fn set_deadline_override(
    store: &dyn StateStore,
    user_id: &str,
    incoming: DeadlineOverride,
) -> Result<(), StoreError> {
    let mut overrides: Vec<DeadlineOverride> =
        store::read(store, user_id, StateKey::DeadlineOverrides).await?;
    match overrides.iter_mut().find(|o| {
        o.conversation_id == incoming.conversation_id && o.task_index == incoming.task_index
    }) {
        Some(existing) => *existing = incoming,
        None => overrides.push(incoming),
    }
    store::write(store, user_id, StateKey::DeadlineOverrides, &overrides).await
}

pub async fn clear_deadline_override(
    store: &dyn StateStore,
    user_id: &str,
    conversation_id: &str,
    task_index: usize,
) -> Result<bool, StoreError> {
    let mut overrides: Vec<DeadlineOverride> =
        store::read(store, user_id, StateKey::DeadlineOverrides).await?;
    let before = overrides.len();
    overrides.retain(|o| !(o.conversation_id == conversation_id && o.task_index == task_index));
    let removed = overrides.len() != before;
    store::write(store, user_id, StateKey::DeadlineOverrides, &overrides).await?;
    Ok(removed)
}

/// Persists the user's analysis-cache TTL in minutes.
pub async fn set_cache_ttl(
    store: &dyn StateStore,
    user_id: &str,
    minutes: u32,
) -> Result<(), StoreError> {
    store::write(store, user_id, StateKey::AnalysisCacheTtlMin, &minutes).await
}

/// Explicit full clear of the user's persisted state and cached analyses.
pub async fn clear_state(
    store: &dyn StateStore,
    cache: &AnalysisCache,
    user_id: &str,
) -> Result<(), StoreError> {
    store.delete_all(user_id).await?;
    cache.clear();
    info!(user_id, "state cleared");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use async_trait::async_trait;

    use crate::mail::{ConversationDetails, ConversationRef, MailError, MailPlatform};
    use crate::models::state::{KeywordScope, KeywordWeight};
    use crate::store::MemoryStore;
    use crate::triage::selector::{select_candidates, VisibilityPolicy};

    struct EmptyMail;

    #[async_trait]
    impl MailPlatform for EmptyMail {
        async fn search(
            &self,
            _query: &str,
            _offset: usize,
            _limit: usize,
        ) -> Result<Vec<ConversationRef>, MailError> {
            Ok(vec![])
        }

        async fn get_details(&self, _id: &str) -> Result<ConversationDetails, MailError> {
            Err(MailError::Api {
                status: 404,
                message: "gone".to_string(),
            })
        }
    }

    async fn seed_pool(store: &MemoryStore, ids: &[&str]) {
        let pool: Vec<String> = ids.iter().map(|s| s.to_string()).collect();
        store::write(store, "u1", StateKey::UnresolvedThreadIds, &pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_mark_done_removes_and_stays_gone() {
        let store = MemoryStore::new();
        let cache = AnalysisCache::new();
        seed_pool(&store, &["a", "b"]).await;

        mark_done(&store, &cache, "u1", "a").await.unwrap();

        let pool: Vec<String> = store::read(&store, "u1", StateKey::UnresolvedThreadIds)
            .await
            .unwrap();
        assert_eq!(pool, vec!["b"]);

        // no new delta for "a": selection must not reintroduce it
        let candidates = select_candidates(
            &store,
            &EmptyMail,
            "u1",
            VisibilityPolicy::SnoozeDismiss,
            Utc::now(),
        )
        .await
        .unwrap();
        assert_eq!(candidates, vec!["b"]);
    }

    #[tokio::test]
    async fn test_mark_done_invalidates_cache_entry() {
        let store = MemoryStore::new();
        let cache = AnalysisCache::new();
        let now = Utc::now();
        cache.store(
            crate::models::analysis::AnalysisResult::unavailable("a"),
            Duration::minutes(5),
            now,
        );
        seed_pool(&store, &["a"]).await;

        mark_done(&store, &cache, "u1", "a").await.unwrap();
        assert!(cache.lookup("a", now).is_none());
    }

    #[tokio::test]
    async fn test_dismiss_is_idempotent() {
        let store = MemoryStore::new();
        let cache = AnalysisCache::new();

        dismiss(&store, &cache, "u1", "x").await.unwrap();
        dismiss(&store, &cache, "u1", "x").await.unwrap();

        let dismissed: BTreeSet<String> = store::read(&store, "u1", StateKey::DismissedSet)
            .await
            .unwrap();
        assert_eq!(dismissed.len(), 1);
    }

    #[tokio::test]
    async fn test_snooze_upserts_wake_time() {
        let store = MemoryStore::new();
        let now = Utc::now();

        snooze(&store, "u1", "x", now + Duration::hours(1))
            .await
            .unwrap();
        snooze(&store, "u1", "x", now + Duration::hours(2))
            .await
            .unwrap();

        let snoozes: HashMap<String, DateTime<Utc>> =
            store::read(&store, "u1", StateKey::SnoozedUntil).await.unwrap();
        assert_eq!(snoozes.len(), 1);
        assert_eq!(
            snoozes["x"].timestamp(),
            (now + Duration::hours(2)).timestamp()
        );
    }

    #[tokio::test]
    async fn test_reflag_updates_tags_and_timestamp_in_place() {
        let store = MemoryStore::new();
        let t0 = Utc::now();

        flag(
            &store,
            "u1",
            "c1",
            "original subject",
            ["urgent".to_string()].into(),
            t0,
        )
        .await
        .unwrap();
        flag(
            &store,
            "u1",
            "c1",
            "ignored on reflag",
            ["waiting".to_string()].into(),
            t0 + Duration::minutes(1),
        )
        .await
        .unwrap();

        let flagged: Vec<FlaggedMail> = store::read(&store, "u1", StateKey::FlaggedMails)
            .await
            .unwrap();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].subject, "original subject");
        assert!(flagged[0].tags.contains("waiting"));
        assert!(!flagged[0].tags.contains("urgent"));
        assert_eq!(
            flagged[0].flagged_at.timestamp(),
            (t0 + Duration::minutes(1)).timestamp()
        );
    }

    #[tokio::test]
    async fn test_unflag_removes_only_matching() {
        let store = MemoryStore::new();
        let now = Utc::now();
        flag(&store, "u1", "c1", "s1", BTreeSet::new(), now)
            .await
            .unwrap();
        flag(&store, "u1", "c2", "s2", BTreeSet::new(), now)
            .await
            .unwrap();

        assert!(unflag(&store, "u1", "c1").await.unwrap());
        assert!(!unflag(&store, "u1", "c1").await.unwrap());

        let flagged: Vec<FlaggedMail> = store::read(&store, "u1", StateKey::FlaggedMails)
            .await
            .unwrap();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].conversation_id, "c2");
    }

    #[tokio::test]
    async fn test_rapid_saves_get_distinct_ids() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let new = |title: &str| NewSavedTask {
            conversation_id: "c1".to_string(),
            title: title.to_string(),
            deadline: None,
            owner: None,
        };

        let first = save_task(&store, "u1", new("one"), now).await.unwrap();
        let second = save_task(&store, "u1", new("two"), now).await.unwrap();

        assert_ne!(first.task_id, second.task_id);
        assert!(first.task_id.starts_with("task_"));

        let saved: Vec<SavedTask> = store::read(&store, "u1", StateKey::SavedTasks)
            .await
            .unwrap();
        assert_eq!(saved.len(), 2);
    }

    #[tokio::test]
    async fn test_unsave_task_by_id() {
        let store = MemoryStore::new();
        let task = save_task(
            &store,
            "u1",
            NewSavedTask {
                conversation_id: "c1".to_string(),
                title: "t".to_string(),
                deadline: None,
                owner: None,
            },
            Utc::now(),
        )
        .await
        .unwrap();

        assert!(unsave_task(&store, "u1", &task.task_id).await.unwrap());
        assert!(!unsave_task(&store, "u1", &task.task_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_keywords_upserts_and_removes() {
        let store = MemoryStore::new();
        let sync = SettingsSync::disabled();
        let kw = |term: &str, weight: KeywordWeight| UserKeyword {
            term: term.to_string(),
            weight,
            scope: KeywordScope::default(),
        };

        update_keywords(
            &store,
            &sync,
            "u1",
            vec![kw("budget", KeywordWeight::Low), kw("invoice", KeywordWeight::Medium)],
            vec![],
        )
        .await
        .unwrap();
        // re-add with a new weight, drop the other
        let current = update_keywords(
            &store,
            &sync,
            "u1",
            vec![kw("Budget", KeywordWeight::High)],
            vec!["invoice".to_string()],
        )
        .await
        .unwrap();

        assert_eq!(current.len(), 1);
        assert_eq!(current[0].weight, KeywordWeight::High);
    }

    #[tokio::test]
    async fn test_sync_failure_does_not_roll_back_local_write() {
        let store = MemoryStore::new();
        // unroutable local endpoint: the push fails fast
        let sync = SettingsSync::new(Some("http://127.0.0.1:1/sync".to_string()));

        update_keywords(
            &store,
            &sync,
            "u1",
            vec![UserKeyword {
                term: "budget".to_string(),
                weight: KeywordWeight::Medium,
                scope: KeywordScope::default(),
            }],
            vec![],
        )
        .await
        .unwrap();

        let keywords: Vec<UserKeyword> = store::read(&store, "u1", StateKey::UserKeywords)
            .await
            .unwrap();
        assert_eq!(keywords.len(), 1);
    }

    #[tokio::test]
    async fn test_tags_seeded_then_editable() {
        let store = MemoryStore::new();
        let sync = SettingsSync::disabled();

        let seeded = custom_tags(&store, "u1").await.unwrap();
        assert!(!seeded.is_empty());

        let with_new = add_tag(&store, &sync, "u1", "travel").await.unwrap();
        assert!(with_new.contains(&"travel".to_string()));

        let without = remove_tag(&store, &sync, "u1", "travel").await.unwrap();
        assert!(!without.contains(&"travel".to_string()));
        // seed tags survived the edit because the first write persisted them
        assert_eq!(without.len(), seeded.len());
    }

    #[tokio::test]
    async fn test_deadline_override_upsert_and_clear() {
        let store = MemoryStore::new();
        let over = |deadline: &str| DeadlineOverride {
            conversation_id: "c1".to_string(),
            task_index: 0,
            original_deadline: "TBD".to_string(),
            override_deadline: deadline.to_string(),
        };

        set_deadline_override(&store, "u1", over("Aug 10, 2026, 17:00"))
            .await
            .unwrap();
        set_deadline_override(&store, "u1", over("Aug 11, 2026, 09:00"))
            .await
            .unwrap();

        let overrides: Vec<DeadlineOverride> =
            store::read(&store, "u1", StateKey::DeadlineOverrides)
                .await
                .unwrap();
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides[0].override_deadline, "Aug 11, 2026, 09:00");

        assert!(clear_deadline_override(&store, "u1", "c1", 0).await.unwrap());
        assert!(!clear_deadline_override(&store, "u1", "c1", 0).await.unwrap());
    }

    #[tokio::test]
    async fn test_clear_state_wipes_store_and_cache() {
        let store = MemoryStore::new();
        let cache = AnalysisCache::new();
        let now = Utc::now();
        seed_pool(&store, &["a"]).await;
        cache.store(
            crate::models::analysis::AnalysisResult::unavailable("a"),
            Duration::minutes(5),
            now,
        );

        clear_state(&store, &cache, "u1").await.unwrap();

        let pool: Vec<String> = store::read(&store, "u1", StateKey::UnresolvedThreadIds)
            .await
            .unwrap();
        assert!(pool.is_empty());
        assert!(cache.lookup("a", now).is_none());
    }

    #[tokio::test]
    async fn test_mark_done_leaves_saved_and_flagged_alone() {
        let store = MemoryStore::new();
        let cache = AnalysisCache::new();
        let now = Utc::now();
        seed_pool(&store, &["a"]).await;
        flag(&store, "u1", "a", "s", BTreeSet::new(), now)
            .await
            .unwrap();
        save_task(
            &store,
            "u1",
            NewSavedTask {
                conversation_id: "a".to_string(),
                title: "t".to_string(),
                deadline: None,
                owner: None,
            },
            now,
        )
        .await
        .unwrap();

        mark_done(&store, &cache, "u1", "a").await.unwrap();

        let flagged: Vec<FlaggedMail> = store::read(&store, "u1", StateKey::FlaggedMails)
            .await
            .unwrap();
        let saved: Vec<SavedTask> = store::read(&store, "u1", StateKey::SavedTasks)
            .await
            .unwrap();
        assert_eq!(flagged.len(), 1);
        assert_eq!(saved.len(), 1);
    }
}
