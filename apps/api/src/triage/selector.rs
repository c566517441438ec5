//! Candidate selection: merges the delta with the durable unresolved pool,
//! applies the visibility policy, and advances the session boundary.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::mail::MailPlatform;
use crate::models::state::{FlaggedMail, SavedTask};
use crate::store::{self, StateKey, StateStore, StoreError};
use crate::triage::delta::fetch_delta;

/// Hard cap on the unresolved pool, enforced by truncation on every write.
pub const MAX_UNRESOLVED: usize = 1000;

/// Which conversations stay visible in a session. Two policies exist in the
/// product's history; `SnoozeDismiss` is the canonical default — it is the
/// only one under which the snooze and dismiss actions have any effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityPolicy {
    /// Keep an id only if it is unread, saved, or flagged; read conversations
    /// are treated as processed even while still in the pool.
    ReadProcessed,
    /// Keep everything in delta ∪ pool except currently-snoozed and
    /// dismissed ids.
    #[default]
    SnoozeDismiss,
}

/// Merge delta ids into the existing pool: newest delta first, first
/// occurrence wins, truncated to `cap`.
pub fn merge_pool(existing: &[String], delta: &[String], cap: usize) -> Vec<String> {
    let mut merged = Vec::with_capacity(existing.len() + delta.len());
    let mut seen: HashSet<&str> = HashSet::new();
    for id in delta.iter().chain(existing.iter()) {
        if seen.insert(id.as_str()) {
            merged.push(id.clone());
        }
    }
    merged.truncate(cap);
    merged
}

/// Selects this session's candidate set.
///
/// Guaranteed side effects, in order: the unresolved pool is rewritten
/// (deduplicated, delta prepended, capped), then the last-open timestamp is
/// set to `now`. The timestamp write is the final store write so that a
/// crash mid-invocation re-fetches the same delta window instead of
/// silently losing it.
pub async fn select_candidates(
    store: &dyn StateStore,
    mail: &dyn MailPlatform,
    user_id: &str,
    policy: VisibilityPolicy,
    now: DateTime<Utc>,
) -> Result<Vec<String>, StoreError> {
    let last_open = store::read_last_open(store, user_id).await?;
    let delta = fetch_delta(mail, last_open, now).await;
    let delta_ids: Vec<String> = delta.iter().map(|r| r.id.clone()).collect();
    let unread_in_delta: HashMap<&str, bool> =
        delta.iter().map(|r| (r.id.as_str(), r.unread)).collect();

    let pool: Vec<String> = store::read(store, user_id, StateKey::UnresolvedThreadIds).await?;
    let merged = merge_pool(&pool, &delta_ids, MAX_UNRESOLVED);

    let candidates = match policy {
        VisibilityPolicy::SnoozeDismiss => {
            let snoozes: HashMap<String, DateTime<Utc>> =
                store::read(store, user_id, StateKey::SnoozedUntil).await?;
            let dismissed: BTreeSet<String> =
                store::read(store, user_id, StateKey::DismissedSet).await?;
            merged
                .iter()
                .filter(|id| {
                    let snoozed = snoozes.get(*id).is_some_and(|until| *until > now);
                    !snoozed && !dismissed.contains(*id)
                })
                .cloned()
                .collect()
        }
        VisibilityPolicy::ReadProcessed => {
            let saved: Vec<SavedTask> = store::read(store, user_id, StateKey::SavedTasks).await?;
            let flagged: Vec<FlaggedMail> =
                store::read(store, user_id, StateKey::FlaggedMails).await?;
            let saved_ids: HashSet<&str> =
                saved.iter().map(|t| t.conversation_id.as_str()).collect();
            let flagged_ids: HashSet<&str> =
                flagged.iter().map(|f| f.conversation_id.as_str()).collect();

            // Union keeps merged order, then appends saved/flagged ids that
            // are in neither the delta nor the pool.
            let mut union = merged.clone();
            let mut present: HashSet<&str> = merged.iter().map(String::as_str).collect();
            for id in saved_ids.iter().chain(flagged_ids.iter()) {
                if present.insert(*id) {
                    union.push((*id).to_string());
                }
            }

            let mut kept = Vec::with_capacity(union.len());
            for id in union {
                if saved_ids.contains(id.as_str()) || flagged_ids.contains(id.as_str()) {
                    kept.push(id);
                    continue;
                }
                // Read state is queried live, never cached: delta results
                // already carry it, anything else is looked up on the spot.
                let unread = match unread_in_delta.get(id.as_str()) {
                    Some(unread) => *unread,
                    None => match mail.get_details(&id).await {
                        Ok(details) => details.unread,
                        Err(e) => {
                            debug!(id = %id, error = %e, "read-state lookup failed, treating as read");
                            false
                        }
                    },
                };
                if unread {
                    kept.push(id);
                }
            }
            kept
        }
    };

    store::write(store, user_id, StateKey::UnresolvedThreadIds, &merged).await?;
    store::write_last_open(store, user_id, now).await?;

    info!(
        user_id,
        delta = delta_ids.len(),
        pool = merged.len(),
        candidates = candidates.len(),
        "candidate selection complete"
    );

    Ok(candidates)
}
