//! Typed records for every persisted collection.
//!
//! Each of these round-trips through one State Store key as a whole JSON
//! value. Decoding is lenient: a malformed value falls back to the type's
//! default at the store layer, so none of these types may fail open-ended.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Seed vocabulary for users who have never edited their tags.
pub const DEFAULT_TAGS: &[&str] = &["follow-up", "waiting", "urgent", "reference"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum KeywordWeight {
    High,
    #[default]
    Medium,
    Low,
}

/// Which message fields a keyword applies to. Persisted and sent over the
/// wire as a pipe-joined string ("subject|body|sender"); unknown or empty
/// input decodes to the full scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct KeywordScope {
    pub subject: bool,
    pub body: bool,
    pub sender: bool,
}

impl Default for KeywordScope {
    fn default() -> Self {
        Self {
            subject: true,
            body: true,
            sender: true,
        }
    }
}

impl From<KeywordScope> for String {
    fn from(scope: KeywordScope) -> Self {
        let mut parts = Vec::new();
        if scope.subject {
            parts.push("subject");
        }
        if scope.body {
            parts.push("body");
        }
        if scope.sender {
            parts.push("sender");
        }
        parts.join("|")
    }
}

impl From<String> for KeywordScope {
    fn from(raw: String) -> Self {
        let mut scope = Self {
            subject: false,
            body: false,
            sender: false,
        };
        for part in raw.split('|') {
            match part.trim().to_ascii_lowercase().as_str() {
                "subject" => scope.subject = true,
                "body" => scope.body = true,
                "sender" => scope.sender = true,
                _ => {}
            }
        }
        if !(scope.subject || scope.body || scope.sender) {
            return Self::default();
        }
        scope
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserKeyword {
    pub term: String,
    #[serde(default)]
    pub weight: KeywordWeight,
    #[serde(default)]
    pub scope: KeywordScope,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedTask {
    pub task_id: String,
    pub conversation_id: String,
    pub title: String,
    #[serde(default)]
    pub deadline: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlaggedMail {
    pub conversation_id: String,
    pub subject: String,
    pub flagged_at: DateTime<Utc>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

/// User-corrected due date for one extracted task, addressed by the task's
/// position within its conversation's task list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadlineOverride {
    pub conversation_id: String,
    pub task_index: usize,
    pub original_deadline: String,
    pub override_deadline: String,
}
