//! Wire types shared with the external analysis service.
//!
//! Shapes mirror the service's batch-analyze contract: requests carry one
//! `ThreadInput` per conversation, responses one `AnalysisResult` per id.
//! Results live only in the short-TTL cache, never in the State Store.

use serde::{Deserialize, Serialize};

/// Input snapshot of one conversation, sent to the analysis service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadInput {
    pub id: String,
    pub subject: String,
    pub snippet: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl ThreadInput {
    /// Minimal input used when conversation details could not be fetched.
    /// The analysis service still gets the id so the response lines up.
    pub fn bare(id: &str) -> Self {
        Self {
            id: id.to_string(),
            subject: String::new(),
            snippet: String::new(),
            last_message: None,
            from: None,
            to: Vec::new(),
            date: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum PriorityLabel {
    P1,
    P2,
    #[default]
    P3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Priority {
    #[serde(default)]
    pub label: PriorityLabel,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub reasons: Vec<String>,
}

impl Default for Priority {
    fn default() -> Self {
        Self {
            label: PriorityLabel::P3,
            score: 0.0,
            reasons: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Deadline,
    Meeting,
    #[default]
    #[serde(other)]
    Action,
}

/// A task the analysis service extracted from a conversation.
/// `due` is a display string ("Oct 21, 2023, 17:00", RFC 3339, or "TBD");
/// parsing happens at bucketing time, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedTask {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due: Option<String>,
    #[serde(rename = "type", default)]
    pub task_type: TaskType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub id: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub tasks: Vec<ExtractedTask>,
}

impl AnalysisResult {
    /// Fail-open placeholder: a failed or missing analysis degrades to this
    /// instead of erroring the whole batch.
    pub fn unavailable(id: &str) -> Self {
        Self {
            id: id.to_string(),
            summary: "unavailable".to_string(),
            priority: Priority::default(),
            tasks: Vec::new(),
        }
    }
}
