//! Priority and keyword categorization — pure functions over the current
//! analysis results, re-derivable at any time.

use std::collections::HashMap;

use serde::Serialize;

use crate::models::analysis::{AnalysisResult, PriorityLabel};
use crate::models::state::UserKeyword;

/// Conversation ids partitioned by priority label, highest score first
/// within each class.
#[derive(Debug, Default, Serialize)]
pub struct PriorityGroups {
    pub p1: Vec<String>,
    pub p2: Vec<String>,
    pub p3: Vec<String>,
}

pub fn partition_by_priority(results: &HashMap<String, AnalysisResult>) -> PriorityGroups {
    let mut scored: Vec<(&String, PriorityLabel, f64)> = results
        .iter()
        .map(|(id, r)| (id, r.priority.label, r.priority.score))
        .collect();
    // score descending, id ascending for a stable order
    scored.sort_by(|a, b| {
        b.2.partial_cmp(&a.2)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(b.0))
    });

    let mut groups = PriorityGroups::default();
    for (id, label, _) in scored {
        match label {
            PriorityLabel::P1 => groups.p1.push(id.clone()),
            PriorityLabel::P2 => groups.p2.push(id.clone()),
            PriorityLabel::P3 => groups.p3.push(id.clone()),
        }
    }
    groups
}

#[derive(Debug, Serialize)]
pub struct KeywordCategory {
    pub term: String,
    pub conversation_ids: Vec<String>,
}

/// One category per user keyword: a conversation belongs to it when the
/// term appears (case-insensitive substring) in the analysis summary.
pub fn keyword_categories(
    results: &HashMap<String, AnalysisResult>,
    keywords: &[UserKeyword],
) -> Vec<KeywordCategory> {
    let mut categories: Vec<KeywordCategory> = keywords
        .iter()
        .map(|kw| {
            let needle = kw.term.to_lowercase();
            let mut ids: Vec<String> = results
                .iter()
                .filter(|(_, r)| r.summary.to_lowercase().contains(&needle))
                .map(|(id, _)| id.clone())
                .collect();
            ids.sort();
            KeywordCategory {
                term: kw.term.clone(),
                conversation_ids: ids,
            }
        })
        .collect();
    categories.sort_by(|a, b| a.term.cmp(&b.term));
    categories
}
