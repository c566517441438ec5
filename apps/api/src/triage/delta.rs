//! Delta fetch: conversations touched since the last session boundary.

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use crate::mail::{ConversationRef, MailPlatform};

/// One page per cycle; anything beyond this is picked up next session via
/// the advanced last-open timestamp.
pub const DELTA_PAGE_SIZE: usize = 50;

/// Window used when no last-open timestamp exists (first run).
const FIRST_RUN_WINDOW_DAYS: i64 = 7;

/// Search query for conversations touched after the session boundary.
pub fn delta_query(last_open: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let since = last_open.unwrap_or(now - Duration::days(FIRST_RUN_WINDOW_DAYS));
    format!("after:{}", since.timestamp())
}

/// Queries the mail platform for the delta window. Fail-open: any query
/// failure is logged and treated as "nothing new" so the session proceeds.
pub async fn fetch_delta(
    mail: &dyn MailPlatform,
    last_open: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Vec<ConversationRef> {
    let query = delta_query(last_open, now);
    match mail.search(&query, 0, DELTA_PAGE_SIZE).await {
        Ok(refs) => refs,
        Err(e) => {
            warn!(error = %e, "delta fetch failed, treating as empty");
            Vec::new()
        }
    }
}
