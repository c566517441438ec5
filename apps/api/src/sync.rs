//! Best-effort fan-out of keyword/tag changes to the external
//! settings-persistence endpoint. A failed push is logged and dropped; it
//! never rolls back the local State Store mutation.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

const SYNC_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Serialize)]
struct SyncPayload<'a> {
    user_id: &'a str,
    add: &'a [Value],
    remove: &'a [String],
}

#[derive(Clone)]
pub struct SettingsSync {
    client: reqwest::Client,
    endpoint: Option<String>,
}

impl SettingsSync {
    pub fn new(endpoint: Option<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(SYNC_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client"),
            endpoint,
        }
    }

    /// No-op sink for deployments without a sync endpoint (and for tests).
    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub async fn push(&self, user_id: &str, add: &[Value], remove: &[String]) {
        let Some(endpoint) = &self.endpoint else {
            debug!("settings sync disabled, skipping push");
            return;
        };

        let payload = SyncPayload {
            user_id,
            add,
            remove,
        };
        match self.client.post(endpoint).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(user_id, "settings change forwarded");
            }
            Ok(response) => {
                warn!(
                    user_id,
                    status = response.status().as_u16(),
                    "settings sync rejected the change, keeping local state"
                );
            }
            Err(e) => {
                warn!(user_id, error = %e, "settings sync unreachable, keeping local state");
            }
        }
    }
}
