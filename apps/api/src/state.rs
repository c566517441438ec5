use std::sync::Arc;

use crate::analysis::cache::AnalysisCache;
use crate::analysis::AnalysisService;
use crate::config::Config;
use crate::mail::MailPlatform;
use crate::store::StateStore;
use crate::sync::SettingsSync;

/// Shared application state injected into all route handlers via Axum extractors.
/// Every external seam is a trait object so tests and local runs can swap
/// implementations without touching handler code.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn StateStore>,
    pub mail: Arc<dyn MailPlatform>,
    pub analysis: Arc<dyn AnalysisService>,
    pub cache: Arc<AnalysisCache>,
    pub settings_sync: SettingsSync,
    /// Kept for handlers that need deployment facts (none do yet).
    #[allow(dead_code)]
    pub config: Config,
}
