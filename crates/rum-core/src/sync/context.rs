//! Dependencies shared by every poller and the submitter.

use std::sync::Arc;

use crate::config::SyncSettings;
use crate::node::NodeApi;
use crate::services::StoreService;
use crate::state::ViewState;

/// Explicitly constructed sync context. Created once at start-up and handed
/// to each task by `Arc`.
#[derive(Clone)]
pub struct SyncContext {
    pub store: StoreService,
    pub node: Arc<dyn NodeApi>,
    pub view: Arc<ViewState>,
    pub settings: SyncSettings,
}

impl SyncContext {
    pub fn new(store: StoreService, node: Arc<dyn NodeApi>, settings: SyncSettings) -> Self {
        Self {
            store,
            node,
            view: Arc::new(ViewState::new()),
            settings,
        }
    }

    /// Whether a group is the one currently on screen
    pub fn is_active(&self, group_id: &str) -> bool {
        self.view.active_group().as_deref() == Some(group_id)
    }
}

impl std::fmt::Debug for SyncContext {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SyncContext")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
