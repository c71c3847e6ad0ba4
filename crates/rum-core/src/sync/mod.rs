//! Content sync: pollers that pull from the node, merge handlers that fold
//! pages into the local store, and the optimistic submission path.

mod context;
mod engine;
pub mod merge;
mod submit;
pub mod tasks;


pub use context::SyncContext;
pub use engine::{Effects, MergePage, PollPolicy, Poller, Scope, SyncTask};
pub use submit::Submitter;

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use tasks::{ContentTask, GroupsTask, ProducersTask, PubQueueTask, TransfersTask};

/// Running set of pollers, one tokio task per category.
pub struct SyncEngine {
    quit: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl SyncEngine {
    /// Refresh the group list once, then spawn every poller.
    pub async fn start(ctx: Arc<SyncContext>) -> Self {
        let groups = Poller::new(GroupsTask, Arc::clone(&ctx));
        let initial = groups.tick(0).await;
        tracing::info!(groups = initial, "Initial group refresh done");

        let (quit, quit_rx) = watch::channel(false);
        let handles = vec![
            tokio::spawn(groups.run(quit_rx.clone())),
            tokio::spawn(Poller::new(ContentTask, Arc::clone(&ctx)).run(quit_rx.clone())),
            tokio::spawn(Poller::new(PubQueueTask, Arc::clone(&ctx)).run(quit_rx.clone())),
            tokio::spawn(Poller::new(ProducersTask, Arc::clone(&ctx)).run(quit_rx.clone())),
            tokio::spawn(Poller::new(TransfersTask, ctx).run(quit_rx)),
        ];
        Self { quit, handles }
    }

    /// Raise the quit flag and wait for every poller to finish its tick.
    pub async fn shutdown(self) {
        // Receivers may already be gone
        let _ = self.quit.send(true);
        for handle in self.handles {
            if let Err(error) = handle.await {
                tracing::warn!(%error, "Poller task ended abnormally");
            }
        }
        tracing::info!("Sync engine stopped");
    }
}
