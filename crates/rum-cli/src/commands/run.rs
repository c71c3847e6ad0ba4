use rum_core::config::SyncSettings;
use rum_core::state::ViewEvent;
use rum_core::sync::SyncEngine;
use tokio::sync::broadcast::error::RecvError;

use crate::commands::common::{connect, open_store};
use crate::error::CliError;

/// Run every poller until Ctrl-C, printing view events as they arrive
pub async fn run_engine(settings: &SyncSettings, active: Option<String>) -> Result<(), CliError> {
    let store = open_store(settings)?;
    let ctx = connect(settings, store)?;
    ctx.view.set_active_group(active.map(|group| group.trim().to_string()));

    let mut events = ctx.view.subscribe();
    let engine = SyncEngine::start(ctx).await;
    println!("Syncing. Press Ctrl-C to stop.");

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
            event = events.recv() => match event {
                Ok(event) => {
                    if let Some(line) = describe_event(&event) {
                        println!("{line}");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "View event listener lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    engine.shutdown().await;
    Ok(())
}

pub fn describe_event(event: &ViewEvent) -> Option<String> {
    match event {
        ViewEvent::PostsArrived { group_id, count } => {
            Some(format!("{group_id}: {count} new post(s)"))
        }
        ViewEvent::LatestStatusChanged(status) => {
            let unread = status.unread_notifications();
            (unread > 0).then(|| format!("{}: {unread} unread notification(s)", status.group_id))
        }
        ViewEvent::SyncStateChanged { category, state } => {
            Some(format!("{category}: {state:?}"))
        }
        ViewEvent::PostInserted(_)
        | ViewEvent::PostPatched { .. }
        | ViewEvent::CommentAdded(_)
        | ViewEvent::ProfileChanged { .. } => None,
    }
}
