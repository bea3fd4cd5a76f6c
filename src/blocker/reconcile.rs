use std::{sync::Arc, time::Duration};

use tokio::time::{self, MissedTickBehavior};

use crate::store::BlockFlag;

use super::{coordinator::BlockCoordinator, tab::TabShared};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// What one poll of the shared store asks the tab to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    Nothing,
    /// The site was removed from the rules while this tab shows the block
    /// screen.
    ReloadAfterRemoval,
    /// The flag changed to `false` while this tab shows the block screen.
    ReloadAfterUnblock,
    /// Another tab blocked the site while this one is still showing content.
    BlockFromElsewhere,
}

/// `seen` is the flag from the tab's previous read or write. Only a change to
/// `Unblocked` lifts a block; a `false` left over from before is not a
/// signal, and neither is `Absent`.
pub fn decide(
    still_configured: bool,
    seen: BlockFlag,
    flag: BlockFlag,
    locally_blocked: bool,
) -> ReconcileAction {
    match (still_configured, flag, locally_blocked) {
        (false, _, true) => ReconcileAction::ReloadAfterRemoval,
        (true, BlockFlag::Unblocked, true) if seen != BlockFlag::Unblocked => {
            ReconcileAction::ReloadAfterUnblock
        }
        (true, BlockFlag::Blocked, false) => ReconcileAction::BlockFromElsewhere,
        _ => ReconcileAction::Nothing,
    }
}

/// Polls the store until the tab is torn down or reloads.
pub(crate) async fn reconcile_loop(
    coordinator: BlockCoordinator,
    shared: Arc<TabShared>,
    poll_interval: Duration,
) {
    let mut ticker = time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; attach has just read the store.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shared.teardown.cancelled() => {
                log_debug!("{}: reconciliation stopped", shared.domain);
                break;
            }
            _ = ticker.tick() => {
                let action = coordinator.reconcile_once(&shared).await;
                if action != ReconcileAction::Nothing {
                    log_info!("{}: {:?}", shared.domain, action);
                }
                if matches!(
                    action,
                    ReconcileAction::ReloadAfterRemoval | ReconcileAction::ReloadAfterUnblock
                ) {
                    break;
                }
            }
        }
    }
}
