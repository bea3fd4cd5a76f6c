use std::{sync::Arc, time::Duration};

use tokio::sync::mpsc;

use crate::{
    domain::normalize_host,
    rules::RuleRepository,
    session::{DriverExit, SessionDriver},
    store::{keys, read_block_flag, write_block_flag, BlockFlag, KvStore},
    surface::{PageSurface, Severity},
};

use super::{
    reconcile::{decide, reconcile_loop, ReconcileAction},
    tab::{AttachOutcome, Tab, TabShared},
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1500);
pub const TRIP_NOTICE: &str = "You scrolled too long. Take a break!";
const ACTIVITY_BUFFER: usize = 256;

/// Decides when a site becomes blocked and keeps each tab in step with the
/// shared store.
#[derive(Clone)]
pub struct BlockCoordinator {
    store: Arc<dyn KvStore>,
    rules: RuleRepository,
    surface: Arc<dyn PageSurface>,
    poll_interval: Duration,
}

impl BlockCoordinator {
    pub fn new(store: Arc<dyn KvStore>, surface: Arc<dyn PageSurface>) -> Self {
        Self {
            rules: RuleRepository::new(store.clone()),
            store,
            surface,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Attaches to a page at `url`. An unreachable store reads as "no rules".
    pub async fn attach(&self, url: &str) -> Tab {
        let host = normalize_host(url);
        let Some((domain, limit_ms)) = self.rules.resolve(&host).await else {
            return Tab::unmatched(host);
        };

        let flag = read_block_flag(self.store.as_ref(), &domain).await;
        if flag.is_blocked() {
            log_info!("{host}: {domain} already blocked");
            self.surface.show_block_screen(&domain);
            let shared = Arc::new(TabShared::new(domain, flag));
            let reconcile = tokio::spawn(reconcile_loop(
                self.clone(),
                shared.clone(),
                self.poll_interval,
            ));
            return Tab::attached(host, AttachOutcome::AlreadyBlocked, shared, None, vec![reconcile]);
        }

        log_info!("{host}: tracking scroll time against {domain} ({limit_ms} ms)");
        let shared = Arc::new(TabShared::new(domain, flag));
        let (tx, rx) = mpsc::channel(ACTIVITY_BUFFER);

        let session = tokio::spawn(track_session(
            self.clone(),
            shared.clone(),
            Duration::from_millis(limit_ms),
            rx,
        ));
        let reconcile = tokio::spawn(reconcile_loop(
            self.clone(),
            shared.clone(),
            self.poll_interval,
        ));

        Tab::attached(
            host,
            AttachOutcome::Tracking,
            shared,
            Some(tx),
            vec![session, reconcile],
        )
    }

    /// Shows the block screen and marks `domain` blocked for every tab.
    /// The local screen never waits on the store write. Returns whether the
    /// flag was stored.
    pub async fn trip(&self, domain: &str) -> bool {
        self.surface
            .show_transient_notice(TRIP_NOTICE, Severity::Warning);
        self.surface.show_block_screen(domain);

        let stored = write_block_flag(self.store.as_ref(), domain, true).await;
        if stored {
            log_info!("{domain} blocked");
        } else {
            log_warn!("{domain} blocked locally only; other tabs will not see it yet");
        }
        stored
    }

    /// One reconciliation poll. A store outage skips the poll rather than
    /// being read as "site removed". A trip whose flag write failed is
    /// retried here before anything else is decided.
    pub(crate) async fn reconcile_once(&self, shared: &TabShared) -> ReconcileAction {
        let rules = match self.rules.try_load_rules().await {
            Ok(rules) => rules,
            Err(err) => {
                log_warn!("{}: skipping poll, rules unreadable: {err:#}", shared.domain);
                return ReconcileAction::Nothing;
            }
        };
        let configured = rules.contains(&shared.domain);

        let mut view = shared.view.lock().await;
        if configured && view.flag_pending {
            if !write_block_flag(self.store.as_ref(), &shared.domain, true).await {
                return ReconcileAction::Nothing;
            }
            log_info!("{}: block reached the store", shared.domain);
            view.flag_pending = false;
            view.last_flag = BlockFlag::Blocked;
        }

        let flag = read_block_flag(self.store.as_ref(), &shared.domain).await;
        let action = decide(configured, view.last_flag, flag, view.blocked);
        view.last_flag = flag;
        match action {
            ReconcileAction::Nothing => {}
            ReconcileAction::ReloadAfterRemoval => {
                if let Err(err) = self
                    .store
                    .remove(&keys::accumulated_time(&shared.domain))
                    .await
                {
                    log_warn!("{}: failed to clear residual state: {err:#}", shared.domain);
                }
                view.blocked = false;
                view.reloaded = true;
                shared.teardown.cancel();
                self.surface.reload();
            }
            ReconcileAction::ReloadAfterUnblock => {
                view.blocked = false;
                view.reloaded = true;
                shared.teardown.cancel();
                self.surface.reload();
            }
            ReconcileAction::BlockFromElsewhere => {
                view.blocked = true;
                shared.tracking.cancel();
                self.surface.show_block_screen(&shared.domain);
            }
        }
        action
    }

    /// Current rule and block flag for a host, for status displays.
    pub async fn describe(&self, url: &str) -> Option<(String, u64, bool)> {
        let (domain, limit_ms) = self.rules.resolve(&normalize_host(url)).await?;
        let blocked = read_block_flag(self.store.as_ref(), &domain).await.is_blocked();
        Some((domain, limit_ms, blocked))
    }

    pub fn rules(&self) -> &RuleRepository {
        &self.rules
    }
}

async fn track_session(
    coordinator: BlockCoordinator,
    shared: Arc<TabShared>,
    limit: Duration,
    events: mpsc::Receiver<tokio::time::Instant>,
) {
    let driver = SessionDriver::new(shared.domain.clone(), limit, events, shared.tracking.clone());
    let DriverExit::Tripped { total } = driver.run().await else {
        return;
    };
    log_debug!("{}: {} ms scrolled this load", shared.domain, total.as_millis());

    // The rule may have been removed since attach. An unreadable store
    // still trips.
    if let Ok(rules) = coordinator.rules.try_load_rules().await {
        if !rules.contains(&shared.domain) {
            log_info!("{}: limit reached but the site is no longer listed", shared.domain);
            return;
        }
    }

    {
        let mut view = shared.view.lock().await;
        if view.blocked || view.reloaded {
            return;
        }
        view.blocked = true;
        view.flag_pending = true;
    }

    if coordinator.trip(&shared.domain).await {
        let mut view = shared.view.lock().await;
        view.flag_pending = false;
        view.last_flag = BlockFlag::Blocked;
    }
}
