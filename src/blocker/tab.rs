use std::sync::Arc;

use tokio::{
    sync::{
        mpsc::{self, error::TrySendError},
        Mutex,
    },
    task::JoinHandle,
    time::Instant,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::store::BlockFlag;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error};

/// How a tab's attach went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    /// No rule covers the host; nothing runs.
    Unmatched,
    /// The site was already blocked; the block screen is up and only
    /// reconciliation runs.
    AlreadyBlocked,
    /// Scroll time is being tracked.
    Tracking,
}

#[derive(Debug, Default)]
pub(crate) struct TabView {
    pub blocked: bool,
    pub reloaded: bool,
    /// The block flag as this tab last read or wrote it.
    pub last_flag: BlockFlag,
    /// A local trip whose `true` has not reached the store yet.
    pub flag_pending: bool,
}

/// State shared by one tab's session task and its reconciliation task.
pub(crate) struct TabShared {
    pub id: Uuid,
    pub domain: String,
    pub view: Mutex<TabView>,
    /// Cancelled to stop scroll tracking only.
    pub tracking: CancellationToken,
    /// Cancelled on teardown or reload; parent of `tracking`.
    pub teardown: CancellationToken,
}

impl TabShared {
    /// `flag` is the block flag read at attach.
    pub fn new(domain: String, flag: BlockFlag) -> Self {
        let teardown = CancellationToken::new();
        Self {
            id: Uuid::new_v4(),
            domain,
            view: Mutex::new(TabView {
                blocked: flag.is_blocked(),
                reloaded: false,
                last_flag: flag,
                flag_pending: false,
            }),
            tracking: teardown.child_token(),
            teardown,
        }
    }
}

/// One page load on a host. Dropping the last activity sender or calling
/// [`Tab::teardown`] discards all of its in-memory state.
pub struct Tab {
    host: String,
    outcome: AttachOutcome,
    shared: Option<Arc<TabShared>>,
    activity: Option<mpsc::Sender<Instant>>,
    tasks: Vec<JoinHandle<()>>,
}

impl Tab {
    pub(crate) fn unmatched(host: String) -> Self {
        Self {
            host,
            outcome: AttachOutcome::Unmatched,
            shared: None,
            activity: None,
            tasks: Vec::new(),
        }
    }

    pub(crate) fn attached(
        host: String,
        outcome: AttachOutcome,
        shared: Arc<TabShared>,
        activity: Option<mpsc::Sender<Instant>>,
        tasks: Vec<JoinHandle<()>>,
    ) -> Self {
        Self {
            host,
            outcome,
            shared: Some(shared),
            activity,
            tasks,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// The configured rule this tab matched.
    pub fn domain(&self) -> Option<&str> {
        self.shared.as_ref().map(|s| s.domain.as_str())
    }

    pub fn outcome(&self) -> AttachOutcome {
        self.outcome
    }

    /// Reports one scroll event. Bursts beyond the channel's capacity are
    /// dropped.
    pub fn record_activity(&self) {
        let Some(tx) = &self.activity else {
            return;
        };
        match tx.try_send(Instant::now()) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(_)) => {
                log_debug!("{}: activity buffer full, event dropped", self.host);
            }
        }
    }

    pub async fn is_blocked(&self) -> bool {
        match &self.shared {
            Some(shared) => shared.view.lock().await.blocked,
            None => false,
        }
    }

    pub async fn is_reloaded(&self) -> bool {
        match &self.shared {
            Some(shared) => shared.view.lock().await.reloaded,
            None => false,
        }
    }

    /// Resolves once the tab has reloaded or been torn down. Never resolves
    /// for an unmatched tab.
    pub async fn stopped(&self) {
        match &self.shared {
            Some(shared) => shared.teardown.cancelled().await,
            None => std::future::pending().await,
        }
    }

    pub async fn teardown(mut self) {
        self.activity = None;
        if let Some(shared) = &self.shared {
            shared.teardown.cancel();
            log_debug!("tab {} on {} torn down", shared.id, shared.domain);
        }
        for task in self.tasks.drain(..) {
            if let Err(err) = task.await {
                log_error!("tab task failed to join: {err}");
            }
        }
    }
}

impl Drop for Tab {
    fn drop(&mut self) {
        if let Some(shared) = &self.shared {
            shared.teardown.cancel();
        }
    }
}
