//! Block decisions and cross-tab reconciliation.

pub mod coordinator;
pub mod reconcile;
pub mod tab;

pub use coordinator::{BlockCoordinator, DEFAULT_POLL_INTERVAL, TRIP_NOTICE};
pub use reconcile::{decide, ReconcileAction};
pub use tab::{AttachOutcome, Tab};
