//! What a tab shows. Surfaces only render; they never touch the store.

use std::sync::Mutex;

use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

pub trait PageSurface: Send + Sync {
    fn show_block_screen(&self, domain: &str);

    fn show_transient_notice(&self, message: &str, severity: Severity);

    /// Drops the page and loads it again from scratch.
    fn reload(&self);
}

/// Prints to stdout; used by the `tab` command.
#[derive(Debug, Default)]
pub struct ConsoleSurface;

impl PageSurface for ConsoleSurface {
    fn show_block_screen(&self, domain: &str) {
        println!("[blocked] Time's up on {domain}. Come back later.");
    }

    fn show_transient_notice(&self, message: &str, severity: Severity) {
        let tag = match severity {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        println!("[{tag}] {message}");
    }

    fn reload(&self) {
        println!("[reload]");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    BlockScreen(String),
    Notice(String, Severity),
    Reload,
}

/// Keeps every command it receives, in order.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    events: Mutex<Vec<SurfaceEvent>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SurfaceEvent> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn block_screens(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, SurfaceEvent::BlockScreen(_)))
            .count()
    }

    pub fn reloads(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, SurfaceEvent::Reload))
            .count()
    }

    fn push(&self, event: SurfaceEvent) {
        match self.events.lock() {
            Ok(mut guard) => guard.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

impl PageSurface for RecordingSurface {
    fn show_block_screen(&self, domain: &str) {
        self.push(SurfaceEvent::BlockScreen(domain.to_string()));
    }

    fn show_transient_notice(&self, message: &str, severity: Severity) {
        self.push(SurfaceEvent::Notice(message.to_string(), severity));
    }

    fn reload(&self) {
        self.push(SurfaceEvent::Reload);
    }
}
