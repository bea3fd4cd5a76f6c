pub mod blocker;
pub mod cli;
pub mod control;
pub mod db;
pub mod domain;
pub mod rules;
pub mod session;
pub mod settings;
pub mod store;
pub mod surface;
mod utils;

use clap::Parser;

pub use blocker::{AttachOutcome, BlockCoordinator, Tab};
pub use rules::{RuleRejection, RuleRepository, RuleSet};
pub use store::{BlockFlag, KvStore, MemoryStore};
pub use surface::{PageSurface, Severity};

pub fn run() -> anyhow::Result<()> {
    // RUST_LOG wins; SCROLLGUARD_DEBUG=1 turns on debug output otherwise.
    let debug_mode = std::env::var("SCROLLGUARD_DEBUG")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    let level = if debug_mode {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let args = cli::Args::parse();

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(cli::execute(args))
}
