use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::{
    blocker::{AttachOutcome, BlockCoordinator},
    control,
    db::Database,
    settings::SettingsStore,
    surface::{ConsoleSurface, PageSurface},
};

#[derive(Debug, Parser)]
#[command(name = "scrollguard", version, about = "Cap scroll time per site")]
pub struct Args {
    /// Settings file (JSON).
    #[arg(long, default_value = "scrollguard.json")]
    pub settings: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Edit the list of capped sites.
    Sites {
        #[command(subcommand)]
        action: SitesAction,
    },
    /// Set the limit used by sites without one of their own.
    Fallback { minutes: u64 },
    /// Set how often tabs re-read the shared store.
    Poll { millis: u64 },
    /// Show the rule and block state covering a host.
    Status { host: String },
    /// Simulate a tab on `url`; every stdin line is one scroll event.
    Tab { url: String },
}

#[derive(Debug, Subcommand)]
pub enum SitesAction {
    Add {
        domain: String,
        #[arg(long, default_value_t = 5)]
        minutes: u64,
    },
    Limit {
        domain: String,
        minutes: u64,
    },
    Remove {
        domain: String,
    },
    List,
}

pub async fn execute(args: Args) -> Result<()> {
    let settings = SettingsStore::new(args.settings)?;

    if let Command::Poll { millis } = args.command {
        let mut current = settings.current();
        current.poll_interval_ms = millis;
        settings.update(current)?;
        println!("Poll interval set to {millis} ms");
        return Ok(());
    }

    let current = settings.current();
    let db = Database::new(current.store_path.clone())?;
    let surface: Arc<dyn PageSurface> = Arc::new(ConsoleSurface);
    let coordinator = BlockCoordinator::new(Arc::new(db.clone()), surface.clone())
        .with_poll_interval(current.poll_interval());
    let rules = coordinator.rules();

    match args.command {
        Command::Sites { action } => {
            let notice = match action {
                SitesAction::Add { domain, minutes } => {
                    control::add_site(rules, &domain, minutes).await
                }
                SitesAction::Limit { domain, minutes } => {
                    control::set_site_limit(rules, &domain, minutes).await
                }
                SitesAction::Remove { domain } => control::remove_site(rules, &domain).await,
                SitesAction::List => {
                    let fallback = rules.fallback_limit().await / 60_000;
                    for row in control::list_sites(rules).await {
                        match row.limit_minutes {
                            Some(minutes) => println!("{}\t{} min", row.domain, minutes),
                            None => println!("{}\t{} min (default)", row.domain, fallback),
                        }
                    }
                    return Ok(());
                }
            };
            surface.show_transient_notice(&notice.message, notice.severity);
        }
        Command::Fallback { minutes } => {
            let notice = control::set_fallback_minutes(rules, minutes).await;
            surface.show_transient_notice(&notice.message, notice.severity);
        }
        Command::Status { host } => match coordinator.describe(&host).await {
            Some((domain, limit_ms, blocked)) => {
                let since = db
                    .last_updated(&crate::store::keys::blocked(&domain))
                    .await?
                    .map(|at| format!(" (since {})", at.to_rfc3339()))
                    .unwrap_or_default();
                let state = if blocked { "blocked" } else { "open" };
                println!("{domain}: limit {} s, {state}{since}", limit_ms / 1000);
            }
            None => println!("{host}: not capped"),
        },
        Command::Tab { url } => simulate_tab(&coordinator, &url).await?,
        Command::Poll { .. } => {}
    }

    Ok(())
}

async fn simulate_tab(coordinator: &BlockCoordinator, url: &str) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tab = coordinator.attach(url).await;

    loop {
        match tab.outcome() {
            AttachOutcome::Unmatched => println!("{} is not capped", tab.host()),
            AttachOutcome::AlreadyBlocked => println!("{} is blocked", tab.host()),
            AttachOutcome::Tracking => println!("tracking {}", tab.host()),
        }

        let reloaded = loop {
            tokio::select! {
                _ = tab.stopped() => break true,
                line = lines.next_line() => match line? {
                    Some(_) => tab.record_activity(),
                    None => break false,
                },
            }
        };

        if !reloaded {
            tab.teardown().await;
            return Ok(());
        }

        tab.teardown().await;
        tab = coordinator.attach(url).await;
    }
}
