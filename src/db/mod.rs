//! SQLite-backed shared store.
//!
//! A single thread owns the connection and serves typed key/value requests
//! from an mpsc queue; each request carries a oneshot for its reply. Several
//! processes can point at the same file.

use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use log::{error, info};
use rusqlite::Connection;
use serde_json::Value;
use tokio::sync::oneshot;

mod helpers;
mod migrations;
mod repositories;

use migrations::run_migrations;
use repositories::kv;

type Reply<T> = oneshot::Sender<Result<T>>;

enum StoreRequest {
    Get { key: String, reply: Reply<Option<Value>> },
    Set { key: String, value: Value, reply: Reply<()> },
    Remove { key: String, reply: Reply<()> },
    LastUpdated { key: String, reply: Reply<Option<DateTime<Utc>>> },
}

impl StoreRequest {
    fn serve(self, conn: &Connection) {
        let delivered = match self {
            StoreRequest::Get { key, reply } => reply.send(kv::select_value(conn, &key)).is_ok(),
            StoreRequest::Set { key, value, reply } => {
                reply.send(kv::upsert_value(conn, &key, &value)).is_ok()
            }
            StoreRequest::Remove { key, reply } => reply.send(kv::delete_value(conn, &key)).is_ok(),
            StoreRequest::LastUpdated { key, reply } => {
                reply.send(kv::select_updated_at(conn, &key)).is_ok()
            }
        };
        if !delivered {
            error!("Store caller went away before its reply");
        }
    }
}

/// Owns the request queue and the thread serving it. Dropping it closes the
/// queue, which ends the thread, then waits for it.
struct StoreWorker {
    requests: Option<mpsc::Sender<StoreRequest>>,
    thread: Option<JoinHandle<()>>,
}

impl Drop for StoreWorker {
    fn drop(&mut self) {
        self.requests.take();
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                error!("Store thread panicked");
            }
        }
    }
}

#[derive(Clone)]
pub struct Database {
    worker: Arc<StoreWorker>,
}

impl Database {
    /// Opens (creating if needed) the store at `path` and brings its schema
    /// up to date before returning.
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create store directory {}", parent.display()))?;
        }

        let (request_tx, request_rx) = mpsc::channel::<StoreRequest>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let thread_path = path.clone();

        let thread = thread::Builder::new()
            .name("scrollguard-store".into())
            .spawn(move || {
                let conn = match open_connection(&thread_path) {
                    Ok(conn) => {
                        let _ = ready_tx.send(Ok(()));
                        conn
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };

                for request in request_rx {
                    request.serve(&conn);
                }
                info!("Store thread for {} stopped", thread_path.display());
            })
            .context("failed to spawn store thread")?;

        ready_rx
            .recv()
            .context("store thread exited before it was ready")??;
        info!("Store opened at {}", path.display());

        Ok(Self {
            worker: Arc::new(StoreWorker {
                requests: Some(request_tx),
                thread: Some(thread),
            }),
        })
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> StoreRequest) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.worker
            .requests
            .as_ref()
            .ok_or_else(|| anyhow!("store is closed"))?
            .send(build(reply_tx))
            .map_err(|_| anyhow!("store thread has stopped"))?;
        reply_rx
            .await
            .map_err(|_| anyhow!("store thread dropped the request"))?
    }
}

fn open_connection(path: &Path) -> Result<Connection> {
    let mut conn = Connection::open(path).context("failed to open SQLite store")?;
    if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
        error!("Failed to enable WAL mode: {err}");
    }
    run_migrations(&mut conn).context("failed to run store migrations")?;
    Ok(conn)
}
