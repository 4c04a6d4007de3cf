use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::{error, info, warn};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use tokio::sync::oneshot;

use super::Storage;

type StoreTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum StoreCommand {
    Execute(StoreTask),
    Shutdown,
}

struct SqliteStorageInner {
    sender: mpsc::Sender<StoreCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for SqliteStorageInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(StoreCommand::Shutdown) {
                error!("Failed to send shutdown to storage thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join storage thread: {join_err:?}");
            }
        }
    }
}

/// Durable key-value backend on SQLite.
///
/// All connection access happens on one dedicated worker thread; callers
/// submit closures over an mpsc channel and await the reply on a oneshot.
/// This keeps the blocking rusqlite API off the async runtime and gives
/// every `set` mapping a single transaction.
#[derive(Clone)]
pub struct SqliteStorage {
    inner: Arc<SqliteStorageInner>,
    db_path: Arc<PathBuf>,
}

impl SqliteStorage {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create storage directory {}", parent.display())
            })?;
        }

        let (command_tx, command_rx) = mpsc::channel::<StoreCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("watchwise-store".into())
            .spawn(move || {
                let mut conn = match Connection::open(&path_for_thread) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(anyhow::Error::new(err)
                            .context("failed to open SQLite storage")));
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {err}");
                }

                let init_result = init_schema(&conn).context("failed to initialize storage schema");
                if ready_tx.send(init_result).is_err() {
                    error!("Storage initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        StoreCommand::Execute(task) => {
                            task(&mut conn);
                        }
                        StoreCommand::Shutdown => break,
                    }
                }

                info!("Storage thread shutting down");
            })
            .with_context(|| "failed to spawn storage worker thread")?;

        ready_rx
            .recv()
            .context("storage worker exited before signaling readiness")??;

        info!("Storage initialized at {}", db_path.as_path().display());

        Ok(Self {
            inner: Arc::new(SqliteStorageInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = StoreCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("Storage caller dropped before receiving result");
            }
        }));

        sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to storage thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("storage thread terminated unexpectedly"))?
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS kv (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )
    .with_context(|| "failed to create kv table")?;
    Ok(())
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>> {
        let keys: Vec<String> = keys.iter().map(|key| (*key).to_string()).collect();
        self.execute(move |conn| {
            let mut stmt = conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
            let mut found = HashMap::new();
            for key in keys {
                let raw: Option<String> = stmt
                    .query_row(params![key], |row| row.get(0))
                    .optional()
                    .with_context(|| format!("failed to read key '{key}'"))?;
                if let Some(raw) = raw {
                    match serde_json::from_str(&raw) {
                        Ok(value) => {
                            found.insert(key, value);
                        }
                        Err(err) => {
                            warn!("dropping unreadable value for key '{key}': {err}");
                        }
                    }
                }
            }
            Ok(found)
        })
        .await
    }

    async fn set(&self, entries: HashMap<String, Value>) -> Result<()> {
        self.execute(move |conn| {
            let tx = conn.transaction().with_context(|| "failed to open transaction")?;
            for (key, value) in &entries {
                let raw = serde_json::to_string(value)
                    .with_context(|| format!("failed to serialize value for key '{key}'"))?;
                tx.execute(
                    "INSERT INTO kv (key, value) VALUES (?1, ?2)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                    params![key, raw],
                )
                .with_context(|| format!("failed to write key '{key}'"))?;
            }
            tx.commit().with_context(|| "failed to commit write")?;
            Ok(())
        })
        .await
    }

    async fn clear(&self) -> Result<()> {
        self.execute(|conn| {
            conn.execute("DELETE FROM kv", [])
                .with_context(|| "failed to clear storage")?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open(tmp: &TempDir) -> SqliteStorage {
        SqliteStorage::new(tmp.path().join("watchwise.sqlite3")).unwrap()
    }

    #[tokio::test]
    async fn values_survive_reopen() {
        let tmp = TempDir::new().unwrap();
        {
            let storage = open(&tmp);
            storage
                .set(HashMap::from([(
                    "videos".to_string(),
                    serde_json::json!([{ "id": "abc" }]),
                )]))
                .await
                .unwrap();
        }

        let storage = open(&tmp);
        let found = storage.get(&["videos"]).await.unwrap();
        assert_eq!(found["videos"][0]["id"], serde_json::json!("abc"));
    }

    #[tokio::test]
    async fn set_overwrites_and_clear_empties() {
        let tmp = TempDir::new().unwrap();
        let storage = open(&tmp);

        storage
            .set(HashMap::from([("flag".to_string(), Value::Bool(true))]))
            .await
            .unwrap();
        storage
            .set(HashMap::from([("flag".to_string(), Value::Bool(false))]))
            .await
            .unwrap();
        assert_eq!(
            storage.get(&["flag"]).await.unwrap()["flag"],
            Value::Bool(false)
        );

        storage.clear().await.unwrap();
        assert!(storage.get(&["flag"]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_keys_are_simply_absent() {
        let tmp = TempDir::new().unwrap();
        let storage = open(&tmp);
        assert!(storage.get(&["nope"]).await.unwrap().is_empty());
    }
}
