//! Durable, lock-protected action ledger.

use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use log::{debug, info, warn};
use once_cell::sync::Lazy;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::action::{Action, Change};
use crate::error::{LedgerError, Result};
use crate::transport::{FailureMarkers, Transport};

/// Result of a successful undo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoReport {
    pub id: u64,
    /// Inverse commands that were replayed, in order.
    pub commands: Vec<String>,
}

struct Inner {
    actions: Vec<Action>,
    next_id: u64,
}

/// State of every ledger file open in this process, keyed by canonical path.
static OPEN_LEDGERS: Lazy<Mutex<HashMap<PathBuf, Weak<Mutex<Inner>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Append-only history of executed changes, persisted as a JSON array.
///
/// All reads and writes go through one mutex, which is never held across
/// an `.await`. Handles opened on the same file in one process share that
/// mutex and the id counter. Ids only grow while any handle is alive,
/// including across [`Ledger::clear`].
pub struct Ledger {
    path: PathBuf,
    markers: FailureMarkers,
    inner: Arc<Mutex<Inner>>,
}

impl Ledger {
    /// Open (or create) the ledger file at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| LedgerError::io("creating ledger directory", parent, e))?;
        }

        let mut open = OPEN_LEDGERS.lock().map_err(|_| LedgerError::Poisoned)?;
        if !path.exists() {
            write_atomic(&path, b"[]")?;
        }
        let key = fs::canonicalize(&path)
            .map_err(|e| LedgerError::io("resolving ledger path", &path, e))?;

        open.retain(|_, state| state.strong_count() > 0);
        let inner = match open.get(&key).and_then(Weak::upgrade) {
            Some(shared) => {
                debug!("sharing open ledger {}", key.display());
                shared
            }
            None => {
                let actions = load(&path)?;
                let next_id = actions.iter().map(|a| a.id).max().unwrap_or(0) + 1;
                debug!(
                    "opened ledger {} with {} actions",
                    path.display(),
                    actions.len()
                );
                let shared = Arc::new(Mutex::new(Inner { actions, next_id }));
                open.insert(key, Arc::downgrade(&shared));
                shared
            }
        };

        Ok(Self {
            path,
            markers: FailureMarkers::default(),
            inner,
        })
    }

    /// Failure markers used to judge inverse command output during undo.
    pub fn with_failure_markers(mut self, markers: FailureMarkers) -> Self {
        self.markers = markers;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> std::result::Result<MutexGuard<'_, Inner>, LedgerError> {
        self.inner.lock().map_err(|_| LedgerError::Poisoned)
    }

    /// Append a change and persist the ledger before returning its id.
    pub fn record(&self, change: Change) -> Result<u64> {
        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(LedgerError::Clock)?;

        let mut inner = self.lock()?;
        let id = inner.next_id;
        info!("[{}] {}", id, change);
        inner.actions.push(Action {
            id,
            timestamp,
            change,
        });

        if let Err(e) = persist(&self.path, &inner.actions) {
            inner.actions.pop();
            return Err(e);
        }
        inner.next_id += 1;
        Ok(id)
    }

    /// Snapshot of every recorded action, oldest first.
    pub fn list_actions(&self) -> Result<Vec<Action>> {
        Ok(self.lock()?.actions.clone())
    }

    pub fn get(&self, id: u64) -> Result<Option<Action>> {
        Ok(self.lock()?.actions.iter().find(|a| a.id == id).cloned())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.actions.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Drop every action. Irreversible.
    pub fn clear(&self) -> Result<()> {
        let mut inner = self.lock()?;
        persist(&self.path, &[])?;
        inner.actions.clear();
        info!("ledger cleared");
        Ok(())
    }

    /// Replay the inverse commands of action `id`.
    ///
    /// Stops at the first command that fails; everything before it stays
    /// applied. The action itself is left in the ledger.
    pub async fn undo<T: Transport>(&self, id: u64, transport: &T) -> Result<UndoReport> {
        let action = self.get(id)?.ok_or(LedgerError::ActionNotFound(id))?;
        let inverse = action.change.inverse_commands();
        if inverse.is_empty() {
            return Err(LedgerError::NothingToUndo(id).into());
        }

        let mut commands = Vec::with_capacity(inverse.len());
        for command in inverse {
            let cause = match transport.execute(command).await {
                Ok(output) => output.failure(&self.markers),
                Err(e) => Some(e.to_string()),
            };
            if let Some(cause) = cause {
                warn!(
                    "undo of action {} stopped after {} of {} commands",
                    id,
                    commands.len(),
                    inverse.len()
                );
                return Err(LedgerError::UndoFailed {
                    command: command.clone(),
                    cause,
                }
                .into());
            }
            commands.push(command.clone());
        }

        info!("undid action {} ({})", id, action.change.kind());
        Ok(UndoReport { id, commands })
    }
}

fn load(path: &Path) -> Result<Vec<Action>> {
    let content = fs::read_to_string(path).map_err(|e| LedgerError::io("reading ledger", path, e))?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    let actions = serde_json::from_str(&content).map_err(|source| LedgerError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(actions)
}

fn persist(path: &Path, actions: &[Action]) -> Result<()> {
    let content = serde_json::to_vec_pretty(actions).map_err(|source| LedgerError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    write_atomic(path, &content)
}

/// Write to a sibling temp file, then rename over the target.
fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let mut tmp = OsString::from(path.as_os_str());
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, content).map_err(|e| LedgerError::io("writing ledger", &tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| LedgerError::io("replacing ledger", path, e))?;
    Ok(())
}
