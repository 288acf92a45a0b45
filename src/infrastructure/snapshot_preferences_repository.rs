//! File-backed preferences store.
//!
//! Documents live in memory. Every mutation is first appended to a
//! MessagePack write-ahead log next to the snapshot file and only applied to
//! memory once the append succeeded, so a failed write leaves memory and disk
//! in agreement. After `checkpoint_threshold` log entries the whole
//! collection is rewritten as a snapshot (temp file, fsync, rename) and the
//! log is truncated. Opening replays the log on top of the last snapshot.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::{
    fs::OpenOptions,
    io::AsyncWriteExt,
    sync::{Mutex, RwLock},
};
use tracing::{debug, info, warn};

use crate::{
    domain::{activity::ActivityFilter, errors::DomainError, preferences::UserPreferences},
    infrastructure::PreferencesRepository,
};

const SNAPSHOT_VERSION: u32 = 1;
pub const DEFAULT_CHECKPOINT_THRESHOLD: usize = 1000;

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    version: u32,
    saved_at: DateTime<Utc>,
    documents: Vec<UserPreferences>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum WalEntry {
    Upsert(UserPreferences),
    Touch { user_id: String, at: DateTime<Utc> },
    DeleteInactive { cutoff: DateTime<Utc> },
}

impl WalEntry {
    /// Activity refreshes are frequent and cheap to lose; document writes
    /// and deletions are synced to disk before they become visible.
    fn needs_sync(&self) -> bool {
        !matches!(self, Self::Touch { .. })
    }

    fn apply(self, documents: &mut HashMap<String, UserPreferences>) -> u64 {
        match self {
            Self::Upsert(document) => {
                documents.insert(document.user_id.clone(), document);
                1
            }
            Self::Touch { user_id, at } => {
                documents
                    .entry(user_id)
                    .and_modify(|document| {
                        document.last_activity = at;
                        document.updated_at = at;
                    })
                    .or_insert_with_key(|user_id| UserPreferences::blank(user_id.as_str(), at));
                1
            }
            Self::DeleteInactive { cutoff } => {
                let before = documents.len();
                documents.retain(|_, document| document.last_activity >= cutoff);
                u64::try_from(before - documents.len()).unwrap_or(u64::MAX)
            }
        }
    }
}

#[derive(Debug, Default)]
struct Journal {
    entries_since_checkpoint: usize,
}

pub struct SnapshotPreferencesRepository {
    snapshot_path: PathBuf,
    wal_path: PathBuf,
    checkpoint_threshold: usize,
    documents: RwLock<HashMap<String, UserPreferences>>,
    // Serializes log-then-apply so entries hit the log in mutation order.
    journal: Mutex<Journal>,
}

impl SnapshotPreferencesRepository {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, DomainError> {
        let snapshot_path = path.as_ref().to_path_buf();
        let wal_path = snapshot_path.with_extension("wal");

        let mut documents: HashMap<String, UserPreferences> = load_snapshot(&snapshot_path)
            .await?
            .into_iter()
            .map(|document| (document.user_id.clone(), document))
            .collect();

        let entries = read_wal(&wal_path).await?;
        let replayed = entries.len();
        for entry in entries {
            entry.apply(&mut documents);
        }
        if replayed > 0 {
            info!(path = %wal_path.display(), entries = replayed, "replayed write-ahead log");
        }

        Ok(Self {
            snapshot_path,
            wal_path,
            checkpoint_threshold: DEFAULT_CHECKPOINT_THRESHOLD,
            documents: RwLock::new(documents),
            journal: Mutex::new(Journal {
                entries_since_checkpoint: replayed,
            }),
        })
    }

    pub fn with_checkpoint_threshold(mut self, threshold: usize) -> Self {
        self.checkpoint_threshold = threshold.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Appends `entry` to the log, then applies it to memory. Nothing is
    /// applied when the append fails. Callers hold the journal lock across
    /// any precondition check.
    async fn commit(&self, journal: &mut Journal, entry: WalEntry) -> Result<u64, DomainError> {
        self.append(&entry).await?;
        let affected = entry.apply(&mut *self.documents.write().await);
        journal.entries_since_checkpoint += 1;

        if journal.entries_since_checkpoint >= self.checkpoint_threshold {
            // The log already holds every entry, so a failed checkpoint only
            // delays compaction.
            match self.write_checkpoint().await {
                Ok(()) => journal.entries_since_checkpoint = 0,
                Err(err) => warn!(error = %err, "snapshot checkpoint failed"),
            }
        }
        Ok(affected)
    }

    async fn append(&self, entry: &WalEntry) -> Result<(), DomainError> {
        let bytes = rmp_serde::to_vec_named(entry)
            .map_err(|err| DomainError::storage(format!("failed to encode log entry: {err}")))?;
        let len = u32::try_from(bytes.len())
            .map_err(|_| DomainError::storage("log entry too large"))?;

        ensure_parent(&self.wal_path).await?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.wal_path)
            .await
            .map_err(|err| io_error("open write-ahead log", err))?;

        let mut frame = Vec::with_capacity(4 + bytes.len());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&bytes);
        file.write_all(&frame)
            .await
            .map_err(|err| io_error("append write-ahead log", err))?;
        file.flush()
            .await
            .map_err(|err| io_error("flush write-ahead log", err))?;
        if entry.needs_sync() {
            file.sync_data()
                .await
                .map_err(|err| io_error("sync write-ahead log", err))?;
        }
        Ok(())
    }

    /// Rewrites the snapshot and truncates the log.
    pub async fn checkpoint(&self) -> Result<(), DomainError> {
        let mut journal = self.journal.lock().await;
        self.write_checkpoint().await?;
        journal.entries_since_checkpoint = 0;
        Ok(())
    }

    async fn write_checkpoint(&self) -> Result<(), DomainError> {
        let snapshot = SnapshotFile {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            documents: self.documents.read().await.values().cloned().collect(),
        };
        let bytes = rmp_serde::to_vec_named(&snapshot)
            .map_err(|err| DomainError::storage(format!("failed to encode snapshot: {err}")))?;

        ensure_parent(&self.snapshot_path).await?;
        let temp_path = self.snapshot_path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&temp_path)
            .await
            .map_err(|err| io_error("create temp snapshot", err))?;
        file.write_all(&bytes)
            .await
            .map_err(|err| io_error("write snapshot", err))?;
        file.sync_all()
            .await
            .map_err(|err| io_error("sync snapshot", err))?;
        drop(file);

        tokio::fs::rename(&temp_path, &self.snapshot_path)
            .await
            .map_err(|err| io_error("rename snapshot", err))?;

        tokio::fs::File::create(&self.wal_path)
            .await
            .map_err(|err| io_error("truncate write-ahead log", err))?;

        debug!(
            path = %self.snapshot_path.display(),
            documents = snapshot.documents.len(),
            "snapshot checkpoint written"
        );
        Ok(())
    }

    #[cfg(test)]
    async fn entries_since_checkpoint(&self) -> usize {
        self.journal.lock().await.entries_since_checkpoint
    }
}

async fn load_snapshot(path: &Path) -> Result<Vec<UserPreferences>, DomainError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "no snapshot yet, starting empty");
            return Ok(Vec::new());
        }
        Err(err) => {
            return Err(DomainError::storage(format!(
                "failed to read snapshot {}: {err}",
                path.display()
            )));
        }
    };

    let snapshot: SnapshotFile = rmp_serde::from_slice(&bytes).map_err(|err| {
        DomainError::storage(format!("failed to decode snapshot {}: {err}", path.display()))
    })?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(DomainError::storage(format!(
            "unsupported snapshot version {} in {}",
            snapshot.version,
            path.display()
        )));
    }
    info!(
        path = %path.display(),
        documents = snapshot.documents.len(),
        saved_at = %snapshot.saved_at,
        "loaded preferences snapshot"
    );
    Ok(snapshot.documents)
}

/// Reads every complete frame. A torn final frame from an interrupted append
/// is dropped; an undecodable complete frame is an error.
async fn read_wal(path: &Path) -> Result<Vec<WalEntry>, DomainError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(io_error("read write-ahead log", err)),
    };

    let mut entries = Vec::new();
    let mut rest = bytes.as_slice();
    while !rest.is_empty() {
        let Some((len_bytes, tail)) = rest.split_first_chunk::<4>() else {
            warn!(path = %path.display(), "dropping torn write-ahead log header");
            break;
        };
        let len = u32::from_le_bytes(*len_bytes) as usize;
        if tail.len() < len {
            warn!(path = %path.display(), "dropping torn write-ahead log entry");
            break;
        }
        let (frame, tail) = tail.split_at(len);
        let entry = rmp_serde::from_slice(frame).map_err(|err| {
            DomainError::storage(format!(
                "failed to decode write-ahead log {}: {err}",
                path.display()
            ))
        })?;
        entries.push(entry);
        rest = tail;
    }
    Ok(entries)
}

async fn ensure_parent(path: &Path) -> Result<(), DomainError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|err| io_error("create data directory", err))?;
    }
    Ok(())
}

fn io_error(action: &str, err: std::io::Error) -> DomainError {
    DomainError::storage(format!("failed to {action}: {err}"))
}

#[async_trait]
impl PreferencesRepository for SnapshotPreferencesRepository {
    async fn find(&self, user_id: &str) -> Result<Option<UserPreferences>, DomainError> {
        Ok(self.documents.read().await.get(user_id).cloned())
    }

    async fn insert(&self, preferences: UserPreferences) -> Result<UserPreferences, DomainError> {
        let mut journal = self.journal.lock().await;
        if self.documents.read().await.contains_key(&preferences.user_id) {
            return Err(DomainError::conflict("user already exists"));
        }
        self.commit(&mut journal, WalEntry::Upsert(preferences.clone()))
            .await?;
        Ok(preferences)
    }

    async fn replace(&self, mut preferences: UserPreferences) -> Result<UserPreferences, DomainError> {
        preferences.updated_at = Utc::now();
        let mut journal = self.journal.lock().await;
        self.commit(&mut journal, WalEntry::Upsert(preferences.clone()))
            .await?;
        Ok(preferences)
    }

    async fn touch(&self, user_id: &str, at: DateTime<Utc>) -> Result<(), DomainError> {
        let mut journal = self.journal.lock().await;
        self.commit(
            &mut journal,
            WalEntry::Touch {
                user_id: user_id.to_string(),
                at,
            },
        )
        .await
        .map(|_| ())
    }

    async fn delete_inactive(&self, cutoff: DateTime<Utc>) -> Result<u64, DomainError> {
        let mut journal = self.journal.lock().await;
        let stale = self
            .documents
            .read()
            .await
            .values()
            .any(|document| document.last_activity < cutoff);
        if !stale {
            return Ok(0);
        }
        self.commit(&mut journal, WalEntry::DeleteInactive { cutoff })
            .await
    }

    async fn count(&self, filter: ActivityFilter) -> Result<u64, DomainError> {
        let matched = self
            .documents
            .read()
            .await
            .values()
            .filter(|document| filter.matches(document.last_activity))
            .count();
        Ok(u64::try_from(matched).unwrap_or(u64::MAX))
    }

    async fn checkpoint(&self) -> Result<(), DomainError> {
        SnapshotPreferencesRepository::checkpoint(self).await
    }
}
