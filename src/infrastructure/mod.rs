use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{activity::ActivityFilter, errors::DomainError, preferences::UserPreferences};

pub mod in_memory_preferences_repository;
pub mod snapshot_preferences_repository;

use in_memory_preferences_repository::InMemoryPreferencesRepository;
use snapshot_preferences_repository::SnapshotPreferencesRepository;

/// Document store holding one preferences document per user id.
///
/// Each call is atomic on its own; nothing spans two calls.
#[async_trait]
pub trait PreferencesRepository: Send + Sync {
    async fn find(&self, user_id: &str) -> Result<Option<UserPreferences>, DomainError>;

    /// Inserts a new document, failing with a conflict when the id exists.
    async fn insert(&self, preferences: UserPreferences) -> Result<UserPreferences, DomainError>;

    /// Stores `preferences` under its id, replacing any existing document.
    async fn replace(&self, preferences: UserPreferences) -> Result<UserPreferences, DomainError>;

    /// Sets `last_activity = at`, creating a blank document when absent.
    async fn touch(&self, user_id: &str, at: DateTime<Utc>) -> Result<(), DomainError>;

    /// Removes every document whose last activity is before `cutoff`.
    async fn delete_inactive(&self, cutoff: DateTime<Utc>) -> Result<u64, DomainError>;

    async fn count(&self, filter: ActivityFilter) -> Result<u64, DomainError>;

    /// Flushes buffered state to durable storage. Stores without a
    /// write-ahead log have nothing to do.
    async fn checkpoint(&self) -> Result<(), DomainError> {
        Ok(())
    }

    /// Cheap liveness check used by the health endpoint.
    async fn ping(&self) -> Result<(), DomainError> {
        self.count(ActivityFilter::All).await.map(|_| ())
    }
}

/// Opens the snapshot store at `data_file`, or an in-memory store when no
/// file is configured. Also returns a label for health output.
pub async fn open_store(
    data_file: Option<&Path>,
) -> Result<(Arc<dyn PreferencesRepository>, &'static str), DomainError> {
    match data_file {
        Some(path) => {
            let repository = SnapshotPreferencesRepository::open(path).await?;
            Ok((Arc::new(repository), "snapshot"))
        }
        None => Ok((Arc::new(InMemoryPreferencesRepository::new()), "memory")),
    }
}
