use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{
    domain::{activity::ActivityFilter, errors::DomainError, preferences::UserPreferences},
    infrastructure::PreferencesRepository,
};

#[derive(Default)]
pub struct InMemoryPreferencesRepository {
    documents: RwLock<HashMap<String, UserPreferences>>,
}

impl InMemoryPreferencesRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents(documents: impl IntoIterator<Item = UserPreferences>) -> Self {
        let documents = documents
            .into_iter()
            .map(|document| (document.user_id.clone(), document))
            .collect();
        Self {
            documents: RwLock::new(documents),
        }
    }
}

#[async_trait]
impl PreferencesRepository for InMemoryPreferencesRepository {
    async fn find(&self, user_id: &str) -> Result<Option<UserPreferences>, DomainError> {
        Ok(self.documents.read().await.get(user_id).cloned())
    }

    async fn insert(&self, preferences: UserPreferences) -> Result<UserPreferences, DomainError> {
        let mut documents = self.documents.write().await;
        if documents.contains_key(&preferences.user_id) {
            return Err(DomainError::conflict("user already exists"));
        }

        documents.insert(preferences.user_id.clone(), preferences.clone());
        Ok(preferences)
    }

    async fn replace(&self, mut preferences: UserPreferences) -> Result<UserPreferences, DomainError> {
        preferences.updated_at = Utc::now();
        self.documents
            .write()
            .await
            .insert(preferences.user_id.clone(), preferences.clone());
        Ok(preferences)
    }

    async fn touch(&self, user_id: &str, at: DateTime<Utc>) -> Result<(), DomainError> {
        self.documents
            .write()
            .await
            .entry(user_id.to_string())
            .and_modify(|document| {
                document.last_activity = at;
                document.updated_at = at;
            })
            .or_insert_with(|| UserPreferences::blank(user_id, at));
        Ok(())
    }

    async fn delete_inactive(&self, cutoff: DateTime<Utc>) -> Result<u64, DomainError> {
        let mut documents = self.documents.write().await;
        let before = documents.len();
        documents.retain(|_, document| document.last_activity >= cutoff);
        Ok(u64::try_from(before - documents.len()).unwrap_or(u64::MAX))
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
}
