//! Key-value persistence for analysis records.

use async_trait::async_trait;
use redis::AsyncCommands;
use thiserror::Error;
use uuid::Uuid;

use crate::models::analysis::{record_key, AnalysisRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("record serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// String key-value store with upsert semantics.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
}

/// Writes `record` under its derived key as JSON text.
pub async fn save_record(
    store: &dyn KeyValueStore,
    record: &AnalysisRecord,
) -> Result<(), StoreError> {
    let value = serde_json::to_string(record)?;
    store.set(&record.key(), &value).await
}

/// Reads the record stored for `id`, if any.
pub async fn load_record(
    store: &dyn KeyValueStore,
    id: Uuid,
) -> Result<Option<AnalysisRecord>, StoreError> {
    match store.get(&record_key(id)).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Redis-backed store.
#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
}

impl RedisStore {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.set::<_, _, ()>(key, value).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::fakes::MemoryStore;

    fn record() -> AnalysisRecord {
        AnalysisRecord {
            id: Uuid::new_v4(),
            resume_path: "uploads/x/resume.pdf".to_string(),
            image_path: "uploads/y/resume.png".to_string(),
            company_name: String::new(),
            job_title: String::new(),
            job_description: String::new(),
            feedback: None,
        }
    }

    #[tokio::test]
    async fn test_save_then_load_under_derived_key() {
        let store = MemoryStore::default();
        let record = record();

        save_record(&store, &record).await.unwrap();

        let writes = store.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, format!("resume:{}", record.id));

        let loaded = load_record(&store, record.id).await.unwrap();
        assert_eq!(loaded, Some(record));
    }

    #[tokio::test]
    async fn test_load_missing_returns_none() {
        let store = MemoryStore::default();
        assert!(load_record(&store, Uuid::new_v4()).await.unwrap().is_none());
    }
}
