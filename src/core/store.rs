use crate::core::metrics::Statistics;
use crate::error::{AppError, AppResult};
use crate::io;
use crate::logging::{log, LogLevel};
use crate::model::common::ListId;
use crate::model::job::ApiKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Path, PathBuf};

/// A list's statistics as kept between runs, together with what a scheduled
/// refresh needs to import it again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredList {
    pub list_id: ListId,
    pub list_name: String,
    pub api_key: ApiKey,
    pub user_email: String,
    pub store_aggregates: bool,
    pub monthly_updates: bool,
    pub updated_at: DateTime<Utc>,
    pub stats: Statistics,
}

pub trait StatsStore {
    fn load(&self, list_id: &str) -> impl Future<Output = AppResult<Option<StoredList>>> + Send;
    fn load_all(&self) -> impl Future<Output = AppResult<Vec<StoredList>>> + Send;
    fn upsert(&self, entry: StoredList) -> impl Future<Output = AppResult<()>> + Send;
}

/// One JSON document per list under `<base>/lists`.
#[derive(Debug, Clone)]
pub struct JsonStatsStore {
    dir: PathBuf,
}

impl JsonStatsStore {
    pub fn new(base_dir: &Path) -> Self {
        JsonStatsStore {
            dir: base_dir.join(io::LISTS_SUBDIR),
        }
    }

    /// Ids name their document verbatim, so ids that differ only in case stay
    /// distinct. Ids that could leave the store directory are refused.
    fn path_for(&self, list_id: &str) -> AppResult<PathBuf> {
        if list_id.is_empty()
            || list_id.starts_with('.')
            || list_id.contains(|c: char| matches!(c, '/' | '\\' | '\0'))
        {
            return Err(AppError::Persistence(format!(
                "List id '{}' cannot name a stored document",
                list_id.escape_debug()
            )));
        }
        Ok(self.dir.join(format!("{}.json", list_id)))
    }
}

impl StatsStore for JsonStatsStore {
    async fn load(&self, list_id: &str) -> AppResult<Option<StoredList>> {
        io::read_json(&self.path_for(list_id)?).await
    }

    async fn load_all(&self) -> AppResult<Vec<StoredList>> {
        let mut entries = Vec::new();
        for path in io::list_json_files(&self.dir).await? {
            match io::read_json::<StoredList>(&path).await {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => {}
                Err(e) => log(
                    LogLevel::Warning,
                    &format!("Skipping unreadable stored list {}: {}", path.display(), e),
                ),
            }
        }
        Ok(entries)
    }

    async fn upsert(&self, entry: StoredList) -> AppResult<()> {
        let path = self.path_for(&entry.list_id)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AppError::Persistence(format!("{}: {}", self.dir.display(), e)))?;
        let log_ctx = format!("Stored List {}", entry.list_id);
        io::save_json(path, entry, log_ctx)
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{stats, stored};
    use super::*;

    #[tokio::test]
    async fn upsert_replaces_previous_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStatsStore::new(dir.path());

        store.upsert(stored("abc", true, stats(10, 0.2))).await.unwrap();
        store.upsert(stored("abc", true, stats(12, 0.3))).await.unwrap();

        let loaded = store.load("abc").await.unwrap().unwrap();
        assert_eq!(loaded.stats.subscribers, 12);
        assert_eq!(loaded.api_key.data_center(), "us3");
        assert_eq!(store.load_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_list_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStatsStore::new(dir.path());
        assert!(store.load("nope").await.unwrap().is_none());
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ids_differing_in_case_are_separate_documents() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStatsStore::new(dir.path());
        store.upsert(stored("AbC", true, stats(1, 0.1))).await.unwrap();
        store.upsert(stored("abc", true, stats(2, 0.2))).await.unwrap();

        assert_eq!(store.load("AbC").await.unwrap().unwrap().stats.subscribers, 1);
        assert_eq!(store.load("abc").await.unwrap().unwrap().stats.subscribers, 2);
        assert_eq!(store.load_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn ids_that_leave_the_store_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStatsStore::new(dir.path());
        for id in ["", "..", "../escape", "a/b", "a\\b", ".hidden"] {
            let err = store.upsert(stored(id, true, stats(1, 0.1))).await.unwrap_err();
            assert!(matches!(err, AppError::Persistence(_)), "accepted {:?}", id);
        }
        assert!(store.load("../escape").await.is_err());
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_upsert_keeps_previous_statistics() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStatsStore::new(dir.path());
        store.upsert(stored("x", true, stats(10, 0.2))).await.unwrap();

        tokio::fs::create_dir(dir.path().join("lists").join("x.json.tmp"))
            .await
            .unwrap();
        let err = store.upsert(stored("x", true, stats(99, 0.9))).await.unwrap_err();
        assert!(matches!(err, AppError::Persistence(_)));

        let kept = store.load("x").await.unwrap().unwrap();
        assert_eq!(kept.stats.subscribers, 10);
        assert_eq!(store.load_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn corrupt_documents_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStatsStore::new(dir.path());
        store.upsert(stored("good", true, stats(1, 0.1))).await.unwrap();
        tokio::fs::write(dir.path().join("lists").join("bad.json"), "{not json")
            .await
            .unwrap();
        let all = store.load_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].list_id, "good");
    }
}
