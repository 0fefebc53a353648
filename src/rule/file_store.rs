//! 规则书文件存储
//! 每个规则书一个 MessagePack 文件（<dir>/<id>.mp），写入采用临时文件 + rename

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::lifecycle::ensure_forward;
use super::model::Rulebook;
use super::store::{check_key, RulebookStore};
use crate::error::{RbResult, RulebookError};

const RECORD_EXT: &str = "mp";

/// 文件规则书存储
pub struct FileRulebookStore {
    dir: PathBuf,
    // 每个 id 一把写锁
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl FileRulebookStore {
    /// 打开（必要时创建）存储目录
    pub async fn open(dir: impl Into<PathBuf>) -> RbResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        debug!("rulebook store opened at {}", dir.display());
        Ok(Self {
            dir,
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: &str) -> RbResult<PathBuf> {
        let valid = !id.is_empty()
            && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(RulebookError::InvalidInput(format!("invalid rulebook id: {}", id)));
        }
        Ok(self.dir.join(format!("{}.{}", id, RECORD_EXT)))
    }

    async fn lock_for(&self, id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(id.to_string()).or_default().clone()
    }

    // 释放 id 锁；无其他持有者时从表中移除
    async fn release(&self, id: &str, lock: Arc<Mutex<()>>) {
        drop(lock);
        let mut locks = self.locks.lock().await;
        if locks.get(id).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(id);
        }
    }

    async fn write(&self, id: &str, rulebook: Rulebook, must_exist: bool) -> RbResult<()> {
        check_key(id, &rulebook)?;
        rulebook.check_invariants()?;
        let path = self.record_path(id)?;

        let lock = self.lock_for(id).await;
        let result = {
            let _guard = lock.lock().await;
            self.write_locked(id, &path, rulebook, must_exist).await
        };
        self.release(id, lock).await;
        result
    }

    async fn write_locked(&self, id: &str, path: &Path, rulebook: Rulebook, must_exist: bool) -> RbResult<()> {
        match Self::read_record(path).await? {
            Some(existing) => ensure_forward(&existing, &rulebook)?,
            None if must_exist => return Err(RulebookError::RulebookNotFound(id.to_string())),
            None => {}
        }

        let data = Self::encode(&rulebook)?;
        let tmp_path = path.with_extension(format!("{}.tmp", RECORD_EXT));
        tokio::fs::write(&tmp_path, &data).await?;
        tokio::fs::rename(&tmp_path, path).await?;
        debug!("rulebook {} persisted ({} bytes, status {})", id, data.len(), rulebook.status);
        Ok(())
    }

    fn encode(rulebook: &Rulebook) -> RbResult<Vec<u8>> {
        rmp_serde::to_vec_named(rulebook)
            .map_err(|e| RulebookError::MsgPackError(format!("encode {} failed: {}", rulebook.id, e)))
    }

    fn decode(data: &[u8]) -> RbResult<Rulebook> {
        let rulebook: Rulebook = rmp_serde::from_slice(data)
            .map_err(|e| RulebookError::MsgPackError(format!("decode failed: {}", e)))?;
        rulebook.check_invariants()?;
        Ok(rulebook)
    }

    async fn read_record(path: &Path) -> RbResult<Option<Rulebook>> {
        match tokio::fs::read(path).await {
            Ok(data) => Ok(Some(Self::decode(&data)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl RulebookStore for FileRulebookStore {
    async fn put(&self, id: &str, rulebook: Rulebook) -> RbResult<()> {
        self.write(id, rulebook, false).await
    }

    async fn replace(&self, id: &str, rulebook: Rulebook) -> RbResult<()> {
        self.write(id, rulebook, true).await
    }

    async fn get(&self, id: &str) -> RbResult<Option<Rulebook>> {
        let path = self.record_path(id)?;
        Self::read_record(&path).await
    }

    async fn list(&self) -> RbResult<Vec<Rulebook>> {
        let mut books = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXT) {
                continue;
            }
            // 损坏文件跳过，不影响其他记录
            match Self::read_record(&path).await {
                Ok(Some(book)) => books.push(book),
                Ok(None) => {}
                Err(e) => warn!("skipping unreadable rulebook record {}: {}", path.display(), e),
            }
        }

        books.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(books)
    }

    async fn delete(&self, id: &str) -> RbResult<bool> {
        let path = self.record_path(id)?;
        let lock = self.lock_for(id).await;
        let result = {
            let _guard = lock.lock().await;
            match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
                Err(e) => Err(e.into()),
            }
        };
        self.release(id, lock).await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::lifecycle::RulebookEvent;
    use crate::rule::model::{Rule, RulebookStatus};

    fn processing(name: &str) -> Rulebook {
        Rulebook::new(name, "d", "doc.pdf")
            .apply(RulebookEvent::Accepted)
            .unwrap()
    }

    #[tokio::test]
    async fn test_round_trip_keeps_status_and_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRulebookStore::open(dir.path()).await.unwrap();

        let book = processing("Basel III");
        store.put(&book.id, book.clone()).await.unwrap();
        let failed = book
            .apply(RulebookEvent::ExtractionFailed("unparseable response: prose".into()))
            .unwrap();
        store.put(&failed.id, failed.clone()).await.unwrap();

        let loaded = store.get(&failed.id).await.unwrap().unwrap();
        assert_eq!(loaded, failed);
        assert_eq!(loaded.status, RulebookStatus::Failed);
        assert_eq!(loaded.processing_error.as_deref(), Some("unparseable response: prose"));
    }

    #[tokio::test]
    async fn test_completed_rules_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRulebookStore::open(dir.path()).await.unwrap();

        let rules = vec![
            Rule::new("amount", "digits", r"^\d+$").unwrap(),
            Rule::new("currency", "ISO code", "[A-Z]{3}").unwrap(),
        ];
        let done = processing("MiFID II")
            .apply(RulebookEvent::ExtractionSucceeded(rules.clone()))
            .unwrap();
        store.put(&done.id, done.clone()).await.unwrap();

        let loaded = store.get(&done.id).await.unwrap().unwrap();
        assert_eq!(loaded.rules, rules);

        // 终态不可回写
        let stale = Rulebook {
            status: RulebookStatus::Processing,
            rules: Vec::new(),
            ..done.clone()
        };
        assert!(store.put(&done.id, stale).await.is_err());
    }

    #[tokio::test]
    async fn test_list_skips_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRulebookStore::open(dir.path()).await.unwrap();

        let a = processing("a");
        let b = processing("b");
        store.put(&a.id, a.clone()).await.unwrap();
        store.put(&b.id, b.clone()).await.unwrap();
        tokio::fs::write(dir.path().join("broken.mp"), b"not msgpack").await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[tokio::test]
    async fn test_replace_after_delete_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRulebookStore::open(dir.path()).await.unwrap();

        let book = processing("a");
        store.put(&book.id, book.clone()).await.unwrap();
        assert!(store.delete(&book.id).await.unwrap());

        let failed = book.apply(RulebookEvent::ExtractionFailed("late".into())).unwrap();
        let err = store.replace(&failed.id, failed.clone()).await.unwrap_err();
        assert!(matches!(err, RulebookError::RulebookNotFound(_)));
        assert!(store.get(&failed.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_writers_never_regress() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileRulebookStore::open(dir.path()).await.unwrap());
        let book = processing("a");
        store.put(&book.id, book.clone()).await.unwrap();
        let done = book
            .clone()
            .apply(RulebookEvent::ExtractionSucceeded(vec![
                Rule::new("amount", "digits", r"^\d+$").unwrap(),
            ]))
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..12 {
            let store = store.clone();
            let record = if i == 6 { done.clone() } else { book.clone() };
            handles.push(tokio::spawn(async move {
                let (id, status) = (record.id.clone(), record.status);
                (status, store.put(&id, record).await)
            }));
        }

        for handle in handles {
            let (status, result) = handle.await.unwrap();
            match status {
                RulebookStatus::Completed => assert!(result.is_ok()),
                _ => {
                    if let Err(e) = result {
                        assert!(matches!(e, RulebookError::IllegalTransition { .. }));
                    }
                }
            }
        }
        let stored = store.get(&book.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RulebookStatus::Completed);
        // 写锁用完即回收
        assert!(store.locks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_and_invalid_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRulebookStore::open(dir.path()).await.unwrap();

        let a = processing("a");
        store.put(&a.id, a.clone()).await.unwrap();
        assert!(store.delete(&a.id).await.unwrap());
        assert!(!store.delete(&a.id).await.unwrap());
        assert!(store.locks.lock().await.is_empty());
        assert!(store.get("../etc/passwd").await.is_err());
    }
}
