//! 规则书存储接口
//! 核心只依赖 get/put/list/delete 语义，写入按 id 串行并做单调性检查

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::lifecycle::ensure_forward;
use super::model::Rulebook;
use crate::error::{RbResult, RulebookError};

/// 规则书存储
#[async_trait]
pub trait RulebookStore: Send + Sync {
    /// 写入（覆盖）指定 id 的规则书，拒绝状态回退
    async fn put(&self, id: &str, rulebook: Rulebook) -> RbResult<()>;

    /// 仅当记录仍存在时写入，已删除返回 `RulebookNotFound`
    async fn replace(&self, id: &str, rulebook: Rulebook) -> RbResult<()>;

    async fn get(&self, id: &str) -> RbResult<Option<Rulebook>>;

    /// 按创建时间排序返回全部规则书
    async fn list(&self) -> RbResult<Vec<Rulebook>>;

    /// 删除，返回是否存在
    async fn delete(&self, id: &str) -> RbResult<bool>;
}

pub(crate) fn check_key(id: &str, rulebook: &Rulebook) -> RbResult<()> {
    if id != rulebook.id {
        return Err(RulebookError::InvalidInput(format!(
            "store key {} does not match rulebook id {}",
            id, rulebook.id
        )));
    }
    Ok(())
}

/// 内存存储（测试与单进程部署）
#[derive(Debug, Default)]
pub struct InMemoryRulebookStore {
    records: RwLock<HashMap<String, Rulebook>>,
}

impl InMemoryRulebookStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn write(&self, id: &str, rulebook: Rulebook, must_exist: bool) -> RbResult<()> {
        check_key(id, &rulebook)?;
        rulebook.check_invariants()?;

        // 写锁即串行化点
        let mut records = self.records.write().await;
        match records.get(id) {
            Some(existing) => ensure_forward(existing, &rulebook)?,
            None if must_exist => return Err(RulebookError::RulebookNotFound(id.to_string())),
            None => {}
        }
        records.insert(id.to_string(), rulebook);
        Ok(())
    }
}

#[async_trait]
impl RulebookStore for InMemoryRulebookStore {
    async fn put(&self, id: &str, rulebook: Rulebook) -> RbResult<()> {
        self.write(id, rulebook, false).await
    }

    async fn replace(&self, id: &str, rulebook: Rulebook) -> RbResult<()> {
        self.write(id, rulebook, true).await
    }

    async fn get(&self, id: &str) -> RbResult<Option<Rulebook>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn list(&self) -> RbResult<Vec<Rulebook>> {
        let mut books: Vec<Rulebook> = self.records.read().await.values().cloned().collect();
        books.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(books)
    }

    async fn delete(&self, id: &str) -> RbResult<bool> {
        Ok(self.records.write().await.remove(id).is_some())
    }
}
