//! 规则书生命周期状态机
//! PENDING → PROCESSING → {COMPLETED, FAILED}，终态不可再变

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::model::{Rule, Rulebook, RulebookStatus};
use super::store::RulebookStore;
use crate::error::{RbResult, RulebookError};

/// 生命周期事件
#[derive(Debug, Clone)]
pub enum RulebookEvent {
    // 文档已接收，开始处理
    Accepted,
    ExtractionSucceeded(Vec<Rule>),
    ExtractionFailed(String),
}

impl fmt::Display for RulebookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RulebookEvent::Accepted => f.write_str("Accepted"),
            RulebookEvent::ExtractionSucceeded(rules) => {
                write!(f, "ExtractionSucceeded({} rules)", rules.len())
            }
            RulebookEvent::ExtractionFailed(_) => f.write_str("ExtractionFailed"),
        }
    }
}

impl Rulebook {
    /// 状态转移：消费当前值，返回完整的新值
    pub fn apply(self, event: RulebookEvent) -> RbResult<Rulebook> {
        let from = self.status;
        match (from, event) {
            (RulebookStatus::Pending, RulebookEvent::Accepted) => Ok(Rulebook {
                status: RulebookStatus::Processing,
                updated_at: Utc::now(),
                ..self
            }),
            (RulebookStatus::Processing, RulebookEvent::ExtractionSucceeded(rules))
                if !rules.is_empty() =>
            {
                Ok(Rulebook {
                    status: RulebookStatus::Completed,
                    rules,
                    processing_error: None,
                    updated_at: Utc::now(),
                    ..self
                })
            }
            (RulebookStatus::Processing, RulebookEvent::ExtractionFailed(reason)) => Ok(Rulebook {
                status: RulebookStatus::Failed,
                rules: Vec::new(),
                processing_error: Some(reason),
                updated_at: Utc::now(),
                ..self
            }),
            (from, event) => Err(RulebookError::IllegalTransition {
                from,
                event: event.to_string(),
            }),
        }
    }
}

/// 存储层写入前的单调性检查：禁止状态回退，禁止改写终态
pub(crate) fn ensure_forward(existing: &Rulebook, incoming: &Rulebook) -> RbResult<()> {
    let regress = incoming.status.rank() < existing.status.rank();
    let rewrite_terminal = existing.status.is_terminal() && incoming != existing;
    if regress || rewrite_terminal {
        return Err(RulebookError::IllegalTransition {
            from: existing.status,
            event: format!("overwrite with {}", incoming.status),
        });
    }
    Ok(())
}

/// 生命周期驱动器：每次转移后立即持久化
#[derive(Clone)]
pub struct RulebookLifecycle {
    store: Arc<dyn RulebookStore>,
}

impl RulebookLifecycle {
    pub fn new(store: Arc<dyn RulebookStore>) -> Self {
        Self { store }
    }

    /// 创建规则书并立即提升为 PROCESSING 落盘
    pub async fn begin(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        source_ref: impl Into<String>,
    ) -> RbResult<Rulebook> {
        let rulebook = Rulebook::new(name, description, source_ref).apply(RulebookEvent::Accepted)?;
        self.store.put(&rulebook.id, rulebook.clone()).await?;
        info!("rulebook {} accepted, status {}", rulebook.id, rulebook.status);
        Ok(rulebook)
    }

    /// 根据抽取结果推进到终态并落盘；抽取期间记录已被删除时返回 `RulebookNotFound`
    pub async fn finish(&self, rulebook: Rulebook, outcome: RbResult<Vec<Rule>>) -> RbResult<Rulebook> {
        let event = match outcome {
            Ok(rules) => RulebookEvent::ExtractionSucceeded(rules),
            Err(e) => {
                warn!("rulebook {} extraction failed: {}", rulebook.id, e);
                RulebookEvent::ExtractionFailed(e.to_string())
            }
        };

        let next = rulebook.apply(event)?;
        self.store.replace(&next.id, next.clone()).await?;
        info!(
            "rulebook {} finished with status {} ({} rules)",
            next.id,
            next.status,
            next.rules.len()
        );
        Ok(next)
    }
}
