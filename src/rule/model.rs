//! 规则数据模型定义
//! 规则与规则书的数据结构，支持序列化/反序列化

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::compiler::RuleCompiler;
use crate::error::{RbResult, RulebookError};

/// 单条列级校验规则
///
/// 只能通过 [`Rule::new`] 构造（反序列化同样走该路径），
/// 因此任何 `Rule` 的 `pattern` 都保证可编译。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RuleRecord")]
pub struct Rule {
    column_name: String,
    description: String,
    pattern: String,
}

impl Rule {
    pub fn new(
        column_name: impl Into<String>,
        description: impl Into<String>,
        pattern: impl Into<String>,
    ) -> RbResult<Self> {
        let column_name = column_name.into().trim().to_string();
        let description = description.into().trim().to_string();
        let pattern = pattern.into();

        if column_name.is_empty() {
            return Err(RulebookError::InvalidRule("column_name is empty".to_string()));
        }
        if column_name.chars().any(char::is_whitespace) {
            return Err(RulebookError::InvalidRule(format!(
                "column_name `{}` contains whitespace",
                column_name
            )));
        }
        if description.is_empty() {
            return Err(RulebookError::InvalidRule(format!(
                "description for `{}` is empty",
                column_name
            )));
        }
        if pattern.trim().is_empty() {
            return Err(RulebookError::InvalidRule(format!(
                "pattern for `{}` is empty",
                column_name
            )));
        }

        // 编译失败直接拒绝
        RuleCompiler::compile_pattern(&pattern)?;

        Ok(Self {
            column_name,
            description,
            pattern,
        })
    }

    pub fn column_name(&self) -> &str {
        &self.column_name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

// 反序列化中间结构，经 Rule::new 重新校验
#[derive(Deserialize)]
struct RuleRecord {
    column_name: String,
    description: String,
    pattern: String,
}

impl TryFrom<RuleRecord> for Rule {
    type Error = RulebookError;

    fn try_from(record: RuleRecord) -> Result<Self, Self::Error> {
        Rule::new(record.column_name, record.description, record.pattern)
    }
}

/// 规则书处理状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RulebookStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl RulebookStatus {
    /// 终态：COMPLETED / FAILED
    pub fn is_terminal(self) -> bool {
        matches!(self, RulebookStatus::Completed | RulebookStatus::Failed)
    }

    // 状态推进顺序，用于判断写入是否回退
    pub(crate) fn rank(self) -> u8 {
        match self {
            RulebookStatus::Pending => 0,
            RulebookStatus::Processing => 1,
            RulebookStatus::Completed | RulebookStatus::Failed => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RulebookStatus::Pending => "PENDING",
            RulebookStatus::Processing => "PROCESSING",
            RulebookStatus::Completed => "COMPLETED",
            RulebookStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for RulebookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 规则书：抽取与校验的基本单元
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rulebook {
    pub id: String,
    pub name: String,
    pub description: String,
    // 来源文档引用
    pub source_ref: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    // 仅 COMPLETED 时非空，顺序即抽取顺序
    pub rules: Vec<Rule>,
    pub status: RulebookStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_error: Option<String>,
}

impl Rulebook {
    /// 新建规则书（PENDING）
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        source_ref: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: description.into(),
            source_ref: source_ref.into(),
            created_at: now,
            updated_at: now,
            rules: Vec::new(),
            status: RulebookStatus::Pending,
            processing_error: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == RulebookStatus::Completed
    }

    /// 校验状态与字段之间的约束
    pub fn check_invariants(&self) -> RbResult<()> {
        let has_rules = !self.rules.is_empty();
        let completed = self.status == RulebookStatus::Completed;
        if has_rules != completed {
            return Err(RulebookError::StoreError(format!(
                "rulebook {} has {} rules in status {}",
                self.id,
                self.rules.len(),
                self.status
            )));
        }
        let failed = self.status == RulebookStatus::Failed;
        if self.processing_error.is_some() != failed {
            return Err(RulebookError::StoreError(format!(
                "rulebook {} processing_error does not match status {}",
                self.id, self.status
            )));
        }
        Ok(())
    }
}
