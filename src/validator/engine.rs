//! 校验引擎：将已完成的规则书应用到表格数据集
//! 只读、同步，同一规则书可并发校验

use std::time::Instant;

use tracing::{debug, warn};

use super::dataset::{CellValue, Dataset};
use super::report::{ColumnStats, RowResult, ValidationReport, Violation};
use crate::compiler::{CompiledRule, RuleCompiler};
use crate::config::ValidationConfig;
use crate::error::{RbResult, RulebookError};
use crate::rule::{Rulebook, RulebookStatus};

/// 校验引擎
#[derive(Debug, Clone, Default)]
pub struct ValidationEngine {
    config: ValidationConfig,
}

// 已绑定到数据集列下标的规则
struct BoundRule<'a> {
    column_index: usize,
    rule: &'a CompiledRule,
}

impl ValidationEngine {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// 校验数据集
    pub fn validate(&self, rulebook: &Rulebook, dataset: &Dataset) -> RbResult<ValidationReport> {
        if rulebook.status != RulebookStatus::Completed {
            return Err(RulebookError::RulebookNotReady(rulebook.status));
        }

        let start = Instant::now();
        let compiled = RuleCompiler::compile_rulebook(rulebook)?;
        let mut report = ValidationReport::default();

        // 列缺失按规则计一次，不产生行级违规
        let mut bound = Vec::with_capacity(compiled.rules.len());
        for rule in &compiled.rules {
            match dataset.column_index(&rule.column_name) {
                Some(column_index) => {
                    report.column_stats.entry(rule.column_name.clone()).or_default();
                    bound.push(BoundRule { column_index, rule });
                }
                None => {
                    report.missing_columns += 1;
                    if !report.missing_column_names.contains(&rule.column_name) {
                        report.missing_column_names.push(rule.column_name.clone());
                    }
                }
            }
        }

        if report.missing_columns > 0 {
            if self.config.reject_missing_columns {
                return Err(RulebookError::InvalidDataset(format!(
                    "dataset lacks columns required by rulebook {}: {}",
                    rulebook.id,
                    report.missing_column_names.join(", ")
                )));
            }
            warn!(
                "rulebook {}: {} rules skipped, columns not in dataset: {}",
                rulebook.id,
                report.missing_columns,
                report.missing_column_names.join(", ")
            );
        }

        for row in 0..dataset.len() {
            let mut violations = Vec::new();
            for BoundRule { column_index, rule } in &bound {
                let value = dataset.cell(row, *column_index);
                // 空值直接视为满足
                if value.is_empty() {
                    continue;
                }

                let stats = report.column_stats.entry(rule.column_name.clone()).or_default();
                match self.check_value(rule, value) {
                    None => stats.valid_count += 1,
                    Some(violation) => {
                        stats.invalid_count += 1;
                        violations.push(violation);
                    }
                }
            }

            let is_valid = violations.is_empty();
            if is_valid {
                report.valid_rows += 1;
            } else {
                report.invalid_rows += 1;
            }
            report.row_results.push(RowResult {
                row_index: row + 1,
                is_valid,
                violations,
            });
        }

        report.total_rows = dataset.len();
        report.validation_rate = ValidationReport::rate(report.valid_rows, report.total_rows);

        debug!(
            "rulebook {} validated {} rows in {:?}: {} valid, {} invalid",
            rulebook.id,
            report.total_rows,
            start.elapsed(),
            report.valid_rows,
            report.invalid_rows
        );
        Ok(report)
    }

    // 返回 None 表示通过
    fn check_value(&self, rule: &CompiledRule, value: &CellValue) -> Option<Violation> {
        let violation = |value: String, description: String| Violation {
            column: rule.column_name.clone(),
            value,
            pattern: rule.pattern.clone(),
            description,
        };

        let text = match value.as_text() {
            Ok(text) => text,
            Err(reason) => {
                return Some(violation(value.to_string(), format!("validation error: {}", reason)));
            }
        };

        let char_count = text.chars().count();
        if char_count > self.config.max_value_len {
            return Some(violation(
                text.chars().take(self.config.max_value_len).collect(),
                format!(
                    "validation error: value length {} exceeds limit {}",
                    char_count, self.config.max_value_len
                ),
            ));
        }

        if rule.is_full_match(&text) {
            None
        } else {
            Some(violation(text.into_owned(), rule.description.clone()))
        }
    }
}
