//! 校验报告模型

use std::collections::BTreeMap;

use serde::Serialize;

/// 单条违规记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub column: String,
    pub value: String,
    pub pattern: String,
    pub description: String,
}

/// 单行结果（row_index 从 1 开始）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowResult {
    pub row_index: usize,
    pub is_valid: bool,
    pub violations: Vec<Violation>,
}

/// 列级计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ColumnStats {
    pub valid_count: usize,
    pub invalid_count: usize,
}

/// 列错误示例
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorExample {
    pub value: String,
    pub description: String,
}

/// 列错误汇总
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnErrorSummary {
    pub error_count: usize,
    pub examples: Vec<ErrorExample>,
}

// 每列保留的示例数
const MAX_ERROR_EXAMPLES: usize = 3;

/// 校验报告
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub total_rows: usize,
    pub valid_rows: usize,
    pub invalid_rows: usize,
    // 百分比，保留两位小数
    pub validation_rate: f64,
    pub row_results: Vec<RowResult>,
    pub column_stats: BTreeMap<String, ColumnStats>,
    pub missing_columns: usize,
    pub missing_column_names: Vec<String>,
}

impl ValidationReport {
    /// valid_rows / total_rows × 100，四舍五入到两位小数；无数据行时为 0
    pub fn rate(valid_rows: usize, total_rows: usize) -> f64 {
        if total_rows == 0 {
            return 0.0;
        }
        let rate = valid_rows as f64 / total_rows as f64 * 100.0;
        (rate * 100.0).round() / 100.0
    }

    pub fn invalid_row_results(&self) -> impl Iterator<Item = &RowResult> {
        self.row_results.iter().filter(|row| !row.is_valid)
    }

    /// 按列汇总违规数量与示例
    pub fn column_error_summary(&self) -> BTreeMap<String, ColumnErrorSummary> {
        let mut summary: BTreeMap<String, ColumnErrorSummary> = BTreeMap::new();
        for violation in self.row_results.iter().flat_map(|row| &row.violations) {
            let entry = summary.entry(violation.column.clone()).or_default();
            entry.error_count += 1;
            if entry.examples.len() < MAX_ERROR_EXAMPLES {
                entry.examples.push(ErrorExample {
                    value: violation.value.clone(),
                    description: violation.description.clone(),
                });
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn violation(column: &str, value: &str) -> Violation {
        Violation {
            column: column.to_string(),
            value: value.to_string(),
            pattern: r"^\d+$".to_string(),
            description: "digits only".to_string(),
        }
    }

    #[test]
    fn test_rate_rounding() {
        assert_eq!(ValidationReport::rate(2, 3), 66.67);
        assert_eq!(ValidationReport::rate(1, 3), 33.33);
        assert_eq!(ValidationReport::rate(3, 3), 100.0);
        assert_eq!(ValidationReport::rate(0, 0), 0.0);
    }

    #[test]
    fn test_column_error_summary_caps_examples() {
        let row_results = (1..=5)
            .map(|i| RowResult {
                row_index: i,
                is_valid: false,
                violations: vec![violation("amount", &format!("-{}", i))],
            })
            .chain(std::iter::once(RowResult {
                row_index: 6,
                is_valid: false,
                violations: vec![violation("currency", "eur")],
            }))
            .collect();
        let report = ValidationReport {
            row_results,
            ..ValidationReport::default()
        };

        let summary = report.column_error_summary();
        assert_eq!(summary["amount"].error_count, 5);
        assert_eq!(summary["amount"].examples.len(), 3);
        assert_eq!(summary["amount"].examples[0].value, "-1");
        assert_eq!(summary["currency"].error_count, 1);
        assert_eq!(report.invalid_row_results().count(), 6);
    }

    #[test]
    fn test_report_serializes() {
        let mut report = ValidationReport {
            total_rows: 1,
            valid_rows: 1,
            validation_rate: 100.0,
            ..ValidationReport::default()
        };
        report.column_stats.insert(
            "amount".to_string(),
            ColumnStats {
                valid_count: 1,
                invalid_count: 0,
            },
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["column_stats"]["amount"]["valid_count"], 1);
        assert_eq!(json["validation_rate"], 100.0);
        assert_eq!(json["missing_column_names"], serde_json::json!([]));
    }
}
