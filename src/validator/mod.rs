//! 校验模块：数据集模型、校验引擎与报告
pub mod dataset;
pub mod engine;
pub mod report;

pub use self::dataset::{CellValue, Dataset};
pub use self::engine::ValidationEngine;
pub use self::report::{
    ColumnErrorSummary, ColumnStats, ErrorExample, RowResult, ValidationReport, Violation,
};
