//! rsrulebook - 监管文档规则书抽取与表格数据校验库

// 导出全局错误类型
pub use self::error::{RulebookError, RbResult};

// 导出配置模块
pub use self::config::{
    GlobalConfig, GenerationConfig, ValidationConfig, ConfigManager, CustomConfigBuilder,
};

// 导出规则模块核心接口
pub use self::rule::{
    Rule, Rulebook, RulebookStatus, RulebookEvent, RulebookLifecycle,
    RulebookStore, InMemoryRulebookStore, FileRulebookStore,
};

// 导出抽取模块核心接口
pub use self::extraction::{
    DocumentContent, DocumentTextExtractor, RawDocumentExtractor,
    TextGenerator, GeminiGenerator, GenerationRequest,
    ResponseFormat, ParseOutcome, RuleCandidate, RuleExtractionPipeline,
};

// 导出编译模块核心接口
pub use self::compiler::{CompiledRule, CompiledRulebook, RuleCompiler};

// 导出校验模块核心接口
pub use self::validator::{
    CellValue, Dataset, ValidationEngine, ValidationReport,
    RowResult, Violation, ColumnStats, ColumnErrorSummary,
};

// 导出服务门面
pub use self::service::RulebookService;

// 声明所有子模块
pub mod config;
pub mod error;
pub mod rule;
pub mod extraction;
pub mod compiler;
pub mod validator;
pub mod service;
pub mod utils;
