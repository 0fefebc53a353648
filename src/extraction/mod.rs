//! 抽取模块：文档读取、生成调用、响应解析与规则抽取流水线
pub mod document;
pub mod generator;
pub mod parser;
pub mod prompt;
pub mod pipeline;

// 导出核心接口
pub use self::document::{DocumentContent, DocumentTextExtractor, RawDocumentExtractor};
pub use self::generator::{GeminiGenerator, GenerationRequest, TextGenerator};
pub use self::parser::{parse_response, strip_code_fences, ParseOutcome, ResponseFormat, RuleCandidate};
pub use self::pipeline::RuleExtractionPipeline;
pub use self::prompt::RULE_EXTRACTION_INSTRUCTION;
