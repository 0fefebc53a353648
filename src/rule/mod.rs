//! 规则模块：规则与规则书数据模型、生命周期、存储
pub mod model;
pub mod lifecycle;
pub mod store;
pub mod file_store;

// 导出核心接口
pub use self::model::{Rule, Rulebook, RulebookStatus};
pub use self::lifecycle::{RulebookEvent, RulebookLifecycle};
pub use self::store::{RulebookStore, InMemoryRulebookStore};
pub use self::file_store::FileRulebookStore;
