//! 编译模块：将规则模式编译为可执行的整串匹配正则
pub mod pattern;
pub mod compiler;

pub use self::pattern::{CompiledRule, CompiledRulebook};
pub use self::compiler::RuleCompiler;
