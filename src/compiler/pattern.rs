//! 编译后模式模型
//! 规则正则编译后的结构

use regex::Regex;

use crate::rule::Rule;

/// 编译后的单条规则（整串匹配）
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub column_name: String,
    pub description: String,
    // 规则书中保存的原始模式，用于报告输出
    pub pattern: String,
    // 已锚定为 ^(?:pattern)$
    pub regex: Regex,
}

impl CompiledRule {
    pub fn is_full_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }

    pub(crate) fn from_rule(rule: &Rule, regex: Regex) -> Self {
        Self {
            column_name: rule.column_name().to_string(),
            description: rule.description().to_string(),
            pattern: rule.pattern().to_string(),
            regex,
        }
    }
}

/// 编译后的规则书（顺序与规则书一致）
#[derive(Debug, Clone)]
pub struct CompiledRulebook {
    pub rulebook_id: String,
    pub rules: Vec<CompiledRule>,
}
