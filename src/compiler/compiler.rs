//! 规则编译器核心
//! 负责模式清理与整串匹配正则的编译，模式来自生成模型，按不可信输入处理

use std::time::Instant;

use regex::{Regex, RegexBuilder};
use tracing::debug;

use super::pattern::{CompiledRule, CompiledRulebook};
use crate::error::RbResult;
use crate::rule::{Rule, Rulebook};

// 单条正则编译后的内存上限（与 regex 默认值一致，保证 \w{1,100} 这类有界 Unicode 类可编译）
const PATTERN_SIZE_LIMIT: usize = 10 << 20;
const PATTERN_DFA_SIZE_LIMIT: usize = 2 << 20;

/// 规则编译器
pub struct RuleCompiler;

impl RuleCompiler {
    /// 清理生成模型常见的模式包装：r"..." / r'...' 原始串写法、/.../ 分隔符
    pub fn normalize_pattern(raw_pattern: &str) -> String {
        let mut cleaned = raw_pattern.trim();

        for quote in ['"', '\''] {
            let prefix = format!("r{}", quote);
            if let Some(inner) = cleaned
                .strip_prefix(prefix.as_str())
                .and_then(|s| s.strip_suffix(quote))
            {
                cleaned = inner;
                break;
            }
        }

        // 移除PCRE分隔符
        if cleaned.len() >= 2 && cleaned.starts_with('/') && cleaned.ends_with('/') {
            cleaned = &cleaned[1..cleaned.len() - 1];
        }

        cleaned.trim().to_string()
    }

    /// 编译为整串匹配正则
    ///
    /// 先单独编译原始模式，避免 `a)(b` 这类模式在加上外层分组后变得"合法"。
    pub fn compile_pattern(pattern: &str) -> RbResult<Regex> {
        Self::build(pattern)?;
        let anchored = format!("^(?:{})$", pattern);
        Self::build(&anchored)
    }

    fn build(pattern: &str) -> RbResult<Regex> {
        let regex = RegexBuilder::new(pattern)
            .size_limit(PATTERN_SIZE_LIMIT)
            .dfa_size_limit(PATTERN_DFA_SIZE_LIMIT)
            .build()?;
        Ok(regex)
    }

    /// 编译单条规则
    pub fn compile_rule(rule: &Rule) -> RbResult<CompiledRule> {
        let regex = Self::compile_pattern(rule.pattern())?;
        Ok(CompiledRule::from_rule(rule, regex))
    }

    /// 编译规则书
    pub fn compile_rulebook(rulebook: &Rulebook) -> RbResult<CompiledRulebook> {
        let start = Instant::now();
        let rules = rulebook
            .rules
            .iter()
            .map(Self::compile_rule)
            .collect::<RbResult<Vec<_>>>()?;

        debug!(
            "rulebook {} compiled: {} rules in {:?}",
            rulebook.id,
            rules.len(),
            start.elapsed()
        );

        Ok(CompiledRulebook {
            rulebook_id: rulebook.id.clone(),
            rules,
        })
    }
}
