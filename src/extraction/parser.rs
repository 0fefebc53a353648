//! 生成结果解析
//! 去除代码围栏后依次尝试解析链中的格式，首个成功者胜出

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{RbResult, RulebookError};

static FENCE_BLOCK_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[\w+-]*[^\S\n]*\r?\n(.*?)```").unwrap()
});
static FENCE_LINE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[^\S\n]*```[\w+-]*[^\S\n]*\r?$\n?").unwrap()
});
static JSON_OBJECT_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());
static JSON_ARRAY_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\[.*\]").unwrap());

const PATTERN_KEYS: [&str; 3] = ["pattern", "regex_pattern", "regex"];

/// 候选规则（字段可能缺失，尚未校验）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleCandidate {
    pub column_name: Option<String>,
    pub description: Option<String>,
    pub pattern: Option<String>,
}

impl RuleCandidate {
    /// 从解析树中的单个元素构建，非对象元素返回 None
    pub fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        Some(Self {
            column_name: scalar_field(map, "column_name"),
            description: scalar_field(map, "description"),
            pattern: PATTERN_KEYS.iter().find_map(|key| scalar_field(map, key)),
        })
    }
}

// 标量统一转字符串，空白视为缺失
fn scalar_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    let text = match map.get(key)? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if text.trim().is_empty() { None } else { Some(text) }
}

/// 支持的响应格式（按解析链顺序）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Yaml,
    JsonFragment,
}

impl fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseFormat::Yaml => f.write_str("yaml"),
            ResponseFormat::JsonFragment => f.write_str("json-fragment"),
        }
    }
}

/// 单个解析器的结果
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Parsed(Vec<Value>),
    NotThisFormat(String),
}

pub const PARSER_CHAIN: [ResponseFormat; 2] = [ResponseFormat::Yaml, ResponseFormat::JsonFragment];

impl ResponseFormat {
    /// `cleaned` 为去除围栏后的文本，`raw` 为原始响应
    pub fn parse(self, cleaned: &str, raw: &str) -> ParseOutcome {
        match self {
            ResponseFormat::Yaml => match serde_yaml::from_str::<Value>(cleaned) {
                Ok(tree) => rule_items(tree),
                Err(e) => ParseOutcome::NotThisFormat(format!("yaml: {}", e)),
            },
            ResponseFormat::JsonFragment => {
                let mut fragments = Vec::new();
                fragments.push((0usize, cleaned));
                for regex in [&*JSON_OBJECT_REGEX, &*JSON_ARRAY_REGEX] {
                    if let Some(m) = regex.find(raw) {
                        fragments.push((m.start() + 1, m.as_str()));
                    }
                }
                // 整段文本优先，其次按片段出现位置
                fragments.sort_by_key(|(start, _)| *start);

                let mut last_reason = "json: no fragment found".to_string();
                for (_, fragment) in fragments {
                    match serde_json::from_str::<Value>(fragment) {
                        Ok(tree) => match rule_items(tree) {
                            parsed @ ParseOutcome::Parsed(_) => return parsed,
                            ParseOutcome::NotThisFormat(reason) => last_reason = reason,
                        },
                        Err(e) => last_reason = format!("json: {}", e),
                    }
                }
                ParseOutcome::NotThisFormat(last_reason)
            }
        }
    }
}

// 接受顶层列表、带 rules 列表的对象，或单条规则对象
fn rule_items(tree: Value) -> ParseOutcome {
    match tree {
        Value::Array(items) => ParseOutcome::Parsed(items),
        Value::Object(mut map) => match map.remove("rules") {
            Some(Value::Array(items)) => ParseOutcome::Parsed(items),
            Some(Value::Null) => ParseOutcome::Parsed(Vec::new()),
            Some(other) => ParseOutcome::NotThisFormat(format!("`rules` is not a list but {}", kind(&other))),
            None if map.contains_key("column_name") => ParseOutcome::Parsed(vec![Value::Object(map)]),
            None => ParseOutcome::NotThisFormat("object without a `rules` list".to_string()),
        },
        other => ParseOutcome::NotThisFormat(format!("top-level value is {}", kind(&other))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// 去除代码围栏：存在完整围栏块时取第一个块的内容，否则删除孤立的围栏行
pub fn strip_code_fences(raw: &str) -> String {
    if let Some(inner) = FENCE_BLOCK_REGEX.captures(raw).and_then(|c| c.get(1)) {
        return inner.as_str().trim().to_string();
    }
    FENCE_LINE_REGEX.replace_all(raw, "").trim().to_string()
}

/// 解析生成结果为候选规则列表
pub fn parse_response(raw: &str) -> RbResult<(ResponseFormat, Vec<RuleCandidate>)> {
    let cleaned = strip_code_fences(raw);
    let mut reasons = Vec::with_capacity(PARSER_CHAIN.len());

    for format in PARSER_CHAIN {
        match format.parse(&cleaned, raw) {
            ParseOutcome::Parsed(items) => {
                debug!("response parsed as {} with {} items", format, items.len());
                let candidates = items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| {
                        RuleCandidate::from_value(item).unwrap_or_else(|| {
                            debug!("item #{} is {}, not a rule object", index, kind(item));
                            RuleCandidate::default()
                        })
                    })
                    .collect();
                return Ok((format, candidates));
            }
            ParseOutcome::NotThisFormat(reason) => {
                debug!("response is not {}: {}", format, reason);
                reasons.push(format!("{}: {}", format, reason));
            }
        }
    }

    Err(RulebookError::ExtractionUnparseable(reasons.join("; ")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fenced_block() {
        let raw = "Here you go:\n```yaml\nrules:\n  - column_name: x\n```\nThanks";
        assert_eq!(strip_code_fences(raw), "rules:\n  - column_name: x");
    }

    #[test]
    fn test_strip_unterminated_fence() {
        let raw = "```json\n[{\"column_name\": \"x\"}]";
        assert_eq!(strip_code_fences(raw), "[{\"column_name\": \"x\"}]");
        assert_eq!(strip_code_fences("rules: []"), "rules: []");
    }

    #[test]
    fn test_yaml_rules_mapping() {
        let raw = "```yaml\nrules:\n  - column_name: amount\n    description: Amount is numeric\n    pattern: '^\\d+$'\n  - column_name: currency\n    description: ISO code\n    regex_pattern: '[A-Z]{3}'\n```";
        let (format, candidates) = parse_response(raw).unwrap();
        assert_eq!(format, ResponseFormat::Yaml);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].column_name.as_deref(), Some("amount"));
        assert_eq!(candidates[0].pattern.as_deref(), Some(r"^\d+$"));
        assert_eq!(candidates[1].pattern.as_deref(), Some("[A-Z]{3}"));
    }

    #[test]
    fn test_yaml_top_level_list_and_scalars() {
        let raw = "- column_name: age\n  description: Age\n  pattern: 42";
        let (_, candidates) = parse_response(raw).unwrap();
        assert_eq!(candidates[0].pattern.as_deref(), Some("42"));
    }

    #[test]
    fn test_json_fragment_fallback() {
        let raw = "Sure! The rules are: {\"rules\": [{\"column_name\": \"email\", \"description\": \"Email\", \"pattern\": \"[^@]+@[^@]+\"}]} Let me know.";
        let (format, candidates) = parse_response(raw).unwrap();
        assert_eq!(format, ResponseFormat::JsonFragment);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].column_name.as_deref(), Some("email"));
    }

    #[test]
    fn test_json_array_fragment() {
        let raw = "Result:\n[{\"column_name\": \"a\", \"description\": \"d\", \"pattern\": \"x\"}, {\"column_name\": \"b\", \"description\": \"d\", \"pattern\": \"y\"}]";
        let (_, candidates) = parse_response(raw).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[1].column_name.as_deref(), Some("b"));
    }

    #[test]
    fn test_unparseable_prose() {
        let err = parse_response("I could not find any rules in this document.").unwrap_err();
        assert!(matches!(err, RulebookError::ExtractionUnparseable(_)));
        assert!(err.to_string().starts_with("unparseable response"));
    }

    #[test]
    fn test_non_object_items_become_empty_candidates() {
        let (_, candidates) = parse_response("rules:\n  - just a string\n").unwrap();
        assert_eq!(candidates, vec![RuleCandidate::default()]);
    }
}
