//! 规则抽取流水线
//! 生成调用（超时 + 固定间隔重试） → 去围栏 → 解析链 → 逐条校验

use std::sync::Arc;

use tracing::{debug, warn};

use super::document::DocumentContent;
use super::generator::{GenerationRequest, TextGenerator};
use super::parser::{parse_response, RuleCandidate};
use super::prompt::RULE_EXTRACTION_INSTRUCTION;
use crate::compiler::RuleCompiler;
use crate::config::GenerationConfig;
use crate::error::{RbResult, RulebookError};
use crate::rule::Rule;
use crate::utils::preview_compact;

/// 规则抽取流水线
#[derive(Clone)]
pub struct RuleExtractionPipeline {
    generator: Arc<dyn TextGenerator>,
    config: GenerationConfig,
}

impl RuleExtractionPipeline {
    pub fn new(generator: Arc<dyn TextGenerator>, config: GenerationConfig) -> Self {
        Self { generator, config }
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// 从文档内容抽取规则，成功时保证非空且每条模式均可编译
    pub async fn extract(&self, content: &DocumentContent) -> RbResult<Vec<Rule>> {
        let request = GenerationRequest {
            instruction: RULE_EXTRACTION_INSTRUCTION.to_string(),
            content: content.clone(),
            temperature: self.config.temperature,
            max_output_tokens: self.config.max_output_tokens,
        };

        let raw = self.generate_with_retry(&request).await?;
        Self::rules_from_response(&raw)
    }

    /// 带超时的顺序重试，仅对可重试故障重试
    async fn generate_with_retry(&self, request: &GenerationRequest) -> RbResult<String> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut last_err: Option<RulebookError> = None;

        for attempt in 1..=max_attempts {
            let result = match tokio::time::timeout(self.config.timeout, self.generator.generate(request)).await {
                Ok(result) => result,
                Err(_) => Err(RulebookError::UpstreamTransient(format!(
                    "generation timed out after {:?}",
                    self.config.timeout
                ))),
            };

            match result {
                Ok(text) => {
                    debug!("generation succeeded on attempt {}/{}", attempt, max_attempts);
                    return Ok(text);
                }
                Err(e) if e.is_retryable() => {
                    warn!("generation attempt {}/{} failed: {}", attempt, max_attempts, e);
                    last_err = Some(e);
                    if attempt < max_attempts {
                        tokio::time::sleep(self.config.retry_delay).await;
                    }
                }
                Err(e) => {
                    warn!("generation failed without retry: {}", e);
                    return Err(RulebookError::ExtractionTransportFailed(e.to_string()));
                }
            }
        }

        let last = last_err.map(|e| e.to_string()).unwrap_or_default();
        Err(RulebookError::ExtractionTransportFailed(format!(
            "{} attempts exhausted, last error: {}",
            max_attempts, last
        )))
    }

    /// 解析并校验生成结果；单条候选失败只丢弃该条
    pub fn rules_from_response(raw: &str) -> RbResult<Vec<Rule>> {
        debug!("raw response: {}", preview_compact(raw, 200));
        let (format, candidates) = parse_response(raw)?;
        let total = candidates.len();

        let rules: Vec<Rule> = candidates
            .into_iter()
            .enumerate()
            .filter_map(|(index, candidate)| Self::validate_candidate(index, candidate))
            .collect();

        debug!("{} of {} candidates survived ({} response)", rules.len(), total, format);
        if rules.is_empty() {
            return Err(RulebookError::ExtractionEmpty);
        }
        Ok(rules)
    }

    fn validate_candidate(index: usize, candidate: RuleCandidate) -> Option<Rule> {
        let RuleCandidate {
            column_name: Some(column_name),
            description: Some(description),
            pattern: Some(pattern),
        } = candidate
        else {
            warn!("skipping candidate #{}: missing column_name, description or pattern", index);
            return None;
        };

        let pattern = RuleCompiler::normalize_pattern(&pattern);
        match Rule::new(column_name, description, pattern) {
            Ok(rule) => Some(rule),
            Err(e) => {
                warn!("dropping candidate #{}: {}", index, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Mutex;

    struct ScriptedGenerator {
        responses: Mutex<VecDeque<RbResult<String>>>,
        calls: AtomicUsize,
    }

    impl ScriptedGenerator {
        fn new(responses: Vec<RbResult<String>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, _request: &GenerationRequest) -> RbResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| Err(RulebookError::UpstreamTransient("script exhausted".into())))
        }
    }

    struct SlowGenerator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TextGenerator for SlowGenerator {
        async fn generate(&self, _request: &GenerationRequest) -> RbResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok("rules: []".to_string())
        }
    }

    fn fast_config() -> GenerationConfig {
        GenerationConfig {
            timeout: Duration::from_secs(5),
            retry_delay: Duration::from_millis(1),
            ..GenerationConfig::default()
        }
    }

    fn document() -> DocumentContent {
        DocumentContent::Text("Article 12: amounts are whole numbers.".into())
    }

    const TWO_RULES: &str = "```yaml\nrules:\n  - column_name: amount\n    description: Amount is a whole number\n    pattern: '^\\d+$'\n  - column_name: currency\n    description: ISO currency\n    pattern: 'r\"[A-Z]{3}\"'\n```";

    #[tokio::test]
    async fn test_extracts_rules_in_order() {
        let generator = ScriptedGenerator::new(vec![Ok(TWO_RULES.to_string())]);
        let pipeline = RuleExtractionPipeline::new(generator.clone(), fast_config());

        let rules = pipeline.extract(&document()).await.unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].column_name(), "amount");
        assert_eq!(rules[1].column_name(), "currency");
        // r"..." 包装已被清理
        assert_eq!(rules[1].pattern(), "[A-Z]{3}");
        assert_eq!(generator.calls(), 1);
    }

    #[test]
    fn test_invalid_only_candidate_yields_empty() {
        let raw = "```yaml\nrules:\n  - column_name: x\n    description: d\n    pattern: \"[\"\n```";
        let err = RuleExtractionPipeline::rules_from_response(raw).unwrap_err();
        assert!(matches!(err, RulebookError::ExtractionEmpty));
    }

    #[test]
    fn test_bad_candidates_dropped_individually() {
        let raw = "rules:\n  - column_name: x\n    description: d\n    pattern: '('\n  - column_name: y\n    pattern: 'abc'\n  - column_name: trade date\n    description: d\n    pattern: 'x'\n  - column_name: z\n    description: ok\n    regex: '[0-9]+'\n";
        let rules = RuleExtractionPipeline::rules_from_response(raw).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].column_name(), "z");
    }

    #[test]
    fn test_unparseable_response() {
        let err = RuleExtractionPipeline::rules_from_response("No rules, sorry.").unwrap_err();
        assert!(matches!(err, RulebookError::ExtractionUnparseable(_)));
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let generator = ScriptedGenerator::new(vec![
            Err(RulebookError::UpstreamTransient("status 503".into())),
            Err(RulebookError::UpstreamTransient("status 429".into())),
            Ok(TWO_RULES.to_string()),
        ]);
        let pipeline = RuleExtractionPipeline::new(generator.clone(), fast_config());

        let rules = pipeline.extract(&document()).await.unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(generator.calls(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_report_upstream_unavailable() {
        let generator = ScriptedGenerator::new(vec![
            Err(RulebookError::UpstreamTransient("connection reset".into())),
            Err(RulebookError::UpstreamTransient("connection reset".into())),
            Err(RulebookError::UpstreamTransient("connection reset".into())),
            Ok(TWO_RULES.to_string()),
        ]);
        let pipeline = RuleExtractionPipeline::new(generator.clone(), fast_config());

        let err = pipeline.extract(&document()).await.unwrap_err();
        assert!(matches!(err, RulebookError::ExtractionTransportFailed(_)));
        assert!(err.to_string().starts_with("upstream unavailable"));
        assert_eq!(generator.calls(), 3);
    }

    #[tokio::test]
    async fn test_rejected_request_is_not_retried() {
        let generator = ScriptedGenerator::new(vec![
            Err(RulebookError::UpstreamRejected("status 401".into())),
            Ok(TWO_RULES.to_string()),
        ]);
        let pipeline = RuleExtractionPipeline::new(generator.clone(), fast_config());

        let err = pipeline.extract(&document()).await.unwrap_err();
        assert!(matches!(err, RulebookError::ExtractionTransportFailed(_)));
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_retryable() {
        let generator = Arc::new(SlowGenerator { calls: AtomicUsize::new(0) });
        let config = GenerationConfig {
            timeout: Duration::from_millis(20),
            max_attempts: 2,
            retry_delay: Duration::from_millis(1),
            ..GenerationConfig::default()
        };
        let pipeline = RuleExtractionPipeline::new(generator.clone(), config);

        let err = pipeline.extract(&document()).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 2);
    }
}
