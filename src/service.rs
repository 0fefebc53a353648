//! 规则书服务门面
//! 串联文档读取、生命周期、抽取流水线、存储与校验引擎

use std::sync::Arc;

use tracing::{error, info};

use crate::config::GlobalConfig;
use crate::error::{RbResult, RulebookError};
use crate::extraction::{
    DocumentContent, DocumentTextExtractor, GeminiGenerator, RawDocumentExtractor,
    RuleExtractionPipeline, TextGenerator,
};
use crate::rule::{FileRulebookStore, Rulebook, RulebookLifecycle, RulebookStore};
use crate::validator::{Dataset, ValidationEngine, ValidationReport};

/// 规则书服务（可克隆，内部共享）
#[derive(Clone)]
pub struct RulebookService {
    store: Arc<dyn RulebookStore>,
    lifecycle: RulebookLifecycle,
    extractor: Arc<dyn DocumentTextExtractor>,
    pipeline: RuleExtractionPipeline,
    engine: ValidationEngine,
}

impl RulebookService {
    /// 使用指定存储与生成器构建
    pub fn new(
        store: Arc<dyn RulebookStore>,
        generator: Arc<dyn TextGenerator>,
        config: &GlobalConfig,
    ) -> Self {
        Self {
            lifecycle: RulebookLifecycle::new(store.clone()),
            store,
            extractor: Arc::new(RawDocumentExtractor::new(config.max_document_bytes)),
            pipeline: RuleExtractionPipeline::new(generator, config.generation.clone()),
            engine: ValidationEngine::new(config.validation.clone()),
        }
    }

    /// 按配置构建：文件存储 + Gemini 生成器
    pub async fn from_config(config: &GlobalConfig) -> RbResult<Self> {
        if config.generation.api_key.is_none() {
            return Err(RulebookError::InvalidInput(
                "no API key configured for the generation service".to_string(),
            ));
        }
        let store = FileRulebookStore::open(config.store_dir.clone()).await?;
        let generator = GeminiGenerator::new(&config.generation)?;
        Ok(Self::new(Arc::new(store), Arc::new(generator), config))
    }

    /// 替换文档抽取器
    pub fn with_extractor(mut self, extractor: Arc<dyn DocumentTextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// 提交文档并等待抽取完成，返回终态规则书（COMPLETED 或 FAILED）
    pub async fn submit_document(
        &self,
        name: &str,
        description: Option<&str>,
        source_ref: &str,
        document: &[u8],
    ) -> RbResult<Rulebook> {
        let (rulebook, content) = self.accept(name, description, source_ref, document).await?;
        self.run_extraction(rulebook, content).await
    }

    /// 提交文档，后台抽取；立即返回 PROCESSING 状态的规则书供轮询
    pub async fn submit_document_in_background(
        &self,
        name: &str,
        description: Option<&str>,
        source_ref: &str,
        document: &[u8],
    ) -> RbResult<Rulebook> {
        let (rulebook, content) = self.accept(name, description, source_ref, document).await?;

        let service = self.clone();
        let pending = rulebook.clone();
        tokio::spawn(async move {
            let id = pending.id.clone();
            match service.run_extraction(pending, content).await {
                Ok(_) => {}
                Err(RulebookError::RulebookNotFound(_)) => {
                    info!("rulebook {} was deleted during extraction, result discarded", id);
                }
                Err(e) => error!("background extraction for rulebook {} aborted: {}", id, e),
            }
        });

        Ok(rulebook)
    }

    // 文档不合法时不创建规则书
    async fn accept(
        &self,
        name: &str,
        description: Option<&str>,
        source_ref: &str,
        document: &[u8],
    ) -> RbResult<(Rulebook, DocumentContent)> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RulebookError::InvalidInput("rulebook name is empty".to_string()));
        }
        let content = self.extractor.extract(document)?;

        let description = match description.map(str::trim) {
            Some(desc) if !desc.is_empty() => desc.to_string(),
            _ => format!("Regulatory framework for {}", name),
        };
        let rulebook = self.lifecycle.begin(name, description, source_ref).await?;
        Ok((rulebook, content))
    }

    async fn run_extraction(&self, rulebook: Rulebook, content: DocumentContent) -> RbResult<Rulebook> {
        info!(
            "extracting rules for rulebook {} from {} bytes of content",
            rulebook.id,
            content.len()
        );
        let outcome = self.pipeline.extract(&content).await;
        self.lifecycle.finish(rulebook, outcome).await
    }

    /// 按 id 读取规则书
    pub async fn get(&self, id: &str) -> RbResult<Rulebook> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| RulebookError::RulebookNotFound(id.to_string()))
    }

    pub async fn list(&self) -> RbResult<Vec<Rulebook>> {
        self.store.list().await
    }

    pub async fn delete(&self, id: &str) -> RbResult<bool> {
        let deleted = self.store.delete(id).await?;
        if deleted {
            info!("rulebook {} deleted", id);
        }
        Ok(deleted)
    }

    /// 使用指定规则书校验数据集
    pub async fn validate(&self, id: &str, dataset: &Dataset) -> RbResult<ValidationReport> {
        let rulebook = self.get(id).await?;
        self.engine.validate(&rulebook, dataset)
    }
}
