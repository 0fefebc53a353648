//! 文本生成服务接口
//! TextGenerator 为外部协作者边界，GeminiGenerator 为基于 reqwest 的默认实现

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use super::document::DocumentContent;
use crate::config::GenerationConfig;
use crate::error::{RbResult, RulebookError};
use crate::utils::preview_compact;

/// 单次生成请求
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub instruction: String,
    pub content: DocumentContent,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

/// 文本生成服务
///
/// 实现方应将可重试故障（超时、连接失败、限流、5xx）映射为
/// `RulebookError::UpstreamTransient` 或 `RulebookError::HttpError`，
/// 其余失败映射为 `RulebookError::UpstreamRejected`。
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> RbResult<String>;
}

/// Gemini generateContent 客户端
#[derive(Debug, Clone)]
pub struct GeminiGenerator {
    client: Client,
    url: Url,
    api_key: Option<String>,
}

impl GeminiGenerator {
    pub fn new(config: &GenerationConfig) -> RbResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            url: config.generate_url()?,
            api_key: config.api_key.clone(),
        })
    }

    /// 构建请求体：指令 + 文档（文本或 inline_data）
    pub fn build_body(request: &GenerationRequest) -> Value {
        let document_part = match &request.content {
            DocumentContent::Text(text) => json!({ "text": text }),
            DocumentContent::Bytes { mime_type, data } => json!({
                "inline_data": {
                    "mime_type": mime_type,
                    "data": BASE64.encode(data),
                }
            }),
        };

        json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": request.instruction },
                    document_part,
                ]
            }],
            "generationConfig": {
                "temperature": request.temperature,
                "maxOutputTokens": request.max_output_tokens,
            }
        })
    }

    /// 拼接首个候选的全部文本片段
    pub fn collect_text(response: &GenerateContentResponse) -> Option<String> {
        let content = response.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    async fn generate(&self, request: &GenerationRequest) -> RbResult<String> {
        let body = Self::build_body(request);
        let mut builder = self.client.post(self.url.clone()).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.header("x-goog-api-key", key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            let message = format!("status {}: {}", status, preview_compact(&detail, 200));
            return if status.as_u16() == 429 || status.is_server_error() {
                Err(RulebookError::UpstreamTransient(message))
            } else {
                Err(RulebookError::UpstreamRejected(message))
            };
        }

        let parsed: GenerateContentResponse = response.json().await?;
        let text = Self::collect_text(&parsed).ok_or_else(|| {
            RulebookError::UpstreamTransient("response carried no candidate text".to_string())
        })?;
        debug!("generation returned {} chars: {}", text.len(), preview_compact(&text, 120));
        Ok(text)
    }
}

/// generateContent 响应（仅保留需要的字段）
#[derive(Debug, Default, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
pub struct CandidatePart {
    #[serde(default)]
    pub text: Option<String>,
}
