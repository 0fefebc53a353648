//! 全局配置管理,存储所有可配置项

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::{RbResult, RulebookError};

/// 默认生成服务地址
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/";
/// 默认模型
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
/// 文档大小上限（10 MB）
pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 10 * 1024 * 1024;

/// 生成服务调用参数
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    // 生成服务根地址
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    // 单次调用超时（文档分析较慢，分钟级）
    pub timeout: Duration,
    // 总尝试次数（含第一次）
    pub max_attempts: u32,
    // 固定重试间隔
    pub retry_delay: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.1,
            max_output_tokens: 2048,
            timeout: Duration::from_secs(600),
            max_attempts: 3,
            retry_delay: Duration::from_secs(2),
        }
    }
}

impl GenerationConfig {
    /// 拼接 generateContent 调用地址
    pub fn generate_url(&self) -> RbResult<Url> {
        let base = Url::parse(&self.endpoint)?;
        let path = format!("v1beta/models/{}:generateContent", self.model);
        Ok(base.join(&path)?)
    }
}

/// 校验引擎参数
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    // 参与正则匹配的单元格最大字符数
    // 超出上限的值一律记为 "validation error" 违规，即使它本可以匹配模式
    pub max_value_len: usize,
    // 严格模式：规则列缺失时直接拒绝整个数据集
    pub reject_missing_columns: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_value_len: 4096,
            reject_missing_columns: false,
        }
    }
}

/// 全局配置
#[derive(Debug, Clone)]
pub struct GlobalConfig {
    pub generation: GenerationConfig,
    pub validation: ValidationConfig,
    // 规则书存储目录（FileRulebookStore 使用）
    pub store_dir: PathBuf,
    pub max_document_bytes: usize,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            generation: GenerationConfig::default(),
            validation: ValidationConfig::default(),
            store_dir: PathBuf::from("rulebooks"),
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
        }
    }
}

impl GlobalConfig {
    /// 从环境变量读取配置，未设置的项保持默认值
    pub fn from_env() -> RbResult<Self> {
        let mut builder = CustomConfigBuilder::new();

        if let Some(key) = env_var("RSRULEBOOK_API_KEY").or_else(|| env_var("GOOGLE_API_KEY")) {
            builder = builder.api_key(key);
        }
        if let Some(model) = env_var("RSRULEBOOK_MODEL") {
            builder = builder.model(model);
        }
        if let Some(endpoint) = env_var("RSRULEBOOK_ENDPOINT") {
            Url::parse(&endpoint)?;
            builder = builder.endpoint(endpoint);
        }
        if let Some(secs) = env_var("RSRULEBOOK_TIMEOUT_SECS") {
            let secs: u64 = secs.parse().map_err(|_| {
                RulebookError::InvalidInput(format!("RSRULEBOOK_TIMEOUT_SECS is not a number: {}", secs))
            })?;
            builder = builder.timeout(Duration::from_secs(secs));
        }
        if let Some(dir) = env_var("RSRULEBOOK_STORE_DIR") {
            builder = builder.store_dir(PathBuf::from(dir));
        }

        Ok(builder.build())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// 配置管理器
pub struct ConfigManager;

impl ConfigManager {
    /// 获取默认配置
    pub fn get_default() -> GlobalConfig {
        GlobalConfig::default()
    }

    /// 自定义配置
    pub fn custom() -> CustomConfigBuilder {
        CustomConfigBuilder::new()
    }
}

/// 配置构建器（便于自定义配置）
#[derive(Debug, Clone, Default)]
pub struct CustomConfigBuilder {
    config: GlobalConfig,
}

impl CustomConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: GlobalConfig::default(),
        }
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.generation.endpoint = endpoint.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.generation.api_key = Some(key.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.generation.model = model.into();
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.generation.temperature = temperature;
        self
    }

    pub fn max_output_tokens(mut self, tokens: u32) -> Self {
        self.config.generation.max_output_tokens = tokens;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.generation.timeout = timeout;
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        // 至少尝试一次
        self.config.generation.max_attempts = attempts.max(1);
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.generation.retry_delay = delay;
        self
    }

    pub fn max_value_len(mut self, len: usize) -> Self {
        self.config.validation.max_value_len = len;
        self
    }

    pub fn reject_missing_columns(mut self, reject: bool) -> Self {
        self.config.validation.reject_missing_columns = reject;
        self
    }

    pub fn store_dir(mut self, dir: PathBuf) -> Self {
        self.config.store_dir = dir;
        self
    }

    pub fn max_document_bytes(mut self, bytes: usize) -> Self {
        self.config.max_document_bytes = bytes;
        self
    }

    pub fn build(self) -> GlobalConfig {
        self.config
    }
}
