//! 全局错误类型定义

use thiserror::Error;
use regex::Error as RegexError;
use serde_json::Error as SerdeJsonError;
use serde_yaml::Error as SerdeYamlError;
use std::io::Error as IoError;
use url::ParseError as UrlParseError;

use crate::rule::model::RulebookStatus;

#[derive(Error, Debug)]
pub enum RulebookError {
    // 抽取流水线错误（最终落盘到 processing_error）
    #[error("upstream unavailable: {0}")]
    ExtractionTransportFailed(String),
    #[error("unparseable response: {0}")]
    ExtractionUnparseable(String),
    #[error("no valid rules produced")]
    ExtractionEmpty,

    // 上游单次调用错误（仅在重试循环内部流转）
    #[error("upstream transient failure: {0}")]
    UpstreamTransient(String),
    #[error("upstream rejected request: {0}")]
    UpstreamRejected(String),

    // 规则书相关错误
    #[error("rulebook not ready: {0}")]
    RulebookNotReady(RulebookStatus),
    #[error("rulebook not found: {0}")]
    RulebookNotFound(String),
    #[error("illegal transition from {from} on {event}")]
    IllegalTransition {
        from: RulebookStatus,
        event: String,
    },
    #[error("invalid rule: {0}")]
    InvalidRule(String),

    // 编译相关错误
    #[error("regex compile failed: {0}")]
    RegexCompileError(#[from] RegexError),

    // 输入相关错误
    #[error("invalid document: {0}")]
    InvalidDocument(String),
    #[error("invalid dataset: {0}")]
    InvalidDataset(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),

    // 存储相关错误
    #[error("rulebook store failure: {0}")]
    StoreError(String),
    #[error("MessagePack encode/decode failed: {0}")]
    MsgPackError(String),

    // 网络相关错误
    #[error("http request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    // 序列化/反序列化错误
    #[error("JSON parse failed: {0}")]
    JsonError(#[from] SerdeJsonError),
    #[error("YAML parse failed: {0}")]
    YamlError(#[from] SerdeYamlError),
    #[error("CSV read failed: {0}")]
    CsvError(#[from] csv::Error),

    // 基础错误
    #[error("io failure: {0}")]
    IoError(#[from] IoError),
    #[error("url parse failed: {0}")]
    UrlError(#[from] UrlParseError),
}

impl RulebookError {
    /// 是否属于可重试的传输层故障（超时、连接失败、限流、5xx）
    pub fn is_retryable(&self) -> bool {
        match self {
            RulebookError::UpstreamTransient(_) => true,
            RulebookError::HttpError(e) => {
                if e.is_timeout() || e.is_connect() || e.is_request() {
                    return true;
                }
                match e.status() {
                    Some(status) => status.as_u16() == 429 || status.is_server_error(),
                    None => false,
                }
            }
            _ => false,
        }
    }

    /// 是否为抽取流水线的终态失败
    pub fn is_extraction_failure(&self) -> bool {
        matches!(
            self,
            RulebookError::ExtractionTransportFailed(_)
                | RulebookError::ExtractionUnparseable(_)
                | RulebookError::ExtractionEmpty
        )
    }
}

// 全局Result类型
pub type RbResult<T> = Result<T, RulebookError>;
