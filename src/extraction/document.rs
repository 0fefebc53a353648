//! 文档内容接口
//! PDF 字节级文本抽取不在本库范围内，核心只依赖 DocumentContent

use crate::error::{RbResult, RulebookError};

const PDF_MAGIC: &[u8] = b"%PDF-";

/// 送入生成服务的文档内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentContent {
    Text(String),
    Bytes { mime_type: String, data: Vec<u8> },
}

impl DocumentContent {
    pub fn len(&self) -> usize {
        match self {
            DocumentContent::Text(text) => text.len(),
            DocumentContent::Bytes { data, .. } => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 文档文本抽取器（外部协作者）
pub trait DocumentTextExtractor: Send + Sync {
    fn extract(&self, source: &[u8]) -> RbResult<DocumentContent>;
}

/// 默认抽取器：PDF 以原始字节交给生成服务，其余按 UTF-8 文本处理
#[derive(Debug, Clone)]
pub struct RawDocumentExtractor {
    max_bytes: usize,
}

impl RawDocumentExtractor {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    pub fn is_pdf(source: &[u8]) -> bool {
        source.starts_with(PDF_MAGIC)
    }
}

impl DocumentTextExtractor for RawDocumentExtractor {
    fn extract(&self, source: &[u8]) -> RbResult<DocumentContent> {
        if source.is_empty() {
            return Err(RulebookError::InvalidDocument("document is empty".to_string()));
        }
        if source.len() > self.max_bytes {
            return Err(RulebookError::InvalidDocument(format!(
                "document is {} bytes, limit is {}",
                source.len(),
                self.max_bytes
            )));
        }

        if Self::is_pdf(source) {
            return Ok(DocumentContent::Bytes {
                mime_type: "application/pdf".to_string(),
                data: source.to_vec(),
            });
        }

        let text = std::str::from_utf8(source).map_err(|e| {
            RulebookError::InvalidDocument(format!("document is neither PDF nor UTF-8 text: {}", e))
        })?;
        if text.trim().is_empty() {
            return Err(RulebookError::InvalidDocument("document has no text".to_string()));
        }
        Ok(DocumentContent::Text(text.to_string()))
    }
}
