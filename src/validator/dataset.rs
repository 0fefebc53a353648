//! 表格数据集模型
//! 表头 + 行，单元格可能为空、数字、布尔或无法解码的原始字节

use std::borrow::Cow;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Serialize;

use crate::error::{RbResult, RulebookError};

/// 单元格值
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    // 非 UTF-8 原始字节
    Bytes(Vec<u8>),
}

impl CellValue {
    /// 空值判定：Null、空白文本、NaN
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Float(f) => f.is_nan(),
            CellValue::Bytes(b) => b.is_empty(),
            CellValue::Integer(_) | CellValue::Bool(_) => false,
        }
    }

    /// 转为参与匹配的字符串，字节无法解码时返回错误描述
    pub fn as_text(&self) -> Result<Cow<'_, str>, String> {
        match self {
            CellValue::Null => Ok(Cow::Borrowed("")),
            CellValue::Text(s) => Ok(Cow::Borrowed(s.as_str())),
            CellValue::Integer(i) => Ok(Cow::Owned(i.to_string())),
            // 保留 ".0"：10.0 → "10.0"
            CellValue::Float(f) => Ok(Cow::Owned(format!("{:?}", f))),
            CellValue::Bool(b) => Ok(Cow::Owned(b.to_string())),
            CellValue::Bytes(b) => std::str::from_utf8(b)
                .map(Cow::Borrowed)
                .map_err(|e| format!("value is not valid UTF-8: {}", e)),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_text() {
            Ok(text) => f.write_str(&text),
            Err(_) => match self {
                CellValue::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
                _ => Ok(()),
            },
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Integer(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Float(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(CellValue::Null, Into::into)
    }
}

/// 表格数据集
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    header: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl Dataset {
    /// 表头允许重复列名，按首次出现位置查找
    pub fn new(header: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self { header, rows }
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 列名 → 首次出现的下标
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.header.iter().position(|name| name == column)
    }

    /// 读取单元格，越界（短行）视为 Null
    pub fn cell(&self, row: usize, column: usize) -> &CellValue {
        static NULL: CellValue = CellValue::Null;
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .unwrap_or(&NULL)
    }

    /// 从 CSV 读取（首行为表头，允许不等长行）
    pub fn from_csv_reader<R: Read>(reader: R) -> RbResult<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let header: Vec<String> = csv_reader
            .byte_headers()?
            .iter()
            .map(|field| String::from_utf8_lossy(field).trim().to_string())
            .collect();
        if header.iter().all(String::is_empty) {
            return Err(RulebookError::InvalidDataset("CSV has no header row".to_string()));
        }

        let mut rows = Vec::new();
        for record in csv_reader.byte_records() {
            let record = record?;
            let mut cells: Vec<CellValue> = record.iter().map(csv_field).collect();
            if cells.len() < header.len() {
                cells.resize(header.len(), CellValue::Null);
            }
            rows.push(cells);
        }

        Ok(Self { header, rows })
    }

    pub fn from_csv_path(path: impl AsRef<Path>) -> RbResult<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_csv_reader(file)
    }
}

fn csv_field(field: &[u8]) -> CellValue {
    if field.is_empty() {
        return CellValue::Null;
    }
    match std::str::from_utf8(field) {
        Ok(text) => CellValue::Text(text.to_string()),
        Err(_) => CellValue::Bytes(field.to_vec()),
    }
}
