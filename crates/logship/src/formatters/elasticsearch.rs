//! 📡 ElasticsearchFormatter: records in, index-tagged documents out 🚀
//!
//! The default formatter of the handler. Given an index and a type at birth, it
//! stamps them on every document it produces, forever, without complaint.
//!
//! Body layout (the fields a Kibana dashboard expects to find):
//!
//! ```text
//! {
//!   "message": "...", "context": {...}, "level": 400, "level_name": "ERROR",
//!   "channel": "app", "datetime": "2026-10-16T08:15:42.123456Z", "extra": {...}
//! }
//! ```

use chrono::SecondsFormat;
use serde_json::{Map, Value};

use super::{DocumentFormatter, Formatter};
use crate::common::{DOCUMENT_TYPE, Document, LogRecord};
use crate::errors::FormatError;

/// 📡 The index-aware formatter. Knows its index. Knows its type. Knows its worth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElasticsearchFormatter {
    index: String,
    doc_type: String,
}

impl ElasticsearchFormatter {
    pub fn new(index: impl Into<String>, doc_type: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            doc_type: doc_type.into(),
        }
    }

    /// 🎯 Shortcut for the usual `_doc` type.
    pub fn for_index(index: impl Into<String>) -> Self {
        Self::new(index, DOCUMENT_TYPE)
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn doc_type(&self) -> &str {
        &self.doc_type
    }

    fn body_of(record: &LogRecord) -> Map<String, Value> {
        let mut body = Map::new();
        body.insert("message".to_string(), Value::String(record.message.clone()));
        body.insert("context".to_string(), Value::Object(record.context.clone()));
        body.insert("level".to_string(), Value::from(record.level.code()));
        body.insert(
            "level_name".to_string(),
            Value::String(record.level.name().to_string()),
        );
        body.insert("channel".to_string(), Value::String(record.channel.clone()));
        body.insert(
            "datetime".to_string(),
            Value::String(record.datetime.to_rfc3339_opts(SecondsFormat::Micros, true)),
        );
        body.insert("extra".to_string(), Value::Object(record.extra.clone()));
        body
    }
}

impl Formatter for ElasticsearchFormatter {
    /// 🧾 The flat shape: body plus `_index` and `_type`, ready for anyone who wants raw JSON.
    fn format(&self, record: &LogRecord) -> Result<Value, FormatError> {
        self.format_document(record).map(Document::into_value)
    }

    fn into_document_formatter(self: Box<Self>) -> Option<Box<dyn DocumentFormatter>> {
        Some(self)
    }
}

impl DocumentFormatter for ElasticsearchFormatter {
    fn format_document(&self, record: &LogRecord) -> Result<Document, FormatError> {
        Document::new(&self.index, &self.doc_type, Self::body_of(record))
    }
}
