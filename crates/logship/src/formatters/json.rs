//! 🚶 JsonFormatter: the record, serialized, with no idea where it's headed.
//!
//! Perfectly good at its job. Just not the job the Elasticsearch handler is hiring for.

use serde_json::Value;

use super::Formatter;
use crate::common::LogRecord;
use crate::errors::FormatError;

/// 🚶 Straight `serde_json::to_value`. No index, no type, no ambitions.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format(&self, record: &LogRecord) -> Result<Value, FormatError> {
        Ok(serde_json::to_value(record)?)
    }
}
