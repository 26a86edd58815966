//! 🔄 Formatters, the wardrobe department of the pipeline 🎭
//!
//! A [`LogRecord`] arrives in sweatpants. A formatter sends it out in a suit.
//!
//! ```text
//!   LogRecord ──▶ Formatter::format ──────────▶ serde_json::Value   (anyone can do this)
//!   LogRecord ──▶ DocumentFormatter::format_document ──▶ Document   (only the index-aware)
//! ```
//!
//! ## Knowledge Graph 🧠
//! - `Formatter`: the general contract. JSON in, JSON out. No opinions about destinations.
//! - `DocumentFormatter`: the store-specific contract. Knows the index, knows the type,
//!   stamps both on every [`Document`].
//! - The handler only accepts the second kind. `Formatter::into_document_formatter` is how
//!   it asks "are you one of us?" without reaching for `Any`.
//!
//! 🦆

use std::fmt::Debug;

use serde_json::Value;

use crate::common::{Document, LogRecord};
use crate::errors::FormatError;

pub(crate) mod elasticsearch;
pub(crate) mod json;

pub use elasticsearch::ElasticsearchFormatter;
pub use json::JsonFormatter;

/// 🎨 Turns records into JSON. The general-purpose stylist.
pub trait Formatter: Debug + Send + Sync {
    fn format(&self, record: &LogRecord) -> Result<Value, FormatError>;

    /// 📦 Order in, order out.
    fn format_batch(&self, records: &[LogRecord]) -> Result<Vec<Value>, FormatError> {
        records.iter().map(|record| self.format(record)).collect()
    }

    /// 🪪 Show your badge. Index/type-aware formatters hand themselves over as
    /// [`DocumentFormatter`]s, everyone else gets `None` and a polite rejection.
    fn into_document_formatter(self: Box<Self>) -> Option<Box<dyn DocumentFormatter>> {
        None
    }
}

/// 📄 A formatter that knows where documents live.
///
/// # Contract 📜
/// - Every produced [`Document`] carries the configured index and document type.
/// - `format_documents` preserves input order, one document per record.
pub trait DocumentFormatter: Formatter {
    fn format_document(&self, record: &LogRecord) -> Result<Document, FormatError>;

    fn format_documents(&self, records: &[LogRecord]) -> Result<Vec<Document>, FormatError> {
        records
            .iter()
            .map(|record| self.format_document(record))
            .collect()
    }
}
