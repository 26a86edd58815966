//! 🚀 logship: ships log records to Elasticsearch through the `_bulk` API.
//!
//! ```text
//!   LogRecord ─▶ ElasticsearchHandler ─▶ DocumentFormatter ─▶ bulk::dispatch ─▶ DocumentStoreClient
//! ```
//!
//! Start at [`ElasticsearchHandler`]. Everything else is a supporting character. 🦆

pub mod app_config;
pub mod backends;
pub mod bulk;
pub mod common;
pub mod errors;
pub mod formatters;
pub mod handler;

pub use app_config::{ConfigurationProvider, FigmentConfigProvider, load_provider};
pub use backends::{
    DocumentStoreClient, ElasticsearchClient, ElasticsearchClientConfig, HostEntry, RecordingClient,
};
pub use bulk::{BulkItem, BulkRequest, BulkResponse, ItemError};
pub use common::{DEFAULT_INDEX, DOCUMENT_TYPE, Document, Level, LogRecord};
pub use errors::{
    ActivationError, BulkIndexFailure, DispatchFailure, FormatError, HandlerError, TransportError,
};
pub use formatters::{DocumentFormatter, ElasticsearchFormatter, Formatter, JsonFormatter};
pub use handler::{ElasticsearchHandler, HandlerOptions};
