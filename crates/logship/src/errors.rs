//! 💀 Errors, the whole family tree.
//!
//! 🎬 *[a bulk request returns. `"errors": true`. somewhere, a pager vibrates.]*
//!
//! Every way this crate can disappoint you lives here, sorted by who gets to hear about it:
//!
//! ```text
//!   ActivationError   ──▶ absorbed. the handler goes quiet for life.
//!   HandlerError::InvalidConfiguration ──▶ always thrown. programmer error.
//!   HandlerError::Format               ──▶ always thrown. the record was unshippable.
//!   HandlerError::Dispatch(DispatchFailure) ──▶ thrown unless `ignore_error` says hush.
//!        ├── TransportError      (the call itself died)
//!        └── BulkIndexFailure    (the call lived, a document did not)
//! ```
//!
//! 🦆 The duck is not an error. The duck is a lifestyle.

use std::iter;

use thiserror::Error;

use crate::bulk::ItemError;

/// 🚫 Why a handler decided to sit this one out. Forever.
///
/// Never returned from a constructor. It is stored on the handler and can be
/// inspected through `ElasticsearchHandler::inactive_reason`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActivationError {
    /// 📭 No usable connection blob under the config key. Missing, null, empty, or not an object.
    #[error("no usable Elasticsearch connection configuration was found")]
    ConfigurationAbsent,
    /// 🏗️ A blob was there, but the client refused to be born from it.
    #[error("the Elasticsearch client could not be constructed: {0}")]
    ClientConstructionFailed(String),
}

/// 🧾 A record could not be turned into a store-ready document.
#[derive(Debug, Error)]
pub enum FormatError {
    /// 📭 Documents without a destination are just feelings.
    #[error("document has no target index")]
    MissingIndex,
    #[error("failed to serialize log record")]
    Serialize(#[from] serde_json::Error),
}

/// 📡 The document store client could not complete the bulk call.
#[derive(Debug, Error)]
pub enum TransportError {
    /// 🌩️ Network-level failure: DNS, TCP, TLS, timeout. The packets went to a farm upstate.
    #[error("bulk request could not be sent")]
    Request(#[from] reqwest::Error),
    /// 🚪 The store answered, but not with a 2xx.
    #[error("bulk request was rejected with status {status}: {body}")]
    Status { status: u16, body: String },
    /// 🧾 The request body refused to become NDJSON.
    #[error("bulk request body could not be encoded")]
    Encode(#[source] serde_json::Error),
    /// 🧩 The store answered with something that isn't a bulk response.
    #[error("bulk response could not be decoded")]
    Decode(#[source] serde_json::Error),
    /// 🫁 gzip had a bad day.
    #[error("bulk request body could not be compressed")]
    Compression(#[from] std::io::Error),
    /// 🔌 The store is unreachable for reasons the client describes in prose.
    #[error("document store unavailable: {0}")]
    Unavailable(String),
}

/// 📉 One or more documents failed to index.
///
/// Built from the **first** errored item of a bulk response only. The item's
/// `caused_by` chain is preserved as nested failures, reachable both through
/// [`BulkIndexFailure::chain`] and through `std::error::Error::source`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BulkIndexFailure {
    error_type: Option<String>,
    reason: Option<String>,
    message: String,
    #[source]
    caused_by: Option<Box<BulkIndexFailure>>,
}

/// 🤷 What we say when the store admits to errors but won't name names.
pub const UNKNOWN_INDEX_FAILURE: &str = "Elasticsearch failed to index one or more records.";

impl BulkIndexFailure {
    /// 🔄 Lift an item-level error descriptor (and its `caused_by` ancestry) into a failure.
    pub fn from_item_error(error: &ItemError) -> Self {
        Self {
            error_type: Some(error.error_type.clone()),
            reason: Some(error.reason.clone()),
            message: format!("{}: {}", error.error_type, error.reason),
            caused_by: error
                .caused_by
                .as_deref()
                .map(|cause| Box::new(Self::from_item_error(cause))),
        }
    }

    /// 🤷 `errors: true`, but no item owns up to it.
    pub fn unknown() -> Self {
        Self {
            error_type: None,
            reason: None,
            message: UNKNOWN_INDEX_FAILURE.to_string(),
            caused_by: None,
        }
    }

    pub fn error_type(&self) -> Option<&str> {
        self.error_type.as_deref()
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn caused_by(&self) -> Option<&BulkIndexFailure> {
        self.caused_by.as_deref()
    }

    /// 🧅 Walk the onion, outermost layer first. Always yields at least `self`.
    pub fn chain(&self) -> impl Iterator<Item = &BulkIndexFailure> {
        iter::successors(Some(self), |failure| failure.caused_by())
    }
}

/// 💥 The bulk dispatch failed, for transport or indexing reasons.
///
/// This is the only failure the `ignore_error` policy is allowed to swallow.
#[derive(Debug, Error)]
pub enum DispatchFailure {
    #[error("Error sending messages to Elasticsearch")]
    Transport(#[source] TransportError),
    #[error("Error sending messages to Elasticsearch")]
    Index(#[source] BulkIndexFailure),
}

impl DispatchFailure {
    /// 🔎 The indexing failure inside, if that's the kind of day it was.
    pub fn index_failure(&self) -> Option<&BulkIndexFailure> {
        match self {
            DispatchFailure::Index(failure) => Some(failure),
            DispatchFailure::Transport(_) => None,
        }
    }

    pub fn transport_error(&self) -> Option<&TransportError> {
        match self {
            DispatchFailure::Transport(error) => Some(error),
            DispatchFailure::Index(_) => None,
        }
    }
}

/// 🚨 Everything the handler façade can hand back to the host.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// 🔧 Wrong tool for the job. Raised at assignment time, never suppressed.
    #[error("{0}")]
    InvalidConfiguration(String),
    #[error("failed to format log record")]
    Format(#[from] FormatError),
    #[error(transparent)]
    Dispatch(#[from] DispatchFailure),
}
