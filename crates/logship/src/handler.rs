//! 🚪 The Handler Façade, the front desk of logship.
//!
//! 🎬 *[a record walks up to the desk. "I'd like to be indexed, please."]*
//! *[the clerk checks three things: is the store even open, are you loud enough,
//! and is the right stylist on shift. then, and only then, it rings the bell.]*
//!
//! ```text
//!   submit_one(record) ──┐                                   ┌─▶ Ok
//!                        ├─▶ processors ─▶ formatter ─▶ bulk ┤
//!   submit_batch(records)┘                                   └─▶ DispatchFailure ─┬─▶ ignore_error: Ok
//!                                                                                 └─▶ Err(HandlerError)
//! ```
//!
//! ## Knowledge Graph 🧠
//! - Activation is decided once, at construction. Inactive is forever. No retries.
//! - Only [`DocumentFormatter`]s get past `set_formatter`. Everyone else gets
//!   `InvalidConfiguration`, immediately.
//! - One submission, one round trip, awaited before returning. Nothing runs in the
//!   background, nothing is buffered between calls.
//!
//! 🦆

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::app_config::{
    CONFIG_PATH_CONNECTION, CONFIG_PATH_IGNORE_ERROR, CONFIG_PATH_INDEX, ConfigurationProvider,
};
use crate::backends::{DocumentStoreClient, ElasticsearchClient};
use crate::bulk;
use crate::common::{DEFAULT_INDEX, DOCUMENT_TYPE, Document, Level, LogRecord};
use crate::errors::{ActivationError, HandlerError};
use crate::formatters::{DocumentFormatter, ElasticsearchFormatter, Formatter};

/// 🔧 Resolved once at construction, read-only after that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandlerOptions {
    /// 📦 Where documents go.
    pub index: String,
    /// 📎 Always `_doc` in this system, but it travels with the options anyway.
    pub document_type: String,
    /// 🙈 When true, dispatch failures are swallowed whole. No burp.
    pub ignore_error: bool,
}

impl Default for HandlerOptions {
    fn default() -> Self {
        Self {
            index: DEFAULT_INDEX.to_string(),
            document_type: DOCUMENT_TYPE.to_string(),
            ignore_error: false,
        }
    }
}

impl HandlerOptions {
    /// 🗝️ Ask the provider for index and `ignore_error`. Anything weird falls back to defaults.
    pub fn from_provider(provider: &dyn ConfigurationProvider) -> Self {
        let defaults = Self::default();
        let index = match provider.get_or(CONFIG_PATH_INDEX, Value::String(defaults.index.clone())) {
            Value::String(index) if !index.trim().is_empty() => index,
            _ => defaults.index,
        };
        let ignore_error = provider
            .get(CONFIG_PATH_IGNORE_ERROR)
            .and_then(|value| value.as_bool())
            .unwrap_or(defaults.ignore_error);
        Self {
            index,
            document_type: defaults.document_type,
            ignore_error,
        }
    }
}

type Processor = Box<dyn Fn(&mut LogRecord) + Send + Sync>;

/// 📡 Ships log records to Elasticsearch through the bulk API.
pub struct ElasticsearchHandler {
    client: Result<Box<dyn DocumentStoreClient>, ActivationError>,
    options: HandlerOptions,
    formatter: Box<dyn DocumentFormatter>,
    level: Level,
    bubble: bool,
    processors: Vec<Processor>,
}

impl fmt::Debug for ElasticsearchHandler {
    // 🎭 manual Debug because processors are closures, and closures don't do small talk.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElasticsearchHandler")
            .field("client", &self.client)
            .field("options", &self.options)
            .field("formatter", &self.formatter)
            .field("level", &self.level)
            .field("bubble", &self.bubble)
            .field("processors", &self.processors.len())
            .finish()
    }
}

impl ElasticsearchHandler {
    /// 🚀 Build from configuration, using the reqwest-backed client.
    ///
    /// Never fails. If the connection blob is missing, empty, or can't produce a client,
    /// the handler is born inactive and says why in [`Self::inactive_reason`].
    pub fn from_provider(provider: &dyn ConfigurationProvider) -> Self {
        Self::from_provider_with(provider, |blob| {
            let client = ElasticsearchClient::from_config(blob)?;
            Ok(Box::new(client) as Box<dyn DocumentStoreClient>)
        })
    }

    /// 🏗️ Same as [`Self::from_provider`], with a caller-supplied client factory.
    ///
    /// The factory only runs when a non-empty connection object is present.
    pub fn from_provider_with<F>(provider: &dyn ConfigurationProvider, build_client: F) -> Self
    where
        F: FnOnce(&Value) -> anyhow::Result<Box<dyn DocumentStoreClient>>,
    {
        let options = HandlerOptions::from_provider(provider);
        let client = match provider.get(CONFIG_PATH_CONNECTION) {
            Some(Value::Object(blob)) if !blob.is_empty() => {
                build_client(&Value::Object(blob)).map_err(|error| {
                    warn!(
                        "⚠️ Elasticsearch client construction failed, handler stays inactive: {:#}",
                        error
                    );
                    ActivationError::ClientConstructionFailed(format!("{error:#}"))
                })
            }
            _ => {
                debug!("📭 no Elasticsearch connection configured, handler stays inactive");
                Err(ActivationError::ConfigurationAbsent)
            }
        };
        Self::assemble(client, options)
    }

    /// 🔌 Skip configuration entirely and plug a client in directly.
    pub fn with_client(client: Box<dyn DocumentStoreClient>, options: HandlerOptions) -> Self {
        Self::assemble(Ok(client), options)
    }

    fn assemble(
        client: Result<Box<dyn DocumentStoreClient>, ActivationError>,
        options: HandlerOptions,
    ) -> Self {
        let formatter = Box::new(ElasticsearchFormatter::new(
            &options.index,
            &options.document_type,
        ));
        Self {
            client,
            options,
            formatter,
            level: Level::default(),
            bubble: true,
            processors: Vec::new(),
        }
    }

    /// 🎚️ Minimum level `submit_one` will ship. Default `info`.
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// 🫧 Whether handled records keep bubbling to the next handler. Default `true`.
    pub fn with_bubble(mut self, bubble: bool) -> Self {
        self.bubble = bubble;
        self
    }

    pub fn is_active(&self) -> bool {
        self.client.is_ok()
    }

    /// 🔎 Why the lights are off, if they are.
    pub fn inactive_reason(&self) -> Option<&ActivationError> {
        self.client.as_ref().err()
    }

    pub fn options(&self) -> &HandlerOptions {
        &self.options
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn bubble(&self) -> bool {
        self.bubble
    }

    pub fn formatter(&self) -> &dyn DocumentFormatter {
        self.formatter.as_ref()
    }

    /// 🪪 Swap the formatter. Index/type-aware formatters only.
    pub fn set_formatter(&mut self, formatter: Box<dyn Formatter>) -> Result<(), HandlerError> {
        match formatter.into_document_formatter() {
            Some(formatter) => {
                self.formatter = formatter;
                Ok(())
            }
            None => Err(HandlerError::InvalidConfiguration(
                "ElasticsearchHandler is only compatible with index-aware document formatters"
                    .to_string(),
            )),
        }
    }

    /// 🧪 Add a processor. They run in the order they were pushed, on every submission path.
    pub fn push_processor<P>(&mut self, processor: P)
    where
        P: Fn(&mut LogRecord) + Send + Sync + 'static,
    {
        self.processors.push(Box::new(processor));
    }

    /// 🎯 Active, and the record is at or above the threshold.
    pub fn is_handling(&self, record: &LogRecord) -> bool {
        self.is_active() && record.level >= self.level
    }

    /// 📤 Ship one record.
    ///
    /// Returns `Ok(true)` when the record was handled and must not bubble further,
    /// `Ok(false)` when it was skipped or may keep bubbling.
    pub async fn submit_one(&self, record: LogRecord) -> Result<bool, HandlerError> {
        let Ok(client) = self.client.as_deref() else {
            return Ok(false);
        };
        if record.level < self.level {
            return Ok(false);
        }

        let record = self.process(record);
        let document = self.formatter.format_document(&record)?;
        self.bulk_send(client, vec![document]).await?;
        Ok(!self.bubble)
    }

    /// 📦 Ship a whole batch, in order, in one round trip. No level filtering here.
    pub async fn submit_batch(&self, records: Vec<LogRecord>) -> Result<(), HandlerError> {
        let Ok(client) = self.client.as_deref() else {
            return Ok(());
        };
        if records.is_empty() {
            return Ok(());
        }

        let records: Vec<LogRecord> = records.into_iter().map(|r| self.process(r)).collect();
        let documents = self.formatter.format_documents(&records)?;
        self.bulk_send(client, documents).await
    }

    fn process(&self, mut record: LogRecord) -> LogRecord {
        for processor in &self.processors {
            processor(&mut record);
        }
        record
    }

    async fn bulk_send(
        &self,
        client: &dyn DocumentStoreClient,
        documents: Vec<Document>,
    ) -> Result<(), HandlerError> {
        match bulk::dispatch(client, documents).await {
            Ok(()) => Ok(()),
            // -- 🙈 swallowed whole. no log line: this handler may be the log.
            Err(_) if self.options.ignore_error => Ok(()),
            Err(failure) => Err(HandlerError::Dispatch(failure)),
        }
    }
}
