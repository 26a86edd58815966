//! 📦 Common data structures, the building blocks of logship.
//!
//! 🎬 COLD OPEN. INT. APPLICATION. SOMETIME AFTER THE DEPLOY
//!
//! Something happened. Something always happens. The application, being a
//! responsible adult, wrote it down in a [`LogRecord`]. The record does not know
//! where it's going. It does not know about indices, or shards, or the
//! `_bulk` endpoint. It is a postcard with no stamp.
//!
//! Then a formatter shows up, staples an index and a type to it, and now
//! it's a [`Document`]. A document has a destination. A document has purpose.
//! A document has, crucially, a non-empty `target_index`, because we checked.
//!
//! 🦆

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::errors::FormatError;

/// 📎 The document type stamped on every document. ES 7 called it `_doc` and stopped asking.
pub const DOCUMENT_TYPE: &str = "_doc";

/// 📡 The index used when configuration doesn't name one.
pub const DEFAULT_INDEX: &str = "monolog";

/// 🎚️ Severity, loud to louder.
///
/// The discriminants are the conventional syslog-flavoured codes, so
/// `level as u16` round-trips with every log viewer that has ever existed.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug = 100,
    #[default]
    Info = 200,
    Notice = 250,
    Warning = 300,
    Error = 400,
    Critical = 500,
    Alert = 550,
    Emergency = 600,
}

impl Level {
    pub fn code(self) -> u16 {
        self as u16
    }

    /// 📢 The SHOUTING name, as it appears in `level_name`.
    pub fn name(self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Notice => "NOTICE",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
            Level::Alert => "ALERT",
            Level::Emergency => "EMERGENCY",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown log level '{0}'")]
pub struct UnknownLevel(pub String);

impl FromStr for Level {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "notice" => Ok(Level::Notice),
            "warning" | "warn" => Ok(Level::Warning),
            "error" => Ok(Level::Error),
            "critical" => Ok(Level::Critical),
            "alert" => Ok(Level::Alert),
            "emergency" => Ok(Level::Emergency),
            _ => Err(UnknownLevel(s.to_string())),
        }
    }
}

/// 📝 One thing that happened, as told by the application.
///
/// Handed to the handler by value and never mutated in place by it.
/// Processors work on their own copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub message: String,
    #[serde(default)]
    pub context: Map<String, Value>,
    pub level: Level,
    pub channel: String,
    pub datetime: DateTime<Utc>,
    #[serde(default)]
    pub extra: Map<String, Value>,
}

impl LogRecord {
    /// 🚀 A fresh record, stamped with "now".
    pub fn new(level: Level, channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: Map::new(),
            level,
            channel: channel.into(),
            datetime: Utc::now(),
            extra: Map::new(),
        }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn with_datetime(mut self, datetime: DateTime<Utc>) -> Self {
        self.datetime = datetime;
        self
    }
}

/// 📄 A log record dressed for the store: destination stapled on, body ready to go.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    target_index: String,
    target_type: String,
    body: Map<String, Value>,
}

impl Document {
    /// 🏗️ Build a document. Blank indices are refused at the door.
    pub fn new(
        target_index: impl Into<String>,
        target_type: impl Into<String>,
        body: Map<String, Value>,
    ) -> Result<Self, FormatError> {
        let target_index = target_index.into();
        if target_index.trim().is_empty() {
            return Err(FormatError::MissingIndex);
        }
        Ok(Self {
            target_index,
            target_type: target_type.into(),
            body,
        })
    }

    pub fn target_index(&self) -> &str {
        &self.target_index
    }

    pub fn target_type(&self) -> &str {
        &self.target_type
    }

    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    /// 📤 Hand over the pieces, no copies.
    pub fn into_parts(self) -> (String, String, Map<String, Value>) {
        (self.target_index, self.target_type, self.body)
    }

    /// 🧾 The flat shape: body fields plus `_index` and `_type`.
    pub fn into_value(self) -> Value {
        let mut flat = self.body;
        flat.insert("_index".to_string(), Value::String(self.target_index));
        flat.insert("_type".to_string(), Value::String(self.target_type));
        Value::Object(flat)
    }
}
