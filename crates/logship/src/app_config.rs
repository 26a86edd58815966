//! 🔧 App Configuration, the sacred TOML-to-handler pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." -- every developer at 3am 🦆
//!
//! The handler never reads files or environment variables itself. It asks a
//! [`ConfigurationProvider`] for keys, and whoever built the provider decides where the
//! answers come from. In production that's [`FigmentConfigProvider`] (env vars + an
//! optional TOML file). In tests it's usually a plain `serde_json::Value`.
//!
//! Keys are `/`-separated paths:
//!
//! ```toml
//! [elasticsearch_logger]
//! index = "app-logs"
//! ignore_error = false
//!
//! [elasticsearch_logger.config]
//! hosts = ["http://localhost:9200"]
//! ```

use std::path::Path;

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde_json::Value;
use tracing::info;

/// 📡 Connection blob handed to the client builder.
pub const CONFIG_PATH_CONNECTION: &str = "elasticsearch_logger/config";
/// 📦 Target index name.
pub const CONFIG_PATH_INDEX: &str = "elasticsearch_logger/index";
/// 🙈 Swallow dispatch failures instead of returning them.
pub const CONFIG_PATH_IGNORE_ERROR: &str = "elasticsearch_logger/ignore_error";

/// 🔧 Prefix for environment overrides. `LOGSHIP_ELASTICSEARCH_LOGGER__INDEX=app-logs`.
pub const ENV_PREFIX: &str = "LOGSHIP_";

/// 🗝️ Anything that can answer "what's under this key?".
pub trait ConfigurationProvider {
    /// `None` when the key is absent. What counts as "absent" is the provider's call.
    fn get(&self, key: &str) -> Option<Value>;

    fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).unwrap_or(default)
    }
}

/// 🧪 A JSON tree is a perfectly respectable provider. `/` walks into nested objects.
impl ConfigurationProvider for Value {
    fn get(&self, key: &str) -> Option<Value> {
        key.split('/')
            .try_fold(self, |node, segment| node.get(segment))
            .filter(|found| !found.is_null())
            .cloned()
    }
}

/// 📋 Figment-backed provider: `LOGSHIP_*` env vars, plus a TOML file when given one.
#[derive(Debug, Clone)]
pub struct FigmentConfigProvider {
    figment: Figment,
}

impl FigmentConfigProvider {
    pub fn new(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn figment(&self) -> &Figment {
        &self.figment
    }
}

impl ConfigurationProvider for FigmentConfigProvider {
    fn get(&self, key: &str) -> Option<Value> {
        let dotted = key.replace('/', ".");
        let found = self.figment.find_value(&dotted).ok()?;
        found.deserialize::<Value>().ok().filter(|value| !value.is_null())
    }
}

/// 🚀 Load the provider, from env vars, from a file, or from the sheer power of hoping.
///
/// 📐 Same layering as always:
///   - `config_file_name` is None  → env vars only.
///   - `config_file_name` is Some  → env vars + TOML file, merged. TOML wins on conflicts.
///
/// 💀 Errors only when the file exists and is not valid TOML. A missing connection
/// blob is not an error here. The handler will simply stay inactive.
pub fn load_provider(config_file_name: Option<&Path>) -> anyhow::Result<FigmentConfigProvider> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = Figment::new().merge(Env::prefixed(ENV_PREFIX).split("__"));
    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    // -- figment is lazy. poke it once so a broken TOML file fails here, with a path
    // -- in the message, rather than as a mysteriously inactive handler later.
    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables ({}*).",
            path.display(),
            ENV_PREFIX
        ),
        None => format!(
            "💀 Failed to parse configuration from environment variables ({}*). No file was provided, this one's all on the environment.",
            ENV_PREFIX
        ),
    };
    config.extract::<figment::value::Dict>().context(context_msg)?;

    Ok(FigmentConfigProvider::new(config))
}
