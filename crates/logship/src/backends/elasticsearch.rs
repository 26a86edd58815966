//! # 📡 THE ELASTICSEARCH CLIENT
//!
//! *Previously, on logship...*
//!
//! 🎬 COLD OPEN. INT. SERVER ROOM. 3:47 AM
//!
//! The application is on fire, and it would like to tell someone about it.
//! It has written four hundred log lines in two seconds. Each one is a tiny
//! scream. This module's job is to carry those screams to a cluster, in bulk,
//! with the correct `Content-Type`, and report back exactly what the cluster said.
//!
//! It does not retry. It does not buffer. It does not judge. One call in, one
//! round trip, one answer out.
//!
//! 🦆 (mandatory duck, no context provided, none shall be requested)

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;
use reqwest::Url;
use reqwest::header::{AUTHORIZATION, CONTENT_ENCODING, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace};

use super::DocumentStoreClient;
use crate::bulk::{BulkRequest, BulkResponse};
use crate::errors::TransportError;

/// 🔧 The connection blob, as found under `elasticsearch_logger/config`.
///
/// ```toml
/// [elasticsearch_logger.config]
/// hosts = ["https://es.internal:9200"]
/// username = "elastic"
/// password = "changeme"
/// compression = true
/// ```
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ElasticsearchClientConfig {
    /// 📡 Where the cluster lives. Only the first one is used; load balancing is the
    /// load balancer's job.
    pub hosts: Vec<HostEntry>,
    /// 🔒 Username. The bouncer at the club. Except the club is a database.
    #[serde(default)]
    pub username: Option<String>,
    /// 🔒 Password. "password123" is not a password. It is a confession.
    #[serde(default)]
    pub password: Option<String>,
    /// 🔒 API key, the velvet rope variant of authentication. Wins over basic auth.
    #[serde(default, alias = "apiKey")]
    pub api_key: Option<String>,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// 🫁 gzip the bulk body. Bytes are squishy.
    #[serde(default)]
    pub compression: bool,
}

/// 🏠 One entry of `hosts`. Either a URL-ish string or the spelled-out form.
///
/// ```toml
/// hosts = ["es.internal"]                      # http://es.internal:9200
/// hosts = ["https://elastic:changeme@es:9243"] # credentials ride along
/// hosts = [{ host = "es.internal", port = 9201, scheme = "https", user = "elastic", pass = "changeme" }]
/// ```
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum HostEntry {
    Url(String),
    Parts {
        host: String,
        #[serde(default)]
        port: Option<u16>,
        #[serde(default)]
        scheme: Option<String>,
        #[serde(default)]
        path: Option<String>,
        #[serde(default)]
        user: Option<String>,
        #[serde(default)]
        pass: Option<String>,
    },
}

/// 🔌 The port a host gets when it doesn't name one.
pub const DEFAULT_PORT: u16 = 9200;

/// 📍 A host entry after the defaults have been filled in.
#[derive(Debug, Clone, PartialEq)]
struct Endpoint {
    base: Url,
    username: Option<String>,
    password: Option<String>,
}

impl HostEntry {
    /// 🧭 Fill in `http://` and `:9200` where missing, validate, and pull credentials out.
    fn resolve(&self) -> Result<Endpoint> {
        let (raw, user, pass) = match self {
            HostEntry::Url(raw) => {
                let raw = raw.trim();
                let raw = if raw.contains("://") {
                    raw.to_string()
                } else {
                    format!("http://{raw}")
                };
                (raw, None, None)
            }
            HostEntry::Parts {
                host,
                port,
                scheme,
                path,
                user,
                pass,
            } => {
                let scheme = scheme.as_deref().unwrap_or("http");
                let port = port.unwrap_or(DEFAULT_PORT);
                let path = path.as_deref().unwrap_or("").trim_start_matches('/');
                (
                    format!("{scheme}://{}:{port}/{path}", host.trim()),
                    user.clone(),
                    pass.clone(),
                )
            }
        };

        let mut base = Url::parse(&raw)
            .with_context(|| format!("💀 Host '{raw}' is not a URL we can talk to"))?;
        if !matches!(base.scheme(), "http" | "https") {
            anyhow::bail!(
                "💀 Host '{}' uses scheme '{}'. Elasticsearch speaks http or https, nothing fancier.",
                raw,
                base.scheme()
            );
        }
        if base.host_str().is_none() {
            anyhow::bail!("💀 Host '{raw}' has no host in it. Bold, but no.");
        }
        // -- Url forgets ports that match the scheme default, so ask the raw text instead.
        if !has_explicit_port(&raw) {
            base.set_port(Some(DEFAULT_PORT))
                .map_err(|()| anyhow::anyhow!("💀 Host '{raw}' refuses to take a port"))?;
        }

        // -- credentials embedded in the URL move out of it and into basic auth.
        let username = match base.username() {
            "" => user,
            embedded => Some(embedded.to_string()),
        };
        let password = base.password().map(str::to_string).or(pass);
        // -- never Err for an http(s) URL with a host.
        let _ = base.set_username("");
        let _ = base.set_password(None);

        Ok(Endpoint {
            base,
            username,
            password,
        })
    }
}

/// `host:port` after the scheme and before the path, userinfo and IPv6 brackets considered.
fn has_explicit_port(raw: &str) -> bool {
    let after_scheme = raw.split_once("://").map_or(raw, |(_, rest)| rest);
    let authority = after_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    let host_port = authority.rsplit('@').next().unwrap_or_default();
    if host_port.ends_with(']') {
        return false;
    }
    host_port
        .rsplit_once(':')
        .is_some_and(|(_, port)| !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()))
}

// 🔧 10 seconds to shake hands. If the cluster can't handshake in 10 seconds it's not having a good day.
fn default_connect_timeout_secs() -> u64 {
    10
}

// 🔧 30 seconds for a whole bulk round trip. We will wait. But not forever.
fn default_timeout_secs() -> u64 {
    30
}

/// 📡 The reqwest-backed [`DocumentStoreClient`].
///
/// Internally holds:
/// - `http`: the HTTP muscle 💪, reused across calls (reqwest pools connections for us)
/// - `bulk_url`: `{first host}/_bulk`, computed once
/// - `config`: auth and compression knobs
#[derive(Debug, Clone)]
pub struct ElasticsearchClient {
    http: reqwest::Client,
    bulk_url: String,
    basic_auth: Option<(String, Option<String>)>,
    config: ElasticsearchClientConfig,
}

impl ElasticsearchClient {
    /// 🏗️ Build a client straight from the raw configuration blob.
    pub fn from_config(blob: &Value) -> Result<Self> {
        let config: ElasticsearchClientConfig = serde_json::from_value(blob.clone()).context(
            "💀 The Elasticsearch connection blob doesn't look like a connection blob. \
             Expected at least `hosts = [\"http://...\"]`.",
        )?;
        Self::new(config)
    }

    /// 🚀 Stand up a client. No network I/O happens here, only validation and wiring.
    pub fn new(config: ElasticsearchClientConfig) -> Result<Self> {
        let host = config
            .hosts
            .first()
            .context("💀 No hosts configured. We have documents and nowhere to put them.")?;
        let endpoint = host.resolve()?;

        // -- trim_end_matches('/'), the "/" hygiene you didn't know you needed.
        let bulk_url = format!("{}/_bulk", endpoint.base.as_str().trim_end_matches('/'));

        // -- explicit username/password beat whatever the host entry carried.
        let basic_auth = match (&config.username, endpoint.username) {
            (Some(username), _) => Some((username.clone(), config.password.clone())),
            (None, Some(username)) => Some((username, endpoint.password)),
            (None, None) => None,
        };

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("💀 The HTTP client refused to be born. Probably TLS. It's always TLS.")?;

        debug!("🔧 Elasticsearch client ready, bulk endpoint: {}", bulk_url);
        Ok(Self {
            http,
            bulk_url,
            basic_auth,
            config,
        })
    }

    pub fn bulk_url(&self) -> &str {
        &self.bulk_url
    }

    pub fn config(&self) -> &ElasticsearchClientConfig {
        &self.config
    }

    fn gzip(ndjson: &str) -> Result<Vec<u8>, TransportError> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(ndjson.as_bytes())?;
        Ok(encoder.finish()?)
    }
}

#[async_trait]
impl DocumentStoreClient for ElasticsearchClient {
    /// 📡 POST the NDJSON to `/_bulk`. One shot. Whatever comes back, we report it.
    async fn bulk(&self, request: &BulkRequest) -> Result<BulkResponse, TransportError> {
        let ndjson = request.to_ndjson().map_err(TransportError::Encode)?;

        // ⚠️ application/x-ndjson, not application/json. The bulk API cares. Deeply.
        let mut builder = self
            .http
            .post(&self.bulk_url)
            .header(CONTENT_TYPE, "application/x-ndjson");

        let payload = if self.config.compression {
            builder = builder.header(CONTENT_ENCODING, "gzip");
            Self::gzip(&ndjson)?
        } else {
            ndjson.into_bytes()
        };

        // -- 🔒 api_key beats basic auth in this club.
        if let Some(ref api_key) = self.config.api_key {
            builder = builder.header(AUTHORIZATION, format!("ApiKey {api_key}"));
        } else if let Some((ref username, ref password)) = self.basic_auth {
            builder = builder.basic_auth(username, password.as_ref());
        }

        trace!(
            "📡 sending {} bytes ({} entries) to {}",
            payload.len(),
            request.len(),
            self.bulk_url
        );
        let response = builder.body(payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(TransportError::Decode)
    }
}
