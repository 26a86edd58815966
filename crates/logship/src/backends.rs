//! 🔌 Backends, where the real I/O happens.
//!
//! 🎭 This module is the casting agency for document store clients. Need to talk to a
//! real cluster over HTTP? We've got one. Need a stunt double that writes down every
//! line it's given and answers with whatever the script says? Got that too.
//!
//! ⚠️ The dispatcher only ever sees `&dyn DocumentStoreClient`. It does not know, or care,
//! whether the bytes go to a cluster or into a `Vec`. Ignorance is a feature. It's called
//! "abstraction."
//!
//! 🦆

use async_trait::async_trait;

use crate::bulk::{BulkRequest, BulkResponse};
use crate::errors::TransportError;

pub(crate) mod elasticsearch;
pub(crate) mod in_mem;

pub use elasticsearch::{DEFAULT_PORT, ElasticsearchClient, ElasticsearchClientConfig, HostEntry};
pub use in_mem::RecordingClient;

/// 📡 Executes one bulk call against a document store.
///
/// # Contract 📜
/// - `bulk` performs exactly one round trip for the whole request.
/// - A structured response (even one full of item errors) is `Ok`.
/// - `Err` is reserved for "the call itself could not complete".
/// - No retries. Retries are the caller's problem. The caller has decided not to have that problem.
#[async_trait]
pub trait DocumentStoreClient: std::fmt::Debug + Send + Sync {
    async fn bulk(&self, request: &BulkRequest) -> Result<BulkResponse, TransportError>;
}
