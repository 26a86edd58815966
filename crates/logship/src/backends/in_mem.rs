//! # Previously, on logship...
//!
//! 🎬 The cluster was down. Or far away. Or it was a unit test and nobody wanted to
//! spin up a JVM just to check that six lines come out in the right order.
//!
//! [`RecordingClient`] is the stunt double. It writes down every bulk request it
//! receives, then answers with whatever the script says: a canned response, or a
//! canned "connection refused".
//!
//! ⚠️ This is NOT for production. This is for tests and local poking.
//! If you're deploying this to prod, please also deploy a therapist.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::trace;

use super::DocumentStoreClient;
use crate::bulk::{BulkRequest, BulkResponse};
use crate::errors::TransportError;

/// 📜 What the stunt double says when asked.
#[derive(Debug, Clone)]
enum Script {
    Respond(BulkResponse),
    Fail(String),
}

/// 📦 A client that never forgets and never leaves the building.
///
/// Clone-able because tests need to peek inside after handing one copy to the handler.
/// The `Arc` means every clone shares the same notebook.
#[derive(Debug, Clone)]
pub struct RecordingClient {
    script: Script,
    received: Arc<Mutex<Vec<BulkRequest>>>,
}

impl RecordingClient {
    /// ✅ Answers every call with `response`.
    pub fn responding(response: BulkResponse) -> Self {
        Self {
            script: Script::Respond(response),
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// 💀 Fails every call at the transport level with `reason`.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            script: Script::Fail(reason.into()),
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// 🔎 Everything received so far, oldest first.
    pub async fn requests(&self) -> Vec<BulkRequest> {
        self.received.lock().await.clone()
    }
}

#[async_trait]
impl DocumentStoreClient for RecordingClient {
    async fn bulk(&self, request: &BulkRequest) -> Result<BulkResponse, TransportError> {
        self.received.lock().await.push(request.clone());
        trace!("📝 recorded bulk request with {} entries", request.len());
        match &self.script {
            Script::Respond(response) => Ok(response.clone()),
            Script::Fail(reason) => Err(TransportError::Unavailable(reason.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bulk::BulkItem;

    #[tokio::test]
    async fn the_one_where_clones_share_the_same_notebook() {
        let the_original = RecordingClient::responding(BulkResponse::ok(vec![BulkItem::indexed(201)]));
        let the_clone = the_original.clone();

        let the_response = the_clone
            .bulk(&BulkRequest::default())
            .await
            .expect("scripted to succeed");

        assert!(!the_response.has_errors);
        assert_eq!(the_original.requests().await.len(), 1);
    }

    #[tokio::test]
    async fn the_one_where_the_script_says_fail() {
        let the_grump = RecordingClient::failing("no route to host");
        let the_error = the_grump
            .bulk(&BulkRequest::default())
            .await
            .expect_err("scripted to fail");

        assert_eq!(
            the_error.to_string(),
            "document store unavailable: no route to host"
        );
    }
}
