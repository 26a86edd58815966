//! 📡 The Bulk Dispatcher: documents in, one verdict out 🚀
//!
//! 🎬 COLD OPEN. INT. ELASTICSEARCH CLUSTER. BULK ENDPOINT. HIGH NOON
//!
//! The bulk API has rules. Two lines per document: the action, then the body.
//! Positional. If line 7 is an action, line 8 is its body, and nobody asks line 8
//! how it feels about that.
//!
//! This module builds that sequence, hands it to a [`DocumentStoreClient`], and then
//! reads the response the way a parent reads a report card: skim until the first bad
//! grade, then stop reading and start the conversation.
//!
//! ```text
//!   Idle ─▶ Assembling ─▶ AwaitingResponse ─┬─▶ Success
//!                                           └─▶ ErrorExtraction ─▶ Failed
//! ```
//!
//! ## Knowledge Graph 🧠
//! - Input: `Vec<Document>`, already tagged with index/type by a formatter.
//! - One call, one round trip. No buffering across calls, no retries.
//! - First error wins. The rest of the errored items are not itemized.
//! - Every failure leaves here as a [`DispatchFailure`]. Whether anyone hears about it
//!   is the handler's business.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, trace};

use crate::backends::DocumentStoreClient;
use crate::common::Document;
use crate::errors::{BulkIndexFailure, DispatchFailure};

// ===== Request =====

/// 📦 The positional action/body sequence for one `_bulk` call.
///
/// `entries()[2k]` is the action descriptor of document `k`, `entries()[2k + 1]` its body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkRequest {
    entries: Vec<Value>,
}

impl BulkRequest {
    /// 🏗️ Assemble the sacred pairs, in input order.
    pub fn from_documents(documents: Vec<Document>) -> Self {
        let mut entries = Vec::with_capacity(documents.len() * 2);
        for document in documents {
            let (target_index, target_type, mut body) = document.into_parts();
            entries.push(json!({
                "index": {
                    "_index": target_index,
                    "_type": target_type,
                }
            }));
            // -- the action line already says where it goes. the body doesn't get a vote.
            body.remove("_index");
            body.remove("_type");
            entries.push(Value::Object(body));
        }
        Self { entries }
    }

    pub fn entries(&self) -> &[Value] {
        &self.entries
    }

    /// Positional entries, i.e. twice the document count.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn document_count(&self) -> usize {
        self.entries.len() / 2
    }

    /// 📜 NDJSON, one entry per line, trailing newline included. The bulk API counts it.
    pub fn to_ndjson(&self) -> Result<String, serde_json::Error> {
        let mut ndjson = String::new();
        for entry in &self.entries {
            ndjson.push_str(&serde_json::to_string(entry)?);
            ndjson.push('\n');
        }
        Ok(ndjson)
    }
}

// ===== Response =====

/// 📬 What the store says back.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BulkResponse {
    #[serde(rename = "errors", default)]
    pub has_errors: bool,
    #[serde(default)]
    pub items: Vec<BulkItem>,
    #[serde(default)]
    pub took: Option<u64>,
}

impl BulkResponse {
    /// ✅ A clean bill of health, for tests and for optimists.
    pub fn ok(items: Vec<BulkItem>) -> Self {
        Self {
            has_errors: false,
            items,
            took: None,
        }
    }

    /// 💥 A response that admits to errors.
    pub fn with_errors(items: Vec<BulkItem>) -> Self {
        Self {
            has_errors: true,
            items,
            took: None,
        }
    }

    /// 🔎 The first errored item, lifted into a failure. If nobody confesses, the generic one.
    pub fn first_failure(&self) -> BulkIndexFailure {
        self.items
            .iter()
            .find_map(BulkItem::error)
            .map(BulkIndexFailure::from_item_error)
            .unwrap_or_else(BulkIndexFailure::unknown)
    }
}

/// 📄 One per-document result, keyed by the action that produced it (`index`, usually).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct BulkItem {
    actions: BTreeMap<String, BulkItemResult>,
}

impl BulkItem {
    /// ✅ An `index` action that went fine.
    pub fn indexed(status: u16) -> Self {
        Self::index(BulkItemResult {
            status: Some(status),
            error: None,
        })
    }

    /// 💀 An `index` action that did not.
    pub fn failed(status: u16, error: ItemError) -> Self {
        Self::index(BulkItemResult {
            status: Some(status),
            error: Some(error),
        })
    }

    pub fn index(result: BulkItemResult) -> Self {
        let mut actions = BTreeMap::new();
        actions.insert("index".to_string(), result);
        Self { actions }
    }

    pub fn result(&self, action: &str) -> Option<&BulkItemResult> {
        self.actions.get(action)
    }

    /// The error descriptor, if this item has one.
    pub fn error(&self) -> Option<&ItemError> {
        self.actions.values().find_map(|result| result.error.as_ref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BulkItemResult {
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub error: Option<ItemError>,
}

/// 🧨 `{type, reason, caused_by?}`, turtles all the way down.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ItemError {
    #[serde(rename = "type")]
    pub error_type: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub caused_by: Option<Box<ItemError>>,
}

impl ItemError {
    pub fn new(error_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            reason: reason.into(),
            caused_by: None,
        }
    }

    pub fn caused_by(mut self, cause: ItemError) -> Self {
        self.caused_by = Some(Box::new(cause));
        self
    }
}

// ===== Dispatch =====

/// 🚀 Ship `documents` in one bulk call and reduce the outcome to `Ok` or one failure.
///
/// `Ok(())` for an empty slice without touching the network. The bulk API rejects
/// empty bodies and we'd rather not start that argument.
pub async fn dispatch(
    client: &dyn DocumentStoreClient,
    documents: Vec<Document>,
) -> Result<(), DispatchFailure> {
    if documents.is_empty() {
        trace!("📭 nothing to dispatch, staying idle");
        return Ok(());
    }

    let request = BulkRequest::from_documents(documents);
    debug!(
        "📦 assembled bulk request: {} documents, {} entries",
        request.document_count(),
        request.len()
    );

    let response = client
        .bulk(&request)
        .await
        .map_err(DispatchFailure::Transport)?;
    trace!(
        "📬 bulk response: errors={}, items={}",
        response.has_errors,
        response.items.len()
    );

    if response.has_errors {
        let failure = response.first_failure();
        debug!("💀 bulk response carried item errors, first one: {}", failure);
        return Err(DispatchFailure::Index(failure));
    }

    Ok(())
}

/// Handy when a test wants to build a body map inline.
#[cfg(test)]
pub(crate) fn body(
    fields: impl IntoIterator<Item = (&'static str, Value)>,
) -> serde_json::Map<String, Value> {
    fields
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::RecordingClient;
    use crate::common::DOCUMENT_TYPE;
    use crate::errors::TransportError;

    fn docs(index: &str, count: usize) -> Vec<Document> {
        (0..count)
            .map(|n| {
                Document::new(index, DOCUMENT_TYPE, body([("message", json!(format!("doc {n}")))]))
                    .expect("index is not blank")
            })
            .collect()
    }

    #[test]
    fn the_one_where_n_documents_become_two_n_lines_in_order() {
        let the_request = BulkRequest::from_documents(docs("app-logs", 3));

        assert_eq!(the_request.len(), 6);
        assert_eq!(the_request.document_count(), 3);
        for (n, pair) in the_request.entries().chunks(2).enumerate() {
            assert_eq!(
                pair[0],
                json!({ "index": { "_index": "app-logs", "_type": "_doc" } })
            );
            assert_eq!(pair[1], json!({ "message": format!("doc {n}") }));
        }
    }

    #[test]
    fn the_one_where_smuggled_metadata_is_stripped_from_the_body() {
        let the_sneaky_doc = Document::new(
            "real-index",
            DOCUMENT_TYPE,
            body([
                ("_index", json!("fake-index")),
                ("_type", json!("fake-type")),
                ("message", json!("hi")),
            ]),
        )
        .expect("index is not blank");

        let the_request = BulkRequest::from_documents(vec![the_sneaky_doc]);
        assert_eq!(the_request.entries()[0]["index"]["_index"], "real-index");
        assert_eq!(the_request.entries()[1], json!({ "message": "hi" }));
    }

    #[test]
    fn the_one_where_ndjson_ends_with_the_newline_that_matters() -> Result<(), serde_json::Error> {
        let the_ndjson = BulkRequest::from_documents(docs("app-logs", 2)).to_ndjson()?;
        let the_lines: Vec<&str> = the_ndjson.split_terminator('\n').collect();

        assert_eq!(the_lines.len(), 4);
        assert!(the_ndjson.ends_with('\n'));
        assert_eq!(
            the_lines[0],
            r#"{"index":{"_index":"app-logs","_type":"_doc"}}"#
        );
        assert_eq!(the_lines[1], r#"{"message":"doc 0"}"#);
        Ok(())
    }

    #[test]
    fn the_one_where_a_real_bulk_response_deserializes() -> Result<(), serde_json::Error> {
        let the_response: BulkResponse = serde_json::from_str(
            r#"{
                "took": 30,
                "errors": true,
                "items": [
                    { "index": { "_index": "app-logs", "_id": "1", "status": 201 } },
                    { "index": { "_index": "app-logs", "_id": "2", "status": 400,
                        "error": {
                            "type": "mapper_parsing_exception",
                            "reason": "failed to parse field [x]",
                            "caused_by": { "type": "illegal_argument_exception", "reason": "nope" }
                        } } }
                ]
            }"#,
        )?;

        assert!(the_response.has_errors);
        assert_eq!(the_response.took, Some(30));
        assert_eq!(the_response.items.len(), 2);
        assert!(the_response.items[0].error().is_none());
        assert_eq!(
            the_response.items[1].result("index").and_then(|r| r.status),
            Some(400)
        );
        let the_error = the_response.items[1].error().expect("second item errored");
        assert_eq!(the_error.error_type, "mapper_parsing_exception");
        assert_eq!(
            the_error.caused_by.as_deref().map(|c| c.reason.as_str()),
            Some("nope")
        );
        Ok(())
    }

    #[test]
    fn the_one_where_first_error_wins_and_second_gets_no_trophy() {
        let the_response = BulkResponse::with_errors(vec![
            BulkItem::indexed(201),
            BulkItem::failed(400, ItemError::new("first_exception", "E1")),
            BulkItem::failed(400, ItemError::new("second_exception", "E2")),
        ]);

        let the_failure = the_response.first_failure();
        assert_eq!(the_failure.message(), "first_exception: E1");
        assert_eq!(the_failure.chain().count(), 1);
    }

    #[tokio::test]
    async fn the_one_where_three_records_make_one_call_and_six_lines() {
        let the_client = RecordingClient::responding(BulkResponse::ok(vec![
            BulkItem::indexed(201),
            BulkItem::indexed(201),
            BulkItem::indexed(201),
        ]));

        let the_outcome = dispatch(&the_client, docs("app-logs", 3)).await;

        assert!(the_outcome.is_ok());
        let the_requests = the_client.requests().await;
        assert_eq!(the_requests.len(), 1);
        assert_eq!(the_requests[0].len(), 6);
    }

    #[tokio::test]
    async fn the_one_where_errors_false_means_nobody_reads_the_items() {
        let the_client = RecordingClient::responding(BulkResponse::ok(vec![BulkItem::failed(
            400,
            ItemError::new("ignored_exception", "the flag said it was fine"),
        )]));

        assert!(dispatch(&the_client, docs("app-logs", 1)).await.is_ok());
    }

    #[tokio::test]
    async fn the_one_where_the_mapper_has_opinions() {
        let the_client = RecordingClient::responding(BulkResponse::with_errors(vec![
            BulkItem::failed(
                400,
                ItemError::new("mapper_parsing_exception", "failed to parse field [x]"),
            ),
        ]));

        let the_failure = dispatch(&the_client, docs("app-logs", 1))
            .await
            .expect_err("the mapper objected");
        let the_index_failure = the_failure.index_failure().expect("an indexing failure");
        assert_eq!(
            the_index_failure.to_string(),
            "mapper_parsing_exception: failed to parse field [x]"
        );
    }

    #[tokio::test]
    async fn the_one_where_errors_true_but_everyone_pleads_innocent() {
        let the_client =
            RecordingClient::responding(BulkResponse::with_errors(vec![BulkItem::indexed(201)]));

        let the_failure = dispatch(&the_client, docs("app-logs", 1))
            .await
            .expect_err("errors flag was set");
        assert_eq!(
            the_failure.index_failure().map(BulkIndexFailure::message),
            Some(crate::errors::UNKNOWN_INDEX_FAILURE)
        );
    }

    #[tokio::test]
    async fn the_one_where_the_network_ghosts_us() {
        let the_client = RecordingClient::failing("connection refused");

        let the_failure = dispatch(&the_client, docs("app-logs", 2))
            .await
            .expect_err("transport failed");
        assert!(matches!(
            the_failure.transport_error(),
            Some(TransportError::Unavailable(_))
        ));
        assert_eq!(the_client.requests().await.len(), 1);
    }

    #[tokio::test]
    async fn the_one_where_an_empty_batch_stays_home() {
        let the_client = RecordingClient::responding(BulkResponse::default());

        assert!(dispatch(&the_client, Vec::new()).await.is_ok());
        assert!(the_client.requests().await.is_empty());
    }
}
