//! 🧪 End to end: config blob ─▶ handler ─▶ real HTTP ─▶ a cluster that is secretly wiremock.

use logship::{
    ElasticsearchHandler, HandlerError, Level, LogRecord, TransportError,
};
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider_for(server: &MockServer, ignore_error: bool) -> Value {
    json!({
        "elasticsearch_logger": {
            "index": "app-logs",
            "ignore_error": ignore_error,
            "config": { "hosts": [server.uri()] },
        }
    })
}

fn records(count: usize) -> Vec<LogRecord> {
    (1..=count)
        .map(|n| LogRecord::new(Level::Error, "checkout", format!("order {n} failed")))
        .collect()
}

#[tokio::test]
async fn the_one_where_three_records_make_one_trip_to_the_cluster() {
    let the_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/_bulk"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "took": 5,
            "errors": false,
            "items": [
                { "index": { "status": 201 } },
                { "index": { "status": 201 } },
                { "index": { "status": 201 } },
            ]
        })))
        .expect(1)
        .mount(&the_server)
        .await;

    let the_handler = ElasticsearchHandler::from_provider(&provider_for(&the_server, false));
    assert!(the_handler.is_active());

    the_handler
        .submit_batch(records(3))
        .await
        .expect("errors=false means success");

    let the_received = the_server.received_requests().await.expect("recording is on");
    assert_eq!(the_received.len(), 1);
    let the_body = String::from_utf8(the_received[0].body.clone()).expect("utf-8 body");
    let the_lines: Vec<Value> = the_body
        .lines()
        .map(|line| serde_json::from_str(line).expect("every line is JSON"))
        .collect();

    assert_eq!(the_lines.len(), 6);
    assert_eq!(
        the_lines[0],
        json!({ "index": { "_index": "app-logs", "_type": "_doc" } })
    );
    assert_eq!(the_lines[1]["message"], "order 1 failed");
    assert_eq!(the_lines[1]["level_name"], "ERROR");
    assert_eq!(the_lines[5]["message"], "order 3 failed");
}

#[tokio::test]
async fn the_one_where_the_mapper_objects_in_writing() {
    let the_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/_bulk"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": true,
            "items": [
                { "index": { "status": 400, "error": {
                    "type": "mapper_parsing_exception",
                    "reason": "failed to parse field [x]",
                } } }
            ]
        })))
        .mount(&the_server)
        .await;

    let the_handler = ElasticsearchHandler::from_provider(&provider_for(&the_server, false));
    let the_error = the_handler
        .submit_one(records(1).remove(0))
        .await
        .expect_err("item error must surface");

    let HandlerError::Dispatch(the_failure) = the_error else {
        panic!("💀 expected a dispatch failure");
    };
    assert_eq!(
        the_failure
            .index_failure()
            .map(|failure| failure.message().to_string()),
        Some("mapper_parsing_exception: failed to parse field [x]".to_string())
    );
}

#[tokio::test]
async fn the_one_where_the_cluster_is_on_fire_and_we_were_told_to_not_care() {
    let the_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/_bulk"))
        .respond_with(ResponseTemplate::new(503).set_body_string("cluster_block_exception"))
        .expect(2)
        .mount(&the_server)
        .await;

    let the_chill_handler = ElasticsearchHandler::from_provider(&provider_for(&the_server, true));
    assert!(the_chill_handler.submit_batch(records(2)).await.is_ok());

    let the_strict_handler = ElasticsearchHandler::from_provider(&provider_for(&the_server, false));
    let the_error = the_strict_handler
        .submit_batch(records(2))
        .await
        .expect_err("503 must surface without ignore_error");
    let HandlerError::Dispatch(the_failure) = the_error else {
        panic!("💀 expected a dispatch failure");
    };
    assert!(matches!(
        the_failure.transport_error(),
        Some(TransportError::Status { status: 503, .. })
    ));
}

#[test]
fn the_one_where_configs_written_for_the_old_client_still_wake_the_handler() {
    for the_hosts in [
        json!(["localhost:9200"]),
        json!(["127.0.0.1:9200"]),
        json!(["es.internal"]),
        json!([{ "host": "localhost", "port": 9200, "scheme": "http" }]),
    ] {
        let the_handler = ElasticsearchHandler::from_provider(&json!({
            "elasticsearch_logger": { "config": { "hosts": the_hosts.clone() } }
        }));
        assert!(
            the_handler.is_active(),
            "hosts {the_hosts} left the handler inactive: {:?}",
            the_handler.inactive_reason()
        );
    }
}
