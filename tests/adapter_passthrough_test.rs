//! Adapters over the real clients, talking to a mock server.

use cloud_iface::transport::HttpTransport;
use cloud_iface::{bigquery, datastore, pubsub, runtimeconfig, Error};
use httpmock::prelude::*;
use serde_json::json;

fn transport(server: &MockServer, base: &str) -> HttpTransport {
    HttpTransport::new(&server.url(base)).unwrap()
}

#[tokio::test]
async fn test_pubsub_publish_through_adapters() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/projects/proj/topics/greetings:publish")
            .body_contains("aGVsbG8="); // "hello"
        then.status(200).json_body(json!({"messageIds": ["42"]}));
    });

    let client = pubsub::iface::adapt_client(pubsub::Client::new("proj", transport(&server, "/v1/")));
    let topic = client.topic("greetings");
    assert_eq!(topic.name(), "projects/proj/topics/greetings");

    let msg = pubsub::iface::adapt_message(pubsub::Message::new(b"hello".to_vec()));
    let mut result = topic.publish(msg.as_ref()).unwrap();
    assert_eq!(result.get().await.unwrap(), "42");
    mock.assert();
}

#[tokio::test]
async fn test_datastore_get_returns_the_same_entity_as_the_client() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/v1/projects/proj:lookup");
        then.status(200).json_body(json!({"found": [{"entity": {
            "key": {"partitionId": {"projectId": "proj"}, "path": [{"kind": "Task", "name": "a"}]},
            "properties": {"done": {"booleanValue": true}}
        }}]}));
    });

    let key = datastore::Key::with_name("Task", "a", None);
    let concrete = datastore::Client::new("proj", transport(&server, "/v1/"));
    let direct = concrete.get(&key).await.unwrap();

    let adapted = datastore::iface::adapt_client(concrete);
    let through = adapted.get(&key).await.unwrap();
    assert_eq!(through, direct);
    assert_eq!(through.get("done"), Some(&datastore::Value::Boolean(true)));
}

#[tokio::test]
async fn test_runtimeconfig_errors_are_not_rewritten() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v1beta1/projects/p/configs/missing/variables");
        then.status(404).json_body(json!({
            "error": {"code": 404, "message": "Config not found", "status": "NOT_FOUND"}
        }));
    });

    let service = runtimeconfig::iface::adapt_service(runtimeconfig::Service::new(transport(
        &server, "/v1beta1/",
    )));
    let err = service
        .projects()
        .configs()
        .variables()
        .list("projects/p/configs/missing")
        .doit(&[])
        .await
        .unwrap_err();
    match err {
        Error::Api { status, code, message } => {
            assert_eq!(status, 404);
            assert_eq!(code, "NOT_FOUND");
            assert_eq!(message, "Config not found");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_bigquery_table_metadata_through_adapters() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/bigquery/v2/projects/proj/datasets/d/tables/t");
        then.status(200).json_body(json!({
            "tableReference": {"projectId": "proj", "datasetId": "d", "tableId": "t"},
            "schema": {"fields": [{"name": "n", "type": "INTEGER", "mode": "REQUIRED"}]},
            "numRows": "3",
            "etag": "abc"
        }));
    });

    let client = bigquery::iface::adapt_client(bigquery::Client::new(
        "proj",
        transport(&server, "/bigquery/v2/"),
    ));
    let table = client.dataset("d").table("t");
    assert_eq!(table.fully_qualified_name(), "proj:d.t");
    assert!(table.as_adapted().is_some());

    let md = table.metadata().await.unwrap();
    assert_eq!(md.num_rows, 3);
    assert_eq!(md.etag, "abc");
    assert_eq!(md.schema[0].field_type, bigquery::FieldType::Integer);
    assert!(md.schema[0].required);
}
