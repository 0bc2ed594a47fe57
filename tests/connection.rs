//! HTTP behavior of `Connection` against a mock iTop endpoint.
//!
//! The connection is blocking, so every call runs on tokio's blocking pool
//! while the mock server keeps serving on the runtime.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use itop_client::config::{AuthMode, Config};
use itop_client::connection::{Connection, GetParams};
use itop_client::error::ItopError;
use itop_client::models::{Response, StatusCode};
use itop_client::query::{Filter, OqlBuilder};

const ENDPOINT: &str = "/webservices/rest.php";

async fn blocking<T, F>(f: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .expect("blocking task panicked")
}

fn config(server: &MockServer) -> Config {
    Config::new(server.uri(), "admin", "secret")
}

async fn mount_json(server: &MockServer, body: Value) {
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Decodes the form body of the single request the server received.
async fn received_form(server: &MockServer) -> HashMap<String, String> {
    let requests = server.received_requests().await.expect("recording enabled");
    assert_eq!(requests.len(), 1);
    url::form_urlencoded::parse(&requests[0].body)
        .into_owned()
        .collect()
}

fn operations_body() -> Value {
    json!({
        "code": 0,
        "message": "Operations: 2",
        "version": "1.3",
        "operations": [
            {"verb": "core/get", "description": "Search for objects", "extension": "CoreServices"},
            {"verb": "list_operations", "description": "List the operations"}
        ]
    })
}

fn servers_body() -> Value {
    json!({
        "code": 0,
        "message": "Found: 2",
        "objects": {
            "Server::42": {"code": 0, "message": "", "class": "Server", "key": "42",
                "fields": {"name": "srv1", "status": "production"}},
            "Server::43": {"code": 0, "message": "", "class": "Server", "key": 43,
                "fields": {"name": "srv2", "status": "stock"}}
        }
    })
}

#[tokio::test(flavor = "multi_thread")]
async fn test_list_operations_with_form_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(query_param("version", "1.3"))
        .and(body_string_contains("auth_user=admin"))
        .and(body_string_contains("auth_pwd=secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(operations_body()))
        .expect(1)
        .mount(&server)
        .await;

    let config = config(&server);
    let operations = blocking(move || Connection::new(&config)?.list_operations())
        .await
        .unwrap();

    assert_eq!(operations.len(), 2);
    assert_eq!(operations[0].verb, "core/get");
    assert_eq!(operations[0].extension.as_deref(), Some("CoreServices"));
    assert!(operations[1].extension.is_none());

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());

    let form = received_form(&server).await;
    let payload: Value = serde_json::from_str(&form["json_data"]).unwrap();
    assert_eq!(payload, json!({"operation": "list_operations"}));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_basic_auth_uses_header_only() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(header("Authorization", "Basic YWRtaW46c2VjcmV0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(operations_body()))
        .expect(1)
        .mount(&server)
        .await;

    let config = config(&server).with_auth(AuthMode::Basic);
    let operations = blocking(move || Connection::new(&config)?.list_operations())
        .await
        .unwrap();
    assert_eq!(operations.len(), 2);

    let form = received_form(&server).await;
    assert!(!form.contains_key("auth_user"));
    assert!(!form.contains_key("auth_pwd"));
    assert!(form.contains_key("json_data"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_get_materializes_records() {
    let server = MockServer::start().await;
    mount_json(&server, servers_body()).await;

    let config = config(&server);
    let response = blocking(move || {
        let params = GetParams::new()
            .with_filter(Filter::fields([("status", "production")]))
            .with_fields(["name", "status"])
            .with_limit(5)
            .with_page(1);
        Connection::new(&config)?.get("Server", params)
    })
    .await
    .unwrap();

    let mut response = match response {
        Response::Successful(r) => r,
        other => panic!("expected successful response, got {:?}", other),
    };
    assert_eq!(response.num_results, 2);
    assert_eq!(response.message, "Found: 2");

    let first = response.get_one().unwrap();
    assert_eq!(first.class_name(), "Server");
    assert_eq!(first.id(), "42");
    assert_eq!(first.get_str("name"), Some("srv1"));

    let second = response.get_one().unwrap();
    assert_eq!(second.id(), "43");
    assert!(response.get_one().is_none());
    assert_eq!(response.get_all().len(), 2);

    let form = received_form(&server).await;
    let payload: Value = serde_json::from_str(&form["json_data"]).unwrap();
    assert_eq!(
        payload,
        json!({
            "operation": "core/get",
            "class": "Server",
            "output_fields": "name, status",
            "key": "SELECT Server WHERE status = 'production'",
            "limit": 5,
            "page": 1
        })
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_get_with_builder_sends_rendered_oql() {
    let server = MockServer::start().await;
    mount_json(&server, json!({"code": 0, "message": "Found: 0", "objects": null})).await;

    let config = config(&server);
    let response = blocking(move || {
        let mut builder = OqlBuilder::new("Person");
        builder
            .add_condition("org_id", 3, "=")
            .add_condition("name", "Smith", "LIKE");
        Connection::new(&config)?.get("Person", GetParams::new().with_filter(builder))
    })
    .await
    .unwrap();

    assert!(matches!(response, Response::Empty(_)));
    assert_eq!(response.message(), "Found: 0");

    let form = received_form(&server).await;
    let payload: Value = serde_json::from_str(&form["json_data"]).unwrap();
    assert_eq!(payload["key"], "SELECT Person org_id = 3 AND name LIKE 'Smith'");
    assert_eq!(payload["output_fields"], "*");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_shapes_reused_across_responses() {
    let server = MockServer::start().await;
    mount_json(&server, servers_body()).await;

    let config = config(&server);
    let (cached, first, second) = blocking(move || {
        let connection = Connection::new(&config)?;
        let first = connection.get("Server", GetParams::new())?;
        let second = connection.get("Server", GetParams::new())?;
        Ok::<_, ItopError>((connection.shapes().len(), first, second))
    })
    .await
    .unwrap();

    assert_eq!(cached, 1);
    assert!(Arc::ptr_eq(
        first.records()[0].shape(),
        second.records()[1].shape()
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_narrower_get_keeps_only_its_own_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(servers_body()))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_json(
        &server,
        json!({
            "code": 0,
            "message": "Found: 1",
            "objects": {
                "Server::42": {"class": "Server", "key": "42", "fields": {"name": "srv1"}}
            }
        }),
    )
    .await;

    let config = config(&server);
    let narrow = blocking(move || {
        let connection = Connection::new(&config)?;
        connection.get("Server", GetParams::new().with_fields(["name", "status"]))?;
        connection.get("Server", GetParams::new().with_fields(["name"]))
    })
    .await
    .unwrap();

    let record = &narrow.records()[0];
    assert_eq!(
        Value::Object(record.fields().clone()),
        json!({"name": "srv1", "id": "42"})
    );
    assert!(!record.has_field("status"));
    assert!(!record.shape().contains("status"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_non_200_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(500).set_body_string("Fatal error"))
        .mount(&server)
        .await;

    let config = config(&server);
    let err = blocking(move || Connection::new(&config)?.list_operations())
        .await
        .unwrap_err();

    assert!(err.is_transport());
    match err {
        ItopError::HttpStatus { status, body } => {
            assert_eq!(status.as_u16(), 500);
            assert_eq!(body, "Fatal error");
        }
        other => panic!("expected HttpStatus, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_error_body_is_sanitized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(403).set_body_string("bad password: secret"))
        .mount(&server)
        .await;

    let config = config(&server);
    let err = blocking(move || Connection::new(&config)?.list_operations())
        .await
        .unwrap_err();

    let msg = err.to_string();
    assert!(msg.contains("403"));
    assert!(!msg.contains("secret"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_error_body_is_kept_whole() {
    let server = MockServer::start().await;
    let body = format!("{} secret {}", "x".repeat(1000), "y".repeat(1000));
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(502).set_body_string(body))
        .mount(&server)
        .await;

    let config = config(&server);
    let err = blocking(move || Connection::new(&config)?.list_operations())
        .await
        .unwrap_err();

    match err {
        ItopError::HttpStatus { body, .. } => {
            assert_eq!(
                body,
                format!("{} [REDACTED] {}", "x".repeat(1000), "y".repeat(1000))
            );
        }
        other => panic!("expected HttpStatus, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_nonzero_code_is_api_error() {
    let server = MockServer::start().await;
    mount_json(&server, json!({"code": 1, "message": "Error: Invalid login"})).await;

    let config = config(&server);
    let err = blocking(move || Connection::new(&config)?.get("Server", GetParams::new()))
        .await
        .unwrap_err();

    assert_eq!(err.api_status(), Some(StatusCode::Unauthorized));
    match err {
        ItopError::Api { message, .. } => assert_eq!(message, "Error: Invalid login"),
        other => panic!("expected Api, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_undocumented_code_is_unknown_status() {
    let server = MockServer::start().await;
    mount_json(&server, json!({"code": 7, "message": "?"})).await;

    let config = config(&server);
    let err = blocking(move || Connection::new(&config)?.list_operations())
        .await
        .unwrap_err();

    assert!(matches!(err, ItopError::UnknownStatusCode(7)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_missing_code_is_invalid_response() {
    let server = MockServer::start().await;
    mount_json(&server, json!({"message": "no code here"})).await;

    let config = config(&server);
    let err = blocking(move || Connection::new(&config)?.request(r#"{"operation":"list_operations"}"#))
        .await
        .unwrap_err();

    assert!(matches!(err, ItopError::InvalidResponse(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_request_returns_body_unmodified() {
    let server = MockServer::start().await;
    let body = json!({"code": 0, "message": "", "version": "1.3", "extra": [1, 2]});
    mount_json(&server, body.clone()).await;

    let config = config(&server);
    let value = blocking(move || Connection::new(&config)?.request(r#"{"operation":"list_operations"}"#))
        .await
        .unwrap();

    assert_eq!(value, body);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_timeout_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(operations_body())
                .set_delay(Duration::from_millis(1500)),
        )
        .mount(&server)
        .await;

    let config = config(&server).with_timeout(Duration::from_millis(200));
    let err = blocking(move || Connection::new(&config)?.list_operations())
        .await
        .unwrap_err();

    assert!(err.is_transport());
    assert!(matches!(
        err,
        ItopError::Timeout { duration } if duration == Duration::from_millis(200)
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_connection_test_success() {
    let server = MockServer::start().await;
    mount_json(&server, operations_body()).await;

    let config = config(&server);
    let result = blocking(move || Connection::new(&config)?.test_connection()).await;
    assert!(result.is_ok());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_connection_test_reports_bad_credentials() {
    let server = MockServer::start().await;
    mount_json(&server, json!({"code": 1, "message": "Error: Invalid login"})).await;

    let config = config(&server);
    let err = blocking(move || Connection::new(&config)?.test_connection())
        .await
        .unwrap_err();

    let msg = err.to_string();
    assert!(msg.contains("connection test failed"));
    assert!(msg.contains("UNAUTHORIZED"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_connection_test_requires_operations() {
    let server = MockServer::start().await;
    mount_json(&server, json!({"code": 0, "message": "", "operations": []})).await;

    let config = config(&server);
    let err = blocking(move || Connection::new(&config)?.test_connection())
        .await
        .unwrap_err();

    assert!(matches!(err, ItopError::ConnectionTest { .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_full_endpoint_url_used_as_is() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(query_param("version", "1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(operations_body()))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}{}?version=1.0", server.uri(), ENDPOINT);
    let config = Config::new(url, "admin", "secret").with_version("1.3");
    let operations = blocking(move || Connection::new(&config)?.list_operations())
        .await
        .unwrap();
    assert_eq!(operations.len(), 2);
}
