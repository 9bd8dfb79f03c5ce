//! SnowflakeClient against a local mock of the REST endpoints.

use common::config::{Credentials, Warehouse as WarehouseSettings};
use common::error::{DashboardError, ExecutionError};
use common::warehouse::{SnowflakeClient, Warehouse};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN_HEADER: &str = "Snowflake Token=\"session-token\"";

async fn setup_mock_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/session/v1/login-request"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"token": "session-token"}
        })))
        .mount(&server)
        .await;
    server
}

fn client(server: &MockServer, timeout_secs: u64) -> SnowflakeClient {
    let settings = WarehouseSettings {
        base_url: Some(server.uri()),
        account: "acme".to_string(),
        database: "AXELAR".to_string(),
        schema: "AXELSCAN".to_string(),
        compute: "COMPUTE_WH".to_string(),
        role: None,
        timeout_secs,
        secrets_path: "config/secrets.toml".to_string(),
    };
    let credentials = Credentials {
        user: "reader".to_string(),
        password: "hunter2".to_string(),
        account: None,
    };
    SnowflakeClient::new(&settings, credentials).unwrap()
}

fn still_running() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "code": "333334",
        "message": "Asynchronous execution in progress.",
        "data": {"queryId": "01ab", "getResultUrl": "/queries/01ab/result"}
    }))
}

#[tokio::test]
async fn test_running_statement_is_polled_until_ready() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .and(path("/queries/v1/query-request"))
        .respond_with(still_running())
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/queries/01ab/result"))
        .and(header("Authorization", TOKEN_HEADER))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "rowtype": [{"name": "Number of Transfers", "type": "fixed"}],
                "rowset": [["2500000"]]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let table = client(&server, 30).execute("SELECT 1").await.unwrap();
    assert_eq!(
        table.numbers("Number of Transfers").unwrap(),
        vec![Some(2_500_000.0)]
    );
}

#[tokio::test]
async fn test_statement_running_past_timeout_is_a_timeout() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .and(path("/queries/v1/query-request"))
        .respond_with(still_running())
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/queries/01ab/result"))
        .respond_with(still_running())
        .mount(&server)
        .await;

    let err = client(&server, 1).execute("SELECT 1").await.unwrap_err();
    assert_eq!(err, ExecutionError::Timeout(1));
    // Surfaces as a warning on the page, never as an empty result.
    assert!(!DashboardError::from(err).is_no_data());
}

#[tokio::test]
async fn test_chunked_result_is_assembled_in_order() {
    let server = setup_mock_server().await;
    let uri = server.uri();
    Mock::given(method("POST"))
        .and(path("/queries/v1/query-request"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "rowtype": [
                    {"name": "Chain", "type": "text"},
                    {"name": "Bridges", "type": "fixed"}
                ],
                "rowset": [["ethereum", "1"]],
                "chunkHeaders": {"x-amz-server-side-encryption-customer-key": "a2V5"},
                "chunks": [
                    {"url": format!("{uri}/chunks/0"), "rowCount": 2},
                    {"url": format!("{uri}/chunks/1"), "rowCount": 1}
                ]
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/chunks/0"))
        .and(header("x-amz-server-side-encryption-customer-key", "a2V5"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "[\"arbitrum\", \"2\"],\n[\"base\", \"3\"]",
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/chunks/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[\"osmosis\", null]"))
        .mount(&server)
        .await;

    let table = client(&server, 30).execute("SELECT 1").await.unwrap();
    assert_eq!(
        table.texts("Chain").unwrap(),
        vec!["ethereum", "arbitrum", "base", "osmosis"]
    );
    assert_eq!(
        table.numbers("Bridges").unwrap(),
        vec![Some(1.0), Some(2.0), Some(3.0), None]
    );
}

#[tokio::test]
async fn test_short_chunk_is_a_decode_error() {
    let server = setup_mock_server().await;
    let uri = server.uri();
    Mock::given(method("POST"))
        .and(path("/queries/v1/query-request"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "rowtype": [{"name": "Bridges", "type": "fixed"}],
                "rowset": [],
                "qrmk": "a2V5",
                "chunks": [{"url": format!("{uri}/chunks/0"), "rowCount": 3}]
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/chunks/0"))
        .and(header("x-amz-server-side-encryption-customer-algorithm", "AES256"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[\"1\"]"))
        .mount(&server)
        .await;

    let err = client(&server, 30).execute("SELECT 1").await.unwrap_err();
    assert!(matches!(err, ExecutionError::Decode(_)));
}

#[tokio::test]
async fn test_expired_session_is_an_authentication_error_and_logs_in_again() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/session/v1/login-request"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"token": "session-token"}
        })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/queries/v1/query-request"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "code": "390112",
            "message": "Your session has expired. Please login again.",
            "data": null
        })))
        .mount(&server)
        .await;

    let client = client(&server, 30);
    for _ in 0..2 {
        let err = client.execute("SELECT 1").await.unwrap_err();
        assert!(matches!(err, ExecutionError::Authentication(_)));
    }
}
