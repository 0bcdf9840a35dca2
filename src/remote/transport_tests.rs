use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::transport::decode_envelope;
use super::{HttpTransport, Site, Transport};
use crate::error::TransportError;

fn transport() -> HttpTransport {
  HttpTransport::new(Duration::from_secs(5)).unwrap()
}

#[test]
fn envelope_success_yields_data() {
  let data = decode_envelope(br#"{"success": true, "data": {"id": 3}}"#).unwrap();
  assert_eq!(data, json!({"id": 3}));

  let empty = decode_envelope(br#"{"success": true}"#).unwrap();
  assert_eq!(empty, serde_json::Value::Null);
}

#[test]
fn envelope_failure_yields_server_error() {
  let err = decode_envelope(
    br#"{"success": false, "error": {"code": 42, "message": "invalid token"}}"#,
  )
  .unwrap_err();

  assert_eq!(
    err,
    TransportError::Server {
      code: "42".to_string(),
      message: "invalid token".to_string(),
    }
  );
  assert!(!err.is_transient());
}

#[test]
fn envelope_garbage_is_malformed() {
  assert!(matches!(
    decode_envelope(b"<html>oops</html>"),
    Err(TransportError::Malformed(_))
  ));
  assert!(matches!(
    decode_envelope(br#"{"success": false}"#),
    Err(TransportError::Malformed(_))
  ));
}

#[tokio::test]
async fn posts_method_params_and_token() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .and(body_json(json!({
      "method": "get_courses",
      "params": {"userid": 5},
      "token": "secret",
    })))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({
      "success": true,
      "data": [{"id": 1}],
    })))
    .expect(1)
    .mount(&server)
    .await;

  let site = Site::new("site1", server.uri(), "secret");
  let data = transport()
    .send(&site, "get_courses", &json!({"userid": 5}))
    .await
    .unwrap();

  assert_eq!(data, json!([{"id": 1}]));
}

#[tokio::test]
async fn http_error_status_is_server_error() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .respond_with(ResponseTemplate::new(503))
    .mount(&server)
    .await;

  let site = Site::new("site1", server.uri(), "secret");
  let err = transport()
    .send(&site, "get_courses", &json!({}))
    .await
    .unwrap_err();

  assert!(matches!(err, TransportError::Server { ref code, .. } if code == "http-503"));
}

#[tokio::test]
async fn slow_server_times_out() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .respond_with(
      ResponseTemplate::new(200)
        .set_body_json(json!({"success": true}))
        .set_delay(Duration::from_millis(500)),
    )
    .mount(&server)
    .await;

  let site = Site::new("site1", server.uri(), "secret");
  let err = HttpTransport::new(Duration::from_millis(50))
    .unwrap()
    .send(&site, "get_courses", &json!({}))
    .await
    .unwrap_err();

  assert_eq!(err, TransportError::Timeout);
  assert!(err.is_transient());
}

#[tokio::test]
async fn refused_connection_is_transient() {
  let site = Site::new("site1", "http://127.0.0.1:1", "secret");
  let err = transport()
    .send(&site, "get_courses", &json!({}))
    .await
    .unwrap_err();

  assert!(err.is_transient(), "unexpected error: {:?}", err);
}
