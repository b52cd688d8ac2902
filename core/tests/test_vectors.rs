//! Verify request signing against JSON vectors stored in `test-vectors/`.
//!
//! Each case gives a method, path and payload, and the exact URL, body and
//! signature the builder must produce at the fixture server timestamp. The
//! same cases are then replayed through a `Client` with a pinned clock to
//! check that time correction lands on the same timestamp.

use std::sync::{Arc, Mutex};

use ovh_core::{
    AuthenticatedRequestBuilder, Client, Credentials, FixedTimeSource, HttpMethod, HttpRequest, HttpResponse,
    Payload, ServerTimeSync, Transport, TransportError, SIGNATURE_HEADER, TIMESTAMP_HEADER,
};
use serde_json::Value;

fn vectors() -> Value {
    let raw = include_str!("../../test-vectors/signatures.json");
    serde_json::from_str(raw).unwrap()
}

fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        "PUT" => HttpMethod::Put,
        "DELETE" => HttpMethod::Delete,
        other => panic!("unknown method: {other}"),
    }
}

fn parse_payload(payload: &Value) -> Payload {
    match payload["kind"].as_str().unwrap() {
        "absent" => Payload::Absent,
        "raw" => Payload::raw(payload["value"].as_str().unwrap()),
        "json" => Payload::json(&payload["value"]).unwrap(),
        other => panic!("unknown payload kind: {other}"),
    }
}

fn credentials(v: &Value) -> Credentials {
    Credentials::new(
        v["application_key"].as_str().unwrap(),
        v["application_secret"].as_str().unwrap(),
        v["consumer_key"].as_str().unwrap(),
    )
}

fn clock(v: &Value) -> Arc<FixedTimeSource> {
    Arc::new(FixedTimeSource::from_timestamp(v["client_timestamp"].as_i64().unwrap()).unwrap())
}

#[test]
fn builder_matches_vectors() {
    let v = vectors();
    let endpoint = v["endpoint"].as_str().unwrap();
    let server_ts = v["server_timestamp"].as_i64().unwrap();
    let sync = Arc::new(ServerTimeSync::new(format!("{endpoint}/auth/time"), clock(&v)));
    let builder = AuthenticatedRequestBuilder::new(endpoint, credentials(&v), sync);

    for case in v["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let expected = &case["expected_request"];
        let req = builder.build_at(
            parse_method(case["method"].as_str().unwrap()),
            case["path"].as_str().unwrap(),
            &parse_payload(&case["payload"]),
            server_ts,
        );
        assert_eq!(req.url, expected["url"].as_str().unwrap(), "{name}: url");
        assert_eq!(req.body.as_deref(), expected["body"].as_str(), "{name}: body");
        assert_eq!(
            req.header(SIGNATURE_HEADER),
            expected["signature"].as_str(),
            "{name}: signature"
        );
    }
}

/// Serves the fixture server time and records every request.
struct Recorder {
    server_time: String,
    sent: Mutex<Vec<HttpRequest>>,
}

impl Transport for Recorder {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.sent.lock().unwrap().push(request.clone());
        let body = if request.url.contains("/auth/time") {
            self.server_time.clone()
        } else {
            "null".to_string()
        };
        Ok(HttpResponse {
            status: 200,
            headers: Vec::new(),
            body,
        })
    }
}

#[test]
fn client_matches_vectors_through_time_sync() {
    let v = vectors();
    let recorder = Arc::new(Recorder {
        server_time: v["server_timestamp"].to_string(),
        sent: Mutex::new(Vec::new()),
    });
    let client = Client::with_transport(v["endpoint"].as_str().unwrap(), credentials(&v), recorder.clone())
        .unwrap()
        .with_time_source(clock(&v));

    let cases = v["cases"].as_array().unwrap();
    for case in cases {
        client
            .request_raw(
                parse_method(case["method"].as_str().unwrap()),
                case["path"].as_str().unwrap(),
                parse_payload(&case["payload"]),
            )
            .unwrap();
    }

    let sent = recorder.sent.lock().unwrap();
    assert_eq!(sent.len(), cases.len() + 1, "exactly one time sync");
    assert!(sent[0].url.ends_with("/auth/time"));
    for (req, case) in sent[1..].iter().zip(cases) {
        let name = case["name"].as_str().unwrap();
        let expected = &case["expected_request"];
        assert_eq!(req.header(TIMESTAMP_HEADER), Some("1566485767"), "{name}: timestamp");
        assert_eq!(
            req.header(SIGNATURE_HEADER),
            expected["signature"].as_str(),
            "{name}: signature"
        );
    }
}
