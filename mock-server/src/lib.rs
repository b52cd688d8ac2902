use std::{
    collections::BTreeMap,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use axum::{
    body::{to_bytes, Body},
    extract::{Path, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, warn};
use url::form_urlencoded;
use uuid::Uuid;

/// Largest request body the signature check will buffer.
const MAX_BODY_BYTES: usize = 1 << 20;

#[derive(Clone, Debug)]
pub struct MockConfig {
    pub application_key: String,
    pub application_secret: String,
    pub consumer_key: String,
    /// Added to the real clock to produce the server's time.
    pub clock_skew_secs: i64,
    /// Accepted distance between `X-Ovh-Timestamp` and the server's time.
    pub tolerance_secs: i64,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            application_key: "APPLICATION_KEY".to_string(),
            application_secret: "APPLICATION_SECRET".to_string(),
            consumer_key: "CONSUMER_KEY".to_string(),
            clock_skew_secs: 0,
            tolerance_secs: 30,
        }
    }
}

impl MockConfig {
    pub fn now(&self) -> i64 {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();
        secs + self.clock_skew_secs
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub line1: String,
    #[serde(default)]
    pub zip: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: u64,
    pub first_name: String,
    pub last_name: String,
    pub address: Address,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateContact {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub address: Address,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateContact {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub address: Option<AddressPatch>,
}

#[derive(Deserialize)]
pub struct AddressPatch {
    pub line1: Option<String>,
    pub zip: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

#[derive(Deserialize)]
pub struct AccessRule {
    pub method: String,
    pub path: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRequest {
    pub access_rules: Vec<AccessRule>,
    pub redirection: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialGrant {
    pub validation_url: String,
    pub consumer_key: String,
    pub state: String,
}

#[derive(Default)]
pub struct Contacts {
    next_id: u64,
    by_id: BTreeMap<u64, Contact>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<MockConfig>,
    pub contacts: Arc<RwLock<Contacts>>,
}

pub fn app(config: MockConfig) -> Router {
    let state = AppState {
        config: Arc::new(config),
        contacts: Arc::new(RwLock::new(Contacts::default())),
    };
    let signed = Router::new()
        .route("/1.0/me/contact", get(list_contacts).post(create_contact))
        .route(
            "/1.0/me/contact/{id}",
            get(get_contact).put(update_contact).delete(delete_contact),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_signature));
    Router::new()
        .route("/1.0/auth/time", get(server_time))
        .route("/1.0/auth/credential", post(request_credential))
        .merge(signed)
        .with_state(state)
}

pub async fn run(listener: TcpListener, config: MockConfig) -> Result<(), std::io::Error> {
    axum::serve(listener, app(config)).await
}

/// Signature the server expects for a request, computed from scratch.
pub fn expected_signature(secret: &str, consumer_key: &str, method: &str, url: &str, body: &str, timestamp: &str) -> String {
    let pre_image = format!("{secret}+{consumer_key}+{method}+{url}+{body}+{timestamp}");
    format!("$1${}", hex::encode(Sha1::digest(pre_image.as_bytes())))
}

fn error(status: StatusCode, error_code: &str, message: &str) -> Response {
    let body = serde_json::json!({
        "errorCode": error_code,
        "httpCode": status.to_string(),
        "message": message,
    });
    (status, Json(body)).into_response()
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

async fn require_signature(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let config = &state.config;
    let (parts, body) = request.into_parts();
    let Ok(bytes) = to_bytes(body, MAX_BODY_BYTES).await else {
        return error(StatusCode::PAYLOAD_TOO_LARGE, "BODY_TOO_LARGE", "Request body too large");
    };
    let body = String::from_utf8_lossy(&bytes).into_owned();

    let headers = &parts.headers;
    if header(headers, "X-Ovh-Application") != Some(config.application_key.as_str()) {
        return error(StatusCode::FORBIDDEN, "INVALID_KEY", "Invalid application key");
    }
    if header(headers, "X-Ovh-Consumer") != Some(config.consumer_key.as_str()) {
        return error(StatusCode::FORBIDDEN, "INVALID_CREDENTIAL", "Invalid credential");
    }
    let Some(timestamp) = header(headers, "X-Ovh-Timestamp") else {
        return error(StatusCode::BAD_REQUEST, "QUERY_TIME_OUT", "Missing timestamp");
    };
    let server_time = config.now();
    let drift = timestamp
        .parse::<i64>()
        .ok()
        .and_then(|ts| ts.checked_sub(server_time))
        .and_then(i64::checked_abs);
    match drift {
        Some(drift) if drift <= config.tolerance_secs => {}
        _ => {
            warn!(timestamp, server_time, "timestamp outside tolerance");
            return error(StatusCode::BAD_REQUEST, "QUERY_TIME_OUT", "Query out of time");
        }
    }

    let host = header(headers, "host").unwrap_or("localhost");
    let url = format!("http://{host}{}", parts.uri);
    let expected = expected_signature(
        &config.application_secret,
        &config.consumer_key,
        parts.method.as_str(),
        &url,
        &body,
        timestamp,
    );
    if header(headers, "X-Ovh-Signature") != Some(expected.as_str()) {
        warn!(%url, "signature mismatch");
        return error(StatusCode::BAD_REQUEST, "INVALID_SIGNATURE", "Invalid signature");
    }
    debug!(method = %parts.method, %url, "signature accepted");

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

async fn server_time(State(state): State<AppState>) -> String {
    state.config.now().to_string()
}

async fn request_credential(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<CredentialRequest>,
) -> Response {
    if header(&headers, "X-Ovh-Application") != Some(state.config.application_key.as_str()) {
        return error(StatusCode::FORBIDDEN, "INVALID_KEY", "Invalid application key");
    }
    if input.access_rules.is_empty() || input.access_rules.iter().any(|rule| rule.path.is_empty() || rule.method.is_empty()) {
        return error(StatusCode::BAD_REQUEST, "INVALID_RULES", "Invalid access rules");
    }
    let token = Uuid::new_v4();
    let mut query = form_urlencoded::Serializer::new(String::new());
    query.append_pair("credentialToken", &token.to_string());
    if let Some(redirection) = &input.redirection {
        query.append_pair("redirection", redirection);
    }
    let validation_url = format!("https://eu.api.ovh.com/auth/?{}", query.finish());
    let grant = CredentialGrant {
        validation_url,
        consumer_key: Uuid::new_v4().simple().to_string(),
        state: "pendingValidation".to_string(),
    };
    Json(grant).into_response()
}

async fn list_contacts(State(state): State<AppState>) -> Json<Vec<u64>> {
    let contacts = state.contacts.read().await;
    Json(contacts.by_id.keys().copied().collect())
}

async fn create_contact(State(state): State<AppState>, Json(input): Json<CreateContact>) -> Json<Contact> {
    let mut contacts = state.contacts.write().await;
    contacts.next_id += 1;
    let contact = Contact {
        id: contacts.next_id,
        first_name: input.first_name,
        last_name: input.last_name,
        address: input.address,
    };
    contacts.by_id.insert(contact.id, contact.clone());
    Json(contact)
}

fn not_found(id: u64) -> Response {
    error(
        StatusCode::NOT_FOUND,
        "OBJECT_NOT_FOUND",
        &format!("The requested object (id = {id}) does not exist"),
    )
}

async fn get_contact(State(state): State<AppState>, Path(id): Path<u64>) -> Response {
    let contacts = state.contacts.read().await;
    match contacts.by_id.get(&id) {
        Some(contact) => Json(contact.clone()).into_response(),
        None => not_found(id),
    }
}

async fn update_contact(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(input): Json<UpdateContact>,
) -> Response {
    let mut contacts = state.contacts.write().await;
    let Some(contact) = contacts.by_id.get_mut(&id) else {
        return not_found(id);
    };
    if let Some(first_name) = input.first_name {
        contact.first_name = first_name;
    }
    if let Some(last_name) = input.last_name {
        contact.last_name = last_name;
    }
    if let Some(patch) = input.address {
        let address = &mut contact.address;
        for (field, value) in [
            (&mut address.line1, patch.line1),
            (&mut address.zip, patch.zip),
            (&mut address.city, patch.city),
            (&mut address.country, patch.country),
        ] {
            if let Some(value) = value {
                *field = value;
            }
        }
    }
    Json(contact.clone()).into_response()
}

async fn delete_contact(State(state): State<AppState>, Path(id): Path<u64>) -> Response {
    let mut contacts = state.contacts.write().await;
    match contacts.by_id.remove(&id) {
        Some(_) => Json(serde_json::Value::Null).into_response(),
        None => not_found(id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_signature_matches_known_vector() {
        assert_eq!(
            expected_signature(
                "APPLICATION_SECRET",
                "CONSUMER_KEY",
                "PUT",
                "https://eu.api.ovh.com/1.0/me/contact",
                "Fake content",
                "1566485767",
            ),
            "$1$5e81842c0f0c806fd703de084d80192a59bc0f8a"
        );
    }

    #[test]
    fn skewed_clock_is_offset() {
        let config = MockConfig {
            clock_skew_secs: 3600,
            ..MockConfig::default()
        };
        let diff = config.now() - MockConfig::default().now();
        assert!((3599..=3601).contains(&diff));
    }

    #[test]
    fn contact_serializes_camel_case() {
        let contact = Contact {
            id: 1,
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            address: Address::default(),
        };
        let json = serde_json::to_value(&contact).unwrap();
        assert_eq!(json["firstName"], "Jane");
        assert_eq!(json["address"]["zip"], "");
    }

    #[test]
    fn create_contact_defaults_address() {
        let input: CreateContact = serde_json::from_str(r#"{"firstName":"Jane","lastName":"Doe"}"#).unwrap();
        assert!(input.address.line1.is_empty());
    }

    #[test]
    fn create_contact_rejects_missing_name() {
        let result: Result<CreateContact, _> = serde_json::from_str(r#"{"lastName":"Doe"}"#);
        assert!(result.is_err());
    }
}
