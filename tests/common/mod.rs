//! In-process mock of the Keygen endpoints the portal talks to.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use portal::config::ApiConfig;

pub const ACCOUNT: &str = "demo-account";

#[derive(Debug, Clone)]
pub struct MockLicense {
    pub id: String,
    pub key: String,
    pub name: String,
    pub max_machines: u32,
    pub expired: bool,
}

#[derive(Debug, Clone)]
pub struct MockMachine {
    pub id: String,
    pub license_id: String,
    pub fingerprint: String,
    pub name: String,
    pub platform: String,
    pub browser: Option<String>,
    pub version: Option<String>,
}

/// A request as the mock saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub keygen_version: Option<String>,
    pub body: Option<Value>,
}

#[derive(Debug, Default)]
pub struct MockState {
    pub licenses: Vec<MockLicense>,
    pub machines: Vec<MockMachine>,
    pub requests: Vec<Recorded>,
    next_machine: u32,
}

pub type Shared = Arc<Mutex<MockState>>;

impl MockState {
    pub fn with_license(mut self, key: &str, max_machines: u32) -> Self {
        let n = self.licenses.len() + 1;
        self.licenses.push(MockLicense {
            id: format!("lic-{n}"),
            key: key.to_string(),
            name: format!("Demo License {n}"),
            max_machines,
            expired: false,
        });
        self
    }

    pub fn expired(mut self) -> Self {
        if let Some(license) = self.licenses.last_mut() {
            license.expired = true;
        }
        self
    }

    pub fn with_machine(mut self, key: &str, fingerprint: &str) -> Self {
        let license_id = self
            .licenses
            .iter()
            .find(|l| l.key == key)
            .map(|l| l.id.clone())
            .expect("license must be added before its machines");
        self.add_machine(&license_id, fingerprint, "Other Device", "macos-aarch64", None, None);
        self
    }

    fn add_machine(
        &mut self,
        license_id: &str,
        fingerprint: &str,
        name: &str,
        platform: &str,
        browser: Option<String>,
        version: Option<String>,
    ) -> MockMachine {
        self.next_machine += 1;
        let machine = MockMachine {
            id: format!("{:08x}-0000-4000-8000-000000000000", self.next_machine),
            license_id: license_id.to_string(),
            fingerprint: fingerprint.to_string(),
            name: name.to_string(),
            platform: platform.to_string(),
            browser,
            version,
        };
        self.machines.push(machine.clone());
        machine
    }

    fn license_by_auth(&self, headers: &HeaderMap) -> Option<MockLicense> {
        let auth = headers.get("authorization")?.to_str().ok()?;
        let key = auth.strip_prefix("License ")?;
        self.licenses.iter().find(|l| l.key == key).cloned()
    }

    fn record(&mut self, method: &str, path: String, headers: &HeaderMap, body: Option<Value>) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        self.requests.push(Recorded {
            method: method.to_string(),
            path,
            authorization: header("authorization"),
            keygen_version: header("keygen-version"),
            body,
        });
    }

    pub fn machines_for(&self, license_id: &str) -> Vec<&MockMachine> {
        self.machines
            .iter()
            .filter(|m| m.license_id == license_id)
            .collect()
    }
}

fn license_json(license: &MockLicense) -> Value {
    json!({
        "id": license.id,
        "type": "licenses",
        "attributes": {
            "name": license.name,
            "key": license.key,
            "expiry": if license.expired { json!("2020-01-01T00:00:00.000Z") } else { Value::Null },
            "created": "2024-01-15T09:30:00.000Z",
            "maxMachines": license.max_machines,
            "status": if license.expired { "EXPIRED" } else { "ACTIVE" },
        }
    })
}

fn machine_json(machine: &MockMachine) -> Value {
    let mut metadata = serde_json::Map::new();
    if let Some(browser) = &machine.browser {
        metadata.insert("browser".to_string(), json!(browser));
    }
    if let Some(version) = &machine.version {
        metadata.insert("version".to_string(), json!(version));
    }
    json!({
        "id": machine.id,
        "type": "machines",
        "attributes": {
            "fingerprint": machine.fingerprint,
            "name": machine.name,
            "platform": machine.platform,
            "metadata": metadata,
            "created": "2024-02-10T08:00:00.000Z",
        }
    })
}

fn error_response(status: StatusCode, title: &str, detail: &str, code: Option<&str>) -> Response {
    let mut entry = json!({ "title": title, "detail": detail });
    if let Some(code) = code {
        entry["code"] = json!(code);
    }
    (status, Json(json!({ "errors": [entry] }))).into_response()
}

fn unauthorized() -> Response {
    error_response(
        StatusCode::UNAUTHORIZED,
        "Unauthorized",
        "You must be authenticated to complete the request",
        Some("LICENSE_INVALID"),
    )
}

async fn validate_key(
    State(state): State<Shared>,
    Path(account): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().unwrap();
    state.record(
        "POST",
        format!("/accounts/{account}/licenses/actions/validate-key"),
        &headers,
        Some(body.clone()),
    );

    let key = body["meta"]["key"].as_str().unwrap_or_default();
    let fingerprint = body["meta"]["scope"]["fingerprint"].as_str().unwrap_or_default();

    let Some(license) = state.licenses.iter().find(|l| l.key == key).cloned() else {
        return Json(json!({
            "meta": { "valid": false, "detail": "does not exist", "code": "NOT_FOUND" },
            "data": null,
            "errors": null,
        }))
        .into_response();
    };

    let machines = state.machines_for(&license.id);
    let (valid, code) = if license.expired {
        (false, "EXPIRED")
    } else if machines.is_empty() {
        (false, "NO_MACHINES")
    } else if !machines.iter().any(|m| m.fingerprint == fingerprint) {
        (false, "FINGERPRINT_SCOPE_MISMATCH")
    } else {
        (true, "VALID")
    };

    Json(json!({
        "meta": {
            "ts": "2024-03-01T12:00:00.000Z",
            "valid": valid,
            "detail": code.to_lowercase(),
            "code": code,
        },
        "data": license_json(&license),
    }))
    .into_response()
}

async fn create_machine(
    State(state): State<Shared>,
    Path(account): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().unwrap();
    state.record("POST", format!("/accounts/{account}/machines"), &headers, Some(body.clone()));

    let Some(license) = state.license_by_auth(&headers) else {
        return unauthorized();
    };

    let attrs = &body["data"]["attributes"];
    let fingerprint = attrs["fingerprint"].as_str().unwrap_or_default();
    let machines = state.machines_for(&license.id);

    if machines.iter().any(|m| m.fingerprint == fingerprint) {
        return error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Unprocessable resource",
            "has already been taken",
            Some("FINGERPRINT_TAKEN"),
        );
    }
    if machines.len() as u32 >= license.max_machines {
        let resp = json!({
            "errors": [{
                "title": "Unprocessable resource",
                "detail": format!(
                    "machine count has exceeded maximum allowed by current policy ({})",
                    license.max_machines
                ),
                "code": "MACHINE_LIMIT_EXCEEDED",
                "source": { "pointer": "/data" },
            }]
        });
        return (StatusCode::UNPROCESSABLE_ENTITY, Json(resp)).into_response();
    }

    let machine = state.add_machine(
        &license.id,
        fingerprint,
        attrs["name"].as_str().unwrap_or("Unnamed"),
        attrs["platform"].as_str().unwrap_or("unknown"),
        attrs["metadata"]["browser"].as_str().map(str::to_string),
        attrs["metadata"]["version"].as_str().map(str::to_string),
    );

    (StatusCode::CREATED, Json(json!({ "data": machine_json(&machine) }))).into_response()
}

async fn list_machines(
    State(state): State<Shared>,
    Path(account): Path<String>,
    headers: HeaderMap,
) -> Response {
    let mut state = state.lock().unwrap();
    state.record("GET", format!("/accounts/{account}/machines"), &headers, None);

    let Some(license) = state.license_by_auth(&headers) else {
        return unauthorized();
    };

    let data: Vec<Value> = state
        .machines_for(&license.id)
        .into_iter()
        .map(machine_json)
        .collect();
    Json(json!({ "data": data })).into_response()
}

async fn delete_machine(
    State(state): State<Shared>,
    Path((account, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let mut state = state.lock().unwrap();
    state.record("DELETE", format!("/accounts/{account}/machines/{id}"), &headers, None);

    let Some(license) = state.license_by_auth(&headers) else {
        return unauthorized();
    };

    match state
        .machines
        .iter()
        .position(|m| m.id == id && m.license_id == license.id)
    {
        Some(idx) => {
            state.machines.remove(idx);
            StatusCode::NO_CONTENT.into_response()
        }
        None => error_response(
            StatusCode::NOT_FOUND,
            "Not found",
            &format!("The requested machine '{id}' was not found"),
            Some("NOT_FOUND"),
        ),
    }
}

/// Spin up the mock on an ephemeral port. Returns its API base URL and state.
pub async fn spawn_mock_keygen(state: MockState) -> (String, Shared) {
    let shared: Shared = Arc::new(Mutex::new(state));

    let router = Router::new()
        .route(
            "/v1/accounts/:account/licenses/actions/validate-key",
            post(validate_key),
        )
        .route(
            "/v1/accounts/:account/machines",
            post(create_machine).get(list_machines),
        )
        .route("/v1/accounts/:account/machines/:id", delete(delete_machine))
        .with_state(shared.clone());

    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .expect("failed to bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .await
            .expect("server failed");
    });

    (format!("http://{}/v1", addr), shared)
}

pub fn api_config(base_url: &str) -> ApiConfig {
    ApiConfig {
        account_id: ACCOUNT.to_string(),
        base_url: base_url.to_string(),
        timeout_secs: 5,
        ..ApiConfig::default()
    }
}
