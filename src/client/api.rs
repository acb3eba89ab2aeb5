//! HTTP client for the licensing API.
//!
//! [`LicensingApi`] is the seam the portal state machine talks to;
//! [`KeygenClient`] implements it over HTTPS with reqwest. Machine endpoints
//! authenticate with the license key itself (`Authorization: License <key>`),
//! so they can only be called once a validate-key response has returned the
//! license.

use std::time::Duration;

use reqwest::{Client, IntoUrl, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

use crate::client::errors::{ClientError, ClientResult};
use crate::client::responses::{
    ErrorDocument, KeyValidation, License, Machine, MachineDocument, MachineListDocument,
    ValidateKeyDocument,
};
use crate::config::ApiConfig;
use crate::device::DeviceInfo;
use crate::errors::PortalResult;
use crate::fingerprint::Fingerprint;

/// The four remote operations the portal depends on.
///
/// Every call resolves to a success payload or a [`ClientError`]; callers
/// never see both.
#[allow(async_fn_in_trait)]
pub trait LicensingApi {
    /// Validate `key`, scoped to this device's fingerprint.
    async fn validate_key(&self, key: &str, fingerprint: &Fingerprint)
        -> ClientResult<KeyValidation>;

    /// Register this device as a machine on `license`.
    async fn activate_machine(
        &self,
        license: &License,
        fingerprint: &Fingerprint,
        device: &DeviceInfo,
    ) -> ClientResult<Machine>;

    /// Remove machine `machine_id`, freeing its seat.
    async fn deactivate_machine(&self, license: &License, machine_id: &str) -> ClientResult<()>;

    /// All machines currently activated on `license`.
    async fn list_machines(&self, license: &License) -> ClientResult<Vec<Machine>>;
}

/// Request payload for validate-key.
#[derive(Debug, Serialize)]
struct ValidateKeyRequest<'a> {
    meta: ValidateKeyMeta<'a>,
}

#[derive(Debug, Serialize)]
struct ValidateKeyMeta<'a> {
    scope: ValidationScope<'a>,
    key: &'a str,
}

#[derive(Debug, Serialize)]
struct ValidationScope<'a> {
    fingerprint: &'a str,
    entitlements: &'a [String],
}

/// reqwest-backed licensing API client for one account.
#[derive(Debug, Clone)]
pub struct KeygenClient {
    http: Client,
    base_url: String,
    account_id: String,
    api_version: String,
    entitlements: Vec<String>,
}

impl KeygenClient {
    pub fn new(config: &ApiConfig) -> PortalResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            account_id: config.account_id.clone(),
            api_version: config.version.clone(),
            entitlements: config.entitlements.clone(),
        })
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    fn account_url(&self, path: &str) -> String {
        format!("{}/accounts/{}/{}", self.base_url, self.account_id, path)
    }

    /// URL of one machine resource. The id is percent-encoded as a single
    /// path segment so it can never address another resource.
    fn machine_url(&self, machine_id: &str) -> ClientResult<Url> {
        if matches!(machine_id.trim(), "" | "." | "..") {
            return Err(ClientError::InvalidRequest(format!(
                "'{machine_id}' is not a machine id"
            )));
        }

        let mut url = Url::parse(&self.account_url("machines"))
            .map_err(|e| ClientError::InvalidRequest(format!("invalid API URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidRequest("API URL cannot have a path".to_string()))?
            .push(machine_id);
        Ok(url)
    }

    fn request<U: IntoUrl>(&self, method: Method, url: U) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("Accept", "application/json")
            .header("Keygen-Version", &self.api_version)
    }

    fn license_request<U: IntoUrl>(
        &self,
        method: Method,
        url: U,
        license: &License,
    ) -> RequestBuilder {
        self.request(method, url)
            .header("Authorization", format!("License {}", license.key()))
    }
}

/// Decode a response body, reporting the HTTP status on malformed bodies.
async fn read_document<T: DeserializeOwned>(resp: Response) -> ClientResult<T> {
    let status = resp.status();
    let body = resp.bytes().await?;

    serde_json::from_slice(&body)
        .map_err(|e| ClientError::Decode(format!("HTTP {status}: invalid response body: {e}")))
}

impl LicensingApi for KeygenClient {
    async fn validate_key(
        &self,
        key: &str,
        fingerprint: &Fingerprint,
    ) -> ClientResult<KeyValidation> {
        let payload = ValidateKeyRequest {
            meta: ValidateKeyMeta {
                scope: ValidationScope {
                    fingerprint: fingerprint.as_str(),
                    entitlements: &self.entitlements,
                },
                key,
            },
        };

        let resp = self
            .request(Method::POST, self.account_url("licenses/actions/validate-key"))
            .json(&payload)
            .send()
            .await?;

        let doc: ValidateKeyDocument = read_document(resp).await?;
        doc.into_key_validation()
    }

    async fn activate_machine(
        &self,
        license: &License,
        fingerprint: &Fingerprint,
        device: &DeviceInfo,
    ) -> ClientResult<Machine> {
        let payload = json!({
            "data": {
                "type": "machine",
                "attributes": {
                    "fingerprint": fingerprint.as_str(),
                    "name": device.name,
                    "platform": device.platform,
                    "metadata": {
                        "browser": device.browser,
                        "version": device.version,
                    },
                },
                "relationships": {
                    "license": { "data": { "type": "license", "id": license.id } },
                },
            },
        });

        let resp = self
            .license_request(Method::POST, self.account_url("machines"), license)
            .json(&payload)
            .send()
            .await?;

        let doc: MachineDocument = read_document(resp).await?;
        let (_, machine) = doc.into_result()?;
        machine.ok_or_else(|| ClientError::Decode("activation response without data".to_string()))
    }

    async fn deactivate_machine(&self, license: &License, machine_id: &str) -> ClientResult<()> {
        let resp = self
            .license_request(Method::DELETE, self.machine_url(machine_id)?, license)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(());
        }

        let doc: ErrorDocument = read_document(resp).await?;
        doc.into_result()?;

        if status.is_success() {
            Ok(())
        } else {
            Err(ClientError::Decode(format!(
                "deactivation failed with HTTP status {status}"
            )))
        }
    }

    async fn list_machines(&self, license: &License) -> ClientResult<Vec<Machine>> {
        let resp = self
            .license_request(Method::GET, self.account_url("machines"), license)
            .send()
            .await?;

        let doc: MachineListDocument = read_document(resp).await?;
        let (_, machines) = doc.into_result()?;
        machines.ok_or_else(|| ClientError::Decode("machine list response without data".to_string()))
    }
}
