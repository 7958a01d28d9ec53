//! Secret-store-backed broker store
//!
//! Talks to a CredHub-style credential API. Every record is a JSON credential
//! named under the store ID, and the activated flag is a marker credential.
//! Requests carry an OAuth2 bearer token obtained with the client-credentials
//! grant from the auth server the API advertises on `/info`.

use crate::error::StoreError;
use crate::store::{Activation, RecordSink, RecordSource};
use crate::types::{BindingDetails, RecordKind, ServiceInstance};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{Certificate, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DATA_PATH: &str = "/api/v1/data";
const ACTIVATED_MARKER: &str = "activated";

/// Connection settings for the secret store and its auth server
#[derive(Debug, Clone)]
pub struct SecretStoreSettings {
    pub url: String,
    pub ca_cert_pem: Option<String>,
    pub client_id: String,
    pub client_secret: String,
    pub uaa_ca_cert_pem: Option<String>,
    pub store_id: String,
}

#[derive(Debug, Deserialize)]
struct InfoResponse {
    #[serde(rename = "auth-server")]
    auth_server: AuthServer,
}

#[derive(Debug, Deserialize)]
struct AuthServer {
    url: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct DataResponse {
    #[serde(default)]
    data: Vec<CredentialValue>,
}

#[derive(Debug, Deserialize)]
struct CredentialValue {
    value: Value,
}

#[derive(Debug, Deserialize)]
struct FindResponse {
    #[serde(default)]
    credentials: Vec<CredentialName>,
}

#[derive(Debug, Deserialize)]
struct CredentialName {
    name: String,
}

#[derive(Debug, Serialize)]
struct SetRequest<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    credential_type: &'static str,
    value: &'a Value,
    mode: &'static str,
}

fn build_http_client(ca_cert_pem: Option<&str>) -> Result<Client, StoreError> {
    let mut builder = Client::builder()
        .connect_timeout(HTTP_CONNECT_TIMEOUT)
        .timeout(HTTP_REQUEST_TIMEOUT);
    if let Some(pem) = ca_cert_pem {
        let cert = Certificate::from_pem(pem.as_bytes())
            .map_err(|e| StoreError::Http(format!("Invalid CA certificate: {}", e)))?;
        builder = builder.add_root_certificate(cert);
    }
    builder
        .build()
        .map_err(|e| StoreError::Http(format!("Failed to create HTTP client: {}", e)))
}

fn map_http_error(error: reqwest::Error) -> StoreError {
    if error.is_timeout() {
        StoreError::Unavailable(format!("Request timeout: {}", error))
    } else if error.is_connect() {
        StoreError::Unavailable(format!("Connection error: {}", error))
    } else {
        StoreError::Http(error.to_string())
    }
}

fn check_status(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .unwrap_or_else(|_| "Unknown error".to_string());
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(StoreError::Unauthorized(body));
    }
    Err(StoreError::UnexpectedStatus {
        status: status.as_u16(),
        body,
    })
}

/// Broker store backed by a credential API
pub struct SecretStore {
    api: Client,
    auth: Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    store_id: String,
    token: RefCell<Option<String>>,
}

impl SecretStore {
    pub fn new(settings: SecretStoreSettings) -> Result<Self, StoreError> {
        let api = build_http_client(settings.ca_cert_pem.as_deref())?;
        let auth = build_http_client(settings.uaa_ca_cert_pem.as_deref())?;
        Ok(Self {
            api,
            auth,
            base_url: settings.url.trim_end_matches('/').to_string(),
            client_id: settings.client_id,
            client_secret: settings.client_secret,
            store_id: settings.store_id.trim_matches('/').to_string(),
            token: RefCell::new(None),
        })
    }

    fn collection_path(&self, kind: RecordKind) -> String {
        match kind {
            RecordKind::Instance => format!("/{}/instances", self.store_id),
            RecordKind::Binding => format!("/{}/bindings", self.store_id),
        }
    }

    fn record_name(&self, kind: RecordKind, id: &str) -> String {
        format!("{}/{}", self.collection_path(kind), id)
    }

    fn marker_name(&self) -> String {
        format!("/{}/{}", self.store_id, ACTIVATED_MARKER)
    }

    fn fetch_token(&self) -> Result<String, StoreError> {
        let info: InfoResponse = check_status(
            self.api
                .get(format!("{}/info", self.base_url))
                .send()
                .map_err(map_http_error)?,
        )?
        .json()
        .map_err(|e| StoreError::Serialization(format!("Invalid /info response: {}", e)))?;

        let token_url = format!("{}/oauth/token", info.auth_server.url.trim_end_matches('/'));
        debug!(token_url = %token_url, "Requesting secret store token");
        let token: TokenResponse = check_status(
            self.auth
                .post(&token_url)
                .form(&[
                    ("grant_type", "client_credentials"),
                    ("client_id", self.client_id.as_str()),
                    ("client_secret", self.client_secret.as_str()),
                ])
                .send()
                .map_err(map_http_error)?,
        )?
        .json()
        .map_err(|e| StoreError::Serialization(format!("Invalid token response: {}", e)))?;

        Ok(token.access_token)
    }

    fn bearer_token(&self) -> Result<String, StoreError> {
        if let Some(token) = self.token.borrow().as_ref() {
            return Ok(token.clone());
        }
        let token = self.fetch_token()?;
        *self.token.borrow_mut() = Some(token.clone());
        Ok(token)
    }

    /// Send an authenticated request, refreshing the token once on 401
    fn send<F>(&self, build: F) -> Result<Response, StoreError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let token = self.bearer_token()?;
        let response = build(&self.api)
            .bearer_auth(&token)
            .send()
            .map_err(map_http_error)?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        debug!("Secret store rejected token, refreshing");
        self.token.borrow_mut().take();
        let token = self.bearer_token()?;
        build(&self.api)
            .bearer_auth(&token)
            .send()
            .map_err(map_http_error)
    }

    fn get_value(&self, name: &str) -> Result<Option<Value>, StoreError> {
        let url = format!("{}{}", self.base_url, DATA_PATH);
        let response = self.send(|client| {
            client
                .get(&url)
                .query(&[("name", name), ("current", "true")])
        })?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let data: DataResponse = check_status(response)?
            .json()
            .map_err(|e| StoreError::Serialization(format!("Invalid credential '{}': {}", name, e)))?;
        Ok(data.data.into_iter().next().map(|credential| credential.value))
    }

    fn put_value(&self, name: &str, value: &Value) -> Result<(), StoreError> {
        let url = format!("{}{}", self.base_url, DATA_PATH);
        let body = SetRequest {
            name,
            credential_type: "json",
            value,
            mode: "overwrite",
        };
        check_status(self.send(|client| client.put(&url).json(&body))?)?;
        Ok(())
    }

    fn find_names(&self, path: &str) -> Result<Vec<String>, StoreError> {
        let url = format!("{}{}", self.base_url, DATA_PATH);
        let response = self.send(|client| client.get(&url).query(&[("path", path)]))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let found: FindResponse = check_status(response)?
            .json()
            .map_err(|e| StoreError::Serialization(format!("Invalid listing for '{}': {}", path, e)))?;
        Ok(found.credentials.into_iter().map(|c| c.name).collect())
    }

    fn load_all<T: DeserializeOwned>(
        &self,
        kind: RecordKind,
    ) -> Result<HashMap<String, T>, StoreError> {
        let prefix = format!("{}/", self.collection_path(kind));
        let mut records = HashMap::new();
        for name in self.find_names(&self.collection_path(kind))? {
            let Some(id) = name.strip_prefix(&prefix) else {
                continue;
            };
            let Some(value) = self.get_value(&name)? else {
                continue;
            };
            let record = serde_json::from_value(value).map_err(|e| {
                StoreError::Serialization(format!("Failed to decode {} '{}': {}", kind, id, e))
            })?;
            records.insert(id.to_string(), record);
        }
        Ok(records)
    }

    fn store<T: Serialize>(&self, kind: RecordKind, id: &str, record: &T) -> Result<(), StoreError> {
        let value = serde_json::to_value(record)?;
        self.put_value(&self.record_name(kind, id), &value)
    }
}

impl RecordSource for SecretStore {
    fn retrieve_all_instance_details(&self) -> Result<HashMap<String, ServiceInstance>, StoreError> {
        self.load_all(RecordKind::Instance)
    }

    fn retrieve_all_binding_details(&self) -> Result<HashMap<String, BindingDetails>, StoreError> {
        self.load_all(RecordKind::Binding)
    }
}

impl RecordSink for SecretStore {
    fn create_instance_details(&self, id: &str, details: &ServiceInstance) -> Result<(), StoreError> {
        self.store(RecordKind::Instance, id, details)
    }

    fn create_binding_details(&self, id: &str, details: &BindingDetails) -> Result<(), StoreError> {
        self.store(RecordKind::Binding, id, details)
    }
}

impl Activation for SecretStore {
    fn is_activated(&self) -> Result<bool, StoreError> {
        Ok(self.get_value(&self.marker_name())?.is_some())
    }

    fn activate(&self) -> Result<(), StoreError> {
        let marker = json!({ "activated_at": chrono::Utc::now().to_rfc3339() });
        self.put_value(&self.marker_name(), &marker)
    }
}
