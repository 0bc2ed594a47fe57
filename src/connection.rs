//! HTTP connection to the iTop REST/JSON API.
//!
//! This module provides the `Connection` struct for making authenticated
//! requests to the single iTop REST endpoint
//! (`<base>/webservices/rest.php?version=<v>`).
//!
//! Every call is a blocking form-encoded POST carrying a `json_data` field.
//! There is no retry: a failed request is reported to the caller as is.
//!
//! # Security
//!
//! The password is never logged. HTTP error bodies are sanitized before they
//! are logged or returned.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use reqwest::blocking::{Client, Response as HttpResponse};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode as HttpStatus;
use serde_json::{json, Value};

use crate::config::{AuthMode, Config};
use crate::error::ItopError;
use crate::models::{message_of, status_of, Operation, Response, ShapeCache};
use crate::query::Filter;

/// Path of the REST endpoint below the iTop base URL.
pub const REST_ENDPOINT: &str = "webservices/rest.php";

/// Maximum length of an HTTP error body echoed to the log.
const MAX_ERROR_BODY_LEN: usize = 500;

/// Credentials attached to every request. Exactly one scheme is active.
#[derive(Clone, PartialEq, Eq)]
enum Credentials {
    /// `auth_user` / `auth_pwd` form fields.
    Form { user: String, password: String },
    /// Precomputed `Basic <base64>` header value.
    Basic { header: String },
}

impl Credentials {
    fn from_config(config: &Config) -> Self {
        match config.auth {
            AuthMode::Form => Credentials::Form {
                user: config.username.clone(),
                password: config.password().to_string(),
            },
            AuthMode::Basic => Credentials::Basic {
                header: basic_auth_header(&config.username, config.password()),
            },
        }
    }

    fn mode(&self) -> AuthMode {
        match self {
            Credentials::Form { .. } => AuthMode::Form,
            Credentials::Basic { .. } => AuthMode::Basic,
        }
    }
}

/// Builds the `Authorization` value for HTTP Basic authentication.
fn basic_auth_header(username: &str, password: &str) -> String {
    format!(
        "Basic {}",
        base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", username, password))
    )
}

/// Connection to an iTop instance.
///
/// Holds the endpoint URL, credentials and HTTP client configuration, plus a
/// record shape cache reused by every `get`. Cloning is cheap and clones
/// share the cache.
///
/// # Example
///
/// ```ignore
/// let config = Config::new("https://itop.example.com", "admin", "secret");
/// let connection = Connection::new(&config)?;
///
/// let response = connection.get(
///     "Server",
///     GetParams::new().with_filter(Filter::fields([("status", "production")])),
/// )?;
/// for server in response.records() {
///     println!("{} {:?}", server.id(), server.get_str("name"));
/// }
/// ```
#[derive(Clone)]
pub struct Connection {
    /// The underlying HTTP client (cloning is cheap).
    http: Client,

    /// Full endpoint URL, including `?version=`.
    url: String,

    /// SECURITY: Never log this value!
    credentials: Credentials,

    /// Kept for sanitizing error text.
    password: String,

    timeout: Duration,

    shapes: Arc<ShapeCache>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("url", &self.url)
            .field("auth", &self.credentials.mode())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Creates a connection from configuration.
    ///
    /// # Errors
    ///
    /// Returns `ItopError::HttpClient` if the HTTP client fails to initialize.
    pub fn new(config: &Config) -> Result<Self, ItopError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(ItopError::HttpClient)?;

        if !config.verify_tls {
            tracing::warn!("TLS certificate verification is disabled");
        }

        Ok(Self {
            http,
            url: Self::normalize_url(&config.url, &config.version),
            credentials: Credentials::from_config(config),
            password: config.password().to_string(),
            timeout: config.timeout,
            shapes: Arc::new(ShapeCache::new()),
        })
    }

    /// Appends the REST endpoint and version unless the URL already names
    /// the endpoint.
    fn normalize_url(url: &str, version: &str) -> String {
        if url.contains(REST_ENDPOINT) {
            return url.to_string();
        }

        let mut url = url.to_string();
        if !url.ends_with('/') {
            url.push('/');
        }
        format!("{}{}?version={}", url, REST_ENDPOINT, version)
    }

    /// Returns the endpoint URL requests are posted to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the active authentication scheme.
    pub fn auth_mode(&self) -> AuthMode {
        self.credentials.mode()
    }

    /// Returns the record shape cache shared by this connection's clones.
    pub fn shapes(&self) -> &ShapeCache {
        &self.shapes
    }

    /// Encodes the form body: credential fields (form auth only), then
    /// `json_data`.
    fn form_body(&self, json_data: &str) -> String {
        let mut pairs: Vec<(&str, &str)> = Vec::with_capacity(3);
        if let Credentials::Form { user, password } = &self.credentials {
            pairs.push(("auth_user", user.as_str()));
            pairs.push(("auth_pwd", password.as_str()));
        }
        pairs.push(("json_data", json_data));

        pairs
            .iter()
            .map(|(name, value)| format!("{}={}", name, urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Posts a serialized JSON payload and returns the parsed body.
    ///
    /// # Errors
    ///
    /// - `ItopError::HttpStatus`, `ItopError::Timeout`, `ItopError::Http` on
    ///   transport failures
    /// - `ItopError::Serialization` if the body is not JSON
    /// - `ItopError::InvalidResponse` if the body has no `code`
    /// - `ItopError::Api` if `code` is non-zero, or
    ///   `ItopError::UnknownStatusCode` if that code is undocumented
    pub fn request(&self, json_data: &str) -> Result<Value, ItopError> {
        let mut req = self
            .http
            .post(&self.url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(self.form_body(json_data));

        if let Credentials::Basic { header } = &self.credentials {
            req = req.header(AUTHORIZATION, header);
        }

        let response = req.send().map_err(|e| self.transport_error(e))?;
        let status = response.status();

        if status != HttpStatus::OK {
            return Err(self.handle_http_error(status, response));
        }

        let body = response.text().map_err(|e| self.transport_error(e))?;

        tracing::trace!(body = %body, "iTop API response");

        let value: Value = serde_json::from_str(&body)?;
        let code = status_of(&value)?;
        if !code.is_ok() {
            let message = message_of(&value);
            tracing::debug!(code = %code, message = %message, "iTop API returned an error code");
            return Err(ItopError::api(code, message));
        }

        Ok(value)
    }

    /// Serializes `payload` and sends it with [`request`](Self::request).
    fn call(&self, payload: &Value) -> Result<Value, ItopError> {
        let operation = payload
            .get("operation")
            .and_then(Value::as_str)
            .unwrap_or("unknown");

        tracing::debug!(operation = %operation, url = %self.url, "Making iTop API request");

        let json_data = serde_json::to_string(payload)?;
        self.request(&json_data)
    }

    fn transport_error(&self, e: reqwest::Error) -> ItopError {
        if e.is_timeout() {
            return ItopError::Timeout {
                duration: self.timeout,
            };
        }
        ItopError::Http(e)
    }

    /// Converts a non-200 response into `ItopError::HttpStatus`.
    fn handle_http_error(&self, status: HttpStatus, response: HttpResponse) -> ItopError {
        let body = response.text().unwrap_or_default();
        let body = ItopError::sanitize_message(&body, &self.password);
        let preview = match body.char_indices().nth(MAX_ERROR_BODY_LEN) {
            Some((cut, _)) => format!("{}...[truncated]", &body[..cut]),
            None => body.clone(),
        };

        tracing::warn!(status = %status, body = %preview, "iTop endpoint returned a non-200 status");

        ItopError::HttpStatus { status, body }
    }

    /// Lists the operations the iTop instance supports.
    ///
    /// # Errors
    ///
    /// Returns `ItopError::InvalidResponse` if the answer has no
    /// `operations` array, plus any error of [`request`](Self::request).
    pub fn list_operations(&self) -> Result<Vec<Operation>, ItopError> {
        let response = self.call(&json!({ "operation": "list_operations" }))?;

        let operations = response
            .get("operations")
            .cloned()
            .ok_or_else(|| ItopError::invalid_response("missing operations"))?;

        Ok(serde_json::from_value(operations)?)
    }

    /// Tests connectivity and credentials.
    ///
    /// Calls `list_operations` and expects at least one operation back.
    ///
    /// # Errors
    ///
    /// Returns `ItopError::ConnectionTest` with a hint about the likely cause.
    pub fn test_connection(&self) -> Result<(), ItopError> {
        tracing::debug!("Testing connection to iTop");

        match self.list_operations() {
            Ok(operations) if !operations.is_empty() => {
                tracing::info!(operations = operations.len(), "Connection test successful");
                Ok(())
            }
            Ok(_) => Err(ItopError::connection_test(
                "iTop reported no supported operations",
            )),
            Err(ItopError::Api { status, message }) => Err(ItopError::connection_test(format!(
                "iTop rejected the request ({}): {} - verify ITOP_USERNAME and ITOP_PASSWORD",
                status,
                ItopError::sanitize_message(&message, &self.password)
            ))),
            Err(ItopError::Timeout { duration }) => Err(ItopError::connection_test(format!(
                "Connection timed out after {:?} - verify ITOP_URL is correct and server is reachable",
                duration
            ))),
            Err(ItopError::Http(e)) => {
                let message = ItopError::sanitize_message(&e.to_string(), &self.password);
                Err(ItopError::connection_test(format!(
                    "HTTP error: {} - verify ITOP_URL is correct",
                    message
                )))
            }
            Err(e) => Err(ItopError::connection_test(e.sanitized_display(&self.password))),
        }
    }

    /// Fetches objects of `class_name` with `core/get`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let mut builder = OqlBuilder::new("Person");
    /// builder.add_condition("status", "active", "=");
    ///
    /// let params = GetParams::new()
    ///     .with_filter(builder)
    ///     .with_fields(["name", "email"])
    ///     .with_limit(20);
    /// let response = connection.get("Person", params)?;
    /// ```
    pub fn get(&self, class_name: &str, params: GetParams) -> Result<Response, ItopError> {
        let payload = params.to_json_data(class_name);
        let raw = self.call(&payload)?;
        Response::parse_with(&raw, &self.shapes)
    }
}

/// Parameters for `core/get`.
///
/// Use the builder methods to select objects, output fields and pagination.
#[derive(Debug, Clone, Default)]
pub struct GetParams {
    filter: Option<Filter>,
    fields: Option<Vec<String>>,
    limit: Option<u32>,
    page: Option<u32>,
}

impl GetParams {
    /// Creates empty parameters (every object of the class, all fields).
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects objects with a filter.
    pub fn with_filter(mut self, filter: impl Into<Filter>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Restricts the returned fields.
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the maximum number of objects to return.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the page to return (1-based, used with `limit`).
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    /// Builds the `core/get` payload.
    fn to_json_data(&self, class_name: &str) -> Value {
        let output_fields = match &self.fields {
            Some(fields) if !fields.is_empty() => fields.join(", "),
            _ => "*".to_string(),
        };

        let key = match &self.filter {
            Some(filter) => filter.to_oql(class_name),
            None => format!("SELECT {}", class_name),
        };

        let mut data = json!({
            "operation": "core/get",
            "class": class_name,
            "output_fields": output_fields,
            "key": key,
        });

        if let Value::Object(ref mut map) = data {
            if let Some(limit) = self.limit {
                map.insert("limit".to_string(), json!(limit));
            }
            if let Some(page) = self.page {
                map.insert("page".to_string(), json!(page));
            }
        }

        data
    }
}
