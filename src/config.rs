//! Configuration for connecting to iTop.
//!
//! A [`Config`] is either built in code with [`Config::new`] and the `with_*`
//! methods, or loaded from environment variables with [`Config::from_env`].

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::error::ItopError;

/// Default REST API version.
pub const DEFAULT_API_VERSION: &str = "1.3";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// How credentials are presented to iTop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    /// `auth_user` / `auth_pwd` form fields in every request body.
    #[default]
    Form,
    /// An `Authorization: Basic ...` header.
    Basic,
}

impl FromStr for AuthMode {
    type Err = ItopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "form" => Ok(AuthMode::Form),
            "basic" => Ok(AuthMode::Basic),
            other => Err(ItopError::invalid_config(format!(
                "ITOP_AUTH must be 'form' or 'basic', got: {:?}",
                other
            ))),
        }
    }
}

/// Settings for a [`Connection`](crate::connection::Connection).
///
/// The password is never printed: `Debug` redacts it.
#[derive(Clone)]
pub struct Config {
    /// iTop base URL or full REST endpoint URL.
    pub url: String,

    /// Account name.
    pub username: String,

    /// Account password.
    /// This value must never be logged or included in error messages.
    password: String,

    /// REST API version sent as `?version=`.
    pub version: String,

    /// Authentication scheme.
    pub auth: AuthMode,

    /// Whether TLS certificates are verified.
    pub verify_tls: bool,

    /// Timeout for a whole request.
    pub timeout: Duration,
}

impl Config {
    /// Creates a configuration with default version, auth mode, TLS
    /// verification and timeout.
    pub fn new(
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            username: username.into(),
            password: password.into(),
            version: DEFAULT_API_VERSION.to_string(),
            auth: AuthMode::default(),
            verify_tls: true,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Sets the REST API version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Sets the authentication scheme.
    pub fn with_auth(mut self, auth: AuthMode) -> Self {
        self.auth = auth;
        self
    }

    /// Enables or disables TLS certificate verification.
    pub fn with_verify_tls(mut self, verify_tls: bool) -> Self {
        self.verify_tls = verify_tls;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the password.
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Loads configuration from environment variables.
    ///
    /// # Required Environment Variables
    ///
    /// - `ITOP_URL`: iTop base URL
    /// - `ITOP_USERNAME`: account name
    /// - `ITOP_PASSWORD`: account password
    ///
    /// # Optional Environment Variables
    ///
    /// - `ITOP_API_VERSION` (default `1.3`)
    /// - `ITOP_AUTH`: `form` or `basic` (default `form`)
    /// - `ITOP_VERIFY_TLS`: `true`/`false` (default `true`)
    /// - `ITOP_TIMEOUT_SECS` (default `10`)
    ///
    /// # Errors
    ///
    /// Returns `ItopError::Config` if any required variable is missing
    /// or if values fail validation.
    pub fn from_env() -> Result<Self, ItopError> {
        let url = Self::get_required_env("ITOP_URL")?;
        let username = Self::get_required_env("ITOP_USERNAME")?;
        let password = Self::get_required_env("ITOP_PASSWORD")?;

        let url = Self::validate_url(url)?;

        let mut config = Config::new(url, username, password);

        if let Some(version) = Self::get_optional_env("ITOP_API_VERSION") {
            config = config.with_version(version);
        }
        if let Some(auth) = Self::get_optional_env("ITOP_AUTH") {
            config = config.with_auth(auth.parse()?);
        }
        if let Some(verify) = Self::get_optional_env("ITOP_VERIFY_TLS") {
            config = config.with_verify_tls(Self::parse_bool("ITOP_VERIFY_TLS", &verify)?);
        }
        if let Some(secs) = Self::get_optional_env("ITOP_TIMEOUT_SECS") {
            config = config.with_timeout(Self::parse_timeout(&secs)?);
        }

        Ok(config)
    }

    /// Gets a required environment variable, returning an error if missing or empty.
    fn get_required_env(name: &str) -> Result<String, ItopError> {
        Self::get_optional_env(name).ok_or_else(|| ItopError::missing_env(name))
    }

    /// Gets an environment variable, treating blank values as unset.
    fn get_optional_env(name: &str) -> Option<String> {
        env::var(name).ok().filter(|value| !value.trim().is_empty())
    }

    /// Validates the URL parses and uses http or https.
    fn validate_url(url: String) -> Result<String, ItopError> {
        let url = url.trim().to_string();

        let parsed = Url::parse(&url)
            .map_err(|e| ItopError::invalid_config(format!("ITOP_URL is not a valid URL: {}", e)))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ItopError::invalid_config(
                "ITOP_URL must start with http:// or https://",
            ));
        }

        Ok(url)
    }

    fn parse_bool(name: &str, value: &str) -> Result<bool, ItopError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(ItopError::invalid_config(format!(
                "{} must be true or false",
                name
            ))),
        }
    }

    fn parse_timeout(value: &str) -> Result<Duration, ItopError> {
        match value.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
            _ => Err(ItopError::invalid_config(
                "ITOP_TIMEOUT_SECS must be a positive integer",
            )),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("version", &self.version)
            .field("auth", &self.auth)
            .field("verify_tls", &self.verify_tls)
            .field("timeout", &self.timeout)
            .finish()
    }
}
