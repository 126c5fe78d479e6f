// crates/bluqube-config/src/config.rs
// ============================================================================
// Module: BluQube Configuration
// Description: Configuration loading and validation for BluQube hosts.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: serde, toml, url
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section has defaults, so an empty file is a valid local-only
//! configuration. Missing files, oversized files, and invalid values fail
//! closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "bluqube.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "BLUQUBE_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum number of configured principals.
pub const MAX_PRINCIPALS: usize = 64;
/// Maximum length of a bearer token.
pub const MAX_TOKEN_LENGTH: usize = 256;
/// Upper bound for `server.max_body_bytes`.
pub const MAX_BODY_BYTES_LIMIT: usize = 16 * 1024 * 1024;
/// Upper bound for `remote.max_response_bytes`.
pub const MAX_RESPONSE_BYTES_LIMIT: usize = 64 * 1024 * 1024;
/// Upper bound for `remote.timeout_ms`.
pub const MAX_TIMEOUT_MS: u64 = 300_000;
/// Maximum length of the server base path.
const MAX_BASE_PATH_LENGTH: usize = 128;

// ============================================================================
// SECTION: Root
// ============================================================================

/// Root configuration for a BluQube host.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BluQubeConfig {
    /// Inbound HTTP endpoint configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Remote endpoint for contracts with no local handler.
    #[serde(default)]
    pub remote: Option<RemoteConfig>,
    /// Diagnostic logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Dispatch audit configuration.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl BluQubeConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// Resolution order: explicit path, then `BLUQUBE_CONFIG`, then
    /// `bluqube.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::parse(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        if let Some(remote) = &self.remote {
            remote.validate()?;
        }
        self.logging.validate()?;
        self.audit.validate()?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// Inbound HTTP endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Path prefix under which contracts are served.
    #[serde(default = "default_base_path")]
    pub base_path: String,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Whether requests without a bearer token run as the anonymous caller.
    #[serde(default = "default_allow_anonymous")]
    pub allow_anonymous: bool,
    /// Bearer token principals.
    #[serde(default)]
    pub principals: Vec<PrincipalConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            base_path: default_base_path(),
            max_body_bytes: default_max_body_bytes(),
            allow_anonymous: default_allow_anonymous(),
            principals: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Parses the bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the address does not parse.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid("server.bind must be a socket address".to_string()))
    }

    /// Validates server configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        self.socket_addr()?;
        validate_base_path(&self.base_path)?;
        if self.max_body_bytes == 0 || self.max_body_bytes > MAX_BODY_BYTES_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "server.max_body_bytes must be between 1 and {MAX_BODY_BYTES_LIMIT}"
            )));
        }
        if self.principals.len() > MAX_PRINCIPALS {
            return Err(ConfigError::Invalid(format!(
                "server.principals exceeds max of {MAX_PRINCIPALS}"
            )));
        }
        let mut tokens = BTreeSet::new();
        for principal in &self.principals {
            principal.validate()?;
            if !tokens.insert(principal.token.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate token for principal {}",
                    principal.subject
                )));
            }
        }
        Ok(())
    }
}

/// Bearer token principal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrincipalConfig {
    /// Bearer token presented by the caller.
    pub token: String,
    /// Subject the token authenticates as.
    pub subject: String,
    /// Roles granted to the subject.
    #[serde(default)]
    pub roles: Vec<String>,
    /// Claims attached to the subject.
    #[serde(default)]
    pub claims: BTreeMap<String, String>,
}

impl PrincipalConfig {
    /// Validates principal fields.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.subject.trim().is_empty() {
            return Err(ConfigError::Invalid("principal subject must be non-empty".to_string()));
        }
        validate_token("server.principals.token", &self.token)?;
        if self.roles.iter().any(|role| role.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "principal {} has an empty role",
                self.subject
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Remote
// ============================================================================

/// Remote endpoint used for contracts with no local handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the remote endpoint, including its base path.
    pub endpoint: String,
    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Bearer token sent with every request.
    #[serde(default)]
    pub bearer_token: Option<String>,
    /// Maximum response body size in bytes.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
}

impl RemoteConfig {
    /// Parses the endpoint URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the URL is malformed or not http(s).
    pub fn endpoint_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(self.endpoint.trim())
            .map_err(|err| ConfigError::Invalid(format!("remote.endpoint is invalid: {err}")))?;
        match url.scheme() {
            "http" | "https" => {}
            _ => {
                return Err(ConfigError::Invalid(
                    "remote.endpoint must use http or https".to_string(),
                ));
            }
        }
        if url.host_str().is_none() {
            return Err(ConfigError::Invalid("remote.endpoint must include a host".to_string()));
        }
        Ok(url)
    }

    /// Request timeout as a duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Validates remote configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        self.endpoint_url()?;
        if self.timeout_ms == 0 || self.timeout_ms > MAX_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "remote.timeout_ms must be between 1 and {MAX_TIMEOUT_MS}"
            )));
        }
        if self.max_response_bytes == 0 || self.max_response_bytes > MAX_RESPONSE_BYTES_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "remote.max_response_bytes must be between 1 and {MAX_RESPONSE_BYTES_LIMIT}"
            )));
        }
        if let Some(token) = &self.bearer_token {
            validate_token("remote.bearer_token", token)?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Logging and Audit
// ============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable single-line output.
    #[default]
    Compact,
    /// One JSON object per line.
    Json,
}

/// Diagnostic logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directives, e.g. `info,bluqube_core=debug`.
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            format: LogFormat::default(),
        }
    }
}

impl LoggingConfig {
    /// Validates logging configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.filter.trim().is_empty() {
            return Err(ConfigError::Invalid("logging.filter must be non-empty".to_string()));
        }
        Ok(())
    }
}

/// Dispatch audit configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Whether audit events are emitted.
    #[serde(default)]
    pub enabled: bool,
    /// Optional file for JSON lines; stderr when unset.
    #[serde(default)]
    pub path: Option<String>,
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_string("audit.path", path)?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default bind address.
fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

/// Default base path.
fn default_base_path() -> String {
    "/bluqube".to_string()
}

/// Default request body limit.
const fn default_max_body_bytes() -> usize {
    1024 * 1024
}

/// Anonymous callers are allowed by default; policies decide.
const fn default_allow_anonymous() -> bool {
    true
}

/// Default remote timeout.
const fn default_timeout_ms() -> u64 {
    10_000
}

/// Default response body limit.
const fn default_max_response_bytes() -> usize {
    4 * 1024 * 1024
}

/// Default log filter.
fn default_log_filter() -> String {
    "info".to_string()
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates a bearer token value.
fn validate_token(field: &str, token: &str) -> Result<(), ConfigError> {
    if token.is_empty() || token.len() > MAX_TOKEN_LENGTH {
        return Err(ConfigError::Invalid(format!(
            "{field} must be 1 to {MAX_TOKEN_LENGTH} bytes"
        )));
    }
    if token.chars().any(|ch| ch.is_whitespace() || ch.is_control()) {
        return Err(ConfigError::Invalid(format!("{field} must not contain whitespace")));
    }
    Ok(())
}

/// Validates the server base path.
fn validate_base_path(base_path: &str) -> Result<(), ConfigError> {
    if !base_path.starts_with('/') || base_path.len() < 2 {
        return Err(ConfigError::Invalid(
            "server.base_path must start with '/' and name a segment".to_string(),
        ));
    }
    if base_path.len() > MAX_BASE_PATH_LENGTH {
        return Err(ConfigError::Invalid("server.base_path exceeds max length".to_string()));
    }
    if base_path.ends_with('/') || base_path.contains("//") {
        return Err(ConfigError::Invalid(
            "server.base_path must not contain empty segments".to_string(),
        ));
    }
    if !base_path.chars().all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '/' | '-' | '_' | '.'))
    {
        return Err(ConfigError::Invalid(
            "server.base_path contains unsupported characters".to_string(),
        ));
    }
    if base_path.split('/').any(|segment| segment == "." || segment == "..") {
        return Err(ConfigError::Invalid(
            "server.base_path must not contain dot segments".to_string(),
        ));
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
