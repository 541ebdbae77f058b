//! Engine configuration.
//!
//! Built in code with [`EngineConfig::new`] plus builder methods, or read
//! from `STARVERS_*` environment variables with [`EngineConfig::from_env`].

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::DEFAULT_CHUNK_SIZE;
use crate::{Result, StarversError};

/// HTTP basic-auth credentials for the store.
///
/// The password is never serialized. A config read back from its serialized
/// form has an empty password until one is set again.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub user: String,
    #[serde(skip_serializing, default)]
    pub password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Read endpoint (SPARQL 1.1 protocol, `query=`).
    pub query_endpoint: String,
    /// Write endpoint (SPARQL 1.1 protocol, `update=`).
    pub update_endpoint: String,
    #[serde(default)]
    pub credentials: Option<Credentials>,
    /// Skip the reachability and RDF-star checks on connect.
    #[serde(default)]
    pub skip_connection_test: bool,
    /// Directory of template overrides.
    #[serde(default)]
    pub template_dir: Option<PathBuf>,
    /// Facts per write statement for bulk operations.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

impl EngineConfig {
    /// Configuration for a store whose update endpoint is
    /// `{query_endpoint}/statements` (the RDF4J / GraphDB layout).
    pub fn new(query_endpoint: impl Into<String>) -> Self {
        let query_endpoint = query_endpoint.into();
        let update_endpoint = statements_endpoint(&query_endpoint);
        Self {
            query_endpoint,
            update_endpoint,
            credentials: None,
            skip_connection_test: false,
            template_dir: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            timeout_secs: None,
        }
    }

    pub fn with_update_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.update_endpoint = endpoint.into();
        self
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(user, password));
        self
    }

    pub fn with_skip_connection_test(mut self, skip: bool) -> Self {
        self.skip_connection_test = skip;
        self
    }

    pub fn with_template_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.template_dir = Some(dir.into());
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Read the configuration from `STARVERS_*` environment variables.
    ///
    /// `STARVERS_QUERY_ENDPOINT` is required. Credentials are only used when
    /// both `STARVERS_USER` and `STARVERS_PASSWORD` are set.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let query_endpoint = lookup("STARVERS_QUERY_ENDPOINT").ok_or_else(|| {
            StarversError::Config("STARVERS_QUERY_ENDPOINT is not set".to_string())
        })?;
        let mut config = Self::new(query_endpoint);

        if let Some(endpoint) = lookup("STARVERS_UPDATE_ENDPOINT") {
            config.update_endpoint = endpoint;
        }
        if let (Some(user), Some(password)) =
            (lookup("STARVERS_USER"), lookup("STARVERS_PASSWORD"))
        {
            config.credentials = Some(Credentials::new(user, password));
        }
        if let Some(flag) = lookup("STARVERS_SKIP_CONNECTION_TEST") {
            config.skip_connection_test = parse_flag("STARVERS_SKIP_CONNECTION_TEST", &flag)?;
        }
        if let Some(dir) = lookup("STARVERS_TEMPLATE_DIR") {
            config.template_dir = Some(PathBuf::from(dir));
        }
        if let Some(size) = lookup("STARVERS_CHUNK_SIZE") {
            config.chunk_size = parse_number("STARVERS_CHUNK_SIZE", &size)?;
            if config.chunk_size == 0 {
                return Err(StarversError::Config(
                    "STARVERS_CHUNK_SIZE must be at least 1".to_string(),
                ));
            }
        }
        if let Some(secs) = lookup("STARVERS_TIMEOUT_SECS") {
            config.timeout_secs = Some(parse_number("STARVERS_TIMEOUT_SECS", &secs)?);
        }
        Ok(config)
    }
}

fn statements_endpoint(query_endpoint: &str) -> String {
    format!("{}/statements", query_endpoint.trim_end_matches('/'))
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(StarversError::Config(format!(
            "{key}: expected a boolean, got {other:?}"
        ))),
    }
}

fn parse_number<N: std::str::FromStr>(key: &str, value: &str) -> Result<N> {
    value
        .trim()
        .parse()
        .map_err(|_| StarversError::Config(format!("{key}: expected a number, got {value:?}")))
}
