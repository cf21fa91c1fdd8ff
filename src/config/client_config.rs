use crate::utils::error::{Error, Result};
use crate::utils::validation::{validate_non_empty_string, validate_range, validate_url, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 60;

/// The four services this crate carries clients for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    BigQuery,
    Datastore,
    PubSub,
    RuntimeConfig,
}

impl ServiceKind {
    pub fn default_endpoint(self) -> &'static str {
        match self {
            ServiceKind::BigQuery => "https://bigquery.googleapis.com/bigquery/v2/",
            ServiceKind::Datastore => "https://datastore.googleapis.com/v1/",
            ServiceKind::PubSub => "https://pubsub.googleapis.com/v1/",
            ServiceKind::RuntimeConfig => "https://runtimeconfig.googleapis.com/v1beta1/",
        }
    }

    /// Environment variable naming a local emulator (`host:port`).
    pub fn emulator_env_var(self) -> Option<&'static str> {
        match self {
            ServiceKind::BigQuery => Some("BIGQUERY_EMULATOR_HOST"),
            ServiceKind::Datastore => Some("DATASTORE_EMULATOR_HOST"),
            ServiceKind::PubSub => Some("PUBSUB_EMULATOR_HOST"),
            ServiceKind::RuntimeConfig => None,
        }
    }

    fn api_path(self) -> &'static str {
        match self {
            ServiceKind::BigQuery => "bigquery/v2/",
            ServiceKind::Datastore | ServiceKind::PubSub => "v1/",
            ServiceKind::RuntimeConfig => "v1beta1/",
        }
    }

    fn field_name(self) -> &'static str {
        match self {
            ServiceKind::BigQuery => "endpoints.bigquery",
            ServiceKind::Datastore => "endpoints.datastore",
            ServiceKind::PubSub => "endpoints.pubsub",
            ServiceKind::RuntimeConfig => "endpoints.runtimeconfig",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Endpoints {
    pub bigquery: Option<String>,
    pub datastore: Option<String>,
    pub pubsub: Option<String>,
    pub runtimeconfig: Option<String>,
}

impl Endpoints {
    fn get(&self, service: ServiceKind) -> Option<&String> {
        match service {
            ServiceKind::BigQuery => self.bigquery.as_ref(),
            ServiceKind::Datastore => self.datastore.as_ref(),
            ServiceKind::PubSub => self.pubsub.as_ref(),
            ServiceKind::RuntimeConfig => self.runtimeconfig.as_ref(),
        }
    }

    fn set(&mut self, service: ServiceKind, endpoint: String) {
        let slot = match service {
            ServiceKind::BigQuery => &mut self.bigquery,
            ServiceKind::Datastore => &mut self.datastore,
            ServiceKind::PubSub => &mut self.pubsub,
            ServiceKind::RuntimeConfig => &mut self.runtimeconfig,
        };
        *slot = Some(endpoint);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub project_id: String,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub endpoints: Endpoints,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

fn default_user_agent() -> String {
    format!("cloud-iface/{}", env!("CARGO_PKG_VERSION"))
}

impl ClientConfig {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            access_token: None,
            location: None,
            endpoints: Endpoints::default(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            user_agent: default_user_agent(),
        }
    }

    pub fn with_endpoint(mut self, service: ServiceKind, endpoint: impl Into<String>) -> Self {
        self.endpoints.set(service, endpoint.into());
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// Parses TOML, expanding `${VAR}` references from the environment first.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content)?;
        toml::from_str(&processed).map_err(|e| Error::Config {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Builds a config from `GOOGLE_CLOUD_PROJECT`, `GOOGLE_OAUTH_ACCESS_TOKEN`
    /// and the services' emulator host variables.
    pub fn from_env() -> Result<Self> {
        let project_id = std::env::var("GOOGLE_CLOUD_PROJECT").map_err(|_| Error::Config {
            message: "GOOGLE_CLOUD_PROJECT environment variable is required".to_string(),
        })?;

        let mut config = Self::new(project_id);
        config.access_token = std::env::var("GOOGLE_OAUTH_ACCESS_TOKEN").ok();
        config.location = std::env::var("GOOGLE_CLOUD_LOCATION").ok();
        if let Ok(timeout) = std::env::var("CLOUD_IFACE_TIMEOUT_SECONDS") {
            config.timeout_seconds = timeout.parse().map_err(|_| Error::InvalidConfigValue {
                field: "CLOUD_IFACE_TIMEOUT_SECONDS".to_string(),
                value: timeout.clone(),
                reason: "expected a whole number of seconds".to_string(),
            })?;
        }

        for service in [
            ServiceKind::BigQuery,
            ServiceKind::Datastore,
            ServiceKind::PubSub,
            ServiceKind::RuntimeConfig,
        ] {
            let Some(var) = service.emulator_env_var() else {
                continue;
            };
            if let Ok(host) = std::env::var(var) {
                tracing::info!("Using {} emulator at {}", var, host);
                config
                    .endpoints
                    .set(service, format!("http://{}/{}", host, service.api_path()));
            }
        }

        Ok(config)
    }

    /// Base URL for a service: the configured override, else the public endpoint.
    /// Always ends with a `/` so relative REST paths join under it.
    pub fn endpoint(&self, service: ServiceKind) -> String {
        let endpoint = self
            .endpoints
            .get(service)
            .cloned()
            .unwrap_or_else(|| service.default_endpoint().to_string());
        if endpoint.ends_with('/') {
            endpoint
        } else {
            format!("{}/", endpoint)
        }
    }

    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| Error::Config {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }
}

impl Validate for ClientConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("project_id", &self.project_id)?;
        validate_range("timeout_seconds", self.timeout_seconds, 1, 3600)?;
        for service in [
            ServiceKind::BigQuery,
            ServiceKind::Datastore,
            ServiceKind::PubSub,
            ServiceKind::RuntimeConfig,
        ] {
            if let Some(endpoint) = self.endpoints.get(service) {
                validate_url(service.field_name(), endpoint)?;
            }
        }
        Ok(())
    }
}
