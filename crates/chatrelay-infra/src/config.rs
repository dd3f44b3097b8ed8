//! Configuration loading for chatrelay.
//!
//! Two sources:
//! - `chatrelay.toml` (optional) deserialized into [`ServiceConfig`], with
//!   defaults when the file is missing or malformed.
//! - Environment variables holding endpoints and credentials, collected into
//!   [`AppSecrets`]. Secret values are wrapped in [`SecretString`] and never
//!   logged.

use std::path::Path;

use chatrelay_types::config::ServiceConfig;
use chatrelay_types::error::ConfigError;
use secrecy::SecretString;

use crate::sqlite::pool::DEFAULT_SQLITE_URL;

/// Entra ID authority used when `AZURE_AUTHORITY_HOST` is unset.
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Load the service configuration from `path`.
///
/// - If the file does not exist, returns [`ServiceConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
pub async fn load_service_config(path: &Path) -> ServiceConfig {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return ServiceConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", path.display());
            return ServiceConfig::default();
        }
    };

    match toml::from_str::<ServiceConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", path.display());
            ServiceConfig::default()
        }
    }
}

/// Credentials and endpoint for the hosted agent runtime.
#[derive(Debug, Clone)]
pub struct FoundrySettings {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: SecretString,
    /// Project endpoint, e.g. `https://<resource>.services.ai.azure.com/api/projects/<project>`.
    pub project_endpoint: String,
    pub authority_host: String,
}

/// Cosmos DB account settings.
#[derive(Debug, Clone)]
pub struct CosmosSettings {
    pub uri: String,
    pub key: SecretString,
    pub database: String,
    /// Checked on first use rather than at startup.
    pub container: Option<String>,
}

/// Retrieval (search) service settings.
#[derive(Debug, Clone)]
pub struct RetrievalSettings {
    pub endpoint: String,
    pub access_code: Option<SecretString>,
}

/// Which document store backs persistence.
#[derive(Debug, Clone)]
pub enum StoreSettings {
    Cosmos(CosmosSettings),
    Sqlite { url: String },
}

/// Everything read from the environment at startup.
#[derive(Debug, Clone)]
pub struct AppSecrets {
    pub foundry: FoundrySettings,
    pub store: StoreSettings,
    /// `None` disables prompt enrichment.
    pub retrieval: Option<RetrievalSettings>,
}

impl AppSecrets {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let require = |name: &'static str| get(name).ok_or(ConfigError::MissingVar(name));

        let foundry = FoundrySettings {
            tenant_id: require("AZURE_TENANT_ID")?,
            client_id: require("AZURE_CLIENT_ID")?,
            client_secret: SecretString::from(require("AZURE_CLIENT_SECRET")?),
            project_endpoint: require("AI_PROJECT_ENDPOINT")?,
            authority_host: get("AZURE_AUTHORITY_HOST")
                .unwrap_or_else(|| DEFAULT_AUTHORITY_HOST.to_string()),
        };

        let cosmos = || -> Result<StoreSettings, ConfigError> {
            Ok(StoreSettings::Cosmos(CosmosSettings {
                uri: require("AZURE_COSMOS_DB_URI")?,
                key: SecretString::from(require("AZURE_COSMOS_DB_KEY")?),
                database: require("AZURE_COSMOS_DB_NAME")?,
                container: get("AZURE_COSMOS_DB_CONTAINER"),
            }))
        };
        let sqlite = || StoreSettings::Sqlite {
            url: get("CHATRELAY_SQLITE_URL").unwrap_or_else(|| DEFAULT_SQLITE_URL.to_string()),
        };

        let store = match get("CHATRELAY_STORE").map(|v| v.to_lowercase()).as_deref() {
            Some("cosmos") => cosmos()?,
            Some("sqlite") => sqlite(),
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "CHATRELAY_STORE",
                    reason: format!("expected 'cosmos' or 'sqlite', got '{other}'"),
                });
            }
            None if get("AZURE_COSMOS_DB_URI").is_some() => cosmos()?,
            None => sqlite(),
        };

        // FUCTION_ENDPOINT / FUNCTION_KEY are the names older deployments use.
        let retrieval = get("RETRIEVAL_ENDPOINT")
            .or_else(|| get("FUCTION_ENDPOINT"))
            .map(|endpoint| RetrievalSettings {
                endpoint,
                access_code: get("RETRIEVAL_ACCESS_CODE")
                    .or_else(|| get("FUNCTION_KEY"))
                    .map(SecretString::from),
            });

        Ok(Self {
            foundry,
            store,
            retrieval,
        })
    }
}
