//! Client configuration

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "PANEL";

/// Default backend API root
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/";

/// Session client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Root URL every endpoint path is resolved against
    pub base_url: String,

    /// Transport timeout in seconds; unset leaves the transport default
    pub timeout_secs: Option<u64>,

    pub user_agent: String,

    /// Directory holding the durable session file
    pub data_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: None,
            user_agent: format!("panel-client/{}", env!("CARGO_PKG_VERSION")),
            data_dir: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from defaults, an optional file and `PANEL_*`
    /// environment variables, in increasing order of precedence.
    pub fn load(path: Option<&Path>) -> CoreResult<Self> {
        let defaults = Self::default();

        let mut builder = config::Config::builder()
            .set_default("base_url", defaults.base_url)?
            .set_default("user_agent", defaults.user_agent)?;

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        let settings = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the base URL is usable
    pub fn validate(&self) -> CoreResult<()> {
        self.api_root().map(|_| ())
    }

    /// The base URL as an absolute URL ending in `/`, so relative endpoint
    /// paths resolve beneath it rather than replacing its last segment.
    pub fn api_root(&self) -> CoreResult<Url> {
        parse_api_root(&self.base_url)
    }

    /// Directory for the session file and logs
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("panel")
        })
    }

    pub fn session_file(&self) -> PathBuf {
        self.data_dir().join("session.json")
    }

    /// Write this configuration as pretty JSON
    pub fn save(&self, path: &Path) -> CoreResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Parse `base_url` into an absolute API root with a trailing slash
pub fn parse_api_root(base_url: &str) -> CoreResult<Url> {
    if base_url.trim().is_empty() {
        return Err(CoreError::invalid_config("base_url is required"));
    }

    let mut url = Url::parse(base_url)
        .map_err(|e| CoreError::invalid_config(format!("base_url {base_url:?}: {e}")))?;

    if url.cannot_be_a_base() {
        return Err(CoreError::invalid_config(format!(
            "base_url {base_url:?} cannot be used as a base"
        )));
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}
