//! Configuration file support for gtodo.
//!
//! Sources, later ones overriding earlier ones:
//! 1. Built-in defaults
//! 2. `~/.config/gtodo/config.toml`
//! 3. `./gtodo.toml`
//! 4. Environment variables prefixed with `GTODO_`, e.g. `GTODO_QUERY__REPO_PATH`
//! 5. CLI flags (applied by the binary)
//!
//! Example config file:
//! ```toml
//! [database]
//! path = ".gtodo/cache.db"
//!
//! [remote]
//! base_url = "https://gitee.com"
//! timeout_secs = 30
//! access_token = "..."
//!
//! [paging]
//! page_size = 20
//! initial_load_size = 60
//!
//! [query]
//! repo_path = "owner/repo"
//! labels = ["home", "errand"]
//! state = "open"
//! direction = "desc"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use config::{Config as ConfigBuilder, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

use crate::query::{QueryParams, NO_REPOSITORY};
use crate::remote::gitee::GITEE_HOST;
use crate::types::{SortDirection, TodoState};

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub remote: RemoteConfig,
    pub paging: PagingConfig,
    pub query: QueryConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".gtodo").join("cache.db"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub base_url: String,
    /// Connect and read timeout for each page request.
    pub timeout_secs: u64,
    pub access_token: Option<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: GITEE_HOST.to_string(),
            timeout_secs: 30,
            access_token: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PagingConfig {
    /// Rows per APPEND.
    pub page_size: u32,
    /// Rows for the first page of a REFRESH; a whole multiple of `page_size`.
    pub initial_load_size: u32,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            initial_load_size: 60,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub repo_path: String,
    pub labels: Vec<String>,
    pub state: Option<TodoState>,
    pub direction: SortDirection,
    pub created_at: Option<String>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            repo_path: NO_REPOSITORY.to_string(),
            labels: Vec::new(),
            state: None,
            direction: SortDirection::default(),
            created_at: None,
        }
    }
}

impl Config {
    /// Load the layered configuration, falling back to defaults on error.
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(home) = std::env::var_os("HOME") {
            let user_config = PathBuf::from(home).join(".config/gtodo/config.toml");
            if user_config.exists() {
                log::debug!("Loading config from {:?}", user_config);
                builder = builder.add_source(
                    File::from(user_config)
                        .format(FileFormat::Toml)
                        .required(false),
                );
            }
        }

        let local_config = PathBuf::from("gtodo.toml");
        if local_config.exists() {
            log::debug!("Loading config from ./gtodo.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        builder = builder.add_source(Self::environment());

        match builder.build().and_then(|settings| settings.try_deserialize::<Config>()) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Failed to load config, using defaults: {}", e);
                Config::default()
            }
        }
    }

    /// Parse configuration from a TOML string, without other sources.
    pub fn from_toml(toml_content: &str) -> Result<Self, ConfigError> {
        ConfigBuilder::builder()
            .add_source(File::from_str(toml_content, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    // `GTODO_QUERY__REPO_PATH` -> query.repo_path
    fn environment() -> Environment {
        Environment::with_prefix("GTODO")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("query.labels")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.remote.timeout_secs.max(1))
    }

    /// Query parameters for the sync session described by this config.
    pub fn query_params(&self) -> QueryParams {
        QueryParams {
            repo_path: self.query.repo_path.clone(),
            labels: self.query.labels.clone(),
            state: self.query.state,
            direction: self.query.direction,
            created_at: self.query.created_at.clone(),
            access_token: self.remote.access_token.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_select_no_repository() {
        let config = Config::default();
        assert_eq!(config.query.repo_path, NO_REPOSITORY);
        assert_eq!(config.remote.base_url, "https://gitee.com");
        assert_eq!(config.paging.page_size, 20);
        assert_eq!(config.paging.initial_load_size, 60);
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn toml_overrides_defaults_per_key() {
        let config = Config::from_toml(
            r#"
            [remote]
            access_token = "abc"

            [paging]
            page_size = 50

            [query]
            repo_path = "octo/tasks"
            labels = ["home", "errand"]
            state = "progressing"
            direction = "asc"
            "#,
        )
        .unwrap();

        assert_eq!(config.paging.page_size, 50);
        assert_eq!(config.paging.initial_load_size, 60);
        assert_eq!(config.remote.base_url, "https://gitee.com");

        let query = config.query_params();
        assert_eq!(query.repo_path, "octo/tasks");
        assert_eq!(query.labels, vec!["home", "errand"]);
        assert_eq!(query.state, Some(TodoState::Progressing));
        assert_eq!(query.direction, SortDirection::Asc);
        assert_eq!(query.access_token.as_deref(), Some("abc"));
    }

    #[test]
    fn invalid_toml_is_an_error() {
        assert!(Config::from_toml("[paging\npage_size = ").is_err());
    }

    #[test]
    fn zero_timeout_is_clamped() {
        let mut config = Config::default();
        config.remote.timeout_secs = 0;
        assert_eq!(config.timeout(), Duration::from_secs(1));
    }
}
