//! Provider configuration sources
//!
//! Each setting comes from the provider block, then the environment, then the
//! config file. Whatever is still missing may be derived from the API token
//! later on.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ENV_API_TOKEN: &str = "METAL_STACK_CLOUD_API_TOKEN";
pub const ENV_API_URL: &str = "METAL_STACK_CLOUD_API_URL";
pub const ENV_PROJECT: &str = "METAL_STACK_CLOUD_PROJECT";
pub const ENV_ORGANIZATION: &str = "METAL_STACK_CLOUD_ORGANIZATION";
pub const ENV_CONFIG: &str = "METAL_STACK_CLOUD_CONFIG";

const CONFIG_DIR: &str = "metal-stack-cloud";
const CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file path set explicitly, but unreadable: {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config {path} file unreadable: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{0}")]
    InvalidToken(String),
}

/// Settings gathered from one source, unset values are None
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Settings {
    pub api_token: Option<String>,
    pub api_url: Option<String>,
    pub project: Option<String>,
    pub organization: Option<String>,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            api_token: env_value(ENV_API_TOKEN),
            api_url: env_value(ENV_API_URL),
            project: env_value(ENV_PROJECT),
            organization: env_value(ENV_ORGANIZATION),
        }
    }

    /// Read a YAML config file with kebab-case keys
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: Settings =
            serde_yaml::from_str(&raw).map_err(|source| ConfigError::Invalid {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(settings.normalized())
    }

    /// Fill every unset value from `fallback`
    pub fn or(self, fallback: Settings) -> Settings {
        Settings {
            api_token: self.api_token.or(fallback.api_token),
            api_url: self.api_url.or(fallback.api_url),
            project: self.project.or(fallback.project),
            organization: self.organization.or(fallback.organization),
        }
    }

    fn normalized(self) -> Self {
        let keep = |value: Option<String>| value.filter(|v| !v.is_empty());
        Settings {
            api_token: keep(self.api_token),
            api_url: keep(self.api_url),
            project: keep(self.project),
            organization: keep(self.organization),
        }
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Candidate locations searched when no explicit config file is given
pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![Path::new("/etc").join(CONFIG_DIR).join(CONFIG_FILE)];
    match std::env::var_os("HOME") {
        Some(home) => paths.push(
            PathBuf::from(home)
                .join(format!(".{}", CONFIG_DIR))
                .join(CONFIG_FILE),
        ),
        None => tracing::debug!("unable to figure out user home directory, skipping config lookup path"),
    }
    paths.push(PathBuf::from(".").join(CONFIG_FILE));
    paths
}

/// Settings from the config file, if there is one
///
/// An explicit path from `METAL_STACK_CLOUD_CONFIG` must be readable. Without
/// one, the first existing file among [`config_search_paths`] is used.
pub fn load_config_file() -> Result<Settings, ConfigError> {
    if let Some(explicit) = env_value(ENV_CONFIG) {
        return Settings::from_file(Path::new(&explicit));
    }

    for path in config_search_paths() {
        if path.is_file() {
            tracing::debug!(path = %path.display(), "using config file");
            return Settings::from_file(&path);
        }
    }

    Ok(Settings::default())
}

/// Provider block values merged with the environment and config file
pub fn resolve(block: Settings) -> Result<Settings, ConfigError> {
    let env = Settings::from_env();
    let file = load_config_file()?;
    Ok(block.normalized().or(env).or(file))
}

/// Defaults implied by the subjects a token is scoped to
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopeDefaults {
    pub project: Option<String>,
    pub organization: Option<String>,
}

/// Projects are UUID subjects. Anything else except `*` is an organization.
/// A default is only picked when it is unambiguous.
pub fn scope_defaults(subjects: &[&str]) -> ScopeDefaults {
    let mut projects = Vec::new();
    let mut organizations = Vec::new();
    for subject in subjects {
        if uuid::Uuid::parse_str(subject).is_ok() {
            projects.push(subject.to_string());
        } else if *subject != "*" && !subject.is_empty() {
            organizations.push(subject.to_string());
        }
    }

    let single = |mut values: Vec<String>| {
        if values.len() == 1 {
            values.pop()
        } else {
            None
        }
    };

    ScopeDefaults {
        project: single(projects),
        organization: single(organizations),
    }
}
