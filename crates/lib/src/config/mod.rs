//! Client configuration.
//!
//! Every client operation receives an explicit [`Context`] carrying the target
//! project, optional region, bearer credentials and API endpoints. There is no
//! process-wide authentication state.
//!
//! [`Settings`] gathers the same values from layered sources, highest
//! precedence first:
//!
//! 1. explicit overrides (e.g. command line flags)
//! 2. environment variables (`GCB_PROJECT`, `GCB_REGION`, `GCB_ACCESS_TOKEN`, ...)
//! 3. the JSON settings file at `{config_dir}/config.json`

pub mod paths;

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::{self, env};

/// Errors that can occur while assembling a client context.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("no project configured (set --project or {})", env::PROJECT)]
  MissingProject,

  #[error("no access token configured (set --token or {})", env::ACCESS_TOKEN)]
  MissingToken,

  #[error("failed to read settings file '{path}': {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse settings file '{path}': {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}

/// Bearer credentials obtained by an external credential provider.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
  token: String,
}

impl Credentials {
  pub fn bearer(token: impl Into<String>) -> Self {
    Self { token: token.into() }
  }

  pub fn token(&self) -> &str {
    &self.token
  }
}

impl fmt::Debug for Credentials {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Credentials").field("token", &"<redacted>").finish()
  }
}

/// Base URLs of the remote services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
  pub cloudbuild: String,
  pub storage: String,
}

impl Default for Endpoints {
  fn default() -> Self {
    Self {
      cloudbuild: consts::CLOUDBUILD_ENDPOINT.to_string(),
      storage: consts::STORAGE_ENDPOINT.to_string(),
    }
  }
}

impl Endpoints {
  /// Point both services at the same base URL (useful against a local mock server).
  pub fn single(base: impl Into<String>) -> Self {
    let base = base.into();
    Self {
      cloudbuild: format!("{}/v1", base.trim_end_matches('/')),
      storage: base,
    }
  }
}

/// Everything a client operation needs to address the remote service.
#[derive(Debug, Clone)]
pub struct Context {
  pub project: String,
  pub region: Option<String>,
  pub credentials: Credentials,
  pub endpoints: Endpoints,
}

impl Context {
  pub fn new(project: impl Into<String>, credentials: Credentials) -> Self {
    Self {
      project: project.into(),
      region: None,
      credentials,
      endpoints: Endpoints::default(),
    }
  }

  pub fn with_region(mut self, region: impl Into<String>) -> Self {
    self.region = Some(region.into());
    self
  }

  pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
    self.endpoints = endpoints;
    self
  }

  /// Resource parent for builds and triggers.
  ///
  /// `projects/{project}` or `projects/{project}/locations/{region}`.
  pub fn parent(&self) -> String {
    match &self.region {
      Some(region) => format!("projects/{}/locations/{}", self.project, region),
      None => format!("projects/{}", self.project),
    }
  }
}

/// Layered settings. Every field is optional until resolved into a [`Context`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct Settings {
  pub project: Option<String>,
  pub region: Option<String>,
  #[serde(skip_serializing)]
  pub token: Option<String>,
  /// Default bucket for source uploads.
  pub bucket: Option<String>,
  pub cloudbuild_endpoint: Option<String>,
  pub storage_endpoint: Option<String>,
  /// Poll interval in seconds.
  pub poll_interval: Option<u64>,
  /// Wait budget in seconds.
  pub wait_timeout: Option<u64>,
}

impl Settings {
  /// Read settings from a JSON file. A missing file yields empty settings.
  pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
    let content = match fs::read_to_string(path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
      Err(source) => {
        return Err(ConfigError::Read {
          path: path.to_path_buf(),
          source,
        });
      }
    };

    debug!(path = %path.display(), "loaded settings file");
    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  /// Read settings from the process environment.
  pub fn from_env() -> Self {
    let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
    Self {
      project: var(env::PROJECT),
      region: var(env::REGION),
      token: var(env::ACCESS_TOKEN),
      bucket: var(env::BUCKET),
      cloudbuild_endpoint: var(env::CLOUDBUILD_ENDPOINT),
      storage_endpoint: var(env::STORAGE_ENDPOINT),
      poll_interval: None,
      wait_timeout: None,
    }
  }

  /// Environment layered over the default settings file.
  pub fn load() -> Result<Self, ConfigError> {
    let file = match paths::config_file() {
      Some(path) => Self::from_file(&path)?,
      None => Self::default(),
    };
    Ok(Self::from_env().or(file))
  }

  /// Fill every unset field from `fallback`.
  pub fn or(self, fallback: Settings) -> Settings {
    Settings {
      project: self.project.or(fallback.project),
      region: self.region.or(fallback.region),
      token: self.token.or(fallback.token),
      bucket: self.bucket.or(fallback.bucket),
      cloudbuild_endpoint: self.cloudbuild_endpoint.or(fallback.cloudbuild_endpoint),
      storage_endpoint: self.storage_endpoint.or(fallback.storage_endpoint),
      poll_interval: self.poll_interval.or(fallback.poll_interval),
      wait_timeout: self.wait_timeout.or(fallback.wait_timeout),
    }
  }

  /// Configured interval; zero falls back to the default.
  pub fn poll_interval(&self) -> Duration {
    self
      .poll_interval
      .filter(|secs| *secs > 0)
      .map(Duration::from_secs)
      .unwrap_or(consts::DEFAULT_POLL_INTERVAL)
  }

  pub fn wait_timeout(&self) -> Duration {
    self
      .wait_timeout
      .map(Duration::from_secs)
      .unwrap_or(consts::DEFAULT_WAIT_TIMEOUT)
  }

  /// Resolve into a [`Context`]. Project and token are required.
  pub fn context(&self) -> Result<Context, ConfigError> {
    let project = self.project.clone().ok_or(ConfigError::MissingProject)?;
    let token = self.token.clone().ok_or(ConfigError::MissingToken)?;

    let defaults = Endpoints::default();
    let endpoints = Endpoints {
      cloudbuild: self.cloudbuild_endpoint.clone().unwrap_or(defaults.cloudbuild),
      storage: self.storage_endpoint.clone().unwrap_or(defaults.storage),
    };

    Ok(Context {
      project,
      region: self.region.clone(),
      credentials: Credentials::bearer(token),
      endpoints,
    })
  }
}
