//! Reading and writing build configuration documents.
//!
//! A configuration document is the textual form of a [`BuildDefinition`]
//! (`cloudbuild.yaml` or `cloudbuild.json`). Parsed documents go through the
//! same structural validation as the builder.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use super::types::{BuildDefinition, DefinitionError};
use crate::substitution::Substitutions;

#[derive(Debug, Error)]
pub enum ConfigFileError {
  #[error("failed to read '{path}': {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to write '{path}': {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid YAML build config: {0}")]
  Yaml(#[from] serde_yaml::Error),

  #[error("invalid JSON build config: {0}")]
  Json(#[from] serde_json::Error),

  #[error("unsupported config extension for '{0}' (expected .yaml, .yml or .json)")]
  UnsupportedFormat(PathBuf),

  #[error(transparent)]
  Invalid(#[from] DefinitionError),
}

/// Document format, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
  Yaml,
  Json,
}

impl Format {
  pub fn from_path(path: &Path) -> Result<Self, ConfigFileError> {
    match path.extension().and_then(|e| e.to_str()) {
      Some("yaml" | "yml") => Ok(Format::Yaml),
      Some("json") => Ok(Format::Json),
      _ => Err(ConfigFileError::UnsupportedFormat(path.to_path_buf())),
    }
  }
}

pub fn to_yaml(definition: &BuildDefinition) -> Result<String, ConfigFileError> {
  Ok(serde_yaml::to_string(definition)?)
}

pub fn from_yaml(input: &str) -> Result<BuildDefinition, ConfigFileError> {
  let definition: BuildDefinition = serde_yaml::from_str(input)?;
  definition.validate()?;
  Ok(definition)
}

pub fn to_json(definition: &BuildDefinition) -> Result<String, ConfigFileError> {
  Ok(serde_json::to_string_pretty(definition)?)
}

pub fn from_json(input: &str) -> Result<BuildDefinition, ConfigFileError> {
  let definition: BuildDefinition = serde_json::from_str(input)?;
  definition.validate()?;
  Ok(definition)
}

pub fn render(definition: &BuildDefinition, format: Format) -> Result<String, ConfigFileError> {
  match format {
    Format::Yaml => to_yaml(definition),
    Format::Json => to_json(definition),
  }
}

pub fn parse(input: &str, format: Format) -> Result<BuildDefinition, ConfigFileError> {
  match format {
    Format::Yaml => from_yaml(input),
    Format::Json => from_json(input),
  }
}

/// Load and validate a configuration file.
pub fn read_file(path: &Path) -> Result<BuildDefinition, ConfigFileError> {
  read_file_with(path, &Substitutions::new())
}

/// Load a configuration file, overlaying `overrides` on its declared
/// substitutions before validating.
pub fn read_file_with(path: &Path, overrides: &Substitutions) -> Result<BuildDefinition, ConfigFileError> {
  let format = Format::from_path(path)?;
  let content = fs::read_to_string(path).map_err(|source| ConfigFileError::Read {
    path: path.to_path_buf(),
    source,
  })?;
  debug!(path = %path.display(), ?format, overrides = overrides.len(), "parsing build config");

  let mut definition: BuildDefinition = match format {
    Format::Yaml => serde_yaml::from_str(&content)?,
    Format::Json => serde_json::from_str(&content)?,
  };
  definition.substitutions.merge(overrides);
  definition.validate()?;
  Ok(definition)
}

/// Write a configuration file, creating parent directories as needed.
pub fn write_file(definition: &BuildDefinition, path: &Path) -> Result<(), ConfigFileError> {
  let format = Format::from_path(path)?;
  let content = render(definition, format)?;

  let write_err = |source| ConfigFileError::Write {
    path: path.to_path_buf(),
    source,
  };
  if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
    fs::create_dir_all(parent).map_err(write_err)?;
  }
  fs::write(path, content).map_err(write_err)?;

  debug!(path = %path.display(), "wrote build config");
  Ok(())
}
