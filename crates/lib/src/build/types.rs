//! Build definition and build resource types.
//!
//! Field names follow the service's camelCase JSON schema so the same types
//! serve the REST API and `cloudbuild.yaml` documents.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::duration;
use crate::substitution::{self, SubstitutionError, Substitutions};

/// `waitFor` value meaning "start as soon as the build starts".
pub const START_IMMEDIATELY: &str = "-";

/// Errors raised when a build definition is structurally invalid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
  #[error("build has no steps")]
  NoSteps,

  #[error("step {index} does not name an image")]
  MissingImage { index: usize },

  #[error("duplicate step id '{0}'")]
  DuplicateStepId(String),

  #[error("step {index} waits for unknown step id '{wait_for}'")]
  UnknownWaitFor { index: usize, wait_for: String },

  #[error("artifact location '{0}' must be a gs:// URI")]
  InvalidArtifactLocation(String),

  #[error(transparent)]
  Substitution(#[from] SubstitutionError),
}

/// A single containerized step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
  /// Container image that runs the step.
  pub name: String,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub args: Vec<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<String>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub wait_for: Vec<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub entrypoint: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub dir: Option<String>,

  /// `KEY=VALUE` pairs.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub env: Vec<String>,

  /// Names of secret environment variables.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub secret_env: Vec<String>,

  #[serde(default, skip_serializing_if = "Option::is_none", with = "duration::option")]
  pub timeout: Option<Duration>,
}

impl Step {
  pub fn new(image: impl Into<String>) -> Self {
    Self {
      name: image.into(),
      ..Default::default()
    }
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args = args.into_iter().map(Into::into).collect();
    self
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn id(mut self, id: impl Into<String>) -> Self {
    self.id = Some(id.into());
    self
  }

  pub fn wait_for(mut self, id: impl Into<String>) -> Self {
    self.wait_for.push(id.into());
    self
  }

  /// Run concurrently with everything before it.
  pub fn start_immediately(self) -> Self {
    self.wait_for(START_IMMEDIATELY)
  }

  pub fn entrypoint(mut self, entrypoint: impl Into<String>) -> Self {
    self.entrypoint = Some(entrypoint.into());
    self
  }

  pub fn dir(mut self, dir: impl Into<String>) -> Self {
    self.dir = Some(dir.into());
    self
  }

  pub fn env(mut self, key: &str, value: &str) -> Self {
    self.env.push(format!("{key}={value}"));
    self
  }

  pub fn secret_env(mut self, name: impl Into<String>) -> Self {
    self.secret_env.push(name.into());
    self
  }

  pub fn timeout(mut self, timeout: Duration) -> Self {
    self.timeout = Some(timeout);
    self
  }
}

/// Objects uploaded to storage once all steps succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactObjects {
  /// Destination, `gs://bucket/prefix/`.
  pub location: String,

  /// Local path patterns, relative to the workspace.
  #[serde(default)]
  pub paths: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifacts {
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub images: Vec<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub objects: Option<ArtifactObjects>,
}

impl Artifacts {
  pub fn objects<I, S>(location: impl Into<String>, paths: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      images: Vec::new(),
      objects: Some(ArtifactObjects {
        location: location.into(),
        paths: paths.into_iter().map(Into::into).collect(),
      }),
    }
  }
}

/// Revision of a source repository; exactly one is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Revision {
  BranchName(String),
  TagName(String),
  CommitSha(String),
}

/// A storage object holding a gzipped tarball of the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSource {
  pub bucket: String,
  pub object: String,
}

/// A Cloud Source Repositories revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoSource {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub project_id: Option<String>,

  pub repo_name: String,

  #[serde(flatten)]
  pub revision: Revision,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub dir: Option<String>,
}

impl RepoSource {
  pub fn new(repo_name: impl Into<String>, revision: Revision) -> Self {
    Self {
      project_id: None,
      repo_name: repo_name.into(),
      revision,
      dir: None,
    }
  }
}

/// A revision of any Git repository reachable by URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitSource {
  pub url: String,

  /// Branch, tag or commit; the default branch when unset.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub revision: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub dir: Option<String>,
}

/// Where the build's source comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceReference {
  StorageSource(StorageSource),
  RepoSource(RepoSource),
  GitSource(GitSource),
  /// Source kinds without a typed variant (connected repositories,
  /// storage manifests), kept as the service sent them.
  #[serde(untagged)]
  Other(serde_json::Map<String, serde_json::Value>),
}

impl SourceReference {
  pub fn storage(bucket: impl Into<String>, object: impl Into<String>) -> Self {
    SourceReference::StorageSource(StorageSource {
      bucket: bucket.into(),
      object: object.into(),
    })
  }

  pub fn repo(repo_name: impl Into<String>, revision: Revision) -> Self {
    SourceReference::RepoSource(RepoSource::new(repo_name, revision))
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubstitutionOption {
  MustMatch,
  AllowLoose,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildOptions {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub machine_type: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub logging: Option<String>,

  /// The service reports this int64 as a JSON string.
  #[serde(
    default,
    rename = "diskSizeGb",
    skip_serializing_if = "Option::is_none",
    deserialize_with = "deserialize_disk_size"
  )]
  pub disk_size_gb: Option<u64>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub substitution_option: Option<SubstitutionOption>,

  #[serde(default, skip_serializing_if = "std::ops::Not::not")]
  pub dynamic_substitutions: bool,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub env: Vec<String>,
}

fn deserialize_disk_size<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
  D: serde::Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Int64 {
    Number(u64),
    Text(String),
  }

  match Option::<Int64>::deserialize(deserializer)? {
    None => Ok(None),
    Some(Int64::Number(n)) => Ok(Some(n)),
    Some(Int64::Text(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
  }
}

/// The full, declarative description of a build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildDefinition {
  #[serde(default)]
  pub steps: Vec<Step>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub images: Vec<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub artifacts: Option<Artifacts>,

  #[serde(default, skip_serializing_if = "Substitutions::is_empty")]
  pub substitutions: Substitutions,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub source: Option<SourceReference>,

  #[serde(default, skip_serializing_if = "Option::is_none", with = "duration::option")]
  pub timeout: Option<Duration>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub options: Option<BuildOptions>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub tags: Vec<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub logs_bucket: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub service_account: Option<String>,
}

impl BuildDefinition {
  pub fn builder() -> super::builder::BuildDefinitionBuilder {
    super::builder::BuildDefinitionBuilder::new()
  }

  /// Structural validation. Nothing here is checked against the remote schema.
  pub fn validate(&self) -> Result<(), DefinitionError> {
    if self.steps.is_empty() {
      return Err(DefinitionError::NoSteps);
    }

    let mut seen_ids = HashSet::new();
    for (index, step) in self.steps.iter().enumerate() {
      if step.name.trim().is_empty() {
        return Err(DefinitionError::MissingImage { index });
      }

      // waitFor may only reference steps declared earlier
      for wait_for in &step.wait_for {
        if wait_for != START_IMMEDIATELY && !seen_ids.contains(wait_for.as_str()) {
          return Err(DefinitionError::UnknownWaitFor {
            index,
            wait_for: wait_for.clone(),
          });
        }
      }

      if let Some(id) = &step.id {
        if !seen_ids.insert(id.as_str()) {
          return Err(DefinitionError::DuplicateStepId(id.clone()));
        }
      }
    }

    if let Some(objects) = self.artifacts.as_ref().and_then(|a| a.objects.as_ref()) {
      if !objects.location.starts_with("gs://") {
        return Err(DefinitionError::InvalidArtifactLocation(objects.location.clone()));
      }
    }

    self.substitutions.validate()?;

    let loose = self.substitution_mode().allow_loose;
    match self.unresolved_substitutions()?.into_iter().next() {
      Some(name) if !loose => Err(SubstitutionError::Unresolved(name).into()),
      _ => Ok(()),
    }
  }

  /// Substitution rules selected by `options`.
  pub fn substitution_mode(&self) -> substitution::Mode {
    let options = self.options.as_ref();
    substitution::Mode {
      allow_loose: options.and_then(|o| o.substitution_option) == Some(SubstitutionOption::AllowLoose),
      dynamic: options.is_some_and(|o| o.dynamic_substitutions),
    }
  }

  /// Non-builtin references with no declared value, deduplicated, in order
  /// of first appearance.
  pub fn unresolved_substitutions(&self) -> Result<Vec<String>, SubstitutionError> {
    let mode = self.substitution_mode();
    let mut missing: Vec<String> = Vec::new();
    for text in self.texts() {
      for name in substitution::references_with(text, mode)? {
        if !substitution::is_builtin(&name) && !self.substitutions.contains_key(&name) && !missing.contains(&name)
        {
          missing.push(name);
        }
      }
    }
    Ok(missing)
  }

  /// A copy with every user substitution inlined and the mapping cleared.
  ///
  /// With dynamic substitutions the mapping is kept: the service still
  /// evaluates the remaining bash expansions against it.
  pub fn resolved(&self) -> Result<BuildDefinition, SubstitutionError> {
    let mode = self.substitution_mode();
    let mut resolved = self.clone();
    let subs = if mode.dynamic {
      self.substitutions.clone()
    } else {
      std::mem::take(&mut resolved.substitutions)
    };
    resolved.try_for_each_text_mut(|text| -> Result<(), SubstitutionError> {
      *text = substitution::substitute_with(text, &subs, mode)?;
      Ok(())
    })?;
    Ok(resolved)
  }

  /// Every string field that the service runs substitution over.
  fn texts(&self) -> Vec<&str> {
    let mut texts = Vec::new();
    for step in &self.steps {
      texts.push(step.name.as_str());
      texts.extend(step.args.iter().map(String::as_str));
      texts.extend(step.env.iter().map(String::as_str));
      texts.extend(step.entrypoint.as_deref());
      texts.extend(step.dir.as_deref());
    }
    texts.extend(self.images.iter().map(String::as_str));
    texts.extend(self.tags.iter().map(String::as_str));
    if let Some(artifacts) = &self.artifacts {
      texts.extend(artifacts.images.iter().map(String::as_str));
      if let Some(objects) = &artifacts.objects {
        texts.push(objects.location.as_str());
        texts.extend(objects.paths.iter().map(String::as_str));
      }
    }
    texts
  }

  fn try_for_each_text_mut<E>(&mut self, mut f: impl FnMut(&mut String) -> Result<(), E>) -> Result<(), E> {
    for step in &mut self.steps {
      f(&mut step.name)?;
      for text in step.args.iter_mut().chain(step.env.iter_mut()) {
        f(text)?;
      }
      for text in step.entrypoint.iter_mut().chain(step.dir.iter_mut()) {
        f(text)?;
      }
    }
    for text in self.images.iter_mut().chain(self.tags.iter_mut()) {
      f(text)?;
    }
    if let Some(artifacts) = &mut self.artifacts {
      for text in artifacts.images.iter_mut() {
        f(text)?;
      }
      if let Some(objects) = &mut artifacts.objects {
        f(&mut objects.location)?;
        for text in objects.paths.iter_mut() {
          f(text)?;
        }
      }
    }
    Ok(())
  }
}

/// Lifecycle state of a remote build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildStatus {
  Pending,
  Queued,
  Working,
  Success,
  Failure,
  InternalError,
  Timeout,
  Cancelled,
  Expired,
  #[serde(other)]
  StatusUnknown,
}

impl BuildStatus {
  /// Terminal states never transition again.
  pub fn is_terminal(self) -> bool {
    matches!(
      self,
      BuildStatus::Success
        | BuildStatus::Failure
        | BuildStatus::InternalError
        | BuildStatus::Timeout
        | BuildStatus::Cancelled
        | BuildStatus::Expired
    )
  }

  pub fn is_success(self) -> bool {
    self == BuildStatus::Success
  }

  pub fn as_str(self) -> &'static str {
    match self {
      BuildStatus::Pending => "PENDING",
      BuildStatus::Queued => "QUEUED",
      BuildStatus::Working => "WORKING",
      BuildStatus::Success => "SUCCESS",
      BuildStatus::Failure => "FAILURE",
      BuildStatus::InternalError => "INTERNAL_ERROR",
      BuildStatus::Timeout => "TIMEOUT",
      BuildStatus::Cancelled => "CANCELLED",
      BuildStatus::Expired => "EXPIRED",
      BuildStatus::StatusUnknown => "STATUS_UNKNOWN",
    }
  }
}

impl fmt::Display for BuildStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuiltImage {
  pub name: String,
  #[serde(default)]
  pub digest: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildResults {
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub images: Vec<BuiltImage>,

  /// `gs://` path of the JSON manifest listing uploaded artifacts.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub artifact_manifest: Option<String>,
}

/// A build as reported by the service. Only ever replaced by a re-fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
  pub id: String,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub project_id: Option<String>,

  pub status: BuildStatus,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub status_detail: Option<String>,

  #[serde(flatten)]
  pub definition: BuildDefinition,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub log_url: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub create_time: Option<DateTime<Utc>>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub start_time: Option<DateTime<Utc>>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub finish_time: Option<DateTime<Utc>>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub results: Option<BuildResults>,
}

impl Build {
  pub fn is_terminal(&self) -> bool {
    self.status.is_terminal()
  }

  /// `gs://` location artifacts were uploaded to, if the build declared any.
  pub fn artifact_location(&self) -> Option<&str> {
    self
      .definition
      .artifacts
      .as_ref()
      .and_then(|a| a.objects.as_ref())
      .map(|o| o.location.as_str())
  }

  /// Wall-clock duration, once the build has started.
  pub fn elapsed(&self) -> Option<chrono::Duration> {
    let start = self.start_time?;
    let end = self.finish_time.unwrap_or_else(Utc::now);
    Some(end - start)
  }
}
