//! Builder for [`BuildDefinition`] values.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use cloudbuild_lib::build::{BuildDefinition, Step};
//!
//! let def = BuildDefinition::builder()
//!   .step(Step::new("alpine").args(["echo", "hello ${_WHO}"]))
//!   .substitution("_WHO", "world")
//!   .timeout(Duration::from_secs(120))
//!   .build()
//!   .unwrap();
//!
//! assert_eq!(def.steps.len(), 1);
//! ```

use std::time::Duration;

use super::types::{Artifacts, BuildDefinition, BuildOptions, DefinitionError, SourceReference, Step};

#[derive(Debug, Clone, Default)]
pub struct BuildDefinitionBuilder {
  definition: BuildDefinition,
}

impl BuildDefinitionBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn step(mut self, step: Step) -> Self {
    self.definition.steps.push(step);
    self
  }

  pub fn steps(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
    self.definition.steps.extend(steps);
    self
  }

  /// Image to push once the steps complete.
  pub fn image(mut self, image: impl Into<String>) -> Self {
    self.definition.images.push(image.into());
    self
  }

  pub fn images<I, S>(mut self, images: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.definition.images.extend(images.into_iter().map(Into::into));
    self
  }

  pub fn artifacts(mut self, artifacts: Artifacts) -> Self {
    self.definition.artifacts = Some(artifacts);
    self
  }

  /// Declare a user substitution. Setting a key twice keeps the last value.
  pub fn substitution(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.definition.substitutions.insert(key, value);
    self
  }

  pub fn substitutions<I, K, V>(mut self, pairs: I) -> Self
  where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
  {
    for (k, v) in pairs {
      self.definition.substitutions.insert(k, v);
    }
    self
  }

  pub fn source(mut self, source: SourceReference) -> Self {
    self.definition.source = Some(source);
    self
  }

  pub fn timeout(mut self, timeout: Duration) -> Self {
    self.definition.timeout = Some(timeout);
    self
  }

  pub fn options(mut self, options: BuildOptions) -> Self {
    self.definition.options = Some(options);
    self
  }

  pub fn tag(mut self, tag: impl Into<String>) -> Self {
    self.definition.tags.push(tag.into());
    self
  }

  pub fn logs_bucket(mut self, bucket: impl Into<String>) -> Self {
    self.definition.logs_bucket = Some(bucket.into());
    self
  }

  pub fn service_account(mut self, account: impl Into<String>) -> Self {
    self.definition.service_account = Some(account.into());
    self
  }

  /// Validate and return the definition.
  pub fn build(self) -> Result<BuildDefinition, DefinitionError> {
    self.definition.validate()?;
    Ok(self.definition)
  }
}
