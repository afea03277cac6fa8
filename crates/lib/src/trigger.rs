//! Build trigger resources.
//!
//! A [`Trigger`] pairs a build configuration (inline or a path inside the
//! repository) with the source event that starts it. The service stores the
//! event as one of several optional sub-messages; locally it is a single
//! [`TriggerEvent`] so exactly one is always set. Event kinds without a
//! typed variant (Pub/Sub, webhooks, repository events) are kept verbatim in
//! [`TriggerEvent::Other`] so listing a project never fails on them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::build::{BuildDefinition, DefinitionError};
use crate::substitution::{SubstitutionError, Substitutions};

/// Longest trigger name the service accepts.
pub const MAX_NAME_LEN: usize = 64;

#[derive(Debug, Error)]
pub enum TriggerError {
  #[error("invalid trigger name '{0}': use up to 64 letters, digits, '-' or '_', starting with a letter")]
  InvalidName(String),

  #[error("trigger '{0}' has no build configuration")]
  MissingConfig(String),

  #[error(transparent)]
  Substitution(#[from] SubstitutionError),

  #[error("invalid inline build: {0}")]
  Definition(#[from] DefinitionError),
}

/// A branch or tag pattern. Both are regular expressions on the service side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitRef {
  Branch(String),
  Tag(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommentControl {
  CommentsDisabled,
  CommentsEnabled,
  CommentsEnabledForExternalContributorsOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepoType {
  Github,
  CloudSourceRepositories,
  BitbucketServer,
  BitbucketCloud,
  Gitlab,
  #[serde(other)]
  Unknown,
}

/// What starts a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerEvent {
  /// Push to a matching branch or tag of a GitHub repository.
  GithubPush {
    owner: String,
    repo: String,
    reference: GitRef,
  },
  /// Pull request against a matching base branch.
  GithubPullRequest {
    owner: String,
    repo: String,
    branch: String,
    comment_control: Option<CommentControl>,
  },
  /// Push to a Cloud Source Repositories repository.
  SourceRepoPush { repo_name: String, reference: GitRef },
  /// Only started by an explicit run; builds `reference` of `uri`.
  Manual {
    uri: String,
    reference: String,
    repo_type: RepoType,
  },
  /// Any other event source, as the raw resource fields that describe it.
  Other(Map<String, Value>),
}

/// Build configuration used by a trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerConfig {
  Inline(BuildDefinition),
  /// Path of a config document inside the repository, e.g. `cloudbuild.yaml`.
  File(String),
  /// The service looks for `cloudbuild.yaml`, `cloudbuild.json` or a Dockerfile.
  Autodetect,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TriggerResource", into = "TriggerResource")]
pub struct Trigger {
  /// Server-assigned; empty until created.
  pub id: String,
  pub name: String,
  pub description: Option<String>,
  pub disabled: bool,
  pub config: TriggerConfig,
  pub event: TriggerEvent,
  /// Overrides applied to every build the trigger starts.
  pub substitutions: Substitutions,
  pub tags: Vec<String>,
  pub create_time: Option<DateTime<Utc>>,
}

impl Trigger {
  pub fn new(name: impl Into<String>, config: TriggerConfig, event: TriggerEvent) -> Self {
    Self {
      id: String::new(),
      name: name.into(),
      description: None,
      disabled: false,
      config,
      event,
      substitutions: Substitutions::new(),
      tags: Vec::new(),
      create_time: None,
    }
  }

  pub fn description(mut self, description: impl Into<String>) -> Self {
    self.description = Some(description.into());
    self
  }

  pub fn disabled(mut self, disabled: bool) -> Self {
    self.disabled = disabled;
    self
  }

  pub fn substitution(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.substitutions.insert(key, value);
    self
  }

  pub fn tag(mut self, tag: impl Into<String>) -> Self {
    self.tags.push(tag.into());
    self
  }

  /// Local checks before the trigger is sent: name shape, substitution keys,
  /// and the inline definition if there is one.
  pub fn validate(&self) -> Result<(), TriggerError> {
    if !is_valid_name(&self.name) {
      return Err(TriggerError::InvalidName(self.name.clone()));
    }
    self.substitutions.validate()?;
    if let TriggerConfig::Inline(definition) = &self.config {
      // Trigger overrides count as provided values for the inline definition
      let mut definition = definition.clone();
      definition.substitutions.merge(&self.substitutions);
      definition.validate()?;
    }
    Ok(())
  }

  /// Whether `needle` is this trigger's id or name.
  pub fn matches(&self, needle: &str) -> bool {
    self.id == needle || self.name == needle
  }
}

fn is_valid_name(name: &str) -> bool {
  let mut chars = name.chars();
  let Some(first) = chars.next() else {
    return false;
  };
  name.len() <= MAX_NAME_LEN
    && first.is_ascii_alphabetic()
    && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

// Wire shape of the service's BuildTrigger message.

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TriggerResource {
  #[serde(default, skip_serializing_if = "String::is_empty")]
  id: String,
  #[serde(default)]
  name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  description: Option<String>,
  #[serde(default, skip_serializing_if = "std::ops::Not::not")]
  disabled: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  build: Option<BuildDefinition>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  filename: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  git_file_source: Option<GitFileSource>,
  #[serde(default, skip_serializing_if = "std::ops::Not::not")]
  autodetect: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  github: Option<GithubEventsConfig>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  trigger_template: Option<TriggerTemplate>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  source_to_build: Option<GitRepoSource>,
  #[serde(default, skip_serializing_if = "Substitutions::is_empty")]
  substitutions: Substitutions,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  tags: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  create_time: Option<DateTime<Utc>>,
  /// Everything else, including event configs without a typed variant.
  #[serde(flatten)]
  extra: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GithubEventsConfig {
  #[serde(default)]
  owner: String,
  #[serde(default)]
  name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  push: Option<PushFilter>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pull_request: Option<PullRequestFilter>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PushFilter {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  branch: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  tag: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullRequestFilter {
  #[serde(default)]
  branch: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  comment_control: Option<CommentControl>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TriggerTemplate {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  repo_name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  branch_name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  tag_name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  commit_sha: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  project_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  dir: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GitRepoSource {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  uri: Option<String>,
  #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
  reference: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  repo_type: Option<RepoType>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  repository: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GitFileSource {
  #[serde(default)]
  path: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  uri: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  repo_type: Option<RepoType>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  revision: Option<String>,
}

impl PushFilter {
  fn from_ref(reference: GitRef) -> Self {
    match reference {
      GitRef::Branch(branch) => PushFilter {
        branch: Some(branch),
        tag: None,
      },
      GitRef::Tag(tag) => PushFilter { branch: None, tag: Some(tag) },
    }
  }

  fn to_ref(&self) -> Option<GitRef> {
    match (&self.branch, &self.tag) {
      (Some(branch), _) => Some(GitRef::Branch(branch.clone())),
      (None, Some(tag)) => Some(GitRef::Tag(tag.clone())),
      (None, None) => None,
    }
  }
}

impl TriggerTemplate {
  fn from_ref(repo_name: String, reference: GitRef) -> Self {
    let mut template = TriggerTemplate {
      repo_name: Some(repo_name),
      ..Default::default()
    };
    match reference {
      GitRef::Branch(branch) => template.branch_name = Some(branch),
      GitRef::Tag(tag) => template.tag_name = Some(tag),
    }
    template
  }

  /// Repository and ref pattern, when the template names a branch or tag.
  fn to_event(&self) -> Option<TriggerEvent> {
    let reference = match (&self.branch_name, &self.tag_name, &self.commit_sha) {
      (Some(branch), _, None) => GitRef::Branch(branch.clone()),
      (None, Some(tag), None) => GitRef::Tag(tag.clone()),
      _ => return None,
    };
    Some(TriggerEvent::SourceRepoPush {
      repo_name: self.repo_name.clone()?,
      reference,
    })
  }
}

impl From<Trigger> for TriggerResource {
  fn from(trigger: Trigger) -> Self {
    let mut resource = TriggerResource {
      id: trigger.id,
      name: trigger.name,
      description: trigger.description,
      disabled: trigger.disabled,
      substitutions: trigger.substitutions,
      tags: trigger.tags,
      create_time: trigger.create_time,
      ..Default::default()
    };

    let manual_source = match trigger.event {
      TriggerEvent::GithubPush { owner, repo, reference } => {
        resource.github = Some(GithubEventsConfig {
          owner,
          name: repo,
          push: Some(PushFilter::from_ref(reference)),
          pull_request: None,
        });
        None
      }
      TriggerEvent::GithubPullRequest {
        owner,
        repo,
        branch,
        comment_control,
      } => {
        resource.github = Some(GithubEventsConfig {
          owner,
          name: repo,
          push: None,
          pull_request: Some(PullRequestFilter { branch, comment_control }),
        });
        None
      }
      TriggerEvent::SourceRepoPush { repo_name, reference } => {
        resource.trigger_template = Some(TriggerTemplate::from_ref(repo_name, reference));
        None
      }
      TriggerEvent::Manual {
        uri,
        reference,
        repo_type,
      } => Some(GitRepoSource {
        uri: Some(uri),
        reference: Some(reference),
        repo_type: Some(repo_type),
        repository: None,
      }),
      TriggerEvent::Other(fields) => {
        resource.extra = fields;
        None
      }
    };

    match trigger.config {
      TriggerConfig::Inline(definition) => resource.build = Some(definition),
      // Manual triggers read their config file from the repository they build
      TriggerConfig::File(path) => match &manual_source {
        Some(source) => {
          resource.git_file_source = Some(GitFileSource {
            path,
            uri: source.uri.clone(),
            repo_type: source.repo_type,
            revision: source.reference.clone(),
          })
        }
        None => resource.filename = Some(path),
      },
      TriggerConfig::Autodetect => resource.autodetect = true,
    }
    resource.source_to_build = manual_source;

    resource
  }
}

impl TryFrom<TriggerResource> for Trigger {
  type Error = TriggerError;

  fn try_from(mut resource: TriggerResource) -> Result<Self, Self::Error> {
    let config = match (resource.build.take(), resource.filename.take(), &resource.git_file_source) {
      (Some(definition), _, _) => TriggerConfig::Inline(definition),
      (None, Some(path), _) => TriggerConfig::File(path),
      (None, None, Some(source)) if !source.path.is_empty() => TriggerConfig::File(source.path.clone()),
      _ if resource.autodetect => TriggerConfig::Autodetect,
      _ => return Err(TriggerError::MissingConfig(resource.name)),
    };

    let event = match known_event(&mut resource) {
      Some(event) => event,
      None => TriggerEvent::Other(unmodelled_event(&mut resource)),
    };

    Ok(Trigger {
      id: resource.id,
      name: resource.name,
      description: resource.description,
      disabled: resource.disabled,
      config,
      event,
      substitutions: resource.substitutions,
      tags: resource.tags,
      create_time: resource.create_time,
    })
  }
}

/// Resource fields that carry an event source with no typed variant.
const EVENT_CONFIG_KEYS: &[&str] = &[
  "pubsubConfig",
  "webhookConfig",
  "repositoryEventConfig",
  "gitlabEnterpriseEventsConfig",
  "bitbucketServerTriggerConfig",
];

/// Typed event, taking the fields it was read from out of `resource`.
fn known_event(resource: &mut TriggerResource) -> Option<TriggerEvent> {
  if EVENT_CONFIG_KEYS.iter().any(|key| resource.extra.contains_key(*key)) {
    return None;
  }
  if let Some(github) = &resource.github {
    let push = github.push.as_ref().and_then(PushFilter::to_ref);
    let event = match (push, &github.pull_request) {
      (Some(reference), _) => TriggerEvent::GithubPush {
        owner: github.owner.clone(),
        repo: github.name.clone(),
        reference,
      },
      (None, Some(pr)) => TriggerEvent::GithubPullRequest {
        owner: github.owner.clone(),
        repo: github.name.clone(),
        branch: pr.branch.clone(),
        comment_control: pr.comment_control,
      },
      (None, None) => return None,
    };
    resource.github = None;
    return Some(event);
  }
  if let Some(template) = &resource.trigger_template {
    let event = template.to_event()?;
    resource.trigger_template = None;
    return Some(event);
  }
  let source = resource.source_to_build.as_ref()?;
  let (Some(uri), Some(reference), Some(repo_type)) = (&source.uri, &source.reference, source.repo_type) else {
    return None;
  };
  let event = TriggerEvent::Manual {
    uri: uri.clone(),
    reference: reference.clone(),
    repo_type,
  };
  resource.source_to_build = None;
  Some(event)
}

/// Raw event fields left over after typed decoding, keyed by their wire names.
fn unmodelled_event(resource: &mut TriggerResource) -> Map<String, Value> {
  let mut fields = std::mem::take(&mut resource.extra);
  let typed = [
    ("github", resource.github.take().and_then(|v| serde_json::to_value(v).ok())),
    (
      "triggerTemplate",
      resource.trigger_template.take().and_then(|v| serde_json::to_value(v).ok()),
    ),
    (
      "sourceToBuild",
      resource.source_to_build.take().and_then(|v| serde_json::to_value(v).ok()),
    ),
  ];
  for (key, value) in typed {
    if let Some(value) = value {
      fields.insert(key.to_string(), value);
    }
  }
  fields
}
