//! Implementation of the `gcb trigger` subcommands.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use clap::{ArgGroup, Args, Subcommand, ValueEnum};

use cloudbuild_lib::build::{Revision, config};
use cloudbuild_lib::trigger::{CommentControl, GitRef, RepoType, Trigger, TriggerConfig, TriggerEvent};

use super::wait::wait_and_report;
use super::{Session, WaitArgs, parse_substitution, substitutions};
use crate::GlobalOpts;
use crate::output::{print_info, print_json, print_stat, print_success, print_trigger, status_label, symbols};
use crate::prompts::confirm;

#[derive(Debug, Subcommand)]
pub enum TriggerCommand {
  /// Create a trigger
  Create(CreateArgs),

  /// Show a trigger
  Get {
    /// Trigger name or id
    name: String,
  },

  /// List every trigger in the project
  List,

  /// Delete a trigger
  Delete {
    /// Trigger name or id
    name: String,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    force: bool,
  },

  /// Start a build from a trigger
  Run(RunArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum RepoKind {
  Github,
  CloudSourceRepositories,
  BitbucketServer,
  Gitlab,
}

impl From<RepoKind> for RepoType {
  fn from(kind: RepoKind) -> Self {
    match kind {
      RepoKind::Github => RepoType::Github,
      RepoKind::CloudSourceRepositories => RepoType::CloudSourceRepositories,
      RepoKind::BitbucketServer => RepoType::BitbucketServer,
      RepoKind::Gitlab => RepoType::Gitlab,
    }
  }
}

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("build_config").required(true).args(["config", "filename"])))]
#[command(group(ArgGroup::new("event_source").required(true).args(["github", "repo", "manual"])))]
pub struct CreateArgs {
  /// Trigger name
  pub name: String,

  /// Embed the build from this local config file
  #[arg(long, value_name = "FILE")]
  pub config: Option<PathBuf>,

  /// Path of the build config inside the repository
  #[arg(long, value_name = "PATH")]
  pub filename: Option<String>,

  /// Fire on a GitHub repository, given as OWNER/REPO
  #[arg(long, value_name = "OWNER/REPO")]
  pub github: Option<String>,

  /// Fire on a Cloud Source Repositories repository
  #[arg(long, value_name = "NAME")]
  pub repo: Option<String>,

  /// Only run manually, building this repository URI
  #[arg(long, value_name = "URI")]
  pub manual: Option<String>,

  /// Repository host for --manual
  #[arg(long, value_enum, default_value_t = RepoKind::Github)]
  pub repo_type: RepoKind,

  /// Branch pattern (pushed branch, pull request base, or the manual ref)
  #[arg(long, conflicts_with = "tag")]
  pub branch: Option<String>,

  /// Tag pattern
  #[arg(long)]
  pub tag: Option<String>,

  /// Fire on pull requests instead of pushes (GitHub only)
  #[arg(long, requires = "github")]
  pub pull_request: bool,

  /// Who may trigger pull request builds with a comment
  #[arg(long, value_enum, requires = "pull_request")]
  pub comment_control: Option<CommentMode>,

  /// Free-form description shown in listings
  #[arg(long)]
  pub description: Option<String>,

  /// Substitution override applied to every build, KEY=VALUE (repeatable)
  #[arg(short = 's', long = "substitution", value_name = "KEY=VALUE", value_parser = parse_substitution)]
  pub substitutions: Vec<(String, String)>,

  /// Create the trigger disabled
  #[arg(long)]
  pub disabled: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CommentMode {
  Disabled,
  Enabled,
  ExternalOnly,
}

impl From<CommentMode> for CommentControl {
  fn from(mode: CommentMode) -> Self {
    match mode {
      CommentMode::Disabled => CommentControl::CommentsDisabled,
      CommentMode::Enabled => CommentControl::CommentsEnabled,
      CommentMode::ExternalOnly => CommentControl::CommentsEnabledForExternalContributorsOnly,
    }
  }
}

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("revision").args(["branch", "tag", "commit"])))]
pub struct RunArgs {
  /// Trigger name or id
  pub name: String,

  /// Build this branch instead of the trigger's default
  #[arg(long)]
  pub branch: Option<String>,

  /// Build this tag
  #[arg(long)]
  pub tag: Option<String>,

  /// Build this commit
  #[arg(long)]
  pub commit: Option<String>,

  /// Wait for the started build to finish
  #[arg(long)]
  pub wait: bool,

  /// Stream the build log while waiting (implies --wait)
  #[arg(long)]
  pub logs: bool,

  #[command(flatten)]
  pub wait_args: WaitArgs,
}

impl CreateArgs {
  fn git_ref(&self) -> Option<GitRef> {
    match (&self.branch, &self.tag) {
      (Some(branch), _) => Some(GitRef::Branch(branch.clone())),
      (None, Some(tag)) => Some(GitRef::Tag(tag.clone())),
      (None, None) => None,
    }
  }

  fn event(&self) -> Result<TriggerEvent> {
    if let Some(github) = &self.github {
      let (owner, repo) = github
        .split_once('/')
        .filter(|(o, r)| !o.is_empty() && !r.is_empty())
        .ok_or_else(|| anyhow!("--github expects OWNER/REPO, got '{github}'"))?;

      if self.pull_request {
        let branch = self
          .branch
          .clone()
          .ok_or_else(|| anyhow!("pull request triggers need --branch (the base branch pattern)"))?;
        return Ok(TriggerEvent::GithubPullRequest {
          owner: owner.to_string(),
          repo: repo.to_string(),
          branch,
          comment_control: self.comment_control.map(Into::into),
        });
      }

      let reference = self.git_ref().ok_or_else(|| anyhow!("push triggers need --branch or --tag"))?;
      return Ok(TriggerEvent::GithubPush {
        owner: owner.to_string(),
        repo: repo.to_string(),
        reference,
      });
    }

    if let Some(repo_name) = &self.repo {
      let reference = self.git_ref().ok_or_else(|| anyhow!("push triggers need --branch or --tag"))?;
      return Ok(TriggerEvent::SourceRepoPush {
        repo_name: repo_name.clone(),
        reference,
      });
    }

    if let Some(uri) = &self.manual {
      let reference = match self.git_ref() {
        Some(GitRef::Branch(branch)) => format!("refs/heads/{branch}"),
        Some(GitRef::Tag(tag)) => format!("refs/tags/{tag}"),
        None => bail!("manual triggers need --branch or --tag to build"),
      };
      return Ok(TriggerEvent::Manual {
        uri: uri.clone(),
        reference,
        repo_type: self.repo_type.into(),
      });
    }

    bail!("one of --github, --repo or --manual is required")
  }

  fn trigger(&self) -> Result<Trigger> {
    let overrides = substitutions(&self.substitutions);
    let config = match (&self.config, &self.filename) {
      (Some(path), _) => {
        let definition = config::read_file_with(path, &overrides)
          .with_context(|| format!("Invalid build config {}", path.display()))?;
        TriggerConfig::Inline(definition)
      }
      (None, Some(filename)) => TriggerConfig::File(filename.clone()),
      (None, None) => bail!("one of --config or --filename is required"),
    };

    let mut trigger = Trigger::new(&self.name, config, self.event()?).disabled(self.disabled);
    trigger.substitutions = overrides;
    if let Some(description) = &self.description {
      trigger = trigger.description(description);
    }
    trigger.validate()?;
    Ok(trigger)
  }
}

impl RunArgs {
  fn revision(&self) -> Option<Revision> {
    if let Some(branch) = &self.branch {
      Some(Revision::BranchName(branch.clone()))
    } else if let Some(tag) = &self.tag {
      Some(Revision::TagName(tag.clone()))
    } else {
      self.commit.clone().map(Revision::CommitSha)
    }
  }
}

pub fn cmd_trigger(global: &GlobalOpts, command: TriggerCommand) -> Result<()> {
  match command {
    TriggerCommand::Create(args) => cmd_create(global, &args),
    TriggerCommand::Get { name } => cmd_get(global, &name),
    TriggerCommand::List => cmd_list(global),
    TriggerCommand::Delete { name, force } => cmd_delete(global, &name, force),
    TriggerCommand::Run(args) => cmd_run(global, &args),
  }
}

fn cmd_create(global: &GlobalOpts, args: &CreateArgs) -> Result<()> {
  let trigger = args.trigger()?;
  let session = Session::open(global)?;
  let created = session
    .block_on(session.client.create_trigger(&trigger))
    .with_context(|| format!("Failed to create trigger '{}'", trigger.name))?;

  if global.json {
    return print_json(&created);
  }
  print_success(&format!("Created trigger {}", created.name));
  print_stat("Id", &created.id);
  Ok(())
}

fn cmd_get(global: &GlobalOpts, name: &str) -> Result<()> {
  let session = Session::open(global)?;
  let trigger = session
    .block_on(session.client.get_trigger(name))
    .with_context(|| format!("Failed to fetch trigger '{name}'"))?;

  if global.json {
    return print_json(&trigger);
  }
  print_trigger(&trigger);
  Ok(())
}

fn cmd_list(global: &GlobalOpts) -> Result<()> {
  let session = Session::open(global)?;
  let triggers = session
    .block_on(session.client.list_triggers())
    .context("Failed to list triggers")?;

  if global.json {
    return print_json(&triggers);
  }
  if triggers.is_empty() {
    print_info("No triggers found");
    return Ok(());
  }
  for trigger in &triggers {
    let state = if trigger.disabled { " (disabled)" } else { "" };
    println!(
      "  {} {}{}  {}",
      symbols::INFO,
      trigger.name,
      state,
      crate::output::describe_event(&trigger.event)
    );
  }
  Ok(())
}

fn cmd_delete(global: &GlobalOpts, name: &str, force: bool) -> Result<()> {
  if !confirm(&format!("Delete trigger '{name}'?"), force)? {
    print_info("Aborted");
    return Ok(());
  }

  let session = Session::open(global)?;
  session
    .block_on(session.client.delete_trigger(name))
    .with_context(|| format!("Failed to delete trigger '{name}'"))?;

  if global.json {
    return print_json(&serde_json::json!({ "deleted": name }));
  }
  print_success(&format!("Deleted trigger {name}"));
  Ok(())
}

fn cmd_run(global: &GlobalOpts, args: &RunArgs) -> Result<()> {
  let session = Session::open(global)?;
  let revision = args.revision();
  let build = session
    .block_on(session.client.run_trigger(&args.name, revision.as_ref()))
    .with_context(|| format!("Failed to run trigger '{}'", args.name))?;

  if args.wait || args.logs {
    if !global.json {
      print_success(&format!("Trigger {} started build {}", args.name, build.id));
    }
    return wait_and_report(&session, &build.id, &args.wait_args, args.logs, global.json);
  }

  if global.json {
    return print_json(&build);
  }
  print_success(&format!("Trigger {} started build {}", args.name, build.id));
  print_stat("Status", &status_label(build.status));
  Ok(())
}
