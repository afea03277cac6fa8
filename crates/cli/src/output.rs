//! CLI output formatting utilities.
//!
//! Provides consistent formatting for terminal output including colored status
//! messages, build summaries, and human-readable byte/duration formatting.

use std::time::Duration;

use anyhow::Context;
use cloudbuild_lib::build::{Build, BuildStatus};
use cloudbuild_lib::trigger::{GitRef, Trigger, TriggerConfig, TriggerEvent};
use owo_colors::{OwoColorize, Stream};

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  pub const ARROW: &str = "→";
}

pub fn format_bytes(bytes: u64) -> String {
  const KB: u64 = 1024;
  const MB: u64 = KB * 1024;
  const GB: u64 = MB * 1024;

  if bytes >= GB {
    format!("{:.1} GB", bytes as f64 / GB as f64)
  } else if bytes >= MB {
    format!("{:.1} MB", bytes as f64 / MB as f64)
  } else if bytes >= KB {
    format!("{:.1} KB", bytes as f64 / KB as f64)
  } else {
    format!("{} B", bytes)
  }
}

pub fn format_duration(duration: Duration) -> String {
  let secs = duration.as_secs();
  let millis = duration.subsec_millis();

  if secs >= 60 {
    let mins = secs / 60;
    let remaining_secs = secs % 60;
    format!("{}m {}s", mins, remaining_secs)
  } else if secs > 0 {
    format!("{}.{:02}s", secs, millis / 10)
  } else {
    format!("{}ms", millis)
  }
}

/// Status name colored by outcome.
pub fn status_label(status: BuildStatus) -> String {
  let name = status.as_str();
  match status {
    BuildStatus::Success => name.if_supports_color(Stream::Stdout, |s| s.green()).to_string(),
    BuildStatus::Failure | BuildStatus::InternalError | BuildStatus::Timeout | BuildStatus::Expired => {
      name.if_supports_color(Stream::Stdout, |s| s.red()).to_string()
    }
    BuildStatus::Cancelled => name.if_supports_color(Stream::Stdout, |s| s.yellow()).to_string(),
    _ => name.if_supports_color(Stream::Stdout, |s| s.cyan()).to_string(),
  }
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

/// Multi-line summary of a single build.
pub fn print_build(build: &Build) {
  println!("Build {}", build.id);
  print_stat("Status", &status_label(build.status));
  if let Some(detail) = &build.status_detail {
    print_stat("Detail", detail);
  }
  print_stat("Steps", &build.definition.steps.len().to_string());
  if let Some(created) = build.create_time {
    print_stat("Created", &created.to_rfc3339());
  }
  if let Some(elapsed) = build.elapsed().and_then(|d| d.to_std().ok()) {
    print_stat("Duration", &format_duration(elapsed));
  }
  if let Some(url) = &build.log_url {
    print_stat("Logs", url);
  }
  if let Some(results) = &build.results {
    for image in &results.images {
      print_stat("Image", &format!("{}@{}", image.name, image.digest));
    }
  }
}

/// One line per build: id, status, creation time.
pub fn print_build_row(build: &Build) {
  let created = build.create_time.map(|t| t.to_rfc3339()).unwrap_or_default();
  println!("{}  {:<24}  {}", build.id, status_label(build.status), created);
}

pub fn describe_event(event: &TriggerEvent) -> String {
  let describe_ref = |r: &GitRef| match r {
    GitRef::Branch(b) => format!("branch {b}"),
    GitRef::Tag(t) => format!("tag {t}"),
  };
  match event {
    TriggerEvent::GithubPush { owner, repo, reference } => {
      format!("push to github.com/{owner}/{repo} ({})", describe_ref(reference))
    }
    TriggerEvent::GithubPullRequest { owner, repo, branch, .. } => {
      format!("pull request on github.com/{owner}/{repo} (base {branch})")
    }
    TriggerEvent::SourceRepoPush { repo_name, reference } => {
      format!("push to {repo_name} ({})", describe_ref(reference))
    }
    TriggerEvent::Manual { uri, reference, .. } => format!("manual ({uri} {reference})"),
    TriggerEvent::Other(fields) => match fields.keys().find(|k| k.ends_with("Config")) {
      Some(kind) => format!("{} event", kind.trim_end_matches("Config")),
      None => "other event".to_string(),
    },
  }
}

pub fn print_trigger(trigger: &Trigger) {
  println!("Trigger {}", trigger.name);
  if !trigger.id.is_empty() {
    print_stat("Id", &trigger.id);
  }
  if let Some(description) = &trigger.description {
    print_stat("Description", description);
  }
  print_stat("Event", &describe_event(&trigger.event));
  let config = match &trigger.config {
    TriggerConfig::Inline(def) => format!("inline ({} steps)", def.steps.len()),
    TriggerConfig::File(path) => path.clone(),
    TriggerConfig::Autodetect => "autodetect".to_string(),
  };
  print_stat("Config", &config);
  if trigger.disabled {
    print_stat("Disabled", "yes");
  }
  for (key, value) in trigger.substitutions.iter() {
    print_stat(key, value);
  }
}
