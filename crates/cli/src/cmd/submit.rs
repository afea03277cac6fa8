//! Implementation of the `gcb submit` command.
//!
//! Reads a build config, optionally uploads a local source directory, submits
//! the build, and optionally waits for it to finish.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, anyhow};
use clap::Args;

use cloudbuild_lib::build::config;
use cloudbuild_lib::consts::env;

use super::wait::wait_and_report;
use super::{Session, WaitArgs, parse_substitution, substitutions};
use crate::GlobalOpts;
use crate::output::{print_info, print_json, print_stat, print_success, status_label};

#[derive(Debug, Args)]
pub struct SubmitArgs {
  /// Build config file (.yaml, .yml or .json)
  #[arg(default_value = "cloudbuild.yaml")]
  pub config: PathBuf,

  /// Set or override a substitution, KEY=VALUE (repeatable)
  #[arg(short = 's', long = "substitution", value_name = "KEY=VALUE", value_parser = parse_substitution)]
  pub substitutions: Vec<(String, String)>,

  /// Upload this directory as the build source
  #[arg(long, value_name = "DIR")]
  pub source: Option<PathBuf>,

  /// Bucket for the uploaded source [env: GCB_BUCKET]
  #[arg(long, requires = "source")]
  pub bucket: Option<String>,

  /// Wait for the build to finish
  #[arg(long)]
  pub wait: bool,

  /// Stream the build log while waiting (implies --wait)
  #[arg(long)]
  pub logs: bool,

  #[command(flatten)]
  pub wait_args: WaitArgs,
}

pub fn cmd_submit(global: &GlobalOpts, args: SubmitArgs) -> Result<()> {
  let mut definition = config::read_file_with(&args.config, &substitutions(&args.substitutions))
    .with_context(|| format!("Failed to load {}", args.config.display()))?;

  let session = Session::open(global)?;

  if let Some(dir) = &args.source {
    let bucket = args
      .bucket
      .clone()
      .or_else(|| session.settings.bucket.clone())
      .ok_or_else(|| anyhow!("no bucket for the source upload (set --bucket or {})", env::BUCKET))?;
    let object = source_object_name(dir);
    let source = session
      .block_on(session.client.upload_source(dir, &bucket, &object))
      .context("Source upload failed")?;
    if !global.json {
      print_info(&format!("Uploaded {} to gs://{}/{}", dir.display(), bucket, object));
    }
    definition.source = Some(source);
  }

  let build = session
    .block_on(session.client.submit(&definition))
    .context("Build submission failed")?;

  if args.wait || args.logs {
    if !global.json {
      print_success(&format!("Submitted build {}", build.id));
    }
    return wait_and_report(&session, &build.id, &args.wait_args, args.logs, global.json);
  }

  if global.json {
    print_json(&build)?;
  } else {
    print_success(&format!("Submitted build {}", build.id));
    print_stat("Status", &status_label(build.status));
    if let Some(url) = &build.log_url {
      print_stat("Logs", url);
    }
  }
  Ok(())
}

/// `source/<unix-seconds>-<dir name>.tgz`, unique enough per submitter.
fn source_object_name(dir: &Path) -> String {
  let stamp = SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|d| d.as_secs())
    .unwrap_or_default();
  let name = dir_name(dir);
  format!("source/{stamp}-{name}.tgz")
}

fn dir_name(dir: &Path) -> String {
  dir
    .canonicalize()
    .ok()
    .as_deref()
    .unwrap_or(dir)
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_else(|| "source".to_string())
}
