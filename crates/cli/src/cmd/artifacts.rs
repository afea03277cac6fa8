//! Implementation of the `gcb artifacts` and `gcb logs` commands.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use super::Session;
use crate::GlobalOpts;
use crate::output::{format_bytes, print_info, print_json, print_success, symbols};

#[derive(Debug, Args)]
pub struct ArtifactsArgs {
  /// Build id
  pub build_id: String,

  /// Directory to download into (created if missing)
  #[arg(long, default_value = ".")]
  pub dest: PathBuf,
}

pub fn cmd_artifacts(global: &GlobalOpts, args: ArtifactsArgs) -> Result<()> {
  let session = Session::open(global)?;
  let build = session
    .block_on(session.client.get_build(&args.build_id))
    .with_context(|| format!("Failed to fetch build {}", args.build_id))?;
  let written = session
    .block_on(session.client.fetch_artifacts(&build, &args.dest))
    .context("Failed to fetch artifacts")?;

  if global.json {
    return print_json(&written);
  }
  if written.is_empty() {
    print_info(&format!("Build {} uploaded no artifacts", build.id));
    return Ok(());
  }
  for path in &written {
    let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    println!("  {} {} ({})", symbols::ARROW, path.display(), format_bytes(size));
  }
  print_success(&format!("Downloaded {} artifact(s)", written.len()));
  Ok(())
}

pub fn cmd_logs(global: &GlobalOpts, build_id: &str) -> Result<()> {
  let session = Session::open(global)?;
  let build = session
    .block_on(session.client.get_build(build_id))
    .with_context(|| format!("Failed to fetch build {build_id}"))?;
  let lines = session
    .block_on(session.client.fetch_logs(&build))
    .with_context(|| format!("Failed to fetch logs for build {build_id}"))?;

  if global.json {
    return print_json(&lines);
  }
  for line in &lines {
    println!("{line}");
  }
  Ok(())
}
