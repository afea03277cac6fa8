//! Single-request build commands: `status`, `cancel`, `retry` and `list`.

use anyhow::{Context, Result};
use clap::Args;

use super::Session;
use crate::GlobalOpts;
use crate::output::{print_build, print_build_row, print_info, print_json, print_success, print_stat, status_label};

#[derive(Debug, Args)]
pub struct ListArgs {
  /// Service-side filter, e.g. 'status="FAILURE"'
  #[arg(long)]
  pub filter: Option<String>,

  /// Maximum number of builds to show
  #[arg(long, default_value_t = 20)]
  pub limit: usize,
}

pub fn cmd_status(global: &GlobalOpts, build_id: &str) -> Result<()> {
  let session = Session::open(global)?;
  let build = session
    .block_on(session.client.get_build(build_id))
    .with_context(|| format!("Failed to fetch build {build_id}"))?;

  if global.json {
    print_json(&build)?;
  } else {
    print_build(&build);
  }
  Ok(())
}

pub fn cmd_cancel(global: &GlobalOpts, build_id: &str) -> Result<()> {
  let session = Session::open(global)?;
  let build = session
    .block_on(session.client.cancel_build(build_id))
    .with_context(|| format!("Failed to cancel build {build_id}"))?;

  if global.json {
    print_json(&build)?;
  } else {
    print_success(&format!("Cancellation requested for build {}", build.id));
    print_stat("Status", &status_label(build.status));
  }
  Ok(())
}

pub fn cmd_retry(global: &GlobalOpts, build_id: &str) -> Result<()> {
  let session = Session::open(global)?;
  let build = session
    .block_on(session.client.retry_build(build_id))
    .with_context(|| format!("Failed to retry build {build_id}"))?;

  if global.json {
    print_json(&build)?;
  } else {
    print_success(&format!("Retried {} as build {}", build_id, build.id));
    print_stat("Status", &status_label(build.status));
  }
  Ok(())
}

pub fn cmd_list(global: &GlobalOpts, args: ListArgs) -> Result<()> {
  let session = Session::open(global)?;
  let builds = session
    .block_on(session.client.list_builds(args.filter.as_deref(), Some(args.limit)))
    .context("Failed to list builds")?;

  if global.json {
    return print_json(&builds);
  }
  if builds.is_empty() {
    print_info("No builds found");
    return Ok(());
  }
  for build in &builds {
    print_build_row(build);
  }
  Ok(())
}
