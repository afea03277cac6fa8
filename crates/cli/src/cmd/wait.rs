//! Implementation of the `gcb wait` command, and the wait-and-report step
//! shared with `submit --wait` and `trigger run --wait`.

use std::time::Instant;

use anyhow::{Result, bail};
use clap::Args;
use tracing::info;

use cloudbuild_lib::build::Build;
use cloudbuild_lib::client::WaitError;

use super::{Session, WaitArgs};
use crate::GlobalOpts;
use crate::output::{self, format_duration, print_json, print_warning};

#[derive(Debug, Args)]
pub struct WaitCmdArgs {
  /// Build id
  pub build_id: String,

  /// Stream the build log while waiting
  #[arg(long)]
  pub logs: bool,

  #[command(flatten)]
  pub wait: WaitArgs,
}

pub fn cmd_wait(global: &GlobalOpts, args: WaitCmdArgs) -> Result<()> {
  let session = Session::open(global)?;
  wait_and_report(&session, &args.build_id, &args.wait, args.logs, global.json)
}

/// Wait for `build_id`, print the outcome, and fail unless it succeeded.
pub fn wait_and_report(session: &Session, build_id: &str, wait: &WaitArgs, logs: bool, json: bool) -> Result<()> {
  let options = session.wait_options(wait);
  let start = Instant::now();

  let result = if logs {
    session.block_on(session.client.wait_with_logs(build_id, options, |line| {
      // JSON mode keeps stdout for the final document
      if json {
        eprintln!("{line}");
      } else {
        println!("{line}");
      }
    }))
  } else {
    session.block_on(session.client.wait(build_id, options))
  };

  match result {
    Ok(build) => {
      info!(build_id, elapsed = ?start.elapsed(), "wait finished");
      report_finished(&build, json)?;
      if !json {
        println!("  Waited {}", format_duration(start.elapsed()));
      }
      ensure_success(&build, json)
    }
    Err(WaitError::TimeoutExceeded { last, timeout }) => {
      if json {
        print_json(&last)?;
      } else {
        output::print_build(&last);
      }
      print_warning("The build keeps running remotely; use 'gcb cancel' to stop it.");
      bail!(
        "build {} still {} after waiting {}",
        last.id,
        last.status,
        format_duration(timeout)
      )
    }
    Err(err) => Err(err.into()),
  }
}

fn report_finished(build: &Build, json: bool) -> Result<()> {
  if json {
    return print_json(build);
  }
  println!();
  output::print_build(build);
  Ok(())
}

fn ensure_success(build: &Build, json: bool) -> Result<()> {
  if build.status.is_success() {
    if !json {
      output::print_success(&format!("Build {} succeeded", build.id));
    }
    Ok(())
  } else {
    bail!("build {} finished with status {}", build.id, build.status)
  }
}
