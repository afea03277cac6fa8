//! Subcommand implementations.
//!
//! Offline commands (`validate`, `render`) only touch the local config file.
//! Everything else opens a [`Session`]: settings resolved from flags, the
//! environment and the settings file, plus a runtime to drive the client.

mod artifacts;
mod builds;
mod config;
mod submit;
mod trigger;
mod wait;

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tokio::runtime::Runtime;
use tracing::debug;

use cloudbuild_lib::client::{Client, WaitOptions};
use cloudbuild_lib::config::Settings;
use cloudbuild_lib::substitution::Substitutions;

use crate::GlobalOpts;

pub use artifacts::{ArtifactsArgs, cmd_artifacts, cmd_logs};
pub use builds::{ListArgs, cmd_cancel, cmd_list, cmd_retry, cmd_status};
pub use config::{RenderArgs, ValidateArgs, cmd_render, cmd_validate};
pub use submit::{SubmitArgs, cmd_submit};
pub use trigger::{TriggerCommand, cmd_trigger};
pub use wait::{WaitCmdArgs, cmd_wait};

#[derive(Debug, Args)]
pub struct BuildIdArgs {
  /// Build id
  pub build_id: String,
}

/// Poll settings shared by every command that can wait on a build.
#[derive(Debug, Clone, Default, Args)]
pub struct WaitArgs {
  /// Time between status checks, e.g. "5s" [default: 5s]
  #[arg(long, value_parser = parse_interval)]
  pub interval: Option<Duration>,

  /// Give up waiting after this long, e.g. "10m" [default: 10m]
  #[arg(long, value_parser = humantime::parse_duration)]
  pub timeout: Option<Duration>,
}

/// An authenticated client plus the runtime that drives it.
pub struct Session {
  runtime: Runtime,
  pub client: Client,
  pub settings: Settings,
}

impl Session {
  pub fn open(global: &GlobalOpts) -> Result<Self> {
    let overrides = Settings {
      project: global.project.clone(),
      region: global.region.clone(),
      token: global.token.clone(),
      ..Default::default()
    };
    let settings = overrides.or(Settings::load()?);
    let context = settings.context()?;
    debug!(project = %context.project, region = ?context.region, "resolved client context");

    let client = Client::new(context).context("Failed to create client")?;
    let runtime = Runtime::new().context("Failed to create async runtime")?;
    Ok(Self {
      runtime,
      client,
      settings,
    })
  }

  pub fn block_on<F: Future>(&self, future: F) -> F::Output {
    self.runtime.block_on(future)
  }

  /// Flags first, then settings, then built-in defaults.
  pub fn wait_options(&self, args: &WaitArgs) -> WaitOptions {
    WaitOptions::new(
      args.interval.unwrap_or_else(|| self.settings.poll_interval()),
      args.timeout.unwrap_or_else(|| self.settings.wait_timeout()),
    )
  }
}

/// A poll interval: any humantime duration except zero.
fn parse_interval(s: &str) -> Result<Duration, String> {
  match humantime::parse_duration(s) {
    Ok(interval) if interval.is_zero() => Err("interval must be greater than zero".to_string()),
    Ok(interval) => Ok(interval),
    Err(e) => Err(e.to_string()),
  }
}

/// Parse a `KEY=VALUE` substitution flag.
pub fn parse_substitution(s: &str) -> Result<(String, String), String> {
  match s.split_once('=') {
    Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
    _ => Err(format!("expected KEY=VALUE, got '{s}'")),
  }
}

pub fn substitutions(pairs: &[(String, String)]) -> Substitutions {
  pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect()
}
