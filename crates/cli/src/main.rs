mod cmd;
mod output;
mod prompts;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::{
  ArtifactsArgs, BuildIdArgs, ListArgs, RenderArgs, SubmitArgs, TriggerCommand, ValidateArgs, WaitCmdArgs,
};

/// gcb - compose, submit and monitor Cloud Build jobs
#[derive(Parser)]
#[command(name = "gcb")]
#[command(author, version, about, long_about = None)]
struct Cli {
  #[command(flatten)]
  global: GlobalOpts,

  #[command(subcommand)]
  command: Commands,
}

/// Options accepted by every subcommand.
#[derive(Debug, Clone, Default, Args)]
pub struct GlobalOpts {
  /// Project to operate on [env: GCB_PROJECT]
  #[arg(long, global = true)]
  pub project: Option<String>,

  /// Region for regional builds and triggers [env: GCB_REGION]
  #[arg(long, global = true)]
  pub region: Option<String>,

  /// OAuth2 access token [env: GCB_ACCESS_TOKEN]
  #[arg(long, global = true)]
  pub token: Option<String>,

  /// Print machine-readable JSON
  #[arg(long, global = true)]
  pub json: bool,

  /// Enable verbose output
  #[arg(short, long, global = true)]
  pub verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
  /// Submit a build from a config file
  Submit(SubmitArgs),

  /// Show the current state of a build
  Status(BuildIdArgs),

  /// Wait for a build to finish
  Wait(WaitCmdArgs),

  /// Print a build's log
  Logs(BuildIdArgs),

  /// Download a build's artifacts
  Artifacts(ArtifactsArgs),

  /// Cancel a running build
  Cancel(BuildIdArgs),

  /// Re-run a finished build
  Retry(BuildIdArgs),

  /// List recent builds
  List(ListArgs),

  /// Check a build config file without submitting it
  Validate(ValidateArgs),

  /// Print a build config file in canonical form
  Render(RenderArgs),

  /// Manage build triggers
  #[command(subcommand)]
  Trigger(TriggerCommand),
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  // Logs go to stderr so stdout stays parseable
  let default_level = if cli.global.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match run(cli) {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      output::print_error(&format!("{err:#}"));
      ExitCode::FAILURE
    }
  }
}

fn run(cli: Cli) -> Result<()> {
  let global = &cli.global;
  match cli.command {
    Commands::Submit(args) => cmd::cmd_submit(global, args),
    Commands::Status(args) => cmd::cmd_status(global, &args.build_id),
    Commands::Wait(args) => cmd::cmd_wait(global, args),
    Commands::Logs(args) => cmd::cmd_logs(global, &args.build_id),
    Commands::Artifacts(args) => cmd::cmd_artifacts(global, args),
    Commands::Cancel(args) => cmd::cmd_cancel(global, &args.build_id),
    Commands::Retry(args) => cmd::cmd_retry(global, &args.build_id),
    Commands::List(args) => cmd::cmd_list(global, args),
    Commands::Validate(args) => cmd::cmd_validate(global, args),
    Commands::Render(args) => cmd::cmd_render(args),
    Commands::Trigger(command) => cmd::cmd_trigger(global, command),
  }
}
