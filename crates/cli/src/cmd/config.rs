//! Offline config commands: `gcb validate` and `gcb render`.
//!
//! Neither needs a project or credentials.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use cloudbuild_lib::build::config::{self, Format};

use super::{parse_substitution, substitutions};
use crate::GlobalOpts;
use crate::output::{print_json, print_stat, print_success};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum RenderFormat {
  #[default]
  Yaml,
  Json,
}

impl From<RenderFormat> for Format {
  fn from(format: RenderFormat) -> Self {
    match format {
      RenderFormat::Yaml => Format::Yaml,
      RenderFormat::Json => Format::Json,
    }
  }
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
  /// Build config file (.yaml, .yml or .json)
  #[arg(default_value = "cloudbuild.yaml")]
  pub config: PathBuf,

  /// Set or override a substitution, KEY=VALUE (repeatable)
  #[arg(short = 's', long = "substitution", value_name = "KEY=VALUE", value_parser = parse_substitution)]
  pub substitutions: Vec<(String, String)>,
}

#[derive(Debug, Args)]
pub struct RenderArgs {
  /// Build config file (.yaml, .yml or .json)
  #[arg(default_value = "cloudbuild.yaml")]
  pub config: PathBuf,

  /// Set or override a substitution, KEY=VALUE (repeatable)
  #[arg(short = 's', long = "substitution", value_name = "KEY=VALUE", value_parser = parse_substitution)]
  pub substitutions: Vec<(String, String)>,

  /// Inline user substitutions and drop the substitutions block
  #[arg(long)]
  pub resolve: bool,

  /// Output format
  #[arg(long, value_enum, default_value_t = RenderFormat::Yaml)]
  pub format: RenderFormat,
}

pub fn cmd_validate(global: &GlobalOpts, args: ValidateArgs) -> Result<()> {
  let definition = config::read_file_with(&args.config, &substitutions(&args.substitutions))
    .with_context(|| format!("Invalid build config {}", args.config.display()))?;

  if global.json {
    return print_json(&serde_json::json!({
      "valid": true,
      "steps": definition.steps.len(),
      "images": definition.images,
      "substitutions": definition.substitutions,
    }));
  }

  print_success(&format!("{} is valid", args.config.display()));
  print_stat("Steps", &definition.steps.len().to_string());
  if !definition.images.is_empty() {
    print_stat("Images", &definition.images.join(", "));
  }
  if !definition.substitutions.is_empty() {
    let keys: Vec<_> = definition.substitutions.keys().collect();
    print_stat("Substitutions", &keys.join(", "));
  }
  Ok(())
}

pub fn cmd_render(args: RenderArgs) -> Result<()> {
  let mut definition = config::read_file_with(&args.config, &substitutions(&args.substitutions))
    .with_context(|| format!("Invalid build config {}", args.config.display()))?;
  if args.resolve {
    definition = definition.resolved().context("Failed to resolve substitutions")?;
  }

  let rendered = config::render(&definition, args.format.into())?;
  print!("{rendered}");
  if !rendered.ends_with('\n') {
    println!();
  }
  Ok(())
}
