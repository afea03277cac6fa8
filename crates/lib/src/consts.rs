//! Shared constants.

use std::time::Duration;

/// Application name, used for the config directory.
pub const APP_NAME: &str = "cloudbuild";

/// Public Cloud Build REST endpoint (v1).
pub const CLOUDBUILD_ENDPOINT: &str = "https://cloudbuild.googleapis.com/v1";

/// Public Cloud Storage JSON API endpoint.
pub const STORAGE_ENDPOINT: &str = "https://storage.googleapis.com";

/// Default interval between status fetches while waiting on a build.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default local wait budget. Matches the service's default build timeout.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(600);

/// Environment variables consulted by [`crate::config::Settings`].
pub mod env {
  pub const PROJECT: &str = "GCB_PROJECT";
  pub const REGION: &str = "GCB_REGION";
  pub const ACCESS_TOKEN: &str = "GCB_ACCESS_TOKEN";
  pub const BUCKET: &str = "GCB_BUCKET";
  pub const CLOUDBUILD_ENDPOINT: &str = "GCB_CLOUDBUILD_ENDPOINT";
  pub const STORAGE_ENDPOINT: &str = "GCB_STORAGE_ENDPOINT";
}
