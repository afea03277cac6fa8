//! Waiting for a build to reach a terminal state.
//!
//! The wait is a fixed-interval poll: fetch, return if terminal, otherwise
//! sleep and fetch again. There is no backoff and the remote build is never
//! cancelled from here; when the local budget runs out the last observed
//! build is handed back inside the error.

use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::Client;
use super::error::ApiError;
use super::storage::StorageError;
use crate::build::Build;
use crate::consts::{DEFAULT_POLL_INTERVAL, DEFAULT_WAIT_TIMEOUT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
  pub poll_interval: Duration,
  pub timeout: Duration,
}

impl Default for WaitOptions {
  fn default() -> Self {
    Self {
      poll_interval: DEFAULT_POLL_INTERVAL,
      timeout: DEFAULT_WAIT_TIMEOUT,
    }
  }
}

impl WaitOptions {
  pub fn new(poll_interval: Duration, timeout: Duration) -> Self {
    Self { poll_interval, timeout }
  }
}

#[derive(Debug, Error)]
pub enum WaitError {
  /// The local budget ran out first. Carries the last build observed.
  #[error("build {} still {} after waiting {}s", .last.id, .last.status, .timeout.as_secs_f64())]
  TimeoutExceeded { last: Box<Build>, timeout: Duration },

  #[error(transparent)]
  Api(#[from] ApiError),

  #[error("failed to stream build logs: {0}")]
  Logs(#[source] StorageError),
}

impl WaitError {
  /// The last build observed before the wait gave up, if it timed out.
  pub fn last_build(&self) -> Option<&Build> {
    match self {
      WaitError::TimeoutExceeded { last, .. } => Some(last),
      _ => None,
    }
  }
}

type LineSink<'a> = &'a mut (dyn FnMut(&str) + Send);

impl Client {
  /// Poll `build_id` every `poll_interval` until it is terminal.
  ///
  /// On an already-terminal build this is a single fetch with no sleep.
  pub async fn wait(&self, build_id: &str, options: WaitOptions) -> Result<Build, WaitError> {
    self.poll_until_terminal(build_id, options, None).await
  }

  /// Same as [`Client::wait`], additionally calling `on_line` for each new
  /// line of the build log as it appears.
  pub async fn wait_with_logs<F>(&self, build_id: &str, options: WaitOptions, mut on_line: F) -> Result<Build, WaitError>
  where
    F: FnMut(&str) + Send,
  {
    let sink: LineSink<'_> = &mut on_line;
    self.poll_until_terminal(build_id, options, Some(sink)).await
  }

  async fn poll_until_terminal(
    &self,
    build_id: &str,
    options: WaitOptions,
    mut on_line: Option<LineSink<'_>>,
  ) -> Result<Build, WaitError> {
    info!(build_id, interval = ?options.poll_interval, timeout = ?options.timeout, "waiting for build");
    let started = Instant::now();
    let mut emitted = 0usize;

    loop {
      let build = self.get_build(build_id).await?;

      if let Some(sink) = on_line.as_mut() {
        emitted = self.emit_new_lines(&build, emitted, &mut **sink).await?;
      }

      if build.is_terminal() {
        info!(build_id, status = %build.status, "build finished");
        return Ok(build);
      }

      let elapsed = started.elapsed();
      if elapsed >= options.timeout {
        warn!(build_id, status = %build.status, "wait budget exhausted");
        return Err(WaitError::TimeoutExceeded {
          last: Box::new(build),
          timeout: options.timeout,
        });
      }

      debug!(build_id, status = %build.status, "build still running");
      tokio::time::sleep(options.poll_interval.min(options.timeout - elapsed)).await;
    }
  }

  /// Emit log lines past `already_emitted`, returning the new count.
  ///
  /// A trailing line without its newline is held back until the build is
  /// terminal, when the log is complete.
  async fn emit_new_lines(
    &self,
    build: &Build,
    already_emitted: usize,
    on_line: &mut (dyn FnMut(&str) + Send),
  ) -> Result<usize, WaitError> {
    let Some(text) = self.log_text(build).await.map_err(WaitError::Logs)? else {
      return Ok(already_emitted);
    };

    let complete = if build.is_terminal() {
      text.as_str()
    } else {
      text.rfind('\n').map_or("", |end| &text[..=end])
    };

    let mut count = 0;
    for line in complete.lines() {
      if count >= already_emitted {
        on_line(line);
      }
      count += 1;
    }
    Ok(count.max(already_emitted))
  }
}
