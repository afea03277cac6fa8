//! Shared test helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Get path to a fixture file.
pub fn fixture_path(name: &str) -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    .join("tests")
    .join("fixtures")
    .join(name)
}

/// Read fixture content.
pub fn fixture_content(name: &str) -> String {
  std::fs::read_to_string(fixture_path(name)).unwrap_or_else(|e| panic!("Failed to load fixture {}: {}", name, e))
}

/// Build resource as the service returns it.
pub fn build_json(id: &str, status: &str) -> serde_json::Value {
  serde_json::json!({
    "id": id,
    "projectId": "proj",
    "status": status,
    "steps": [{"name": "alpine", "args": ["echo", "hi"]}],
    "logsBucket": "gs://logs-bucket",
    "createTime": "2024-05-01T10:00:00Z"
  })
}

/// Long-running operation wrapping a build, as returned by create/run calls.
pub fn operation_json(build: serde_json::Value) -> String {
  serde_json::json!({"name": "operations/build/proj/op", "metadata": {"build": build}}).to_string()
}

/// Isolated test environment.
///
/// Each test gets its own temporary directory holding the build config and
/// an empty settings directory, so no user configuration leaks in.
pub struct TestEnv {
  pub temp: TempDir,
  pub config_path: PathBuf,
}

impl TestEnv {
  /// Create from a fixture file.
  ///
  /// Copies the fixture content to a temporary `cloudbuild.yaml` file.
  pub fn from_fixture(name: &str) -> Self {
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("cloudbuild.yaml");
    let content = fixture_content(name);
    std::fs::write(&config_path, content).unwrap();
    Self { temp, config_path }
  }

  /// Create an empty test environment.
  pub fn empty() -> Self {
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("cloudbuild.yaml");
    Self { temp, config_path }
  }

  /// Write a file relative to the temp directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  /// Settings directory (isolated per test).
  pub fn config_home(&self) -> PathBuf {
    let p = self.temp.path().join("config");
    std::fs::create_dir_all(&p).unwrap();
    dunce::canonicalize(&p).unwrap_or(p)
  }

  /// Download target for artifact tests.
  pub fn output_path(&self) -> PathBuf {
    let p = self.temp.path().join("output");
    std::fs::create_dir_all(&p).unwrap();
    dunce::canonicalize(&p).unwrap_or(p)
  }

  /// Get a Command for the gcb binary with no ambient configuration.
  ///
  /// Clears every `GCB_*` variable and points the settings directory at
  /// the temp dir (`XDG_CONFIG_HOME`, and `APPDATA` for Windows).
  pub fn gcb_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("gcb");
    for var in [
      "GCB_PROJECT",
      "GCB_REGION",
      "GCB_ACCESS_TOKEN",
      "GCB_BUCKET",
      "GCB_CLOUDBUILD_ENDPOINT",
      "GCB_STORAGE_ENDPOINT",
      "RUST_LOG",
    ] {
      cmd.env_remove(var);
    }
    cmd.env("XDG_CONFIG_HOME", self.config_home());
    cmd.env("APPDATA", self.config_home());
    cmd
  }

  /// Same as [`TestEnv::gcb_cmd`], authenticated for project `proj` and
  /// pointed at a mock server for both APIs.
  pub fn gcb_cmd_for(&self, server: &mockito::ServerGuard) -> Command {
    let mut cmd = self.gcb_cmd();
    cmd.env("GCB_PROJECT", "proj");
    cmd.env("GCB_ACCESS_TOKEN", "test-token");
    cmd.env("GCB_CLOUDBUILD_ENDPOINT", format!("{}/v1", server.url()));
    cmd.env("GCB_STORAGE_ENDPOINT", server.url());
    cmd
  }
}
