//! Offline validate and render against fixture configs.

use predicates::prelude::*;

use super::common::{TestEnv, fixture_path};

#[test]
fn validate_fixture_lists_images() {
  let env = TestEnv::from_fixture("cloudbuild.yaml");

  env
    .gcb_cmd()
    .arg("validate")
    .arg(&env.config_path)
    .assert()
    .success()
    .stdout(predicate::str::contains("Steps: 2"))
    .stdout(predicate::str::contains("Images"));
}

#[test]
fn validate_rejects_unknown_wait_for() {
  let env = TestEnv::empty();

  env
    .gcb_cmd()
    .arg("validate")
    .arg(fixture_path("unknown_wait_for.yaml"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("unknown step id"));
}

#[test]
fn validate_json_output() {
  let env = TestEnv::from_fixture("minimal.yaml");

  let output = env
    .gcb_cmd()
    .args(["validate", "--json"])
    .arg(&env.config_path)
    .output()
    .unwrap();
  assert!(output.status.success());

  let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(value["valid"], true);
  assert_eq!(value["steps"], 1);
}

#[test]
fn render_resolve_fails_on_undeclared_user_substitution() {
  let env = TestEnv::from_fixture("unresolved.yaml");

  env
    .gcb_cmd()
    .args(["render", "--resolve"])
    .arg(&env.config_path)
    .assert()
    .failure();
}

#[test]
fn render_resolve_with_override_succeeds() {
  let env = TestEnv::from_fixture("unresolved.yaml");

  env
    .gcb_cmd()
    .args(["render", "--resolve", "-s", "_GREETING=hola"])
    .arg(&env.config_path)
    .assert()
    .success()
    .stdout(predicate::str::contains("hola"));
}

#[test]
fn default_config_path_is_cloudbuild_yaml() {
  let env = TestEnv::from_fixture("minimal.yaml");

  env
    .gcb_cmd()
    .current_dir(env.temp.path())
    .arg("validate")
    .assert()
    .success()
    .stdout(predicate::str::contains("cloudbuild.yaml is valid"));
}
