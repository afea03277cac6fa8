//! Build lifecycle commands: submit, status, wait, list, logs, artifacts, cancel.

use mockito::{Matcher, Server};
use predicates::prelude::*;

use super::common::{TestEnv, build_json, operation_json};

#[test]
fn submit_prints_build_id() {
  let env = TestEnv::from_fixture("minimal.yaml");
  let mut server = Server::new();
  let submit = server
    .mock("POST", "/v1/projects/proj/builds")
    .match_header("authorization", "Bearer test-token")
    .with_status(200)
    .with_body(operation_json(build_json("b-1", "QUEUED")))
    .create();

  env
    .gcb_cmd_for(&server)
    .arg("submit")
    .arg(&env.config_path)
    .assert()
    .success()
    .stdout(predicate::str::contains("Submitted build b-1"))
    .stdout(predicate::str::contains("QUEUED"));

  submit.assert();
}

#[test]
fn submit_sends_cli_substitutions() {
  let env = TestEnv::from_fixture("cloudbuild.yaml");
  let mut server = Server::new();
  let submit = server
    .mock("POST", "/v1/projects/proj/builds")
    .match_body(Matcher::PartialJson(serde_json::json!({
      "substitutions": {"_WHO": "ci"}
    })))
    .with_status(200)
    .with_body(operation_json(build_json("b-2", "QUEUED")))
    .create();

  env
    .gcb_cmd_for(&server)
    .args(["submit", "-s", "_WHO=ci"])
    .arg(&env.config_path)
    .assert()
    .success();

  submit.assert();
}

#[test]
fn submit_invalid_config_never_reaches_server() {
  let env = TestEnv::from_fixture("unknown_wait_for.yaml");
  let mut server = Server::new();
  let submit = server.mock("POST", Matcher::Any).expect(0).create();

  env
    .gcb_cmd_for(&server)
    .arg("submit")
    .arg(&env.config_path)
    .assert()
    .failure()
    .stderr(predicate::str::contains("unknown step id"));

  submit.assert();
}

#[test]
fn submit_surfaces_service_rejection() {
  let env = TestEnv::from_fixture("minimal.yaml");
  let mut server = Server::new();
  server
    .mock("POST", "/v1/projects/proj/builds")
    .with_status(400)
    .with_body(r#"{"error": {"code": 400, "message": "invalid machine type", "status": "INVALID_ARGUMENT"}}"#)
    .create();

  env
    .gcb_cmd_for(&server)
    .arg("submit")
    .arg(&env.config_path)
    .assert()
    .failure()
    .stderr(predicate::str::contains("invalid machine type"));
}

#[test]
fn submit_wait_succeeds_when_build_succeeds() {
  let env = TestEnv::from_fixture("minimal.yaml");
  let mut server = Server::new();
  server
    .mock("POST", "/v1/projects/proj/builds")
    .with_status(200)
    .with_body(operation_json(build_json("b-1", "QUEUED")))
    .create();
  server
    .mock("GET", "/v1/projects/proj/builds/b-1")
    .with_status(200)
    .with_body(build_json("b-1", "SUCCESS").to_string())
    .create();

  env
    .gcb_cmd_for(&server)
    .args(["submit", "--wait", "--interval", "10ms"])
    .arg(&env.config_path)
    .assert()
    .success()
    .stdout(predicate::str::contains("Build b-1 succeeded"));
}

#[test]
fn submit_wait_fails_when_build_fails() {
  let env = TestEnv::from_fixture("minimal.yaml");
  let mut server = Server::new();
  server
    .mock("POST", "/v1/projects/proj/builds")
    .with_status(200)
    .with_body(operation_json(build_json("b-1", "QUEUED")))
    .create();
  server
    .mock("GET", "/v1/projects/proj/builds/b-1")
    .with_status(200)
    .with_body(build_json("b-1", "FAILURE").to_string())
    .create();

  env
    .gcb_cmd_for(&server)
    .args(["submit", "--wait", "--interval", "10ms"])
    .arg(&env.config_path)
    .assert()
    .failure()
    .stderr(predicate::str::contains("finished with status FAILURE"));
}

#[test]
fn wait_times_out_on_running_build() {
  let env = TestEnv::empty();
  let mut server = Server::new();
  server
    .mock("GET", "/v1/projects/proj/builds/b-1")
    .with_status(200)
    .with_body(build_json("b-1", "WORKING").to_string())
    .create();

  env
    .gcb_cmd_for(&server)
    .args(["wait", "b-1", "--interval", "10ms", "--timeout", "50ms"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("still WORKING"));
}

#[test]
fn status_json_is_machine_readable() {
  let env = TestEnv::empty();
  let mut server = Server::new();
  server
    .mock("GET", "/v1/projects/proj/builds/b-1")
    .with_status(200)
    .with_body(build_json("b-1", "WORKING").to_string())
    .create();

  let output = env.gcb_cmd_for(&server).args(["status", "b-1", "--json"]).output().unwrap();
  assert!(output.status.success());

  let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(value["id"], "b-1");
  assert_eq!(value["status"], "WORKING");
}

#[test]
fn status_of_missing_build_fails() {
  let env = TestEnv::empty();
  let mut server = Server::new();
  server
    .mock("GET", "/v1/projects/proj/builds/nope")
    .with_status(404)
    .with_body(r#"{"error": {"code": 404, "message": "build not found", "status": "NOT_FOUND"}}"#)
    .create();

  env
    .gcb_cmd_for(&server)
    .args(["status", "nope"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to fetch build nope"));
}

#[test]
fn list_prints_one_row_per_build() {
  let env = TestEnv::empty();
  let mut server = Server::new();
  server
    .mock("GET", "/v1/projects/proj/builds")
    .match_query(Matcher::Any)
    .with_status(200)
    .with_body(
      serde_json::json!({"builds": [build_json("b-2", "WORKING"), build_json("b-1", "SUCCESS")]}).to_string(),
    )
    .create();

  env
    .gcb_cmd_for(&server)
    .arg("list")
    .assert()
    .success()
    .stdout(predicate::str::contains("b-2"))
    .stdout(predicate::str::contains("b-1"));
}

#[test]
fn logs_prints_log_object() {
  let env = TestEnv::empty();
  let mut server = Server::new();
  server
    .mock("GET", "/v1/projects/proj/builds/b-1")
    .with_status(200)
    .with_body(build_json("b-1", "SUCCESS").to_string())
    .create();
  server
    .mock("GET", "/storage/v1/b/logs-bucket/o/log-b-1.txt")
    .match_query(Matcher::UrlEncoded("alt".to_string(), "media".to_string()))
    .with_status(200)
    .with_body("starting build\nStep #0: hi\nDONE\n")
    .create();

  env
    .gcb_cmd_for(&server)
    .args(["logs", "b-1"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Step #0: hi"))
    .stdout(predicate::str::contains("DONE"));
}

#[test]
fn artifacts_are_downloaded_into_dest() {
  let env = TestEnv::empty();
  let dest = env.output_path();
  let mut build = build_json("b-1", "SUCCESS");
  build["artifacts"] = serde_json::json!({"objects": {"location": "gs://art/builds/b-1", "paths": ["out/*"]}});

  let mut server = Server::new();
  server
    .mock("GET", "/v1/projects/proj/builds/b-1")
    .with_status(200)
    .with_body(build.to_string())
    .create();
  server
    .mock("GET", "/storage/v1/b/art/o")
    .match_query(Matcher::Any)
    .with_status(200)
    .with_body(serde_json::json!({"items": [{"name": "builds/b-1/app.bin"}]}).to_string())
    .create();
  server
    .mock("GET", "/storage/v1/b/art/o/builds%2Fb-1%2Fapp.bin")
    .match_query(Matcher::UrlEncoded("alt".to_string(), "media".to_string()))
    .with_status(200)
    .with_body("binary")
    .create();

  env
    .gcb_cmd_for(&server)
    .args(["artifacts", "b-1", "--dest"])
    .arg(&dest)
    .assert()
    .success()
    .stdout(predicate::str::contains("Downloaded 1 artifact(s)"));

  assert_eq!(std::fs::read_to_string(dest.join("app.bin")).unwrap(), "binary");
}

#[test]
fn artifacts_without_location_fail() {
  let env = TestEnv::empty();
  let mut server = Server::new();
  server
    .mock("GET", "/v1/projects/proj/builds/b-1")
    .with_status(200)
    .with_body(build_json("b-1", "SUCCESS").to_string())
    .create();

  env
    .gcb_cmd_for(&server)
    .args(["artifacts", "b-1"])
    .assert()
    .failure();
}

#[test]
fn cancel_posts_cancel_method() {
  let env = TestEnv::empty();
  let mut server = Server::new();
  let cancel = server
    .mock("POST", "/v1/projects/proj/builds/b-1:cancel")
    .with_status(200)
    .with_body(build_json("b-1", "CANCELLED").to_string())
    .create();

  env
    .gcb_cmd_for(&server)
    .args(["cancel", "b-1"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Cancellation requested for build b-1"));

  cancel.assert();
}
