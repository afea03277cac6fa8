//! Trigger management commands.

use mockito::{Matcher, Server};
use predicates::prelude::*;

use super::common::{TestEnv, build_json};

fn trigger_json(id: &str, name: &str) -> serde_json::Value {
  serde_json::json!({
    "id": id,
    "name": name,
    "filename": "cloudbuild.yaml",
    "github": {"owner": "acme", "name": "app", "push": {"branch": "^main$"}}
  })
}

#[test]
fn create_posts_github_push_trigger() {
  let env = TestEnv::empty();
  let mut server = Server::new();
  let create = server
    .mock("POST", "/v1/projects/proj/triggers")
    .match_body(Matcher::PartialJson(serde_json::json!({
      "name": "deploy-main",
      "filename": "cloudbuild.yaml",
      "github": {"owner": "acme", "name": "app", "push": {"branch": "^main$"}}
    })))
    .with_status(200)
    .with_body(trigger_json("t-1", "deploy-main").to_string())
    .create();

  env
    .gcb_cmd_for(&server)
    .args([
      "trigger",
      "create",
      "deploy-main",
      "--filename",
      "cloudbuild.yaml",
      "--github",
      "acme/app",
      "--branch",
      "^main$",
    ])
    .assert()
    .success()
    .stdout(predicate::str::contains("Created trigger deploy-main"))
    .stdout(predicate::str::contains("t-1"));

  create.assert();
}

#[test]
fn create_with_invalid_name_is_rejected_locally() {
  let env = TestEnv::empty();
  let mut server = Server::new();
  let create = server.mock("POST", Matcher::Any).expect(0).create();

  env
    .gcb_cmd_for(&server)
    .args([
      "trigger",
      "create",
      "9-bad name",
      "--filename",
      "cloudbuild.yaml",
      "--github",
      "acme/app",
      "--branch",
      "main",
    ])
    .assert()
    .failure();

  create.assert();
}

#[test]
fn duplicate_create_reports_conflict() {
  let env = TestEnv::empty();
  let mut server = Server::new();
  server
    .mock("POST", "/v1/projects/proj/triggers")
    .with_status(409)
    .with_body(r#"{"error": {"code": 409, "message": "trigger already exists", "status": "ALREADY_EXISTS"}}"#)
    .create();

  env
    .gcb_cmd_for(&server)
    .args([
      "trigger",
      "create",
      "deploy-main",
      "--filename",
      "cloudbuild.yaml",
      "--github",
      "acme/app",
      "--branch",
      "^main$",
    ])
    .assert()
    .failure()
    .stderr(predicate::str::contains("already exists"));
}

#[test]
fn list_shows_triggers() {
  let env = TestEnv::empty();
  let mut server = Server::new();
  server
    .mock("GET", "/v1/projects/proj/triggers")
    .match_query(Matcher::Any)
    .with_status(200)
    .with_body(serde_json::json!({"triggers": [trigger_json("t-1", "deploy-main")]}).to_string())
    .create();

  env
    .gcb_cmd_for(&server)
    .args(["trigger", "list"])
    .assert()
    .success()
    .stdout(predicate::str::contains("deploy-main"))
    .stdout(predicate::str::contains("github.com/acme/app"));
}

#[test]
fn get_missing_trigger_fails() {
  let env = TestEnv::empty();
  let mut server = Server::new();
  server
    .mock("GET", "/v1/projects/proj/triggers/ghost")
    .with_status(404)
    .with_body(r#"{"error": {"code": 404, "message": "trigger not found", "status": "NOT_FOUND"}}"#)
    .create();

  env
    .gcb_cmd_for(&server)
    .args(["trigger", "get", "ghost"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("ghost"));
}

#[test]
fn delete_with_force_skips_prompt() {
  let env = TestEnv::empty();
  let mut server = Server::new();
  let delete = server
    .mock("DELETE", "/v1/projects/proj/triggers/deploy-main")
    .with_status(200)
    .with_body("{}")
    .create();

  env
    .gcb_cmd_for(&server)
    .args(["trigger", "delete", "deploy-main", "--force"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Deleted trigger deploy-main"));

  delete.assert();
}

#[test]
fn run_starts_build() {
  let env = TestEnv::empty();
  let mut server = Server::new();
  server
    .mock("POST", "/v1/projects/proj/triggers/deploy-main:run")
    .match_body(Matcher::PartialJson(serde_json::json!({"branchName": "main"})))
    .with_status(200)
    .with_body(
      serde_json::json!({"name": "operations/build/proj/op", "metadata": {"build": build_json("b-9", "QUEUED")}})
        .to_string(),
    )
    .create();

  env
    .gcb_cmd_for(&server)
    .args(["trigger", "run", "deploy-main", "--branch", "main"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Trigger deploy-main started build b-9"));
}
