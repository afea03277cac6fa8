//! Trigger create/get/list/delete/run.
//!
//! Every call is a single request except `list_triggers`, which drains all
//! pages. Triggers can be addressed by id or by name; the service accepts
//! either in the resource path.

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::builds::Operation;
use super::error::ApiError;
use super::{Client, PAGE_SIZE};
use crate::build::{Build, Revision};
use crate::trigger::Trigger;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListTriggersResponse {
  #[serde(default)]
  triggers: Vec<Trigger>,
  #[serde(default)]
  next_page_token: Option<String>,
}

impl Client {
  /// Create a trigger. A name collision comes back as [`ApiError::AlreadyExists`].
  pub async fn create_trigger(&self, trigger: &Trigger) -> Result<Trigger, ApiError> {
    info!(name = %trigger.name, "creating trigger");
    let url = self.cloudbuild_url(&["triggers"])?;
    let created: Trigger = self.http().post_json(url, trigger).await?;
    info!(name = %created.name, id = %created.id, "trigger created");
    Ok(created)
  }

  pub async fn get_trigger(&self, id_or_name: &str) -> Result<Trigger, ApiError> {
    debug!(trigger = id_or_name, "fetching trigger");
    let url = self.cloudbuild_url(&["triggers", id_or_name])?;
    self.http().get_json(url).await
  }

  /// Every trigger in the project (or region), in service order.
  pub async fn list_triggers(&self) -> Result<Vec<Trigger>, ApiError> {
    let mut triggers = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
      let mut url = self.cloudbuild_url(&["triggers"])?;
      {
        let mut query = url.query_pairs_mut();
        query.append_pair("pageSize", &PAGE_SIZE.to_string());
        if let Some(token) = &page_token {
          query.append_pair("pageToken", token);
        }
      }

      let page: ListTriggersResponse = self.http().get_json(url).await?;
      triggers.extend(page.triggers);

      match page.next_page_token.filter(|t| !t.is_empty()) {
        Some(token) => page_token = Some(token),
        None => break,
      }
    }

    debug!(count = triggers.len(), "listed triggers");
    Ok(triggers)
  }

  /// Delete a trigger. Deleting one that is already gone is [`ApiError::NotFound`].
  pub async fn delete_trigger(&self, id_or_name: &str) -> Result<(), ApiError> {
    info!(trigger = id_or_name, "deleting trigger");
    let url = self.cloudbuild_url(&["triggers", id_or_name])?;
    self.http().delete(url).await
  }

  /// Start a build from a trigger, optionally at a specific revision.
  pub async fn run_trigger(&self, id_or_name: &str, revision: Option<&Revision>) -> Result<Build, ApiError> {
    info!(trigger = id_or_name, ?revision, "running trigger");
    let url = self.cloudbuild_url(&["triggers", format!("{id_or_name}:run").as_str()])?;

    let source = match revision {
      Some(revision) => serde_json::to_value(revision).map_err(|e| ApiError::Decode(e.to_string()))?,
      None => json!({}),
    };
    // Regional endpoints take a RunBuildTriggerRequest, global ones the bare source
    let body = if self.context().region.is_some() {
      json!({
        "name": self.resource_name("triggers", id_or_name),
        "projectId": self.context().project,
        "triggerId": id_or_name,
        "source": source,
      })
    } else {
      source
    };

    let operation: Operation = self.http().post_json(url, &body).await?;
    let build = operation.into_build()?;
    info!(trigger = id_or_name, build_id = %build.id, "trigger started build");
    Ok(build)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::client::testutil::{build_json, client_for, regional_client_for};
  use crate::trigger::{GitRef, TriggerConfig, TriggerEvent};
  use mockito::{Matcher, Server};

  fn trigger_json(id: &str, name: &str) -> serde_json::Value {
    json!({
      "id": id,
      "name": name,
      "filename": "cloudbuild.yaml",
      "github": {"owner": "acme", "name": "app", "push": {"branch": "^main$"}},
      "createTime": "2024-05-01T10:00:00Z"
    })
  }

  fn new_trigger(name: &str) -> Trigger {
    Trigger::new(
      name,
      TriggerConfig::File("cloudbuild.yaml".to_string()),
      TriggerEvent::GithubPush {
        owner: "acme".to_string(),
        repo: "app".to_string(),
        reference: GitRef::Branch("^main$".to_string()),
      },
    )
  }

  fn names(triggers: &[Trigger]) -> Vec<&str> {
    triggers.iter().map(|t| t.name.as_str()).collect()
  }

  #[tokio::test]
  async fn list_reflects_create_and_delete() {
    let mut server = Server::new_async().await;
    let create = server
      .mock("POST", "/v1/projects/proj/triggers")
      .match_body(Matcher::PartialJson(json!({
        "name": "t1",
        "github": {"owner": "acme", "name": "app", "push": {"branch": "^main$"}}
      })))
      .with_status(200)
      .with_body(trigger_json("id-1", "t1").to_string())
      .create_async()
      .await;
    let list_before = server
      .mock("GET", "/v1/projects/proj/triggers")
      .match_query(Matcher::Any)
      .with_status(200)
      .with_body(json!({"triggers": [trigger_json("id-0", "other"), trigger_json("id-1", "t1")]}).to_string())
      .create_async()
      .await;

    let client = client_for(&server);
    let created = client.create_trigger(&new_trigger("t1")).await.unwrap();
    assert_eq!(created.id, "id-1");
    assert!(names(&client.list_triggers().await.unwrap()).contains(&"t1"));

    let delete = server
      .mock("DELETE", "/v1/projects/proj/triggers/t1")
      .with_status(200)
      .with_body("{}")
      .create_async()
      .await;
    client.delete_trigger("t1").await.unwrap();

    list_before.remove_async().await;
    server
      .mock("GET", "/v1/projects/proj/triggers")
      .match_query(Matcher::Any)
      .with_status(200)
      .with_body(json!({"triggers": [trigger_json("id-0", "other")]}).to_string())
      .create_async()
      .await;
    assert!(!names(&client.list_triggers().await.unwrap()).contains(&"t1"));

    create.assert_async().await;
    delete.assert_async().await;
  }

  #[tokio::test]
  async fn create_duplicate_is_already_exists() {
    let mut server = Server::new_async().await;
    server
      .mock("POST", "/v1/projects/proj/triggers")
      .with_status(409)
      .with_body(r#"{"error":{"code":409,"message":"trigger (proj, t1) already exists","status":"ALREADY_EXISTS"}}"#)
      .create_async()
      .await;

    let err = client_for(&server).create_trigger(&new_trigger("t1")).await.unwrap_err();
    assert!(err.is_already_exists());
    assert!(err.to_string().contains("already exists"));
  }

  #[tokio::test]
  async fn get_missing_trigger_is_not_found() {
    let mut server = Server::new_async().await;
    server
      .mock("GET", "/v1/projects/proj/triggers/missing")
      .with_status(404)
      .with_body(r#"{"error":{"code":404,"message":"trigger not found"}}"#)
      .create_async()
      .await;

    let err = client_for(&server).get_trigger("missing").await.unwrap_err();
    assert!(err.is_not_found());
  }

  #[tokio::test]
  async fn repeated_delete_errors() {
    let mut server = Server::new_async().await;
    server
      .mock("DELETE", "/v1/projects/proj/triggers/t1")
      .with_status(404)
      .with_body(r#"{"error":{"code":404,"message":"trigger not found"}}"#)
      .create_async()
      .await;

    let err = client_for(&server).delete_trigger("t1").await.unwrap_err();
    assert!(err.is_not_found());
  }

  #[tokio::test]
  async fn list_drains_pages() {
    let mut server = Server::new_async().await;
    server
      .mock("GET", "/v1/projects/proj/triggers")
      .match_query(Matcher::Regex("^pageSize=100$".to_string()))
      .with_status(200)
      .with_body(json!({"triggers": [trigger_json("a", "first")], "nextPageToken": "p2"}).to_string())
      .create_async()
      .await;
    server
      .mock("GET", "/v1/projects/proj/triggers")
      .match_query(Matcher::UrlEncoded("pageToken".to_string(), "p2".to_string()))
      .with_status(200)
      .with_body(json!({"triggers": [trigger_json("b", "second")]}).to_string())
      .create_async()
      .await;

    let triggers = client_for(&server).list_triggers().await.unwrap();
    assert_eq!(names(&triggers), vec!["first", "second"]);
  }

  #[tokio::test]
  async fn list_tolerates_every_trigger_kind() {
    let mut server = Server::new_async().await;
    server
      .mock("GET", "/v1/projects/proj/triggers")
      .match_query(Matcher::Any)
      .with_status(200)
      .with_body(
        json!({"triggers": [
          trigger_json("a", "push"),
          {"id": "b", "name": "auto", "autodetect": true, "triggerTemplate": {"repoName": "infra", "branchName": "main"}},
          {"id": "c", "name": "topic", "filename": "ci.yaml", "pubsubConfig": {"topic": "projects/proj/topics/t"}},
          {"id": "d", "name": "hook", "build": {"steps": [{"name": "alpine"}]}, "webhookConfig": {"secret": "s"}},
          {"id": "e", "name": "repo-events", "autodetect": true, "repositoryEventConfig": {"repository": "r", "push": {"branch": "main"}}}
        ]})
        .to_string(),
      )
      .create_async()
      .await;

    let triggers = client_for(&server).list_triggers().await.unwrap();
    assert_eq!(names(&triggers), vec!["push", "auto", "topic", "hook", "repo-events"]);
    assert_eq!(triggers[1].config, TriggerConfig::Autodetect);
    assert!(matches!(triggers[1].event, TriggerEvent::SourceRepoPush { .. }));
    for trigger in &triggers[2..] {
      assert!(matches!(trigger.event, TriggerEvent::Other(_)), "{}", trigger.name);
    }
  }

  #[tokio::test]
  async fn run_posts_revision() {
    let mut server = Server::new_async().await;
    let run = server
      .mock("POST", "/v1/projects/proj/triggers/t1:run")
      .match_body(Matcher::Json(json!({"branchName": "release"})))
      .with_status(200)
      .with_body(json!({"name": "operations/x", "metadata": {"build": build_json("b-7", "QUEUED")}}).to_string())
      .create_async()
      .await;

    let build = client_for(&server)
      .run_trigger("t1", Some(&Revision::BranchName("release".to_string())))
      .await
      .unwrap();
    assert_eq!(build.id, "b-7");

    run.assert_async().await;
  }

  #[tokio::test]
  async fn regional_run_wraps_request() {
    let mut server = Server::new_async().await;
    let run = server
      .mock("POST", "/v1/projects/proj/locations/us-central1/triggers/t1:run")
      .match_body(Matcher::PartialJson(json!({
        "name": "projects/proj/locations/us-central1/triggers/t1",
        "triggerId": "t1",
        "source": {}
      })))
      .with_status(200)
      .with_body(json!({"name": "operations/y", "metadata": {"build": build_json("b-8", "QUEUED")}}).to_string())
      .create_async()
      .await;

    let build = regional_client_for(&server, "us-central1")
      .run_trigger("t1", None)
      .await
      .unwrap();
    assert_eq!(build.id, "b-8");

    run.assert_async().await;
  }
}
