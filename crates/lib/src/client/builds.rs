//! Build submission and lookup.

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::error::ApiError;
use super::{Client, PAGE_SIZE};
use crate::build::{Build, BuildDefinition};

/// Long-running operation returned by create/retry/run calls.
#[derive(Debug, Deserialize)]
pub(crate) struct Operation {
  #[serde(default)]
  name: String,
  #[serde(default)]
  metadata: Option<OperationMetadata>,
}

#[derive(Debug, Deserialize)]
struct OperationMetadata {
  build: Build,
}

impl Operation {
  pub(crate) fn into_build(self) -> Result<Build, ApiError> {
    self
      .metadata
      .map(|m| m.build)
      .ok_or_else(|| ApiError::Decode(format!("operation '{}' carries no build metadata", self.name)))
  }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListBuildsResponse {
  #[serde(default)]
  builds: Vec<Build>,
  #[serde(default)]
  next_page_token: Option<String>,
}

impl Client {
  /// Submit a build. Returns immediately with the build in QUEUED or WORKING state.
  ///
  /// The definition is sent as-is; a malformed field comes back as
  /// [`ApiError::RemoteValidation`] with the service's message.
  pub async fn submit(&self, definition: &BuildDefinition) -> Result<Build, ApiError> {
    info!(project = %self.context().project, steps = definition.steps.len(), "submitting build");

    let url = self.cloudbuild_url(&["builds"])?;
    let operation: Operation = self.http().post_json(url, definition).await?;
    let build = operation.into_build()?;

    info!(build_id = %build.id, status = %build.status, "build submitted");
    Ok(build)
  }

  /// Fetch the current state of a build.
  pub async fn get_build(&self, build_id: &str) -> Result<Build, ApiError> {
    debug!(build_id, "fetching build");
    let url = self.cloudbuild_url(&["builds", build_id])?;
    self.http().get_json(url).await
  }

  /// Ask the service to cancel a running build. Does not wait for it to stop.
  pub async fn cancel_build(&self, build_id: &str) -> Result<Build, ApiError> {
    info!(build_id, "cancelling build");
    let url = self.cloudbuild_url(&["builds", format!("{build_id}:cancel").as_str()])?;
    let body = json!({
      "name": self.resource_name("builds", build_id),
      "projectId": self.context().project,
      "id": build_id,
    });
    self.http().post_json(url, &body).await
  }

  /// Re-run a finished build with the same definition and source.
  pub async fn retry_build(&self, build_id: &str) -> Result<Build, ApiError> {
    info!(build_id, "retrying build");
    let url = self.cloudbuild_url(&["builds", format!("{build_id}:retry").as_str()])?;
    let body = json!({
      "name": self.resource_name("builds", build_id),
      "projectId": self.context().project,
      "id": build_id,
    });
    let operation: Operation = self.http().post_json(url, &body).await?;
    operation.into_build()
  }

  /// List builds, newest first, optionally filtered with the service's filter syntax.
  ///
  /// Pages are drained until `limit` builds are collected or no pages remain.
  pub async fn list_builds(&self, filter: Option<&str>, limit: Option<usize>) -> Result<Vec<Build>, ApiError> {
    let mut builds = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
      let mut url = self.cloudbuild_url(&["builds"])?;
      {
        let mut query = url.query_pairs_mut();
        query.append_pair("pageSize", &PAGE_SIZE.to_string());
        if let Some(filter) = filter {
          query.append_pair("filter", filter);
        }
        if let Some(token) = &page_token {
          query.append_pair("pageToken", token);
        }
      }

      let page: ListBuildsResponse = self.http().get_json(url).await?;
      debug!(count = page.builds.len(), "received builds page");
      builds.extend(page.builds);

      if limit.is_some_and(|limit| builds.len() >= limit) {
        break;
      }
      match page.next_page_token.filter(|t| !t.is_empty()) {
        Some(token) => page_token = Some(token),
        None => break,
      }
    }

    if let Some(limit) = limit {
      builds.truncate(limit);
    }
    Ok(builds)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::build::{BuildStatus, Step};
  use crate::client::testutil::{build_json, client_for, regional_client_for};
  use mockito::{Matcher, Server};

  fn definition() -> BuildDefinition {
    BuildDefinition::builder()
      .step(Step::new("alpine").args(["echo", "hi"]))
      .build()
      .unwrap()
  }

  fn operation_json(build: serde_json::Value) -> String {
    serde_json::json!({
      "name": "operations/build/proj/b-1",
      "metadata": {
        "@type": "type.googleapis.com/google.devtools.cloudbuild.v1.BuildOperationMetadata",
        "build": build
      }
    })
    .to_string()
  }

  #[tokio::test]
  async fn submit_then_fetch_reports_queued_build() {
    let mut server = Server::new_async().await;
    let create = server
      .mock("POST", "/v1/projects/proj/builds")
      .match_header("authorization", "Bearer test-token")
      .match_body(Matcher::PartialJson(serde_json::json!({
        "steps": [{"name": "alpine", "args": ["echo", "hi"]}]
      })))
      .with_status(200)
      .with_body(operation_json(build_json("b-1", "QUEUED")))
      .create_async()
      .await;
    let get = server
      .mock("GET", "/v1/projects/proj/builds/b-1")
      .with_status(200)
      .with_body(build_json("b-1", "WORKING").to_string())
      .create_async()
      .await;

    let client = client_for(&server);
    let submitted = client.submit(&definition()).await.unwrap();
    assert_eq!(submitted.id, "b-1");
    assert_eq!(submitted.status, BuildStatus::Queued);

    let fetched = client.get_build(&submitted.id).await.unwrap();
    assert_eq!(fetched.id, submitted.id);
    assert!(matches!(fetched.status, BuildStatus::Queued | BuildStatus::Working));

    create.assert_async().await;
    get.assert_async().await;
  }

  #[tokio::test]
  async fn submit_surfaces_validation_error() {
    let mut server = Server::new_async().await;
    server
      .mock("POST", "/v1/projects/proj/builds")
      .with_status(400)
      .with_body(r#"{"error":{"code":400,"message":"invalid .steps field: build step 0 must specify name","status":"INVALID_ARGUMENT"}}"#)
      .create_async()
      .await;

    let client = client_for(&server);
    let err = client.submit(&definition()).await.unwrap_err();
    match err {
      ApiError::RemoteValidation { status, message } => {
        assert_eq!(status, 400);
        assert_eq!(message, "invalid .steps field: build step 0 must specify name");
      }
      other => panic!("unexpected error: {other:?}"),
    }
  }

  #[tokio::test]
  async fn submit_uses_regional_parent() {
    let mut server = Server::new_async().await;
    let create = server
      .mock("POST", "/v1/projects/proj/locations/europe-west1/builds")
      .with_status(200)
      .with_body(operation_json(build_json("b-9", "QUEUED")))
      .create_async()
      .await;

    let client = regional_client_for(&server, "europe-west1");
    let build = client.submit(&definition()).await.unwrap();
    assert_eq!(build.id, "b-9");

    create.assert_async().await;
  }

  #[tokio::test]
  async fn operation_without_build_is_decode_error() {
    let mut server = Server::new_async().await;
    server
      .mock("POST", "/v1/projects/proj/builds")
      .with_status(200)
      .with_body(r#"{"name":"operations/x"}"#)
      .create_async()
      .await;

    let err = client_for(&server).submit(&definition()).await.unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)));
  }

  #[tokio::test]
  async fn get_missing_build_is_not_found() {
    let mut server = Server::new_async().await;
    server
      .mock("GET", "/v1/projects/proj/builds/nope")
      .with_status(404)
      .with_body(r#"{"error":{"code":404,"message":"Requested entity was not found."}}"#)
      .create_async()
      .await;

    let err = client_for(&server).get_build("nope").await.unwrap_err();
    assert!(err.is_not_found());
  }

  #[tokio::test]
  async fn id_with_slash_is_one_segment() {
    let mut server = Server::new_async().await;
    let get = server
      .mock("GET", "/v1/projects/proj/builds/b-1%2Fcancel")
      .with_status(404)
      .with_body(r#"{"error":{"code":404,"message":"Requested entity was not found."}}"#)
      .create_async()
      .await;

    let err = client_for(&server).get_build("b-1/cancel").await.unwrap_err();
    assert!(err.is_not_found());
    get.assert_async().await;
  }

  #[tokio::test]
  async fn cancel_posts_to_cancel_method() {
    let mut server = Server::new_async().await;
    let cancel = server
      .mock("POST", "/v1/projects/proj/builds/b-1:cancel")
      .match_body(Matcher::PartialJson(serde_json::json!({"id": "b-1", "projectId": "proj"})))
      .with_status(200)
      .with_body(build_json("b-1", "CANCELLED").to_string())
      .create_async()
      .await;

    let build = client_for(&server).cancel_build("b-1").await.unwrap();
    assert_eq!(build.status, BuildStatus::Cancelled);

    cancel.assert_async().await;
  }

  #[tokio::test]
  async fn retry_returns_new_build() {
    let mut server = Server::new_async().await;
    server
      .mock("POST", "/v1/projects/proj/builds/b-1:retry")
      .with_status(200)
      .with_body(operation_json(build_json("b-2", "QUEUED")))
      .create_async()
      .await;

    let build = client_for(&server).retry_build("b-1").await.unwrap();
    assert_eq!(build.id, "b-2");
  }

  #[tokio::test]
  async fn list_drains_pages() {
    let mut server = Server::new_async().await;
    let first = server
      .mock("GET", Matcher::Regex(r"^/v1/projects/proj/builds(\?|$)".to_string()))
      .match_query(Matcher::Regex("^pageSize=100$".to_string()))
      .with_status(200)
      .with_body(
        serde_json::json!({"builds": [build_json("b-3", "WORKING"), build_json("b-2", "SUCCESS")], "nextPageToken": "next"})
          .to_string(),
      )
      .create_async()
      .await;
    let second = server
      .mock("GET", Matcher::Regex(r"^/v1/projects/proj/builds(\?|$)".to_string()))
      .match_query(Matcher::UrlEncoded("pageToken".to_string(), "next".to_string()))
      .with_status(200)
      .with_body(serde_json::json!({"builds": [build_json("b-1", "FAILURE")]}).to_string())
      .create_async()
      .await;

    let builds = client_for(&server).list_builds(None, None).await.unwrap();
    let ids: Vec<_> = builds.iter().map(|b| b.id.as_str()).collect();
    assert_eq!(ids, vec!["b-3", "b-2", "b-1"]);

    first.assert_async().await;
    second.assert_async().await;
  }

  #[tokio::test]
  async fn list_respects_limit_and_filter() {
    let mut server = Server::new_async().await;
    let page = server
      .mock("GET", Matcher::Regex(r"^/v1/projects/proj/builds(\?|$)".to_string()))
      .match_query(Matcher::UrlEncoded("filter".to_string(), "status=\"SUCCESS\"".to_string()))
      .with_status(200)
      .with_body(
        serde_json::json!({"builds": [build_json("b-3", "SUCCESS"), build_json("b-2", "SUCCESS")], "nextPageToken": "more"})
          .to_string(),
      )
      .expect(1)
      .create_async()
      .await;

    let builds = client_for(&server)
      .list_builds(Some("status=\"SUCCESS\""), Some(1))
      .await
      .unwrap();
    assert_eq!(builds.len(), 1);
    assert_eq!(builds[0].id, "b-3");

    page.assert_async().await;
  }
}
