//! Bearer-authenticated JSON transport.

use std::time::Duration;

use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response, Url, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::error::ApiError;
use crate::config::Credentials;

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Thin wrapper over `reqwest` that attaches credentials and maps failures
/// onto [`ApiError`]. Every call is a single attempt.
#[derive(Clone)]
pub struct HttpClient {
  client: ReqwestClient,
  credentials: Credentials,
}

impl HttpClient {
  pub fn new(credentials: Credentials) -> Result<Self, ApiError> {
    let client = ReqwestClient::builder()
      .timeout(REQUEST_TIMEOUT)
      .user_agent(concat!("cloudbuild-rs/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(ApiError::Transient)?;
    Ok(Self { client, credentials })
  }

  pub async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
    let response = self.send(self.client.request(Method::GET, url)).await?;
    decode(response).await
  }

  pub async fn post_json<B, T>(&self, url: Url, body: &B) -> Result<T, ApiError>
  where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
  {
    let response = self.send(self.client.request(Method::POST, url).json(body)).await?;
    decode(response).await
  }

  pub async fn delete(&self, url: Url) -> Result<(), ApiError> {
    self.send(self.client.request(Method::DELETE, url)).await?;
    Ok(())
  }

  /// Raw response body, for object downloads.
  pub async fn get_bytes(&self, url: Url) -> Result<Vec<u8>, ApiError> {
    let response = self.send(self.client.request(Method::GET, url)).await?;
    let bytes = response.bytes().await.map_err(ApiError::Transient)?;
    Ok(bytes.to_vec())
  }

  /// POST a raw body, for object uploads.
  pub async fn post_bytes<T: DeserializeOwned>(&self, url: Url, body: Vec<u8>, content_type: &str) -> Result<T, ApiError> {
    let request = self
      .client
      .request(Method::POST, url)
      .header(header::CONTENT_TYPE, content_type)
      .body(body);
    let response = self.send(request).await?;
    decode(response).await
  }

  async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
    let request = request.bearer_auth(self.credentials.token());
    let response = request.send().await.map_err(|e| {
      warn!(error = %e, "request did not complete");
      ApiError::Transient(e)
    })?;

    let status = response.status();
    debug!(url = %response.url(), %status, "response received");
    if status.is_success() {
      return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let err = ApiError::from_response(status, &body);
    debug!(error = %err, "request failed");
    Err(err)
  }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
  let bytes = response.bytes().await.map_err(ApiError::Transient)?;
  // Empty bodies (e.g. DELETE-style answers) decode as `{}`
  let bytes: &[u8] = if bytes.is_empty() { b"{}" } else { &bytes };
  serde_json::from_slice(bytes).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Append `segments` to `base`, percent-encoding each one.
pub fn join_url<'a>(base: &str, segments: impl IntoIterator<Item = &'a str>) -> Result<Url, ApiError> {
  let invalid = |message: String| ApiError::InvalidUrl {
    url: base.to_string(),
    message,
  };
  let mut url = Url::parse(base).map_err(|e| invalid(e.to_string()))?;
  url
    .path_segments_mut()
    .map_err(|_| invalid("URL cannot be a base".to_string()))?
    .pop_if_empty()
    .extend(segments);
  Ok(url)
}

#[cfg(test)]
mod tests {
  use super::*;
  use mockito::{Matcher, Server};
  use serde::Deserialize;

  #[derive(Debug, Deserialize)]
  struct Echo {
    message: String,
  }

  fn client() -> HttpClient {
    HttpClient::new(Credentials::bearer("test-token")).unwrap()
  }

  #[test]
  fn join_url_encodes_segments() {
    let url = join_url("https://storage.googleapis.com", ["storage", "v1", "b", "bkt", "o", "dir/file.txt"]).unwrap();
    assert_eq!(url.as_str(), "https://storage.googleapis.com/storage/v1/b/bkt/o/dir%2Ffile.txt");

    let url = join_url("https://cloudbuild.googleapis.com/v1/", ["projects", "p", "builds", "abc:cancel"]).unwrap();
    assert_eq!(url.as_str(), "https://cloudbuild.googleapis.com/v1/projects/p/builds/abc:cancel");
  }

  #[tokio::test]
  async fn get_sends_bearer_token() {
    let mut server = Server::new_async().await;
    let mock = server
      .mock("GET", "/v1/thing")
      .match_header("authorization", "Bearer test-token")
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(r#"{"message":"ok"}"#)
      .create_async()
      .await;

    let url = join_url(&server.url(), ["v1", "thing"]).unwrap();
    let echo: Echo = client().get_json(url).await.unwrap();
    assert_eq!(echo.message, "ok");

    mock.assert_async().await;
  }

  #[tokio::test]
  async fn post_sends_json_body() {
    let mut server = Server::new_async().await;
    let mock = server
      .mock("POST", "/v1/thing")
      .match_header("content-type", "application/json")
      .match_body(Matcher::Json(serde_json::json!({"name": "x"})))
      .with_status(200)
      .with_body(r#"{"message":"created"}"#)
      .create_async()
      .await;

    let url = join_url(&server.url(), ["v1", "thing"]).unwrap();
    let echo: Echo = client()
      .post_json(url, &serde_json::json!({"name": "x"}))
      .await
      .unwrap();
    assert_eq!(echo.message, "created");

    mock.assert_async().await;
  }

  #[tokio::test]
  async fn error_status_is_mapped() {
    let mut server = Server::new_async().await;
    let mock = server
      .mock("DELETE", "/v1/thing")
      .with_status(404)
      .with_body(r#"{"error":{"code":404,"message":"thing not found"}}"#)
      .create_async()
      .await;

    let url = join_url(&server.url(), ["v1", "thing"]).unwrap();
    let err = client().delete(url).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "not found: thing not found");

    mock.assert_async().await;
  }

  #[tokio::test]
  async fn unreachable_host_is_transient() {
    // Nothing listens on port 9 (discard) in the test environment
    let url = join_url("http://127.0.0.1:9", ["v1"]).unwrap();
    let err = client().get_json::<Echo>(url).await.unwrap_err();
    assert!(err.is_transient());
  }
}
