//! Remote operations against the build service and object storage.
//!
//! A [`Client`] is built from an explicit [`Context`]; each operation is a
//! single request/response except [`Client::wait`], which polls, and the list
//! operations, which drain every page before returning.

pub mod builds;
pub mod error;
pub mod http;
pub mod poll;
pub mod storage;
pub mod triggers;

use reqwest::Url;

pub use error::ApiError;
pub use http::HttpClient;
pub use poll::{WaitError, WaitOptions};
pub use storage::{GcsPath, StorageError};

use crate::config::Context;

/// Page size requested from list endpoints.
pub(crate) const PAGE_SIZE: usize = 100;

#[derive(Clone)]
pub struct Client {
  http: HttpClient,
  context: Context,
}

impl Client {
  pub fn new(context: Context) -> Result<Self, ApiError> {
    let http = HttpClient::new(context.credentials.clone())?;
    Ok(Self { http, context })
  }

  pub fn context(&self) -> &Context {
    &self.context
  }

  /// `{cloudbuild}/{parent}/{segments...}`. Each entry of `segments` is one
  /// path segment; a `/` inside an id is percent-encoded.
  pub(crate) fn cloudbuild_url(&self, segments: &[&str]) -> Result<Url, ApiError> {
    let parent = self.context.parent();
    let segments = parent
      .split('/')
      .filter(|s| !s.is_empty())
      .chain(segments.iter().copied());
    http::join_url(&self.context.endpoints.cloudbuild, segments)
  }

  /// Fully qualified resource name, e.g. `projects/p/locations/r/builds/123`.
  pub(crate) fn resource_name(&self, collection: &str, id: &str) -> String {
    format!("{}/{}/{}", self.context.parent(), collection, id)
  }

  pub(crate) fn storage_url<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url, ApiError> {
    http::join_url(&self.context.endpoints.storage, segments)
  }

  pub(crate) fn http(&self) -> &HttpClient {
    &self.http
  }
}
