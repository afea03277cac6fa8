//! Artifact and log retrieval, and source upload, over the object storage JSON API.

use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use super::error::ApiError;
use super::{Client, PAGE_SIZE};
use crate::build::{Build, SourceReference};
use crate::util::archive;

#[derive(Debug, Error)]
pub enum StorageError {
  #[error("invalid storage URI '{0}' (expected gs://bucket/object)")]
  InvalidUri(String),

  #[error("build {0} declares no artifact location")]
  NoArtifacts(String),

  #[error("build {0} has no logs bucket")]
  NoLogsBucket(String),

  #[error(transparent)]
  Api(#[from] ApiError),

  #[error("failed to write {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("object '{0}' would be written outside the destination directory")]
  UnsafePath(String),

  #[error("failed to archive {path}: {source}")]
  Archive {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// A `gs://bucket/object` address. `object` may be empty or a prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcsPath {
  pub bucket: String,
  pub object: String,
}

impl GcsPath {
  pub fn new(bucket: impl Into<String>, object: impl Into<String>) -> Self {
    Self {
      bucket: bucket.into(),
      object: object.into(),
    }
  }

  pub fn parse(uri: &str) -> Result<Self, StorageError> {
    let rest = uri
      .strip_prefix("gs://")
      .ok_or_else(|| StorageError::InvalidUri(uri.to_string()))?;
    let (bucket, object) = rest.split_once('/').unwrap_or((rest, ""));
    if bucket.is_empty() {
      return Err(StorageError::InvalidUri(uri.to_string()));
    }
    Ok(Self::new(bucket, object))
  }

  /// The object treated as a directory prefix: empty, or ending in `/`.
  fn as_prefix(&self) -> String {
    if self.object.is_empty() || self.object.ends_with('/') {
      self.object.clone()
    } else {
      format!("{}/", self.object)
    }
  }

  fn join(&self, name: &str) -> GcsPath {
    GcsPath::new(&self.bucket, format!("{}{}", self.as_prefix(), name))
  }
}

impl fmt::Display for GcsPath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "gs://{}/{}", self.bucket, self.object)
  }
}

#[derive(Debug, Deserialize)]
struct ObjectResource {
  name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListObjectsResponse {
  #[serde(default)]
  items: Vec<ObjectResource>,
  #[serde(default)]
  next_page_token: Option<String>,
}

impl Client {
  /// Names of every object in `bucket` starting with `prefix`, all pages drained.
  pub async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, ApiError> {
    let mut names = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
      let mut url = self.storage_url(["storage", "v1", "b", bucket, "o"])?;
      {
        let mut query = url.query_pairs_mut();
        query.append_pair("maxResults", &PAGE_SIZE.to_string());
        if !prefix.is_empty() {
          query.append_pair("prefix", prefix);
        }
        if let Some(token) = &page_token {
          query.append_pair("pageToken", token);
        }
      }

      let page: ListObjectsResponse = self.http().get_json(url).await?;
      names.extend(page.items.into_iter().map(|item| item.name));

      match page.next_page_token.filter(|t| !t.is_empty()) {
        Some(token) => page_token = Some(token),
        None => break,
      }
    }

    debug!(bucket, prefix, count = names.len(), "listed objects");
    Ok(names)
  }

  pub async fn download_object(&self, path: &GcsPath) -> Result<Vec<u8>, ApiError> {
    debug!(object = %path, "downloading object");
    let mut url = self.storage_url(["storage", "v1", "b", &path.bucket, "o", &path.object])?;
    url.query_pairs_mut().append_pair("alt", "media");
    self.http().get_bytes(url).await
  }

  pub async fn upload_object(&self, path: &GcsPath, body: Vec<u8>, content_type: &str) -> Result<(), ApiError> {
    debug!(object = %path, bytes = body.len(), "uploading object");
    let mut url = self.storage_url(["upload", "storage", "v1", "b", &path.bucket, "o"])?;
    url
      .query_pairs_mut()
      .append_pair("uploadType", "media")
      .append_pair("name", &path.object);
    let _: serde_json::Value = self.http().post_bytes(url, body, content_type).await?;
    Ok(())
  }

  /// Download every object under the build's artifact location into `dest`.
  ///
  /// Each object lands at its path relative to the location prefix. Existing
  /// files are overwritten. Returns the written paths in listing order.
  pub async fn fetch_artifacts(&self, build: &Build, dest: &Path) -> Result<Vec<PathBuf>, StorageError> {
    let location = build
      .artifact_location()
      .ok_or_else(|| StorageError::NoArtifacts(build.id.clone()))?;
    let root = GcsPath::parse(location)?;
    let prefix = root.as_prefix();

    info!(build_id = %build.id, location, dest = %dest.display(), "fetching artifacts");
    let names = self.list_objects(&root.bucket, &prefix).await?;

    let mut written = Vec::with_capacity(names.len());
    for name in names {
      let relative = name.strip_prefix(&prefix).unwrap_or(&name);
      if relative.is_empty() || relative.ends_with('/') {
        continue;
      }
      let target = dest.join(safe_relative(relative)?);

      let bytes = self.download_object(&GcsPath::new(&root.bucket, &name)).await?;
      write_file(&target, &bytes).await?;
      debug!(object = %name, path = %target.display(), "artifact written");
      written.push(target);
    }

    info!(build_id = %build.id, count = written.len(), "artifacts fetched");
    Ok(written)
  }

  /// The complete build log, line by line, read from the start.
  pub async fn fetch_logs(&self, build: &Build) -> Result<Vec<String>, StorageError> {
    let path = log_path(build)?;
    let bytes = self.download_object(&path).await?;
    Ok(String::from_utf8_lossy(&bytes).lines().map(str::to_string).collect())
  }

  /// Log text if the log object exists yet.
  pub(crate) async fn log_text(&self, build: &Build) -> Result<Option<String>, StorageError> {
    let path = log_path(build)?;
    match self.download_object(&path).await {
      Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
      Err(e) if e.is_not_found() => Ok(None),
      Err(e) => Err(e.into()),
    }
  }

  /// Package `dir` as a gzipped tarball, upload it to `bucket/object`, and
  /// return the source reference for a build definition.
  pub async fn upload_source(&self, dir: &Path, bucket: &str, object: &str) -> Result<SourceReference, StorageError> {
    let root = dunce::canonicalize(dir).map_err(|source| StorageError::Archive {
      path: dir.to_path_buf(),
      source,
    })?;

    let archive_root = root.clone();
    let bytes = tokio::task::spawn_blocking(move || archive::tar_gz_dir(&archive_root))
      .await
      .map_err(|e| StorageError::Archive {
        path: root.clone(),
        source: io::Error::other(e),
      })?
      .map_err(|source| StorageError::Archive {
        path: root.clone(),
        source,
      })?;

    let target = GcsPath::new(bucket, object);
    info!(dir = %root.display(), object = %target, bytes = bytes.len(), "uploading source");
    self.upload_object(&target, bytes, "application/gzip").await?;

    Ok(SourceReference::storage(bucket, object))
  }
}

fn log_path(build: &Build) -> Result<GcsPath, StorageError> {
  let bucket = build
    .definition
    .logs_bucket
    .as_deref()
    .ok_or_else(|| StorageError::NoLogsBucket(build.id.clone()))?;
  let bucket = if bucket.starts_with("gs://") {
    GcsPath::parse(bucket)?
  } else {
    GcsPath::new(bucket, "")
  };
  Ok(bucket.join(&format!("log-{}.txt", build.id)))
}

/// Reject object names that would escape the destination directory.
fn safe_relative(name: &str) -> Result<PathBuf, StorageError> {
  let path = Path::new(name);
  if path
    .components()
    .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
  {
    Ok(path.to_path_buf())
  } else {
    Err(StorageError::UnsafePath(name.to_string()))
  }
}

async fn write_file(target: &Path, bytes: &[u8]) -> Result<(), StorageError> {
  let write_err = |source| StorageError::Write {
    path: target.to_path_buf(),
    source,
  };
  if let Some(parent) = target.parent() {
    tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
  }
  tokio::fs::write(target, bytes).await.map_err(write_err)
}
