//! Ready-made steps for common builder images.

use super::types::Step;

pub const DOCKER_IMAGE: &str = "gcr.io/cloud-builders/docker";
pub const GCLOUD_IMAGE: &str = "gcr.io/google.com/cloudsdktool/cloud-sdk:slim";
pub const GSUTIL_IMAGE: &str = "gcr.io/cloud-builders/gsutil";

/// Run a shell script with `bash -c` inside `image`.
pub fn bash(image: impl Into<String>, script: impl Into<String>) -> Step {
  Step::new(image).entrypoint("bash").args(["-c".to_string(), script.into()])
}

/// `docker build -t <tag> <dir>`.
pub fn docker_build(tag: impl Into<String>, dir: impl Into<String>) -> Step {
  Step::new(DOCKER_IMAGE).args(["build".to_string(), "-t".to_string(), tag.into(), dir.into()])
}

/// `docker push <tag>`.
pub fn docker_push(tag: impl Into<String>) -> Step {
  Step::new(DOCKER_IMAGE).args(["push".to_string(), tag.into()])
}

/// A `gcloud` invocation.
pub fn gcloud<I, S>(args: I) -> Step
where
  I: IntoIterator<Item = S>,
  S: Into<String>,
{
  Step::new(GCLOUD_IMAGE).entrypoint("gcloud").args(args)
}

/// `gsutil cp <from> <to>`.
pub fn gsutil_cp(from: impl Into<String>, to: impl Into<String>) -> Step {
  Step::new(GSUTIL_IMAGE).args(["cp".to_string(), from.into(), to.into()])
}
