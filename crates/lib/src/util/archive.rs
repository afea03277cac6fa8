//! Packaging a source directory as a gzipped tarball.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;
use walkdir::WalkDir;

/// Directory names never shipped as build source.
const SKIPPED_DIRS: &[&str] = &[".git", "target", "node_modules"];

/// Create an in-memory `.tar.gz` of `dir`, with paths relative to `dir`.
///
/// Version-control and build-output directories are skipped.
pub fn tar_gz_dir(dir: &Path) -> io::Result<Vec<u8>> {
  let encoder = GzEncoder::new(Vec::new(), Compression::default());
  let mut builder = tar::Builder::new(encoder);
  builder.follow_symlinks(false);

  let walker = WalkDir::new(dir)
    .min_depth(1)
    .sort_by_file_name()
    .into_iter()
    .filter_entry(|entry| {
      !(entry.file_type().is_dir() && SKIPPED_DIRS.iter().any(|skip| entry.file_name() == *skip))
    });

  for entry in walker {
    let entry = entry.map_err(io::Error::other)?;
    let relative = entry
      .path()
      .strip_prefix(dir)
      .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    if entry.file_type().is_dir() {
      builder.append_dir(relative, entry.path())?;
    } else if entry.file_type().is_file() {
      let mut file = BufReader::new(File::open(entry.path())?);
      let mut header = tar::Header::new_gnu();
      header.set_metadata(&entry.metadata().map_err(io::Error::other)?);
      builder.append_data(&mut header, relative, &mut file)?;
    } else {
      builder.append_path_with_name(entry.path(), relative)?;
    }
  }

  builder.into_inner()?.finish()
}
