//! Shared utilities.

pub mod archive;
