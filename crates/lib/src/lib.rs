//! cloudbuild-lib: compose, submit and monitor Cloud Build jobs
//!
//! This crate provides:
//! - `build`: build definitions, their builder, and the YAML/JSON config document
//! - `substitution`: `$VAR` / `${_VAR}` parsing and resolution
//! - `trigger`: build trigger resources
//! - `client`: submission, status polling, trigger management, and
//!   artifact/log retrieval against the remote service
//! - `config`: the explicit client context and layered settings

pub mod build;
pub mod client;
pub mod config;
pub mod consts;
pub mod substitution;
pub mod trigger;
pub mod util;
