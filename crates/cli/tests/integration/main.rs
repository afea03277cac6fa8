//! Integration tests for the gcb binary against a mock service.

mod build_tests;
mod common;
mod config_tests;
mod trigger_tests;
