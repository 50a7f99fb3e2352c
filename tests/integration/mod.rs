//! Integration tests for scope-once
//!
//! These tests drive whole suites through the record/replay engine.

#[path = "../common/mod.rs"]
pub mod common;

pub mod ambitious;
pub mod before_once;
pub mod hooks;
pub mod let_once;
pub mod lifecycle;
pub mod snapshot_roundtrip;
