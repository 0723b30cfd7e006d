//! Test harnesses for the Weir emitter.
//!
//! Provides `TestEmission` for running the full pipeline over fixture
//! programs, plus CLI regression tests for the `weir` binary.

#[cfg(test)]
pub mod cli;
pub mod emission;

pub use emission::{fixture, fixtures_dir, TestEmission, TestError};
