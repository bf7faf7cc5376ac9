//! msquic build and release pipeline.
//!
//! This crate orchestrates the production of prebuilt msquic packages: a
//! parallel build matrix that drives the external packaging tool once per
//! platform, an extractor that turns each package descriptor into named
//! artifacts, and a release aggregator that publishes every platform's package
//! when the triggering ref is a version tag. It is used by the
//! `msquic-pipeline` CLI binary and can be driven programmatically for tests.
//!
//! # Modules
//!
//! - [`artifact`] - Artifact naming and the append-only artifact store
//! - [`cli`] - Command-line argument definitions
//! - [`config`] - TOML configuration and hosted-CI environment overrides
//! - [`descriptor`] - `msquic.env` package descriptor parsing
//! - [`download`] - Per-platform artifact download contract
//! - [`error`] - Top-level error type
//! - [`executor`] - External command execution with timeouts
//! - [`extractor`] - Descriptor extraction and artifact preparation
//! - [`git_ref`] - Triggering ref classification
//! - [`job`] - The steps of a single platform build job
//! - [`matrix`] - Parallel execution of platform jobs
//! - [`output`] - Progress and summary formatting
//! - [`package`] - Package archive inspection
//! - [`platform`] - The fixed set of platform targets and build jobs
//! - [`release`] - Release gating, aggregation, and publishing
//! - [`step_output`] - Step output files with delimited multi-line values
//! - [`trigger`] - Push-event path filtering
//! - [`workflow`] - The end-to-end workflow state machine

pub mod artifact;
pub mod cli;
pub mod config;
pub mod descriptor;
pub mod download;
pub mod error;
pub mod executor;
pub mod extractor;
pub mod git_ref;
pub mod job;
pub mod matrix;
pub mod output;
pub mod package;
pub mod platform;
pub mod release;
pub mod step_output;
pub mod trigger;
pub mod workflow;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
