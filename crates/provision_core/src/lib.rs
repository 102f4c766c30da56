//! Deterministic provisioning engine primitives.
//!
//! This crate owns the resource model, dependency-ordered planning and
//! apply, state tracking, and deferred outputs. It intentionally excludes
//! cloud SDK concerns; AWS adapters and concrete resources live in
//! `crates/provision_aws`.

pub mod engine;
pub mod error;
pub mod output;
pub mod resource;
pub mod spec;
pub mod state;
