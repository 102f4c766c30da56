//! AWS-backed adapters, resources, and the `LambdaService` facade.
//!
//! This crate owns cloud integration details (ECR, Lambda, IAM, function
//! URLs) behind small object-safe traits so the provisioning recipe and
//! its tests run against in-memory implementations. Engine semantics live
//! in `crates/provision_core`.

pub mod adapters;
pub mod resources;
pub mod service;
