//! Shared types for the runway workspace.
//!
//! Keep the deployment document model and the platform wire shapes here so the
//! orchestrator and the CLI agree on a single definition.

#![warn(missing_docs)]

/// Deployment document model (`deploy.yaml`).
pub mod config;
/// Wire DTOs for the serverless platform and secret store APIs.
pub mod platform;
