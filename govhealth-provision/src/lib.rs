//! This crate provides the core logic for gov-health sandbox operations:
//! - the bounded stack-operation watcher
//! - CloudFormation, RDS, and S3 control-plane wrappers
//! - deploy and teardown services gated by injected operator confirmation
//!

mod aws;
pub mod commands;
pub mod confirm;
mod error;
pub mod watch;

// Keep the public surface small; everything else stays crate-private.
pub use aws::AwsError;
pub use commands::{
    DeployConfig, DeploySummary, ProvisionService, StackTeardownReport, TeardownConfig,
    TeardownReport, DEFAULT_ENVIRONMENT, FOUNDATION_TEMPLATE, INTEGRATION_TEMPLATE,
};
pub use error::{ProvisionError, ProvisionResult};
