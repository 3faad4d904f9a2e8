//! Commands module - service layer for stack provisioning operations

mod deploy;
pub(crate) mod service;
mod teardown;

pub use deploy::{
    DeployConfig, DeploySummary, DEFAULT_ENVIRONMENT, FOUNDATION_TEMPLATE, INTEGRATION_TEMPLATE,
};
pub use service::ProvisionService;
pub use teardown::{StackTeardownReport, TeardownConfig, TeardownReport};

pub(crate) fn foundation_stack_name(environment: &str) -> String {
    format!("{environment}-foundation")
}

pub(crate) fn integration_stack_name(environment: &str) -> String {
    format!("{environment}-integration")
}
