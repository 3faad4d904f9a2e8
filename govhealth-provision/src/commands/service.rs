//! Provisioning service layer
//!
//! The service holds the AWS clients and provides the high-level operations
//! (deploy, teardown, teardown_stack) used by the CLI.

use crate::aws::cloudformation::CfnStacks;
use crate::aws::rds::RdsInstances;
use crate::aws::s3::Buckets;
use crate::error::{ProvisionError, ProvisionResult};
use crate::watch::{watch, StackOperation, WatchOutcome, WatchRequest};

pub struct ProvisionService {
    pub(crate) cfn: CfnStacks,
    pub(crate) rds: RdsInstances,
    pub(crate) s3: Buckets,
}

impl ProvisionService {
    /// Create a service bound to one region.
    ///
    /// Credentials come from the standard provider chain.
    pub async fn new(region: &str) -> ProvisionResult<Self> {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .load()
            .await;

        Ok(Self {
            cfn: CfnStacks::new(aws_sdk_cloudformation::Client::new(&config)),
            rds: RdsInstances::new(aws_sdk_rds::Client::new(&config)),
            s3: Buckets::new(aws_sdk_s3::Client::new(&config)),
        })
    }

    /// Watch a just-issued stack operation to its terminal state, converting
    /// unsuccessful outcomes into typed errors.
    pub(crate) async fn watch_to_completion(
        &self,
        stack_name: &str,
        operation: StackOperation,
    ) -> ProvisionResult<()> {
        let request = WatchRequest::new(stack_name, operation);
        match watch(&request, &self.cfn).await? {
            WatchOutcome::Succeeded => {
                log::info!("Stack {operation} completed for '{stack_name}'");
                Ok(())
            }
            WatchOutcome::Failed { status } => Err(ProvisionError::StackOperationFailed {
                stack: stack_name.to_string(),
                operation,
                reason: status,
            }),
            WatchOutcome::TimedOut => Err(ProvisionError::StackOperationTimedOut {
                stack: stack_name.to_string(),
                operation,
            }),
        }
    }
}
