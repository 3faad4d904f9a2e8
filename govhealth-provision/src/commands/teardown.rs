//! Teardown logic: integration stack first, then the foundation stack, then
//! orphaned snapshot cleanup.

use crate::confirm::Confirmation;
use crate::error::{ProvisionError, ProvisionResult};
use crate::watch::StackOperation;

const RDS_INSTANCE_TYPE: &str = "AWS::RDS::DBInstance";
const S3_BUCKET_TYPE: &str = "AWS::S3::Bucket";
const LOG_GROUP_TYPE: &str = "AWS::Logs::LogGroup";

#[derive(Debug, Clone)]
pub struct TeardownConfig {
    pub environment: String,
}

impl Default for TeardownConfig {
    fn default() -> Self {
        Self {
            environment: super::deploy::DEFAULT_ENVIRONMENT.to_string(),
        }
    }
}

/// What a full-environment teardown actually did.
#[derive(Debug, Default)]
pub struct TeardownReport {
    pub integration_deleted: bool,
    pub foundation_deleted: bool,
    pub emptied_buckets: Vec<String>,
    pub deleted_snapshots: Vec<String>,
    pub db_instance: Option<String>,
}

/// Result of a single-stack teardown.
#[derive(Debug)]
pub struct StackTeardownReport {
    pub stack: String,
    pub deleted_snapshots: Vec<String>,
    pub db_instance: Option<String>,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct BucketRoles {
    phi: Option<String>,
    log: Option<String>,
}

impl super::service::ProvisionService {
    /// Delete the complete environment. The integration stack goes first so
    /// the foundation's VPC and KMS resources are no longer referenced.
    pub async fn teardown(
        &self,
        config: &TeardownConfig,
        confirm: &dyn Confirmation,
    ) -> ProvisionResult<TeardownReport> {
        if !confirm.confirm_phrase(
            "This will delete ALL resources of the environment.",
            "DELETE",
        ) {
            return Err(ProvisionError::Cancelled);
        }

        let mut report = TeardownReport::default();

        let integration = super::integration_stack_name(&config.environment);
        if self.cfn.stack_exists(&integration).await? {
            report.db_instance = self.prepare_rds_for_deletion(&integration).await?;
            log::info!("Deleting integration stack '{integration}'");
            self.cfn.delete_stack(&integration).await?;
            self.watch_to_completion(&integration, StackOperation::Delete)
                .await?;
            report.integration_deleted = true;
        } else {
            log::info!("Integration stack '{integration}' not found, skipping");
        }

        let foundation = super::foundation_stack_name(&config.environment);
        if self.cfn.stack_exists(&foundation).await? {
            let buckets = self.cfn.resources_of_type(&foundation, S3_BUCKET_TYPE).await?;
            let roles = classify_buckets(&buckets);
            for bucket in [roles.phi, roles.log].into_iter().flatten() {
                if confirm.confirm(&format!("Empty bucket '{bucket}'?")) {
                    match self.s3.empty_bucket(&bucket).await {
                        Ok(removed) => {
                            log::info!("Emptied bucket '{bucket}' ({removed} keys)");
                            report.emptied_buckets.push(bucket);
                        }
                        Err(err) => log::warn!("Could not empty bucket '{bucket}': {err}"),
                    }
                }
            }
            log::info!("Deleting foundation stack '{foundation}'");
            self.cfn.delete_stack(&foundation).await?;
            self.watch_to_completion(&foundation, StackOperation::Delete)
                .await?;
            report.foundation_deleted = true;
        } else {
            log::info!("Foundation stack '{foundation}' not found, skipping");
        }

        if let Some(db_instance) = report.db_instance.clone() {
            report.deleted_snapshots = self.cleanup_snapshots(&db_instance, confirm).await;
        }

        log::info!("Secrets remain restorable for their recovery window (7-30 days)");
        Ok(report)
    }

    /// Delete one stack by name, with the same RDS and snapshot handling.
    pub async fn teardown_stack(
        &self,
        stack_name: &str,
        confirm: &dyn Confirmation,
    ) -> ProvisionResult<StackTeardownReport> {
        if !self.cfn.stack_exists(stack_name).await? {
            return Err(ProvisionError::StackNotFound {
                stack: stack_name.to_string(),
            });
        }

        let db_instance = self.prepare_rds_for_deletion(stack_name).await?;

        let log_groups = self.cfn.resources_of_type(stack_name, LOG_GROUP_TYPE).await?;
        if log_groups.is_empty() {
            log::info!("No log groups found");
        } else {
            log::info!("Log groups deleted with the stack: {}", log_groups.join(", "));
        }

        if !confirm.confirm(&format!(
            "Delete stack '{stack_name}' and all of its resources?"
        )) {
            return Err(ProvisionError::Cancelled);
        }

        self.cfn.delete_stack(stack_name).await?;
        self.watch_to_completion(stack_name, StackOperation::Delete)
            .await?;

        let deleted_snapshots = match &db_instance {
            Some(instance) => self.cleanup_snapshots(instance, confirm).await,
            None => Vec::new(),
        };

        Ok(StackTeardownReport {
            stack: stack_name.to_string(),
            deleted_snapshots,
            db_instance,
        })
    }

    /// Deletion protection must be cleared before CloudFormation can drop the
    /// instance. Failures here are warnings: the stack delete will surface
    /// the real problem if protection is still on.
    async fn prepare_rds_for_deletion(&self, stack_name: &str) -> ProvisionResult<Option<String>> {
        let instances = self
            .cfn
            .resources_of_type(stack_name, RDS_INSTANCE_TYPE)
            .await?;
        if instances.is_empty() {
            log::info!("No RDS instance found in '{stack_name}'");
            return Ok(None);
        }

        for instance in &instances {
            log::info!("Found RDS instance: {instance}");
            if let Err(err) = self.disable_protection_and_settle(instance).await {
                log::warn!("Could not disable deletion protection on '{instance}': {err}");
            }
        }
        Ok(instances.into_iter().next())
    }

    async fn disable_protection_and_settle(&self, instance: &str) -> ProvisionResult<()> {
        self.rds.disable_deletion_protection(instance).await?;
        log::info!("Waiting for RDS instance '{instance}' to be available");
        self.rds.wait_until_available(instance).await?;
        Ok(())
    }

    /// Offer to delete final snapshots left behind by the instance. Individual
    /// delete failures are warnings.
    async fn cleanup_snapshots(
        &self,
        db_instance: &str,
        confirm: &dyn Confirmation,
    ) -> Vec<String> {
        let snapshots = match self.rds.snapshots_for_instance(db_instance).await {
            Ok(snapshots) => snapshots,
            Err(err) => {
                log::warn!("Could not check for snapshots: {err}");
                return Vec::new();
            }
        };
        if snapshots.is_empty() {
            log::info!("No orphaned snapshots found");
            return Vec::new();
        }

        log::info!("Found DB snapshots: {}", snapshots.join(", "));
        if !confirm.confirm("Delete these snapshots?") {
            return Vec::new();
        }

        let mut deleted = Vec::new();
        for snapshot in snapshots {
            match self.rds.delete_snapshot(&snapshot).await {
                Ok(()) => deleted.push(snapshot),
                Err(err) => log::warn!("Could not delete snapshot '{snapshot}': {err}"),
            }
        }
        deleted
    }
}

/// Pick out the PHI and log buckets by naming convention. First match of
/// each role wins.
fn classify_buckets(buckets: &[String]) -> BucketRoles {
    let mut roles = BucketRoles::default();
    for bucket in buckets {
        let lower = bucket.to_ascii_lowercase();
        if lower.contains("phi") && roles.phi.is_none() {
            roles.phi = Some(bucket.clone());
        } else if lower.contains("log") && roles.log.is_none() {
            roles.log = Some(bucket.clone());
        }
    }
    roles
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_buckets_classified_by_role_substring() {
        let roles = classify_buckets(&names(&[
            "gov-health-phi-data-123",
            "gov-health-logs-123",
        ]));
        assert_eq!(roles.phi.as_deref(), Some("gov-health-phi-data-123"));
        assert_eq!(roles.log.as_deref(), Some("gov-health-logs-123"));
    }

    #[test]
    fn test_classification_is_case_insensitive_and_first_match_wins() {
        let roles = classify_buckets(&names(&[
            "gov-health-PHI-primary",
            "gov-health-phi-secondary",
        ]));
        assert_eq!(roles.phi.as_deref(), Some("gov-health-PHI-primary"));
        assert_eq!(roles.log, None);
    }

    #[test]
    fn test_unrelated_buckets_are_ignored() {
        let roles = classify_buckets(&names(&["gov-health-artifacts"]));
        assert_eq!(roles, BucketRoles::default());
    }

    #[test]
    fn test_default_teardown_targets_default_environment() {
        let config = TeardownConfig::default();
        assert_eq!(config.environment, "gov-health");
    }
}
