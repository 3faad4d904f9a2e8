//! RDS client wrapper: deletion-protection handling and snapshot cleanup.

use std::time::Duration;

use aws_sdk_rds::error::DisplayErrorContext;
use aws_sdk_rds::Client as RdsClient;
use tokio::time::sleep;

use crate::aws::{AwsError, AwsResult};

/// Cadence for the availability wait after a protection change. The change
/// only takes effect once the instance settles back to `available`.
const AVAILABLE_POLL_INTERVAL: Duration = Duration::from_secs(30);
const AVAILABLE_MAX_ATTEMPTS: u32 = 40;

pub struct RdsInstances {
    client: RdsClient,
}

impl RdsInstances {
    pub fn new(client: RdsClient) -> Self {
        Self { client }
    }

    pub async fn disable_deletion_protection(&self, instance_id: &str) -> AwsResult<()> {
        self.client
            .modify_db_instance()
            .db_instance_identifier(instance_id)
            .deletion_protection(false)
            .apply_immediately(true)
            .send()
            .await
            .map_err(|e| {
                AwsError::Rds(format!(
                    "Failed to disable deletion protection on '{instance_id}': {}",
                    DisplayErrorContext(e)
                ))
            })?;
        Ok(())
    }

    /// Poll the instance until it reports `available`. Every poll counts
    /// toward the bound.
    pub async fn wait_until_available(&self, instance_id: &str) -> AwsResult<()> {
        for attempt in 1..=AVAILABLE_MAX_ATTEMPTS {
            let status = self.instance_status(instance_id).await?;
            if status.as_deref() == Some("available") {
                return Ok(());
            }
            log::info!(
                "{instance_id}: status {} (attempt {attempt}/{AVAILABLE_MAX_ATTEMPTS})",
                status.as_deref().unwrap_or("unknown")
            );
            if attempt < AVAILABLE_MAX_ATTEMPTS {
                sleep(AVAILABLE_POLL_INTERVAL).await;
            }
        }
        Err(AwsError::Rds(format!(
            "Timed out waiting for instance '{instance_id}' to become available"
        )))
    }

    async fn instance_status(&self, instance_id: &str) -> AwsResult<Option<String>> {
        let response = self
            .client
            .describe_db_instances()
            .db_instance_identifier(instance_id)
            .send()
            .await
            .map_err(|e| {
                AwsError::Rds(format!(
                    "Failed to describe instance '{instance_id}': {}",
                    DisplayErrorContext(e)
                ))
            })?;
        Ok(response
            .db_instances()
            .first()
            .and_then(|db| db.db_instance_status().map(str::to_string)))
    }

    /// Snapshots whose identifier contains the instance id. CloudFormation's
    /// final snapshots embed the instance identifier, so a substring match
    /// finds the orphans.
    pub async fn snapshots_for_instance(&self, instance_id: &str) -> AwsResult<Vec<String>> {
        let response = self.client.describe_db_snapshots().send().await.map_err(|e| {
            AwsError::Rds(format!(
                "Failed to list snapshots: {}",
                DisplayErrorContext(e)
            ))
        })?;
        Ok(response
            .db_snapshots()
            .iter()
            .filter_map(|snapshot| snapshot.db_snapshot_identifier())
            .filter(|id| id.contains(instance_id))
            .map(str::to_string)
            .collect())
    }

    pub async fn delete_snapshot(&self, snapshot_id: &str) -> AwsResult<()> {
        self.client
            .delete_db_snapshot()
            .db_snapshot_identifier(snapshot_id)
            .send()
            .await
            .map_err(|e| {
                AwsError::Rds(format!(
                    "Failed to delete snapshot '{snapshot_id}': {}",
                    DisplayErrorContext(e)
                ))
            })?;
        Ok(())
    }
}
