//! Deploy logic: foundation stack first, then the integration stack fed by
//! the foundation's outputs.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use aws_sdk_cloudformation::types::Capability;

use crate::aws::cloudformation::StackUpdate;
use crate::confirm::Confirmation;
use crate::error::{ProvisionError, ProvisionResult};
use crate::watch::StackOperation;

pub const DEFAULT_ENVIRONMENT: &str = "gov-health";
pub const FOUNDATION_TEMPLATE: &str = "AthenaAWS-Sandbox-CloudFormationTemplate.yaml";
pub const INTEGRATION_TEMPLATE: &str = "athenahealth-rds-integration.yaml";

/// Deployment configuration for the two-tier environment.
#[derive(Debug, Clone)]
pub struct DeployConfig {
    pub environment: String,
    pub key_pair_name: Option<String>,
    pub foundation_template: PathBuf,
    pub integration_template: PathBuf,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            environment: DEFAULT_ENVIRONMENT.to_string(),
            key_pair_name: None,
            foundation_template: PathBuf::from(FOUNDATION_TEMPLATE),
            integration_template: PathBuf::from(INTEGRATION_TEMPLATE),
        }
    }
}

impl DeployConfig {
    pub fn foundation_stack_name(&self) -> String {
        super::foundation_stack_name(&self.environment)
    }

    pub fn integration_stack_name(&self) -> String {
        super::integration_stack_name(&self.environment)
    }
}

/// Key resources of a completed deployment.
#[derive(Debug, Clone)]
pub struct DeploySummary {
    pub foundation_stack: String,
    pub integration_stack: String,
    pub vpc_id: String,
    pub private_subnet1_id: String,
    pub private_subnet2_id: String,
    pub kms_key_id: String,
    pub rds_endpoint: Option<String>,
    pub api_gateway_endpoint: Option<String>,
}

impl super::service::ProvisionService {
    /// Deploy the complete environment: validate both templates, converge the
    /// foundation stack, chain its outputs into the integration stack.
    pub async fn deploy(
        &self,
        config: &DeployConfig,
        confirm: &dyn Confirmation,
    ) -> ProvisionResult<DeploySummary> {
        let foundation_body = read_template(&config.foundation_template)?;
        let integration_body = read_template(&config.integration_template)?;

        log::info!("Validating CloudFormation templates");
        self.cfn.validate_template(&foundation_body).await?;
        self.cfn.validate_template(&integration_body).await?;

        let foundation = config.foundation_stack_name();
        let mut foundation_params = Vec::new();
        if let Some(key_pair) = &config.key_pair_name {
            foundation_params.push(("KeyPairName".to_string(), key_pair.clone()));
        }
        self.converge_stack(
            &foundation,
            &foundation_body,
            &foundation_params,
            Capability::CapabilityIam,
            confirm,
        )
        .await?;

        log::info!("Retrieving foundation stack outputs");
        let outputs = self.cfn.outputs(&foundation).await?;
        let vpc_id = required_output(&outputs, "VPCId", &foundation)?;
        let private_subnet1_id = required_output(&outputs, "PrivateSubnet1Id", &foundation)?;
        let private_subnet2_id = required_output(&outputs, "PrivateSubnet2Id", &foundation)?;
        let kms_key_id = required_output(&outputs, "KMSKeyId", &foundation)?;

        let integration = config.integration_stack_name();
        let integration_params = vec![
            ("VPCId".to_string(), vpc_id.clone()),
            ("PrivateSubnet1Id".to_string(), private_subnet1_id.clone()),
            ("PrivateSubnet2Id".to_string(), private_subnet2_id.clone()),
            ("KMSKeyId".to_string(), kms_key_id.clone()),
        ];
        self.converge_stack(
            &integration,
            &integration_body,
            &integration_params,
            Capability::CapabilityNamedIam,
            confirm,
        )
        .await?;

        let integration_outputs = self.cfn.outputs(&integration).await?;

        Ok(DeploySummary {
            foundation_stack: foundation,
            integration_stack: integration,
            vpc_id,
            private_subnet1_id,
            private_subnet2_id,
            kms_key_id,
            rds_endpoint: integration_outputs.get("RDSEndpoint").cloned(),
            api_gateway_endpoint: integration_outputs.get("APIGatewayEndpoint").cloned(),
        })
    }

    /// Create the stack, or update it behind a confirmation when it already
    /// exists. A no-op update counts as convergence.
    async fn converge_stack(
        &self,
        stack_name: &str,
        template_body: &str,
        parameters: &[(String, String)],
        capability: Capability,
        confirm: &dyn Confirmation,
    ) -> ProvisionResult<()> {
        if self.cfn.stack_exists(stack_name).await? {
            log::info!("Stack '{stack_name}' already exists");
            if !confirm.confirm(&format!("Stack '{stack_name}' already exists. Update it?")) {
                log::info!("Leaving '{stack_name}' unchanged");
                return Ok(());
            }
            match self
                .cfn
                .update_stack(stack_name, template_body, parameters, capability)
                .await?
            {
                StackUpdate::NoChanges => {
                    log::info!("No updates needed for '{stack_name}'");
                    Ok(())
                }
                StackUpdate::Updated => {
                    self.watch_to_completion(stack_name, StackOperation::Update)
                        .await
                }
            }
        } else {
            self.cfn
                .create_stack(stack_name, template_body, parameters, capability)
                .await?;
            self.watch_to_completion(stack_name, StackOperation::Create)
                .await
        }
    }
}

fn read_template(path: &Path) -> ProvisionResult<String> {
    fs::read_to_string(path).map_err(|source| ProvisionError::Template {
        path: path.to_path_buf(),
        source,
    })
}

fn required_output(
    outputs: &HashMap<String, String>,
    key: &str,
    stack: &str,
) -> ProvisionResult<String> {
    outputs
        .get(key)
        .cloned()
        .ok_or_else(|| ProvisionError::MissingOutput {
            stack: stack.to_string(),
            key: key.to_string(),
        })
}
