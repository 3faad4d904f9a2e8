//! CloudFormation client wrapper: status probing, template validation, and
//! stack lifecycle calls.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_cloudformation::error::DisplayErrorContext;
use aws_sdk_cloudformation::types::{Capability, Parameter};
use aws_sdk_cloudformation::Client as CfnClient;

use crate::aws::{AwsError, AwsResult};
use crate::watch::{ProbeError, StackStatusProbe, StatusSample};

/// Outcome of an update request. The control plane rejects no-op updates
/// with a dedicated error, which callers treat as success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackUpdate {
    Updated,
    NoChanges,
}

pub struct CfnStacks {
    client: CfnClient,
}

impl CfnStacks {
    pub fn new(client: CfnClient) -> Self {
        Self { client }
    }

    pub async fn stack_exists(&self, stack_name: &str) -> AwsResult<bool> {
        match self
            .client
            .describe_stacks()
            .stack_name(stack_name)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) => {
                let text = DisplayErrorContext(err).to_string();
                if is_missing_stack(&text) {
                    Ok(false)
                } else {
                    Err(AwsError::CloudFormation(format!(
                        "Failed to describe stack '{stack_name}': {text}"
                    )))
                }
            }
        }
    }

    pub async fn validate_template(&self, template_body: &str) -> AwsResult<()> {
        self.client
            .validate_template()
            .template_body(template_body)
            .send()
            .await
            .map_err(|e| {
                AwsError::CloudFormation(format!(
                    "Template validation failed: {}",
                    DisplayErrorContext(e)
                ))
            })?;
        Ok(())
    }

    pub async fn create_stack(
        &self,
        stack_name: &str,
        template_body: &str,
        parameters: &[(String, String)],
        capability: Capability,
    ) -> AwsResult<()> {
        self.client
            .create_stack()
            .stack_name(stack_name)
            .template_body(template_body)
            .set_parameters(build_parameters(parameters))
            .capabilities(capability)
            .send()
            .await
            .map_err(|e| {
                AwsError::CloudFormation(format!(
                    "Failed to create stack '{stack_name}': {}",
                    DisplayErrorContext(e)
                ))
            })?;
        Ok(())
    }

    pub async fn update_stack(
        &self,
        stack_name: &str,
        template_body: &str,
        parameters: &[(String, String)],
        capability: Capability,
    ) -> AwsResult<StackUpdate> {
        match self
            .client
            .update_stack()
            .stack_name(stack_name)
            .template_body(template_body)
            .set_parameters(build_parameters(parameters))
            .capabilities(capability)
            .send()
            .await
        {
            Ok(_) => Ok(StackUpdate::Updated),
            Err(err) => {
                let text = DisplayErrorContext(err).to_string();
                if is_no_update_error(&text) {
                    Ok(StackUpdate::NoChanges)
                } else {
                    Err(AwsError::CloudFormation(format!(
                        "Failed to update stack '{stack_name}': {text}"
                    )))
                }
            }
        }
    }

    pub async fn delete_stack(&self, stack_name: &str) -> AwsResult<()> {
        self.client
            .delete_stack()
            .stack_name(stack_name)
            .send()
            .await
            .map_err(|e| {
                AwsError::CloudFormation(format!(
                    "Failed to delete stack '{stack_name}': {}",
                    DisplayErrorContext(e)
                ))
            })?;
        Ok(())
    }

    /// All outputs of a stack, keyed by output key.
    pub async fn outputs(&self, stack_name: &str) -> AwsResult<HashMap<String, String>> {
        let response = self
            .client
            .describe_stacks()
            .stack_name(stack_name)
            .send()
            .await
            .map_err(|e| {
                AwsError::CloudFormation(format!(
                    "Failed to describe stack '{stack_name}': {}",
                    DisplayErrorContext(e)
                ))
            })?;

        let mut outputs = HashMap::new();
        if let Some(stack) = response.stacks().first() {
            for output in stack.outputs() {
                if let (Some(key), Some(value)) = (output.output_key(), output.output_value()) {
                    outputs.insert(key.to_string(), value.to_string());
                }
            }
        }
        Ok(outputs)
    }

    /// Physical resource IDs of a given resource type within a stack.
    pub async fn resources_of_type(
        &self,
        stack_name: &str,
        resource_type: &str,
    ) -> AwsResult<Vec<String>> {
        let response = self
            .client
            .describe_stack_resources()
            .stack_name(stack_name)
            .send()
            .await
            .map_err(|e| {
                AwsError::CloudFormation(format!(
                    "Failed to list resources of stack '{stack_name}': {}",
                    DisplayErrorContext(e)
                ))
            })?;

        Ok(response
            .stack_resources()
            .iter()
            .filter(|resource| resource.resource_type() == Some(resource_type))
            .filter_map(|resource| resource.physical_resource_id().map(str::to_string))
            .collect())
    }
}

#[async_trait]
impl StackStatusProbe for CfnStacks {
    async fn query(&self, stack_name: &str) -> Result<StatusSample, ProbeError> {
        match self
            .client
            .describe_stacks()
            .stack_name(stack_name)
            .send()
            .await
        {
            Ok(response) => {
                let stack = response.stacks().first().ok_or(ProbeError::NotFound)?;
                let raw_status = stack
                    .stack_status()
                    .map(|status| status.as_str().to_string())
                    .unwrap_or_default();
                Ok(StatusSample::present(raw_status))
            }
            Err(err) => {
                let text = DisplayErrorContext(err).to_string();
                if is_missing_stack(&text) {
                    Err(ProbeError::NotFound)
                } else {
                    Err(ProbeError::Transport(text))
                }
            }
        }
    }
}

fn build_parameters(parameters: &[(String, String)]) -> Option<Vec<Parameter>> {
    if parameters.is_empty() {
        return None;
    }
    Some(
        parameters
            .iter()
            .map(|(key, value)| {
                Parameter::builder()
                    .parameter_key(key)
                    .parameter_value(value)
                    .build()
            })
            .collect(),
    )
}

/// The service reports a missing stack as a validation error whose message
/// contains this phrase.
fn is_missing_stack(error_text: &str) -> bool {
    error_text.contains("does not exist")
}

fn is_no_update_error(error_text: &str) -> bool {
    error_text.contains("No updates are to be performed")
}
