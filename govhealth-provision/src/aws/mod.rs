//! AWS SDK integration: CloudFormation, RDS, and S3 client wrappers.

pub(crate) mod cloudformation;
pub(crate) mod rds;
pub(crate) mod s3;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AwsError {
    #[error("CloudFormation error: {0}")]
    CloudFormation(String),
    #[error("RDS error: {0}")]
    Rds(String),
    #[error("S3 error: {0}")]
    S3(String),
}

pub type AwsResult<T> = Result<T, AwsError>;
