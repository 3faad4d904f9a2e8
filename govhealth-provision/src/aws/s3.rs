//! S3 client wrapper: emptying versioned buckets ahead of stack deletion.

use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use aws_sdk_s3::Client as S3Client;

use crate::aws::{AwsError, AwsResult};

pub struct Buckets {
    client: S3Client,
}

impl Buckets {
    pub fn new(client: S3Client) -> Self {
        Self { client }
    }

    /// Remove everything from a bucket: current objects, then all object
    /// versions and delete markers. Returns the number of keys removed.
    pub async fn empty_bucket(&self, bucket: &str) -> AwsResult<usize> {
        let mut removed = 0;

        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .into_paginator()
            .send();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| {
                AwsError::S3(format!(
                    "Failed to list objects in '{bucket}': {}",
                    DisplayErrorContext(e)
                ))
            })?;
            let mut doomed = Vec::new();
            for object in page.contents() {
                if let Some(key) = object.key() {
                    doomed.push(object_id(key, None)?);
                }
            }
            removed += self.delete_batch(bucket, doomed).await?;
        }

        let mut key_marker: Option<String> = None;
        let mut version_id_marker: Option<String> = None;
        loop {
            let page = self
                .client
                .list_object_versions()
                .bucket(bucket)
                .set_key_marker(key_marker.clone())
                .set_version_id_marker(version_id_marker.clone())
                .send()
                .await
                .map_err(|e| {
                    AwsError::S3(format!(
                        "Failed to list object versions in '{bucket}': {}",
                        DisplayErrorContext(e)
                    ))
                })?;
            let mut doomed = Vec::new();
            for version in page.versions() {
                if let (Some(key), Some(version_id)) = (version.key(), version.version_id()) {
                    doomed.push(object_id(key, Some(version_id))?);
                }
            }
            for marker in page.delete_markers() {
                if let (Some(key), Some(version_id)) = (marker.key(), marker.version_id()) {
                    doomed.push(object_id(key, Some(version_id))?);
                }
            }
            removed += self.delete_batch(bucket, doomed).await?;

            if page.is_truncated() == Some(true) {
                key_marker = page.next_key_marker().map(ToString::to_string);
                version_id_marker = page.next_version_id_marker().map(ToString::to_string);
            } else {
                break;
            }
        }

        Ok(removed)
    }

    async fn delete_batch(
        &self,
        bucket: &str,
        objects: Vec<ObjectIdentifier>,
    ) -> AwsResult<usize> {
        if objects.is_empty() {
            return Ok(0);
        }
        let count = objects.len();
        let delete = Delete::builder()
            .set_objects(Some(objects))
            .build()
            .map_err(|e| AwsError::S3(format!("Failed to build delete request: {e}")))?;
        self.client
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| {
                AwsError::S3(format!(
                    "Failed to delete objects from '{bucket}': {}",
                    DisplayErrorContext(e)
                ))
            })?;
        Ok(count)
    }
}

fn object_id(key: &str, version_id: Option<&str>) -> AwsResult<ObjectIdentifier> {
    let mut builder = ObjectIdentifier::builder().key(key);
    if let Some(version_id) = version_id {
        builder = builder.version_id(version_id);
    }
    builder
        .build()
        .map_err(|e| AwsError::S3(format!("Invalid object identifier '{key}': {e}")))
}
