// Every run writes the same key, so overlapping invocations are
// last-writer-wins.

use std::path::Path;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use tracing::info;

use crate::dump::DumpArtifact;
use crate::error::{Result, SnapshotError};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArtifactStore {
    /// Uploads the file at `local_path` to `bucket` under `key`.
    async fn upload_file(&self, local_path: &Path, bucket: &str, key: &str) -> Result<()>;
}

pub struct S3ArtifactStore {
    client: S3Client,
}

impl S3ArtifactStore {
    pub fn new(client: S3Client) -> Self {
        Self { client }
    }

    /// Path-style client pinned to `region`, independent of the function's
    /// own region.
    pub fn from_sdk_config(sdk_config: &SdkConfig, region: &str) -> Self {
        let s3_config = aws_sdk_s3::config::Builder::from(sdk_config)
            .region(aws_sdk_s3::config::Region::new(region.to_string()))
            .force_path_style(true)
            .build();

        Self::new(S3Client::from_conf(s3_config))
    }
}

#[async_trait]
impl ArtifactStore for S3ArtifactStore {
    async fn upload_file(&self, local_path: &Path, bucket: &str, key: &str) -> Result<()> {
        let upload_error = |reason: String| SnapshotError::ArtifactUpload {
            bucket: bucket.to_string(),
            key: key.to_string(),
            reason,
        };

        let body = ByteStream::from_path(local_path).await.map_err(|err| {
            upload_error(format!("cannot read {}: {}", local_path.display(), err))
        })?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|err| upload_error(DisplayErrorContext(&err).to_string()))?;

        Ok(())
    }
}

/// Uploads `artifact` to `bucket`/`key`.
pub async fn publish_artifact<A>(
    store: &A,
    artifact: &DumpArtifact,
    bucket: &str,
    key: &str,
) -> Result<()>
where
    A: ArtifactStore + ?Sized,
{
    info!(
        "Uploading {} to s3://{}/{}",
        artifact.path.display(),
        bucket,
        key
    );

    store.upload_file(&artifact.path, bucket, key).await?;

    info!("Published backup to s3://{}/{}", bucket, key);
    Ok(())
}
