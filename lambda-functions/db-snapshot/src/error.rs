use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::PipelineStage;

pub type Result<T> = std::result::Result<T, SnapshotError>;

#[derive(Debug, Error)]
pub enum SnapshotError {
    /// A configuration value failed validation.
    #[error("invalid configuration for {name}: {reason}")]
    InvalidConfig { name: String, reason: String },

    /// The credential bundle could not be fetched or decoded.
    #[error("failed to resolve credentials from secret {secret_id}: {reason}")]
    CredentialResolution { secret_id: String, reason: String },

    /// The dump program or its output location could not be prepared.
    #[error("failed to prepare {} for the dump: {source}", .path.display())]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The dump program failed or produced no artifact.
    #[error("dump program {} failed: {reason}", .program.display())]
    DumpExecution { program: PathBuf, reason: String },

    /// The artifact could not be written to object storage.
    #[error("failed to upload artifact to s3://{bucket}/{key}: {reason}")]
    ArtifactUpload {
        bucket: String,
        key: String,
        reason: String,
    },
}

impl SnapshotError {
    /// The pipeline stage this error aborted.
    pub fn stage(&self) -> PipelineStage {
        match self {
            Self::InvalidConfig { .. } => PipelineStage::Start,
            Self::CredentialResolution { .. } => PipelineStage::ResolvingCredentials,
            Self::Staging { .. } | Self::DumpExecution { .. } => PipelineStage::InvokingDump,
            Self::ArtifactUpload { .. } => PipelineStage::PublishingArtifact,
        }
    }
}
