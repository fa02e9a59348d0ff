pub mod config;
pub mod credentials;
pub mod dump;
pub mod error;
pub mod pipeline;
pub mod publish;

use aws_config::BehaviorVersion;
use aws_sdk_secretsmanager::Client as SecretsManagerClient;

pub use config::BackupConfig;
pub use credentials::{Credential, SecretStore, SecretsManagerStore};
pub use dump::{prepare_executable, DumpArtifact, DumpInvoker};
pub use error::{Result, SnapshotError};
pub use pipeline::{BackupPipeline, PipelineStage};
pub use publish::{ArtifactStore, S3ArtifactStore};

/// Trigger payload. Its content is not used; receiving it starts a run.
pub type Request = serde_json::Value;

/// The pipeline wired to Secrets Manager and S3.
pub type SnapshotService = BackupPipeline<SecretsManagerStore, S3ArtifactStore>;

impl SnapshotService {
    pub async fn from_aws(config: BackupConfig) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest()).load().await;

        let secrets = SecretsManagerStore::new(SecretsManagerClient::new(&sdk_config));
        let artifacts = S3ArtifactStore::from_sdk_config(&sdk_config, &config.bucket_region);

        Self::new(config, secrets, artifacts)
    }
}
