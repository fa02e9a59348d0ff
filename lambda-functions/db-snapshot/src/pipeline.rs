use std::fmt;

use tracing::{error, info};

use crate::config::BackupConfig;
use crate::credentials::{resolve_credential, SecretStore};
use crate::dump::DumpInvoker;
use crate::error::Result;
use crate::publish::{publish_artifact, ArtifactStore};

/// Progress of one invocation. Stages run strictly in order; any of them may
/// end in `Failed`, from which there is no way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Start,
    ResolvingCredentials,
    InvokingDump,
    PublishingArtifact,
    Succeeded,
    Failed,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::ResolvingCredentials => write!(f, "resolving_credentials"),
            Self::InvokingDump => write!(f, "invoking_dump"),
            Self::PublishingArtifact => write!(f, "publishing_artifact"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

pub struct BackupPipeline<S, A> {
    config: BackupConfig,
    secrets: S,
    artifacts: A,
    invoker: DumpInvoker,
}

impl<S, A> BackupPipeline<S, A>
where
    S: SecretStore,
    A: ArtifactStore,
{
    pub fn new(config: BackupConfig, secrets: S, artifacts: A) -> Self {
        let invoker = DumpInvoker::from_config(&config);
        Self {
            config,
            secrets,
            artifacts,
            invoker,
        }
    }

    /// Runs credential resolution, the dump and the upload in order. Returns
    /// `true` once the artifact is published; the first failure aborts the
    /// remaining stages and is returned unchanged.
    pub async fn run(&self) -> Result<bool> {
        match self.run_stages().await {
            Ok(()) => {
                info!(
                    stage = %PipelineStage::Succeeded,
                    "Backup for {} completed",
                    self.config.environment
                );
                Ok(true)
            }
            Err(err) => {
                error!(
                    stage = %PipelineStage::Failed,
                    failed_stage = %err.stage(),
                    "Backup for {} failed: {}",
                    self.config.environment,
                    err
                );
                Err(err)
            }
        }
    }

    async fn run_stages(&self) -> Result<()> {
        info!(
            stage = %PipelineStage::Start,
            "Starting backup for environment {}",
            self.config.environment
        );
        self.config.validate()?;

        info!(stage = %PipelineStage::ResolvingCredentials, "Resolving credentials");
        let credential = resolve_credential(&self.secrets, &self.config.secret_id()).await?;

        info!(stage = %PipelineStage::InvokingDump, "Invoking dump program");
        let artifact = self
            .invoker
            .run(
                &self.config.environment,
                &self.config.database_host,
                &credential,
            )
            .await?;

        info!(stage = %PipelineStage::PublishingArtifact, "Publishing artifact");
        publish_artifact(
            &self.artifacts,
            &artifact,
            &self.config.bucket_name(),
            &self.config.artifact_key,
        )
        .await
    }
}
