// The dump program is a black box; success means exit status 0 plus an
// artifact at the agreed path.

use std::ffi::OsString;
use std::fs::Permissions;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;
use tracing::{info, warn};

use crate::config::BackupConfig;
use crate::credentials::Credential;
use crate::error::{Result, SnapshotError};

const EXECUTABLE_MODE: u32 = 0o755;

/// The export file left behind by a successful dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpArtifact {
    pub path: PathBuf,
}

/// Copies `source` to `staged` and marks the copy executable.
pub async fn prepare_executable(source: &Path, staged: &Path) -> Result<PathBuf> {
    let staging_error = |err| SnapshotError::Staging {
        path: staged.to_path_buf(),
        source: err,
    };

    if source != staged {
        tokio::fs::copy(source, staged).await.map_err(staging_error)?;
    }
    tokio::fs::set_permissions(staged, Permissions::from_mode(EXECUTABLE_MODE))
        .await
        .map_err(staging_error)?;

    info!("Staged dump program {} at {}", source.display(), staged.display());
    Ok(staged.to_path_buf())
}

pub struct DumpInvoker {
    source: PathBuf,
    staged: PathBuf,
    artifact_path: PathBuf,
    search_path: OsString,
}

impl DumpInvoker {
    pub fn from_config(config: &BackupConfig) -> Self {
        Self {
            source: config.dump_source(),
            staged: config.staged_dump(),
            artifact_path: config.artifact_path.clone(),
            search_path: config.child_search_path(std::env::var_os("PATH")),
        }
    }

    /// Stages the program, runs it to completion and returns the artifact.
    ///
    /// No timeout is applied; a hung program holds the invocation until the
    /// platform stops it.
    pub async fn run(
        &self,
        environment: &str,
        database_host: &str,
        credential: &Credential,
    ) -> Result<DumpArtifact> {
        let program = prepare_executable(&self.source, &self.staged).await?;
        self.remove_stale_artifact().await?;

        info!(
            "Running dump program {} for environment {} against host '{}'",
            program.display(),
            environment,
            database_host
        );

        let status = Command::new(&program)
            .arg(environment)
            .arg(database_host)
            .arg(&credential.username)
            .arg(credential.password())
            .env("PATH", &self.search_path)
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|err| SnapshotError::DumpExecution {
                program: program.clone(),
                reason: format!("failed to start: {}", err),
            })?;

        check_exit_status(&program, status)?;

        match tokio::fs::metadata(&self.artifact_path).await {
            Ok(metadata) if metadata.is_file() => {
                info!(
                    "Dump program wrote {} bytes to {}",
                    metadata.len(),
                    self.artifact_path.display()
                );
                Ok(DumpArtifact {
                    path: self.artifact_path.clone(),
                })
            }
            _ => Err(SnapshotError::DumpExecution {
                program,
                reason: format!(
                    "exited successfully but produced no artifact at {}",
                    self.artifact_path.display()
                ),
            }),
        }
    }

    // A warm container keeps the previous run's export around; it must not be
    // mistaken for this run's output.
    async fn remove_stale_artifact(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.artifact_path).await {
            Ok(()) => {
                warn!(
                    "Removed stale artifact {} from a previous invocation",
                    self.artifact_path.display()
                );
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SnapshotError::Staging {
                path: self.artifact_path.clone(),
                source,
            }),
        }
    }
}

fn check_exit_status(program: &Path, status: ExitStatus) -> Result<()> {
    if status.success() {
        return Ok(());
    }

    let reason = match status.code() {
        Some(code) => format!("exited with status {}", code),
        None => "terminated by a signal".to_string(),
    };

    Err(SnapshotError::DumpExecution {
        program: program.to_path_buf(),
        reason,
    })
}
