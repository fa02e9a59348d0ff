use std::ffi::OsString;
use std::path::PathBuf;

use bon::Builder;

use crate::error::{Result, SnapshotError};

pub const ENV_VAR: &str = "ENV";
pub const DB_HOST_VAR: &str = "DB_HOST";
pub const TASK_ROOT_VAR: &str = "LAMBDA_TASK_ROOT";

pub const DEFAULT_ENVIRONMENT: &str = "prod";
pub const DEFAULT_DATABASE_HOST: &str = "";
pub const DEFAULT_TASK_ROOT: &str = ".";
pub const DEFAULT_SECRET_PRODUCT: &str = "saints-xctf-rds";
pub const DEFAULT_BUCKET_PRODUCT: &str = "saints-xctf";
pub const DEFAULT_DUMP_SCRIPT: &str = "backup.sh";
pub const DEFAULT_STAGING_DIR: &str = "/tmp";
pub const DEFAULT_ARTIFACT_PATH: &str = "/tmp/backup.sql";
pub const DEFAULT_ARTIFACT_KEY: &str = "backup.sql";
pub const DEFAULT_BUCKET_REGION: &str = "us-east-1";

#[derive(Builder, Debug, Clone, PartialEq)]
#[builder(on(String, into), on(PathBuf, into))]
pub struct BackupConfig {
    #[builder(default = DEFAULT_ENVIRONMENT.to_string())]
    pub environment: String,

    #[builder(default = DEFAULT_DATABASE_HOST.to_string())]
    pub database_host: String,

    /// Deployment root holding the bundled dump program and its helpers.
    #[builder(default = PathBuf::from(DEFAULT_TASK_ROOT))]
    pub task_root: PathBuf,

    #[builder(default = DEFAULT_SECRET_PRODUCT.to_string())]
    pub secret_product: String,

    #[builder(default = DEFAULT_BUCKET_PRODUCT.to_string())]
    pub bucket_product: String,

    #[builder(default = DEFAULT_DUMP_SCRIPT.to_string())]
    pub dump_script: String,

    /// Writable directory the dump program is copied into before running.
    #[builder(default = PathBuf::from(DEFAULT_STAGING_DIR))]
    pub staging_dir: PathBuf,

    /// Where the dump program writes its output.
    #[builder(default = PathBuf::from(DEFAULT_ARTIFACT_PATH))]
    pub artifact_path: PathBuf,

    #[builder(default = DEFAULT_ARTIFACT_KEY.to_string())]
    pub artifact_key: String,

    #[builder(default = DEFAULT_BUCKET_REGION.to_string())]
    pub bucket_region: String,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl BackupConfig {
    /// Reads the process environment and validates the result.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable lookup. Unset variables
    /// fall back to their documented defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self::builder()
            .environment(lookup(ENV_VAR).unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string()))
            .database_host(lookup(DB_HOST_VAR).unwrap_or_else(|| DEFAULT_DATABASE_HOST.to_string()))
            .task_root(
                lookup(TASK_ROOT_VAR)
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_TASK_ROOT)),
            )
            .build();

        config.validate()?;
        Ok(config)
    }

    /// The environment name ends up inside a bucket name and a secret id, so
    /// it is restricted to lowercase letters, digits and hyphens.
    pub fn validate(&self) -> Result<()> {
        if !validate_environment(&self.environment) {
            return Err(SnapshotError::InvalidConfig {
                name: ENV_VAR.to_string(),
                reason: format!(
                    "'{}' must be non-empty and contain only lowercase letters, digits or '-'",
                    self.environment
                ),
            });
        }

        if self.artifact_key.is_empty() {
            return Err(SnapshotError::InvalidConfig {
                name: "artifact_key".to_string(),
                reason: "object key must not be empty".to_string(),
            });
        }

        Ok(())
    }

    pub fn secret_id(&self) -> String {
        secret_id(&self.secret_product, &self.environment)
    }

    pub fn bucket_name(&self) -> String {
        bucket_name(&self.bucket_product, &self.environment)
    }

    /// The dump program as shipped in the deployment package.
    pub fn dump_source(&self) -> PathBuf {
        self.task_root.join(&self.dump_script)
    }

    /// The dump program after it has been staged for execution.
    pub fn staged_dump(&self) -> PathBuf {
        self.staging_dir.join(&self.dump_script)
    }

    /// Search path handed to the dump program: the inherited `PATH` with the
    /// deployment root appended, so tools bundled next to the script resolve.
    pub fn child_search_path(&self, inherited: Option<OsString>) -> OsString {
        let mut path = inherited.unwrap_or_default();
        if !path.is_empty() {
            path.push(":");
        }
        path.push(self.task_root.as_os_str());
        path
    }
}

pub fn secret_id(product: &str, environment: &str) -> String {
    format!("{}-{}-secret", product, environment)
}

pub fn bucket_name(product: &str, environment: &str) -> String {
    format!("{}-db-backups-{}", product, environment)
}

pub fn validate_environment(environment: &str) -> bool {
    !environment.is_empty()
        && environment
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = BackupConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.environment, "prod");
        assert_eq!(config.database_host, "");
        assert_eq!(config.task_root, PathBuf::from("."));
        assert_eq!(config.artifact_path, PathBuf::from("/tmp/backup.sql"));
        assert_eq!(config.artifact_key, "backup.sql");
        assert_eq!(config.bucket_region, "us-east-1");
        assert_eq!(config, BackupConfig::default());
    }

    #[test]
    fn test_values_from_lookup() {
        let config = BackupConfig::from_lookup(lookup_from(&[
            ("ENV", "staging"),
            ("DB_HOST", "db.staging.internal"),
            ("LAMBDA_TASK_ROOT", "/var/task"),
        ]))
        .unwrap();

        assert_eq!(config.environment, "staging");
        assert_eq!(config.database_host, "db.staging.internal");
        assert_eq!(config.dump_source(), PathBuf::from("/var/task/backup.sh"));
        assert_eq!(config.staged_dump(), PathBuf::from("/tmp/backup.sh"));
    }

    #[test]
    fn test_invalid_environment_rejected() {
        for bad in ["", "Prod", "prod/../x", "dev env", "dev_1"] {
            let result = BackupConfig::from_lookup(lookup_from(&[("ENV", bad)]));
            match result {
                Err(SnapshotError::InvalidConfig { name, .. }) => assert_eq!(name, "ENV"),
                other => panic!("expected InvalidConfig for {:?}, got {:?}", bad, other),
            }
        }
    }

    #[test]
    fn test_derived_names() {
        for env in ["prod", "dev", "staging", "qa-2"] {
            let config = BackupConfig::builder().environment(env).build();
            assert_eq!(config.secret_id(), format!("saints-xctf-rds-{}-secret", env));
            assert_eq!(config.bucket_name(), format!("saints-xctf-db-backups-{}", env));
        }
    }

    #[test]
    fn test_child_search_path() {
        let config = BackupConfig::builder().task_root("/var/task").build();
        assert_eq!(
            config.child_search_path(Some(OsString::from("/usr/bin:/bin"))),
            OsString::from("/usr/bin:/bin:/var/task")
        );
        assert_eq!(config.child_search_path(None), OsString::from("/var/task"));
    }
}
