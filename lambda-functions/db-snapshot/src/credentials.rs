use std::fmt;

use async_trait::async_trait;
use aws_sdk_secretsmanager::error::DisplayErrorContext;
use aws_sdk_secretsmanager::Client as SecretsManagerClient;
use serde::Deserialize;
use tracing::info;

use crate::error::{Result, SnapshotError};

/// Database login decoded from the secret payload. Extra keys in the payload
/// (engine, port and so on) are ignored.
#[derive(Deserialize, Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &"<redacted>")
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Read-only access to stored secrets.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SecretStore {
    /// Returns the string payload stored under `secret_id`.
    async fn get_secret_string(&self, secret_id: &str) -> Result<String>;
}

pub struct SecretsManagerStore {
    client: SecretsManagerClient,
}

impl SecretsManagerStore {
    pub fn new(client: SecretsManagerClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretStore for SecretsManagerStore {
    async fn get_secret_string(&self, secret_id: &str) -> Result<String> {
        let output = self
            .client
            .get_secret_value()
            .secret_id(secret_id)
            .send()
            .await
            .map_err(|err| {
                let reason = match err.as_service_error() {
                    Some(service_err) if service_err.is_resource_not_found_exception() => {
                        "secret not found".to_string()
                    }
                    _ => DisplayErrorContext(&err).to_string(),
                };
                SnapshotError::CredentialResolution {
                    secret_id: secret_id.to_string(),
                    reason,
                }
            })?;

        output
            .secret_string
            .ok_or_else(|| SnapshotError::CredentialResolution {
                secret_id: secret_id.to_string(),
                reason: "secret has no string value".to_string(),
            })
    }
}

/// Fetches the secret stored under `secret_id` and decodes it.
pub async fn resolve_credential<S>(store: &S, secret_id: &str) -> Result<Credential>
where
    S: SecretStore + ?Sized,
{
    info!("Fetching database credentials from secret {}", secret_id);

    let payload = store.get_secret_string(secret_id).await?;
    let credential = decode_credential(secret_id, &payload)?;

    info!("Resolved credentials from secret {}", secret_id);
    Ok(credential)
}

/// Both `username` and `password` must be present as strings.
pub fn decode_credential(secret_id: &str, payload: &str) -> Result<Credential> {
    serde_json::from_str(payload).map_err(|err| SnapshotError::CredentialResolution {
        secret_id: secret_id.to_string(),
        reason: describe_decode_error(&err),
    })
}

// serde_json may echo offending values back in its messages; only the
// missing-field message is safe to pass through as is.
fn describe_decode_error(err: &serde_json::Error) -> String {
    let message = err.to_string();
    if message.starts_with("missing field") {
        return format!("secret payload {}", message);
    }

    format!(
        "malformed secret payload ({:?} error at line {}, column {})",
        err.classify(),
        err.line(),
        err.column()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    const SECRET_ID: &str = "saints-xctf-rds-prod-secret";

    #[test]
    fn test_decode_full_payload() {
        let credential =
            decode_credential(SECRET_ID, r#"{"username": "u", "password": "p"}"#).unwrap();
        assert_eq!(credential, Credential::new("u", "p"));
        assert_eq!(credential.password(), "p");
    }

    #[test]
    fn test_decode_ignores_extra_keys() {
        let payload = r#"{
            "username": "admin",
            "password": "hunter2",
            "engine": "mysql",
            "host": "db.internal",
            "port": 3306
        }"#;

        let credential = decode_credential(SECRET_ID, payload).unwrap();
        assert_eq!(credential.username, "admin");
        assert_eq!(credential.password(), "hunter2");
    }

    #[test]
    fn test_decode_missing_fields() {
        for payload in [r#"{"username": "u"}"#, r#"{"password": "p"}"#, "{}"] {
            match decode_credential(SECRET_ID, payload) {
                Err(SnapshotError::CredentialResolution { secret_id, reason }) => {
                    assert_eq!(secret_id, SECRET_ID);
                    assert!(reason.contains("missing field"), "reason: {}", reason);
                }
                other => panic!("expected CredentialResolution, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_decode_error_does_not_echo_values() {
        let err = decode_credential(SECRET_ID, r#"{"username": "u", "password": 12345}"#)
            .unwrap_err();
        assert!(!err.to_string().contains("12345"));

        let err = decode_credential(SECRET_ID, "not json").unwrap_err();
        assert!(err.to_string().contains("malformed secret payload"));
    }

    #[test]
    fn test_debug_redacts_login() {
        let credential = Credential::new("admin", "s3cr3t");
        let rendered = format!("{:?}", credential);
        assert!(!rendered.contains("admin"));
        assert!(!rendered.contains("s3cr3t"));
    }

    #[tokio::test]
    async fn test_resolve_credential_uses_secret_id() {
        let mut store = MockSecretStore::new();
        store
            .expect_get_secret_string()
            .with(eq(SECRET_ID))
            .times(1)
            .returning(|_| Ok(r#"{"username": "u", "password": "p"}"#.to_string()));

        let credential = resolve_credential(&store, SECRET_ID).await.unwrap();
        assert_eq!(credential, Credential::new("u", "p"));
    }

    #[tokio::test]
    async fn test_resolve_credential_propagates_store_error() {
        let mut store = MockSecretStore::new();
        store.expect_get_secret_string().returning(|id| {
            Err(SnapshotError::CredentialResolution {
                secret_id: id.to_string(),
                reason: "secret not found".to_string(),
            })
        });

        let err = resolve_credential(&store, SECRET_ID).await.unwrap_err();
        assert!(err.to_string().contains("secret not found"));
    }
}
