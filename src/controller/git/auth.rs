//! # Git Authentication
//!
//! Credentials for private repositories, read from the Secret referenced by
//! `spec.source.gitRepository.auth`.
//!
//! Two Secret layouts are accepted:
//! - typed Secrets (`kubernetes.io/ssh-auth`, `kubernetes.io/basic-auth`) whose type must
//!   agree with the requested auth type
//! - legacy opaque Secrets with `key`/`password` or `username`/`password` entries

use k8s_openapi::api::core::v1::{EnvVar, EnvVarSource, Secret, SecretKeySelector};
use std::fmt;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::crd::{RepositoryAuth, RepositoryAuthType};

const SSH_AUTH_SECRET_TYPE: &str = "kubernetes.io/ssh-auth";
const BASIC_AUTH_SECRET_TYPE: &str = "kubernetes.io/basic-auth";

const SSH_PRIVATE_KEY_FIELD: &str = "ssh-privatekey";
const USERNAME_FIELD: &str = "username";
const PASSWORD_FIELD: &str = "password";
const LEGACY_KEY_FIELD: &str = "key";

// Env vars consumed by the init container
pub const APP_REPOSITORY_AUTH_TYPE: &str = "APP_REPOSITORY_AUTH_TYPE";
pub const APP_REPOSITORY_KEY: &str = "APP_REPOSITORY_KEY";
pub const APP_REPOSITORY_USERNAME: &str = "APP_REPOSITORY_USERNAME";
pub const APP_REPOSITORY_PASSWORD: &str = "APP_REPOSITORY_PASSWORD";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GitAuthError {
    #[error("inconsistent secret type: {auth_type}, {secret_type}")]
    InconsistentSecretType {
        auth_type: String,
        secret_type: String,
    },
    #[error("missing '{0}'")]
    MissingField(String),
    #[error("missing '{0}' or '{1}'")]
    MissingFields(String, String),
}

/// Resolved credentials for one repository
///
/// Values are wiped from memory on drop and never printed.
#[derive(Clone, PartialEq)]
pub struct GitAuth {
    secret_name: String,
    credentials: Credentials,
}

#[derive(Clone, PartialEq)]
enum Credentials {
    Key {
        /// Field name of the private key in the Secret
        key_field: &'static str,
        key: Zeroizing<String>,
        /// Passphrase of an encrypted key, legacy Secrets only
        passphrase: Option<Zeroizing<String>>,
    },
    Basic {
        username: Zeroizing<String>,
        password: Zeroizing<String>,
    },
}

impl fmt::Debug for GitAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitAuth")
            .field("secret_name", &self.secret_name)
            .field("type", &self.auth_type().as_str())
            .field("credentials", &"***")
            .finish()
    }
}

impl GitAuth {
    /// Build credentials from an already fetched Secret
    pub fn from_secret(secret: &Secret, auth: &RepositoryAuth) -> Result<Self, GitAuthError> {
        let secret_name = auth.secret_name.clone();
        let credentials = match secret.type_.as_deref() {
            Some(SSH_AUTH_SECRET_TYPE) => {
                ensure_type(auth.r#type, RepositoryAuthType::Key, SSH_AUTH_SECRET_TYPE)?;
                Credentials::Key {
                    key_field: SSH_PRIVATE_KEY_FIELD,
                    key: field(secret, SSH_PRIVATE_KEY_FIELD)
                        .ok_or_else(|| GitAuthError::MissingField(SSH_PRIVATE_KEY_FIELD.into()))?,
                    passphrase: None,
                }
            }
            Some(BASIC_AUTH_SECRET_TYPE) => {
                ensure_type(auth.r#type, RepositoryAuthType::Basic, BASIC_AUTH_SECRET_TYPE)?;
                basic_credentials(secret)?
            }
            _ => match auth.r#type {
                RepositoryAuthType::Key => Credentials::Key {
                    key_field: LEGACY_KEY_FIELD,
                    key: field(secret, LEGACY_KEY_FIELD)
                        .ok_or_else(|| GitAuthError::MissingField(LEGACY_KEY_FIELD.into()))?,
                    passphrase: field(secret, PASSWORD_FIELD),
                },
                RepositoryAuthType::Basic => basic_credentials(secret)?,
            },
        };

        Ok(Self {
            secret_name,
            credentials,
        })
    }

    /// Basic credentials, mostly useful for tests and tooling
    pub fn basic(secret_name: &str, username: &str, password: &str) -> Self {
        Self {
            secret_name: secret_name.to_string(),
            credentials: Credentials::Basic {
                username: Zeroizing::new(username.to_string()),
                password: Zeroizing::new(password.to_string()),
            },
        }
    }

    /// SSH key credentials stored under the typed Secret field
    pub fn ssh_key(secret_name: &str, key: &str) -> Self {
        Self {
            secret_name: secret_name.to_string(),
            credentials: Credentials::Key {
                key_field: SSH_PRIVATE_KEY_FIELD,
                key: Zeroizing::new(key.to_string()),
                passphrase: None,
            },
        }
    }

    #[must_use]
    pub fn auth_type(&self) -> RepositoryAuthType {
        match self.credentials {
            Credentials::Key { .. } => RepositoryAuthType::Key,
            Credentials::Basic { .. } => RepositoryAuthType::Basic,
        }
    }

    #[must_use]
    pub fn secret_name(&self) -> &str {
        &self.secret_name
    }

    /// Username and password for basic auth
    #[must_use]
    pub fn basic_credentials(&self) -> Option<(&str, &str)> {
        match &self.credentials {
            Credentials::Basic { username, password } => Some((username.as_str(), password.as_str())),
            Credentials::Key { .. } => None,
        }
    }

    /// Private key for key auth
    #[must_use]
    pub fn private_key(&self) -> Option<&str> {
        match &self.credentials {
            Credentials::Key { key, .. } => Some(key.as_str()),
            Credentials::Basic { .. } => None,
        }
    }

    /// Env vars for the init container, secret values come in through `secretKeyRef`
    #[must_use]
    pub fn auth_envs(&self) -> Vec<EnvVar> {
        let mut envs = vec![EnvVar {
            name: APP_REPOSITORY_AUTH_TYPE.to_string(),
            value: Some(self.auth_type().as_str().to_string()),
            ..Default::default()
        }];
        match &self.credentials {
            Credentials::Key {
                key_field,
                passphrase,
                ..
            } => {
                envs.push(self.secret_env(APP_REPOSITORY_KEY, key_field));
                if passphrase.is_some() {
                    envs.push(self.secret_env(APP_REPOSITORY_PASSWORD, PASSWORD_FIELD));
                }
            }
            Credentials::Basic { .. } => {
                envs.push(self.secret_env(APP_REPOSITORY_USERNAME, USERNAME_FIELD));
                envs.push(self.secret_env(APP_REPOSITORY_PASSWORD, PASSWORD_FIELD));
            }
        }
        envs
    }

    fn secret_env(&self, name: &str, key: &str) -> EnvVar {
        EnvVar {
            name: name.to_string(),
            value_from: Some(EnvVarSource {
                secret_key_ref: Some(SecretKeySelector {
                    name: self.secret_name.clone(),
                    key: key.to_string(),
                    optional: None,
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

fn ensure_type(
    requested: RepositoryAuthType,
    expected: RepositoryAuthType,
    secret_type: &str,
) -> Result<(), GitAuthError> {
    if requested == expected {
        return Ok(());
    }
    Err(GitAuthError::InconsistentSecretType {
        auth_type: requested.as_str().to_string(),
        secret_type: secret_type.to_string(),
    })
}

fn basic_credentials(secret: &Secret) -> Result<Credentials, GitAuthError> {
    match (field(secret, USERNAME_FIELD), field(secret, PASSWORD_FIELD)) {
        (Some(username), Some(password)) => Ok(Credentials::Basic { username, password }),
        _ => Err(GitAuthError::MissingFields(
            USERNAME_FIELD.into(),
            PASSWORD_FIELD.into(),
        )),
    }
}

/// Read a Secret entry from `data`, falling back to `stringData`
fn field(secret: &Secret, key: &str) -> Option<Zeroizing<String>> {
    if let Some(value) = secret.data.as_ref().and_then(|d| d.get(key)) {
        return Some(Zeroizing::new(String::from_utf8_lossy(&value.0).into_owned()));
    }
    secret
        .string_data
        .as_ref()
        .and_then(|d| d.get(key))
        .map(|v| Zeroizing::new(v.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::ByteString;
    use std::collections::BTreeMap;

    fn secret(type_: Option<&str>, entries: &[(&str, &str)]) -> Secret {
        Secret {
            type_: type_.map(str::to_string),
            data: Some(
                entries
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), ByteString(v.as_bytes().to_vec())))
                    .collect::<BTreeMap<_, _>>(),
            ),
            ..Default::default()
        }
    }

    fn auth(r#type: RepositoryAuthType) -> RepositoryAuth {
        RepositoryAuth {
            r#type,
            secret_name: "git-creds".to_string(),
        }
    }

    #[test]
    fn test_ssh_auth_secret() {
        let secret = secret(Some(SSH_AUTH_SECRET_TYPE), &[("ssh-privatekey", "PRIVATE")]);
        let git_auth = GitAuth::from_secret(&secret, &auth(RepositoryAuthType::Key)).unwrap();
        assert_eq!(git_auth.auth_type(), RepositoryAuthType::Key);
        assert_eq!(git_auth.private_key(), Some("PRIVATE"));
    }

    #[test]
    fn test_typed_secret_must_match_auth_type() {
        let secret = secret(Some(SSH_AUTH_SECRET_TYPE), &[("ssh-privatekey", "PRIVATE")]);
        let err = GitAuth::from_secret(&secret, &auth(RepositoryAuthType::Basic)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "inconsistent secret type: basic, kubernetes.io/ssh-auth"
        );
    }

    #[test]
    fn test_basic_auth_missing_password() {
        let secret = secret(Some(BASIC_AUTH_SECRET_TYPE), &[("username", "bob")]);
        let err = GitAuth::from_secret(&secret, &auth(RepositoryAuthType::Basic)).unwrap_err();
        assert_eq!(err.to_string(), "missing 'username' or 'password'");
    }

    #[test]
    fn test_legacy_key_secret_with_passphrase() {
        let secret = secret(None, &[("key", "PRIVATE"), ("password", "phrase")]);
        let git_auth = GitAuth::from_secret(&secret, &auth(RepositoryAuthType::Key)).unwrap();
        let names: Vec<_> = git_auth.auth_envs().into_iter().map(|e| e.name).collect();
        assert_eq!(
            names,
            vec![
                APP_REPOSITORY_AUTH_TYPE,
                APP_REPOSITORY_KEY,
                APP_REPOSITORY_PASSWORD
            ]
        );
    }

    #[test]
    fn test_legacy_key_secret_missing_key() {
        let secret = secret(Some("Opaque"), &[("password", "phrase")]);
        let err = GitAuth::from_secret(&secret, &auth(RepositoryAuthType::Key)).unwrap_err();
        assert_eq!(err, GitAuthError::MissingField("key".to_string()));
    }

    #[test]
    fn test_string_data_is_read() {
        let secret = Secret {
            type_: Some(BASIC_AUTH_SECRET_TYPE.to_string()),
            string_data: Some(BTreeMap::from([
                ("username".to_string(), "bob".to_string()),
                ("password".to_string(), "secret".to_string()),
            ])),
            ..Default::default()
        };
        let git_auth = GitAuth::from_secret(&secret, &auth(RepositoryAuthType::Basic)).unwrap();
        assert_eq!(git_auth.basic_credentials(), Some(("bob", "secret")));
    }

    #[test]
    fn test_basic_auth_envs_reference_secret() {
        let git_auth = GitAuth::basic("git-creds", "bob", "secret");
        let envs = git_auth.auth_envs();

        assert_eq!(envs[0].value.as_deref(), Some("basic"));
        let username_ref = envs[1]
            .value_from
            .as_ref()
            .and_then(|v| v.secret_key_ref.as_ref())
            .unwrap();
        assert_eq!(username_ref.name, "git-creds");
        assert_eq!(username_ref.key, "username");
        assert!(envs.iter().all(|e| e.value.as_deref() != Some("secret")));
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let git_auth = GitAuth::basic("git-creds", "bob", "hunter2");
        let printed = format!("{git_auth:?}");
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("***"));
    }
}
