//! Auth Token Provider: yields a bearer token for the configured agent CLI's
//! backing service. The engine never implements a full OAuth flow or
//! credential-store/decryption support itself — those are a human's or the
//! agent CLI's problem — it only enumerates the handful of sources an
//! already-authenticated environment is likely to expose.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no token found in ${0} or the config directory")]
    NotFound(String),

    #[error("token in {0} looks encrypted; re-authenticate with the agent CLI directly")]
    LooksEncrypted(String),

    #[error("io error reading token file: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait AuthTokenProvider: Send + Sync {
    async fn token(&self) -> Result<String, AuthError>;
}

/// Checks a configurable environment variable, then a file under the
/// platform config directory (via `directories`). Tokens that look like they
/// came out of an encrypted keychain blob (non-UTF8-safe / containing null
/// bytes after a best-effort read) are rejected with a diagnostic rather than
/// silently passed through.
pub struct EnvAndConfigDirAuthProvider {
    pub env_var: String,
    pub app_qualifier: &'static str,
    pub app_org: &'static str,
    pub app_name: &'static str,
}

impl EnvAndConfigDirAuthProvider {
    pub fn new(env_var: impl Into<String>) -> Self {
        Self {
            env_var: env_var.into(),
            app_qualifier: "dev",
            app_org: "specforge",
            app_name: "specforge",
        }
    }

    fn config_file_token(&self) -> Option<String> {
        let dirs = directories::ProjectDirs::from(self.app_qualifier, self.app_org, self.app_name)?;
        let path = dirs.config_dir().join("token");
        std::fs::read_to_string(path).ok().map(|s| s.trim().to_string())
    }
}

fn looks_encrypted(token: &str) -> bool {
    token.chars().any(|c| c == '\0') || !token.is_ascii()
}

#[async_trait]
impl AuthTokenProvider for EnvAndConfigDirAuthProvider {
    async fn token(&self) -> Result<String, AuthError> {
        if let Ok(value) = std::env::var(&self.env_var) {
            if looks_encrypted(&value) {
                return Err(AuthError::LooksEncrypted(self.env_var.clone()));
            }
            return Ok(value);
        }

        if let Some(value) = self.config_file_token() {
            if looks_encrypted(&value) {
                return Err(AuthError::LooksEncrypted("config directory token file".to_string()));
            }
            return Ok(value);
        }

        Err(AuthError::NotFound(self.env_var.clone()))
    }
}
