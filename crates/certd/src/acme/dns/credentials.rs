//! Credential loading for the DNS API
//!
//! The zone API is called with an OAuth2 bearer token, read from:
//! - a JSON file (`{"access_token": "..."}` or `{"token": "..."}`)
//! - a plain text file holding only the token
//! - an environment variable with either of the above

use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use super::provider::DnsProviderError;

/// An API bearer token
#[derive(Clone)]
pub struct Credentials {
    token: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials").field("token", &"<redacted>").finish()
    }
}

impl Credentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn bearer_token(&self) -> &str {
        &self.token
    }
}

/// Credential loader for DNS API authentication
#[derive(Debug, Default)]
pub struct CredentialLoader;

impl CredentialLoader {
    /// Load credentials from a file
    ///
    /// Warns when the file is readable by group or others.
    pub fn load_from_file(path: &Path) -> Result<Credentials, DnsProviderError> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let metadata = fs::metadata(path).map_err(|e| {
                DnsProviderError::Credentials(format!(
                    "Failed to read credentials file '{}': {}",
                    path.display(),
                    e
                ))
            })?;

            let file_mode = metadata.permissions().mode() & 0o777;
            if file_mode & 0o077 != 0 {
                warn!(
                    path = %path.display(),
                    mode = format!("{:o}", file_mode),
                    "Credentials file has overly permissive permissions (should be 0600 or 0400)"
                );
            }
        }

        let content = fs::read_to_string(path).map_err(|e| {
            DnsProviderError::Credentials(format!(
                "Failed to read credentials file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::parse(&content).map_err(|e| match e {
            DnsProviderError::Credentials(msg) => {
                DnsProviderError::Credentials(format!("{} ({})", msg, path.display()))
            }
            other => other,
        })
    }

    /// Load credentials from an environment variable
    pub fn load_from_env(var_name: &str) -> Result<Credentials, DnsProviderError> {
        let value = std::env::var(var_name).map_err(|_| {
            DnsProviderError::Credentials(format!("Environment variable '{}' not set", var_name))
        })?;

        Self::parse(&value)
    }

    /// Parse a token from JSON or plain text
    fn parse(content: &str) -> Result<Credentials, DnsProviderError> {
        let trimmed = content.trim();

        if trimmed.is_empty() {
            return Err(DnsProviderError::Credentials(
                "Credentials are empty".to_string(),
            ));
        }

        if trimmed.starts_with('{') {
            return Self::parse_json(trimmed);
        }

        debug!("Loaded credentials as plain text token");
        Ok(Credentials::new(trimmed))
    }

    fn parse_json(json: &str) -> Result<Credentials, DnsProviderError> {
        #[derive(Deserialize)]
        struct TokenFormat {
            access_token: Option<String>,
            token: Option<String>,
        }

        let parsed: TokenFormat = serde_json::from_str(json).map_err(|e| {
            DnsProviderError::Credentials(format!("Invalid JSON credentials: {}", e))
        })?;

        match parsed.access_token.or(parsed.token) {
            Some(token) if !token.trim().is_empty() => {
                debug!("Loaded credentials as JSON token");
                Ok(Credentials::new(token.trim()))
            }
            _ => Err(DnsProviderError::Credentials(
                "Invalid JSON credentials format. Expected {\"access_token\": \"...\"} or {\"token\": \"...\"}"
                    .to_string(),
            )),
        }
    }
}
