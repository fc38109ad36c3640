//! ACME account registration and persistence

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::authority::{Account, CertificateAuthority};
use super::error::{AcmeError, StorageError};
use super::storage::write_private_file;
use crate::poll::cancellable;

/// Registers the ACME account once and reuses it afterwards
#[derive(Debug, Clone)]
pub struct AccountManager {
    ca: Arc<dyn CertificateAuthority>,
}

impl AccountManager {
    pub fn new(ca: Arc<dyn CertificateAuthority>) -> Self {
        Self { ca }
    }

    /// Load the account stored at `path`, or register and store a new one
    ///
    /// A readable, parseable account file is trusted without any network
    /// call. Otherwise a registration is made with `contact` and written to
    /// `path`; failing to write it is an error, since the next start would
    /// register again.
    pub async fn ensure_account(
        &self,
        cancel: &CancellationToken,
        path: &Path,
        contact: &[String],
    ) -> Result<Account, AcmeError> {
        match read_account(path) {
            Ok(account) => {
                debug!(path = %path.display(), account = %account.uri, "Using stored ACME account");
                self.ca.set_account(&account);
                return Ok(account);
            }
            Err(e) => {
                info!(path = %path.display(), reason = %e, "No usable ACME account, registering");
            }
        }

        let account = cancellable(cancel, self.ca.register(contact)).await?;

        write_account(path, &account).map_err(|source| AcmeError::AccountPersistence {
            path: path.display().to_string(),
            source,
        })?;

        info!(path = %path.display(), account = %account.uri, "ACME account stored");
        Ok(account)
    }
}

/// Contact URIs for an optional email address
pub fn contact_for(email: Option<&str>) -> Vec<String> {
    email
        .filter(|e| !e.is_empty())
        .map(|e| vec![format!("mailto:{}", e)])
        .unwrap_or_default()
}

fn read_account(path: &Path) -> Result<Account, StorageError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn write_account(path: &Path, account: &Account) -> Result<(), StorageError> {
    let json = serde_json::to_string_pretty(account)?;
    write_private_file(path, json.as_bytes())?;
    Ok(())
}
