//! Work directory layout
//!
//! All persistent state lives in one directory:
//!
//! ```text
//! work-directory/
//! ├── account.key            # SEC1 PEM account key (0600)
//! ├── account.json           # registered account record
//! ├── <primary-domain>.key   # certificate private key (0600)
//! └── <primary-domain>.crt   # PEM certificate chain
//! ```

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tracing::{debug, warn};

use super::error::{AcmeError, StorageError};

/// Account key file name
pub const ACCOUNT_KEY_FILE: &str = "account.key";
/// Account record file name
pub const ACCOUNT_FILE: &str = "account.json";

/// Locations of a certificate chain and its private key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificatePaths {
    pub certificate: PathBuf,
    pub private_key: PathBuf,
}

/// The daemon's work directory
#[derive(Debug, Clone)]
pub struct WorkDirectory {
    root: PathBuf,
}

impl WorkDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the directory (owner-only on Unix) if it does not exist
    pub fn ensure(&self) -> Result<(), StorageError> {
        if self.root.is_dir() {
            return Ok(());
        }

        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }
        builder.create(&self.root)?;

        debug!(path = %self.root.display(), "Created work directory");
        Ok(())
    }

    pub fn account_key_path(&self) -> PathBuf {
        self.root.join(ACCOUNT_KEY_FILE)
    }

    pub fn account_path(&self) -> PathBuf {
        self.root.join(ACCOUNT_FILE)
    }

    /// Certificate and key paths for a domain set, named after its primary domain
    pub fn certificate_paths(&self, primary_domain: &str) -> CertificatePaths {
        CertificatePaths {
            certificate: self.root.join(format!("{}.crt", primary_domain)),
            private_key: self.root.join(format!("{}.key", primary_domain)),
        }
    }

    /// Replace `path` with `contents` through a temporary file and rename
    ///
    /// Readers never observe a partially written file.
    pub fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<(), StorageError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp_path = path.with_file_name(format!(".{}.tmp", file_name));

        let result = (|| {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(contents)?;
            file.sync_all()?;
            fs::rename(&temp_path, path)
        })();

        if result.is_err() {
            let _ = fs::remove_file(&temp_path);
        }
        result.map_err(StorageError::from)
    }
}

/// Write a file readable only by its owner, truncating existing content
///
/// The mode of an existing file is reset to 0600 before anything is written.
pub(crate) fn write_private_file(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(contents)?;
    file.sync_all()
}

/// Expiry of the first certificate in a PEM file
///
/// Returns `Ok(None)` when the file does not exist.
pub fn certificate_expiry(path: &Path) -> Result<Option<DateTime<Utc>>, AcmeError> {
    let content = match fs::read(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StorageError::Io(e).into()),
    };

    parse_certificate_expiry(&content).map(Some)
}

/// Parse certificate PEM to extract the expiry date
pub fn parse_certificate_expiry(cert_pem: &[u8]) -> Result<DateTime<Utc>, AcmeError> {
    let (_, pem) = x509_parser::pem::parse_x509_pem(cert_pem)
        .map_err(|e| AcmeError::CertificateParse(format!("Failed to parse PEM: {}", e)))?;

    let cert = pem
        .parse_x509()
        .map_err(|e| AcmeError::CertificateParse(format!("Failed to parse certificate: {}", e)))?;

    let timestamp = cert.validity().not_after.timestamp();
    DateTime::from_timestamp(timestamp, 0)
        .ok_or_else(|| AcmeError::CertificateParse("Invalid expiry timestamp".to_string()))
}

/// Whether the certificate at `path` must be (re)issued
///
/// True when the file is missing, cannot be parsed, or expires within
/// `renew_before_days` of `now`.
pub fn needs_renewal(path: &Path, renew_before_days: u32, now: DateTime<Utc>) -> bool {
    match certificate_expiry(path) {
        Ok(None) => {
            debug!(path = %path.display(), "No certificate on disk");
            true
        }
        Ok(Some(expires)) => {
            let threshold = now + ChronoDuration::days(i64::from(renew_before_days));
            let renew = expires <= threshold;
            debug!(
                path = %path.display(),
                expires = %expires,
                renew_before_days,
                renew,
                "Checked certificate expiry"
            );
            renew
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Unreadable certificate, renewing");
            true
        }
    }
}
