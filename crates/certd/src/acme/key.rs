//! Account key store
//!
//! The ACME account is bound to a P-256 key kept as a SEC1 `EC PRIVATE KEY`
//! PEM file in the work directory. The key is created once and read on
//! every later start; a readable, valid key is never replaced.

use std::path::Path;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::{EncodePrivateKey, LineEnding};
use p256::SecretKey;
use rand_core::OsRng;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::error::AcmeError;
use super::storage::write_private_file;

/// PEM label of the persisted account key
pub const ACCOUNT_KEY_PEM_LABEL: &str = "EC PRIVATE KEY";

/// ECDSA P-256 key the ACME account is registered with
#[derive(Clone)]
pub struct AccountKey {
    secret: SecretKey,
}

impl std::fmt::Debug for AccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountKey")
            .field("thumbprint", &self.thumbprint())
            .finish()
    }
}

impl AccountKey {
    /// Generate a new random key
    pub fn generate() -> Self {
        Self {
            secret: SecretKey::random(&mut OsRng),
        }
    }

    /// Parse a SEC1 PEM (`EC PRIVATE KEY`) document
    pub fn from_pem(pem: &str) -> Result<Self, String> {
        SecretKey::from_sec1_pem(pem)
            .map(|secret| Self { secret })
            .map_err(|e| format!("not a P-256 {} block: {}", ACCOUNT_KEY_PEM_LABEL, e))
    }

    /// Encode as a SEC1 PEM document
    pub fn to_pem(&self) -> Result<String, String> {
        self.secret
            .to_sec1_pem(LineEnding::LF)
            .map(|pem| pem.as_str().to_owned())
            .map_err(|e| format!("failed to encode key: {}", e))
    }

    /// PKCS#8 DER encoding, the form the ACME client loads keys from
    pub fn to_pkcs8_der(&self) -> Result<Vec<u8>, String> {
        self.secret
            .to_pkcs8_der()
            .map(|der| der.as_bytes().to_vec())
            .map_err(|e| format!("failed to encode key: {}", e))
    }

    /// Uncompressed public point coordinates
    fn coordinates(&self) -> (String, String) {
        let point = self.secret.public_key().to_encoded_point(false);
        // 0x04 || x (32 bytes) || y (32 bytes)
        let bytes = point.as_bytes();
        (
            URL_SAFE_NO_PAD.encode(&bytes[1..33]),
            URL_SAFE_NO_PAD.encode(&bytes[33..65]),
        )
    }

    /// RFC 7638 JWK thumbprint, base64url without padding
    pub fn thumbprint(&self) -> String {
        let (x, y) = self.coordinates();
        // Required members in lexicographic order, no whitespace
        let canonical = format!(r#"{{"crv":"P-256","kty":"EC","x":"{}","y":"{}"}}"#, x, y);
        URL_SAFE_NO_PAD.encode(Sha256::digest(canonical.as_bytes()))
    }
}

/// Loads or creates the account key
#[derive(Debug, Default)]
pub struct AccountKeyStore;

impl AccountKeyStore {
    /// Read the key at `path`, generating and writing a new one only when the
    /// file is missing or unparseable
    pub fn load_or_create(path: &Path) -> Result<AccountKey, AcmeError> {
        load_or_create_pem(
            path,
            "account",
            AccountKey::from_pem,
            || {
                let key = AccountKey::generate();
                let pem = key.to_pem()?;
                Ok((key, pem))
            },
        )
    }
}

/// Shared create-if-absent policy for private keys stored as PEM
///
/// `parse` is tried on the file content first. On any read or parse failure
/// a key is produced by `generate` and written with owner-only permissions.
pub(crate) fn load_or_create_pem<K>(
    path: &Path,
    purpose: &str,
    parse: impl FnOnce(&str) -> Result<K, String>,
    generate: impl FnOnce() -> Result<(K, String), String>,
) -> Result<K, AcmeError> {
    let key_error = |message: String| AcmeError::Key {
        path: path.display().to_string(),
        message,
    };

    let reason = match std::fs::read_to_string(path) {
        Ok(content) => match parse(&content) {
            Ok(key) => {
                debug!(path = %path.display(), purpose, "Loaded existing private key");
                return Ok(key);
            }
            Err(e) => e,
        },
        Err(e) => e.to_string(),
    };

    warn!(
        path = %path.display(),
        purpose,
        reason = %reason,
        "Private key unavailable, generating a new one"
    );

    let (key, pem) = generate().map_err(key_error)?;
    write_private_file(path, pem.as_bytes()).map_err(|e| key_error(e.to_string()))?;

    info!(path = %path.display(), purpose, "Generated new private key");
    Ok(key)
}
