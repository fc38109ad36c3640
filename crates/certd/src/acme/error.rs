//! ACME error types

use std::io;
use thiserror::Error;

use super::dns::DnsProviderError;
use crate::poll::Cancelled;

/// Errors that can occur during certificate lifecycle operations
#[derive(Debug, Error)]
pub enum AcmeError {
    /// No ACME account has been attached to the CA client
    #[error("ACME account not initialized - call ensure_account() first")]
    NoAccount,

    /// No account key has been attached to the CA client
    #[error("ACME account key not set")]
    NoAccountKey,

    /// Failed to register an ACME account
    #[error("Failed to create ACME account: {0}")]
    AccountCreation(String),

    /// The account was registered but could not be written to disk
    #[error("Failed to persist ACME account to '{path}': {source}")]
    AccountPersistence {
        path: String,
        #[source]
        source: StorageError,
    },

    /// Key generation, parsing or persistence failed
    #[error("Key error for '{path}': {message}")]
    Key { path: String, message: String },

    /// Failed to create certificate order
    #[error("Failed to create certificate order: {0}")]
    OrderCreation(String),

    /// The CA offered no DNS-01 challenge for the domain
    #[error("No DNS-01 challenge offered for domain '{domain}'")]
    UnsupportedChallenge { domain: String },

    /// The authorization reached a terminal state other than valid
    #[error("Authorization for domain '{domain}' ended as {status}: {detail}")]
    AuthorizationFailed {
        domain: String,
        status: String,
        detail: String,
    },

    /// Certificate finalization failed
    #[error("Failed to finalize certificate: {0}")]
    Finalization(String),

    /// Storage operation failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// ACME protocol error reported by the CA or malformed response
    #[error("ACME protocol error: {0}")]
    Protocol(String),

    /// Certificate signing request could not be built
    #[error("Failed to build certificate request: {0}")]
    Csr(String),

    /// DNS provider operation failed
    #[error("DNS provider error: {0}")]
    DnsProvider(#[from] DnsProviderError),

    /// The caller cancelled the operation
    #[error("Operation cancelled")]
    Cancelled,

    /// Certificate parsing error
    #[error("Failed to parse certificate: {0}")]
    CertificateParse(String),

    /// Empty domain set
    #[error("At least one domain is required")]
    NoDomains,
}

impl AcmeError {
    /// Whether this error was caused by caller cancellation rather than a
    /// protocol or provider failure
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            AcmeError::Cancelled | AcmeError::DnsProvider(DnsProviderError::Cancelled)
        )
    }
}

impl From<Cancelled> for AcmeError {
    fn from(_: Cancelled) -> Self {
        AcmeError::Cancelled
    }
}

impl From<instant_acme::Error> for AcmeError {
    fn from(e: instant_acme::Error) -> Self {
        AcmeError::Protocol(e.to_string())
    }
}

/// Errors specific to work directory storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// IO error during file operations
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Failed to serialize/deserialize data
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}
