//! DNS provider trait for zone management
//!
//! Defines the zone API that a DNS provider backend must expose: listing
//! record sets by name and type, submitting atomic changes and reading a
//! change back by its identifier.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use thiserror::Error;

use crate::poll::Cancelled;

/// Result type for DNS operations
pub type DnsResult<T> = Result<T, DnsProviderError>;

/// Errors that can occur during DNS provider operations
#[derive(Debug, Error)]
pub enum DnsProviderError {
    /// Authentication failed with the DNS provider
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The managed zone does not exist
    #[error("Managed zone '{zone}' not found")]
    ZoneNotFound { zone: String },

    /// API request failed
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// The provider refused the change
    #[error("Change rejected by provider: {0}")]
    ChangeRejected(String),

    /// Request timeout
    #[error("Request timed out after {elapsed_secs}s")]
    Timeout { elapsed_secs: u64 },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Credential loading failed
    #[error("Failed to load credentials: {0}")]
    Credentials(String),

    /// The caller cancelled while waiting on the provider
    #[error("DNS operation cancelled")]
    Cancelled,
}

impl From<Cancelled> for DnsProviderError {
    fn from(_: Cancelled) -> Self {
        DnsProviderError::Cancelled
    }
}

/// A set of records sharing one name and type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSet {
    /// Fully qualified name with trailing dot
    pub name: String,
    /// Record type ("A", "AAAA", "TXT")
    #[serde(rename = "type")]
    pub record_type: String,
    /// Time to live in seconds
    pub ttl: u32,
    /// Record data values, as the zone stores them
    #[serde(default)]
    pub rrdatas: Vec<String>,
}

impl RecordSet {
    pub fn new(
        name: impl Into<String>,
        record_type: impl Into<String>,
        ttl: u32,
        rrdatas: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            record_type: record_type.into(),
            ttl,
            rrdatas,
        }
    }
}

/// One page of a record set listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSetPage {
    pub record_sets: Vec<RecordSet>,
    /// Token for the next page, `None` on the last page
    pub next_page_token: Option<String>,
}

/// Additions and deletions applied atomically to a zone
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRequest {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additions: Vec<RecordSet>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deletions: Vec<RecordSet>,
}

impl ChangeRequest {
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.deletions.is_empty()
    }
}

/// Provider-side progress of a change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeStatus {
    Pending,
    Done,
    #[serde(other)]
    Unknown,
}

/// A submitted change as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    pub id: String,
    pub status: ChangeStatus,
    /// RFC 3339 time the provider started applying the change
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub additions: Vec<RecordSet>,
    #[serde(default)]
    pub deletions: Vec<RecordSet>,
}

/// Trait for DNS providers that manage a single zone
///
/// Implementations must be thread-safe. Errors are never retried by callers.
#[async_trait]
pub trait DnsProvider: Send + Sync + Debug {
    /// Returns the provider name (e.g., "google")
    fn name(&self) -> &'static str;

    /// The managed zone this provider writes to
    fn zone(&self) -> &str;

    /// List record sets matching `name` and `record_type`, one page at a time
    async fn list_record_sets(
        &self,
        name: &str,
        record_type: &str,
        page_token: Option<&str>,
    ) -> DnsResult<RecordSetPage>;

    /// Submit additions and deletions as one atomic change
    async fn create_change(&self, change: &ChangeRequest) -> DnsResult<Change>;

    /// Read a previously submitted change
    async fn get_change(&self, id: &str) -> DnsResult<Change>;
}
