//! Certificate and DNS configuration types
//!
//! This module contains the configuration for the ACME certificate lifecycle
//! and for the DNS zone the daemon manages.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use validator::Validate;

/// Let's Encrypt production directory URL
pub const LETSENCRYPT_PRODUCTION: &str = "https://acme-v02.api.letsencrypt.org/directory";
/// Let's Encrypt staging directory URL
pub const LETSENCRYPT_STAGING: &str = "https://acme-staging-v02.api.letsencrypt.org/directory";

/// Google Cloud DNS v1 REST endpoint
pub const GOOGLE_DNS_ENDPOINT: &str = "https://dns.googleapis.com/dns/v1";

// ============================================================================
// ACME Configuration
// ============================================================================

/// ACME certificate management configuration
///
/// Orders carry only the domain identifiers, so the certificate lifetime is
/// the CA's default (90 days at Let's Encrypt). There is no setting for a
/// bounded validity window: Let's Encrypt rejects orders requesting
/// `notAfter`, and the ACME client does not send it.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "crate::validation::validate_acme_config"))]
pub struct AcmeConfig {
    /// Directory holding the account key, account record and certificates
    pub work_directory: PathBuf,

    /// Domains to certify; the first one is the primary domain
    ///
    /// Stored lowercase once loaded, matching how ACME servers and the DNS
    /// zone report names.
    #[validate(length(min = 1, message = "At least one domain is required"))]
    pub domains: Vec<String>,

    /// ACME directory URL (overrides `staging`)
    #[serde(default)]
    pub directory_url: Option<String>,

    /// Use the Let's Encrypt staging directory
    #[serde(default)]
    pub staging: bool,

    /// Contact email registered with the account
    #[serde(default)]
    pub email: Option<String>,

    /// Renew when the certificate expires within this many days
    #[serde(default = "default_renew_before_days")]
    pub renew_before_days: u32,

    /// Interval between authorization/order status polls
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl AcmeConfig {
    /// The ACME directory to talk to
    pub fn directory_url(&self) -> &str {
        match &self.directory_url {
            Some(url) => url,
            None if self.staging => LETSENCRYPT_STAGING,
            None => LETSENCRYPT_PRODUCTION,
        }
    }

    /// The domain used as certificate Common Name and for the address record
    pub fn primary_domain(&self) -> Option<&str> {
        self.domains.first().map(String::as_str)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Lowercase every domain in place
    pub fn normalize_domains(&mut self) {
        for domain in &mut self.domains {
            domain.make_ascii_lowercase();
        }
    }
}

// ============================================================================
// DNS Configuration
// ============================================================================

/// Cloud DNS zone configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DnsConfig {
    /// Cloud project owning the managed zone
    #[validate(length(min = 1, message = "DNS project must not be empty"))]
    pub project: String,

    /// Managed zone identifier
    #[validate(length(min = 1, message = "DNS zone must not be empty"))]
    pub zone: String,

    /// File containing the API bearer token
    #[serde(default)]
    pub credentials_file: Option<PathBuf>,

    /// Environment variable containing the API bearer token
    #[serde(default)]
    pub credentials_env: Option<String>,

    /// REST endpoint of the DNS API
    #[serde(default = "default_dns_endpoint")]
    pub endpoint: String,

    /// Timeout for a single API request
    #[serde(default = "default_api_timeout_secs")]
    pub api_timeout_secs: u64,

    /// Interval between change status polls
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl DnsConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }
}

// ============================================================================
// Default Value Functions
// ============================================================================

pub(crate) fn default_renew_before_days() -> u32 {
    30
}

pub(crate) fn default_poll_interval_ms() -> u64 {
    500
}

pub(crate) fn default_api_timeout_secs() -> u64 {
    30
}

pub(crate) fn default_dns_endpoint() -> String {
    GOOGLE_DNS_ENDPOINT.to_string()
}
