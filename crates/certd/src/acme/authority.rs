//! Certificate authority interface
//!
//! The lifecycle components talk to the CA only through
//! [`CertificateAuthority`]. [`AcmeClient`](super::AcmeClient) implements it
//! over instant-acme; tests substitute an in-memory CA.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::AcmeError;
use super::key::AccountKey;

/// Challenge type answered through a DNS TXT record
pub const DNS01: &str = "dns-01";

/// A registered ACME account, persisted as JSON in the work directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Account URL, used as the JWS key identifier
    pub uri: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub contact: Vec<String>,
    #[serde(default)]
    pub terms_of_service_agreed: bool,
    /// URL listing the account's orders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orders: Option<String>,
}

/// Order state as defined by RFC 8555 section 7.1.6
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Ready,
    Processing,
    Valid,
    Invalid,
}

/// A certificate order for a domain set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub url: String,
    pub status: OrderStatus,
    /// Domains of the order, in request order
    pub domains: Vec<String>,
    /// Authorization URLs
    pub authorizations: Vec<String>,
    pub finalize: String,
    /// Certificate download URL once valid
    pub certificate: Option<String>,
    /// Problem detail reported for an invalid order
    pub error: Option<String>,
}

/// Authorization state
///
/// Anything but `Pending` is terminal for this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorizationStatus {
    Pending,
    Valid,
    Invalid,
    Deactivated,
    Expired,
    Revoked,
    #[serde(other)]
    Unknown,
}

impl AuthorizationStatus {
    pub fn is_terminal(self) -> bool {
        self != AuthorizationStatus::Pending
    }
}

impl fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuthorizationStatus::Pending => "pending",
            AuthorizationStatus::Valid => "valid",
            AuthorizationStatus::Invalid => "invalid",
            AuthorizationStatus::Deactivated => "deactivated",
            AuthorizationStatus::Expired => "expired",
            AuthorizationStatus::Revoked => "revoked",
            AuthorizationStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A challenge offered within an authorization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    /// Challenge type, e.g. `dns-01`
    pub kind: String,
    pub url: String,
    pub token: String,
    pub status: String,
}

/// Proof-of-control state for one domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorization {
    pub url: String,
    /// Domain as requested, with `*.` for wildcard authorizations
    pub domain: String,
    pub status: AuthorizationStatus,
    pub challenges: Vec<Challenge>,
    /// Problem detail of a failed challenge
    pub error: Option<String>,
}

impl Authorization {
    /// The challenge of the given type, if offered
    pub fn challenge(&self, kind: &str) -> Option<&Challenge> {
        self.challenges.iter().find(|c| c.kind == kind)
    }
}

/// Operations the lifecycle needs from an ACME certificate authority
///
/// Implementations hold the account key and account URL as interior state,
/// set once per refresh. No method retries on failure.
#[async_trait]
pub trait CertificateAuthority: Send + Sync + fmt::Debug {
    /// Use `key` to sign all subsequent requests
    fn set_key(&self, key: AccountKey);

    /// Bind subsequent requests to an existing account
    fn set_account(&self, account: &Account);

    /// JWK thumbprint of the current account key
    fn thumbprint(&self) -> Result<String, AcmeError>;

    /// Register a new account, agreeing to the terms of service
    async fn register(&self, contact: &[String]) -> Result<Account, AcmeError>;

    /// Create an order for `domains`
    async fn new_order(&self, domains: &[String]) -> Result<Order, AcmeError>;

    /// Current state of the order's authorization for `domain`
    ///
    /// Domains compare case-insensitively. Every call reads the state from
    /// the CA, so polling this method observes validation progress.
    async fn authorization(&self, order: &Order, domain: &str)
        -> Result<Authorization, AcmeError>;

    /// Tell the CA to validate one of the order's challenges
    async fn accept(&self, order: &Order, challenge: &Challenge) -> Result<(), AcmeError>;

    /// Submit the DER-encoded certificate request
    async fn finalize(&self, order: &Order, csr_der: &[u8]) -> Result<Order, AcmeError>;

    /// Re-read an order
    async fn refresh_order(&self, order: &Order) -> Result<Order, AcmeError>;

    /// Download the issued chain as DER certificates, leaf first
    async fn certificate_chain(&self, order: &Order) -> Result<Vec<Vec<u8>>, AcmeError>;
}
