//! DNS zone management
//!
//! Publishes DNS-01 challenge responses and the service's address record
//! through a cloud DNS zone API.
//!
//! # Architecture
//!
//! - [`DnsProvider`] - Trait for the zone API (list, create change, get change)
//! - [`DnsReconciler`] - Idempotent convergence of one record set
//! - [`AddressPublisher`] - A/AAAA record for the primary domain
//! - [`CredentialLoader`] - Loading of the API bearer token
//!
//! # Providers
//!
//! - [`GoogleCloudDnsProvider`] - Google Cloud DNS API

pub mod address;
pub mod challenge;
mod credentials;
mod provider;
mod providers;
pub mod reconciler;

pub use address::{address_record, AddressPublisher, ADDRESS_TTL};
pub use challenge::{
    challenge_record, challenge_record_fqdn, compute_challenge_value, key_authorization,
    normalize_domain, ACME_CHALLENGE_RECORD, CHALLENGE_TTL,
};
pub use credentials::{CredentialLoader, Credentials};
pub use provider::{
    Change, ChangeRequest, ChangeStatus, DnsProvider, DnsProviderError, DnsResult, RecordSet,
    RecordSetPage,
};
pub use providers::{create_provider, GoogleCloudDnsProvider};
pub use reconciler::{plan, DnsReconciler, ReconcileOutcome, ReconcilePlan};
