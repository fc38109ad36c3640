//! ACME certificate management with DNS-01 challenges
//!
//! # Architecture
//!
//! Components, leaf to root:
//!
//! - [`AccountKeyStore`] - Loads or generates the account key
//! - [`dns::DnsReconciler`] - Converges zone records and waits for changes
//! - [`AccountManager`] - Registers the account once and persists it
//! - [`AuthorizationSolver`] - Publishes DNS-01 responses, polls the CA
//! - [`CertificateIssuer`] - Builds the CSR and stores the issued chain
//! - [`CertificateLifecycleController`] - Runs the above at startup
//!
//! The CA is reached through the [`CertificateAuthority`] trait, implemented
//! by [`AcmeClient`] on top of instant-acme.
//!
//! # Flow
//!
//! 1. [`CertificateLifecycleController`] checks `<primary>.crt` for expiry
//! 2. The account key and account are loaded or created
//! 3. One order is created for the whole domain set
//! 4. Each domain is authorized in sequence through a TXT record at
//!    `_acme-challenge.<domain>.`, waiting out its TTL before accepting
//! 5. The order is finalized and the chain written to the work directory

mod account;
mod authority;
mod client;
pub mod dns;
mod error;
mod issuer;
mod key;
mod lifecycle;
mod solver;
mod storage;

pub use account::{contact_for, AccountManager};
pub use authority::{
    Account, Authorization, AuthorizationStatus, CertificateAuthority, Challenge, Order,
    OrderStatus, DNS01,
};
pub use client::AcmeClient;
pub use error::{AcmeError, StorageError};
pub use issuer::{build_csr, encode_chain, load_or_create_certificate_key, CertificateIssuer};
pub use key::{AccountKey, AccountKeyStore, ACCOUNT_KEY_PEM_LABEL};
pub use lifecycle::CertificateLifecycleController;
pub use solver::AuthorizationSolver;
pub use storage::{
    certificate_expiry, needs_renewal, parse_certificate_expiry, CertificatePaths, WorkDirectory,
    ACCOUNT_FILE, ACCOUNT_KEY_FILE,
};
