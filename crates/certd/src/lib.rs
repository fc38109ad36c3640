//! Rover certificate daemon
//!
//! Provisions TLS certificates for the rover's public domains through ACME
//! DNS-01 challenges and keeps the domains' DNS records current in a Google
//! Cloud DNS zone.
//!
//! The two entry points used by the rest of the system are
//! [`acme::CertificateLifecycleController::check_or_refresh`], called once at
//! startup before the HTTPS listener is set up, and
//! [`acme::dns::AddressPublisher::update_address_record`], called when NAT
//! discovery learns the external address.

pub mod acme;
pub mod poll;

pub use acme::dns::{AddressPublisher, DnsReconciler};
pub use acme::{AcmeClient, AcmeError, CertificateLifecycleController, CertificatePaths};
pub use poll::Cancelled;
