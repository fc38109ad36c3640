//! Address record publishing
//!
//! Keeps the primary domain's A or AAAA record pointed at the service's
//! current external address.

use std::net::IpAddr;

use tokio_util::sync::CancellationToken;
use tracing::info;

use super::provider::{DnsProviderError, DnsResult, RecordSet};
use super::reconciler::{DnsReconciler, ReconcileOutcome};

/// TTL of the published address record (60 seconds)
pub const ADDRESS_TTL: u32 = 60;

/// Publishes the external address of the primary domain
#[derive(Debug, Clone)]
pub struct AddressPublisher {
    reconciler: DnsReconciler,
    domain: String,
}

impl AddressPublisher {
    pub fn new(reconciler: DnsReconciler, domain: impl Into<String>) -> Self {
        Self {
            reconciler,
            domain: domain.into(),
        }
    }

    /// Point the primary domain at `ip`
    ///
    /// IPv4 addresses publish an `A` record, IPv6 addresses an `AAAA` record.
    /// Waits for the previous record's TTL after the change is applied.
    pub async fn update_address_record(
        &self,
        cancel: &CancellationToken,
        ip: IpAddr,
    ) -> DnsResult<ReconcileOutcome> {
        let record = address_record(&self.domain, ip);
        info!(
            domain = %self.domain,
            ip = %ip,
            record_type = %record.record_type,
            "Updating address record"
        );

        self.reconciler.reconcile(cancel, &record, true).await
    }

    /// Like [`update_address_record`](Self::update_address_record), for a
    /// textual address as reported by NAT discovery
    pub async fn update_address_str(
        &self,
        cancel: &CancellationToken,
        ip: &str,
    ) -> DnsResult<ReconcileOutcome> {
        let ip: IpAddr = ip.trim().parse().map_err(|_| {
            DnsProviderError::Configuration(format!("'{}' is not an IP address", ip))
        })?;
        self.update_address_record(cancel, ip).await
    }
}

/// The address record set for `domain`
pub fn address_record(domain: &str, ip: IpAddr) -> RecordSet {
    let record_type = match ip {
        IpAddr::V4(_) => "A",
        IpAddr::V6(_) => "AAAA",
    };
    RecordSet::new(
        format!("{}.", domain.trim_end_matches('.').to_ascii_lowercase()),
        record_type,
        ADDRESS_TTL,
        vec![ip.to_string()],
    )
}
