//! DNS-01 authorization solver
//!
//! Resolves one domain's authorization at a time:
//! 1. Look up the domain's authorization in the order
//! 2. Stop if it is already valid
//! 3. Publish the challenge TXT record and wait out its TTL
//! 4. Accept the challenge and poll until the CA reaches a verdict

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::authority::{AuthorizationStatus, CertificateAuthority, Order, DNS01};
use super::dns::{challenge_record, compute_challenge_value, key_authorization, DnsReconciler};
use super::error::AcmeError;
use crate::poll::{cancellable, poll_until, PollStatus};

/// Publishes DNS-01 responses and drives authorizations to a terminal state
#[derive(Debug, Clone)]
pub struct AuthorizationSolver {
    ca: Arc<dyn CertificateAuthority>,
    reconciler: DnsReconciler,
    poll_interval: Duration,
}

impl AuthorizationSolver {
    pub fn new(
        ca: Arc<dyn CertificateAuthority>,
        reconciler: DnsReconciler,
        poll_interval: Duration,
    ) -> Self {
        Self {
            ca,
            reconciler,
            poll_interval,
        }
    }

    /// Prove control of `domain` for `order`
    ///
    /// An already valid authorization returns without any DNS write or CA
    /// mutation. A terminal state other than valid fails with
    /// [`AcmeError::AuthorizationFailed`] naming the domain.
    pub async fn authorize(
        &self,
        cancel: &CancellationToken,
        order: &Order,
        domain: &str,
    ) -> Result<(), AcmeError> {
        let authz = cancellable(cancel, self.ca.authorization(order, domain)).await?;
        debug!(domain = %domain, status = %authz.status, "Processing authorization");

        match authz.status {
            AuthorizationStatus::Valid => {
                info!(domain = %domain, "Authorization already valid");
                return Ok(());
            }
            AuthorizationStatus::Pending => {}
            status => {
                return Err(AcmeError::AuthorizationFailed {
                    domain: domain.to_string(),
                    status: status.to_string(),
                    detail: authz
                        .error
                        .unwrap_or_else(|| "authorization is no longer pending".to_string()),
                });
            }
        }

        let challenge = authz
            .challenge(DNS01)
            .ok_or_else(|| AcmeError::UnsupportedChallenge {
                domain: domain.to_string(),
            })?;

        let thumbprint = self.ca.thumbprint()?;
        let value = compute_challenge_value(&key_authorization(&challenge.token, &thumbprint));
        let record = challenge_record(domain, &value);

        info!(
            domain = %domain,
            record = %record.name,
            provider = %self.reconciler.provider().name(),
            "Publishing DNS-01 challenge record"
        );
        self.reconciler.reconcile(cancel, &record, true).await?;

        cancellable(cancel, self.ca.accept(order, challenge)).await?;
        info!(domain = %domain, "Challenge accepted, waiting for validation");

        let ca = &self.ca;
        let verdict = poll_until(cancel, self.poll_interval, || async move {
            let authz = ca.authorization(order, domain).await?;
            debug!(domain = %authz.domain, status = %authz.status, "Authorization status");

            let status = if authz.status.is_terminal() {
                PollStatus::Ready(authz)
            } else {
                PollStatus::Pending
            };
            Ok::<_, AcmeError>(status)
        })
        .await?;

        if verdict.status == AuthorizationStatus::Valid {
            info!(domain = %domain, "Authorization valid");
            return Ok(());
        }

        let detail = verdict
            .error
            .unwrap_or_else(|| "no detail from CA".to_string());
        warn!(domain = %domain, status = %verdict.status, detail = %detail, "Authorization failed");

        Err(AcmeError::AuthorizationFailed {
            domain: domain.to_string(),
            status: verdict.status.to_string(),
            detail,
        })
    }
}
