//! Certificate lifecycle controller
//!
//! Runs once at startup: returns the existing certificate when it is still
//! fresh, otherwise drives account setup, per-domain authorization and
//! issuance for the whole domain set.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use rover_config::AcmeConfig;

use super::account::{contact_for, AccountManager};
use super::authority::CertificateAuthority;
use super::dns::DnsReconciler;
use super::error::AcmeError;
use super::issuer::CertificateIssuer;
use super::key::AccountKeyStore;
use super::solver::AuthorizationSolver;
use super::storage::{certificate_expiry, needs_renewal, CertificatePaths, WorkDirectory};
use crate::poll::cancellable;

/// Orchestrates key, account, authorization and issuance
#[derive(Debug, Clone)]
pub struct CertificateLifecycleController {
    ca: Arc<dyn CertificateAuthority>,
    work_dir: WorkDirectory,
    accounts: AccountManager,
    solver: AuthorizationSolver,
    issuer: CertificateIssuer,
    contact: Vec<String>,
    renew_before_days: u32,
}

impl CertificateLifecycleController {
    /// Build the controller from configuration and its two collaborators
    pub fn new(
        config: &AcmeConfig,
        ca: Arc<dyn CertificateAuthority>,
        reconciler: DnsReconciler,
    ) -> Self {
        let work_dir = WorkDirectory::new(&config.work_directory);
        let poll_interval = config.poll_interval();

        Self {
            accounts: AccountManager::new(Arc::clone(&ca)),
            solver: AuthorizationSolver::new(Arc::clone(&ca), reconciler, poll_interval),
            issuer: CertificateIssuer::new(Arc::clone(&ca), work_dir.clone(), poll_interval),
            ca,
            work_dir,
            contact: contact_for(config.email.as_deref()),
            renew_before_days: config.renew_before_days,
        }
    }

    pub fn work_directory(&self) -> &WorkDirectory {
        &self.work_dir
    }

    /// Return certificate and key paths for `domains`, issuing when needed
    ///
    /// A certificate is reused when both files exist and it does not expire
    /// within the renewal window. Any failure aborts the whole refresh;
    /// no certificate for a subset of the domains is ever issued.
    pub async fn check_or_refresh(
        &self,
        cancel: &CancellationToken,
        domains: &[String],
    ) -> Result<CertificatePaths, AcmeError> {
        let primary = domains.first().ok_or(AcmeError::NoDomains)?;
        self.work_dir.ensure()?;

        let paths = self.work_dir.certificate_paths(primary);
        let fresh = paths.private_key.is_file()
            && !needs_renewal(&paths.certificate, self.renew_before_days, Utc::now());
        if fresh {
            if let Ok(Some(expires)) = certificate_expiry(&paths.certificate) {
                info!(domain = %primary, expires = %expires, "Certificate is fresh");
            }
            return Ok(paths);
        }

        info!(domains = ?domains, "Refreshing certificate");

        let key = AccountKeyStore::load_or_create(&self.work_dir.account_key_path())?;
        self.ca.set_key(key);
        self.accounts
            .ensure_account(cancel, &self.work_dir.account_path(), &self.contact)
            .await?;

        let order = cancellable(cancel, self.ca.new_order(domains)).await?;

        for domain in domains {
            self.solver.authorize(cancel, &order, domain).await?;
        }

        self.issuer.issue(cancel, &order, domains).await
    }
}
