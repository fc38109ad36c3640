//! Certificate issuance
//!
//! Builds the certificate request for the full domain set, finalizes the
//! order and writes the returned chain next to the certificate key. The
//! chain file is replaced as the very last step.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ::pem::{EncodeConfig, LineEnding, Pem};
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::authority::{CertificateAuthority, Order, OrderStatus};
use super::error::AcmeError;
use super::key::load_or_create_pem;
use super::storage::{CertificatePaths, WorkDirectory};
use crate::poll::{cancellable, poll_until, PollStatus};

/// Finalizes orders and stores the resulting certificate material
#[derive(Debug, Clone)]
pub struct CertificateIssuer {
    ca: Arc<dyn CertificateAuthority>,
    work_dir: WorkDirectory,
    poll_interval: Duration,
}

impl CertificateIssuer {
    pub fn new(
        ca: Arc<dyn CertificateAuthority>,
        work_dir: WorkDirectory,
        poll_interval: Duration,
    ) -> Self {
        Self {
            ca,
            work_dir,
            poll_interval,
        }
    }

    /// Issue a certificate for `domains` through an order whose
    /// authorizations are all valid
    ///
    /// The certificate key is `<primary>.key` (created if absent) and the
    /// chain lands in `<primary>.crt`.
    pub async fn issue(
        &self,
        cancel: &CancellationToken,
        order: &Order,
        domains: &[String],
    ) -> Result<CertificatePaths, AcmeError> {
        let primary = domains.first().ok_or(AcmeError::NoDomains)?;
        let paths = self.work_dir.certificate_paths(primary);

        let key = load_or_create_certificate_key(&paths.private_key)?;
        let csr = build_csr(domains, &key)?;
        debug!(domains = ?domains, csr_len = csr.len(), "Built certificate request");

        let mut order = order.clone();
        if order.status != OrderStatus::Valid {
            order = cancellable(cancel, self.ca.finalize(&order, &csr)).await?;
        }
        let order = self.wait_for_certificate(cancel, order).await?;

        let chain = cancellable(cancel, self.ca.certificate_chain(&order)).await?;
        if chain.is_empty() {
            return Err(AcmeError::Finalization(
                "CA returned an empty certificate chain".to_string(),
            ));
        }

        let pem = encode_chain(&chain);
        self.work_dir
            .write_atomic(&paths.certificate, pem.as_bytes())?;

        info!(
            domains = ?domains,
            certificates = chain.len(),
            path = %paths.certificate.display(),
            "Certificate issued"
        );
        Ok(paths)
    }

    /// Poll the order until the certificate is ready for download
    async fn wait_for_certificate(
        &self,
        cancel: &CancellationToken,
        order: Order,
    ) -> Result<Order, AcmeError> {
        match order.status {
            OrderStatus::Valid => return Ok(order),
            OrderStatus::Invalid => return Err(order_invalid(&order)),
            _ => {}
        }

        let ca = &self.ca;
        let order = &order;
        poll_until(cancel, self.poll_interval, || async move {
            let order = ca.refresh_order(order).await?;
            debug!(order = %order.url, status = ?order.status, "Order status");

            match order.status {
                OrderStatus::Valid => Ok(PollStatus::Ready(order)),
                OrderStatus::Invalid => Err(order_invalid(&order)),
                _ => Ok(PollStatus::Pending),
            }
        })
        .await
    }
}

fn order_invalid(order: &Order) -> AcmeError {
    AcmeError::Finalization(format!(
        "Order {} became invalid: {}",
        order.url,
        order.error.as_deref().unwrap_or("no detail from CA")
    ))
}

/// Load the certificate key at `path`, creating a P-256 key if absent
pub fn load_or_create_certificate_key(path: &Path) -> Result<KeyPair, AcmeError> {
    load_or_create_pem(
        path,
        "certificate",
        |pem| KeyPair::from_pem(pem).map_err(|e| e.to_string()),
        || {
            let key = KeyPair::generate().map_err(|e| e.to_string())?;
            let pem = key.serialize_pem();
            Ok((key, pem))
        },
    )
}

/// DER certificate request with CN = `domains[0]` and every domain as a SAN
pub fn build_csr(domains: &[String], key: &KeyPair) -> Result<Vec<u8>, AcmeError> {
    let primary = domains.first().ok_or(AcmeError::NoDomains)?;

    let mut params = CertificateParams::new(domains.to_vec())
        .map_err(|e| AcmeError::Csr(format!("Invalid domain names: {}", e)))?;
    params.distinguished_name = DistinguishedName::new();
    params
        .distinguished_name
        .push(DnType::CommonName, primary.as_str());

    let request = params
        .serialize_request(key)
        .map_err(|e| AcmeError::Csr(format!("Failed to serialize CSR: {}", e)))?;
    Ok(request.der().to_vec())
}

/// PEM-encode DER certificates, concatenated in the order given
pub fn encode_chain(chain: &[Vec<u8>]) -> String {
    let config = EncodeConfig::new().set_line_ending(LineEnding::LF);
    chain
        .iter()
        .map(|der| ::pem::encode_config(&Pem::new("CERTIFICATE", der.clone()), config))
        .collect()
}
