//! ACME client wrapper around instant-acme
//!
//! Implements [`CertificateAuthority`] on top of an `instant_acme::Account`.
//! The account is always bound to the persisted [`AccountKey`]: registration
//! submits that key, and a stored account is restored from its URL plus the
//! same key. Orders are re-read from their URL for every operation, so no
//! order handles live between calls.

use std::sync::Arc;

use async_trait::async_trait;
use instant_acme::{
    Account as AcmeAccount, AccountBuilder, AuthorizationState, ChallengeStatus, ChallengeType,
    HttpClient, Identifier, Key, NewOrder, OrderState, Problem,
};
use parking_lot::{Mutex, RwLock};
use rustls_pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use tracing::{debug, info};

use super::authority::{
    Account, Authorization, AuthorizationStatus, CertificateAuthority, Challenge, Order,
    OrderStatus, DNS01,
};
use super::error::AcmeError;
use super::key::AccountKey;

type HttpFactory = Arc<dyn Fn() -> Box<dyn HttpClient> + Send + Sync>;

/// ACME client for the directory at a fixed URL
pub struct AcmeClient {
    directory_url: String,
    http: Option<HttpFactory>,
    key: RwLock<Option<AccountKey>>,
    account_url: RwLock<Option<String>>,
    /// Account bound to the current key and URL, built on first use
    account: Mutex<Option<AcmeAccount>>,
}

impl AcmeClient {
    /// Create a client using instant-acme's HTTPS client
    pub fn new(directory_url: impl Into<String>) -> Self {
        Self {
            directory_url: directory_url.into(),
            http: None,
            key: RwLock::new(None),
            account_url: RwLock::new(None),
            account: Mutex::new(None),
        }
    }

    /// Create a client whose accounts send requests through `http`
    pub fn with_http(
        directory_url: impl Into<String>,
        http: impl Fn() -> Box<dyn HttpClient> + Send + Sync + 'static,
    ) -> Self {
        Self {
            http: Some(Arc::new(http)),
            ..Self::new(directory_url)
        }
    }

    pub fn directory_url(&self) -> &str {
        &self.directory_url
    }

    fn builder(&self) -> Result<AccountBuilder, AcmeError> {
        match &self.http {
            Some(http) => Ok(AcmeAccount::builder_with_http(http())),
            None => AcmeAccount::builder()
                .map_err(|e| AcmeError::Protocol(format!("Failed to create HTTP client: {}", e))),
        }
    }

    fn key_der(&self) -> Result<Vec<u8>, AcmeError> {
        let guard = self.key.read();
        let key = guard.as_ref().ok_or(AcmeError::NoAccountKey)?;
        key.to_pkcs8_der()
            .map_err(|e| AcmeError::Protocol(format!("Failed to encode account key: {}", e)))
    }

    /// The account for the current key and account URL
    async fn account(&self) -> Result<AcmeAccount, AcmeError> {
        let key_der = self.key_der()?;
        let cached = self.account.lock().clone();
        if let Some(account) = cached {
            return Ok(account);
        }

        let uri = self.account_url.read().clone().ok_or(AcmeError::NoAccount)?;
        let account = self
            .builder()?
            .from_parts(
                uri,
                PrivatePkcs8KeyDer::from(key_der),
                self.directory_url.clone(),
            )
            .await?;

        debug!(account = %account.id(), directory = %self.directory_url, "ACME account restored");
        *self.account.lock() = Some(account.clone());
        Ok(account)
    }

    async fn load_order(&self, url: &str) -> Result<instant_acme::Order, AcmeError> {
        let account = self.account().await?;
        Ok(account.order(url.to_string()).await?)
    }
}

impl std::fmt::Debug for AcmeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcmeClient")
            .field("directory_url", &self.directory_url)
            .field("has_key", &self.key.read().is_some())
            .field("account_url", &*self.account_url.read())
            .finish()
    }
}

#[async_trait]
impl CertificateAuthority for AcmeClient {
    fn set_key(&self, key: AccountKey) {
        *self.key.write() = Some(key);
        *self.account.lock() = None;
    }

    fn set_account(&self, account: &Account) {
        *self.account_url.write() = Some(account.uri.clone());
        *self.account.lock() = None;
    }

    fn thumbprint(&self) -> Result<String, AcmeError> {
        self.key
            .read()
            .as_ref()
            .map(AccountKey::thumbprint)
            .ok_or(AcmeError::NoAccountKey)
    }

    async fn register(&self, contact: &[String]) -> Result<Account, AcmeError> {
        let key_der = self.key_der()?;
        let key = Key::from_pkcs8_der(PrivatePkcs8KeyDer::from(key_der.as_slice()))
            .map_err(|e| AcmeError::AccountCreation(format!("Account key rejected: {}", e)))?;

        let (account, _credentials) = self
            .builder()?
            .create_from_key(
                (key, PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_der))),
                self.directory_url.clone(),
            )
            .await
            .map_err(|e| AcmeError::AccountCreation(e.to_string()))?;

        if !contact.is_empty() {
            let contacts: Vec<&str> = contact.iter().map(String::as_str).collect();
            account
                .update_contacts(&contacts)
                .await
                .map_err(|e| AcmeError::AccountCreation(e.to_string()))?;
        }

        info!(account = %account.id(), "ACME account registered");

        let registered = Account {
            uri: account.id().to_string(),
            status: Some("valid".to_string()),
            contact: contact.to_vec(),
            terms_of_service_agreed: true,
            orders: None,
        };
        *self.account_url.write() = Some(registered.uri.clone());
        *self.account.lock() = Some(account);
        Ok(registered)
    }

    async fn new_order(&self, domains: &[String]) -> Result<Order, AcmeError> {
        let account = self.account().await?;

        let identifiers: Vec<Identifier> = domains
            .iter()
            .map(|d| Identifier::Dns(d.clone()))
            .collect();

        let mut order = account
            .new_order(&NewOrder::new(&identifiers))
            .await
            .map_err(|e| AcmeError::OrderCreation(e.to_string()))?;

        let url = order.url().to_string();
        let order = order_from(url, order.state(), domains.to_vec());
        info!(
            order = %order.url,
            status = ?order.status,
            authorizations = order.authorizations.len(),
            "ACME order created"
        );
        Ok(order)
    }

    async fn authorization(
        &self,
        order: &Order,
        domain: &str,
    ) -> Result<Authorization, AcmeError> {
        let mut acme_order = self.load_order(&order.url).await?;
        let mut authorizations = acme_order.authorizations();

        while let Some(result) = authorizations.next().await {
            let authz = result?;
            let authz = authorization_from(authz.url(), &authz);
            if authz.domain.eq_ignore_ascii_case(domain) {
                return Ok(authz);
            }
        }

        Err(AcmeError::Protocol(format!(
            "Order {} has no authorization for '{}'",
            order.url, domain
        )))
    }

    async fn accept(&self, order: &Order, challenge: &Challenge) -> Result<(), AcmeError> {
        debug!(url = %challenge.url, kind = %challenge.kind, "Setting challenge ready");

        let mut acme_order = self.load_order(&order.url).await?;
        let mut authorizations = acme_order.authorizations();

        while let Some(result) = authorizations.next().await {
            let mut authz = result?;
            let kind = authz
                .challenges
                .iter()
                .find(|c| c.url == challenge.url)
                .map(|c| c.r#type.clone());

            if let Some(kind) = kind {
                if let Some(mut handle) = authz.challenge(kind) {
                    handle.set_ready().await?;
                    return Ok(());
                }
            }
        }

        Err(AcmeError::Protocol(format!(
            "Order {} has no challenge {}",
            order.url, challenge.url
        )))
    }

    async fn finalize(&self, order: &Order, csr_der: &[u8]) -> Result<Order, AcmeError> {
        let mut acme_order = self.load_order(&order.url).await?;
        acme_order
            .finalize_csr(csr_der)
            .await
            .map_err(|e| AcmeError::Finalization(e.to_string()))?;

        let order = order_from(order.url.clone(), acme_order.state(), order.domains.clone());
        info!(order = %order.url, status = ?order.status, "Order finalized");
        Ok(order)
    }

    async fn refresh_order(&self, order: &Order) -> Result<Order, AcmeError> {
        let mut acme_order = self.load_order(&order.url).await?;
        Ok(order_from(
            order.url.clone(),
            acme_order.state(),
            order.domains.clone(),
        ))
    }

    async fn certificate_chain(&self, order: &Order) -> Result<Vec<Vec<u8>>, AcmeError> {
        let mut acme_order = self.load_order(&order.url).await?;
        let pem = acme_order
            .certificate()
            .await
            .map_err(|e| AcmeError::Finalization(e.to_string()))?
            .ok_or_else(|| {
                AcmeError::Finalization(format!("Order {} is still processing", order.url))
            })?;

        let chain = parse_chain(&pem)?;
        debug!(certificates = chain.len(), "Downloaded certificate chain");
        Ok(chain)
    }
}

/// DER certificates of a PEM chain, in the order given
fn parse_chain(pem: &str) -> Result<Vec<Vec<u8>>, AcmeError> {
    Ok(::pem::parse_many(pem.as_bytes())
        .map_err(|e| AcmeError::CertificateParse(format!("Invalid PEM chain: {}", e)))?
        .into_iter()
        .filter(|p| p.tag() == "CERTIFICATE")
        .map(|p| p.contents().to_vec())
        .collect())
}

fn problem_detail(problem: &Problem) -> Option<String> {
    problem.detail.clone().or_else(|| problem.r#type.clone())
}

fn order_from(url: String, state: &OrderState, domains: Vec<String>) -> Order {
    Order {
        url,
        status: match state.status {
            instant_acme::OrderStatus::Pending => OrderStatus::Pending,
            instant_acme::OrderStatus::Ready => OrderStatus::Ready,
            instant_acme::OrderStatus::Processing => OrderStatus::Processing,
            instant_acme::OrderStatus::Valid => OrderStatus::Valid,
            instant_acme::OrderStatus::Invalid => OrderStatus::Invalid,
        },
        domains,
        authorizations: state.authorizations.iter().map(|a| a.url.clone()).collect(),
        finalize: state.finalize.clone(),
        certificate: state.certificate.clone(),
        error: state.error.as_ref().and_then(problem_detail),
    }
}

/// Authorization for `state`; wildcard identifiers keep their `*.` prefix
fn authorization_from(url: &str, state: &AuthorizationState) -> Authorization {
    let error = state
        .challenges
        .iter()
        .filter_map(|c| c.error.as_ref())
        .find_map(problem_detail);

    Authorization {
        url: url.to_string(),
        domain: state.identifier().to_string(),
        status: match state.status {
            instant_acme::AuthorizationStatus::Pending => AuthorizationStatus::Pending,
            instant_acme::AuthorizationStatus::Valid => AuthorizationStatus::Valid,
            instant_acme::AuthorizationStatus::Invalid => AuthorizationStatus::Invalid,
            instant_acme::AuthorizationStatus::Deactivated => AuthorizationStatus::Deactivated,
            instant_acme::AuthorizationStatus::Expired => AuthorizationStatus::Expired,
            instant_acme::AuthorizationStatus::Revoked => AuthorizationStatus::Revoked,
        },
        challenges: state
            .challenges
            .iter()
            .map(|c| Challenge {
                kind: challenge_kind(&c.r#type),
                url: c.url.clone(),
                token: c.token.clone(),
                status: challenge_status(c.status).to_string(),
            })
            .collect(),
        error,
    }
}

fn challenge_kind(kind: &ChallengeType) -> String {
    match kind {
        ChallengeType::Dns01 => DNS01.to_string(),
        ChallengeType::Http01 => "http-01".to_string(),
        ChallengeType::TlsAlpn01 => "tls-alpn-01".to_string(),
        ChallengeType::DeviceAttest01 => "device-attest-01".to_string(),
        ChallengeType::Unknown(kind) => kind.clone(),
        _ => "unknown".to_string(),
    }
}

fn challenge_status(status: ChallengeStatus) -> &'static str {
    match status {
        ChallengeStatus::Pending => "pending",
        ChallengeStatus::Processing => "processing",
        ChallengeStatus::Valid => "valid",
        ChallengeStatus::Invalid => "invalid",
    }
}
