//! Shared test utilities for integration tests
//!
//! In-memory stand-ins for the DNS zone API and the ACME CA, plus config
//! fixtures pointing at a temporary work directory.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use rover_certd::acme::dns::{
    Change, ChangeRequest, ChangeStatus, DnsProvider, DnsProviderError, DnsResult, DnsReconciler,
    RecordSet, RecordSetPage,
};
use rover_certd::acme::{
    Account, AccountKey, AcmeError, Authorization, AuthorizationStatus, CertificateAuthority,
    Challenge, Order, OrderStatus, DNS01,
};
use rover_config::AcmeConfig;

/// Poll interval used by every test component
pub const TEST_POLL_INTERVAL: Duration = Duration::from_millis(500);

// ============================================================================
// DNS zone
// ============================================================================

/// Zone API backed by a vector of record sets
///
/// Changes are applied as soon as they are submitted; `pending_polls`
/// controls how many `get_change` calls report them as still pending.
#[derive(Debug, Default)]
pub struct MockDnsProvider {
    records: Mutex<Vec<RecordSet>>,
    changes: Mutex<Vec<ChangeRequest>>,
    page_size: Option<usize>,
    pending_polls: AtomicUsize,
    fail_get_change: Mutex<Option<String>>,
    pub list_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub get_calls: AtomicUsize,
}

impl MockDnsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<RecordSet>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Self::default()
        }
    }

    /// Return at most `size` record sets per listing page
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Report the next `n` change lookups as pending
    pub fn with_pending_polls(self, n: usize) -> Self {
        self.pending_polls.store(n, Ordering::SeqCst);
        self
    }

    /// Fail every `get_change` call with an API error
    pub fn fail_get_change(&self, message: &str) {
        *self.fail_get_change.lock() = Some(message.to_string());
    }

    pub fn records(&self) -> Vec<RecordSet> {
        self.records.lock().clone()
    }

    pub fn submitted_changes(&self) -> Vec<ChangeRequest> {
        self.changes.lock().clone()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    fn change_status(&self) -> ChangeStatus {
        let pending = self
            .pending_polls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if pending {
            ChangeStatus::Pending
        } else {
            ChangeStatus::Done
        }
    }
}

#[async_trait]
impl DnsProvider for MockDnsProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn zone(&self) -> &str {
        "test-zone"
    }

    async fn list_record_sets(
        &self,
        name: &str,
        record_type: &str,
        page_token: Option<&str>,
    ) -> DnsResult<RecordSetPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let matching: Vec<RecordSet> = self
            .records
            .lock()
            .iter()
            .filter(|r| r.name == name && r.record_type == record_type)
            .cloned()
            .collect();

        let start: usize = match page_token {
            Some(token) => token
                .parse()
                .map_err(|_| DnsProviderError::ApiRequest(format!("bad page token {}", token)))?,
            None => 0,
        };
        let size = self.page_size.unwrap_or(matching.len().max(1));
        let end = (start + size).min(matching.len());

        Ok(RecordSetPage {
            record_sets: matching[start.min(end)..end].to_vec(),
            next_page_token: (end < matching.len()).then(|| end.to_string()),
        })
    }

    async fn create_change(&self, change: &ChangeRequest) -> DnsResult<Change> {
        let n = self.create_calls.fetch_add(1, Ordering::SeqCst) + 1;

        {
            let mut records = self.records.lock();
            for deletion in &change.deletions {
                let index = records
                    .iter()
                    .position(|r| r == deletion)
                    .ok_or_else(|| {
                        DnsProviderError::ChangeRejected(format!(
                            "record {} {} does not exist",
                            deletion.name, deletion.record_type
                        ))
                    })?;
                records.remove(index);
            }
            records.extend(change.additions.iter().cloned());
        }
        self.changes.lock().push(change.clone());

        Ok(Change {
            id: n.to_string(),
            status: self.change_status(),
            start_time: Some("2024-05-01T12:00:00.000Z".to_string()),
            additions: change.additions.clone(),
            deletions: change.deletions.clone(),
        })
    }

    async fn get_change(&self, id: &str) -> DnsResult<Change> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = self.fail_get_change.lock().clone() {
            return Err(DnsProviderError::ApiRequest(message));
        }

        Ok(Change {
            id: id.to_string(),
            status: self.change_status(),
            start_time: None,
            additions: Vec::new(),
            deletions: Vec::new(),
        })
    }
}

pub fn reconciler(provider: &Arc<MockDnsProvider>) -> DnsReconciler {
    let provider: Arc<dyn DnsProvider> = provider.clone();
    DnsReconciler::new(provider).with_poll_interval(TEST_POLL_INTERVAL)
}

pub fn txt(name: &str, ttl: u32, value: &str) -> RecordSet {
    RecordSet::new(name, "TXT", ttl, vec![format!("\"{}\"", value)])
}

// ============================================================================
// Certificate authority
// ============================================================================

/// In-memory CA issuing self-signed certificates
///
/// Authorizations start in the state set through [`MockCa::set_authorization`]
/// (pending by default) and move to `after_accept` once their challenge is
/// accepted.
#[derive(Debug)]
pub struct MockCa {
    key: Mutex<Option<AccountKey>>,
    account: Mutex<Option<Account>>,
    initial: Mutex<HashMap<String, AuthorizationStatus>>,
    current: Mutex<HashMap<String, AuthorizationStatus>>,
    after_accept: Mutex<AuthorizationStatus>,
    offer_dns01: bool,
    registered_keys: Mutex<Vec<String>>,
    pub register_calls: AtomicUsize,
    pub new_order_calls: AtomicUsize,
    pub accept_calls: AtomicUsize,
    pub finalize_calls: AtomicUsize,
    pub chain_calls: AtomicUsize,
}

impl Default for MockCa {
    fn default() -> Self {
        Self {
            key: Mutex::new(None),
            account: Mutex::new(None),
            initial: Mutex::new(HashMap::new()),
            current: Mutex::new(HashMap::new()),
            after_accept: Mutex::new(AuthorizationStatus::Valid),
            offer_dns01: true,
            registered_keys: Mutex::new(Vec::new()),
            register_calls: AtomicUsize::new(0),
            new_order_calls: AtomicUsize::new(0),
            accept_calls: AtomicUsize::new(0),
            finalize_calls: AtomicUsize::new(0),
            chain_calls: AtomicUsize::new(0),
        }
    }
}

impl MockCa {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer only an http-01 challenge
    pub fn without_dns01() -> Self {
        Self {
            offer_dns01: false,
            ..Self::default()
        }
    }

    pub fn set_authorization(&self, domain: &str, status: AuthorizationStatus) {
        self.initial.lock().insert(domain.to_string(), status);
    }

    /// Status every authorization takes after its challenge is accepted
    pub fn set_after_accept(&self, status: AuthorizationStatus) {
        *self.after_accept.lock() = status;
    }

    /// PEM of the account key used for each registration, in order
    pub fn registered_keys(&self) -> Vec<String> {
        self.registered_keys.lock().clone()
    }

    pub fn current_account(&self) -> Option<Account> {
        self.account.lock().clone()
    }

    pub fn register_calls(&self) -> usize {
        self.register_calls.load(Ordering::SeqCst)
    }

    pub fn accept_calls(&self) -> usize {
        self.accept_calls.load(Ordering::SeqCst)
    }

    pub fn finalize_calls(&self) -> usize {
        self.finalize_calls.load(Ordering::SeqCst)
    }

    pub fn new_order_calls(&self) -> usize {
        self.new_order_calls.load(Ordering::SeqCst)
    }

    fn status_of(&self, domain: &str) -> AuthorizationStatus {
        if let Some(status) = self.current.lock().get(domain) {
            return *status;
        }
        self.initial
            .lock()
            .get(domain)
            .copied()
            .unwrap_or(AuthorizationStatus::Pending)
    }

    fn build_authorization(&self, domain: &str) -> Authorization {
        let status = self.status_of(domain);
        let url = format!("https://ca.test/authz/{}", domain);

        let kind = if self.offer_dns01 { DNS01 } else { "http-01" };
        let challenge = Challenge {
            kind: kind.to_string(),
            url: format!("https://ca.test/chall/{}", domain),
            token: format!("token-{}", domain),
            status: "pending".to_string(),
        };

        Authorization {
            url,
            domain: domain.to_string(),
            status,
            challenges: vec![challenge],
            error: (status == AuthorizationStatus::Invalid)
                .then(|| "Incorrect TXT record found".to_string()),
        }
    }
}

#[async_trait]
impl CertificateAuthority for MockCa {
    fn set_key(&self, key: AccountKey) {
        *self.key.lock() = Some(key);
    }

    fn set_account(&self, account: &Account) {
        *self.account.lock() = Some(account.clone());
    }

    fn thumbprint(&self) -> Result<String, AcmeError> {
        self.key
            .lock()
            .as_ref()
            .map(AccountKey::thumbprint)
            .ok_or(AcmeError::NoAccountKey)
    }

    async fn register(&self, contact: &[String]) -> Result<Account, AcmeError> {
        let n = self.register_calls.fetch_add(1, Ordering::SeqCst) + 1;

        let pem = self
            .key
            .lock()
            .as_ref()
            .ok_or(AcmeError::NoAccountKey)?
            .to_pem()
            .map_err(AcmeError::AccountCreation)?;
        self.registered_keys.lock().push(pem);

        let account = Account {
            uri: format!("https://ca.test/acct/{}", n),
            status: Some("valid".to_string()),
            contact: contact.to_vec(),
            terms_of_service_agreed: true,
            orders: None,
        };
        *self.account.lock() = Some(account.clone());
        Ok(account)
    }

    async fn new_order(&self, domains: &[String]) -> Result<Order, AcmeError> {
        if self.account.lock().is_none() {
            return Err(AcmeError::NoAccount);
        }
        self.new_order_calls.fetch_add(1, Ordering::SeqCst);

        Ok(Order {
            url: "https://ca.test/order/1".to_string(),
            status: OrderStatus::Pending,
            domains: domains.to_vec(),
            authorizations: domains
                .iter()
                .map(|d| format!("https://ca.test/authz/{}", d))
                .collect(),
            finalize: "https://ca.test/order/1/finalize".to_string(),
            certificate: None,
            error: None,
        })
    }

    async fn authorization(
        &self,
        order: &Order,
        domain: &str,
    ) -> Result<Authorization, AcmeError> {
        if !order.domains.iter().any(|d| d.eq_ignore_ascii_case(domain)) {
            return Err(AcmeError::Protocol(format!(
                "order has no authorization for {}",
                domain
            )));
        }
        Ok(self.build_authorization(domain))
    }

    async fn accept(&self, _order: &Order, challenge: &Challenge) -> Result<(), AcmeError> {
        self.accept_calls.fetch_add(1, Ordering::SeqCst);

        let domain = challenge
            .url
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        let status = *self.after_accept.lock();
        self.current.lock().insert(domain, status);
        Ok(())
    }

    async fn finalize(&self, order: &Order, _csr_der: &[u8]) -> Result<Order, AcmeError> {
        self.finalize_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Order {
            status: OrderStatus::Processing,
            ..order.clone()
        })
    }

    async fn refresh_order(&self, order: &Order) -> Result<Order, AcmeError> {
        Ok(Order {
            status: OrderStatus::Valid,
            certificate: Some(format!("{}/cert", order.url)),
            ..order.clone()
        })
    }

    async fn certificate_chain(&self, _order: &Order) -> Result<Vec<Vec<u8>>, AcmeError> {
        self.chain_calls.fetch_add(1, Ordering::SeqCst);
        let leaf = self_signed_der(&["rover.example.com"], (2099, 1, 1));
        let issuer = self_signed_der(&["intermediate.ca.test"], (2099, 1, 1));
        Ok(vec![leaf, issuer])
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn domains(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

pub fn acme_config(work_directory: &Path, names: &[&str]) -> AcmeConfig {
    AcmeConfig {
        work_directory: work_directory.to_path_buf(),
        domains: domains(names),
        directory_url: Some("https://ca.test/directory".to_string()),
        staging: false,
        email: Some("ops@example.com".to_string()),
        renew_before_days: 30,
        poll_interval_ms: TEST_POLL_INTERVAL.as_millis() as u64,
    }
}

/// DER of a self-signed certificate expiring on the given date
pub fn self_signed_der(names: &[&str], not_after: (i32, u8, u8)) -> Vec<u8> {
    let key = rcgen::KeyPair::generate().unwrap();
    let mut params = rcgen::CertificateParams::new(domains(names)).unwrap();
    params.not_before = rcgen::date_time_ymd(2020, 1, 1);
    params.not_after = rcgen::date_time_ymd(not_after.0, not_after.1, not_after.2);
    params.self_signed(&key).unwrap().der().to_vec()
}

/// PEM of a self-signed certificate expiring `days` from now
pub fn certificate_expiring_in(names: &[&str], days: i64) -> String {
    use chrono::Datelike;

    let expiry = chrono::Utc::now() + chrono::Duration::days(days);
    let key = rcgen::KeyPair::generate().unwrap();
    let mut params = rcgen::CertificateParams::new(domains(names)).unwrap();
    params.not_before = rcgen::date_time_ymd(2020, 1, 1);
    params.not_after =
        rcgen::date_time_ymd(expiry.year(), expiry.month() as u8, expiry.day() as u8);
    params.self_signed(&key).unwrap().pem()
}
