//! Record set reconciliation
//!
//! Converges one (name, type) record set of the managed zone to a desired
//! state with at most one atomic change, then waits for the provider to
//! apply it. The zone is listed fresh on every call; nothing is cached.
//!
//! This component assumes it is the only writer of the records it manages.
//! The list and change calls are not atomic with respect to each other.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Local};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::provider::{
    Change, ChangeRequest, ChangeStatus, DnsProvider, DnsProviderError, DnsResult, RecordSet,
};
use crate::poll::{cancellable, poll_until, sleep_or_cancel, PollStatus};

/// Default interval between change status checks
pub const DEFAULT_CHANGE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Result of a reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The zone already held exactly the desired record set
    Unchanged,
    /// A change was submitted and reported done by the provider
    Applied { change_id: String, max_ttl: u32 },
}

/// The change needed to converge the zone, computed from a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub change: ChangeRequest,
    /// Largest TTL among the desired record and every existing match
    pub max_ttl: u32,
}

/// Compute the change converging `existing` to `desired`
///
/// Only records with the desired name and type are considered. The first
/// record identical in ttl and data is kept; every other match is deleted.
/// The desired record is added unless it was kept.
pub fn plan(desired: &RecordSet, existing: &[RecordSet]) -> ReconcilePlan {
    let mut change = ChangeRequest {
        additions: vec![desired.clone()],
        deletions: Vec::new(),
    };
    let mut max_ttl = desired.ttl;

    for record in existing
        .iter()
        .filter(|r| r.name == desired.name && r.record_type == desired.record_type)
    {
        max_ttl = max_ttl.max(record.ttl);

        let keep = change.additions.len() == 1
            && record.ttl == desired.ttl
            && record.rrdatas == desired.rrdatas;

        if keep {
            debug!(name = %record.name, rrdatas = ?record.rrdatas, "Keeping existing record");
            change.additions.clear();
        } else {
            debug!(name = %record.name, rrdatas = ?record.rrdatas, "Deleting existing record");
            change.deletions.push(record.clone());
        }
    }

    ReconcilePlan { change, max_ttl }
}

/// Converges record sets of one zone through a [`DnsProvider`]
#[derive(Debug, Clone)]
pub struct DnsReconciler {
    provider: Arc<dyn DnsProvider>,
    poll_interval: Duration,
}

impl DnsReconciler {
    pub fn new(provider: Arc<dyn DnsProvider>) -> Self {
        Self {
            provider,
            poll_interval: DEFAULT_CHANGE_POLL_INTERVAL,
        }
    }

    /// Set the interval between change status checks
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn provider(&self) -> &Arc<dyn DnsProvider> {
        &self.provider
    }

    /// Make the zone hold exactly `desired` for its name and type
    ///
    /// With `wait_propagation`, blocks for the largest TTL touched after the
    /// change completes so resolvers drop cached answers. Provider errors are
    /// returned as-is; cancellation yields [`DnsProviderError::Cancelled`].
    pub async fn reconcile(
        &self,
        cancel: &CancellationToken,
        desired: &RecordSet,
        wait_propagation: bool,
    ) -> DnsResult<ReconcileOutcome> {
        let existing = self.list_matching(cancel, desired).await?;
        let ReconcilePlan { change, max_ttl } = plan(desired, &existing);

        if change.is_empty() {
            info!(
                name = %desired.name,
                record_type = %desired.record_type,
                "DNS record already up to date"
            );
            return Ok(ReconcileOutcome::Unchanged);
        }

        if let Some(addition) = change.additions.first() {
            info!(
                name = %addition.name,
                record_type = %addition.record_type,
                rrdatas = ?addition.rrdatas,
                deletions = change.deletions.len(),
                "Adding DNS record"
            );
        }

        let submitted = cancellable(cancel, self.provider.create_change(&change)).await?;
        log_change_started(&submitted);

        let change_id = submitted.id.clone();
        if submitted.status != ChangeStatus::Done {
            self.wait_for_change(cancel, &change_id).await?;
        }

        info!(change_id = %change_id, zone = %self.provider.zone(), "DNS change applied");

        if wait_propagation {
            debug!(max_ttl, "Waiting for cached records to expire");
            sleep_or_cancel(cancel, Duration::from_secs(u64::from(max_ttl))).await?;
        }

        Ok(ReconcileOutcome::Applied { change_id, max_ttl })
    }

    /// List every page of record sets matching the desired name and type
    async fn list_matching(
        &self,
        cancel: &CancellationToken,
        desired: &RecordSet,
    ) -> DnsResult<Vec<RecordSet>> {
        let mut records = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = cancellable(
                cancel,
                self.provider.list_record_sets(
                    &desired.name,
                    &desired.record_type,
                    page_token.as_deref(),
                ),
            )
            .await?;

            records.extend(page.record_sets);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        trace!(name = %desired.name, count = records.len(), "Listed existing records");
        Ok(records)
    }

    /// Poll the change until the provider reports it done
    async fn wait_for_change(&self, cancel: &CancellationToken, change_id: &str) -> DnsResult<()> {
        let provider = &self.provider;

        poll_until(cancel, self.poll_interval, || async move {
            let change = provider.get_change(change_id).await?;
            debug!(change_id = %change.id, status = ?change.status, "DNS change status");

            match change.status {
                ChangeStatus::Done => Ok(PollStatus::Ready(())),
                ChangeStatus::Pending => Ok(PollStatus::Pending),
                ChangeStatus::Unknown => Err(DnsProviderError::ChangeRejected(format!(
                    "change {} reported an unrecognized status",
                    change.id
                ))),
            }
        })
        .await
    }
}

fn log_change_started(change: &Change) {
    match change
        .start_time
        .as_deref()
        .map(DateTime::<FixedOffset>::parse_from_rfc3339)
    {
        Some(Ok(started)) => info!(
            change_id = %change.id,
            started_at = %started.with_timezone(&Local),
            status = ?change.status,
            "DNS change started"
        ),
        Some(Err(e)) => {
            warn!(change_id = %change.id, error = %e, "Failed to parse change start time");
        }
        None => info!(change_id = %change.id, status = ?change.status, "DNS change started"),
    }
}
