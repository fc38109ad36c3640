//! Google Cloud DNS provider implementation
//!
//! Uses the Cloud DNS v1 REST API to list resource record sets and submit
//! changes against one managed zone.
//! API documentation: <https://cloud.google.com/dns/docs/reference/rest/v1>

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, trace};

use crate::acme::dns::credentials::Credentials;
use crate::acme::dns::provider::{
    Change, ChangeRequest, DnsProvider, DnsProviderError, DnsResult, RecordSet, RecordSetPage,
};

/// Google Cloud DNS provider bound to one project and managed zone
#[derive(Debug)]
pub struct GoogleCloudDnsProvider {
    client: Client,
    endpoint: String,
    project: String,
    zone: String,
    credentials: Credentials,
    timeout: Duration,
}

impl GoogleCloudDnsProvider {
    /// Create a new Cloud DNS provider
    ///
    /// # Arguments
    ///
    /// * `endpoint` - API base, e.g. `https://dns.googleapis.com/dns/v1`
    /// * `project` - Cloud project owning the zone
    /// * `zone` - Managed zone name
    /// * `credentials` - Bearer token for the API
    /// * `timeout` - Per-request timeout
    pub fn new(
        endpoint: &str,
        project: &str,
        zone: &str,
        credentials: Credentials,
        timeout: Duration,
    ) -> DnsResult<Self> {
        if project.is_empty() || zone.is_empty() {
            return Err(DnsProviderError::Configuration(
                "Cloud DNS requires a project and a managed zone".to_string(),
            ));
        }

        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            DnsProviderError::Configuration(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            project: project.to_string(),
            zone: zone.to_string(),
            credentials,
            timeout,
        })
    }

    fn zone_url(&self) -> String {
        format!(
            "{}/projects/{}/managedZones/{}",
            self.endpoint, self.project, self.zone
        )
    }

    fn request_error(&self, action: &str, e: reqwest::Error) -> DnsProviderError {
        if e.is_timeout() {
            DnsProviderError::Timeout {
                elapsed_secs: self.timeout.as_secs(),
            }
        } else {
            DnsProviderError::ApiRequest(format!("Failed to {}: {}", action, e))
        }
    }

    /// Map a non-success response to a provider error
    async fn check_response(&self, action: &str, response: Response) -> DnsResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => DnsProviderError::Authentication(
                format!("Cloud DNS rejected credentials: HTTP {} - {}", status, body),
            ),
            StatusCode::NOT_FOUND => DnsProviderError::ZoneNotFound {
                zone: self.zone.clone(),
            },
            StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => {
                DnsProviderError::ChangeRejected(format!(
                    "Failed to {}: HTTP {} - {}",
                    action, status, body
                ))
            }
            _ => DnsProviderError::ApiRequest(format!(
                "Failed to {}: HTTP {} - {}",
                action, status, body
            )),
        })
    }

    async fn parse<T: DeserializeOwned>(action: &str, response: Response) -> DnsResult<T> {
        response.json().await.map_err(|e| {
            DnsProviderError::ApiRequest(format!("Failed to parse {} response: {}", action, e))
        })
    }
}

#[async_trait]
impl DnsProvider for GoogleCloudDnsProvider {
    fn name(&self) -> &'static str {
        "google"
    }

    fn zone(&self) -> &str {
        &self.zone
    }

    async fn list_record_sets(
        &self,
        name: &str,
        record_type: &str,
        page_token: Option<&str>,
    ) -> DnsResult<RecordSetPage> {
        trace!(name = %name, record_type = %record_type, "Listing record sets");

        let mut query = vec![("name", name), ("type", record_type)];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        let response = self
            .client
            .get(format!("{}/rrsets", self.zone_url()))
            .bearer_auth(self.credentials.bearer_token())
            .query(&query)
            .send()
            .await
            .map_err(|e| self.request_error("list record sets", e))?;

        let response = self.check_response("list record sets", response).await?;
        let listing: RrsetsResponse = Self::parse("record set listing", response).await?;

        Ok(RecordSetPage {
            record_sets: listing.rrsets,
            next_page_token: listing.next_page_token,
        })
    }

    async fn create_change(&self, change: &ChangeRequest) -> DnsResult<Change> {
        debug!(
            zone = %self.zone,
            additions = change.additions.len(),
            deletions = change.deletions.len(),
            "Submitting DNS change"
        );

        let response = self
            .client
            .post(format!("{}/changes", self.zone_url()))
            .bearer_auth(self.credentials.bearer_token())
            .json(change)
            .send()
            .await
            .map_err(|e| self.request_error("create change", e))?;

        let response = self.check_response("create change", response).await?;
        Self::parse("change", response).await
    }

    async fn get_change(&self, id: &str) -> DnsResult<Change> {
        let response = self
            .client
            .get(format!("{}/changes/{}", self.zone_url(), id))
            .bearer_auth(self.credentials.bearer_token())
            .send()
            .await
            .map_err(|e| self.request_error("get change", e))?;

        let response = self.check_response("get change", response).await?;
        Self::parse("change", response).await
    }
}

// Cloud DNS API types

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RrsetsResponse {
    #[serde(default)]
    rrsets: Vec<RecordSet>,
    #[serde(default)]
    next_page_token: Option<String>,
}
