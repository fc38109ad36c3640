//! DNS provider implementations
//!
//! Available providers:
//! - [`GoogleCloudDnsProvider`] - Google Cloud DNS API

mod google;

pub use google::GoogleCloudDnsProvider;

use std::sync::Arc;

use rover_config::DnsConfig;

use super::credentials::{CredentialLoader, Credentials};
use super::provider::{DnsProvider, DnsProviderError, DnsResult};

/// Create a DNS provider from configuration
pub fn create_provider(config: &DnsConfig) -> DnsResult<Arc<dyn DnsProvider>> {
    let credentials = load_credentials(config)?;

    let provider = GoogleCloudDnsProvider::new(
        &config.endpoint,
        &config.project,
        &config.zone,
        credentials,
        config.api_timeout(),
    )?;
    Ok(Arc::new(provider))
}

/// Load credentials from file or environment variable
fn load_credentials(config: &DnsConfig) -> DnsResult<Credentials> {
    if let Some(ref path) = config.credentials_file {
        return CredentialLoader::load_from_file(path);
    }

    if let Some(ref env_var) = config.credentials_env {
        return CredentialLoader::load_from_env(env_var);
    }

    Err(DnsProviderError::Credentials(
        "No credentials configured. Specify either 'credentials-file' or 'credentials-env'"
            .to_string(),
    ))
}
