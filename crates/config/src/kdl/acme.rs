//! ACME and DNS block KDL parsing.

use anyhow::Result;
use std::path::PathBuf;

use crate::acme::*;

use super::helpers::{get_bool_entry, get_string_args, get_string_entry, get_uint_entry};

/// Parse the `acme` configuration block
pub fn parse_acme_config(node: &kdl::KdlNode) -> Result<AcmeConfig> {
    let work_directory = get_string_entry(node, "work-directory").ok_or_else(|| {
        anyhow::anyhow!(
            "ACME configuration requires a 'work-directory' field, e.g., work-directory \"/var/lib/rover/acme\""
        )
    })?;

    let domains = get_string_args(node, "domains").ok_or_else(|| {
        anyhow::anyhow!(
            "ACME configuration requires a 'domains' field, e.g., domains \"rover.example.com\""
        )
    })?;

    if node
        .children()
        .is_some_and(|children| children.get("validity-days").is_some())
    {
        return Err(anyhow::anyhow!(
            "'validity-days' is not supported: certificates use the CA's default lifetime"
        ));
    }

    let mut config = AcmeConfig {
        work_directory: PathBuf::from(work_directory),
        domains,
        directory_url: get_string_entry(node, "directory-url"),
        staging: get_bool_entry(node, "staging").unwrap_or(false),
        email: get_string_entry(node, "email"),
        renew_before_days: get_uint_entry(node, "renew-before-days")?
            .unwrap_or_else(default_renew_before_days),
        poll_interval_ms: get_uint_entry(node, "poll-interval-ms")?
            .unwrap_or_else(default_poll_interval_ms),
    };
    config.normalize_domains();
    Ok(config)
}

/// Parse the `dns` configuration block
pub fn parse_dns_config(node: &kdl::KdlNode) -> Result<DnsConfig> {
    let project = get_string_entry(node, "project").ok_or_else(|| {
        anyhow::anyhow!("DNS configuration requires a 'project' field, e.g., project \"my-project\"")
    })?;

    let zone = get_string_entry(node, "zone").ok_or_else(|| {
        anyhow::anyhow!("DNS configuration requires a 'zone' field, e.g., zone \"example-zone\"")
    })?;

    Ok(DnsConfig {
        project,
        zone,
        credentials_file: get_string_entry(node, "credentials-file").map(PathBuf::from),
        credentials_env: get_string_entry(node, "credentials-env"),
        endpoint: get_string_entry(node, "endpoint").unwrap_or_else(default_dns_endpoint),
        api_timeout_secs: get_uint_entry(node, "api-timeout-secs")?
            .unwrap_or_else(default_api_timeout_secs),
        poll_interval_ms: get_uint_entry(node, "poll-interval-ms")?
            .unwrap_or_else(default_poll_interval_ms),
    })
}
