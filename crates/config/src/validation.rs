//! Configuration validation functions

use std::borrow::Cow;
use std::collections::HashSet;

use validator::ValidationError;

use crate::acme::AcmeConfig;

fn validation_error(code: &'static str, message: String) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Owned(message));
    err
}

/// Validate a single domain name as accepted in the `domains` list
///
/// Wildcards are allowed only as the leftmost label.
pub fn validate_domain_name(domain: &str) -> Result<(), ValidationError> {
    let name = domain.strip_prefix("*.").unwrap_or(domain);

    if name.is_empty() || name.len() > 253 {
        return Err(validation_error(
            "invalid_domain",
            format!("Invalid domain name '{}'", domain),
        ));
    }

    if name.ends_with('.') {
        return Err(validation_error(
            "invalid_domain",
            format!(
                "Domain '{}' must be written without a trailing dot",
                domain
            ),
        ));
    }

    for label in name.split('.') {
        let valid = !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !valid {
            return Err(validation_error(
                "invalid_domain",
                format!("Invalid label '{}' in domain '{}'", label, domain),
            ));
        }
    }

    Ok(())
}

/// Semantic validation of the ACME block
pub fn validate_acme_config(config: &AcmeConfig) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for domain in &config.domains {
        validate_domain_name(domain)?;
        if !seen.insert(domain.to_ascii_lowercase()) {
            return Err(validation_error(
                "duplicate_domain",
                format!("Domain '{}' is listed more than once", domain),
            ));
        }
    }

    if config.poll_interval_ms == 0 {
        return Err(validation_error(
            "invalid_poll_interval",
            "poll-interval-ms must be greater than zero".to_string(),
        ));
    }

    Ok(())
}
