//! DNS-01 challenge records
//!
//! Naming and content of the `_acme-challenge` TXT record that proves
//! control of a domain.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};

use super::provider::RecordSet;

/// ACME challenge record name prefix
pub const ACME_CHALLENGE_RECORD: &str = "_acme-challenge";

/// TTL for challenge records (60 seconds)
pub const CHALLENGE_TTL: u32 = 60;

/// Strip the wildcard label from a domain
///
/// `*.example.com` is validated through the record of `example.com`.
pub fn normalize_domain(domain: &str) -> &str {
    domain.strip_prefix("*.").unwrap_or(domain)
}

/// Build the fully qualified challenge record name, lowercase with trailing dot
///
/// For `example.com` and `*.example.com`, returns `_acme-challenge.example.com.`
pub fn challenge_record_fqdn(domain: &str) -> String {
    format!(
        "{}.{}.",
        ACME_CHALLENGE_RECORD,
        normalize_domain(domain).to_ascii_lowercase()
    )
}

/// Key authorization for a challenge token: `token.thumbprint`
pub fn key_authorization(token: &str, thumbprint: &str) -> String {
    format!("{}.{}", token, thumbprint)
}

/// Compute the DNS-01 challenge value from a key authorization
///
/// The value is the base64url-encoded SHA256 digest of the key
/// authorization, without padding.
pub fn compute_challenge_value(key_authorization: &str) -> String {
    let digest = Sha256::digest(key_authorization.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// The TXT record set that answers the challenge for `domain`
///
/// TXT data is stored quoted, which is also how the zone lists it back.
pub fn challenge_record(domain: &str, value: &str) -> RecordSet {
    RecordSet::new(
        challenge_record_fqdn(domain),
        "TXT",
        CHALLENGE_TTL,
        vec![format!("\"{}\"", value)],
    )
}
