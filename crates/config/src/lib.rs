//! Configuration for the rover certificate daemon
//!
//! This module provides configuration parsing and validation for the ACME
//! certificate lifecycle and the DNS zone it maintains.
//!
//! # Module Organization
//!
//! - [`acme`]: ACME and DNS configuration types
//! - [`validation`]: Configuration validation functions
//! - [`kdl`]: KDL format parsing
//!
//! # Example
//!
//! ```kdl
//! acme {
//!     work-directory "/var/lib/rover/acme"
//!     domains "rover.example.com" "cam.example.com"
//!     email "ops@example.com"
//!     renew-before-days 30
//! }
//!
//! dns {
//!     project "my-gcp-project"
//!     zone "example-zone"
//!     credentials-file "/etc/rover/dns-token.json"
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use validator::Validate;

// ============================================================================
// Module Declarations
// ============================================================================

pub mod acme;
mod kdl;
pub mod validation;

// ============================================================================
// Re-exports
// ============================================================================

pub use acme::{
    AcmeConfig, DnsConfig, GOOGLE_DNS_ENDPOINT, LETSENCRYPT_PRODUCTION, LETSENCRYPT_STAGING,
};

// ============================================================================
// Main Configuration Structure
// ============================================================================

/// Complete daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Config {
    /// Certificate lifecycle settings
    #[validate(nested)]
    pub acme: AcmeConfig,

    /// DNS zone settings
    #[validate(nested)]
    pub dns: DnsConfig,
}

// ============================================================================
// Config Implementation
// ============================================================================

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("kdl");

        match extension {
            "kdl" => Self::from_kdl(&content),
            "json" => Self::from_json(&content),
            _ => Err(anyhow::anyhow!("Unsupported config format: {}", extension)),
        }
    }

    /// Parse configuration from KDL format
    pub fn from_kdl(content: &str) -> Result<Self> {
        let doc: ::kdl::KdlDocument = content.parse().map_err(|e: ::kdl::KdlError| {
            use miette::Diagnostic;

            let mut error_msg = String::new();
            error_msg.push_str("KDL configuration parse error:\n\n");

            let mut found_details = false;
            if let Some(related) = e.related() {
                for diagnostic in related {
                    error_msg.push_str(&format!("  {}\n", diagnostic));
                    found_details = true;

                    if let Some(labels) = diagnostic.labels() {
                        for label in labels {
                            let (line, col) = kdl::offset_to_line_col(content, label.offset());
                            error_msg
                                .push_str(&format!("\n  --> at line {}, column {}\n", line, col));

                            if let Some(line_content) = content.lines().nth(line.saturating_sub(1))
                            {
                                error_msg.push_str(&format!("{:>4} | {}\n", line, line_content));
                                error_msg.push_str(&format!(
                                    "     | {}^",
                                    " ".repeat(col.saturating_sub(1))
                                ));
                                if let Some(label_msg) = label.label() {
                                    error_msg.push_str(&format!(" {}", label_msg));
                                }
                                error_msg.push('\n');
                            }
                        }
                    }

                    if let Some(help) = diagnostic.help() {
                        error_msg.push_str(&format!("\n  Help: {}\n", help));
                    }
                }
            }

            if !found_details {
                error_msg.push_str(&format!("  {}\n", e));
            }

            anyhow::anyhow!("{}", error_msg)
        })?;

        kdl::parse_kdl_document(doc)
    }

    /// Parse configuration from JSON format
    pub fn from_json(content: &str) -> Result<Self> {
        let mut config: Self =
            serde_json::from_str(content).context("Failed to parse JSON configuration")?;
        config.acme.normalize_domains();
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).context("Configuration validation failed")?;

        if self.dns.credentials_file.is_none() && self.dns.credentials_env.is_none() {
            return Err(anyhow::anyhow!(
                "DNS configuration requires either 'credentials-file' or 'credentials-env'"
            ));
        }

        Ok(())
    }
}
