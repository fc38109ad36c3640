//! KDL configuration parsing.
//!
//! - `helpers`: Common parsing utility functions
//! - `acme`: ACME and DNS block parsing

mod acme;
mod helpers;

pub use helpers::{
    get_bool_entry, get_int_entry, get_string_args, get_string_entry, get_uint_entry,
    offset_to_line_col,
};

pub use acme::{parse_acme_config, parse_dns_config};

use anyhow::Result;

use crate::Config;

// ============================================================================
// Top-Level Document Parser
// ============================================================================

/// Convert a parsed KDL document to Config
pub fn parse_kdl_document(doc: kdl::KdlDocument) -> Result<Config> {
    let mut acme = None;
    let mut dns = None;

    for node in doc.nodes() {
        match node.name().value() {
            "acme" => {
                acme = Some(parse_acme_config(node)?);
            }
            "dns" => {
                dns = Some(parse_dns_config(node)?);
            }
            other => {
                return Err(anyhow::anyhow!(
                    "Unknown top-level configuration block: '{}'\n\
                     Valid blocks are: acme, dns",
                    other
                ));
            }
        }
    }

    let acme = acme.ok_or_else(|| {
        anyhow::anyhow!(
            "Missing required 'acme' configuration block\n\
             Example:\n\
             acme {{\n\
                 work-directory \"/var/lib/rover/acme\"\n\
                 domains \"rover.example.com\"\n\
             }}"
        )
    })?;

    let dns = dns.ok_or_else(|| {
        anyhow::anyhow!(
            "Missing required 'dns' configuration block\n\
             Example:\n\
             dns {{\n\
                 project \"my-project\"\n\
                 zone \"example-zone\"\n\
             }}"
        )
    })?;

    Ok(Config { acme, dns })
}
