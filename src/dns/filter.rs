//! Address-family filter policy.
//!
//! One policy per process, chosen at startup and threaded by value into
//! every answer-construction and response-relay path.

use crate::dns::wire::{self, DnsMessage, RecordType};
use serde::Deserialize;
use std::fmt;

/// Which address families the relay is willing to answer with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FilterPolicy {
    /// Answer with both A and AAAA records
    #[default]
    Both,
    /// Answer with A records only
    Ipv4Only,
    /// Answer with AAAA records only
    Ipv6Only,
}

impl FilterPolicy {
    /// Whether answers of the given record type may be returned
    pub fn permits(self, rtype: RecordType) -> bool {
        match self {
            FilterPolicy::Ipv4Only => rtype == RecordType::A,
            FilterPolicy::Ipv6Only => rtype == RecordType::AAAA,
            FilterPolicy::Both => true,
        }
    }

    /// Apply the policy to an upstream response before relaying it.
    ///
    /// Judged against the *query's* declared type, not the answer content:
    /// an AAAA query under IPv4-only (or an A query under IPv6-only) is
    /// rewritten to NXDOMAIN; every other combination passes through.
    pub fn apply_to_upstream_answer(self, response: Vec<u8>, query: &DnsMessage) -> Vec<u8> {
        if self == FilterPolicy::Both {
            return response;
        }

        let qtype = query.question().map(|q| q.qtype);
        let suppress = matches!(
            (self, qtype),
            (FilterPolicy::Ipv4Only, Some(RecordType::AAAA))
                | (FilterPolicy::Ipv6Only, Some(RecordType::A))
        );

        if suppress {
            wire::build_intercepted(&response).unwrap_or(response)
        } else {
            response
        }
    }

    /// Map the `-4` / `-6` command-line flags to a policy
    pub fn from_cli_flag(flag: &str) -> Option<FilterPolicy> {
        match flag {
            "-4" => Some(FilterPolicy::Ipv4Only),
            "-6" => Some(FilterPolicy::Ipv6Only),
            _ => None,
        }
    }
}

impl fmt::Display for FilterPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterPolicy::Both => write!(f, "both (A and AAAA records)"),
            FilterPolicy::Ipv4Only => write!(f, "IPv4 only (A records)"),
            FilterPolicy::Ipv6Only => write!(f, "IPv6 only (AAAA records)"),
        }
    }
}
