//! Request origin captured for audit events.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use http::HeaderMap;
use http::header::USER_AGENT;
use serde::{Deserialize, Serialize};

use medinsight_core::events::AuditEvent;

/// Placeholder for an origin that could not be determined.
pub const UNKNOWN: &str = "unknown";

/// Headers that may carry the client address, most trusted first.
const IP_HEADER_CANDIDATES: &[&str] = &[
    "X-Forwarded-For",
    "Proxy-Client-IP",
    "WL-Proxy-Client-IP",
    "HTTP_X_FORWARDED_FOR",
    "HTTP_X_FORWARDED",
    "HTTP_X_CLUSTER_CLIENT_IP",
    "HTTP_CLIENT_IP",
    "HTTP_FORWARDED_FOR",
    "HTTP_FORWARDED",
    "HTTP_VIA",
    "REMOTE_ADDR",
];

/// Where a request came from.
///
/// Built from the HTTP headers of an inbound request so domain services can
/// stamp the origin fields of the audit events they publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Client IP, or `unknown`.
    pub ip_address: String,
    /// User-Agent header value, or `unknown`.
    pub user_agent: String,
    /// When the request was received.
    pub request_time: DateTime<Utc>,
}

impl RequestContext {
    /// Extract the origin from `headers`, falling back to the socket peer.
    pub fn from_headers(headers: &HeaderMap, remote_addr: Option<IpAddr>) -> Self {
        Self {
            ip_address: client_ip(headers, remote_addr),
            user_agent: user_agent(headers),
            request_time: Utc::now(),
        }
    }

    /// Copy the origin onto an audit event.
    pub fn apply(&self, event: AuditEvent) -> AuditEvent {
        event.with_origin(self.ip_address.clone(), self.user_agent.clone())
    }
}

/// First usable client address among the proxy headers.
pub fn client_ip(headers: &HeaderMap, remote_addr: Option<IpAddr>) -> String {
    for name in IP_HEADER_CANDIDATES {
        let Some(value) = headers.get(*name).and_then(|v| v.to_str().ok()) else {
            continue;
        };
        if value.is_empty() || value.eq_ignore_ascii_case(UNKNOWN) {
            continue;
        }
        // Proxies append; the client is the first entry.
        let first = value.split(',').next().unwrap_or(value).trim();
        return first.to_string();
    }
    remote_addr.map_or_else(|| UNKNOWN.to_string(), |addr| addr.to_string())
}

/// The User-Agent header, or `unknown`.
pub fn user_agent(headers: &HeaderMap) -> String {
    headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or(UNKNOWN)
        .to_string()
}
