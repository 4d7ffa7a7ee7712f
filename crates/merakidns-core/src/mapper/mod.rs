//! Endpoint mapper
//!
//! Maps inventory clients to DNS endpoints:
//!
//! - hostname label: the client description, or its MAC when the description
//!   is empty, lowercased with spaces and colons replaced by `-`
//! - DNS name: `label.domain`
//! - record type: always `A`
//! - target: the client IP verbatim, even when empty or malformed
//! - TTL: the source's override, if any
//!
//! Output order follows the inventory listing order.

use tracing::debug;

use crate::model::{Client, Endpoint, MerakiSourceSpec, RecordType};

/// Lowercase, then replace every space and colon with a hyphen
pub fn sanitize_label(raw: &str) -> String {
    raw.to_lowercase().replace([' ', ':'], "-")
}

/// Hostname label of a client, before the domain is appended
pub fn hostname_label(client: &Client) -> String {
    match client.description.as_deref() {
        Some(description) if !description.is_empty() => sanitize_label(description),
        _ => sanitize_label(&client.mac),
    }
}

/// Build the endpoint for one client
pub fn map_client(client: &Client, spec: &MerakiSourceSpec) -> Endpoint {
    let dns_name = format!("{}.{}", hostname_label(client), spec.domain);
    let target = client.ip.clone().unwrap_or_default();

    Endpoint::new(dns_name, RecordType::A, target).with_ttl(spec.ttl)
}

/// Build endpoints for all clients, preserving listing order
pub fn map_clients(clients: &[Client], spec: &MerakiSourceSpec) -> Vec<Endpoint> {
    clients
        .iter()
        .map(|client| {
            let endpoint = map_client(client, spec);
            debug!("found endpoint {}", endpoint);
            endpoint
        })
        .collect()
}
