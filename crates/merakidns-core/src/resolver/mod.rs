//! Inventory resolver
//!
//! Turns the name-or-id references of a [`MerakiSourceSpec`] into canonical
//! organization and network ids.
//!
//! ## Resolution Rules
//!
//! - A set id is returned unchanged, with no validation round-trip
//! - Otherwise the listing is scanned for a case-insensitive name match
//! - No match is an [`Error::Lookup`]; transport failures pass through untouched
//!
//! ## Duplicate Names
//!
//! When several entries share a name the first one in listing order wins.
//! Which one the API lists first is not guaranteed, so the ambiguity is
//! logged instead of silently resolved.

use tracing::{debug, warn};

use crate::error::{Error, LookupKind, Result};
use crate::model::{MerakiRef, MerakiSourceSpec};
use crate::traits::InventoryClient;

/// Resolves organization and network references against an inventory
pub struct InventoryResolver<'a> {
    inventory: &'a dyn InventoryClient,
}

impl<'a> InventoryResolver<'a> {
    pub fn new(inventory: &'a dyn InventoryClient) -> Self {
        Self { inventory }
    }

    /// Resolve an organization reference to its id
    pub async fn resolve_organization(&self, reference: &MerakiRef) -> Result<String> {
        if let Some(id) = reference.id() {
            return Ok(id.to_string());
        }

        let name = reference
            .name()
            .ok_or_else(|| Error::invalid_input("organization name or ID is required"))?;

        let organizations = self.inventory.organizations().await?;
        let id = first_match(
            LookupKind::Organization,
            name,
            organizations.iter().map(|o| (o.id.as_str(), o.name.as_str())),
        )?;

        debug!("Resolved organization '{}' to {}", name, id);
        Ok(id)
    }

    /// Resolve a network reference to its id, within an organization
    pub async fn resolve_network(&self, organization_id: &str, reference: &MerakiRef) -> Result<String> {
        if let Some(id) = reference.id() {
            return Ok(id.to_string());
        }

        let name = reference
            .name()
            .ok_or_else(|| Error::invalid_input("network name or ID is required"))?;

        let networks = self.inventory.networks(organization_id).await?;
        let id = first_match(
            LookupKind::Network,
            name,
            networks.iter().map(|n| (n.id.as_str(), n.name.as_str())),
        )?;

        debug!("Resolved network '{}' in {} to {}", name, organization_id, id);
        Ok(id)
    }

    /// Resolve the network a source reads clients from
    ///
    /// A network id short-circuits everything: the organization is only
    /// looked up when the network has to be found by name.
    pub async fn resolve_network_for(&self, spec: &MerakiSourceSpec) -> Result<String> {
        if let Some(id) = spec.network.id() {
            return Ok(id.to_string());
        }
        if spec.network.name().is_none() {
            return Err(Error::invalid_input("network name or ID is required"));
        }

        let organization_id = self.resolve_organization(&spec.organization).await?;
        self.resolve_network(&organization_id, &spec.network).await
    }
}

/// First `(id, name)` entry whose name matches case-insensitively
fn first_match<'n>(
    kind: LookupKind,
    wanted: &str,
    entries: impl Iterator<Item = (&'n str, &'n str)>,
) -> Result<String> {
    let folded = wanted.to_lowercase();
    let mut matches = entries.filter(|(_, name)| name.to_lowercase() == folded);

    let (id, _) = matches.next().ok_or_else(|| Error::lookup(kind, wanted))?;

    let extra = matches.count();
    if extra > 0 {
        warn!(
            "{} name '{}' is ambiguous: {} more entries share it, using first match {}",
            kind, wanted, extra, id
        );
    }

    Ok(id.to_string())
}
