// # Inventory Client Trait
//
// Defines the interface for reading organizations, networks and clients
// from the external management API.
//
// ## Implementations
//
// - Meraki Dashboard API: `merakidns-inventory-meraki` crate
//
// ## Usage
//
// ```rust,ignore
// use merakidns_core::InventoryClient;
//
// async fn dump(inventory: &dyn InventoryClient) -> merakidns_core::Result<()> {
//     for org in inventory.organizations().await? {
//         for network in inventory.networks(&org.id).await? {
//             let clients = inventory.clients(&network.id).await?;
//             println!("{}/{}: {} clients", org.name, network.name, clients.len());
//         }
//     }
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::sync::Arc;

use crate::model::{Client, Network, Organization};

/// Trait for inventory collaborator implementations
///
/// Implementations are stateless and single-shot: one API request per call,
/// no retries, no caching. Throttling, backoff and scheduling belong to the
/// reconciler and controller.
///
/// # Errors
///
/// - Non-success responses: `Error::Transport` carrying the status code
/// - Undecodable payloads: `Error::Schema`
///
/// An empty list is a valid answer and is never reported as an error.
#[async_trait]
pub trait InventoryClient: Send + Sync {
    /// List every organization visible to the API key
    async fn organizations(&self) -> Result<Vec<Organization>, crate::Error>;

    /// List networks of an organization
    async fn networks(&self, organization_id: &str) -> Result<Vec<Network>, crate::Error>;

    /// List clients seen on a network, in API order
    async fn clients(&self, network_id: &str) -> Result<Vec<Client>, crate::Error>;

    /// Clients currently reported as online
    async fn online_clients(&self, network_id: &str) -> Result<Vec<Client>, crate::Error> {
        let clients = self.clients(network_id).await?;
        Ok(clients.into_iter().filter(Client::is_online).collect())
    }

    /// Implementation name (for logging/debugging)
    fn inventory_name(&self) -> &'static str;
}

/// Helper trait for constructing inventory clients from configuration
pub trait InventoryClientFactory: Send + Sync {
    fn create(
        &self,
        config: &crate::config::InventoryConfig,
    ) -> Result<Arc<dyn InventoryClient>, crate::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedInventory(Vec<Client>);

    #[async_trait]
    impl InventoryClient for FixedInventory {
        async fn organizations(&self) -> Result<Vec<Organization>, crate::Error> {
            Ok(Vec::new())
        }

        async fn networks(&self, _organization_id: &str) -> Result<Vec<Network>, crate::Error> {
            Ok(Vec::new())
        }

        async fn clients(&self, _network_id: &str) -> Result<Vec<Client>, crate::Error> {
            Ok(self.0.clone())
        }

        fn inventory_name(&self) -> &'static str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn online_clients_keeps_only_online_status() {
        let inventory = FixedInventory(vec![
            Client::new("a", "aa:aa:aa:aa:aa:aa", "10.0.0.1").with_status("Online"),
            Client::new("b", "bb:bb:bb:bb:bb:bb", "10.0.0.2").with_status("Offline"),
            Client::new("c", "cc:cc:cc:cc:cc:cc", "10.0.0.3"),
        ]);

        let online = inventory.online_clients("N_1").await.unwrap();
        assert_eq!(online.len(), 1);
        assert_eq!(online[0].id, "a");
    }
}
