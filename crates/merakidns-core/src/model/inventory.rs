// # Inventory Records
//
// Read-only records returned by the inventory collaborator. Only the fields
// the mapper and resolver need are typed strictly; everything else is
// optional and unknown fields are ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<serde_json::Value>,
    #[serde(default)]
    pub product_types: Vec<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub network_type: Option<String>,
}

/// Status value Meraki reports for connected clients
pub const CLIENT_STATUS_ONLINE: &str = "Online";

/// A client device seen on a network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: String,
    pub mac: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip6: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_seen: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recent_device_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl Client {
    /// Minimal client, as used by tests and fixtures
    pub fn new(id: impl Into<String>, mac: impl Into<String>, ip: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            mac: mac.into(),
            description: None,
            ip: Some(ip.into()),
            ip6: None,
            manufacturer: None,
            os: None,
            first_seen: None,
            last_seen: None,
            recent_device_name: None,
            status: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn is_online(&self) -> bool {
        self.status.as_deref() == Some(CLIENT_STATUS_ONLINE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_tolerates_nulls_and_extra_fields() {
        let client: Client = serde_json::from_value(json!({
            "id": "k74272e",
            "mac": "22:33:44:55:66:77",
            "description": null,
            "ip": "1.2.3.4",
            "ip6": null,
            "user": null,
            "vlan": 255,
            "usage": { "sent": 138, "recv": 61 },
            "status": "Online",
            "firstSeen": "2024-03-01T10:00:00Z"
        }))
        .unwrap();

        assert_eq!(client.description, None);
        assert_eq!(client.ip.as_deref(), Some("1.2.3.4"));
        assert!(client.is_online());
        assert!(client.first_seen.is_some());
    }

    #[test]
    fn network_type_field_is_renamed() {
        let network: Network = serde_json::from_value(json!({
            "id": "N_1",
            "organizationId": "O_1",
            "name": "Main Office",
            "type": "combined",
            "productTypes": ["appliance", "switch"]
        }))
        .unwrap();

        assert_eq!(network.network_type.as_deref(), Some("combined"));
        assert_eq!(network.product_types.len(), 2);
    }
}
