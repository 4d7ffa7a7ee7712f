//! Integration tests for the Meraki client using wiremock.
//!
//! These tests pin the HTTP contract: request shape, decoding, and how
//! non-success statuses and malformed bodies surface as errors.

use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use merakidns_core::model::{MerakiRef, MerakiSourceSpec};
use merakidns_core::traits::InventoryClient;
use merakidns_core::{Error, InventoryResolver};
use merakidns_inventory_meraki::{API_KEY_HEADER, MerakiClient};

// =============================================================================
// Test Helpers
// =============================================================================

const API_KEY: &str = "test-api-key";

fn client_for(server: &MockServer) -> MerakiClient {
    MerakiClient::with_base_url(API_KEY, format!("{}/api/v0/", server.uri()), 1000).unwrap()
}

async fn mount_json(server: &MockServer, route: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .and(header(API_KEY_HEADER, API_KEY))
        .and(query_param("perPage", "1000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

// =============================================================================
// Request Shape
// =============================================================================

#[tokio::test]
async fn sends_api_key_header_and_page_size() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v0/organizations"))
        .and(header(API_KEY_HEADER, API_KEY))
        .and(query_param("perPage", "1000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "549236", "name": "Acme" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let orgs = client_for(&server).organizations().await.unwrap();
    assert_eq!(orgs.len(), 1);
    assert_eq!(orgs[0].id, "549236");
    assert_eq!(orgs[0].name, "Acme");
}

#[tokio::test]
async fn configured_page_size_is_sent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v0/organizations/O_1/networks"))
        .and(query_param("perPage", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let client =
        MerakiClient::with_base_url(API_KEY, format!("{}/api/v0/", server.uri()), 50).unwrap();
    assert!(client.networks("O_1").await.unwrap().is_empty());
}

// =============================================================================
// Decoding
// =============================================================================

#[tokio::test]
async fn decodes_networks_and_clients() {
    let server = MockServer::start().await;

    mount_json(
        &server,
        "/api/v0/organizations/O_1/networks",
        json!([{
            "id": "N_1",
            "organizationId": "O_1",
            "name": "Main Office",
            "timeZone": "America/New_York",
            "tags": " tag1 tag2 ",
            "type": "combined"
        }]),
    )
    .await;

    mount_json(
        &server,
        "/api/v0/networks/N_1/clients",
        json!([
            {
                "id": "k74272e",
                "mac": "22:33:44:55:66:77",
                "description": "Printer 2F",
                "ip": "10.0.0.21",
                "status": "Online",
                "vlan": 10
            },
            {
                "id": "k74272f",
                "mac": "22:33:44:55:66:78",
                "description": null,
                "ip": "10.0.0.22",
                "status": "Offline"
            }
        ]),
    )
    .await;

    let client = client_for(&server);

    let networks = client.networks("O_1").await.unwrap();
    assert_eq!(networks[0].name, "Main Office");
    assert_eq!(networks[0].network_type.as_deref(), Some("combined"));

    let clients = client.clients("N_1").await.unwrap();
    assert_eq!(clients.len(), 2);
    assert_eq!(clients[0].description.as_deref(), Some("Printer 2F"));
    assert_eq!(clients[1].description, None);

    let online = client.online_clients("N_1").await.unwrap();
    assert_eq!(online.len(), 1);
    assert_eq!(online[0].id, "k74272e");
}

#[tokio::test]
async fn empty_and_null_lists_are_not_errors() {
    let server = MockServer::start().await;

    mount_json(&server, "/api/v0/networks/N_1/clients", json!([])).await;
    mount_json(&server, "/api/v0/networks/N_2/clients", json!(null)).await;

    let client = client_for(&server);
    assert!(client.clients("N_1").await.unwrap().is_empty());
    assert!(client.clients("N_2").await.unwrap().is_empty());
}

#[tokio::test]
async fn malformed_body_is_schema_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v0/organizations"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = client_for(&server).organizations().await.unwrap_err();
    assert!(matches!(err, Error::Schema(_)), "got {err:?}");
}

#[tokio::test]
async fn wrong_shape_is_schema_error() {
    let server = MockServer::start().await;

    mount_json(
        &server,
        "/api/v0/organizations",
        json!({ "id": "O_1", "name": "not a list" }),
    )
    .await;

    let err = client_for(&server).organizations().await.unwrap_err();
    assert!(matches!(err, Error::Schema(_)), "got {err:?}");
}

// =============================================================================
// Status Handling
// =============================================================================

#[tokio::test]
async fn non_200_is_transport_error_with_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v0/networks/N_1/clients"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .mount(&server)
        .await;

    let err = client_for(&server).clients("N_1").await.unwrap_err();
    match err {
        Error::Transport {
            source_name,
            status,
            message,
        } => {
            assert_eq!(source_name, "meraki");
            assert_eq!(status, Some(503));
            assert!(message.contains("Service Unavailable"));
        }
        other => panic!("expected transport error, got {other:?}"),
    }
}

#[tokio::test]
async fn unauthorized_mentions_api_key() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v0/organizations"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "errors": ["Invalid API key"] })),
        )
        .mount(&server)
        .await;

    let err = client_for(&server).organizations().await.unwrap_err();
    assert!(matches!(err, Error::Transport { status: Some(401), .. }));
    assert!(err.to_string().contains("API key"));
    assert!(!err.to_string().contains(API_KEY));
}

#[tokio::test]
async fn rate_limit_is_flagged() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v0/organizations"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "2"))
        .mount(&server)
        .await;

    let err = client_for(&server).organizations().await.unwrap_err();
    assert!(matches!(err, Error::Transport { status: Some(429), .. }));
    assert!(err.to_string().contains("Rate limit"));
    assert!(err.is_transient());
}

#[tokio::test]
async fn unreachable_server_is_transport_error_without_status() {
    let server = MockServer::start().await;
    let base_url = format!("{}/api/v0/", server.uri());
    drop(server);

    let client = MerakiClient::with_base_url(API_KEY, base_url, 1000).unwrap();
    let err = client.organizations().await.unwrap_err();
    assert!(matches!(err, Error::Transport { status: None, .. }), "got {err:?}");
}

// =============================================================================
// Resolver Against HTTP
// =============================================================================

#[tokio::test]
async fn resolver_walks_organization_then_network() {
    let server = MockServer::start().await;

    mount_json(
        &server,
        "/api/v0/organizations",
        json!([
            { "id": "O_0", "name": "Other" },
            { "id": "O_1", "name": "Acme" }
        ]),
    )
    .await;
    mount_json(
        &server,
        "/api/v0/organizations/O_1/networks",
        json!([{ "id": "N_7", "organizationId": "O_1", "name": "Main Office" }]),
    )
    .await;

    let client = client_for(&server);
    let resolver = InventoryResolver::new(&client);

    let spec = MerakiSourceSpec {
        organization: MerakiRef::by_name("ACME"),
        network: MerakiRef::by_name("main office"),
        domain: "home.example.com".to_string(),
        ttl: None,
    };

    assert_eq!(resolver.resolve_network_for(&spec).await.unwrap(), "N_7");
}
