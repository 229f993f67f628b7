//! Integration tests for the Keystone session and Glance/Swift clients.
//!
//! Each test runs a mock OpenStack endpoint and drives the real HTTP client
//! against it.

use std::path::Path;

use ironic_conductor::actions::{self, SecretOutcome, TEMP_URL_KEY_PROPERTY};
use ironic_conductor::openstack::{
    default_store, CloudServices, IdentityCredentials, KeystoneSession, OpenStackClients,
    OpenStackError,
};
use ironic_conductor::state::{CONFIG_COMPLETE_FLAG, TEMP_URL_SECRET_KEY};
use ironic_conductor::{
    CharmConfig, InterfaceCatalog, IronicConductorCharm, LeaderSettings, UnitState,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "gAAAAABtoken";
const ACCOUNT_PATH: &str = "/v1/AUTH_services";

// =============================================================================
// Helpers
// =============================================================================

fn credentials(server: &MockServer, api_version: &str) -> IdentityCredentials {
    IdentityCredentials {
        username: "ironic".into(),
        password: "secret".into(),
        project_name: "services".into(),
        auth_protocol: "http".into(),
        auth_host: server.address().ip().to_string(),
        credentials_port: server.address().port(),
        api_version: api_version.into(),
        project_domain_name: "service_domain".into(),
        user_domain_name: "service_domain".into(),
    }
}

fn v3_catalog(server: &MockServer, services: &[&str]) -> serde_json::Value {
    let catalog: Vec<_> = services
        .iter()
        .map(|service_type| {
            let url = match *service_type {
                "object-store" => format!("{}{ACCOUNT_PATH}", server.uri()),
                _ => server.uri(),
            };
            json!({
                "type": service_type,
                "endpoints": [
                    {"interface": "admin", "url": "http://admin.invalid"},
                    {"interface": "public", "url": url},
                ]
            })
        })
        .collect();
    json!({"token": {"catalog": catalog}})
}

async fn mount_v3_auth(server: &MockServer, services: &[&str]) {
    Mock::given(method("POST"))
        .and(path("/v3/auth/tokens"))
        .and(body_partial_json(json!({
            "auth": {"identity": {"methods": ["password"]}}
        })))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("X-Subject-Token", TOKEN)
                .set_body_json(v3_catalog(server, services)),
        )
        .mount(server)
        .await;
}

async fn mount_stores(server: &MockServer, stores: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/v2/info/stores"))
        .and(header("X-Auth-Token", TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "stores": stores })))
        .mount(server)
        .await;
}

async fn mount_account(server: &MockServer, temp_url_key: Option<&str>) {
    let mut response = ResponseTemplate::new(204)
        .insert_header("X-Account-Object-Count", "0")
        .insert_header("X-Account-Meta-Color", "blue");
    if let Some(key) = temp_url_key {
        response = response.insert_header("X-Account-Meta-Temp-Url-Key", key);
    }
    Mock::given(method("HEAD"))
        .and(path(ACCOUNT_PATH))
        .and(header("X-Auth-Token", TOKEN))
        .respond_with(response)
        .mount(server)
        .await;
}

async fn session(server: &MockServer) -> KeystoneSession {
    KeystoneSession::create_with_ca(&credentials(server, "3"), Path::new("/nonexistent/ca.crt"))
        .await
        .expect("session")
}

async fn connect(creds: &IdentityCredentials) -> Result<OpenStackClients, OpenStackError> {
    KeystoneSession::create_with_ca(creds, Path::new("/nonexistent/ca.crt"))
        .await
        .map(OpenStackClients::new)
}

// =============================================================================
// Keystone
// =============================================================================

#[tokio::test]
async fn test_v3_session_reads_token_and_catalog() {
    let server = MockServer::start().await;
    mount_v3_auth(&server, &["object-store", "image"]).await;

    let session = session(&server).await;
    assert_eq!(session.token(), TOKEN);
    assert_eq!(session.catalog().len(), 2);
    assert_eq!(
        session.endpoint("object-store").unwrap(),
        format!("{}{ACCOUNT_PATH}", server.uri())
    );

    let clients = OpenStackClients::new(session);
    assert!(clients.has_swift());
    assert!(clients.has_glance());
    assert!(!clients.has_service_type("baremetal"));
}

#[tokio::test]
async fn test_v2_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2.0/tokens"))
        .and(body_partial_json(json!({"auth": {"tenantName": "services"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access": {
                "token": {"id": "v2-token"},
                "serviceCatalog": [
                    {"type": "image", "endpoints": [{"publicURL": server.uri()}]}
                ]
            }
        })))
        .mount(&server)
        .await;

    let session = KeystoneSession::create_with_ca(
        &credentials(&server, "2.0"),
        Path::new("/nonexistent/ca.crt"),
    )
    .await
    .unwrap();
    assert_eq!(session.token(), "v2-token");

    let clients = OpenStackClients::new(session);
    assert!(clients.has_glance());
    assert!(!clients.has_swift());
}

#[tokio::test]
async fn test_rejected_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/auth/tokens"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_string("The request you have made requires authentication."),
        )
        .mount(&server)
        .await;

    let result =
        KeystoneSession::create_with_ca(&credentials(&server, "3"), Path::new("/nonexistent"))
            .await;
    match result {
        Err(OpenStackError::Api { status, .. }) => assert_eq!(status, 401),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected authentication failure"),
    }
}

#[tokio::test]
async fn test_missing_subject_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/auth/tokens"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"token": {"catalog": []}})),
        )
        .mount(&server)
        .await;

    let result =
        KeystoneSession::create_with_ca(&credentials(&server, "3"), Path::new("/nonexistent"))
            .await;
    assert!(matches!(result, Err(OpenStackError::MissingToken)));
}

// =============================================================================
// Glance
// =============================================================================

#[tokio::test]
async fn test_glance_stores() {
    let server = MockServer::start().await;
    mount_v3_auth(&server, &["image"]).await;
    mount_stores(
        &server,
        json!([{"id": "swift"}, {"id": "ceph", "default": true}]),
    )
    .await;

    let clients = OpenStackClients::new(session(&server).await);
    let stores = clients.glance_stores().await.unwrap();
    assert_eq!(stores.len(), 2);
    assert!(!stores[0].default);
    assert_eq!(default_store(&stores).unwrap(), "ceph");
}

#[tokio::test]
async fn test_glance_missing_from_catalog() {
    let server = MockServer::start().await;
    mount_v3_auth(&server, &["object-store"]).await;

    let clients = OpenStackClients::new(session(&server).await);
    assert!(matches!(
        clients.glance_stores().await,
        Err(OpenStackError::EndpointNotFound { .. })
    ));
}

// =============================================================================
// Swift
// =============================================================================

#[tokio::test]
async fn test_account_properties_strip_prefix() {
    let server = MockServer::start().await;
    mount_v3_auth(&server, &["object-store"]).await;
    mount_account(&server, Some("abc123")).await;

    let clients = OpenStackClients::new(session(&server).await);
    let properties = clients.object_account_properties().await.unwrap();
    assert_eq!(properties.get("temp-url-key").map(String::as_str), Some("abc123"));
    assert_eq!(properties.get("color").map(String::as_str), Some("blue"));
    assert!(!properties.contains_key("x-account-object-count"));
    assert_eq!(properties.len(), 2);
}

#[tokio::test]
async fn test_set_property_posts_header() {
    let server = MockServer::start().await;
    mount_v3_auth(&server, &["object-store"]).await;
    mount_account(&server, Some("old")).await;
    Mock::given(method("POST"))
        .and(path(ACCOUNT_PATH))
        .and(header("X-Auth-Token", TOKEN))
        .and(header("X-Account-Meta-Temp-Url-Key", "new"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let clients = OpenStackClients::new(session(&server).await);
    clients
        .set_object_account_property("Temp-Url-Key", "new")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_set_property_skips_unchanged_value() {
    let server = MockServer::start().await;
    mount_v3_auth(&server, &["object-store"]).await;
    mount_account(&server, Some("same")).await;
    Mock::given(method("POST"))
        .and(path(ACCOUNT_PATH))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let clients = OpenStackClients::new(session(&server).await);
    clients
        .set_object_account_property(TEMP_URL_KEY_PROPERTY, "same")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_delete_property_posts_empty_value() {
    let server = MockServer::start().await;
    mount_v3_auth(&server, &["object-store"]).await;
    Mock::given(method("POST"))
        .and(path(ACCOUNT_PATH))
        .and(header_exists("X-Account-Meta-Color"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let clients = OpenStackClients::new(session(&server).await);
    clients.delete_object_account_property("color").await.unwrap();
}

// =============================================================================
// set-temp-url-secret
// =============================================================================

#[tokio::test]
async fn test_action_publishes_secret_end_to_end() {
    let server = MockServer::start().await;
    mount_v3_auth(&server, &["object-store", "image"]).await;
    mount_stores(&server, json!([{"id": "swift", "default": true}])).await;
    mount_account(&server, None).await;
    Mock::given(method("POST"))
        .and(path(ACCOUNT_PATH))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let mut unit = UnitState::new(tmp.path());
    unit.is_leader = true;
    unit.set_flag(CONFIG_COMPLETE_FLAG).unwrap();

    let creds = credentials(&server, "3");
    let outcome = actions::set_temp_url_secret(&mut unit, || connect(&creds))
        .await
        .unwrap();

    assert_eq!(outcome, SecretOutcome::Rotated);
    let secret = unit.leader_get(TEMP_URL_SECRET_KEY).unwrap();
    assert_eq!(secret.len(), 40);

    // Published secret survives a reload of the unit state.
    let reloaded = UnitState::load(tmp.path()).unwrap();
    assert_eq!(reloaded.leader_get(TEMP_URL_SECRET_KEY), Some(secret.clone()));

    // Re-rendering picks the new secret up straight away.
    let charm = IronicConductorCharm::new(
        CharmConfig::default(),
        "ussuri",
        InterfaceCatalog::builtin(),
    );
    let output = tmp.path().join("ironic-context.json");
    charm.render(&mut unit, &output).unwrap();
    let context: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(context["temp_url_secret"], json!(secret));
}

#[tokio::test]
async fn test_action_rejects_glance_without_swift_store() {
    let server = MockServer::start().await;
    mount_v3_auth(&server, &["object-store", "image"]).await;
    mount_stores(&server, json!([{"id": "ceph", "default": true}])).await;

    let tmp = tempfile::tempdir().unwrap();
    let mut unit = UnitState::new(tmp.path());
    unit.is_leader = true;
    unit.set_flag(CONFIG_COMPLETE_FLAG).unwrap();

    let creds = credentials(&server, "3");
    let err = actions::set_temp_url_secret(&mut unit, || connect(&creds))
        .await
        .unwrap_err();

    assert!(err
        .to_string()
        .starts_with("Glance does not support Swift storage backend"));
    assert!(!unit.secret_provisioned());
}
