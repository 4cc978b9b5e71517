//! Integration tests for saving and reading the lease server location.

mod helpers;

use floatlease_client::LeaseClient;
use floatlease_core::error::LeaseError;
use floatlease_core::types::{SaveFlags, ServerScope};

use helpers::{PRODUCT, TestEnv};

#[tokio::test]
async fn test_get_server_before_save_is_not_configured() {
    let env = TestEnv::new();
    let (client, _events) = env.client().await;
    assert_eq!(client.get_server().await.unwrap(), None);
}

#[tokio::test]
async fn test_save_then_get() {
    let env = TestEnv::new();
    let (client, _events) = env.client().await;

    client
        .save_server("lic.example.com", 8443, SaveFlags::USER | SaveFlags::REQUEST_OVER_HTTPS)
        .await
        .unwrap();

    let endpoint = client.get_server().await.unwrap().unwrap();
    assert_eq!(endpoint.host(), "lic.example.com");
    assert_eq!(endpoint.port(), 8443);
    assert_eq!(endpoint.scope(), ServerScope::User);
    assert!(endpoint.use_tls());
}

#[tokio::test]
async fn test_saved_server_is_shared_by_clients_of_a_product() {
    let env = TestEnv::new();
    let (first, _first_events) = env.client().await;
    first
        .save_server("lic.example.com", 13, SaveFlags::USER)
        .await
        .unwrap();
    first.cleanup().await;

    let (second, _second_events) = env.client().await;
    assert_eq!(second.get_server().await.unwrap().unwrap().port(), 13);
    second.request_lease().await.unwrap();
}

#[tokio::test]
async fn test_malformed_hosts_are_rejected() {
    let env = TestEnv::new();
    let (client, _events) = env.client().await;

    for (host, port) in [("http://host", 13), ("host:443", 443), ("", 13), ("host", 0)] {
        assert_eq!(
            client.save_server(host, port, SaveFlags::USER).await,
            Err(LeaseError::BadHostAddress),
            "host {host:?} port {port}"
        );
    }
    assert_eq!(client.get_server().await.unwrap(), None);
}

#[tokio::test]
async fn test_scope_flags_are_validated() {
    let env = TestEnv::new();
    let (client, _events) = env.client().await;
    assert_eq!(
        client
            .save_server("host", 13, SaveFlags::USER | SaveFlags::SYSTEM)
            .await,
        Err(LeaseError::Flags)
    );
}

#[tokio::test]
async fn test_system_scope_needs_elevation_once() {
    let env = TestEnv::new();
    let (client, _events) = env.client().await;
    assert_eq!(
        client.save_server("host", 13, SaveFlags::SYSTEM).await,
        Err(LeaseError::Permission)
    );

    // An elevated process unlocks the product without choosing a server.
    let admin = LeaseClient::builder(&env.other_process(true), PRODUCT)
        .open()
        .await
        .unwrap();
    admin.save_server("", 0, SaveFlags::SYSTEM).await.unwrap();
    assert_eq!(client.get_server().await.unwrap(), None);

    client
        .save_server("machine.example.com", 13, SaveFlags::SYSTEM)
        .await
        .unwrap();
    let endpoint = admin.get_server().await.unwrap().unwrap();
    assert_eq!(endpoint.host(), "machine.example.com");
    assert_eq!(endpoint.scope(), ServerScope::System);

    // A per-user choice still takes precedence.
    client
        .save_server("mine.example.com", 13, SaveFlags::USER)
        .await
        .unwrap();
    assert_eq!(
        client.get_server().await.unwrap().unwrap().host(),
        "mine.example.com"
    );
}

#[tokio::test]
async fn test_hosted_server_selector_is_kept() {
    let env = TestEnv::new();
    let (client, _events) = env.client().await;
    let host = "floating.example.com/?server=6f1c5d0e-8a7b-4c4e-9d0b-1a2b3c4d5e6f";

    client.save_server(host, 443, SaveFlags::USER).await.unwrap();

    let endpoint = client.get_server().await.unwrap().unwrap();
    assert_eq!(endpoint.host(), host);
    assert_eq!(endpoint.authority(), "floating.example.com");
    assert!(endpoint.use_tls());
}
