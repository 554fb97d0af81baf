//! Client session lifecycle against an in-process server

mod common;

use common::{credentials, eventually, fast_config, init_logger, server};
use std::sync::Arc;
use std::time::Duration;
use vaultsync_core::{Credentials, Item, Payload, VaultTransport};
use vaultsync_sync_engine::{ConflictStrategy, SyncError, VaultClient};

const PATIENCE: Duration = Duration::from_secs(5);

fn new_client(server: &Arc<vaultsync_server::VaultServer>) -> VaultClient {
    let transport: Arc<dyn VaultTransport> = server.clone();
    VaultClient::new(transport, Arc::new(ConflictStrategy::UseRemote), fast_config())
}

async fn confirmed(client: &VaultClient, item: &Item) -> bool {
    matches!(
        client.repository().entry(item.id),
        Ok(Some(entry)) if !entry.pending
    )
}

#[tokio::test]
async fn test_short_password_is_rejected_locally() {
    let server = server();
    let client = new_client(&server);

    let result = client.sign_up(Credentials::new("alice", "12345")).await;
    assert!(matches!(result, Err(SyncError::WeakPassword { min: 6 })));
    assert!(!client.is_active().await);
}

#[tokio::test]
async fn test_item_operations_need_a_session() {
    let server = server();
    let client = new_client(&server);

    let item = Item::new(Payload::Text("draft".to_string()));
    assert!(matches!(
        client.create_item(item.clone()).await,
        Err(SyncError::SessionInactive)
    ));
    assert!(matches!(
        client.delete_item(item.id).await,
        Err(SyncError::SessionInactive)
    ));
    assert!(client.items().unwrap().is_empty());
}

#[tokio::test]
async fn test_edits_reach_a_second_device() {
    init_logger();
    let server = server();
    let laptop = new_client(&server);
    let phone = new_client(&server);

    laptop.sign_up(credentials("alice")).await.unwrap();
    assert!(laptop.is_active().await);
    assert!(matches!(
        laptop.log_in(credentials("alice")).await,
        Err(SyncError::SessionAlreadyActive)
    ));

    let item = Item::new(Payload::Password("wifi-pass".to_string())).with_meta("home");
    laptop.create_item(item.clone()).await.unwrap();
    let (laptop_ref, item_ref) = (&laptop, &item);
    assert!(eventually(PATIENCE, move || confirmed(laptop_ref, item_ref)).await);

    phone.log_in(credentials("alice")).await.unwrap();
    let on_phone = phone.get_item(item.id).unwrap();
    assert!(on_phone.data_equals(&item));
    assert_eq!(on_phone.version, 1);

    phone.delete_item(item.id).await.unwrap();
    let id = item.id;
    let gone = eventually(PATIENCE, move || async move { laptop_ref.get_item(id).is_err() }).await;
    assert!(gone);

    laptop.log_out().await.unwrap();
    phone.log_out().await.unwrap();
}

#[tokio::test]
async fn test_log_out_stops_the_session() {
    let server = server();
    let client = new_client(&server);

    client.sign_up(credentials("carol")).await.unwrap();
    client.log_out().await.unwrap();

    assert!(!client.is_active().await);
    assert!(!client.repository().has_tokens().unwrap());
    assert!(matches!(
        client
            .create_item(Item::new(Payload::Text("late".to_string())))
            .await,
        Err(SyncError::SessionInactive)
    ));
    assert!(matches!(
        client.renew_tokens().await,
        Err(SyncError::ReloginNeeded(_))
    ));
}

#[tokio::test]
async fn test_unsent_edits_survive_relogin() {
    init_logger();
    let server = server();
    let client = new_client(&server);

    client.sign_up(credentials("dave")).await.unwrap();
    let item = Item::new(Payload::Binary(vec![0xca, 0xfe]));
    client.create_item(item.clone()).await.unwrap();
    client.log_out().await.unwrap();
    assert!(client.get_item(item.id).is_ok());

    client.log_in(credentials("dave")).await.unwrap();
    let (client_ref, item_ref) = (&client, &item);
    assert!(eventually(PATIENCE, move || confirmed(client_ref, item_ref)).await);

    let other = new_client(&server);
    other.log_in(credentials("dave")).await.unwrap();
    assert!(other.get_item(item.id).unwrap().data_equals(&item));
}

#[tokio::test]
async fn test_other_user_gets_a_fresh_replica() {
    let server = server();
    let client = new_client(&server);

    client.sign_up(credentials("erin")).await.unwrap();
    client
        .create_item(Item::new(Payload::Text("erin's".to_string())))
        .await
        .unwrap();
    client.log_out().await.unwrap();

    client.sign_up(credentials("frank")).await.unwrap();
    assert!(client.items().unwrap().is_empty());
    client.log_out().await.unwrap();
}

#[tokio::test]
async fn test_wrong_password_keeps_client_idle() {
    let server = server();
    server.sign_up(credentials("gina")).await.unwrap();
    let client = new_client(&server);

    let result = client
        .log_in(Credentials::new("gina", "not the password"))
        .await;
    assert!(matches!(result, Err(SyncError::Rpc(_))));
    assert!(!client.is_active().await);
}
