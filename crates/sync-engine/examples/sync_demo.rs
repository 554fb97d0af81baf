// crates/sync-engine/examples/sync_demo.rs
//! Two devices of one user syncing through an in-process server
//!
//! Settings come from the VaultSync config file (`VAULTSYNC_CONFIG_DIR`
//! or the platform config directory) plus `VAULTSYNC_*` overrides, e.g.
//! `VAULTSYNC_CLIENT_PULL_INTERVAL_MS=200 VAULTSYNC_CLIENT_PUSH_INTERVAL_MS=100`.

use std::sync::Arc;
use std::time::Duration;
use vaultsync_config::{Config, ConfigManager};
use vaultsync_core::{Credentials, Item, Payload, VaultTransport};
use vaultsync_server::{MemoryStorage, ServerSettings, VaultServer};
use vaultsync_sync_engine::{ConflictStrategy, SyncConfig, SyncError, VaultClient};

#[tokio::main]
async fn main() -> Result<(), SyncError> {
    let settings = load_config();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(settings.app.log_level.to_string()),
    )
    .init();

    println!("VaultSync Demo");
    println!("==============\n");

    let server: Arc<dyn VaultTransport> = Arc::new(VaultServer::new(
        Arc::new(MemoryStorage::new()),
        &ServerSettings::from_config(&settings.server),
    ));
    let config = SyncConfig::from_client_config(&settings.client);
    // One push from a device plus one pull on the other
    let settle = config.push_interval + config.pull_interval + Duration::from_millis(200);
    println!("Waiting {:?} per sync round\n", settle);

    let laptop = VaultClient::new(
        server.clone(),
        Arc::new(ConflictStrategy::UseLocal),
        config.clone(),
    );
    let phone = VaultClient::new(server, Arc::new(ConflictStrategy::UseRemote), config);
    let credentials = Credentials::new("demo", "demo-password");

    println!("1. Laptop signs up and stores a password");
    laptop.sign_up(credentials.clone()).await?;
    let item = Item::new(Payload::Password("correct horse".to_string())).with_meta("mail");
    let id = laptop.create_item(item).await?;
    tokio::time::sleep(settle).await;

    println!("2. Phone logs in and sees it");
    phone.log_in(credentials).await?;
    let on_phone = phone.get_item(id)?;
    println!("   {} at version {}", on_phone.meta.as_str(), on_phone.version);

    println!("3. Both edit the same item");
    let mut edit = on_phone.clone();
    edit.payload = Some(Payload::Password("from the phone".to_string()));
    phone.update_item(edit).await?;

    let mut edit = laptop.get_item(id)?;
    edit.payload = Some(Payload::Password("from the laptop".to_string()));
    laptop.update_item(edit).await?;
    tokio::time::sleep(settle * 2).await;

    for (name, client) in [("laptop", &laptop), ("phone", &phone)] {
        let item = client.get_item(id)?;
        println!("   {}: {:?} at version {}", name, item.payload, item.version);
    }

    laptop.log_out().await?;
    phone.log_out().await?;
    println!("\nDone");
    Ok(())
}

fn load_config() -> Config {
    match ConfigManager::from_env().and_then(|manager| manager.load_with_env_overrides()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Config unavailable ({}), using defaults", e);
            Config::default()
        }
    }
}
