use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use smarthome_common::{ControllerConfig, DEFAULT_HOUSE_PORT};
use smarthome_controller::{ControlManager, UserLogin};

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let address = env_or("HOUSE_ADDR", "127.0.0.1");
    let port: u16 = env_or("HOUSE_PORT", &DEFAULT_HOUSE_PORT.to_string())
        .parse()
        .context("HOUSE_PORT must be a port number")?;
    let username = env_or("HOUSE_USER", "admin");
    let password = env_or("HOUSE_PASS", "1234");

    let mut config = ControllerConfig::default();
    if let Ok(zone) = std::env::var("HOUSE_TZ") {
        config.timezone = zone;
    }

    let users = vec![UserLogin::new(&username, &password)];
    let manager = ControlManager::new(config, users);
    manager
        .connect(&address, port, &username, &password)
        .await
        .context("could not connect to house")?;
    info!(%address, port, "controller running, ctrl-c to stop");

    tokio::signal::ctrl_c()
        .await
        .context("could not listen for shutdown signal")?;

    if let Some(state) = manager.current_state().await {
        let json = serde_json::to_string_pretty(&state)?;
        info!("final house state:\n{json}");
    }
    info!(entries = manager.log_messages().await.len(), "shutting down");
    Ok(())
}
