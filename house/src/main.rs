mod sim;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use smarthome_common::protocol::{
    decode_set_state, encode_state_update, ACK, CMD_GET_STATE, CMD_SET_STATE,
};
use smarthome_common::DEFAULT_HOUSE_PORT;

use crate::sim::HouseState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut house = match std::env::var("HOUSE_INITIAL_STATE") {
        Ok(path) => {
            let raw = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("could not read initial state file {path}"))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("invalid initial state in {path}"))?
        }
        Err(_) => HouseState::default(),
    };

    let bind = std::env::var("HOUSE_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("HOUSE_PORT")
        .unwrap_or_else(|_| DEFAULT_HOUSE_PORT.to_string())
        .parse()
        .context("HOUSE_PORT must be a port number")?;

    let listener = TcpListener::bind((bind.as_str(), port))
        .await
        .with_context(|| format!("could not bind {bind}:{port}"))?;
    info!(%bind, port, "house listening");

    // One controller at a time, matching the real hardware.
    loop {
        let (stream, peer) = listener.accept().await.context("accept failed")?;
        info!(%peer, "controller connected");
        if let Err(err) = serve(stream, &mut house).await {
            warn!(%peer, error = %err, "controller session ended");
        } else {
            info!(%peer, "controller disconnected");
        }
    }
}

async fn serve(stream: TcpStream, house: &mut HouseState) -> anyhow::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = reader.read_until(b'.', &mut buf).await?;
        if read == 0 {
            return Ok(());
        }
        let frame = String::from_utf8_lossy(&buf);
        let frame = frame.trim();

        if frame.starts_with(CMD_GET_STATE) {
            let mut response = encode_state_update(&house.to_partial());
            response.push('\n');
            write_half.write_all(response.as_bytes()).await?;
        } else if frame.starts_with(CMD_SET_STATE) {
            match decode_set_state(frame) {
                Ok(update) => {
                    house.apply(&update);
                    write_half.write_all(ACK.as_bytes()).await?;
                    write_half.write_all(b"\n").await?;
                }
                Err(err) => warn!(%frame, error = %err, "rejecting malformed set"),
            }
        } else {
            warn!(%frame, "unknown command");
        }

        // The world moves one step per request, like the real hardware's
        // sample-on-demand sensors.
        house.tick();
    }
}
