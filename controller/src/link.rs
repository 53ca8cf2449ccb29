use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

use smarthome_common::protocol::{
    self, decode_state_update, encode_get_state, encode_set_state,
};
use smarthome_common::{PartialState, ProtocolError};

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("house i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("house did not respond in time")]
    Timeout,
    #[error("house closed the connection")]
    Closed,
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// A socket to one house. Requests are `.`-terminated frames with no
/// newline; every request is answered by exactly one response line. The
/// link holds a single in-flight request at a time, so callers must
/// serialize access (the control manager's lock does).
pub struct HouseLink {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    read_timeout: Duration,
}

impl HouseLink {
    pub async fn connect(
        address: &str,
        port: u16,
        read_timeout: Duration,
    ) -> Result<Self, LinkError> {
        let stream = timeout(read_timeout, TcpStream::connect((address, port)))
            .await
            .map_err(|_| LinkError::Timeout)??;
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            read_timeout,
        })
    }

    /// Fetch the current device state (`GS` / `SU` exchange).
    pub async fn get_state(&mut self) -> Result<PartialState, LinkError> {
        let response = self.request(&encode_get_state()).await?;
        Ok(decode_state_update(&response)?)
    }

    /// Push a state change (`SS` exchange). `Ok(true)` iff acknowledged.
    pub async fn set_state(&mut self, state: &PartialState) -> Result<bool, LinkError> {
        let response = self.request(&encode_set_state(state)).await?;
        Ok(protocol::is_ack(&response))
    }

    async fn request(&mut self, frame: &str) -> Result<String, LinkError> {
        self.writer.write_all(frame.as_bytes()).await?;
        self.writer.flush().await?;

        let mut line = String::new();
        let read = timeout(self.read_timeout, self.reader.read_line(&mut line))
            .await
            .map_err(|_| LinkError::Timeout)??;
        if read == 0 {
            return Err(LinkError::Closed);
        }
        Ok(line)
    }
}
