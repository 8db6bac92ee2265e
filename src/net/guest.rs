//! Guest side: connect, learn the slot, then send local state and poll broadcasts

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::config::NetConfig;

use super::peer::{receive_loop, NetPeer};
use super::wire::{write_frame, FrameReader};
use super::{Broadcast, Role, Slot, TransportError, MAX_PEERS};

/// Connection from a guest to the sync host
pub struct Guest<T> {
    config: Arc<NetConfig>,
    peer: NetPeer<Broadcast<T>>,
    writer: Option<OwnedWriteHalf>,
    receiver: Option<JoinHandle<()>>,
}

impl<T> Guest<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    /// Connect to `host:port` and wait (bounded by the configured timeout)
    /// for the slot assignment before starting the background receiver
    pub async fn connect(
        config: Arc<NetConfig>,
        host: &str,
        port: u16,
    ) -> Result<Self, TransportError> {
        let addr = format!("{host}:{port}");

        let stream = timeout(config.timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| TransportError::ConnectionTimeout)??;
        stream.set_nodelay(true)?;

        let (read_half, writer) = stream.into_split();
        let mut reader = FrameReader::new(read_half, config.buffer_size);

        let slot: Slot = timeout(config.timeout, reader.read_frame())
            .await
            .map_err(|_| TransportError::ConnectionTimeout)??;
        if slot == 0 || slot as usize > MAX_PEERS {
            return Err(TransportError::InvalidSlot(slot));
        }

        let peer = NetPeer::new(Role::Guest, slot);
        let receiver = tokio::spawn(receive_loop(reader, peer.clone(), config.timeout));

        info!(addr = %addr, slot, "Connected to sync host");

        Ok(Self {
            config,
            peer,
            writer: Some(writer),
            receiver: Some(receiver),
        })
    }

    /// Slot assigned by the host
    pub fn slot(&self) -> Slot {
        self.peer.slot()
    }

    pub fn is_connected(&self) -> bool {
        self.writer.is_some() && self.peer.is_alive()
    }

    /// Newest broadcast since the last call; never blocks
    pub fn try_recv(&self) -> Option<Broadcast<T>> {
        self.peer.take_latest()
    }

    /// Send this guest's payload for the current tick
    pub async fn send(&mut self, payload: &T) -> Result<(), TransportError> {
        if !self.peer.is_alive() {
            self.disconnect();
            return Err(TransportError::Closed);
        }
        let Some(writer) = self.writer.as_mut() else {
            return Err(TransportError::Closed);
        };

        let result = timeout(
            self.config.timeout,
            write_frame(writer, payload, self.config.buffer_size),
        )
        .await
        .map_err(|_| TransportError::ConnectionTimeout)
        .and_then(|sent| sent);

        if let Err(e) = &result {
            warn!(slot = self.slot(), error = %e, "Send failed, disconnecting");
            self.disconnect();
        }
        result
    }

    /// Close the connection and stop the receiver. Safe to call repeatedly.
    pub fn disconnect(&mut self) {
        self.peer.mark_dead();
        if let Some(receiver) = self.receiver.take() {
            receiver.abort();
        }
        // dropping the write half shuts down the write direction
        if self.writer.take().is_some() {
            info!(slot = self.slot(), "Disconnected from sync host");
        }
    }
}

impl<T> Drop for Guest<T> {
    fn drop(&mut self) {
        self.peer.mark_dead();
        if let Some(receiver) = self.receiver.take() {
            receiver.abort();
        }
    }
}
