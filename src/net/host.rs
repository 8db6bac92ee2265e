//! Host side: accept two guests, then relay their latest payloads every tick

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::NetConfig;

use super::peer::{receive_loop, NetPeer};
use super::wire::{encode_frame, write_frame, FrameReader};
use super::{Broadcast, Role, Slot, TransportError, MAX_PEERS};

/// Handle to a running sync host
pub struct Host {
    local_addr: SocketAddr,
    running: Arc<AtomicBool>,
    connected: Arc<AtomicUsize>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Host {
    /// Bind the listening socket and start accepting guests
    pub async fn start(config: Arc<NetConfig>) -> Result<Self, TransportError> {
        let addr = config.bind_addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TransportError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        let running = Arc::new(AtomicBool::new(true));
        let connected = Arc::new(AtomicUsize::new(0));

        let host_loop = HostLoop {
            config,
            running: running.clone(),
            connected: connected.clone(),
            peers: BTreeMap::new(),
        };
        let task = tokio::spawn(host_loop.run(listener));

        info!(addr = %local_addr, "Sync host listening");

        Ok(Self {
            local_addr,
            running,
            connected,
            task: Mutex::new(Some(task)),
        })
    }

    /// Address actually bound (resolves port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Guests currently connected
    pub fn connected_count(&self) -> usize {
        self.connected.load(Ordering::Acquire)
    }

    /// Stop all loops and close every connection. Safe to call repeatedly.
    pub fn stop(&self) {
        let was_running = self.running.swap(false, Ordering::AcqRel);
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        self.connected.store(0, Ordering::Release);
        if was_running {
            info!(addr = %self.local_addr, "Sync host stopped");
        }
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        self.stop();
    }
}

/// An accepted guest as seen from the host
struct PeerLink {
    peer: NetPeer<Value>,
    addr: SocketAddr,
    writer: OwnedWriteHalf,
    reader: JoinHandle<()>,
    /// Last payload drained from the inbox; reused until a newer one arrives
    latest: Option<Value>,
}

impl Drop for PeerLink {
    fn drop(&mut self) {
        self.peer.mark_dead();
        self.reader.abort();
    }
}

/// State owned by the host task (single writer)
struct HostLoop {
    config: Arc<NetConfig>,
    running: Arc<AtomicBool>,
    connected: Arc<AtomicUsize>,
    peers: BTreeMap<Slot, PeerLink>,
}

impl HostLoop {
    async fn run(mut self, listener: TcpListener) {
        self.accept_peers(listener).await;

        if self.is_running() && self.peers.len() == MAX_PEERS {
            info!("Both guests connected, starting sync loop");
            self.sync_loop().await;
        }

        self.shutdown().await;
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Accept until both slots hold a live guest. The listener is dropped on
    /// return, so later connection attempts are refused.
    async fn accept_peers(&mut self, listener: TcpListener) {
        while self.is_running() && self.live_peers() < MAX_PEERS {
            match timeout(self.config.accept_poll, listener.accept()).await {
                Err(_) => continue,
                Ok(Err(e)) => {
                    warn!(error = %e, "Incoming connection failure");
                }
                Ok(Ok((stream, addr))) => {
                    // a guest may have left while we were waiting
                    self.drop_dead_peers();
                    let Some(slot) = self.vacant_slot() else {
                        break;
                    };
                    if let Err(e) = self.admit(stream, addr, slot).await {
                        warn!(addr = %addr, slot, error = %e, "Failed to admit guest");
                    }
                }
            }
        }
    }

    /// Guests still connected, after pruning dead links
    fn live_peers(&mut self) -> usize {
        self.drop_dead_peers();
        self.peers.len()
    }

    fn vacant_slot(&self) -> Option<Slot> {
        (1..=MAX_PEERS as Slot).find(|slot| !self.peers.contains_key(slot))
    }

    /// Send the slot assignment and start the guest's receive task
    async fn admit(
        &mut self,
        stream: TcpStream,
        addr: SocketAddr,
        slot: Slot,
    ) -> Result<(), TransportError> {
        stream.set_nodelay(true)?;
        let (read_half, mut writer) = stream.into_split();

        let limit = self.config.buffer_size;
        timeout(self.config.timeout, write_frame(&mut writer, &slot, limit))
            .await
            .map_err(|_| TransportError::ConnectionTimeout)??;

        let peer = NetPeer::new(Role::Host, slot);
        let reader = tokio::spawn(receive_loop(
            FrameReader::new(read_half, limit),
            peer.clone(),
            self.config.timeout,
        ));

        self.peers.insert(
            slot,
            PeerLink {
                peer,
                addr,
                writer,
                reader,
                latest: None,
            },
        );
        self.publish_count();

        info!(addr = %addr, slot, connected = self.peers.len(), "Guest connected");
        Ok(())
    }

    /// Relay loop: drain every inbox, then broadcast one combined state
    async fn sync_loop(&mut self) {
        let mut ticker = interval(self.config.sync_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while self.is_running() && !self.peers.is_empty() {
            ticker.tick().await;

            for link in self.peers.values_mut() {
                if let Some(payload) = link.peer.take_latest() {
                    link.latest = Some(payload);
                }
            }
            self.drop_dead_peers();

            let state = self.combined_state();
            let frame = match encode_frame(&state, self.config.buffer_size) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(error = %e, "Skipping broadcast");
                    continue;
                }
            };
            self.broadcast(frame).await;
        }

        debug!("Sync loop finished");
    }

    /// Latest payload per slot; vacant slots map to null
    fn combined_state(&self) -> Broadcast<Value> {
        (1..=MAX_PEERS as Slot)
            .map(|slot| {
                let payload = self.peers.get(&slot).and_then(|link| link.latest.clone());
                (slot, payload)
            })
            .collect()
    }

    async fn broadcast(&mut self, frame: Bytes) {
        let send_timeout = self.config.timeout;
        let mut failed = Vec::new();

        for (slot, link) in self.peers.iter_mut() {
            match timeout(send_timeout, link.writer.write_all(&frame)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(slot = *slot, error = %e, "Broadcast send failed");
                    failed.push(*slot);
                }
                Err(_) => {
                    warn!(slot = *slot, "Broadcast send timed out");
                    failed.push(*slot);
                }
            }
        }

        for slot in failed {
            self.remove_peer(slot);
        }
    }

    fn drop_dead_peers(&mut self) {
        let dead: Vec<Slot> = self
            .peers
            .iter()
            .filter(|(_, link)| !link.peer.is_alive())
            .map(|(slot, _)| *slot)
            .collect();
        for slot in dead {
            self.remove_peer(slot);
        }
    }

    fn remove_peer(&mut self, slot: Slot) {
        if let Some(link) = self.peers.remove(&slot) {
            info!(addr = %link.addr, slot, "Guest disconnected, slot vacant");
            self.publish_count();
        }
    }

    fn publish_count(&self) {
        self.connected.store(self.peers.len(), Ordering::Release);
    }

    async fn shutdown(&mut self) {
        self.running.store(false, Ordering::Release);
        for (_, mut link) in std::mem::take(&mut self.peers) {
            let _ = link.writer.shutdown().await;
        }
        self.publish_count();
        info!("Sync host closed all connections");
    }
}
