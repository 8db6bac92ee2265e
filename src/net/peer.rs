//! Connection records and the shared receive loop

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::io::AsyncRead;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::mailbox::Mailbox;
use super::wire::FrameReader;
use super::{Role, Slot, TransportError};

/// One end of a host/guest connection.
///
/// `role` is the role of the endpoint holding the record: the host keeps one
/// `Role::Host` record per accepted guest, a guest keeps a single
/// `Role::Guest` record for its link to the host.
#[derive(Debug)]
pub struct NetPeer<T> {
    role: Role,
    slot: Slot,
    alive: Arc<AtomicBool>,
    inbox: Arc<Mailbox<T>>,
}

impl<T> NetPeer<T> {
    pub fn new(role: Role, slot: Slot) -> Self {
        Self {
            role,
            slot,
            alive: Arc::new(AtomicBool::new(true)),
            inbox: Arc::new(Mailbox::new()),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn slot(&self) -> Slot {
        self.slot
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub fn mark_dead(&self) {
        self.alive.store(false, Ordering::Release);
    }

    /// Latest received payload, if one arrived since the last call
    pub fn take_latest(&self) -> Option<T> {
        self.inbox.take()
    }

    pub fn inbox(&self) -> &Mailbox<T> {
        &self.inbox
    }
}

// Shares the liveness flag and inbox with the receive task.
impl<T> Clone for NetPeer<T> {
    fn clone(&self) -> Self {
        Self {
            role: self.role,
            slot: self.slot,
            alive: self.alive.clone(),
            inbox: self.inbox.clone(),
        }
    }
}

/// Pull frames into `peer`'s inbox until the peer dies or the link fails.
///
/// Each read is bounded by `recv_timeout`; a timeout only re-checks liveness.
pub async fn receive_loop<R, T>(mut reader: FrameReader<R>, peer: NetPeer<T>, recv_timeout: Duration)
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    while peer.is_alive() {
        match timeout(recv_timeout, reader.read_frame::<T>()).await {
            Err(_) => continue,
            Ok(Ok(payload)) => {
                if peer.inbox.put(payload) {
                    debug!(slot = peer.slot, "Unread payload overwritten");
                }
            }
            Ok(Err(TransportError::Closed)) => {
                info!(slot = peer.slot, role = ?peer.role, "Connection closed by remote");
                break;
            }
            Ok(Err(e)) => {
                warn!(slot = peer.slot, role = ?peer.role, error = %e, "Receive failed");
                break;
            }
        }
    }
    peer.mark_dead();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::wire::write_frame;

    #[tokio::test]
    async fn receive_loop_keeps_only_latest_and_dies_on_close() {
        let (mut remote, local) = tokio::io::duplex(1024);
        let peer: NetPeer<u32> = NetPeer::new(Role::Guest, 1);
        let task = tokio::spawn(receive_loop(
            FrameReader::new(local, 4096),
            peer.clone(),
            Duration::from_millis(20),
        ));

        write_frame(&mut remote, &1u32, 4096).await.unwrap();
        write_frame(&mut remote, &2u32, 4096).await.unwrap();
        drop(remote);
        task.await.unwrap();

        assert!(!peer.is_alive());
        assert_eq!(peer.take_latest(), Some(2));
        assert_eq!(peer.take_latest(), None);
    }

    #[tokio::test]
    async fn marking_dead_stops_the_loop_after_timeout() {
        let (_remote, local) = tokio::io::duplex(1024);
        let peer: NetPeer<u32> = NetPeer::new(Role::Host, 2);
        let task = tokio::spawn(receive_loop(
            FrameReader::new(local, 4096),
            peer.clone(),
            Duration::from_millis(10),
        ));

        peer.mark_dead();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("receive loop should stop")
            .unwrap();
        assert_eq!(peer.role(), Role::Host);
        assert_eq!(peer.slot(), 2);
    }
}
