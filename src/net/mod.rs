//! Host/guest tick synchronisation over TCP
//!
//! The transport never touches physics state. Guests send one opaque payload
//! per tick; the host relays the latest payload of every slot back to all
//! guests as a single [`Broadcast`].

pub mod error;
pub mod guest;
pub mod host;
pub mod mailbox;
pub mod peer;
pub mod wire;

pub use error::TransportError;
pub use guest::Guest;
pub use host::Host;
pub use mailbox::Mailbox;
pub use peer::NetPeer;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Player slot assigned by the host (1 or 2)
pub type Slot = u8;

/// Guests a host accepts before it stops listening
pub const MAX_PEERS: usize = 2;

/// Latest payload per slot; vacant or silent slots are `None`
pub type Broadcast<T> = BTreeMap<Slot, Option<T>>;

/// Which end of a connection an endpoint is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Host,
    Guest,
}
