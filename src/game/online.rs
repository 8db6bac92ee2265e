//! Networked match: a local [`GameMatch`] fed by a sync guest connection

use std::sync::Arc;

use tracing::warn;

use crate::config::GameConfig;
use crate::net::{Guest, TransportError};

use super::r#match::{GameMatch, MatchEvent, MatchMode, MatchPhase};
use super::{PaddleState, Side};

/// A match whose opponent paddle follows the sync host
pub struct OnlineMatch {
    game: GameMatch,
    guest: Guest<PaddleState>,
    local: Side,
}

impl OnlineMatch {
    /// Build the match for the slot the host assigned to `guest`
    pub fn new(
        config: Arc<GameConfig>,
        guest: Guest<PaddleState>,
        win_score: u32,
        seed: u64,
    ) -> Result<Self, TransportError> {
        let local = Side::from_slot(guest.slot()).ok_or(TransportError::InvalidSlot(guest.slot()))?;
        let game = GameMatch::new(config, MatchMode::Online { local }, win_score, seed);
        Ok(Self { game, guest, local })
    }

    pub fn game(&self) -> &GameMatch {
        &self.game
    }

    pub fn game_mut(&mut self) -> &mut GameMatch {
        &mut self.game
    }

    pub fn local_side(&self) -> Side {
        self.local
    }

    pub fn is_connected(&self) -> bool {
        self.guest.is_connected()
    }

    /// Apply the newest broadcast, advance one tick and publish the local
    /// paddle. A dead link freezes the match in `Disconnected`.
    pub async fn tick(&mut self) -> Vec<MatchEvent> {
        if !self.guest.is_connected() {
            return self.lose_connection();
        }

        if let Some(broadcast) = self.guest.try_recv() {
            self.game.apply_broadcast(&broadcast);
        }

        let mut events = self.game.tick();

        let state = self.game.local_state(self.local);
        if let Err(e) = self.guest.send(&state).await {
            warn!(side = ?self.local, error = %e, "Lost sync host");
            events.extend(self.lose_connection());
        }
        events
    }

    /// Leave the session; the match stays frozen afterwards
    pub fn leave(&mut self) {
        self.guest.disconnect();
        self.game.mark_disconnected();
    }

    fn lose_connection(&mut self) -> Vec<MatchEvent> {
        match self.game.phase() {
            MatchPhase::Disconnected | MatchPhase::Ended => Vec::new(),
            _ => {
                self.game.mark_disconnected();
                vec![MatchEvent::ConnectionLost]
            }
        }
    }
}
