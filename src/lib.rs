//! Pong Duel - two-paddle ball game core
//!
//! - `game`: ball and paddle physics, the predictive opponent, scoring and
//!   the match orchestrator
//! - `net`: host/guest tick synchronisation over TCP
//! - `config`: tunables loaded from the environment

pub mod config;
pub mod game;
pub mod net;
pub mod util;
