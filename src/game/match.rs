//! Match orchestration and the per-tick simulation step

use std::sync::Arc;
use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::GameConfig;
use crate::net::Broadcast;
use crate::util::time::SimClock;

use super::ai::{Difficulty, PredictiveController};
use super::physics::{Ball, Paddle, PhysicsSystem};
use super::score::MatchState;
use super::{PaddleInput, PaddleState, Side};

/// Pause after a goal before the served ball is shown as live
const SERVE_DELAY: Duration = Duration::from_secs(1);

/// Match phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    /// Ticks advance the simulation
    InProgress,
    /// Frozen by the player
    Paused,
    /// Frozen because the network link dropped
    Disconnected,
    /// A side reached the win score; frozen until reset
    Ended,
}

/// How the two paddles are driven
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Left is local, right is the predictive controller
    SinglePlayer { difficulty: Difficulty },
    /// Both paddles are local
    LocalVersus,
    /// `local` is this endpoint's slot side, the other paddle follows the network
    Online { local: Side },
}

/// Where a paddle's commands come from
#[derive(Debug, Clone)]
pub enum ControlSource {
    /// Held input from this endpoint
    Local(PaddleInput),
    Ai(PredictiveController),
    /// Fresh remote state not yet applied; the paddle holds still without one
    Remote(Option<PaddleState>),
}

/// Something the presentation layer may react to
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchEvent {
    PaddleHit { side: Side, x: f32, y: f32 },
    Goal { scorer: Side, left: u32, right: u32 },
    MatchOver { winner: Side, left: u32, right: u32 },
    ConnectionLost,
}

/// The match orchestrator (owns all simulation state)
pub struct GameMatch {
    config: Arc<GameConfig>,
    physics: PhysicsSystem,
    mode: MatchMode,
    phase: MatchPhase,
    ball: Ball,
    paddles: [Paddle; 2],
    controls: [ControlSource; 2],
    state: MatchState,
    clock: SimClock,
    /// Ticks left in the post-goal serve pause shown to players
    serve_countdown: u64,
    rng: ChaCha8Rng,
}

impl GameMatch {
    /// Create a match; `win_score` overrides the configured default
    pub fn new(config: Arc<GameConfig>, mode: MatchMode, win_score: u32, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let controls = Self::controls_for(&config, mode, rng.gen());

        let mut ball = Ball::new(&config);
        ball.serve(&config, &mut rng);

        info!(?mode, win_score, "Match created");

        Self {
            physics: PhysicsSystem::new(config.clone()),
            mode,
            phase: MatchPhase::InProgress,
            ball,
            paddles: [
                Paddle::new(&config, Side::Left),
                Paddle::new(&config, Side::Right),
            ],
            controls,
            state: MatchState::new(win_score),
            clock: SimClock::new(config.tick_rate),
            serve_countdown: 0,
            rng,
            config,
        }
    }

    fn controls_for(config: &Arc<GameConfig>, mode: MatchMode, ai_seed: u64) -> [ControlSource; 2] {
        let local = || ControlSource::Local(PaddleInput::Idle);
        match mode {
            MatchMode::SinglePlayer { difficulty } => [
                local(),
                ControlSource::Ai(PredictiveController::new(
                    config.clone(),
                    Side::Right,
                    difficulty.into(),
                    ai_seed,
                )),
            ],
            MatchMode::LocalVersus => [local(), local()],
            MatchMode::Online { local: Side::Left } => [local(), ControlSource::Remote(None)],
            MatchMode::Online { local: Side::Right } => [ControlSource::Remote(None), local()],
        }
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn ball(&self) -> &Ball {
        &self.ball
    }

    /// Direct ball access for serve overrides and scripted scenarios
    pub fn ball_mut(&mut self) -> &mut Ball {
        &mut self.ball
    }

    pub fn paddle(&self, side: Side) -> &Paddle {
        &self.paddles[side.index()]
    }

    pub fn control(&self, side: Side) -> &ControlSource {
        &self.controls[side.index()]
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn tick_count(&self) -> u64 {
        self.clock.tick()
    }

    pub fn serve_countdown(&self) -> u64 {
        self.serve_countdown
    }

    /// Winner once the match has ended
    pub fn winner(&self) -> Option<Side> {
        match self.phase {
            MatchPhase::Ended => self.state.winner(),
            _ => None,
        }
    }

    /// Hold `input` for a locally controlled side. Returns false if the side
    /// is not local.
    pub fn set_input(&mut self, side: Side, input: PaddleInput) -> bool {
        match &mut self.controls[side.index()] {
            ControlSource::Local(held) => {
                *held = input;
                true
            }
            _ => false,
        }
    }

    /// Queue a remote paddle state for the next tick. Returns false if the
    /// side is not remote.
    pub fn apply_remote(&mut self, side: Side, update: PaddleState) -> bool {
        match &mut self.controls[side.index()] {
            ControlSource::Remote(pending) => {
                *pending = Some(update);
                true
            }
            _ => false,
        }
    }

    /// Apply every remote slot present in a host broadcast
    pub fn apply_broadcast(&mut self, broadcast: &Broadcast<PaddleState>) {
        for (slot, update) in broadcast {
            let (Some(side), Some(update)) = (Side::from_slot(*slot), update) else {
                continue;
            };
            self.apply_remote(side, *update);
        }
    }

    /// Payload this endpoint contributes for `side`
    pub fn local_state(&self, side: Side) -> PaddleState {
        PaddleState::from(self.paddle(side))
    }

    /// Swap the opponent difficulty. Returns false if no side is AI driven.
    pub fn set_difficulty(&mut self, difficulty: Difficulty) -> bool {
        let mut swapped = false;
        for control in self.controls.iter_mut() {
            if let ControlSource::Ai(controller) = control {
                controller.set_difficulty(difficulty);
                swapped = true;
            }
        }
        if swapped {
            if let MatchMode::SinglePlayer { difficulty: current } = &mut self.mode {
                *current = difficulty;
            }
            info!(?difficulty, "Opponent difficulty changed");
        }
        swapped
    }

    /// Pause or resume; ended and disconnected matches are left alone
    pub fn toggle_pause(&mut self) -> MatchPhase {
        self.phase = match self.phase {
            MatchPhase::InProgress => MatchPhase::Paused,
            MatchPhase::Paused => MatchPhase::InProgress,
            other => other,
        };
        self.phase
    }

    /// Freeze the match after the network link dropped
    pub fn mark_disconnected(&mut self) {
        if self.phase != MatchPhase::Ended {
            self.phase = MatchPhase::Disconnected;
        }
    }

    /// Advance the match by one tick
    pub fn tick(&mut self) -> Vec<MatchEvent> {
        let mut events = Vec::new();
        if self.phase != MatchPhase::InProgress {
            return events;
        }

        self.clock.advance();
        let now_ms = self.clock.now_millis();
        self.state.tick();
        self.serve_countdown = self.serve_countdown.saturating_sub(1);

        for side in Side::BOTH {
            self.drive_paddle(side);
        }

        self.physics.step(&mut self.ball);

        for side in Side::BOTH {
            let paddle = &self.paddles[side.index()];
            if self
                .physics
                .resolve_paddle_collision(&mut self.ball, paddle, side, now_ms)
            {
                events.push(MatchEvent::PaddleHit {
                    side,
                    x: self.ball.x,
                    y: self.ball.y,
                });
            }
        }

        if let Some(scorer) = self.physics.scoring_side(&self.ball) {
            self.state.award(scorer);
            let (left, right) = (self.state.score(Side::Left), self.state.score(Side::Right));
            debug!(?scorer, left, right, "Goal");
            events.push(MatchEvent::Goal { scorer, left, right });

            self.serve();

            if let Some(winner) = self.state.winner() {
                self.phase = MatchPhase::Ended;
                info!(?winner, left, right, "Match over");
                events.push(MatchEvent::MatchOver {
                    winner,
                    left,
                    right,
                });
            }
        }

        events
    }

    /// Start a fresh match with the same mode and win score
    pub fn reset(&mut self) {
        self.state.reset();
        self.clock.reset();
        for side in Side::BOTH {
            self.paddles[side.index()].reset(&self.config);
            match &mut self.controls[side.index()] {
                ControlSource::Local(input) => *input = PaddleInput::Idle,
                ControlSource::Ai(controller) => controller.reset(),
                ControlSource::Remote(pending) => *pending = None,
            }
        }
        self.ball.serve(&self.config, &mut self.rng);
        self.serve_countdown = 0;
        self.phase = MatchPhase::InProgress;
        info!(mode = ?self.mode, "Match reset");
    }

    fn drive_paddle(&mut self, side: Side) {
        let paddle = &mut self.paddles[side.index()];
        match &mut self.controls[side.index()] {
            ControlSource::Local(input) => {
                let command = input.to_command(paddle);
                self.physics.apply_command(paddle, command);
            }
            ControlSource::Ai(controller) => {
                let command = controller.update(&self.ball, paddle);
                self.physics.apply_command(paddle, command);
            }
            ControlSource::Remote(pending) => {
                if let Some(update) = pending.take() {
                    self.physics.place_paddle(paddle, update.y, update.velocity);
                }
            }
        }
    }

    /// Re-center the ball with a fresh serve after a goal
    fn serve(&mut self) {
        self.ball.serve(&self.config, &mut self.rng);
        for control in self.controls.iter_mut() {
            if let ControlSource::Ai(controller) = control {
                controller.reset();
            }
        }
        self.serve_countdown = self.clock.ticks_for(SERVE_DELAY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_player(win_score: u32) -> GameMatch {
        let config = Arc::new(GameConfig::default());
        GameMatch::new(
            config,
            MatchMode::SinglePlayer {
                difficulty: Difficulty::Normal,
            },
            win_score,
            11,
        )
    }

    fn push_out_left(game: &mut GameMatch) {
        let ball = game.ball_mut();
        ball.x = -1.0;
        ball.y = 360.0;
        ball.vel_x = -9.0;
        ball.vel_y = 0.0;
    }

    #[test]
    fn modes_pick_control_sources() {
        let config = Arc::new(GameConfig::default());
        let game = GameMatch::new(config.clone(), MatchMode::Online { local: Side::Right }, 5, 1);
        assert!(matches!(game.control(Side::Left), ControlSource::Remote(None)));
        assert!(matches!(game.control(Side::Right), ControlSource::Local(_)));

        let game = single_player(5);
        assert!(matches!(game.control(Side::Right), ControlSource::Ai(_)));
    }

    #[test]
    fn ball_past_left_edge_scores_for_right() {
        let mut game = single_player(21);
        push_out_left(&mut game);
        game.ball_mut().x = 3.0;

        let events = game.tick();
        assert!(events.contains(&MatchEvent::Goal {
            scorer: Side::Right,
            left: 0,
            right: 1,
        }));
        assert_eq!(game.ball().x, 640.0);
        assert_eq!(game.ball().y, 360.0);
        assert_eq!(game.ball().last_hit_ms(), None);
        assert_eq!(game.serve_countdown(), 60);
        assert_eq!(game.state().last_scorer(), Some(Side::Right));
    }

    #[test]
    fn match_ends_at_configured_threshold() {
        let mut game = single_player(3);
        for _ in 0..2 {
            push_out_left(&mut game);
            game.tick();
            assert_eq!(game.phase(), MatchPhase::InProgress);
        }

        push_out_left(&mut game);
        let events = game.tick();
        assert!(events.contains(&MatchEvent::MatchOver {
            winner: Side::Right,
            left: 0,
            right: 3,
        }));
        assert_eq!(game.winner(), Some(Side::Right));

        // frozen until reset
        let tick = game.tick_count();
        assert!(game.tick().is_empty());
        assert_eq!(game.tick_count(), tick);

        game.reset();
        assert_eq!(game.phase(), MatchPhase::InProgress);
        assert_eq!(game.state().score(Side::Right), 0);
        assert_eq!(game.winner(), None);
    }

    #[test]
    fn paddle_hit_is_reported() {
        let config = Arc::new(GameConfig::default());
        let mut game = GameMatch::new(config, MatchMode::LocalVersus, 5, 3);
        let center = game.paddle(Side::Left).center_y();
        let face = game.paddle(Side::Left).x + game.paddle(Side::Left).width;
        {
            let ball = game.ball_mut();
            ball.x = face + 6.0;
            ball.y = center;
            ball.vel_x = -9.0;
            ball.vel_y = 0.0;
        }

        let events = game.tick();
        assert!(matches!(
            events.as_slice(),
            [MatchEvent::PaddleHit { side: Side::Left, .. }]
        ));
        assert!(game.ball().vel_x > 0.0);
    }

    #[test]
    fn local_input_moves_paddle() {
        let config = Arc::new(GameConfig::default());
        let mut game = GameMatch::new(config, MatchMode::LocalVersus, 5, 3);
        let start = game.paddle(Side::Right).y;

        assert!(game.set_input(Side::Right, PaddleInput::Up));
        game.tick();
        assert!(game.paddle(Side::Right).y < start);
    }

    #[test]
    fn remote_state_is_applied_once_then_held() {
        let config = Arc::new(GameConfig::default());
        let mut game = GameMatch::new(config, MatchMode::Online { local: Side::Left }, 5, 3);

        let mut broadcast = Broadcast::new();
        broadcast.insert(1, Some(PaddleState { y: 0.0, velocity: 0.0 }));
        broadcast.insert(2, Some(PaddleState { y: 100.0, velocity: 3.0 }));
        game.apply_broadcast(&broadcast);
        game.tick();

        assert_eq!(game.paddle(Side::Right).y, 100.0);
        assert_eq!(game.paddle(Side::Right).velocity, 3.0);
        // the local slot's echo is ignored
        assert_eq!(game.paddle(Side::Left).y, 315.0);

        game.tick();
        assert_eq!(game.paddle(Side::Right).y, 100.0);
        assert!(!game.set_input(Side::Right, PaddleInput::Down));
    }

    #[test]
    fn pause_freezes_ticks() {
        let mut game = single_player(5);
        assert_eq!(game.toggle_pause(), MatchPhase::Paused);
        assert!(game.tick().is_empty());
        assert_eq!(game.tick_count(), 0);
        assert_eq!(game.toggle_pause(), MatchPhase::InProgress);
        game.tick();
        assert_eq!(game.tick_count(), 1);
    }

    #[test]
    fn difficulty_swap_reaches_controller() {
        let mut game = single_player(5);
        assert!(game.set_difficulty(Difficulty::Hard));
        assert_eq!(
            game.mode(),
            MatchMode::SinglePlayer {
                difficulty: Difficulty::Hard
            }
        );

        let config = Arc::new(GameConfig::default());
        let mut versus = GameMatch::new(config, MatchMode::LocalVersus, 5, 3);
        assert!(!versus.set_difficulty(Difficulty::Easy));
    }

    #[test]
    fn long_rally_keeps_invariants() {
        let mut game = single_player(1_000);
        for _ in 0..5_000 {
            game.tick();
            for side in Side::BOTH {
                let paddle = game.paddle(side);
                assert!(paddle.y >= 0.0 && paddle.y <= 720.0 - paddle.height);
            }
            let ball = game.ball();
            assert!(ball.y >= 0.0 && ball.y <= 720.0);
            assert!(ball.speed() <= 18.0 + 1e-3);
        }
    }
}
