//! Predictive opponent - aims at the forecast interception point
//!
//! The controller never touches physics state. It reads the ball and its own
//! paddle and answers with a [`PaddleCommand`] for the orchestrator to apply.

use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::config::GameConfig;

use super::physics::{Ball, Paddle, PaddleCommand};
use super::Side;

/// Velocity kept per tick while waiting out the reaction delay
const HOLD_DECAY: f32 = 0.9;
/// Inside this distance of the target only micro-adjustments are made
const AIM_DEADBAND: f32 = 2.0;
/// Gain of the micro-adjustment inside the aim deadband
const FINE_GAIN: f32 = 0.5;
/// Idle paddles only re-center when further than this from the middle
const CENTER_DEADBAND: f32 = 10.0;
/// Share of the profile speed used while re-centering
const CENTER_SPEED_FACTOR: f32 = 0.6;
/// Velocity kept per tick once re-centered
const CENTER_SETTLE_DECAY: f32 = 0.5;
/// Horizontal speeds below this are treated as stalled
const MIN_APPROACH_SPEED: f32 = 0.1;

/// Preset difficulty levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

/// Tuning for the predictive controller
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifficultyProfile {
    /// Ticks between two re-aims
    pub reaction_delay: u32,
    /// Multiplier on the paddle's max velocity
    pub speed_ratio: f32,
    /// Largest offset added to a perturbed prediction
    pub error_magnitude: f32,
    /// Probability that a prediction is perturbed
    pub error_chance: f64,
}

impl DifficultyProfile {
    pub const EASY: Self = Self {
        reaction_delay: 5,
        speed_ratio: 0.75,
        error_magnitude: 30.0,
        error_chance: 0.30,
    };

    pub const NORMAL: Self = Self {
        reaction_delay: 2,
        speed_ratio: 0.95,
        error_magnitude: 15.0,
        error_chance: 0.15,
    };

    pub const HARD: Self = Self {
        reaction_delay: 0,
        speed_ratio: 1.15,
        error_magnitude: 3.0,
        error_chance: 0.005,
    };

    pub fn for_difficulty(difficulty: Difficulty) -> Self {
        match difficulty {
            Difficulty::Easy => Self::EASY,
            Difficulty::Normal => Self::NORMAL,
            Difficulty::Hard => Self::HARD,
        }
    }

    fn assert_valid(&self) {
        debug_assert!(
            (0.0..=1.0).contains(&self.error_chance),
            "error chance out of range: {}",
            self.error_chance
        );
        debug_assert!(self.error_magnitude >= 0.0, "negative error magnitude");
        debug_assert!(self.speed_ratio > 0.0, "speed ratio must be positive");
    }
}

impl From<Difficulty> for DifficultyProfile {
    fn from(difficulty: Difficulty) -> Self {
        Self::for_difficulty(difficulty)
    }
}

/// Scripted opponent for one side of the field
#[derive(Debug, Clone)]
pub struct PredictiveController {
    config: Arc<GameConfig>,
    side: Side,
    profile: DifficultyProfile,
    reaction_counter: u32,
    /// Last aimed-at height, `None` while the ball moves away
    target: Option<f32>,
    rng: ChaCha8Rng,
}

impl PredictiveController {
    pub fn new(config: Arc<GameConfig>, side: Side, profile: DifficultyProfile, seed: u64) -> Self {
        profile.assert_valid();
        Self {
            config,
            side,
            profile,
            reaction_counter: 0,
            target: None,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn profile(&self) -> &DifficultyProfile {
        &self.profile
    }

    /// Swap the tuning in place; the reaction counter keeps running
    pub fn set_profile(&mut self, profile: DifficultyProfile) {
        profile.assert_valid();
        self.profile = profile;
    }

    pub fn set_difficulty(&mut self, difficulty: Difficulty) {
        self.set_profile(difficulty.into());
    }

    /// Height the controller last aimed at
    pub fn target(&self) -> Option<f32> {
        self.target
    }

    /// Forget aim and reaction progress, e.g. after a goal
    pub fn reset(&mut self) {
        self.reaction_counter = 0;
        self.target = None;
    }

    /// Decide the command for this tick
    pub fn update(&mut self, ball: &Ball, paddle: &Paddle) -> PaddleCommand {
        self.reaction_counter += 1;
        if self.reaction_counter < self.profile.reaction_delay {
            return PaddleCommand::Coast(HOLD_DECAY);
        }
        self.reaction_counter = 0;

        let center = paddle.center_y();

        match self.predict_intercept(ball, paddle) {
            Some(predicted) => {
                let target = self.perturb(predicted);
                self.target = Some(target);

                let difference = target - center;
                if difference.abs() > AIM_DEADBAND {
                    PaddleCommand::Drive(
                        difference.signum() * paddle.max_velocity * self.profile.speed_ratio,
                    )
                } else {
                    PaddleCommand::Drive(difference * FINE_GAIN)
                }
            }
            None => {
                self.target = None;

                let difference = self.config.field_height / 2.0 - center;
                if difference.abs() > CENTER_DEADBAND {
                    PaddleCommand::Drive(
                        difference.signum()
                            * paddle.max_velocity
                            * self.profile.speed_ratio
                            * CENTER_SPEED_FACTOR,
                    )
                } else {
                    PaddleCommand::Coast(CENTER_SETTLE_DECAY)
                }
            }
        }
    }

    /// Whole ticks until the ball reaches the paddle face, if it is approaching
    pub fn time_to_contact(&self, ball: &Ball, paddle: &Paddle) -> Option<u32> {
        let approaching = match self.side {
            Side::Left => ball.vel_x < 0.0,
            Side::Right => ball.vel_x > 0.0,
        };
        if !approaching {
            return None;
        }

        let distance = match self.side {
            Side::Left => ball.x - (paddle.x + paddle.width),
            Side::Right => paddle.x - ball.x,
        };
        let speed = ball.vel_x.abs();
        if distance <= 0.0 || speed < MIN_APPROACH_SPEED {
            return None;
        }

        Some((distance / speed) as u32 + 1)
    }

    /// Forecast the ball height at the paddle face by replaying wall bounces.
    ///
    /// Pure: the ball is not modified.
    pub fn predict_intercept(&self, ball: &Ball, paddle: &Paddle) -> Option<f32> {
        let ticks = self.time_to_contact(ball, paddle)?;
        let height = self.config.field_height;

        let mut y = ball.y;
        let mut vel_y = ball.vel_y;
        for _ in 0..ticks {
            y += vel_y;
            if y < 0.0 {
                y = -y;
                vel_y = -vel_y;
            } else if y > height {
                y = 2.0 * height - y;
                vel_y = -vel_y;
            }
        }

        Some(y)
    }

    fn perturb(&mut self, predicted: f32) -> f32 {
        let chance = self.profile.error_chance;
        if chance <= 0.0 || !self.rng.gen_bool(chance) {
            return predicted;
        }
        let magnitude = self.profile.error_magnitude;
        predicted + self.rng.gen_range(-magnitude..=magnitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(profile: DifficultyProfile) -> (PredictiveController, Paddle, Ball) {
        let config = Arc::new(GameConfig::default());
        let controller = PredictiveController::new(config.clone(), Side::Right, profile, 42);
        let paddle = Paddle::new(&config, Side::Right);
        let ball = Ball::new(&config);
        (controller, paddle, ball)
    }

    fn exact(profile: DifficultyProfile) -> DifficultyProfile {
        DifficultyProfile {
            error_chance: 0.0,
            ..profile
        }
    }

    #[test]
    fn presets_match_difficulty_levels() {
        assert_eq!(DifficultyProfile::for_difficulty(Difficulty::Hard).reaction_delay, 0);
        assert_eq!(DifficultyProfile::from(Difficulty::Normal).speed_ratio, 0.95);
        assert_eq!(DifficultyProfile::EASY.error_chance, 0.30);
        assert_eq!(Difficulty::default(), Difficulty::Normal);
    }

    #[test]
    fn straight_ball_predicts_current_height() {
        let (controller, paddle, mut ball) = setup(exact(DifficultyProfile::HARD));
        ball.x = paddle.x - 608.0;
        ball.y = 200.0;
        ball.vel_x = 5.0;
        ball.vel_y = 0.0;

        assert_eq!(controller.time_to_contact(&ball, &paddle), Some(122));
        assert_eq!(controller.predict_intercept(&ball, &paddle), Some(200.0));
    }

    #[test]
    fn prediction_replays_wall_bounce() {
        let (controller, paddle, mut ball) = setup(exact(DifficultyProfile::HARD));
        ball.x = paddle.x - 100.0;
        ball.y = 700.0;
        ball.vel_x = 5.0;
        ball.vel_y = 5.0;

        // 21 ticks: 700 + 105 = 805, folded back at 720
        assert_eq!(controller.predict_intercept(&ball, &paddle), Some(635.0));
        assert_eq!(ball.y, 700.0);
    }

    #[test]
    fn receding_ball_has_no_target() {
        let (controller, paddle, mut ball) = setup(DifficultyProfile::HARD);
        ball.vel_x = -9.0;
        assert_eq!(controller.predict_intercept(&ball, &paddle), None);

        ball.vel_x = 0.05;
        assert_eq!(controller.predict_intercept(&ball, &paddle), None);
    }

    #[test]
    fn left_side_measures_from_paddle_face() {
        let config = Arc::new(GameConfig::default());
        let controller =
            PredictiveController::new(config.clone(), Side::Left, DifficultyProfile::HARD, 1);
        let paddle = Paddle::new(&config, Side::Left);
        let mut ball = Ball::new(&config);
        ball.x = paddle.x + paddle.width + 90.0;
        ball.vel_x = -9.0;

        assert_eq!(controller.time_to_contact(&ball, &paddle), Some(11));
    }

    #[test]
    fn noiseless_target_is_the_prediction() {
        let (mut controller, paddle, mut ball) = setup(exact(DifficultyProfile::EASY));
        ball.x = 400.0;
        ball.y = 120.0;
        ball.vel_x = 7.0;
        ball.vel_y = -6.0;
        let predicted = controller.predict_intercept(&ball, &paddle);

        for _ in 0..DifficultyProfile::EASY.reaction_delay {
            controller.update(&ball, &paddle);
        }
        assert_eq!(controller.target(), predicted);
    }

    #[test]
    fn reaction_delay_holds_with_decay() {
        let (mut controller, paddle, mut ball) = setup(exact(DifficultyProfile::NORMAL));
        ball.x = 600.0;
        ball.y = 100.0;
        ball.vel_x = 9.0;

        assert_eq!(controller.update(&ball, &paddle), PaddleCommand::Coast(HOLD_DECAY));
        let command = controller.update(&ball, &paddle);
        assert_eq!(command, PaddleCommand::Drive(-8.0 * 0.95));
        assert_eq!(controller.update(&ball, &paddle), PaddleCommand::Coast(HOLD_DECAY));
    }

    #[test]
    fn near_target_uses_micro_adjustment() {
        let (mut controller, paddle, mut ball) = setup(exact(DifficultyProfile::HARD));
        ball.x = 600.0;
        ball.y = paddle.center_y() + 1.0;
        ball.vel_x = 9.0;
        ball.vel_y = 0.0;

        assert_eq!(controller.update(&ball, &paddle), PaddleCommand::Drive(0.5));
    }

    #[test]
    fn idle_paddle_drifts_back_to_center() {
        let (mut controller, mut paddle, mut ball) = setup(exact(DifficultyProfile::HARD));
        ball.vel_x = -9.0;

        paddle.y = 0.0;
        let expected = 8.0 * 1.15 * CENTER_SPEED_FACTOR;
        assert_eq!(controller.update(&ball, &paddle), PaddleCommand::Drive(expected));
        assert_eq!(controller.target(), None);

        paddle.y = 360.0 - 45.0 + 5.0;
        assert_eq!(
            controller.update(&ball, &paddle),
            PaddleCommand::Coast(CENTER_SETTLE_DECAY)
        );
    }

    #[test]
    fn perturbed_target_stays_within_error_band() {
        let profile = DifficultyProfile {
            error_chance: 1.0,
            ..DifficultyProfile::HARD
        };
        let (mut controller, paddle, mut ball) = setup(profile);
        ball.x = 600.0;
        ball.y = 300.0;
        ball.vel_x = 9.0;

        for _ in 0..50 {
            controller.update(&ball, &paddle);
            let target = controller.target().unwrap();
            assert!((target - 300.0).abs() <= 3.0);
        }
    }

    #[test]
    fn difficulty_swaps_without_rebuilding() {
        let (mut controller, _, _) = setup(DifficultyProfile::EASY);
        controller.set_difficulty(Difficulty::Hard);
        assert_eq!(controller.profile(), &DifficultyProfile::HARD);
        assert_eq!(controller.side(), Side::Right);
    }
}
