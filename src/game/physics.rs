//! Ball and paddle kinematics, wall reflection and paddle collision resolution

use std::collections::VecDeque;
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::GameConfig;

use super::Side;

/// Per-axis velocity damping applied every step
pub const BALL_DAMPING: f32 = 0.999;
/// Speed retained after a wall bounce
pub const WALL_RESTITUTION: f32 = 0.95;
/// Gap left between the paddle face and the ball after a hit
pub const CONTACT_MARGIN: f32 = 2.0;
/// Deflection at the very top or bottom of a paddle, in degrees
pub const MAX_BOUNCE_DEGREES: f32 = 70.0;
/// Fraction of max speed a struck ball leaves with before the paddle bonus
pub const HIT_SPEED_RATIO: f32 = 0.9;
/// Extra speed granted at full paddle velocity
pub const PADDLE_SPEED_BONUS: f32 = 0.5;
/// Horizontal speed floor after a hit, as a fraction of max speed
pub const MIN_HORIZONTAL_RATIO: f32 = 0.7;

/// Vertical serve components, as multiples of the serve speed
const SERVE_VERTICAL: [f32; 4] = [-1.0, -0.5, 0.5, 1.0];

/// The ball (authoritative)
#[derive(Debug, Clone)]
pub struct Ball {
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    /// Bounding box edge length
    pub size: f32,
    trail: VecDeque<(f32, f32)>,
    trail_capacity: usize,
    /// Simulated time of the last resolved paddle hit
    last_hit_ms: Option<u64>,
}

impl Ball {
    /// A ball resting at the field center
    pub fn new(config: &GameConfig) -> Self {
        Self {
            x: config.field_width / 2.0,
            y: config.field_height / 2.0,
            vel_x: 0.0,
            vel_y: 0.0,
            size: config.ball_size,
            trail: VecDeque::with_capacity(config.trail_length),
            trail_capacity: config.trail_length,
            last_hit_ms: None,
        }
    }

    pub fn radius(&self) -> f32 {
        self.size / 2.0
    }

    pub fn speed(&self) -> f32 {
        (self.vel_x * self.vel_x + self.vel_y * self.vel_y).sqrt()
    }

    /// Recent positions, oldest first
    pub fn trail(&self) -> impl Iterator<Item = &(f32, f32)> {
        self.trail.iter()
    }

    pub fn trail_len(&self) -> usize {
        self.trail.len()
    }

    /// Re-center the ball and give it a fresh random serve
    pub fn serve<R: Rng>(&mut self, config: &GameConfig, rng: &mut R) {
        let dir_x = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
        let dir_y = *SERVE_VERTICAL.choose(rng).unwrap_or(&0.5);

        self.x = config.field_width / 2.0;
        self.y = config.field_height / 2.0;
        self.vel_x = config.ball_speed * dir_x;
        self.vel_y = config.ball_speed * dir_y;
        self.trail.clear();
        self.clear_debounce();
    }

    /// Forget the last paddle hit so the next overlap resolves immediately
    pub fn clear_debounce(&mut self) {
        self.last_hit_ms = None;
    }

    pub fn last_hit_ms(&self) -> Option<u64> {
        self.last_hit_ms
    }

    fn record_trail(&mut self) {
        if self.trail_capacity == 0 {
            return;
        }
        while self.trail.len() >= self.trail_capacity {
            self.trail.pop_front();
        }
        self.trail.push_back((self.x, self.y));
    }

    fn scale_velocity(&mut self, factor: f32) {
        self.vel_x *= factor;
        self.vel_y *= factor;
    }
}

/// A paddle (authoritative)
#[derive(Debug, Clone)]
pub struct Paddle {
    /// Left edge, fixed per side
    pub x: f32,
    /// Top edge
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub velocity: f32,
    pub acceleration: f32,
    pub max_velocity: f32,
}

impl Paddle {
    pub fn new(config: &GameConfig, side: Side) -> Self {
        let x = match side {
            Side::Left => config.left_paddle_x(),
            Side::Right => config.right_paddle_x(),
        };
        Self {
            x,
            y: config.paddle_start_y(),
            width: config.paddle_width,
            height: config.paddle_height,
            velocity: 0.0,
            acceleration: config.paddle_acceleration,
            max_velocity: config.paddle_speed,
        }
    }

    /// Vertical center of the paddle
    pub fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }

    /// Back to the vertical center, at rest
    pub fn reset(&mut self, config: &GameConfig) {
        self.y = config.paddle_start_y();
        self.velocity = 0.0;
    }
}

/// Actuation applied to a paddle for one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PaddleCommand {
    /// Ease toward a target velocity using the paddle's acceleration factor
    Steer(f32),
    /// Set the velocity outright
    Drive(f32),
    /// Scale the current velocity
    Coast(f32),
}

impl Default for PaddleCommand {
    fn default() -> Self {
        Self::Steer(0.0)
    }
}

/// Physics system for the ball and paddles
#[derive(Debug, Clone)]
pub struct PhysicsSystem {
    config: Arc<GameConfig>,
}

impl PhysicsSystem {
    pub fn new(config: Arc<GameConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Advance the ball by one tick.
    ///
    /// Leaving the field horizontally is not handled here; see [`Self::scoring_side`].
    pub fn step(&self, ball: &mut Ball) {
        debug_assert!(
            ball.vel_x.is_finite() && ball.vel_y.is_finite(),
            "non-finite ball velocity ({}, {})",
            ball.vel_x,
            ball.vel_y
        );

        ball.record_trail();

        ball.x += ball.vel_x;
        ball.y += ball.vel_y;

        ball.scale_velocity(BALL_DAMPING);
        self.enforce_min_speed(ball);

        let radius = ball.radius();
        let height = self.config.field_height;
        if ball.y - radius <= 0.0 {
            ball.y = radius;
            ball.vel_y = ball.vel_y.abs() * WALL_RESTITUTION;
            self.enforce_min_speed(ball);
        } else if ball.y + radius >= height {
            ball.y = height - radius;
            ball.vel_y = -ball.vel_y.abs() * WALL_RESTITUTION;
            self.enforce_min_speed(ball);
        }
    }

    /// Side awarded a point if the ball has left the field horizontally
    pub fn scoring_side(&self, ball: &Ball) -> Option<Side> {
        if ball.x < 0.0 {
            Some(Side::Right)
        } else if ball.x > self.config.field_width {
            Some(Side::Left)
        } else {
            None
        }
    }

    /// Bounce the ball off `paddle` if they overlap.
    ///
    /// `side` is the side the paddle defends; the ball always leaves toward the
    /// opposite side. Returns true iff a hit was resolved.
    pub fn resolve_paddle_collision(
        &self,
        ball: &mut Ball,
        paddle: &Paddle,
        side: Side,
        now_ms: u64,
    ) -> bool {
        debug_assert!(paddle.max_velocity > 0.0, "paddle max velocity must be positive");

        if !Self::overlaps(ball, paddle) {
            return false;
        }

        if let Some(last) = ball.last_hit_ms {
            if now_ms.saturating_sub(last) < self.config.collision_debounce_ms {
                return false;
            }
        }
        ball.last_hit_ms = Some(now_ms);

        let radius = ball.radius();
        ball.x = match side {
            Side::Left => paddle.x + paddle.width + radius + CONTACT_MARGIN,
            Side::Right => paddle.x - radius - CONTACT_MARGIN,
        };

        // 0.0 = top edge, 1.0 = bottom edge
        let hit = ((ball.y - paddle.y) / paddle.height).clamp(0.0, 1.0);
        let angle = ((hit - 0.5) * 2.0 * MAX_BOUNCE_DEGREES).to_radians();

        let bonus = 1.0 + (paddle.velocity.abs() / paddle.max_velocity) * PADDLE_SPEED_BONUS;
        let max_speed = self.config.max_ball_speed;
        let speed = max_speed * HIT_SPEED_RATIO * bonus;

        let away = side.away_sign();
        let mut vel_x = away * (angle.cos() * speed).abs();
        let vel_y = angle.sin() * speed;

        let min_x = max_speed * MIN_HORIZONTAL_RATIO;
        if vel_x.abs() < min_x {
            vel_x = away * min_x;
        }

        ball.vel_x = vel_x;
        ball.vel_y = vel_y;

        let speed = ball.speed();
        if speed > max_speed {
            ball.scale_velocity(max_speed / speed);
        }

        true
    }

    /// Apply one tick of actuation and keep the paddle inside the field
    pub fn apply_command(&self, paddle: &mut Paddle, command: PaddleCommand) {
        match command {
            PaddleCommand::Steer(target) => {
                paddle.velocity += (target - paddle.velocity) * paddle.acceleration;
            }
            PaddleCommand::Drive(velocity) => paddle.velocity = velocity,
            PaddleCommand::Coast(factor) => paddle.velocity *= factor,
        }
        debug_assert!(paddle.velocity.is_finite(), "non-finite paddle velocity");

        paddle.y += paddle.velocity;
        self.clamp_paddle(paddle);
    }

    /// Move a paddle to a reported position, e.g. from a remote peer
    pub fn place_paddle(&self, paddle: &mut Paddle, y: f32, velocity: f32) {
        paddle.y = y;
        paddle.velocity = velocity;
        self.clamp_paddle(paddle);
    }

    fn clamp_paddle(&self, paddle: &mut Paddle) {
        let max_y = (self.config.field_height - paddle.height).max(0.0);
        paddle.y = paddle.y.clamp(0.0, max_y);
    }

    /// Raise the ball speed to the floor, keeping its direction
    fn enforce_min_speed(&self, ball: &mut Ball) {
        let min_speed = self.config.min_ball_speed();
        let speed = ball.speed();
        if speed > 0.0 && speed < min_speed {
            ball.scale_velocity(min_speed / speed);
        }
    }

    /// Axis-aligned overlap between the ball box and the paddle box
    fn overlaps(ball: &Ball, paddle: &Paddle) -> bool {
        let left = ball.x - ball.radius();
        let top = ball.y - ball.radius();
        left < paddle.x + paddle.width
            && left + ball.size > paddle.x
            && top < paddle.y + paddle.height
            && top + ball.size > paddle.y
    }
}
