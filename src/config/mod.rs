//! Configuration module - immutable game and network settings
//!
//! Loaded once at process start and shared read-only (`Arc<GameConfig>`,
//! `Arc<NetConfig>`) by every component that needs it.

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Physics and match constants
#[derive(Clone, Debug)]
pub struct GameConfig {
    /// Play-field width
    pub field_width: f32,
    /// Play-field height
    pub field_height: f32,
    /// Simulation ticks per second
    pub tick_rate: u32,

    /// Serve speed per axis; the speed floor is 0.8x this
    pub ball_speed: f32,
    /// Ball speed ceiling
    pub max_ball_speed: f32,
    /// Ball bounding box edge length
    pub ball_size: f32,
    /// Trailing positions kept for rendering
    pub trail_length: usize,

    /// Paddle max velocity (units per tick)
    pub paddle_speed: f32,
    pub paddle_width: f32,
    pub paddle_height: f32,
    /// Smoothing factor toward a steered target velocity
    pub paddle_acceleration: f32,
    /// Distance between a paddle and its side wall
    pub paddle_margin: f32,

    /// Minimum simulated time between two resolved paddle hits
    pub collision_debounce_ms: u64,
    /// Points needed to win unless overridden per match
    pub win_score: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            field_width: 1280.0,
            field_height: 720.0,
            tick_rate: 60,
            ball_speed: 9.0,
            max_ball_speed: 18.0,
            ball_size: 8.0,
            trail_length: 15,
            paddle_speed: 8.0,
            paddle_width: 12.0,
            paddle_height: 90.0,
            paddle_acceleration: 0.5,
            paddle_margin: 20.0,
            collision_debounce_ms: 50,
            win_score: 21,
        }
    }
}

impl GameConfig {
    /// Lowest speed the ball may travel at after a step
    pub fn min_ball_speed(&self) -> f32 {
        self.ball_speed * 0.8
    }

    pub fn ball_radius(&self) -> f32 {
        self.ball_size / 2.0
    }

    /// Top edge of a vertically centered paddle
    pub fn paddle_start_y(&self) -> f32 {
        self.field_height / 2.0 - self.paddle_height / 2.0
    }

    pub fn left_paddle_x(&self) -> f32 {
        self.paddle_margin
    }

    pub fn right_paddle_x(&self) -> f32 {
        self.field_width - self.paddle_margin - self.paddle_width
    }
}

/// Transport settings
#[derive(Clone, Debug)]
pub struct NetConfig {
    /// Address the host listens on
    pub bind_addr: SocketAddr,
    /// Host a guest connects to when none is given
    pub default_host: String,
    pub port: u16,
    /// Largest accepted frame body in bytes
    pub buffer_size: usize,
    /// Connect and receive timeout
    pub timeout: Duration,
    /// How often the accept loop re-checks the running flag
    pub accept_poll: Duration,
    /// Host broadcast ticks per second
    pub sync_rate: u32,
}

pub const DEFAULT_PORT: u16 = 5555;

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            default_host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            buffer_size: 4096,
            timeout: Duration::from_secs(5),
            accept_poll: Duration::from_secs(1),
            sync_rate: 60,
        }
    }
}

impl NetConfig {
    /// Interval between two host broadcasts
    pub fn sync_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.sync_rate.max(1) as u64)
    }
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    pub game: GameConfig,
    pub net: NetConfig,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env::var)
    }

    /// Load configuration through `lookup`, which resolves a variable name the
    /// way `std::env::var` does
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Result<String, env::VarError>,
    {
        let mut game = GameConfig::default();
        let mut net = NetConfig::default();

        if let Some(port) = parse_var::<u16, _>(&lookup, "PONG_PORT")? {
            net.bind_addr.set_port(port);
        }
        if let Some(addr) = parse_var::<SocketAddr, _>(&lookup, "PONG_BIND_ADDR")? {
            net.bind_addr = addr;
        }
        // the bind address wins over PONG_PORT
        net.port = net.bind_addr.port();

        if let Ok(host) = lookup("PONG_HOST") {
            net.default_host = host;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "PONG_NET_TIMEOUT_MS")? {
            net.timeout = Duration::from_millis(ms);
        }
        if let Some(size) = parse_var::<usize, _>(&lookup, "PONG_BUFFER_SIZE")? {
            if size == 0 {
                return Err(ConfigError::Invalid("PONG_BUFFER_SIZE"));
            }
            net.buffer_size = size;
        }
        if let Some(rate) = parse_var::<u32, _>(&lookup, "PONG_TICK_RATE")? {
            if rate == 0 {
                return Err(ConfigError::Invalid("PONG_TICK_RATE"));
            }
            game.tick_rate = rate;
            net.sync_rate = rate;
        }
        if let Some(score) = parse_var::<u32, _>(&lookup, "PONG_WIN_SCORE")? {
            if score == 0 {
                return Err(ConfigError::Invalid("PONG_WIN_SCORE"));
            }
            game.win_score = score;
        }

        Ok(Self {
            game,
            net,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn parse_var<T, F>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&'static str) -> Result<String, env::VarError>,
{
    match lookup(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(name)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(ConfigError::Invalid(name)),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_geometry_places_paddles_inside_field() {
        let config = GameConfig::default();
        assert_eq!(config.left_paddle_x(), 20.0);
        assert_eq!(config.right_paddle_x(), 1280.0 - 20.0 - 12.0);
        assert_eq!(config.paddle_start_y(), 315.0);
        assert!((config.min_ball_speed() - 7.2).abs() < 1e-6);
    }

    #[test]
    fn sync_interval_follows_rate() {
        let net = NetConfig {
            sync_rate: 50,
            ..NetConfig::default()
        };
        assert_eq!(net.sync_interval(), Duration::from_millis(20));
    }

    fn load(vars: &[(&'static str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<&'static str, String> = vars
            .iter()
            .map(|(name, value)| (*name, value.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned().ok_or(env::VarError::NotPresent))
    }

    #[test]
    fn zero_buffer_size_is_rejected() {
        let err = load(&[("PONG_BUFFER_SIZE", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("PONG_BUFFER_SIZE")));

        let config = load(&[("PONG_BUFFER_SIZE", "1024")]).unwrap();
        assert_eq!(config.net.buffer_size, 1024);
    }

    #[test]
    fn bind_address_keeps_port_in_sync() {
        let config = load(&[("PONG_BIND_ADDR", "127.0.0.1:6000")]).unwrap();
        assert_eq!(config.net.port, 6000);
        assert_eq!(config.net.bind_addr.port(), 6000);

        let config = load(&[("PONG_PORT", "7000"), ("PONG_BIND_ADDR", "127.0.0.1:6000")]).unwrap();
        assert_eq!(config.net.port, 6000);

        let config = load(&[("PONG_PORT", "7000")]).unwrap();
        assert_eq!(config.net.port, 7000);
        assert_eq!(config.net.bind_addr.port(), 7000);
    }

    #[test]
    fn defaults_without_variables() {
        let config = load(&[]).unwrap();
        assert_eq!(config.net.port, DEFAULT_PORT);
        assert_eq!(config.game.win_score, 21);
        assert_eq!(config.log_level, "info");
        assert!(load(&[("PONG_TICK_RATE", "0")]).is_err());
    }
}
