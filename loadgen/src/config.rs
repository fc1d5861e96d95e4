//! Load generator configuration
//!
//! Configuration is loaded from environment variables on top of the reference
//! defaults. The resulting value is handed to each component at construction.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::ConfigError;

/// Main load generator configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Matchmaking frontend host
    pub frontend_host: String,
    /// Matchmaking frontend port
    pub frontend_port: u16,
    /// Whether to use TLS when talking to the frontend
    pub frontend_tls: bool,
    /// Timeout for establishing the frontend connection
    pub connect_timeout: Duration,

    /// Prefix of every generated group identity
    pub player_id_prefix: String,
    /// Opaque properties payload sent with every registration
    pub player_properties: String,

    /// Number of sessions in one group
    pub server_max_players: usize,
    /// Admission pool capacity
    pub max_concurrent_groups: usize,
    /// Delay carried by the tokens the pool starts with
    pub initial_token_delay: Duration,
    /// Delay carried by the token a finished group hands back
    pub group_recycle_delay: Duration,

    /// Per-session timing
    pub session: SessionTimings,

    /// Simulate/rest shaping
    pub phase: PhaseTimings,

    /// How long shutdown waits for in-flight groups
    pub shutdown_grace: Duration,

    /// Bind address of the status endpoint (disabled when unset)
    pub status_addr: Option<String>,
}

/// Timing of a single session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimings {
    /// Upper bound on waiting for a match result
    pub failsafe_timeout: Duration,
    /// Idle time after deregistering; should match the game server timeout
    pub server_timeout: Duration,
}

/// Load shaping periods of the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTimings {
    /// How long groups are launched before a rest is forced
    pub simulate_period: Duration,
    /// How long the scheduler stays idle once resting
    pub rest_period: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            frontend_host: "35.236.24.200".to_string(),
            frontend_port: 50504,
            frontend_tls: false,
            connect_timeout: Duration::from_secs(5),
            player_id_prefix: "demov1-".to_string(),
            player_properties: serde_json::json!({ "mode": { "demo": 1 } }).to_string(),
            server_max_players: 4,
            max_concurrent_groups: 4,
            initial_token_delay: Duration::from_secs(10),
            group_recycle_delay: Duration::from_secs(10),
            session: SessionTimings::default(),
            phase: PhaseTimings::default(),
            shutdown_grace: Duration::from_secs(1),
            status_addr: None,
        }
    }
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            failsafe_timeout: Duration::from_secs(30),
            server_timeout: Duration::from_secs(30),
        }
    }
}

impl Default for PhaseTimings {
    fn default() -> Self {
        Self {
            simulate_period: Duration::from_secs(3 * 60),
            rest_period: Duration::from_secs(2 * 60),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // Frontend config
        if let Ok(host) = env::var("FRONTEND_HOST") {
            config.frontend_host = host;
        }
        if let Ok(port) = env::var("FRONTEND_PORT")
            && let Ok(p) = port.parse()
        {
            config.frontend_port = p;
        }
        if let Ok(val) = env::var("FRONTEND_TLS") {
            config.frontend_tls = val.to_lowercase() == "true" || val == "1";
        }
        if let Some(timeout) = env_secs("CONNECT_TIMEOUT_SECS") {
            config.connect_timeout = timeout;
        }

        // Player config
        if let Ok(prefix) = env::var("PLAYER_ID_PREFIX") {
            config.player_id_prefix = prefix;
        }
        if let Ok(properties) = env::var("PLAYER_PROPERTIES")
            && !properties.is_empty()
        {
            config.player_properties = properties;
        }

        // Group config
        if let Ok(val) = env::var("SERVER_MAX_PLAYERS")
            && let Ok(v) = val.parse()
        {
            config.server_max_players = v;
        }
        if let Ok(val) = env::var("MAX_CONCURRENT_GROUPS")
            && let Ok(v) = val.parse()
        {
            config.max_concurrent_groups = v;
        }
        if let Some(delay) = env_secs("INITIAL_TOKEN_DELAY_SECS") {
            config.initial_token_delay = delay;
        }
        if let Some(delay) = env_secs("GROUP_RECYCLE_DELAY_SECS") {
            config.group_recycle_delay = delay;
        }

        // Session config
        if let Some(timeout) = env_secs("SERVER_TIMEOUT_SECS") {
            config.session.server_timeout = timeout;
        }
        if let Some(timeout) = env_secs("FAILSAFE_TIMEOUT_SECS") {
            config.session.failsafe_timeout = timeout;
        }

        // Phase config
        if let Some(period) = env_secs("SIMULATE_PERIOD_SECS") {
            config.phase.simulate_period = period;
        }
        if let Some(period) = env_secs("REST_PERIOD_SECS") {
            config.phase.rest_period = period;
        }

        if let Ok(val) = env::var("SHUTDOWN_GRACE_MILLIS")
            && let Ok(millis) = val.parse::<u64>()
        {
            config.shutdown_grace = Duration::from_millis(millis);
        }
        if let Ok(addr) = env::var("STATUS_ADDR")
            && !addr.is_empty()
        {
            config.status_addr = Some(addr);
        }

        config
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frontend_host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if self.server_max_players == 0 {
            return Err(ConfigError::ZeroValue("SERVER_MAX_PLAYERS"));
        }
        if self.max_concurrent_groups == 0 {
            return Err(ConfigError::ZeroValue("MAX_CONCURRENT_GROUPS"));
        }
        if let Some(addr) = &self.status_addr {
            addr.parse::<SocketAddr>()
                .map_err(|e| ConfigError::InvalidStatusAddr(addr.clone(), e.to_string()))?;
        }
        Ok(())
    }

    /// URI of the matchmaking frontend
    pub fn frontend_uri(&self) -> String {
        let scheme = if self.frontend_tls { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.frontend_host, self.frontend_port)
    }
}

fn env_secs(key: &str) -> Option<Duration> {
    env::var(key)
        .ok()
        .and_then(|val| val.parse::<u64>().ok())
        .map(Duration::from_secs)
}
