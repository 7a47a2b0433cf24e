use std::time::Duration;

/// Chat API configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string. When unset the in-memory store is used.
    pub database_url: Option<String>,
    /// HMAC secret used to verify HS256 bearer tokens.
    pub jwt_secret: String,
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Hub tuning knobs.
    pub hub: HubConfig,
}

/// Limits applied by the chat hub and its sessions.
#[derive(Debug, Clone, Copy)]
pub struct HubConfig {
    /// Deadline for handing one frame to a recipient, and for each socket write.
    pub send_timeout: Duration,
    /// Capacity of each session's outbound frame queue.
    pub outbound_queue: usize,
    /// Capacity of the hub's command queue.
    pub command_queue: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_millis(2000),
            outbound_queue: 64,
            command_queue: 1024,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Panics with a descriptive message if a required variable is missing.
    pub fn from_env() -> Self {
        let defaults = HubConfig::default();
        Self {
            database_url: std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            jwt_secret: required_var("JWT_SECRET"),
            port: parsed_var("PORT").unwrap_or(8090),
            hub: HubConfig {
                send_timeout: parsed_var("CHAT_SEND_TIMEOUT_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.send_timeout),
                outbound_queue: parsed_var("CHAT_OUTBOUND_QUEUE")
                    .filter(|n| *n > 0)
                    .unwrap_or(defaults.outbound_queue),
                command_queue: parsed_var("CHAT_HUB_QUEUE")
                    .filter(|n| *n > 0)
                    .unwrap_or(defaults.command_queue),
            },
        }
    }
}

fn required_var(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| panic!("{name} env var is required"))
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
