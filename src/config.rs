use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::models::ParticipantId;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Drive the HUD from the synthetic source instead of the broker
    pub simulate_data: bool,

    /// Participant observed in detail
    pub self_id: ParticipantId,

    /// Telemetry broker host
    pub broker_host: String,

    /// Telemetry broker MQTT port
    pub broker_port: u16,

    /// MQTT keep-alive in seconds
    pub keep_alive_secs: u64,

    /// First reconnect delay in milliseconds
    pub reconnect_min_ms: u64,

    /// Reconnect delay ceiling in milliseconds
    pub reconnect_max_ms: u64,

    /// Synthetic source tick period in milliseconds
    pub synthetic_tick_ms: u64,

    /// Fixed seed for reproducible synthetic runs
    pub synthetic_seed: Option<u64>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            simulate_data: parse_var("SIMULATE_DATA", "false")?,

            self_id: ParticipantId(parse_var("SELF_ID", "3")?),

            broker_host: env::var("BROKER_HOST").unwrap_or_else(|_| "192.168.12.1".to_string()),

            broker_port: parse_var("BROKER_PORT", "3333")?,

            keep_alive_secs: parse_var("BROKER_KEEP_ALIVE_SECS", "10")?,

            reconnect_min_ms: parse_var("RECONNECT_MIN_MS", "1000")?,

            reconnect_max_ms: parse_var("RECONNECT_MAX_MS", "30000")?,

            synthetic_tick_ms: parse_var("SYNTHETIC_TICK_MS", "100")?,

            synthetic_seed: match env::var("SYNTHETIC_SEED") {
                Ok(seed) => Some(
                    seed.parse()
                        .context("SYNTHETIC_SEED must be a valid number")?,
                ),
                Err(_) => None,
            },
        };

        if config.self_id.role().is_none() {
            anyhow::bail!("SELF_ID {} is not a known participant", config.self_id.0);
        }

        Ok(config)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn synthetic_tick(&self) -> Duration {
        Duration::from_millis(self.synthetic_tick_ms)
    }

    pub fn reconnect_backoff(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.reconnect_min_ms),
            Duration::from_millis(self.reconnect_max_ms.max(self.reconnect_min_ms)),
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            simulate_data: false,
            self_id: ParticipantId(3),
            broker_host: "192.168.12.1".to_string(),
            broker_port: 3333,
            keep_alive_secs: 10,
            reconnect_min_ms: 1000,
            reconnect_max_ms: 30000,
            synthetic_tick_ms: 100,
            synthetic_seed: None,
        }
    }
}

fn parse_var<T>(name: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .with_context(|| format!("{} must be a valid {}", name, std::any::type_name::<T>()))
}
