// src/config.rs
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::PathBuf;

//=============================================================================
// Configuration
//=============================================================================

pub const ENV_PREFIX: &str = "SHIFTROLL_";

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Config {
    // Server Configuration
    #[serde(default = "default_server_host")]
    pub server_host: String,
    #[serde(default = "default_server_port")]
    pub server_port: u16,

    // Store snapshot; in-memory only when unset
    #[serde(default)]
    pub data_file: Option<PathBuf>,

    // Weeks above this many hours get flagged in summaries
    #[serde(default = "default_weekly_hours_warning")]
    pub weekly_hours_warning: u32,
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    3000
}

fn default_weekly_hours_warning() -> u32 {
    40
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: default_server_host(),
            server_port: default_server_port(),
            data_file: None,
            weekly_hours_warning: default_weekly_hours_warning(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        envy::prefixed(ENV_PREFIX).from_env::<Config>()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn weekly_threshold(&self) -> Decimal {
        Decimal::from(self.weekly_hours_warning)
    }
}
