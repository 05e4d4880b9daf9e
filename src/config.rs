use std::path::PathBuf;
use std::time::Duration;

pub const DATA_DIR_ENV: &str = "ELAPOR_DATA_DIR";
pub const SIMULATE_LATENCY_ENV: &str = "ELAPOR_SIMULATE_LATENCY";

const LOGIN_LATENCY: Duration = Duration::from_millis(800);
const SUBMIT_LATENCY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub simulate_latency: bool,
}

impl Config {
    pub fn from_env() -> Self {
        let data_dir = std::env::var_os(DATA_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);
        let simulate_latency = std::env::var(SIMULATE_LATENCY_ENV)
            .map(|value| parse_flag(&value))
            .unwrap_or(false);

        Self {
            data_dir,
            simulate_latency,
        }
    }

    pub fn with_data_dir(mut self, data_dir: Option<PathBuf>) -> Self {
        if let Some(dir) = data_dir {
            self.data_dir = dir;
        }
        self
    }

    pub fn login_latency(&self) -> Duration {
        if self.simulate_latency {
            LOGIN_LATENCY
        } else {
            Duration::ZERO
        }
    }

    pub fn submit_latency(&self) -> Duration {
        if self.simulate_latency {
            SUBMIT_LATENCY
        } else {
            Duration::ZERO
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("e-lapor"))
        .unwrap_or_else(|| PathBuf::from(".e-lapor"))
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
