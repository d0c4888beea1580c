use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::constants::{
    DEFAULT_KNMI_API_BASE_URL, DEFAULT_LISTEN_ADDR, DEFAULT_MAX_ROUTE_NODES,
    DEFAULT_PENDING_RETRY_SECONDS, DEFAULT_POLL_INTERVAL_SECONDS, DEFAULT_REQUEST_TIMEOUT_SECONDS,
    KNMI_NOTIFY_BROKER_URL, KNMI_NOTIFY_RECONNECT_DELAY_SECONDS,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DatasetFormat {
    #[default]
    Hdf5,
    Packed,
}

impl DatasetFormat {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "hdf5" | "h5" => Ok(Self::Hdf5),
            "packed" => Ok(Self::Packed),
            other => bail!("Unknown dataset format {other:?}; expected hdf5 or packed"),
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub listen_addr: String,
    pub knmi_api_key: Option<String>,
    pub knmi_api_base_url: String,
    pub knmi_notify_key: Option<String>,
    pub knmi_notify_client_id: String,
    pub knmi_notify_url: String,
    pub notify_reconnect_delay: Duration,
    pub dataset_format: DatasetFormat,
    pub request_timeout: Duration,
    pub poll_interval: Duration,
    pub pending_retry_delay: Duration,
    pub max_route_nodes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let listen_addr = env_string("NOWCAST_LISTEN_ADDR", DEFAULT_LISTEN_ADDR);
        let knmi_api_key = std::env::var("KNMI_API_KEY")
            .ok()
            .filter(|value| !value.trim().is_empty());
        let knmi_api_base_url = env_string("KNMI_API_BASE_URL", DEFAULT_KNMI_API_BASE_URL)
            .trim_end_matches('/')
            .to_string();
        let knmi_notify_key = std::env::var("KNMI_NOTIFY_KEY")
            .ok()
            .filter(|value| !value.trim().is_empty());
        let knmi_notify_client_id = env_string(
            "KNMI_NOTIFY_CLIENT_ID",
            &format!("radar-nowcast-{}", std::process::id()),
        );
        let knmi_notify_url = env_string("KNMI_NOTIFY_URL", KNMI_NOTIFY_BROKER_URL);
        let notify_reconnect_delay = Duration::from_secs(env_u64(
            "KNMI_NOTIFY_RECONNECT_SECONDS",
            KNMI_NOTIFY_RECONNECT_DELAY_SECONDS,
        )?);
        let dataset_format = match std::env::var("NOWCAST_DATASET_FORMAT") {
            Ok(value) => DatasetFormat::parse(&value)
                .context("Failed to parse NOWCAST_DATASET_FORMAT")?,
            Err(_) => DatasetFormat::default(),
        };
        let request_timeout = Duration::from_secs(env_u64(
            "NOWCAST_REQUEST_TIMEOUT_SECONDS",
            DEFAULT_REQUEST_TIMEOUT_SECONDS,
        )?);
        let poll_interval = Duration::from_secs(env_u64(
            "NOWCAST_POLL_INTERVAL_SECONDS",
            DEFAULT_POLL_INTERVAL_SECONDS,
        )?);
        let pending_retry_delay = Duration::from_secs(env_u64(
            "NOWCAST_PENDING_RETRY_SECONDS",
            DEFAULT_PENDING_RETRY_SECONDS,
        )?);
        let max_route_nodes = env_usize("NOWCAST_MAX_ROUTE_NODES", DEFAULT_MAX_ROUTE_NODES)?;

        Ok(Self {
            listen_addr,
            knmi_api_key,
            knmi_api_base_url,
            knmi_notify_key,
            knmi_notify_client_id,
            knmi_notify_url,
            notify_reconnect_delay,
            dataset_format,
            request_timeout,
            poll_interval,
            pending_retry_delay,
            max_route_nodes,
        })
    }
}

fn env_string(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_u64(name: &str, default: u64) -> Result<u64> {
    match std::env::var(name) {
        Ok(value) => value
            .parse::<u64>()
            .with_context(|| format!("Failed to parse {}={} as u64", name, value)),
        Err(_) => Ok(default),
    }
}

fn env_usize(name: &str, default: usize) -> Result<usize> {
    match std::env::var(name) {
        Ok(value) => value
            .parse::<usize>()
            .with_context(|| format!("Failed to parse {}={} as usize", name, value)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            knmi_api_key: None,
            knmi_api_base_url: DEFAULT_KNMI_API_BASE_URL.to_string(),
            knmi_notify_key: None,
            knmi_notify_client_id: "radar-nowcast-test".to_string(),
            knmi_notify_url: KNMI_NOTIFY_BROKER_URL.to_string(),
            notify_reconnect_delay: Duration::from_secs(KNMI_NOTIFY_RECONNECT_DELAY_SECONDS),
            dataset_format: DatasetFormat::Packed,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECONDS),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECONDS),
            pending_retry_delay: Duration::from_secs(DEFAULT_PENDING_RETRY_SECONDS),
            max_route_nodes: 4,
        }
    }
}
