//! rigwatch.toml configuration parser.
//!
//! Every section and field is optional. Accessors resolve missing or
//! malformed values to the gateway defaults.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::duration::duration_or;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub network: Option<NetworkConfig>,
    pub health: Option<HealthConfig>,
    pub restart: Option<RestartConfig>,
    pub tour: Option<TourConfig>,
    pub motor: Option<MotorConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub scan_from: Option<Ipv4Addr>,
    pub scan_to: Option<Ipv4Addr>,
    pub management_port: Option<u16>,
    pub api_port: Option<u16>,
    pub stream_port: Option<u16>,
    pub probe_interval: Option<String>,
    pub ping_retries: Option<u32>,
    pub connect_timeout: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthConfig {
    pub poll_interval: Option<String>,
    pub eviction_threshold: Option<u32>,
    pub request_timeout: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RestartConfig {
    pub failure_threshold: Option<u32>,
    pub cooldown: Option<String>,
    pub safety_delay: Option<String>,
    pub switch_call_delay: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TourConfig {
    pub schedule_interval: Option<String>,
    pub position_poll: Option<String>,
    pub ffc_settle: Option<String>,
    pub position_reach_timeout: Option<String>,
    pub flush_timeout: Option<String>,
    pub picture_root: Option<PathBuf>,
    pub safety_scale: Option<f64>,
    pub safety_margin: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MotorConfig {
    pub min_pulse_us: Option<u32>,
    pub max_pulse_us: Option<u32>,
    pub ramp_length: Option<u32>,
}

// ── Resolved settings ──────────────────────────────────────────────

/// Network scan and port settings with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSettings {
    pub scan_from: Ipv4Addr,
    pub scan_to: Ipv4Addr,
    pub management_port: u16,
    pub api_port: u16,
    pub stream_port: u16,
    pub probe_interval: Duration,
    pub ping_retries: u32,
    pub connect_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthSettings {
    pub poll_interval: Duration,
    pub eviction_threshold: u32,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartSettings {
    pub failure_threshold: u32,
    pub cooldown: Duration,
    pub safety_delay: Duration,
    pub switch_call_delay: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TourSettings {
    pub schedule_interval: Duration,
    pub position_poll: Duration,
    pub ffc_settle: Duration,
    /// No deadline when `None`; only the streaming-fault flag aborts a wait.
    pub position_reach_timeout: Option<Duration>,
    pub flush_timeout: Duration,
    pub picture_root: PathBuf,
    /// Factor applied to the plan's extent on each side of home.
    pub safety_scale: f64,
    /// Extra steps added after scaling.
    pub safety_margin: i32,
}

/// Pulse profile the gateway commands for every move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorProfile {
    pub min_pulse_us: u32,
    pub max_pulse_us: u32,
    pub ramp_length: u32,
}

impl Default for RestartSettings {
    fn default() -> Self {
        RestartConfig::default().resolve()
    }
}

impl Default for HealthSettings {
    fn default() -> Self {
        HealthConfig::default().resolve()
    }
}

impl Default for TourSettings {
    fn default() -> Self {
        TourConfig::default().resolve()
    }
}

impl Default for MotorProfile {
    fn default() -> Self {
        MotorConfig::default().resolve()
    }
}

impl NetworkConfig {
    pub fn resolve(&self) -> NetworkSettings {
        NetworkSettings {
            scan_from: self.scan_from.unwrap_or(Ipv4Addr::new(192, 168, 0, 2)),
            scan_to: self.scan_to.unwrap_or(Ipv4Addr::new(192, 168, 0, 254)),
            management_port: self.management_port.unwrap_or(22),
            api_port: self.api_port.unwrap_or(80),
            stream_port: self.stream_port.unwrap_or(5005),
            probe_interval: duration_or(self.probe_interval.as_deref(), Duration::from_secs(30)),
            ping_retries: self.ping_retries.unwrap_or(30),
            connect_timeout: duration_or(
                self.connect_timeout.as_deref(),
                Duration::from_millis(100),
            ),
        }
    }
}

impl HealthConfig {
    pub fn resolve(&self) -> HealthSettings {
        HealthSettings {
            poll_interval: duration_or(self.poll_interval.as_deref(), Duration::from_secs(20)),
            eviction_threshold: self.eviction_threshold.unwrap_or(5),
            request_timeout: duration_or(self.request_timeout.as_deref(), Duration::from_secs(2)),
        }
    }
}

impl RestartConfig {
    pub fn resolve(&self) -> RestartSettings {
        RestartSettings {
            failure_threshold: self.failure_threshold.unwrap_or(2),
            cooldown: duration_or(self.cooldown.as_deref(), Duration::from_secs(300)),
            safety_delay: duration_or(self.safety_delay.as_deref(), Duration::from_secs(10)),
            switch_call_delay: duration_or(
                self.switch_call_delay.as_deref(),
                Duration::from_millis(200),
            ),
        }
    }
}

impl TourConfig {
    pub fn resolve(&self) -> TourSettings {
        TourSettings {
            schedule_interval: duration_or(self.schedule_interval.as_deref(), Duration::from_secs(5)),
            position_poll: duration_or(self.position_poll.as_deref(), Duration::from_millis(100)),
            ffc_settle: duration_or(self.ffc_settle.as_deref(), Duration::from_secs(5)),
            position_reach_timeout: self
                .position_reach_timeout
                .as_deref()
                .and_then(crate::duration::parse_duration),
            flush_timeout: duration_or(self.flush_timeout.as_deref(), Duration::from_secs(60)),
            picture_root: self
                .picture_root
                .clone()
                .unwrap_or_else(|| PathBuf::from("pictures")),
            safety_scale: self.safety_scale.unwrap_or(1.05),
            safety_margin: self.safety_margin.unwrap_or(0),
        }
    }
}

impl MotorConfig {
    pub fn resolve(&self) -> MotorProfile {
        MotorProfile {
            min_pulse_us: self.min_pulse_us.unwrap_or(1000),
            max_pulse_us: self.max_pulse_us.unwrap_or(4000),
            ramp_length: self.ramp_length.unwrap_or(400),
        }
    }
}

impl GatewayConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: GatewayConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn network(&self) -> NetworkSettings {
        self.network.clone().unwrap_or_default().resolve()
    }

    pub fn health(&self) -> HealthSettings {
        self.health.clone().unwrap_or_default().resolve()
    }

    pub fn restart(&self) -> RestartSettings {
        self.restart.clone().unwrap_or_default().resolve()
    }

    pub fn tour(&self) -> TourSettings {
        self.tour.clone().unwrap_or_default().resolve()
    }

    pub fn motor(&self) -> MotorProfile {
        self.motor.clone().unwrap_or_default().resolve()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config: GatewayConfig = toml::from_str("").unwrap();
        let restart = config.restart();
        assert_eq!(restart.failure_threshold, 2);
        assert_eq!(restart.cooldown, Duration::from_secs(300));
        assert_eq!(restart.safety_delay, Duration::from_secs(10));
        assert_eq!(restart.switch_call_delay, Duration::from_millis(200));

        let health = config.health();
        assert_eq!(health.poll_interval, Duration::from_secs(20));
        assert_eq!(health.eviction_threshold, 5);

        let network = config.network();
        assert_eq!(network.management_port, 22);
        assert_eq!(network.probe_interval, Duration::from_secs(30));
        assert_eq!(network.connect_timeout, Duration::from_millis(100));

        let tour = config.tour();
        assert_eq!(tour.schedule_interval, Duration::from_secs(5));
        assert_eq!(tour.position_reach_timeout, None);
        assert_eq!(tour.safety_scale, 1.05);
        assert_eq!(tour.safety_margin, 0);

        assert_eq!(
            config.motor(),
            MotorProfile {
                min_pulse_us: 1000,
                max_pulse_us: 4000,
                ramp_length: 400
            }
        );
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
[network]
scan_from = "10.0.0.10"
scan_to = "10.0.0.20"
api_port = 8080

[restart]
cooldown = "2m"
switch_call_delay = "0ms"

[tour]
position_reach_timeout = "90s"
picture_root = "/srv/pictures"
"#;
        let config: GatewayConfig = toml::from_str(toml_str).unwrap();
        let network = config.network();
        assert_eq!(network.scan_from, Ipv4Addr::new(10, 0, 0, 10));
        assert_eq!(network.scan_to, Ipv4Addr::new(10, 0, 0, 20));
        assert_eq!(network.api_port, 8080);
        assert_eq!(network.stream_port, 5005);

        let restart = config.restart();
        assert_eq!(restart.cooldown, Duration::from_secs(120));
        assert_eq!(restart.switch_call_delay, Duration::ZERO);

        let tour = config.tour();
        assert_eq!(tour.position_reach_timeout, Some(Duration::from_secs(90)));
        assert_eq!(tour.picture_root, PathBuf::from("/srv/pictures"));
    }

    #[test]
    fn malformed_duration_falls_back() {
        let config: GatewayConfig = toml::from_str("[health]\npoll_interval = \"often\"").unwrap();
        assert_eq!(config.health().poll_interval, Duration::from_secs(20));
    }

    #[test]
    fn serializes_back_to_toml() {
        let config: GatewayConfig = toml::from_str("[motor]\nramp_length = 50").unwrap();
        let out = config.to_toml_string().unwrap();
        assert!(out.contains("ramp_length = 50"));
    }
}
