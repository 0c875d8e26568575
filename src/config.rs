//! Environment-derived configuration
//!
//! Read once at startup and never mutated. Variable names match the
//! manifests this service has always been deployed with:
//! `SERVER_ADDR`, `BACKEND_ADDR`, `POD_NAME`, `POD_NAMESPACE`, `NODE_NAME`,
//! `SLEEP_DELAY`, `HISTORY_SIZE`, `TIME_FORMAT`, `AUTOREFRESH_ENABLE`,
//! `AUTOREFRESH_INTERVAL`, plus `ADMIN_ADDR` and `LOG_FORMAT`.

use chrono::format::{Item, StrftimeItems};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Default listen address (all interfaces, port 8000)
pub const DEFAULT_SERVER_ADDR: &str = ":8000";

/// Default annotation poll interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default number of history entries kept by the frontend
pub const DEFAULT_HISTORY_SIZE: usize = 20;

/// Default timestamp format for history entries (`15:04:05.999`)
pub const DEFAULT_TIME_FORMAT: &str = "%H:%M:%S%.3f";

/// Default status page refresh interval in seconds
pub const DEFAULT_AUTO_REFRESH_INTERVAL: u32 = 1;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("SLEEP_DELAY must be greater than zero")]
    ZeroPollInterval,
}

/// Output format for the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// Which tier this process serves
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode<'a> {
    /// Answer directly from the disaster flag
    Backend,
    /// Proxy every request to the backend tier and render a status page
    Frontend { backend_addr: &'a str },
}

#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub server_addr: String,
    pub backend_addr: String,
    pub pod_name: String,
    pub pod_namespace: String,
    pub node_name: String,
    #[serde(serialize_with = "serialize_duration")]
    pub poll_interval: Duration,
    pub history_size: usize,
    pub time_format: String,
    pub auto_refresh: bool,
    pub auto_refresh_interval: u32,
    pub admin_addr: String,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: DEFAULT_SERVER_ADDR.to_string(),
            backend_addr: String::new(),
            pod_name: String::new(),
            pod_namespace: String::new(),
            node_name: String::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            history_size: DEFAULT_HISTORY_SIZE,
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            auto_refresh: true,
            auto_refresh_interval: DEFAULT_AUTO_REFRESH_INTERVAL,
            admin_addr: String::new(),
            log_format: LogFormat::Text,
        }
    }
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// Unset and empty variables fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let mut config = Config::default();

        if let Some(v) = get("SERVER_ADDR") {
            config.server_addr = v;
        }
        if let Some(v) = get("BACKEND_ADDR") {
            config.backend_addr = v.trim().to_string();
        }
        if let Some(v) = get("POD_NAME") {
            config.pod_name = v;
        }
        if let Some(v) = get("POD_NAMESPACE") {
            config.pod_namespace = v;
        }
        if let Some(v) = get("NODE_NAME") {
            config.node_name = v;
        }
        if let Some(v) = get("SLEEP_DELAY") {
            config.poll_interval = parse_duration(&v).map_err(|reason| {
                ConfigError::InvalidValue {
                    var: "SLEEP_DELAY",
                    value: v.clone(),
                    reason,
                }
            })?;
        }
        if let Some(v) = get("HISTORY_SIZE") {
            config.history_size = v.trim().parse().map_err(|e| ConfigError::InvalidValue {
                var: "HISTORY_SIZE",
                value: v.clone(),
                reason: format!("{}", e),
            })?;
        }
        if let Some(v) = get("TIME_FORMAT") {
            validate_time_format(&v).map_err(|reason| ConfigError::InvalidValue {
                var: "TIME_FORMAT",
                value: v.clone(),
                reason,
            })?;
            config.time_format = v;
        }
        if let Some(v) = get("AUTOREFRESH_ENABLE") {
            config.auto_refresh = parse_bool(&v).ok_or_else(|| ConfigError::InvalidValue {
                var: "AUTOREFRESH_ENABLE",
                value: v.clone(),
                reason: "expected true or false".to_string(),
            })?;
        }
        if let Some(v) = get("AUTOREFRESH_INTERVAL") {
            config.auto_refresh_interval =
                v.trim().parse().map_err(|e| ConfigError::InvalidValue {
                    var: "AUTOREFRESH_INTERVAL",
                    value: v.clone(),
                    reason: format!("{}", e),
                })?;
        }
        if let Some(v) = get("ADMIN_ADDR") {
            config.admin_addr = v;
        }
        if let Some(v) = get("LOG_FORMAT") {
            let format = v.trim().to_ascii_lowercase();
            config.log_format = match format.as_str() {
                "text" | "pretty" => LogFormat::Text,
                "json" => LogFormat::Json,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        var: "LOG_FORMAT",
                        value: v,
                        reason: "expected text or json".to_string(),
                    })
                }
            };
        }

        if config.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }

        Ok(config)
    }

    /// Backend mode when no downstream address is configured
    pub fn mode(&self) -> Mode<'_> {
        if self.backend_addr.is_empty() {
            Mode::Backend
        } else {
            Mode::Frontend {
                backend_addr: &self.backend_addr,
            }
        }
    }

    /// Socket address for the main listener
    pub fn listen_addr(&self) -> String {
        normalize_listen_addr(&self.server_addr)
    }

    /// Socket address for the probe/metrics listener, if enabled
    pub fn admin_listen_addr(&self) -> Option<String> {
        if self.admin_addr.is_empty() {
            None
        } else {
            Some(normalize_listen_addr(&self.admin_addr))
        }
    }

    /// JSON rendering used for the startup log line
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("<unserializable: {}>", e))
    }
}

/// Expand the `:port` shorthand to an all-interfaces bind address
pub fn normalize_listen_addr(addr: &str) -> String {
    let addr = addr.trim();
    if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr.to_string()
    }
}

/// Parse a duration written in Go syntax, e.g. `1s`, `250ms`, `1m30s`, `1.5h`
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.starts_with('-') {
        return Err("negative durations are not allowed".to_string());
    }
    let mut rest = s.strip_prefix('+').unwrap_or(s);

    let mut total_nanos: f64 = 0.0;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| format!("missing unit in duration {:?}", input))?;
        if number_len == 0 {
            return Err(format!("expected a number in duration {:?}", input));
        }
        let value: f64 = rest[..number_len]
            .parse()
            .map_err(|_| format!("invalid number in duration {:?}", input))?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60.0 * 1e9,
            "h" => 3600.0 * 1e9,
            other => return Err(format!("unknown unit {:?} in duration {:?}", other, input)),
        };
        rest = &rest[unit_len..];
        total_nanos += value * scale;
    }

    if !total_nanos.is_finite() || total_nanos > u64::MAX as f64 {
        return Err(format!("duration {:?} is out of range", input));
    }
    Ok(Duration::from_nanos(total_nanos.round() as u64))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "yes" | "on" => Some(true),
        "0" | "f" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Reject strftime strings chrono cannot render
///
/// chrono only reports bad specifiers when the timestamp is displayed,
/// which would fail in the middle of a request.
fn validate_time_format(format: &str) -> Result<(), String> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        Err("unsupported strftime specifier".to_string())
    } else {
        Ok(())
    }
}

fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&format!("{:?}", duration))
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
