//! Startup configuration read from `SALESDASH_*` environment variables.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use chrono_tz::Tz;
use thiserror::Error;

use crate::gauge::{GaugeConfig, Milestone};

pub const DEFAULT_CSV_URL: &str = "https://docs.google.com/spreadsheets/d/e/2PACX-1vQKstKflONSWvQ6xfVkMdM53mveopLXVGNv9CyQT0kRbjdI7IGIVzvvMPLSXNyQ-xZTQEvDmKr1jI_I/pub?gid=1199309873&single=true&output=csv";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::America::Sao_Paulo;

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    pub csv_url: String,
    pub gauge: GaugeConfig,
    pub bind_addr: SocketAddr,
    pub timezone: Tz,
    pub prefs_path: PathBuf,
    pub http_timeout_ms: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            csv_url: DEFAULT_CSV_URL.to_string(),
            gauge: GaugeConfig::default(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            timezone: DEFAULT_TIMEZONE,
            prefs_path: PathBuf::from("data/preferences.json"),
            http_timeout_ms: 15_000,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} is empty")]
    Empty { key: &'static str },
    #[error("invalid {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
    #[error("invalid milestone entry {0:?} (expected name=value)")]
    InvalidMilestone(String),
}

pub fn dashboard_config_from_env() -> Result<DashboardConfig, ConfigError> {
    dashboard_config_from_lookup(|key| env::var(key).ok())
}

/// Same as [`dashboard_config_from_env`] with an injectable variable source.
pub fn dashboard_config_from_lookup(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<DashboardConfig, ConfigError> {
    let mut config = DashboardConfig::default();

    if let Some(url) = lookup("SALESDASH_CSV_URL") {
        let trimmed = url.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::Empty {
                key: "SALESDASH_CSV_URL",
            });
        }
        config.csv_url = trimmed.to_string();
    }

    if let Some(goal) = lookup("SALESDASH_ANNUAL_GOAL") {
        config.gauge.annual_goal = parse_positive_f64("SALESDASH_ANNUAL_GOAL", &goal)?;
    }

    if let Some(milestones) = lookup("SALESDASH_MILESTONES") {
        config.gauge.milestones = parse_milestones(&milestones)?;
    }

    if let Some(addr) = lookup("SALESDASH_ADDR") {
        config.bind_addr = addr
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue {
                key: "SALESDASH_ADDR",
                value: addr.clone(),
            })?;
    }

    if let Some(tz) = lookup("SALESDASH_TIMEZONE") {
        config.timezone = tz
            .trim()
            .parse::<Tz>()
            .map_err(|_| ConfigError::InvalidValue {
                key: "SALESDASH_TIMEZONE",
                value: tz.clone(),
            })?;
    }

    if let Some(path) = lookup("SALESDASH_PREFS_PATH") {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::Empty {
                key: "SALESDASH_PREFS_PATH",
            });
        }
        config.prefs_path = PathBuf::from(trimmed);
    }

    if let Some(timeout) = lookup("SALESDASH_HTTP_TIMEOUT_MS") {
        config.http_timeout_ms = match timeout.trim().parse::<u64>() {
            Ok(ms) if ms > 0 => ms,
            _ => {
                return Err(ConfigError::InvalidValue {
                    key: "SALESDASH_HTTP_TIMEOUT_MS",
                    value: timeout,
                })
            }
        };
    }

    Ok(config)
}

/// `1º Trim=1350000;2º Trim=3150000;...`
pub fn parse_milestones(raw: &str) -> Result<Vec<Milestone>, ConfigError> {
    let milestones = raw
        .split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (name, value) = entry
                .rsplit_once('=')
                .ok_or_else(|| ConfigError::InvalidMilestone(entry.to_string()))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(ConfigError::InvalidMilestone(entry.to_string()));
            }
            let value = value
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite() && *value >= 0.0)
                .ok_or_else(|| ConfigError::InvalidMilestone(entry.to_string()))?;
            Ok(Milestone::new(name, value))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if milestones.is_empty() {
        return Err(ConfigError::Empty {
            key: "SALESDASH_MILESTONES",
        });
    }

    Ok(milestones)
}

fn parse_positive_f64(key: &'static str, raw: &str) -> Result<f64, ConfigError> {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => Ok(value),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Mutex, OnceLock};

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn env_lock() -> &'static Mutex<()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = dashboard_config_from_lookup(|_| None).expect("defaults are valid");

        assert_eq!(cfg, DashboardConfig::default());
        assert_eq!(cfg.gauge.annual_goal, 9_000_000.0);
        assert_eq!(cfg.gauge.milestones.len(), 4);
        assert_eq!(cfg.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(cfg.timezone, chrono_tz::America::Sao_Paulo);
    }

    #[test]
    fn overrides_every_field() {
        let cfg = dashboard_config_from_lookup(lookup_from(&[
            ("SALESDASH_CSV_URL", " https://example.test/sheet.csv "),
            ("SALESDASH_ANNUAL_GOAL", "1200000"),
            ("SALESDASH_MILESTONES", "H1=600000; H2=600000;"),
            ("SALESDASH_ADDR", "0.0.0.0:9000"),
            ("SALESDASH_TIMEZONE", "UTC"),
            ("SALESDASH_PREFS_PATH", "/tmp/prefs.json"),
            ("SALESDASH_HTTP_TIMEOUT_MS", "2500"),
        ]))
        .expect("valid overrides");

        assert_eq!(cfg.csv_url, "https://example.test/sheet.csv");
        assert_eq!(cfg.gauge.annual_goal, 1_200_000.0);
        assert_eq!(
            cfg.gauge.milestones,
            vec![Milestone::new("H1", 600_000.0), Milestone::new("H2", 600_000.0)]
        );
        assert_eq!(cfg.bind_addr.port(), 9000);
        assert_eq!(cfg.timezone, chrono_tz::UTC);
        assert_eq!(cfg.prefs_path, PathBuf::from("/tmp/prefs.json"));
        assert_eq!(cfg.http_timeout_ms, 2500);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let bad_goal =
            dashboard_config_from_lookup(lookup_from(&[("SALESDASH_ANNUAL_GOAL", "-5")]));
        assert!(matches!(
            bad_goal,
            Err(ConfigError::InvalidValue {
                key: "SALESDASH_ANNUAL_GOAL",
                ..
            })
        ));

        let bad_tz = dashboard_config_from_lookup(lookup_from(&[("SALESDASH_TIMEZONE", "Mars/Base")]));
        assert!(matches!(bad_tz, Err(ConfigError::InvalidValue { .. })));

        let bad_timeout =
            dashboard_config_from_lookup(lookup_from(&[("SALESDASH_HTTP_TIMEOUT_MS", "0")]));
        assert!(bad_timeout.is_err());
    }

    #[test]
    fn milestone_entries_need_a_name_and_a_number() {
        assert!(matches!(
            parse_milestones("Q1"),
            Err(ConfigError::InvalidMilestone(_))
        ));
        assert!(matches!(
            parse_milestones("=100"),
            Err(ConfigError::InvalidMilestone(_))
        ));
        assert!(matches!(
            parse_milestones("Q1=lots"),
            Err(ConfigError::InvalidMilestone(_))
        ));
        assert!(matches!(parse_milestones(" ; "), Err(ConfigError::Empty { .. })));
    }

    #[test]
    fn reads_process_environment() {
        let _guard = env_lock().lock().expect("env lock should not be poisoned");
        let previous = env::var("SALESDASH_ANNUAL_GOAL").ok();
        env::set_var("SALESDASH_ANNUAL_GOAL", "5000000");

        let cfg = dashboard_config_from_env();

        match previous {
            Some(v) => env::set_var("SALESDASH_ANNUAL_GOAL", v),
            None => env::remove_var("SALESDASH_ANNUAL_GOAL"),
        }

        assert_eq!(cfg.expect("valid env").gauge.annual_goal, 5_000_000.0);
    }
}
