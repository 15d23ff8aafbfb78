//! Logging setup and the crate's structured log events.
//!
//! Every event carries a `component` and a dotted `event` name, so JSON logs
//! can be filtered per subsystem. Modules log through the helpers below
//! instead of calling `tracing` macros directly.

use std::env;
use std::fmt::Display;
use std::net::SocketAddr;

use thiserror::Error;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::aggregate::FilterError;
use crate::dashboard::DashboardSnapshot;
use crate::preferences::PreferenceError;
use crate::source::{redacted_url, SourceError};

pub const LOG_LEVEL_VAR: &str = "SALESDASH_LOG_LEVEL";
pub const LOG_FORMAT_VAR: &str = "SALESDASH_LOG_FORMAT";
pub const LOG_TARGET_VAR: &str = "SALESDASH_LOG_TARGET";

const FALLBACK_DIRECTIVES: &str = "info";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

impl LogFormat {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "pretty" | "text" => Some(Self::Pretty),
            _ => None,
        }
    }
}

/// Subscriber settings. `directives` is an `EnvFilter` string such as
/// `info,salesdash::scheduler=debug`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub directives: String,
    pub format: LogFormat,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directives: FALLBACK_DIRECTIVES.to_string(),
            format: LogFormat::default(),
            include_target: true,
        }
    }
}

impl LoggingConfig {
    /// Builds the config from a variable source. Blank or unrecognised values
    /// keep the default for that field.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let directives = lookup(LOG_LEVEL_VAR)
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .unwrap_or(defaults.directives);
        let format = lookup(LOG_FORMAT_VAR)
            .and_then(|raw| LogFormat::parse(&raw))
            .unwrap_or(defaults.format);
        let include_target = lookup(LOG_TARGET_VAR)
            .and_then(|raw| parse_switch(&raw))
            .unwrap_or(defaults.include_target);

        Self {
            directives,
            format,
            include_target,
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.directives)
            .unwrap_or_else(|_| EnvFilter::new(FALLBACK_DIRECTIVES))
    }
}

#[derive(Debug, Error)]
pub enum LoggingInitError {
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(#[from] tracing::subscriber::SetGlobalDefaultError),
}

pub fn logging_config_from_env() -> LoggingConfig {
    LoggingConfig::from_lookup(|key| env::var(key).ok())
}

pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingInitError> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(config.env_filter())
        .with_target(config.include_target)
        .with_ansi(config.format == LogFormat::Pretty);

    match config.format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Pretty => tracing::subscriber::set_global_default(builder.pretty().finish())?,
    }
    Ok(())
}

fn parse_switch(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Value of the `component` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Server,
    Records,
    Preferences,
    Scheduler,
    Dashboard,
}

impl Component {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Server => "dashboard_server",
            Self::Records => "records",
            Self::Preferences => "preferences",
            Self::Scheduler => "scheduler",
            Self::Dashboard => "dashboard",
        }
    }
}

// Server lifecycle.

pub fn log_app_start(config: &LoggingConfig) {
    info!(
        component = Component::Server.as_str(),
        event = "app.start",
        log_directives = %config.directives,
        log_format = ?config.format,
        include_target = config.include_target
    );
}

pub fn log_app_bind(bound_addr: SocketAddr) {
    info!(
        component = Component::Server.as_str(),
        event = "app.bind",
        bind_addr = %bound_addr,
        route = "/dashboard"
    );
}

pub fn log_app_shutdown() {
    info!(component = Component::Server.as_str(), event = "app.shutdown");
}

/// Published-sheet URLs carry their access key in the query, so only the
/// redacted form is logged.
pub fn log_source_selected(csv_url: &str, refresh_interval_secs: u64, timezone: &str) {
    info!(
        component = Component::Server.as_str(),
        event = "source.selected",
        source = redacted_url(csv_url),
        refresh_interval_secs,
        timezone
    );
}

// HTTP.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpRoute {
    Dashboard,
    Snapshot,
}

impl HttpRoute {
    pub fn path(self) -> &'static str {
        match self {
            Self::Dashboard => "/dashboard",
            Self::Snapshot => "/dashboard/snapshot",
        }
    }

    fn event_name(self) -> &'static str {
        match self {
            Self::Dashboard => "http.dashboard.request",
            Self::Snapshot => "http.snapshot.request",
        }
    }
}

pub(crate) fn log_http_request(route: HttpRoute, snapshot: &DashboardSnapshot) {
    let period = snapshot
        .filter
        .as_ref()
        .map(|filter| filter.period_label.as_str())
        .unwrap_or("-");
    info!(
        component = Component::Server.as_str(),
        event = route.event_name(),
        route = route.path(),
        period,
        records = snapshot.record_count
    );
}

pub(crate) fn log_filter_rejected(err: &FilterError) {
    warn!(
        component = Component::Server.as_str(),
        event = "http.filter.rejected",
        error = %err
    );
}

pub(crate) fn log_refresh_requested() {
    info!(component = Component::Server.as_str(), event = "http.refresh.request");
}

pub(crate) fn log_refresh_interval_requested(seconds: u64) {
    info!(
        component = Component::Server.as_str(),
        event = "http.refresh_interval.request",
        seconds
    );
}

// CSV rows.

pub(crate) fn log_headers_missing(missing: &[&'static str]) {
    warn!(
        component = Component::Records.as_str(),
        event = "records.headers.missing",
        missing = ?missing
    );
}

pub(crate) fn log_row_skipped(err: &csv::Error) {
    debug!(
        component = Component::Records.as_str(),
        event = "records.row.skipped",
        error = %err
    );
}

pub(crate) fn log_rows_skipped(skipped: u64) {
    warn!(
        component = Component::Records.as_str(),
        event = "records.rows.skipped",
        skipped
    );
}

// Preferences.

pub(crate) fn log_preferences_load_error(err: &PreferenceError) {
    warn!(
        component = Component::Preferences.as_str(),
        event = "preferences.load.error",
        error = %err
    );
}

pub(crate) fn log_refresh_interval_restored(secs: u64) {
    info!(
        component = Component::Preferences.as_str(),
        event = "preferences.refresh_interval.restored",
        refresh_interval_secs = secs
    );
}

pub(crate) fn log_refresh_interval_invalid(raw: &str) {
    warn!(
        component = Component::Preferences.as_str(),
        event = "preferences.refresh_interval.invalid",
        value = %raw
    );
}

// Refresh loop.

pub(crate) fn log_refresh_loop_started(refresh_interval_secs: u64) {
    info!(
        component = Component::Scheduler.as_str(),
        event = "refresh.loop.start",
        refresh_interval_secs
    );
}

pub(crate) fn log_refresh_loop_stopped() {
    info!(component = Component::Scheduler.as_str(), event = "refresh.loop.stopped");
}

pub(crate) fn log_refresh_loop_join_error(err: &dyn Display) {
    warn!(
        component = Component::Scheduler.as_str(),
        event = "refresh.loop.join_error",
        error = %err
    );
}

pub(crate) fn log_source_refresh_ok(rows: usize, elapsed_ms: u64) {
    info!(
        component = Component::Scheduler.as_str(),
        event = "source.refresh.ok",
        rows,
        elapsed_ms
    );
}

pub(crate) fn log_source_refresh_error(csv_url: &str, err: &SourceError) {
    warn!(
        component = Component::Scheduler.as_str(),
        event = "source.refresh.error",
        source = redacted_url(csv_url),
        error = %err
    );
}

pub(crate) fn log_refresh_interval_changed(secs: u64) {
    info!(
        component = Component::Scheduler.as_str(),
        event = "refresh.interval.changed",
        refresh_interval_secs = secs
    );
}

pub(crate) fn log_refresh_interval_persist_error(secs: u64, err: &PreferenceError) {
    warn!(
        component = Component::Scheduler.as_str(),
        event = "refresh.interval.persist_error",
        refresh_interval_secs = secs,
        error = %err
    );
}

pub(crate) fn log_countdown(text: &str) {
    debug!(
        component = Component::Scheduler.as_str(),
        event = "refresh.countdown",
        countdown = %text
    );
}

// Dashboard rendering.

pub(crate) fn log_period_rendered(period: &str, line: &str) {
    debug!(
        component = Component::Dashboard.as_str(),
        event = "dashboard.period.rendered",
        period,
        line
    );
}
