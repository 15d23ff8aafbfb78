//! Sales dashboard core crate.
//!
//! Current implemented scope:
//! - published-sheet CSV download and row parsing
//! - monthly KPI, franchise card and annual gauge aggregation
//! - countdown-driven refresh loop with a persisted interval
//! - axum routes serving the rendered page and a JSON snapshot

mod aggregate;
mod config;
mod dashboard;
mod gauge;
mod money;
mod observability;
mod preferences;
mod records;
mod scheduler;
mod source;
mod web;

pub use aggregate::{
    aggregate_kpis, build_franchise_summaries, days_in_month, elapsed_days, prorated_goal,
    year_sales_total, FilterError, FilterSelection, FranchiseLine, FranchiseSummary,
    KpiAggregate, LineFilter, ALL_LINES, CONVERSION_TARGET_PCT, FRANCHISE_LINES,
};
pub use config::{
    dashboard_config_from_env, dashboard_config_from_lookup, parse_milestones, ConfigError,
    DashboardConfig, DEFAULT_BIND_ADDR, DEFAULT_CSV_URL, DEFAULT_TIMEZONE,
};
pub use dashboard::{
    last_update_text, DashboardController, DashboardHandle, DashboardSnapshot, FilterView,
    FranchiseCard, KpiField, RenderSink,
};
pub use gauge::{
    gauge_fraction, needle_angle, percent_text, render_gauge_svg, ChartArea, GaugeConfig,
    GaugeReading, GaugeStyle, Milestone, NeedleGeometry, Point, RingSegment, Theme,
};
pub use money::{
    format_money, format_percent, parse_count, parse_money, parse_money_value, MoneyInput,
};
pub use observability::{
    init_logging, log_app_bind, log_app_shutdown, log_app_start, log_source_selected,
    logging_config_from_env, Component, HttpRoute, LogFormat, LoggingConfig, LoggingInitError,
    LOG_FORMAT_VAR, LOG_LEVEL_VAR, LOG_TARGET_VAR,
};
pub use preferences::{
    load_refresh_interval, save_refresh_interval, FilePreferenceStore, InMemoryPreferenceStore,
    PreferenceError, PreferenceStore, DEFAULT_REFRESH_SECS, REFRESH_PREFERENCE_KEY,
};
pub use records::{parse_month, parse_sales_csv, parse_year, SalesRecord, SALES_CSV_HEADERS};
pub use scheduler::{
    format_countdown, spawn_refresh_loop, RefreshCommand, RefreshControl, RefreshLoopHandle,
    RefreshScheduler, SchedulerError, SchedulerState, TickOutcome,
};
pub use source::{
    cache_busted_url, fetch_sales_records, redacted_url, CsvFetcher, ReqwestCsvFetcher,
    SourceError,
};
pub use web::{
    dashboard_router, dashboard_router_with_style, render_dashboard_html, DashboardPage,
    DashboardQuery, RefreshIntervalRequest, RefreshIntervalResponse, FILTER_YEARS, MONTH_NAMES,
    REFRESH_OPTIONS_SECS,
};
