use std::sync::Arc;

use salesdash::{
    dashboard_config_from_env, dashboard_router, init_logging, load_refresh_interval,
    log_app_bind, log_app_shutdown, log_app_start, log_source_selected, logging_config_from_env,
    spawn_refresh_loop, DashboardHandle, FilePreferenceStore, PreferenceStore, RefreshScheduler,
    ReqwestCsvFetcher,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;
    log_app_start(&logging_cfg);

    let cfg = dashboard_config_from_env()?;

    let prefs: Arc<dyn PreferenceStore> =
        Arc::new(FilePreferenceStore::new(cfg.prefs_path.clone()));
    let refresh_secs = load_refresh_interval(prefs.as_ref());
    let scheduler = RefreshScheduler::new(refresh_secs)?;

    let dashboard = DashboardHandle::new(cfg.gauge.clone(), cfg.timezone);
    let fetcher = ReqwestCsvFetcher::new(cfg.http_timeout_ms)?;
    log_source_selected(&cfg.csv_url, refresh_secs, cfg.timezone.name());

    let refresh_loop = spawn_refresh_loop(
        dashboard.clone(),
        fetcher,
        prefs,
        cfg.csv_url.clone(),
        scheduler,
    );

    let app = dashboard_router(dashboard, refresh_loop.control.clone());
    let listener = tokio::net::TcpListener::bind(cfg.bind_addr).await?;
    let bound_addr = listener.local_addr()?;

    log_app_bind(bound_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    refresh_loop.shutdown().await;
    log_app_shutdown();

    Ok(())
}
