//! HTTP routes: dashboard page, JSON snapshot and refresh controls.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::aggregate::{FilterError, FilterSelection, ALL_LINES, FRANCHISE_LINES};
use crate::dashboard::{escape_html, DashboardHandle, DashboardSnapshot, KpiField};
use crate::gauge::{render_gauge_svg, ChartArea, GaugeConfig, GaugeStyle, Theme};
use crate::observability::{
    log_filter_rejected, log_http_request, log_refresh_interval_requested, log_refresh_requested,
    HttpRoute,
};
use crate::scheduler::{RefreshControl, SchedulerError};

pub const FILTER_YEARS: [i32; 3] = [2024, 2025, 2026];
pub const MONTH_NAMES: [&str; 12] = [
    "Jan", "Fev", "Mar", "Abr", "Mai", "Jun", "Jul", "Ago", "Set", "Out", "Nov", "Dez",
];
pub const REFRESH_OPTIONS_SECS: [u64; 5] = [60, 300, 600, 1800, 3600];

const KPI_CARDS: [KpiField; 7] = [
    KpiField::MonthlyGoal,
    KpiField::ProratedGoal,
    KpiField::Sales,
    KpiField::QuotationValue,
    KpiField::AtHome,
    KpiField::AwaitingRelease,
    KpiField::Invoiced,
];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashboardQuery {
    pub year: Option<String>,
    pub month: Option<String>,
    pub line: Option<String>,
    pub theme: Option<String>,
}

impl DashboardQuery {
    /// Filter for this request. Missing parts default to the current month
    /// and all lines; nothing carries over from earlier requests.
    pub fn requested_filter(&self, today: NaiveDate) -> Result<FilterSelection, FilterError> {
        let current = FilterSelection::current(today);
        let year = self
            .year
            .clone()
            .unwrap_or_else(|| current.year().to_string());
        let month = self.month.clone().unwrap_or_else(|| current.month_label());
        let line = self
            .line
            .clone()
            .unwrap_or_else(|| current.line().as_str().to_string());

        FilterSelection::parse(&year, &month, &line)
    }

    pub fn theme(&self) -> Theme {
        self.theme
            .as_deref()
            .and_then(Theme::parse)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshIntervalRequest {
    pub seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshIntervalResponse {
    pub refresh_interval_secs: u64,
}

#[derive(Clone)]
struct DashboardAppState {
    dashboard: DashboardHandle,
    refresh: RefreshControl,
    style: Arc<GaugeStyle>,
}

pub fn dashboard_router(dashboard: DashboardHandle, refresh: RefreshControl) -> Router {
    dashboard_router_with_style(dashboard, refresh, GaugeStyle::default())
}

pub fn dashboard_router_with_style(
    dashboard: DashboardHandle,
    refresh: RefreshControl,
    style: GaugeStyle,
) -> Router {
    Router::new()
        .route("/dashboard", get(get_dashboard_html))
        .route("/dashboard/snapshot", get(get_dashboard_snapshot))
        .route("/dashboard/refresh", post(post_refresh))
        .route("/dashboard/refresh-interval", post(post_refresh_interval))
        .with_state(DashboardAppState {
            dashboard,
            refresh,
            style: Arc::new(style),
        })
}

fn requested_snapshot(
    dashboard: &DashboardHandle,
    query: &DashboardQuery,
) -> Result<DashboardSnapshot, Response> {
    let today = dashboard.today();
    match query.requested_filter(today) {
        Ok(filter) => Ok(dashboard.snapshot_for(&filter, today)),
        Err(err) => {
            log_filter_rejected(&err);
            Err((StatusCode::BAD_REQUEST, err.to_string()).into_response())
        }
    }
}

async fn get_dashboard_html(
    State(state): State<DashboardAppState>,
    Query(query): Query<DashboardQuery>,
) -> Response {
    let snapshot = match requested_snapshot(&state.dashboard, &query) {
        Ok(snapshot) => snapshot,
        Err(response) => return response,
    };
    log_http_request(HttpRoute::Dashboard, &snapshot);

    let page = DashboardPage {
        snapshot: &snapshot,
        gauge_config: &state.dashboard.gauge_config(),
        style: &state.style,
        theme: query.theme(),
        current_year: state.dashboard.now().year(),
    };
    Html(render_dashboard_html(&page)).into_response()
}

async fn get_dashboard_snapshot(
    State(state): State<DashboardAppState>,
    Query(query): Query<DashboardQuery>,
) -> Response {
    match requested_snapshot(&state.dashboard, &query) {
        Ok(snapshot) => {
            log_http_request(HttpRoute::Snapshot, &snapshot);
            Json(snapshot).into_response()
        }
        Err(response) => response,
    }
}

async fn post_refresh(State(state): State<DashboardAppState>) -> Response {
    log_refresh_requested();
    match state.refresh.refresh_now().await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(err) => scheduler_error_response(err),
    }
}

async fn post_refresh_interval(
    State(state): State<DashboardAppState>,
    Json(request): Json<RefreshIntervalRequest>,
) -> Response {
    log_refresh_interval_requested(request.seconds);
    match state.refresh.set_interval(request.seconds).await {
        Ok(secs) => Json(RefreshIntervalResponse {
            refresh_interval_secs: secs,
        })
        .into_response(),
        Err(err) => scheduler_error_response(err),
    }
}

fn scheduler_error_response(err: SchedulerError) -> Response {
    let status = match err {
        SchedulerError::ZeroInterval => StatusCode::BAD_REQUEST,
        SchedulerError::LoopStopped => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, err.to_string()).into_response()
}

pub struct DashboardPage<'a> {
    pub snapshot: &'a DashboardSnapshot,
    pub gauge_config: &'a GaugeConfig,
    pub style: &'a GaugeStyle,
    pub theme: Theme,
    pub current_year: i32,
}

const PAGE_STYLE: &str = "<style>:root{--bg:#0f0c29;--panel:#1a1640;--card:#221d52;--ink:#f4f4fb;--muted:#a5a3c9;--line:rgba(255,255,255,.08);--accent:#6366f1;--good:#22c55e}body[data-theme=light]{--bg:#eef0f7;--panel:#ffffff;--card:#ffffff;--ink:#1c1f2e;--muted:#5c6275;--line:#dde1ec}*{box-sizing:border-box}body{margin:0;background:var(--bg);color:var(--ink);font-family:\"Inter\",\"Segoe UI\",sans-serif;min-height:100vh}.shell{max-width:1400px;margin:0 auto;padding:20px 16px 28px}.top{display:flex;flex-wrap:wrap;gap:16px;align-items:center;justify-content:space-between;background:var(--panel);border-radius:16px;padding:16px 20px}.top h1{margin:0;font-size:1.4rem}.meta{display:flex;gap:14px;align-items:center;flex-wrap:wrap;color:var(--muted);font-size:.88rem}.meta button,.meta select,.filters select,.filters button{background:var(--card);color:var(--ink);border:1px solid var(--line);border-radius:8px;padding:6px 10px}.filters{display:flex;gap:10px;flex-wrap:wrap;margin-top:14px}.grid{display:grid;grid-template-columns:2fr 1fr;gap:16px;margin-top:16px}.kpis{display:grid;grid-template-columns:repeat(auto-fill,minmax(190px,1fr));gap:12px}.kpi{background:var(--card);border:1px solid var(--line);border-radius:14px;padding:14px}.kpi span{display:block;color:var(--muted);font-size:.78rem;text-transform:uppercase;letter-spacing:.04em}.kpi strong{display:block;margin-top:6px;font-size:1.25rem}.gauge-card{background:var(--panel);border-radius:16px;padding:14px;text-align:center}.gauge{width:100%;max-width:360px}.gauge-value{font-size:1.3rem;font-weight:700}.gauge-percent{color:var(--accent);font-weight:700}.cards{display:grid;grid-template-columns:repeat(auto-fill,minmax(220px,1fr));gap:12px;margin-top:16px}.franchise-card{background:var(--card);border-radius:14px;padding:14px;border:1px solid var(--line)}.fra-header{display:flex;gap:10px;align-items:center}.fra-icon{width:14px;height:14px;border-radius:50%}.fra-title h3{margin:0;font-size:1rem}.fra-title span{color:var(--muted);font-size:.78rem}.fra-row{display:flex;justify-content:space-between;margin-top:8px;font-size:.88rem}.fra-label{color:var(--muted)}.on-target{color:var(--good)}@media (max-width:900px){.grid{grid-template-columns:1fr}}</style>\n";

const PAGE_SCRIPT: &str = r#"<script>
(function () {
  var el = document.getElementById('countdown');
  var parts = (el.textContent || '00:00').split(':');
  var left = parseInt(parts[0], 10) * 60 + parseInt(parts[1], 10) || 0;
  var reloading = false;
  function pad(n) { return String(n).padStart(2, '0'); }
  setInterval(function () {
    left = Math.max(left - 1, 0);
    el.textContent = pad(Math.floor(left / 60)) + ':' + pad(left % 60);
    if (left === 0 && !reloading) {
      reloading = true;
      setTimeout(function () { location.reload(); }, 2000);
    }
  }, 1000);
  document.getElementById('refresh-select').addEventListener('change', function (ev) {
    fetch('/dashboard/refresh-interval', {
      method: 'POST',
      headers: { 'Content-Type': 'application/json' },
      body: JSON.stringify({ seconds: parseInt(ev.target.value, 10) })
    }).then(function () { location.reload(); });
  });
  document.getElementById('refresh-now').addEventListener('click', function () {
    fetch('/dashboard/refresh', { method: 'POST' }).then(function () {
      setTimeout(function () { location.reload(); }, 1500);
    });
  });
})();
</script>
"#;

pub fn render_dashboard_html(page: &DashboardPage<'_>) -> String {
    let snapshot = page.snapshot;
    let theme = page.theme;

    let mut out = String::new();
    out.push_str("<!DOCTYPE html><html lang=\"pt-BR\"><head><meta charset=\"utf-8\">\n");
    out.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    out.push_str("<title>Dashboard de Vendas</title>\n");
    out.push_str(PAGE_STYLE);
    out.push_str("</head>");
    match theme {
        Theme::Light => out.push_str("<body data-theme=\"light\">"),
        Theme::Dark => out.push_str("<body>"),
    }
    out.push_str("<main class=\"shell\">\n");

    render_header(&mut out, page);
    render_filters(&mut out, page);

    out.push_str("<section class=\"grid\"><div class=\"kpis\" id=\"kpis\">\n");
    for field in KPI_CARDS {
        out.push_str(&format!(
            "<div class=\"kpi\" id=\"kpi-{}\"><span>{}</span><strong>{}</strong></div>",
            field.key(),
            escape_html(field.label()),
            escape_html(snapshot.kpi(field))
        ));
    }
    out.push_str("</div>\n");
    render_gauge(&mut out, page);
    out.push_str("</section>\n");

    out.push_str("<section class=\"cards\" id=\"franchise-container\">\n");
    for card in &snapshot.franchise_cards {
        let conversion_class = if card.conversion_on_target {
            "fra-val on-target"
        } else {
            "fra-val"
        };
        out.push_str(&format!(
            "<div class=\"franchise-card\" style=\"border-top:4px solid {color}\"><div class=\"fra-header\"><div class=\"fra-icon\" style=\"background:{color}\"></div><div class=\"fra-title\"><h3>{name}</h3><span>{period}</span></div></div>",
            color = escape_html(&card.summary.color),
            name = escape_html(&card.summary.display_name),
            period = escape_html(&card.period_label),
        ));
        for (label, value, class) in [
            ("Orçamentos", &card.quotation_text, "fra-val"),
            ("Venda", &card.sales_text, "fra-val money"),
            ("Ticket Méd.", &card.average_ticket_text, "fra-val"),
            ("Conversão", &card.conversion_text, conversion_class),
        ] {
            out.push_str(&format!(
                "<div class=\"fra-row\"><span class=\"fra-label\">{}</span><span class=\"{}\">{}</span></div>",
                label,
                class,
                escape_html(value)
            ));
        }
        out.push_str("</div>\n");
    }
    out.push_str("</section>\n");

    out.push_str("</main>\n");
    out.push_str(PAGE_SCRIPT);
    out.push_str("</body></html>\n");
    out
}

fn render_header(out: &mut String, page: &DashboardPage<'_>) {
    let snapshot = page.snapshot;
    let toggled = page.theme.toggled();
    let filter_query = snapshot
        .filter
        .as_ref()
        .map(|f| {
            format!(
                "year={}&amp;month={}&amp;line={}&amp;",
                f.year,
                f.month,
                escape_html(&urlencoding::encode(&f.line))
            )
        })
        .unwrap_or_default();

    out.push_str("<header class=\"top\"><h1>Dashboard de Vendas</h1><div class=\"meta\">");
    out.push_str(&format!(
        "<span id=\"last-update\">{}</span>",
        escape_html(snapshot.last_update.as_deref().unwrap_or("Aguardando dados"))
    ));
    out.push_str(&format!(
        "<span>Próxima atualização: <b id=\"countdown\">{}</b></span>",
        escape_html(&snapshot.countdown)
    ));

    out.push_str("<select id=\"refresh-select\" aria-label=\"Intervalo de atualização\">");
    let selected_secs = snapshot.refresh_interval_secs;
    let mut options: Vec<u64> = REFRESH_OPTIONS_SECS.to_vec();
    if let Some(secs) = selected_secs {
        if !options.contains(&secs) {
            options.push(secs);
            options.sort_unstable();
        }
    }
    for secs in options {
        let selected = if Some(secs) == selected_secs {
            " selected"
        } else {
            ""
        };
        out.push_str(&format!(
            "<option value=\"{secs}\"{selected}>{}</option>",
            refresh_option_label(secs)
        ));
    }
    out.push_str("</select>");
    out.push_str("<button id=\"refresh-now\" type=\"button\">Atualizar agora</button>");
    out.push_str(&format!(
        "<a id=\"theme-toggle\" href=\"/dashboard?{filter_query}theme={}\">Tema: {}</a>",
        toggled.as_str(),
        match page.theme {
            Theme::Dark => "escuro",
            Theme::Light => "claro",
        }
    ));
    out.push_str("</div></header>\n");
}

fn render_filters(out: &mut String, page: &DashboardPage<'_>) {
    let filter = page.snapshot.filter.as_ref();
    let selected_year = filter.map(|f| f.year).unwrap_or(page.current_year);
    let selected_month = filter.map(|f| f.month.as_str()).unwrap_or("");
    let selected_line = filter.map(|f| f.line.as_str()).unwrap_or(ALL_LINES);

    out.push_str("<form class=\"filters\" id=\"filters-form\" method=\"get\" action=\"/dashboard\">");
    out.push_str(&format!(
        "<input type=\"hidden\" name=\"theme\" value=\"{}\">",
        page.theme.as_str()
    ));

    let mut years: Vec<i32> = FILTER_YEARS.to_vec();
    for extra in [page.current_year, selected_year] {
        if !years.contains(&extra) {
            years.push(extra);
        }
    }
    years.sort_unstable();
    out.push_str("<select name=\"year\" id=\"filterAno\">");
    for year in years {
        let selected = if year == selected_year { " selected" } else { "" };
        out.push_str(&format!("<option value=\"{year}\"{selected}>{year}</option>"));
    }
    out.push_str("</select>");

    out.push_str("<select name=\"month\" id=\"filterMes\">");
    for (idx, name) in MONTH_NAMES.iter().enumerate() {
        let value = format!("{:02}", idx + 1);
        let selected = if value == selected_month { " selected" } else { "" };
        out.push_str(&format!("<option value=\"{value}\"{selected}>{name}</option>"));
    }
    out.push_str("</select>");

    out.push_str("<select name=\"line\" id=\"filterLinha\">");
    let all_selected = if selected_line == ALL_LINES { " selected" } else { "" };
    out.push_str(&format!(
        "<option value=\"{ALL_LINES}\"{all_selected}>Todas as linhas</option>"
    ));
    for line in FRANCHISE_LINES {
        let selected = if line.id == selected_line { " selected" } else { "" };
        out.push_str(&format!(
            "<option value=\"{}\"{selected}>{}</option>",
            escape_html(line.id),
            escape_html(line.display_name())
        ));
    }
    out.push_str("</select>");
    out.push_str("<button type=\"submit\">Aplicar</button></form>\n");
}

fn render_gauge(out: &mut String, page: &DashboardPage<'_>) {
    out.push_str("<div class=\"gauge-card\" id=\"gauge\">");
    if let Some(reading) = page.snapshot.gauge.as_ref() {
        out.push_str(&render_gauge_svg(
            reading,
            page.gauge_config,
            page.style,
            page.theme,
            ChartArea::default(),
        ));
        out.push_str(&format!(
            "<div class=\"gauge-value\" id=\"gauge-valor-anual\">{}</div><div class=\"gauge-percent\" id=\"gauge-percent\">{}</div>",
            escape_html(&reading.value_text),
            escape_html(&reading.percent_text)
        ));
    }
    out.push_str("</div>\n");
}

fn refresh_option_label(secs: u64) -> String {
    if secs % 60 == 0 {
        format!("{} min", secs / 60)
    } else {
        format!("{secs} s")
    }
}
