use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{Datelike, NaiveDate, TimeZone};
use regex::Regex;
use salesdash::{
    format_money, DashboardHandle, GaugeConfig, RefreshCommand, RefreshControl, SalesRecord,
};
use tokio::sync::mpsc;
use tower::util::ServiceExt;

fn record(year: i32, month: u32, line: &str, goal: f64, sales: f64, quotes: f64) -> SalesRecord {
    SalesRecord {
        year,
        month,
        line: line.to_string(),
        monthly_goal: goal,
        order_value: sales,
        quotation_value: quotes,
        order_count: 2,
        ..SalesRecord::default()
    }
}

fn seeded_dashboard() -> DashboardHandle {
    let today = NaiveDate::from_ymd_opt(2025, 1, 20).expect("valid date");
    let handle = DashboardHandle::starting_on(GaugeConfig::default(), chrono_tz::UTC, today);
    let now = chrono_tz::UTC
        .with_ymd_and_hms(2025, 1, 20, 9, 15, 0)
        .single()
        .expect("valid time");
    handle.apply_records_at(
        vec![
            record(2025, 1, "FRA - Cacau Show", 1_000.0, 600.0, 1_200.0),
            record(2025, 1, "PLB - PolyBee", 500.0, 100.0, 1_000.0),
            record(2025, 2, "FRA - Cacau Show", 2_000.0, 900.0, 0.0),
        ],
        now,
    );
    handle.set_countdown("10:00");
    handle.set_refresh_interval(600);
    handle
}

fn app_with_commands() -> (Router, mpsc::Receiver<RefreshCommand>) {
    let (control, commands) = RefreshControl::channel();
    (salesdash::dashboard_router(seeded_dashboard(), control), commands)
}

async fn get(app: Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn dashboard_page_renders_kpis_cards_gauge_and_controls() {
    let (app, _commands) = app_with_commands();
    let (status, text) = get(app, "/dashboard?year=2025&month=01").await;

    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("id=\"kpis\""));
    assert!(text.contains(&format_money(700.0)));
    assert_eq!(text.matches("class=\"franchise-card\"").count(), 5);
    assert!(text.contains("class=\"gauge-segment\""));
    assert!(text.contains("gauge-needle"));
    assert!(text.contains("name=\"year\""));
    assert!(text.contains("name=\"month\""));
    assert!(text.contains("name=\"line\""));
    assert!(text.contains("id=\"refresh-select\""));
    assert!(text.contains("Atualizar agora"));
    assert!(text.contains("setInterval("));

    let clock = Regex::new(r"Atualizado: \d{2}:\d{2}:\d{2}").unwrap();
    assert!(clock.is_match(&text));
    let countdown = Regex::new(r#"id="countdown">\d{2}:\d{2}<"#).unwrap();
    assert!(countdown.is_match(&text));
}

#[tokio::test]
async fn light_theme_query_switches_page_theme() {
    let (app, _commands) = app_with_commands();
    let (status, text) = get(app, "/dashboard?theme=light").await;

    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("data-theme=\"light\""));
    assert!(text.contains("theme=dark"));
}

#[tokio::test]
async fn snapshot_endpoint_applies_query_filters() {
    let (app, _commands) = app_with_commands();
    let (status, text) = get(
        app,
        "/dashboard/snapshot?year=2025&month=01&line=FRA%20-%20Cacau%20Show",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json["filter"]["period_label"], "01/2025");
    assert_eq!(json["filter"]["line"], "FRA - Cacau Show");
    assert_eq!(json["kpis"]["monthly_goal"], format_money(1_000.0));
    assert_eq!(json["kpis"]["sales"], format_money(600.0));
    assert_eq!(json["record_count"], 3);
    assert_eq!(json["refresh_interval_secs"], 600);

    let cards = json["franchise_cards"].as_array().unwrap();
    assert_eq!(cards.len(), 5);
    assert_eq!(cards[1]["summary"]["line_id"], "FRA - Cacau Show");
    assert_eq!(cards[1]["conversion_text"], "50.0%");
    assert_eq!(cards[1]["conversion_on_target"], true);
    assert_eq!(cards[4]["conversion_on_target"], false);
}

#[tokio::test]
async fn plain_request_shows_current_period_after_a_filtered_one() {
    let (control, _commands) = RefreshControl::channel();
    let dashboard = seeded_dashboard();
    let app = salesdash::dashboard_router(dashboard.clone(), control);

    let (status, text) = get(
        app.clone(),
        "/dashboard/snapshot?year=2024&month=02&line=PLB%20-%20PolyBee",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let filtered: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(filtered["filter"]["period_label"], "02/2024");

    let (status, text) = get(app, "/dashboard/snapshot").await;
    assert_eq!(status, StatusCode::OK);
    let fresh: serde_json::Value = serde_json::from_str(&text).unwrap();
    let today = dashboard.today();
    assert_eq!(
        fresh["filter"]["period_label"],
        format!("{:02}/{}", today.month(), today.year())
    );
    assert_eq!(fresh["filter"]["line"], "todas");
}

#[tokio::test]
async fn partial_query_does_not_inherit_other_visitors_selection() {
    let (control, _commands) = RefreshControl::channel();
    let app = salesdash::dashboard_router(seeded_dashboard(), control);

    let (status, _) = get(app.clone(), "/dashboard/snapshot?line=PLB%20-%20PolyBee").await;
    assert_eq!(status, StatusCode::OK);

    let (_, text) = get(app, "/dashboard/snapshot?year=2025&month=2").await;
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json["filter"]["month"], "02");
    assert_eq!(json["filter"]["line"], "todas");
    assert_eq!(json["kpis"]["sales"], format_money(900.0));
}

#[tokio::test]
async fn invalid_month_is_rejected() {
    let (app, _commands) = app_with_commands();
    let (status, text) = get(app, "/dashboard/snapshot?month=13").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(text.contains("13"));
}

#[tokio::test]
async fn refresh_endpoint_queues_manual_refresh() {
    let (app, mut commands) = app_with_commands();
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/dashboard/refresh")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert!(matches!(
        commands.try_recv(),
        Ok(RefreshCommand::RefreshNow)
    ));
}

#[tokio::test]
async fn refresh_endpoint_reports_stopped_loop() {
    let (app, commands) = app_with_commands();
    drop(commands);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/dashboard/refresh")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

fn interval_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/dashboard/refresh-interval")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn refresh_interval_endpoint_forwards_to_loop() {
    let (app, mut commands) = app_with_commands();
    let responder = tokio::spawn(async move {
        match commands.recv().await {
            Some(RefreshCommand::SetInterval { secs, reply }) => {
                let _ = reply.send(Ok(secs));
                secs
            }
            other => panic!("unexpected command: {other:?}"),
        }
    });

    let response = app
        .oneshot(interval_request(r#"{"seconds":120}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["refresh_interval_secs"], 120);
    assert_eq!(responder.await.unwrap(), 120);
}

#[tokio::test]
async fn zero_refresh_interval_is_rejected() {
    let (app, mut commands) = app_with_commands();
    let response = app
        .oneshot(interval_request(r#"{"seconds":0}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(commands.try_recv().is_err());
}
