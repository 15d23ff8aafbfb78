//! Dashboard controller and the rendering-sink seam it pushes results through.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::aggregate::{
    aggregate_kpis, build_franchise_summaries, year_sales_total, FilterSelection,
    FranchiseSummary, KpiAggregate,
};
use crate::gauge::{GaugeConfig, GaugeReading};
use crate::money::{format_money, format_percent};
use crate::observability::log_period_rendered;
use crate::records::SalesRecord;
use crate::scheduler::format_countdown;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KpiField {
    MonthlyGoal,
    ProratedGoal,
    Sales,
    AtHome,
    AwaitingRelease,
    Invoiced,
    QuotationValue,
    PeriodLabel,
}

impl KpiField {
    pub const ALL: [KpiField; 8] = [
        KpiField::MonthlyGoal,
        KpiField::ProratedGoal,
        KpiField::Sales,
        KpiField::AtHome,
        KpiField::AwaitingRelease,
        KpiField::Invoiced,
        KpiField::QuotationValue,
        KpiField::PeriodLabel,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::MonthlyGoal => "monthly_goal",
            Self::ProratedGoal => "prorated_goal",
            Self::Sales => "sales",
            Self::AtHome => "at_home",
            Self::AwaitingRelease => "awaiting_release",
            Self::Invoiced => "invoiced",
            Self::QuotationValue => "quotation_value",
            Self::PeriodLabel => "period_label",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::MonthlyGoal => "Meta do Mês",
            Self::ProratedGoal => "Meta Acumulada (dia)",
            Self::Sales => "Vendas",
            Self::AtHome => "Pedidos em Casa",
            Self::AwaitingRelease => "Pedidos a Liberar",
            Self::Invoiced => "Faturados no Mês",
            Self::QuotationValue => "Orçamentos",
            Self::PeriodLabel => "Referência",
        }
    }
}

/// Display-ready franchise card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FranchiseCard {
    pub summary: FranchiseSummary,
    pub period_label: String,
    pub quotation_text: String,
    pub sales_text: String,
    pub average_ticket_text: String,
    pub conversion_text: String,
    pub conversion_on_target: bool,
}

impl FranchiseCard {
    pub fn from_summary(summary: FranchiseSummary, period_label: impl Into<String>) -> Self {
        Self {
            period_label: period_label.into(),
            quotation_text: format_money(summary.quotation_total),
            sales_text: format_money(summary.sales_total),
            average_ticket_text: format_money(summary.average_ticket),
            conversion_text: format_percent(summary.conversion_rate_pct),
            conversion_on_target: summary.meets_conversion_target(),
            summary,
        }
    }
}

/// Narrow output surface of the controller.
pub trait RenderSink {
    fn set_kpi(&mut self, field: KpiField, value: String);
    fn set_franchise_card(&mut self, index: usize, card: &FranchiseCard);
    fn set_gauge_state(&mut self, gauge: &GaugeReading);
    fn set_countdown(&mut self, text: &str);
    fn set_last_update(&mut self, text: &str);
    fn set_filter(&mut self, _filter: &FilterSelection) {}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterView {
    pub year: i32,
    pub month: String,
    pub line: String,
    pub period_label: String,
}

impl From<&FilterSelection> for FilterView {
    fn from(filter: &FilterSelection) -> Self {
        Self {
            year: filter.year(),
            month: filter.month_label(),
            line: filter.line().as_str().to_string(),
            period_label: filter.period_label(),
        }
    }
}

/// Everything the page shows, as last pushed by the controller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub filter: Option<FilterView>,
    pub kpis: BTreeMap<String, String>,
    pub franchise_cards: Vec<FranchiseCard>,
    pub gauge: Option<GaugeReading>,
    pub countdown: String,
    pub last_update: Option<String>,
    pub record_count: usize,
    pub refresh_interval_secs: Option<u64>,
}

impl DashboardSnapshot {
    pub fn kpi(&self, field: KpiField) -> &str {
        self.kpis.get(field.key()).map(String::as_str).unwrap_or("-")
    }
}

impl RenderSink for DashboardSnapshot {
    fn set_kpi(&mut self, field: KpiField, value: String) {
        self.kpis.insert(field.key().to_string(), value);
    }

    fn set_franchise_card(&mut self, index: usize, card: &FranchiseCard) {
        if index < self.franchise_cards.len() {
            self.franchise_cards[index] = card.clone();
        } else {
            self.franchise_cards.push(card.clone());
        }
    }

    fn set_gauge_state(&mut self, gauge: &GaugeReading) {
        self.gauge = Some(gauge.clone());
    }

    fn set_countdown(&mut self, text: &str) {
        self.countdown = text.to_string();
    }

    fn set_last_update(&mut self, text: &str) {
        self.last_update = Some(text.to_string());
    }

    fn set_filter(&mut self, filter: &FilterSelection) {
        self.filter = Some(FilterView::from(filter));
    }
}

pub fn last_update_text(now: &DateTime<Tz>) -> String {
    format!("Atualizado: {}", now.format("%H:%M:%S"))
}

/// Owns the dataset and the current selection; every mutation re-renders the
/// affected parts into the sink.
#[derive(Debug)]
pub struct DashboardController<S: RenderSink> {
    records: Vec<SalesRecord>,
    filter: FilterSelection,
    gauge_config: GaugeConfig,
    gauge_value: f64,
    kpis: KpiAggregate,
    last_updated: Option<DateTime<Tz>>,
    sink: S,
}

impl<S: RenderSink> DashboardController<S> {
    pub fn new(gauge_config: GaugeConfig, today: NaiveDate, sink: S) -> Self {
        let mut controller = Self {
            records: Vec::new(),
            filter: FilterSelection::current(today),
            gauge_config,
            gauge_value: 0.0,
            kpis: KpiAggregate::default(),
            last_updated: None,
            sink,
        };
        controller.render_period(today);
        controller.render_gauge();
        controller
    }

    /// Replaces the dataset with a freshly fetched one.
    pub fn refresh(&mut self, records: Vec<SalesRecord>, now: DateTime<Tz>) {
        self.records = records;
        self.render_period(now.date_naive());
        self.render_gauge();
        self.last_updated = Some(now);
        self.sink.set_last_update(&last_update_text(&now));
    }

    pub fn select_filter(&mut self, filter: FilterSelection, today: NaiveDate) {
        let year_changed = filter.year() != self.filter.year();
        self.filter = filter;
        self.render_period(today);
        if year_changed {
            self.render_gauge();
        }
    }

    pub fn set_countdown(&mut self, remaining_secs: u64) {
        self.set_countdown_text(&format_countdown(remaining_secs));
    }

    pub fn set_countdown_text(&mut self, text: &str) {
        self.sink.set_countdown(text);
    }

    pub fn filter(&self) -> &FilterSelection {
        &self.filter
    }

    pub fn records(&self) -> &[SalesRecord] {
        &self.records
    }

    pub fn kpis(&self) -> &KpiAggregate {
        &self.kpis
    }

    pub fn gauge_config(&self) -> &GaugeConfig {
        &self.gauge_config
    }

    pub fn gauge_value(&self) -> f64 {
        self.gauge_value
    }

    pub fn last_updated(&self) -> Option<&DateTime<Tz>> {
        self.last_updated.as_ref()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn render_period(&mut self, today: NaiveDate) {
        self.kpis = render_period_into(&self.records, &self.filter, today, &mut self.sink);
    }

    fn render_gauge(&mut self) {
        self.gauge_value = render_gauge_into(
            &self.records,
            self.filter.year(),
            &self.gauge_config,
            &mut self.sink,
        );
    }
}

/// Pushes the filter, KPIs and the five franchise cards for one period.
fn render_period_into<S: RenderSink>(
    records: &[SalesRecord],
    filter: &FilterSelection,
    today: NaiveDate,
    sink: &mut S,
) -> KpiAggregate {
    let kpis = aggregate_kpis(records, filter, today);
    let period_label = filter.period_label();

    sink.set_filter(filter);
    sink.set_kpi(KpiField::MonthlyGoal, format_money(kpis.monthly_goal));
    sink.set_kpi(KpiField::ProratedGoal, format_money(kpis.prorated_goal));
    sink.set_kpi(KpiField::Sales, format_money(kpis.sales));
    sink.set_kpi(KpiField::AtHome, kpis.at_home.to_string());
    sink.set_kpi(KpiField::AwaitingRelease, kpis.awaiting_release.to_string());
    sink.set_kpi(KpiField::Invoiced, kpis.invoiced.to_string());
    sink.set_kpi(KpiField::QuotationValue, format_money(kpis.quotation_value));
    sink.set_kpi(KpiField::PeriodLabel, period_label.clone());

    for (index, summary) in build_franchise_summaries(records, filter)
        .into_iter()
        .enumerate()
    {
        let card = FranchiseCard::from_summary(summary, period_label.clone());
        sink.set_franchise_card(index, &card);
    }

    log_period_rendered(&period_label, filter.line().as_str());
    kpis
}

/// Pushes the annual gauge for `year` and returns the needle value.
fn render_gauge_into<S: RenderSink>(
    records: &[SalesRecord],
    year: i32,
    config: &GaugeConfig,
    sink: &mut S,
) -> f64 {
    let value = year_sales_total(records, year);
    sink.set_gauge_state(&GaugeReading::project(value, config.annual_goal));
    value
}

/// Shared, lock-protected controller used by the HTTP handlers and the
/// refresh loop.
#[derive(Clone)]
pub struct DashboardHandle {
    inner: Arc<RwLock<DashboardController<DashboardSnapshot>>>,
    timezone: Tz,
}

impl DashboardHandle {
    pub fn new(gauge_config: GaugeConfig, timezone: Tz) -> Self {
        let today = Utc::now().with_timezone(&timezone).date_naive();
        Self::starting_on(gauge_config, timezone, today)
    }

    pub fn starting_on(gauge_config: GaugeConfig, timezone: Tz, today: NaiveDate) -> Self {
        Self {
            inner: Arc::new(RwLock::new(DashboardController::new(
                gauge_config,
                today,
                DashboardSnapshot::default(),
            ))),
            timezone,
        }
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.timezone)
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        let guard = self
            .inner
            .read()
            .expect("dashboard lock should not be poisoned");
        let mut snapshot = guard.sink().clone();
        snapshot.record_count = guard.records().len();
        snapshot
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    /// Snapshot of one viewer's selection. Shared state (records, countdown,
    /// last update) is read; nothing is written back.
    pub fn snapshot_for(&self, filter: &FilterSelection, today: NaiveDate) -> DashboardSnapshot {
        let guard = self
            .inner
            .read()
            .expect("dashboard lock should not be poisoned");
        let mut snapshot = guard.sink().clone();
        snapshot.record_count = guard.records().len();
        render_period_into(guard.records(), filter, today, &mut snapshot);
        render_gauge_into(
            guard.records(),
            filter.year(),
            guard.gauge_config(),
            &mut snapshot,
        );
        snapshot
    }

    pub fn gauge_config(&self) -> GaugeConfig {
        self.inner
            .read()
            .expect("dashboard lock should not be poisoned")
            .gauge_config()
            .clone()
    }

    pub fn apply_records(&self, records: Vec<SalesRecord>) {
        self.apply_records_at(records, self.now());
    }

    pub fn apply_records_at(&self, records: Vec<SalesRecord>, now: DateTime<Tz>) {
        self.inner
            .write()
            .expect("dashboard lock should not be poisoned")
            .refresh(records, now);
    }

    pub fn set_countdown(&self, text: &str) {
        self.inner
            .write()
            .expect("dashboard lock should not be poisoned")
            .set_countdown_text(text);
    }

    pub fn set_refresh_interval(&self, secs: u64) {
        self.inner
            .write()
            .expect("dashboard lock should not be poisoned")
            .sink_mut()
            .refresh_interval_secs = Some(secs);
    }
}

pub(crate) fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
