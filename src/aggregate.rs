//! Period/line filtering and KPI reduction over the sales record set.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::records::{parse_month, SalesRecord};

/// Wildcard accepted by the line filter.
pub const ALL_LINES: &str = "todas";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LineFilter {
    All,
    Line(String),
}

impl LineFilter {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == ALL_LINES {
            Self::All
        } else {
            Self::Line(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::All => ALL_LINES,
            Self::Line(line) => line,
        }
    }

    pub fn matches(&self, record_line: &str) -> bool {
        match self {
            Self::All => true,
            Self::Line(line) => record_line.trim() == line,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("invalid year: {0}")]
    InvalidYear(String),
    #[error("invalid month: {0} (expected 01-12)")]
    InvalidMonth(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilterSelection {
    year: i32,
    month: u32,
    line: LineFilter,
}

impl FilterSelection {
    pub fn new(year: i32, month: u32, line: LineFilter) -> Result<Self, FilterError> {
        if !(1..=9999).contains(&year) {
            return Err(FilterError::InvalidYear(year.to_string()));
        }
        if !(1..=12).contains(&month) {
            return Err(FilterError::InvalidMonth(month.to_string()));
        }
        Ok(Self { year, month, line })
    }

    /// Current calendar month, all lines.
    pub fn current(today: NaiveDate) -> Self {
        Self {
            year: today.year(),
            month: today.month(),
            line: LineFilter::All,
        }
    }

    pub fn parse(year: &str, month: &str, line: &str) -> Result<Self, FilterError> {
        let parsed_year = year
            .trim()
            .parse::<i32>()
            .map_err(|_| FilterError::InvalidYear(year.to_string()))?;
        let parsed_month = match parse_month(month) {
            0 => return Err(FilterError::InvalidMonth(month.to_string())),
            value => value,
        };
        Self::new(parsed_year, parsed_month, LineFilter::parse(line))
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn line(&self) -> &LineFilter {
        &self.line
    }

    pub fn month_label(&self) -> String {
        format!("{:02}", self.month)
    }

    /// `MM/YYYY`, shown next to the KPIs and on each card.
    pub fn period_label(&self) -> String {
        format!("{:02}/{}", self.month, self.year)
    }

    pub fn with_year(&self, year: i32) -> Result<Self, FilterError> {
        Self::new(year, self.month, self.line.clone())
    }

    pub fn with_month(&self, month: u32) -> Result<Self, FilterError> {
        Self::new(self.year, month, self.line.clone())
    }

    pub fn with_line(&self, line: LineFilter) -> Self {
        Self {
            line,
            ..self.clone()
        }
    }

    pub fn matches_period(&self, record: &SalesRecord) -> bool {
        record.year == self.year && record.month == self.month
    }

    pub fn matches(&self, record: &SalesRecord) -> bool {
        self.matches_period(record) && self.line.matches(&record.line)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct KpiAggregate {
    pub monthly_goal: f64,
    pub prorated_goal: f64,
    pub sales: f64,
    pub at_home: i64,
    pub awaiting_release: i64,
    pub invoiced: i64,
    pub quotation_value: f64,
}

pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let (next_year, next_month) = if month == 12 {
        (year.checked_add(1)?, 1)
    } else {
        (year, month.checked_add(1)?)
    };
    NaiveDate::from_ymd_opt(year, month, 1)?;
    let last = NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()?;
    Some(last.day())
}

/// Days counted toward the prorated goal. Only the running month is partial;
/// past and future months count in full.
pub fn elapsed_days(filter: &FilterSelection, today: NaiveDate) -> u32 {
    let total = days_in_month(filter.year, filter.month).unwrap_or(0);
    if today.year() == filter.year && today.month() == filter.month {
        today.day()
    } else {
        total
    }
}

pub fn prorated_goal(monthly_goal: f64, filter: &FilterSelection, today: NaiveDate) -> f64 {
    match days_in_month(filter.year, filter.month) {
        Some(days) if days > 0 => {
            (monthly_goal / f64::from(days)) * f64::from(elapsed_days(filter, today))
        }
        _ => 0.0,
    }
}

pub fn aggregate_kpis(
    records: &[SalesRecord],
    filter: &FilterSelection,
    today: NaiveDate,
) -> KpiAggregate {
    let mut kpis = records
        .iter()
        .filter(|record| filter.matches(record))
        .fold(KpiAggregate::default(), |mut acc, record| {
            acc.monthly_goal += record.monthly_goal;
            acc.sales += record.order_value;
            acc.at_home += record.at_home;
            acc.awaiting_release += record.awaiting_release;
            acc.invoiced += record.invoiced_this_month;
            acc.quotation_value += record.quotation_value;
            acc
        });

    kpis.prorated_goal = prorated_goal(kpis.monthly_goal, filter, today);
    kpis
}

/// Year-to-date sales across every month and line; drives the gauge needle.
pub fn year_sales_total(records: &[SalesRecord], year: i32) -> f64 {
    records
        .iter()
        .filter(|record| record.year == year)
        .map(|record| record.order_value)
        .sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FranchiseLine {
    pub id: &'static str,
    pub color: &'static str,
}

impl FranchiseLine {
    pub fn display_name(&self) -> &'static str {
        ["FRA - ", "IND - ", "PLB - "]
            .iter()
            .find_map(|prefix| self.id.strip_prefix(*prefix))
            .unwrap_or(self.id)
    }
}

pub const FRANCHISE_LINES: [FranchiseLine; 5] = [
    FranchiseLine {
        id: "FRA - Brasil Cacau",
        color: "#f97316",
    },
    FranchiseLine {
        id: "FRA - Cacau Show",
        color: "#8b4513",
    },
    FranchiseLine {
        id: "FRA - Kopenhagen",
        color: "#e11d48",
    },
    FranchiseLine {
        id: "IND - Industries",
        color: "#3b82f6",
    },
    FranchiseLine {
        id: "PLB - PolyBee",
        color: "#fbbf24",
    },
];

pub const CONVERSION_TARGET_PCT: f64 = 30.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FranchiseSummary {
    pub line_id: String,
    pub display_name: String,
    pub color: String,
    pub quotation_total: f64,
    pub sales_total: f64,
    pub order_count: i64,
    pub conversion_rate_pct: f64,
    pub average_ticket: f64,
}

impl FranchiseSummary {
    fn from_totals(
        line: &FranchiseLine,
        quotation_total: f64,
        sales_total: f64,
        order_count: i64,
    ) -> Self {
        let conversion_rate_pct = if quotation_total > 0.0 {
            (sales_total / quotation_total) * 100.0
        } else {
            0.0
        };
        let average_ticket = if order_count > 0 {
            sales_total / order_count as f64
        } else {
            0.0
        };

        Self {
            line_id: line.id.to_string(),
            display_name: line.display_name().to_string(),
            color: line.color.to_string(),
            quotation_total,
            sales_total,
            order_count,
            conversion_rate_pct,
            average_ticket,
        }
    }

    pub fn meets_conversion_target(&self) -> bool {
        self.conversion_rate_pct >= CONVERSION_TARGET_PCT
    }
}

/// One summary per fixed franchise line, in display order. The selection's
/// line filter does not apply here: each card filters on its own line.
pub fn build_franchise_summaries(
    records: &[SalesRecord],
    filter: &FilterSelection,
) -> Vec<FranchiseSummary> {
    FRANCHISE_LINES
        .iter()
        .map(|line| {
            let (quotation_total, sales_total, order_count) = records
                .iter()
                .filter(|record| filter.matches_period(record) && record.trimmed_line() == line.id)
                .fold((0.0, 0.0, 0_i64), |(quotes, sales, orders), record| {
                    (
                        quotes + record.quotation_value,
                        sales + record.order_value,
                        orders + record.order_count,
                    )
                });
            FranchiseSummary::from_totals(line, quotation_total, sales_total, order_count)
        })
        .collect()
}
