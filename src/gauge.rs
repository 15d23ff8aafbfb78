//! Annual-goal gauge: value projection, milestone ring and needle geometry.
//!
//! Angles follow screen coordinates (y grows downward): `PI` points left,
//! `1.5 * PI` points up and `2 * PI` points right, so the dial sweeps the upper
//! half of the circle from left to right as progress grows.

use std::f64::consts::PI;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::money::{format_money, format_percent};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub name: String,
    pub value: f64,
}

impl Milestone {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Static gauge configuration. Milestones are expected to sum to the annual
/// goal but nothing enforces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaugeConfig {
    pub annual_goal: f64,
    pub milestones: Vec<Milestone>,
}

impl Default for GaugeConfig {
    fn default() -> Self {
        Self {
            annual_goal: 9_000_000.0,
            milestones: vec![
                Milestone::new("1º Trim", 1_350_000.0),
                Milestone::new("2º Trim", 3_150_000.0),
                Milestone::new("3º Trim", 3_150_000.0),
                Milestone::new("4º Trim", 1_350_000.0),
            ],
        }
    }
}

pub fn gauge_fraction(value: f64, goal: f64) -> f64 {
    if !goal.is_finite() || goal <= 0.0 || !value.is_finite() {
        return 0.0;
    }
    (value / goal).clamp(0.0, 1.0)
}

pub fn needle_angle(fraction: f64) -> f64 {
    PI + fraction.clamp(0.0, 1.0) * PI
}

pub fn percent_text(fraction: f64) -> String {
    format_percent(fraction * 100.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaugeReading {
    pub value: f64,
    pub goal: f64,
    pub fraction: f64,
    pub angle_rad: f64,
    pub value_text: String,
    pub percent_text: String,
}

impl GaugeReading {
    pub fn project(value: f64, goal: f64) -> Self {
        let fraction = gauge_fraction(value, goal);
        Self {
            value,
            goal,
            fraction,
            angle_rad: needle_angle(fraction),
            value_text: format_money(value),
            percent_text: percent_text(fraction),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "dark" => Some(Self::Dark),
            "light" => Some(Self::Light),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dark => "dark",
            Self::Light => "light",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Dark => Self::Light,
            Self::Light => Self::Dark,
        }
    }
}

/// Visual parameters of the dial. Layout variants differ only in these values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaugeStyle {
    /// Pivot sits at `top + height / pivot_offset_divisor`.
    pub pivot_offset_divisor: f64,
    /// Needle length is `height / needle_length_divisor`.
    pub needle_length_divisor: f64,
    pub needle_half_width: f64,
    pub pivot_radius: f64,
    pub pivot_color: String,
    pub needle_color_light: String,
    pub needle_color_dark: String,
    pub segment_colors: Vec<String>,
    pub border_width: f64,
    pub border_color: String,
    /// Inner radius as a share of the outer radius.
    pub cutout_ratio: f64,
}

impl Default for GaugeStyle {
    fn default() -> Self {
        Self {
            pivot_offset_divisor: 1.35,
            needle_length_divisor: 1.6,
            needle_half_width: 5.0,
            pivot_radius: 8.0,
            pivot_color: "#6366f1".to_string(),
            needle_color_light: "#333".to_string(),
            needle_color_dark: "#fff".to_string(),
            segment_colors: ["#1e293b", "#334155", "#475569", "#64748b"]
                .iter()
                .map(|color| (*color).to_string())
                .collect(),
            border_width: 2.0,
            border_color: "#1a1640".to_string(),
            cutout_ratio: 0.75,
        }
    }
}

impl GaugeStyle {
    pub fn needle_color(&self, theme: Theme) -> &str {
        match theme {
            Theme::Light => &self.needle_color_light,
            Theme::Dark => &self.needle_color_dark,
        }
    }

    pub fn pivot(&self, area: ChartArea) -> Point {
        Point {
            x: area.left + area.width / 2.0,
            y: area.top + area.height / self.pivot_offset_divisor,
        }
    }

    pub fn outer_radius(&self, area: ChartArea) -> f64 {
        let pivot = self.pivot(area);
        ((pivot.y - area.top).min(area.width / 2.0) - self.border_width).max(0.0)
    }

    /// Needle triangle for a progress fraction: base centred on the pivot,
    /// tip pointing along the projected angle.
    pub fn needle(&self, area: ChartArea, fraction: f64, theme: Theme) -> NeedleGeometry {
        let pivot = self.pivot(area);
        let angle = needle_angle(fraction);
        let length = area.height / self.needle_length_divisor;

        NeedleGeometry {
            pivot,
            tip: pivot.rotated_offset(angle, length, 0.0),
            base_left: pivot.rotated_offset(angle, 0.0, -self.needle_half_width),
            base_right: pivot.rotated_offset(angle, 0.0, self.needle_half_width),
            pivot_radius: self.pivot_radius,
            color: self.needle_color(theme).to_string(),
        }
    }

    pub fn ring_segments(&self, milestones: &[Milestone]) -> Vec<RingSegment> {
        let total: f64 = milestones.iter().map(|m| m.value.max(0.0)).sum();
        let count = milestones.len().max(1) as f64;

        let mut start = PI;
        milestones
            .iter()
            .enumerate()
            .map(|(idx, milestone)| {
                let share = if total > 0.0 {
                    milestone.value.max(0.0) / total
                } else {
                    1.0 / count
                };
                let end = start + share * PI;
                let segment = RingSegment {
                    name: milestone.name.clone(),
                    value: milestone.value,
                    share,
                    start_angle: start,
                    end_angle: end,
                    color: self
                        .segment_colors
                        .get(idx % self.segment_colors.len().max(1))
                        .cloned()
                        .unwrap_or_else(|| self.border_color.clone()),
                };
                start = end;
                segment
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartArea {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Default for ChartArea {
    fn default() -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            width: 320.0,
            height: 200.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// Offset `(dx, dy)` in a frame rotated by `angle`, translated to `self`.
    fn rotated_offset(self, angle: f64, dx: f64, dy: f64) -> Point {
        let (sin, cos) = angle.sin_cos();
        Point {
            x: self.x + dx * cos - dy * sin,
            y: self.y + dx * sin + dy * cos,
        }
    }

    fn on_circle(center: Point, radius: f64, angle: f64) -> Point {
        center.rotated_offset(angle, radius, 0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeedleGeometry {
    pub pivot: Point,
    pub tip: Point,
    pub base_left: Point,
    pub base_right: Point,
    pub pivot_radius: f64,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RingSegment {
    pub name: String,
    pub value: f64,
    pub share: f64,
    pub start_angle: f64,
    pub end_angle: f64,
    pub color: String,
}

pub fn render_gauge_svg(
    reading: &GaugeReading,
    config: &GaugeConfig,
    style: &GaugeStyle,
    theme: Theme,
    area: ChartArea,
) -> String {
    let center = style.pivot(area);
    let outer = style.outer_radius(area);
    let inner = outer * style.cutout_ratio;
    let needle = style.needle(area, reading.fraction, theme);

    let mut out = String::new();
    let _ = write!(
        out,
        "<svg class=\"gauge\" viewBox=\"{:.0} {:.0} {:.0} {:.0}\" role=\"img\" aria-label=\"{}\">",
        area.left, area.top, area.width, area.height, reading.percent_text
    );

    for segment in style.ring_segments(&config.milestones) {
        let outer_start = Point::on_circle(center, outer, segment.start_angle);
        let outer_end = Point::on_circle(center, outer, segment.end_angle);
        let inner_end = Point::on_circle(center, inner, segment.end_angle);
        let inner_start = Point::on_circle(center, inner, segment.start_angle);
        let large_arc = u8::from(segment.end_angle - segment.start_angle > PI);

        let _ = write!(
            out,
            "<path class=\"gauge-segment\" d=\"M {:.2} {:.2} A {outer:.2} {outer:.2} 0 {large_arc} 1 {:.2} {:.2} L {:.2} {:.2} A {inner:.2} {inner:.2} 0 {large_arc} 0 {:.2} {:.2} Z\" fill=\"{}\" stroke=\"{}\" stroke-width=\"{}\"><title>{}: {}</title></path>",
            outer_start.x,
            outer_start.y,
            outer_end.x,
            outer_end.y,
            inner_end.x,
            inner_end.y,
            inner_start.x,
            inner_start.y,
            segment.color,
            style.border_color,
            style.border_width,
            crate::dashboard::escape_html(&segment.name),
            format_money(segment.value),
        );
    }

    let _ = write!(
        out,
        "<polygon class=\"gauge-needle\" points=\"{:.2},{:.2} {:.2},{:.2} {:.2},{:.2}\" fill=\"{}\"/>",
        needle.base_left.x,
        needle.base_left.y,
        needle.tip.x,
        needle.tip.y,
        needle.base_right.x,
        needle.base_right.y,
        needle.color
    );
    let _ = write!(
        out,
        "<circle class=\"gauge-pivot\" cx=\"{:.2}\" cy=\"{:.2}\" r=\"{}\" fill=\"{}\"/>",
        needle.pivot.x, needle.pivot.y, needle.pivot_radius, style.pivot_color
    );
    out.push_str("</svg>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn fraction_is_clamped_to_unit_interval() {
        assert_eq!(gauge_fraction(0.0, 100.0), 0.0);
        assert_eq!(gauge_fraction(100.0, 100.0), 1.0);
        assert_eq!(gauge_fraction(200.0, 100.0), 1.0);
        assert_eq!(gauge_fraction(-50.0, 100.0), 0.0);
        assert_eq!(gauge_fraction(25.0, 100.0), 0.25);
    }

    #[test]
    fn non_positive_goal_projects_to_zero() {
        assert_eq!(gauge_fraction(10.0, 0.0), 0.0);
        assert_eq!(gauge_fraction(10.0, -1.0), 0.0);
        assert_eq!(gauge_fraction(f64::NAN, 10.0), 0.0);
    }

    #[test]
    fn angle_spans_pi_to_two_pi() {
        assert!((needle_angle(0.0) - PI).abs() < EPS);
        assert!((needle_angle(1.0) - 2.0 * PI).abs() < EPS);
        assert!((needle_angle(0.5) - 1.5 * PI).abs() < EPS);
    }

    #[test]
    fn reading_formats_value_and_percent() {
        let reading = GaugeReading::project(4_500_000.0, 9_000_000.0);
        assert_eq!(reading.fraction, 0.5);
        assert_eq!(reading.percent_text, "50.0%");
        assert!(reading.value_text.contains("4.500.000,00"));

        let over = GaugeReading::project(10_000_000.0, 9_000_000.0);
        assert_eq!(over.percent_text, "100.0%");
    }

    #[test]
    fn needle_points_left_up_and_right() {
        let style = GaugeStyle::default();
        let area = ChartArea::default();
        let pivot = style.pivot(area);
        let length = area.height / style.needle_length_divisor;

        let empty = style.needle(area, 0.0, Theme::Dark);
        assert!((empty.tip.x - (pivot.x - length)).abs() < EPS);
        assert!((empty.tip.y - pivot.y).abs() < EPS);

        let half = style.needle(area, 0.5, Theme::Dark);
        assert!((half.tip.x - pivot.x).abs() < 1e-6);
        assert!((half.tip.y - (pivot.y - length)).abs() < EPS);

        let full = style.needle(area, 1.0, Theme::Dark);
        assert!((full.tip.x - (pivot.x + length)).abs() < EPS);

        let spread = (empty.base_left.y - empty.base_right.y).abs();
        assert!((spread - 2.0 * style.needle_half_width).abs() < EPS);
    }

    #[test]
    fn needle_color_follows_theme() {
        let style = GaugeStyle::default();
        let area = ChartArea::default();
        assert_eq!(style.needle(area, 0.3, Theme::Light).color, "#333");
        assert_eq!(style.needle(area, 0.3, Theme::Dark).color, "#fff");
        assert_eq!(Theme::Dark.toggled(), Theme::Light);
        assert_eq!(Theme::parse(" LIGHT "), Some(Theme::Light));
        assert_eq!(Theme::parse("sepia"), None);
    }

    #[test]
    fn ring_segments_are_proportional_to_milestones() {
        let style = GaugeStyle::default();
        let segments = style.ring_segments(&GaugeConfig::default().milestones);

        assert_eq!(segments.len(), 4);
        assert!((segments[0].share - 0.15).abs() < EPS);
        assert!((segments[1].share - 0.35).abs() < EPS);
        assert!((segments[0].start_angle - PI).abs() < EPS);
        assert!((segments[3].end_angle - 2.0 * PI).abs() < EPS);
        assert!((segments[1].start_angle - segments[0].end_angle).abs() < EPS);
        assert_eq!(segments[2].color, "#475569");
    }

    #[test]
    fn zero_milestones_split_evenly() {
        let style = GaugeStyle::default();
        let milestones = vec![Milestone::new("a", 0.0), Milestone::new("b", 0.0)];
        let segments = style.ring_segments(&milestones);

        assert!((segments[0].share - 0.5).abs() < EPS);
        assert!((segments[1].end_angle - 2.0 * PI).abs() < EPS);
    }

    #[test]
    fn svg_contains_ring_needle_and_pivot() {
        let config = GaugeConfig::default();
        let reading = GaugeReading::project(1_000_000.0, config.annual_goal);
        let svg = render_gauge_svg(
            &reading,
            &config,
            &GaugeStyle::default(),
            Theme::Light,
            ChartArea::default(),
        );

        assert_eq!(svg.matches("gauge-segment").count(), 4);
        assert!(svg.contains("gauge-needle"));
        assert!(svg.contains("fill=\"#333\""));
        assert!(svg.contains("gauge-pivot"));
        assert!(svg.contains("1º Trim"));
    }
}
