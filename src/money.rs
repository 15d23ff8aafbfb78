//! pt-BR currency and count parsing/formatting.
//!
//! Source values use Brazilian formatting: `R$` symbol, `.` for thousands and
//! `,` for decimals. Parsing is total: anything that cannot be read becomes 0.

const CURRENCY_SYMBOL: &str = "R$";
const NBSP: char = '\u{a0}';

/// Raw money cell: either text from the CSV or a value that is already numeric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MoneyInput<'a> {
    Text(&'a str),
    Number(f64),
}

pub fn parse_money_value(input: Option<MoneyInput<'_>>) -> f64 {
    match input {
        Some(MoneyInput::Number(value)) => value,
        Some(MoneyInput::Text(text)) => parse_money(text),
        None => 0.0,
    }
}

/// Reads the leading number of the cleaned text; trailing text such as
/// `"(est.)"` is ignored.
pub fn parse_money(text: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }

    let clean: String = text
        .replacen(CURRENCY_SYMBOL, "", 1)
        .chars()
        .filter(|ch| !ch.is_whitespace())
        .filter(|ch| *ch != '.')
        .collect();
    let clean = clean.replacen(',', ".", 1);

    match leading_number(&clean, true).parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => 0.0,
    }
}

/// Leading integer of the trimmed text, so `"3.0"` reads as 3.
pub fn parse_count(text: &str) -> i64 {
    leading_number(text.trim(), false)
        .parse::<i64>()
        .unwrap_or(0)
}

/// Longest prefix shaped like `[+-]digits[.digits]`. Empty when no digit
/// is found.
fn leading_number(text: &str, allow_fraction: bool) -> &str {
    let bytes = text.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if allow_fraction && bytes.get(end) == Some(&b'.') {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        if frac_end > frac_start {
            digits += frac_end - frac_start;
            end = frac_end;
        }
    }

    if digits == 0 {
        ""
    } else {
        &text[..end]
    }
}

pub fn format_money(value: f64) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let negative = value < 0.0 && fixed.bytes().any(|b| b.is_ascii_digit() && b != b'0');
    let sign = if negative { "-" } else { "" };

    format!(
        "{sign}{CURRENCY_SYMBOL}{NBSP}{},{frac_part}",
        group_thousands(int_part)
    )
}

pub fn format_percent(value: f64) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    format!("{value:.1}%")
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    out
}
