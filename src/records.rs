//! Header-keyed sales CSV loading.

use csv::StringRecord;
use serde::{Deserialize, Serialize};

use crate::money::{parse_count, parse_money};
use crate::observability::{log_headers_missing, log_row_skipped, log_rows_skipped};

pub const SALES_CSV_HEADERS: [&str; 10] = [
    "ANO",
    "MES",
    "LINHA",
    "META_MES",
    "VALOR_PEDIDOS",
    "PEDIDOS_EM_CASA",
    "PEDIDOS_A_LIBERAR",
    "PEDIDOS_FATURADOS_MES",
    "VALOR_ORCAMENTOS",
    "QTDE_PEDIDOS",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    pub year: i32,
    /// 1-12, or 0 when the source cell is not a valid month.
    pub month: u32,
    /// Kept as read; comparisons trim it.
    pub line: String,
    pub monthly_goal: f64,
    pub order_value: f64,
    pub quotation_value: f64,
    pub at_home: i64,
    pub awaiting_release: i64,
    pub invoiced_this_month: i64,
    pub order_count: i64,
}

impl SalesRecord {
    pub fn trimmed_line(&self) -> &str {
        self.line.trim()
    }
}

pub fn parse_year(raw: &str) -> i32 {
    i32::try_from(parse_count(raw)).unwrap_or(0)
}

pub fn parse_month(raw: &str) -> u32 {
    match u32::try_from(parse_count(raw)) {
        Ok(month @ 1..=12) => month,
        _ => 0,
    }
}

/// Column positions resolved from the header row. Absent columns stay `None`
/// and read as empty cells.
#[derive(Debug, Clone, Copy, Default)]
struct ColumnIndex {
    year: Option<usize>,
    month: Option<usize>,
    line: Option<usize>,
    monthly_goal: Option<usize>,
    order_value: Option<usize>,
    at_home: Option<usize>,
    awaiting_release: Option<usize>,
    invoiced_this_month: Option<usize>,
    quotation_value: Option<usize>,
    order_count: Option<usize>,
}

impl ColumnIndex {
    fn from_headers(headers: &StringRecord) -> Self {
        let find = |name: &str| headers.iter().position(|header| header.trim() == name);
        Self {
            year: find("ANO"),
            month: find("MES"),
            line: find("LINHA"),
            monthly_goal: find("META_MES"),
            order_value: find("VALOR_PEDIDOS"),
            at_home: find("PEDIDOS_EM_CASA"),
            awaiting_release: find("PEDIDOS_A_LIBERAR"),
            invoiced_this_month: find("PEDIDOS_FATURADOS_MES"),
            quotation_value: find("VALOR_ORCAMENTOS"),
            order_count: find("QTDE_PEDIDOS"),
        }
    }

    fn missing_headers(&self) -> Vec<&'static str> {
        let slots = [
            self.year,
            self.month,
            self.line,
            self.monthly_goal,
            self.order_value,
            self.at_home,
            self.awaiting_release,
            self.invoiced_this_month,
            self.quotation_value,
            self.order_count,
        ];
        SALES_CSV_HEADERS
            .iter()
            .zip(slots)
            .filter(|(_, slot)| slot.is_none())
            .map(|(name, _)| *name)
            .collect()
    }
}

fn cell<'r>(record: &'r StringRecord, idx: Option<usize>) -> &'r str {
    idx.and_then(|idx| record.get(idx)).unwrap_or_default()
}

fn parse_sales_record(record: &StringRecord, columns: &ColumnIndex) -> SalesRecord {
    SalesRecord {
        year: parse_year(cell(record, columns.year)),
        month: parse_month(cell(record, columns.month)),
        line: cell(record, columns.line).to_string(),
        monthly_goal: parse_money(cell(record, columns.monthly_goal)),
        order_value: parse_money(cell(record, columns.order_value)),
        quotation_value: parse_money(cell(record, columns.quotation_value)),
        at_home: parse_count(cell(record, columns.at_home)),
        awaiting_release: parse_count(cell(record, columns.awaiting_release)),
        invoiced_this_month: parse_count(cell(record, columns.invoiced_this_month)),
        order_count: parse_count(cell(record, columns.order_count)),
    }
}

/// Parses the published sheet. Only an unreadable header row fails the batch;
/// bad rows are skipped and bad cells read as zero.
pub fn parse_sales_csv(text: &str) -> Result<Vec<SalesRecord>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let columns = ColumnIndex::from_headers(reader.headers()?);
    let missing = columns.missing_headers();
    if !missing.is_empty() {
        log_headers_missing(&missing);
    }

    let mut rows = Vec::new();
    let mut skipped: u64 = 0;
    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                skipped += 1;
                log_row_skipped(&err);
                continue;
            }
        };

        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }

        rows.push(parse_sales_record(&record, &columns));
    }

    if skipped > 0 {
        log_rows_skipped(skipped);
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "ANO,MES,LINHA,META_MES,VALOR_PEDIDOS,PEDIDOS_EM_CASA,PEDIDOS_A_LIBERAR,PEDIDOS_FATURADOS_MES,VALOR_ORCAMENTOS,QTDE_PEDIDOS\n\
2025,01,FRA - Cacau Show,\"R$ 1.000,00\",\"R$ 500,00\",3,2,1,\"R$ 2.000,00\",4\n\
2025,1,  FRA - Kopenhagen  ,,\"R$ 300,50\",,,,,\n";

    #[test]
    fn parses_rows_by_header_name() {
        let rows = parse_sales_csv(SAMPLE).expect("sample should parse");
        assert_eq!(rows.len(), 2);

        let first = &rows[0];
        assert_eq!(first.year, 2025);
        assert_eq!(first.month, 1);
        assert_eq!(first.line, "FRA - Cacau Show");
        assert_eq!(first.monthly_goal, 1000.0);
        assert_eq!(first.order_value, 500.0);
        assert_eq!(first.at_home, 3);
        assert_eq!(first.awaiting_release, 2);
        assert_eq!(first.invoiced_this_month, 1);
        assert_eq!(first.quotation_value, 2000.0);
        assert_eq!(first.order_count, 4);
    }

    #[test]
    fn empty_cells_read_as_zero_and_line_is_trimmed_on_access() {
        let rows = parse_sales_csv(SAMPLE).expect("sample should parse");
        let second = &rows[1];

        assert_eq!(second.month, 1);
        assert_eq!(second.monthly_goal, 0.0);
        assert_eq!(second.order_value, 300.5);
        assert_eq!(second.order_count, 0);
        assert_eq!(second.trimmed_line(), "FRA - Kopenhagen");
    }

    #[test]
    fn reordered_and_missing_columns_are_tolerated() {
        let csv = "MES,ANO,VALOR_PEDIDOS\n03,2024,\"R$ 10,00\"\n\n,,\n";
        let rows = parse_sales_csv(csv).expect("csv should parse");

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].year, 2024);
        assert_eq!(rows[0].month, 3);
        assert_eq!(rows[0].order_value, 10.0);
        assert_eq!(rows[0].line, "");
        assert_eq!(rows[0].quotation_value, 0.0);
    }

    #[test]
    fn unparseable_numeric_cells_become_zero() {
        let csv = "ANO,MES,LINHA,META_MES,QTDE_PEDIDOS\nabc,13,X,oops,many\n";
        let rows = parse_sales_csv(csv).expect("csv should parse");

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].year, 0);
        assert_eq!(rows[0].month, 0);
        assert_eq!(rows[0].monthly_goal, 0.0);
        assert_eq!(rows[0].order_count, 0);
    }
}
