//! Output formatters for comparison reports.

use std::time::Duration;

use clap::ValueEnum;
use comfy_table::{Cell, Table};
use querybench_core::{BenchmarkResult, ComparisonReport, QuerySpec, RowSet, Value};

/// Output format for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format
    Table,
    /// JSON format
    Json,
    /// CSV format
    Csv,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

/// Trait for formatting output.
pub trait Formatter: Send + Sync {
    /// Format a comparison report. `specs` are the submitted queries, in
    /// the same order as the report's results.
    fn format_report(&self, report: &ComparisonReport, specs: &[QuerySpec]) -> String;

    /// Format an error message.
    fn format_error(&self, error: &str) -> String;
}

/// Create a formatter for the given output format.
pub fn create_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Table => Box::new(TableFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Csv => Box::new(CsvFormatter),
    }
}

/// Table formatter using comfy-table.
pub struct TableFormatter;

impl Formatter for TableFormatter {
    fn format_report(&self, report: &ComparisonReport, specs: &[QuerySpec]) -> String {
        let mut output = String::new();

        for (result, spec) in report.iter().zip(specs) {
            if !output.is_empty() {
                output.push_str("\n\n");
            }
            output.push_str(&format!("{} [{}]\n", result.name(), result.backend_id()));
            output.push_str(&format!("SQL: {}\n", spec.statement()));
            output.push_str(&format!("Elapsed: {}\n", format_elapsed(result.elapsed())));
            match result.error() {
                Some(error) => output.push_str(&format!("Error: {}", error)),
                None => output.push_str(&format_rows_as_table(result.rows())),
            }
        }

        if output.is_empty() {
            return "No results".to_string();
        }

        output.push_str("\n\n");
        output.push_str(&format_timing_table(report));
        if let Some(summary) = summary_line(report) {
            output.push('\n');
            output.push_str(&summary);
        }
        output
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}", error)
    }
}

/// JSON formatter.
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format_report(&self, report: &ComparisonReport, _specs: &[QuerySpec]) -> String {
        let mut json = serde_json::to_value(report).unwrap_or(serde_json::Value::Null);
        if let Some(summary) = summary_line(report) {
            if let Some(obj) = json.as_object_mut() {
                obj.insert("summary".to_string(), serde_json::Value::String(summary));
            }
        }
        serde_json::to_string_pretty(&json).unwrap_or_else(|_| "{}".to_string())
    }

    fn format_error(&self, error: &str) -> String {
        serde_json::json!({
            "error": error
        })
        .to_string()
    }
}

/// CSV formatter.
///
/// One line per query with timing and row count; row contents are omitted
/// since the compared result sets need not share a schema.
pub struct CsvFormatter;

impl Formatter for CsvFormatter {
    fn format_report(&self, report: &ComparisonReport, _specs: &[QuerySpec]) -> String {
        let mut output = String::from("name,backend,elapsed_ms,rows,error\n");
        for result in report {
            output.push_str(&format!(
                "\"{}\",\"{}\",{:.3},{},{}\n",
                escape_csv(result.name()),
                escape_csv(result.backend_id()),
                millis(result.elapsed()),
                result.rows().len(),
                result
                    .error()
                    .map(|e| format!("\"{}\"", escape_csv(&e.to_string())))
                    .unwrap_or_default(),
            ));
        }
        output
    }

    fn format_error(&self, error: &str) -> String {
        format!("error\n\"{}\"", escape_csv(error))
    }
}

/// Format a row set as a table, columns taken from the first row.
fn format_rows_as_table(rows: &RowSet) -> String {
    let Some(first) = rows.first() else {
        return "0 row(s)".to_string();
    };

    let mut table = Table::new();
    let columns: Vec<&str> = first.columns().collect();
    table.set_header(columns.iter().map(Cell::new).collect::<Vec<_>>());

    for row in rows {
        let cells: Vec<Cell> = columns
            .iter()
            .map(|column| Cell::new(row.get(column).map(format_value).unwrap_or_default()))
            .collect();
        table.add_row(cells);
    }

    format!("{}\n{} row(s)", table, rows.len())
}

/// Side-by-side timing table for all results.
fn format_timing_table(report: &ComparisonReport) -> String {
    let mut table = Table::new();
    table.set_header(vec!["Query", "Backend", "Elapsed", "Rows", "Status"]);

    for result in report {
        table.add_row(vec![
            Cell::new(result.name()),
            Cell::new(result.backend_id()),
            Cell::new(format_elapsed(result.elapsed())),
            Cell::new(result.rows().len()),
            Cell::new(status(result)),
        ]);
    }

    table.to_string()
}

fn status(result: &BenchmarkResult) -> &'static str {
    if result.is_success() {
        "ok"
    } else {
        "failed"
    }
}

/// One-line verdict comparing the first two results.
///
/// None unless both succeeded.
pub fn summary_line(report: &ComparisonReport) -> Option<String> {
    let [a, b, ..] = report.results() else {
        return None;
    };
    if !a.is_success() || !b.is_success() {
        return None;
    }

    let (fast, slow) = if a.elapsed() <= b.elapsed() { (a, b) } else { (b, a) };
    let speedup = fast.speedup_over(slow)?;
    Some(format!(
        "{} was {:.2}x faster than {} ({} vs {})",
        fast.name(),
        speedup,
        slow.name(),
        format_elapsed(fast.elapsed()),
        format_elapsed(slow.elapsed()),
    ))
}

/// Elapsed time in milliseconds with microsecond precision.
fn millis(elapsed: Duration) -> f64 {
    elapsed.as_nanos() as f64 / 1_000_000.0
}

/// Human-readable elapsed label.
fn format_elapsed(elapsed: Duration) -> String {
    format!("{:.3} ms", millis(elapsed))
}

/// Format a Value as a display string.
fn format_value(value: &Value) -> String {
    value.to_string()
}

/// Escape a string for CSV output.
fn escape_csv(s: &str) -> String {
    s.replace('"', "\"\"")
}
