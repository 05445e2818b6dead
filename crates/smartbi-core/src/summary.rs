//! # Data Summary
//!
//! Flattens an [`Extraction`] into the text body that follows the prompt.
//! Output is deterministic: tables in report order, rows in sample order,
//! no timestamps. The body never exceeds the character budget; tables are
//! dropped whole from the end, and a footer says what was left out.

use serde::Serialize;
use serde_json::Value;

use crate::config::SummaryConfig;
use crate::extraction::Extraction;
use crate::sample::{CustomQueryResult, SampleReport, SampleRow};
use crate::schema::types::SchemaReport;

/// Room kept free for the truncation footer.
const FOOTER_RESERVE: usize = 160;

/// Smallest budget honoured; anything lower is raised to this.
pub const MIN_CHAR_BUDGET: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryOptions {
    pub char_budget: usize,
    pub rows_per_table: usize,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            char_budget: 100_000,
            rows_per_table: 50,
        }
    }
}

impl From<&SummaryConfig> for SummaryOptions {
    fn from(config: &SummaryConfig) -> Self {
        Self {
            char_budget: config.char_budget,
            rows_per_table: config.rows_per_table,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub text: String,
    pub tables_included: usize,
    pub tables_omitted: usize,
    pub rows_omitted: usize,
    pub truncated: bool,
}

/// Render `extraction` within `options`.
pub fn summarize_extraction(extraction: &Extraction, options: &SummaryOptions) -> Summary {
    match extraction {
        Extraction::Full { schema, samples } => summarize_tables(schema, samples, options),
        Extraction::CustomQuery {
            database_type,
            result,
        } => {
            let header = format!(
                "# Data summary\nDatabase: {}\nSource: custom query\n\n",
                database_type
            );
            render(header, vec![query_block(result, options)], Vec::new(), options)
        }
    }
}

fn summarize_tables(schema: &SchemaReport, samples: &SampleReport, options: &SummaryOptions) -> Summary {
    let header = format!(
        "# Data summary\nDatabase: {}\nTables: {} of {} readable\nSample rows: {}\n\n",
        schema.database_type,
        schema.processed_tables(),
        schema.total_tables,
        samples.total_records
    );

    let blocks = schema
        .tables
        .values()
        .map(|table| {
            let mut head = vec![
                format!("## Table: {}", table.name),
                format!("Rows: {}", table.row_count),
                format!(
                    "Columns: {}",
                    table
                        .columns
                        .iter()
                        .map(|c| format!("{} ({})", c.name, c.declared_type))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            ];

            let rows = match samples.data.get(&table.name) {
                Some(rows) => {
                    let shown = rows.len().min(options.rows_per_table);
                    head.push(format!("Sample rows ({} of {}):", shown, rows.len()));
                    let columns: Vec<String> = match rows.first() {
                        Some(first) => first.keys().cloned().collect(),
                        None => table.columns.iter().map(|c| c.name.clone()).collect(),
                    };
                    head.push(csv_line(columns.iter().map(|c| c.as_str())));
                    csv_rows(&columns, &rows[..shown])
                }
                None => {
                    head.push("Sample rows: unavailable".to_string());
                    Vec::new()
                }
            };

            Block { head, rows }
        })
        .collect();

    let mut trailer = Vec::new();
    let unavailable: Vec<String> = schema
        .failed_tables
        .iter()
        .chain(samples.failed_extractions.iter())
        .map(|f| format!("- {}: {}", f.table_name, single_line(&f.error_message)))
        .collect();
    if !unavailable.is_empty() {
        trailer.push("## Unavailable tables".to_string());
        trailer.extend(unavailable);
    }

    render(header, blocks, trailer, options)
}

fn query_block(result: &CustomQueryResult, options: &SummaryOptions) -> Block {
    let shown = result.data.len().min(options.rows_per_table);
    let mut rows_line = format!("Rows returned: {}", result.rows_returned);
    if result.truncated {
        rows_line.push_str(" (limit reached, more rows exist)");
    }

    Block {
        head: vec![
            "## Query result".to_string(),
            rows_line,
            format!("Columns: {}", result.columns.join(", ")),
            format!("Sample rows ({} of {}):", shown, result.rows_returned),
            csv_line(result.columns.iter().map(|c| c.as_str())),
        ],
        rows: csv_rows(&result.columns, &result.data[..shown]),
    }
}

/// One table's lines. `rows` are kept apart from `head` so a block that is
/// too large on its own can be cut between rows.
struct Block {
    head: Vec<String>,
    rows: Vec<String>,
}

impl Block {
    fn render(&self) -> String {
        let mut out = String::new();
        for line in self.head.iter().chain(self.rows.iter()) {
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
        out
    }
}

fn render(header: String, blocks: Vec<Block>, trailer: Vec<String>, options: &SummaryOptions) -> Summary {
    let budget = options.char_budget.max(MIN_CHAR_BUDGET);
    let limit = budget - FOOTER_RESERVE;

    let mut text = header;
    let mut tables_included = 0;
    let mut tables_omitted = 0;
    let mut rows_omitted = 0;
    let mut truncated = false;

    let mut blocks = blocks.into_iter();
    while let Some(block) = blocks.next() {
        let rendered = block.render();
        if text.len() + rendered.len() <= limit {
            text.push_str(&rendered);
            tables_included += 1;
            continue;
        }

        truncated = true;
        if tables_included == 0 {
            let shown = push_partial(&mut text, &block, limit);
            tables_included = 1;
            rows_omitted += block.rows.len() - shown;
        } else {
            tables_omitted += 1;
            rows_omitted += block.rows.len();
        }
        for rest in blocks.by_ref() {
            tables_omitted += 1;
            rows_omitted += rest.rows.len();
        }
    }

    for line in &trailer {
        if text.len() + line.len() + 1 > limit {
            truncated = true;
            break;
        }
        text.push_str(line);
        text.push('\n');
    }

    if truncated {
        text.push_str(&format!(
            "\n[Summary truncated to fit {} characters: {} tables and {} sample rows omitted]\n",
            budget, tables_omitted, rows_omitted
        ));
    }

    Summary {
        text,
        tables_included,
        tables_omitted,
        rows_omitted,
        truncated,
    }
}

/// Append as much of `block` as fits, whole lines only. Returns how many
/// sample rows made it in.
fn push_partial(text: &mut String, block: &Block, limit: usize) -> usize {
    for line in &block.head {
        if text.len() + line.len() + 1 > limit {
            return 0;
        }
        text.push_str(line);
        text.push('\n');
    }

    let mut shown = 0;
    for row in &block.rows {
        if text.len() + row.len() + 1 > limit {
            break;
        }
        text.push_str(row);
        text.push('\n');
        shown += 1;
    }
    shown
}

fn csv_rows(columns: &[String], rows: &[SampleRow]) -> Vec<String> {
    rows.iter()
        .map(|row| {
            let cells: Vec<String> = columns
                .iter()
                .map(|c| row.get(c).map(cell).unwrap_or_default())
                .collect();
            csv_line(cells.iter().map(|c| c.as_str()))
        })
        .collect()
}

fn csv_line<'a>(cells: impl Iterator<Item = &'a str>) -> String {
    cells.map(csv_escape).collect::<Vec<_>>().join(",")
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn single_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::{ColumnInfo, DatabaseKind, TableSchema};
    use serde_json::json;

    fn table(name: &str, rows: usize) -> (TableSchema, Vec<SampleRow>) {
        let schema = TableSchema {
            name: name.to_string(),
            columns: vec![ColumnInfo::new("id", "INTEGER"), ColumnInfo::new("note", "TEXT")],
            row_count: rows as u64,
        };
        let data = (0..rows)
            .map(|i| {
                let mut row = SampleRow::new();
                row.insert("id".to_string(), json!(i));
                row.insert("note".to_string(), json!(format!("note number {}", i)));
                row
            })
            .collect();
        (schema, data)
    }

    fn extraction(tables: &[(&str, usize)]) -> Extraction {
        let mut schema = SchemaReport::new(DatabaseKind::SQLite);
        let mut samples = SampleReport::new(tables.len());
        for (name, rows) in tables {
            let (t, data) = table(name, *rows);
            schema.record_table(t);
            samples.record_rows(*name, data);
        }
        Extraction::Full { schema, samples }
    }

    #[test]
    fn test_layout_of_single_table() {
        let summary = summarize_extraction(&extraction(&[("users", 2)]), &SummaryOptions::default());
        assert!(summary.text.contains(
            "## Table: users\nRows: 2\nColumns: id (INTEGER), note (TEXT)\nSample rows (2 of 2):\nid,note\n0,note number 0\n1,note number 1\n"
        ));
        assert!(!summary.truncated);
        assert_eq!(summary.tables_included, 1);
    }

    #[test]
    fn test_rows_per_table_cap() {
        let options = SummaryOptions {
            rows_per_table: 3,
            ..Default::default()
        };
        let summary = summarize_extraction(&extraction(&[("events", 10)]), &options);
        assert!(summary.text.contains("Sample rows (3 of 10):"));
        assert!(summary.text.contains("2,note number 2\n"));
        assert!(!summary.text.contains("3,note number 3"));
        assert!(!summary.truncated);
    }

    #[test]
    fn test_budget_drops_whole_tables_and_adds_footer() {
        let options = SummaryOptions {
            char_budget: 1_000,
            rows_per_table: 50,
        };
        let summary = summarize_extraction(
            &extraction(&[("a", 5), ("b", 5), ("c", 40), ("d", 5)]),
            &options,
        );
        assert!(summary.text.len() <= 1_000);
        assert!(summary.truncated);
        assert!(summary.text.contains("## Table: a"));
        assert!(summary.text.contains("## Table: b"));
        assert!(!summary.text.contains("## Table: c"));
        // later tables are not pulled forward into the gap
        assert!(!summary.text.contains("## Table: d"));
        assert_eq!(summary.tables_omitted, 2);
        assert_eq!(summary.rows_omitted, 45);
        assert!(summary.text.contains("2 tables and 45 sample rows omitted"));
    }

    #[test]
    fn test_oversized_first_table_is_cut_between_rows() {
        let options = SummaryOptions {
            char_budget: 600,
            rows_per_table: 500,
        };
        let summary = summarize_extraction(&extraction(&[("big", 200)]), &options);
        assert!(summary.text.len() <= 600);
        assert!(summary.truncated);
        assert_eq!(summary.tables_included, 1);
        assert!(summary.rows_omitted > 0);

        // every sample line that made it in is complete
        for line in summary.text.lines().filter(|l| l.starts_with(char::is_numeric)) {
            let (id, note) = line.split_once(',').unwrap();
            assert_eq!(note, format!("note number {}", id));
        }
    }

    #[test]
    fn test_output_is_deterministic() {
        let e = extraction(&[("x", 4), ("y", 4)]);
        let options = SummaryOptions::default();
        assert_eq!(
            summarize_extraction(&e, &options),
            summarize_extraction(&e, &options)
        );
    }

    #[test]
    fn test_values_are_csv_quoted() {
        let mut schema = SchemaReport::new(DatabaseKind::PostgreSQL);
        let (t, _) = table("quotes", 1);
        schema.record_table(t);
        let mut row = SampleRow::new();
        row.insert("id".to_string(), Value::Null);
        row.insert("note".to_string(), json!("say \"hi\", then\nleave"));
        let mut samples = SampleReport::new(1);
        samples.record_rows("quotes", vec![row]);

        let summary = summarize_extraction(
            &Extraction::Full { schema, samples },
            &SummaryOptions::default(),
        );
        assert!(summary.text.contains(",\"say \"\"hi\"\", then\nleave\"\n"));
    }

    #[test]
    fn test_failed_tables_listed_last() {
        let mut schema = SchemaReport::new(DatabaseKind::MySQL);
        let (t, data) = table("orders", 1);
        schema.record_table(t);
        schema.record_failure("secrets", "SELECT command denied\n to user");
        let mut samples = SampleReport::new(1);
        samples.record_rows("orders", data);

        let summary = summarize_extraction(
            &Extraction::Full { schema, samples },
            &SummaryOptions::default(),
        );
        let orders_at = summary.text.find("## Table: orders").unwrap();
        let failed_at = summary.text.find("## Unavailable tables").unwrap();
        assert!(orders_at < failed_at);
        assert!(summary.text.contains("- secrets: SELECT command denied to user"));
    }

    #[test]
    fn test_custom_query_block() {
        let mut row = SampleRow::new();
        row.insert("name".to_string(), json!("Alice"));
        let result = CustomQueryResult::new(vec!["name".to_string()], vec![row], true);
        let summary = summarize_extraction(
            &Extraction::CustomQuery {
                database_type: DatabaseKind::SQLite,
                result,
            },
            &SummaryOptions::default(),
        );
        assert!(summary.text.contains("## Query result\nRows returned: 1 (limit reached, more rows exist)\nColumns: name\nSample rows (1 of 1):\nname\nAlice\n"));
    }
}
