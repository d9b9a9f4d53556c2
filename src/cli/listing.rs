//! Text and JSON rendering for the cluster listing commands.

#![allow(missing_docs)]

use colored::Colorize;
use serde_json::{Map, Value};

use crate::api::listing::{PROBLEM_COLUMNS, Table};
use crate::format::SortKind;
use crate::format::magnitude::UNKNOWN_TEXT;

/// Left-align text columns, right-align everything else.
fn right_aligned(sort: SortKind) -> bool {
    !matches!(sort, SortKind::Text)
}

/// Cell text reports a problem (topic errors, partition status).
fn is_problem(column: &str, text: &str) -> bool {
    PROBLEM_COLUMNS
        .iter()
        .any(|&(name, fine)| name == column && text != fine && !text.is_empty())
}

/// Aligned table with a bold header. Colour follows `colored`'s global switch.
pub fn render_table(table: &Table) -> String {
    let widths = table.widths();
    let mut out = String::new();

    let header: Vec<String> = table
        .columns
        .iter()
        .zip(&widths)
        .map(|(column, &width)| pad(column.name, width, right_aligned(column.sort)))
        .collect();
    out.push_str(&header.join("  ").bold().to_string());
    out.push('\n');

    for row in &table.rows {
        let cells: Vec<String> = table
            .columns
            .iter()
            .zip(&widths)
            .enumerate()
            .map(|(i, (column, &width))| {
                let text = row.get(i).map_or("", |cell| cell.text.as_str());
                let padded = pad(text, width, right_aligned(column.sort));
                if is_problem(column.name, text) {
                    padded.red().to_string()
                } else if text.starts_with(UNKNOWN_TEXT) {
                    padded.dimmed().to_string()
                } else {
                    padded
                }
            })
            .collect();
        out.push_str(cells.join("  ").trim_end());
        out.push('\n');
    }
    out
}

fn pad(text: &str, width: usize, right: bool) -> String {
    if right {
        format!("{text:>width$}")
    } else {
        format!("{text:<width$}")
    }
}

/// Rows as objects keyed by column name; exact values under `<column>_exact`.
pub fn table_json(table: &Table) -> Value {
    let rows = table
        .rows
        .iter()
        .map(|row| {
            let mut object = Map::new();
            for (column, cell) in table.columns.iter().zip(row) {
                object.insert(column.name.to_string(), Value::String(cell.text.clone()));
                if let Some(order) = &cell.order {
                    object.insert(format!("{}_exact", column.name), Value::String(order.clone()));
                }
            }
            Value::Object(object)
        })
        .collect();
    Value::Array(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::listing::{BrokerRow, TopicRow};

    fn topics() -> Table {
        Table::topics(
            &[
                TopicRow {
                    topic_name: "orders".to_string(),
                    partition_count: 12,
                    errors: String::new(),
                    byte_rate: 1536.0,
                    msg_rate: 1500.0,
                },
                TopicRow {
                    topic_name: "audit".to_string(),
                    partition_count: 3,
                    errors: String::new(),
                    byte_rate: -1.0,
                    msg_rate: -1.0,
                },
            ],
            1,
        )
    }

    #[test]
    fn renders_header_and_aligned_rows() {
        colored::control::set_override(false);
        let text = render_table(&topics());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("topic "));
        assert!(lines[0].contains("byte_rate"));
        assert!(lines[1].starts_with("orders"));
        assert!(lines[1].contains("1.5 KiB/s"));
        assert!(lines[2].contains("Unknown"));
    }

    #[test]
    fn json_rows_carry_exact_values() {
        let value = table_json(&topics());
        assert_eq!(value[0]["topic"], "orders");
        assert_eq!(value[0]["msg_rate"], "1.5 Kmsg/s");
        assert_eq!(value[0]["msg_rate_exact"], "1500");
        assert_eq!(value[1]["byte_rate"], "Unknown");
    }

    #[test]
    fn problem_cells_by_column() {
        assert!(is_problem("errors", "LeaderNotAvailable (4 times)"));
        assert!(!is_problem("errors", ""));
        assert!(is_problem("status", "under-replicated"));
        assert!(!is_problem("status", "OK"));
        assert!(!is_problem("topic", "orders"));
    }

    #[test]
    fn broker_json_uses_broker_columns() {
        let table = Table::brokers(
            &[BrokerRow {
                id: 1,
                hostname: "kafka-1".to_string(),
                byte_rate: 0.0,
                msg_rate: 0.0,
            }],
            1,
        );
        let value = table_json(&table);
        assert_eq!(value[0]["id"], "1");
        assert_eq!(value[0]["byte_rate"], "0 B/s");
    }
}
