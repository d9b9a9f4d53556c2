//! Cluster listings (topics, brokers) and their tabular rendering.
//!
//! Rates are rendered through the magnitude formatter; each cell keeps an
//! optional order text (the exact value) that sorting prefers over the
//! rendered text.

#![allow(missing_docs)]

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::format::magnitude::{Magnitude, format_byte_rate, format_bytes, format_msg_rate};
use crate::format::sort_key::SortKind;

/// One row of `/api/clusters/{cluster}/topics`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicRow {
    pub topic_name: String,
    #[serde(default)]
    pub partition_count: u64,
    #[serde(default)]
    pub errors: String,
    /// Bytes per second, 15 minute rate. `-1` when unknown.
    #[serde(rename = "b_rate_15", default = "unknown_rate")]
    pub byte_rate: f64,
    /// Messages per second, 15 minute rate. `-1` when unknown.
    #[serde(rename = "m_rate_15", default = "unknown_rate")]
    pub msg_rate: f64,
}

const fn unknown_rate() -> f64 {
    -1.0
}

/// A row of one of the dashboard's `{"data": [...]}` grids.
pub trait GridRow: Sized {
    /// Decode one entry of `data`; `None` skips it.
    fn from_value(value: &Value) -> Option<Self>;
}

/// Decode `{"data": [...]}`; rows that fail to decode are skipped.
///
/// `None` when the body has no `data` array at all.
#[must_use]
pub fn decode_page<T: GridRow>(body: &Value) -> Option<Vec<T>> {
    let rows = body.get("data")?.as_array()?;
    Some(rows.iter().filter_map(T::from_value).collect())
}

impl GridRow for TopicRow {
    fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

/// One row of `/api/clusters/{cluster}/brokers`, sent as `[id, host, b_rate, m_rate]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrokerRow {
    pub id: i64,
    pub hostname: String,
    pub byte_rate: f64,
    pub msg_rate: f64,
}

impl GridRow for BrokerRow {
    fn from_value(value: &Value) -> Option<Self> {
        let fields = value.as_array()?;
        Some(Self {
            id: fields.first()?.as_i64()?,
            hostname: fields.get(1)?.as_str()?.to_string(),
            byte_rate: fields.get(2).and_then(Value::as_f64).unwrap_or(-1.0),
            msg_rate: fields.get(3).and_then(Value::as_f64).unwrap_or(-1.0),
        })
    }
}

/// Consumer group, sent as `[name, state, members, topics]`.
///
/// Served by both `/api/clusters/{cluster}/groups` and
/// `/api/clusters/{cluster}/topics/{topic}/groups`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupRow {
    pub name: String,
    pub state: String,
    /// `-1` when unknown.
    pub members: i64,
    /// Topics the group has stored offsets for.
    pub topics: i64,
}

impl GridRow for GroupRow {
    fn from_value(value: &Value) -> Option<Self> {
        let fields = value.as_array()?;
        Some(Self {
            name: fields.first()?.as_str()?.to_string(),
            state: fields.get(1).and_then(Value::as_str).unwrap_or("").to_string(),
            members: fields.get(2).and_then(Value::as_i64).unwrap_or(-1),
            topics: fields.get(3).and_then(Value::as_i64).unwrap_or(-1),
        })
    }
}

/// Group member, sent as `[member_id, client_id, client_host, assignments]`.
///
/// Assignments arrive as `topic/p,p` lines separated by newlines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberRow {
    pub member_id: String,
    pub client_id: String,
    pub hostname: String,
    pub assignments: Vec<String>,
}

impl GridRow for MemberRow {
    fn from_value(value: &Value) -> Option<Self> {
        let fields = value.as_array()?;
        let text = |i: usize| fields.get(i).and_then(Value::as_str).unwrap_or("").to_string();
        Some(Self {
            member_id: fields.first()?.as_str()?.to_string(),
            client_id: text(1),
            hostname: text(2),
            assignments: text(3)
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
        })
    }
}

/// Committed offset of one partition, sent as
/// `[topic, partition, size, low, high, offset, lag, lag_percent]`.
///
/// `lag` is text: a number, `"Empty topic"` or `"Out of retention"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OffsetRow {
    pub topic: String,
    pub partition: i64,
    pub size: i64,
    pub low: i64,
    pub high: i64,
    pub offset: i64,
    pub lag: String,
    pub lag_percent: String,
}

impl GridRow for OffsetRow {
    fn from_value(value: &Value) -> Option<Self> {
        let fields = value.as_array()?;
        let number = |i: usize| fields.get(i).and_then(Value::as_i64).unwrap_or(-1);
        let text = |i: usize| match fields.get(i) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        Some(Self {
            topic: fields.first()?.as_str()?.to_string(),
            partition: fields.get(1)?.as_i64()?,
            size: number(2),
            low: number(3),
            high: number(4),
            offset: number(5),
            lag: text(6),
            lag_percent: text(7),
        })
    }
}

/// Partition placement from `/api/clusters/{cluster}/topics/{topic}/topology`,
/// sent as `[id, size_bytes, leader, replicas, isr, error]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartitionRow {
    pub id: i64,
    /// `-1` when unknown.
    pub size_bytes: f64,
    pub leader: i64,
    pub replicas: Vec<i64>,
    pub isr: Vec<i64>,
    pub error: Option<String>,
}

impl PartitionRow {
    /// Some replica is missing from the in-sync set.
    #[must_use]
    pub fn under_replicated(&self) -> bool {
        self.replicas.iter().any(|r| !self.isr.contains(r))
    }

    /// `"OK"`, `"under-replicated"`, or the broker-reported error.
    #[must_use]
    pub fn status(&self) -> String {
        match &self.error {
            Some(error) => error.clone(),
            None if self.under_replicated() => "under-replicated".to_string(),
            None => "OK".to_string(),
        }
    }
}

impl GridRow for PartitionRow {
    fn from_value(value: &Value) -> Option<Self> {
        let fields = value.as_array()?;
        let ids = |i: usize| -> Vec<i64> {
            fields
                .get(i)
                .and_then(Value::as_array)
                .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
                .unwrap_or_default()
        };
        Some(Self {
            id: fields.first()?.as_i64()?,
            size_bytes: fields.get(1).and_then(Value::as_f64).unwrap_or(-1.0),
            leader: fields.get(2).and_then(Value::as_i64).unwrap_or(-1),
            replicas: ids(3),
            isr: ids(4),
            error: fields
                .get(5)
                .and_then(Value::as_str)
                .filter(|e| !e.is_empty())
                .map(str::to_string),
        })
    }
}

/// A rendered table cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cell {
    pub text: String,
    /// Exact value used for ordering, when the text is a rounded rendering.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
}

impl Cell {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            order: None,
        }
    }

    #[must_use]
    pub fn magnitude(m: &Magnitude) -> Self {
        Self {
            text: m.text.clone(),
            order: Some(m.tooltip()),
        }
    }

    fn sort_text(&self) -> &str {
        self.order.as_deref().unwrap_or(&self.text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub sort: SortKind,
}

pub const TOPIC_COLUMNS: [Column; 5] = [
    Column { name: "topic", sort: SortKind::Text },
    Column { name: "partitions", sort: SortKind::Numeric },
    Column { name: "errors", sort: SortKind::Error },
    Column { name: "byte_rate", sort: SortKind::Size },
    Column { name: "msg_rate", sort: SortKind::Numeric },
];

pub const BROKER_COLUMNS: [Column; 4] = [
    Column { name: "id", sort: SortKind::Numeric },
    Column { name: "hostname", sort: SortKind::Text },
    Column { name: "byte_rate", sort: SortKind::Size },
    Column { name: "msg_rate", sort: SortKind::Numeric },
];

pub const GROUP_COLUMNS: [Column; 4] = [
    Column { name: "group", sort: SortKind::Text },
    Column { name: "state", sort: SortKind::Text },
    Column { name: "members", sort: SortKind::Numeric },
    Column { name: "topics", sort: SortKind::Numeric },
];

pub const MEMBER_COLUMNS: [Column; 4] = [
    Column { name: "member", sort: SortKind::Text },
    Column { name: "client", sort: SortKind::Text },
    Column { name: "hostname", sort: SortKind::Text },
    Column { name: "assignments", sort: SortKind::Text },
];

pub const OFFSET_COLUMNS: [Column; 8] = [
    Column { name: "topic", sort: SortKind::Text },
    Column { name: "partition", sort: SortKind::Numeric },
    Column { name: "size", sort: SortKind::Numeric },
    Column { name: "low", sort: SortKind::Numeric },
    Column { name: "high", sort: SortKind::Numeric },
    Column { name: "offset", sort: SortKind::Numeric },
    Column { name: "lag", sort: SortKind::Numeric },
    Column { name: "lag_pct", sort: SortKind::Numeric },
];

pub const PARTITION_COLUMNS: [Column; 6] = [
    Column { name: "partition", sort: SortKind::Numeric },
    Column { name: "size", sort: SortKind::Size },
    Column { name: "leader", sort: SortKind::Numeric },
    Column { name: "replicas", sort: SortKind::Text },
    Column { name: "isr", sort: SortKind::Text },
    Column { name: "status", sort: SortKind::Text },
];

/// Column names whose non-empty cells flag a problem, and the text meaning "fine".
pub const PROBLEM_COLUMNS: [(&str, &str); 2] = [("errors", ""), ("status", "OK")];

fn count_cell(n: i64) -> Cell {
    if n < 0 {
        Cell::text(crate::format::magnitude::UNKNOWN_TEXT)
    } else {
        Cell::text(n.to_string())
    }
}

fn id_list(ids: &[i64]) -> String {
    ids.iter().map(i64::to_string).collect::<Vec<_>>().join(",")
}

/// Rendered rows under a fixed set of columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    #[serde(skip)]
    pub columns: &'static [Column],
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    #[must_use]
    pub fn topics(rows: &[TopicRow], decimals: usize) -> Self {
        let rows = rows
            .iter()
            .map(|row| {
                vec![
                    Cell::text(&row.topic_name),
                    Cell::text(row.partition_count.to_string()),
                    Cell::text(&row.errors),
                    // Byte rates sort by their rendered size, like the web grid.
                    Cell::text(format_byte_rate(row.byte_rate, decimals).text),
                    Cell::magnitude(&format_msg_rate(row.msg_rate, decimals)),
                ]
            })
            .collect();
        Self {
            columns: &TOPIC_COLUMNS,
            rows,
        }
    }

    #[must_use]
    pub fn brokers(rows: &[BrokerRow], decimals: usize) -> Self {
        let rows = rows
            .iter()
            .map(|row| {
                vec![
                    Cell::text(row.id.to_string()),
                    Cell::text(&row.hostname),
                    Cell::text(format_byte_rate(row.byte_rate, decimals).text),
                    Cell::magnitude(&format_msg_rate(row.msg_rate, decimals)),
                ]
            })
            .collect();
        Self {
            columns: &BROKER_COLUMNS,
            rows,
        }
    }

    #[must_use]
    pub fn groups(rows: &[GroupRow]) -> Self {
        let rows = rows
            .iter()
            .map(|row| {
                vec![
                    Cell::text(&row.name),
                    Cell::text(&row.state),
                    count_cell(row.members),
                    count_cell(row.topics),
                ]
            })
            .collect();
        Self {
            columns: &GROUP_COLUMNS,
            rows,
        }
    }

    #[must_use]
    pub fn members(rows: &[MemberRow]) -> Self {
        let rows = rows
            .iter()
            .map(|row| {
                vec![
                    Cell::text(&row.member_id),
                    Cell::text(&row.client_id),
                    Cell::text(&row.hostname),
                    Cell::text(row.assignments.join("; ")),
                ]
            })
            .collect();
        Self {
            columns: &MEMBER_COLUMNS,
            rows,
        }
    }

    #[must_use]
    pub fn offsets(rows: &[OffsetRow]) -> Self {
        let rows = rows
            .iter()
            .map(|row| {
                vec![
                    Cell::text(&row.topic),
                    Cell::text(row.partition.to_string()),
                    Cell::text(row.size.to_string()),
                    Cell::text(row.low.to_string()),
                    Cell::text(row.high.to_string()),
                    Cell::text(row.offset.to_string()),
                    Cell::text(&row.lag),
                    Cell::text(&row.lag_percent),
                ]
            })
            .collect();
        Self {
            columns: &OFFSET_COLUMNS,
            rows,
        }
    }

    #[must_use]
    pub fn topology(rows: &[PartitionRow], decimals: usize) -> Self {
        let rows = rows
            .iter()
            .map(|row| {
                vec![
                    Cell::text(row.id.to_string()),
                    Cell::text(format_bytes(row.size_bytes, decimals).text),
                    count_cell(row.leader),
                    Cell::text(id_list(&row.replicas)),
                    Cell::text(id_list(&row.isr)),
                    Cell::text(row.status()),
                ]
            })
            .collect();
        Self {
            columns: &PARTITION_COLUMNS,
            rows,
        }
    }

    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Stable sort by the named column; `descending` reverses the order.
    pub fn sort_by(&mut self, index: usize, descending: bool) {
        let Some(column) = self.columns.get(index).copied() else {
            return;
        };
        self.rows.sort_by(|a, b| {
            let ordering = match (a.get(index), b.get(index)) {
                (Some(x), Some(y)) => column.sort.compare(x.sort_text(), y.sort_text()),
                _ => Ordering::Equal,
            };
            if descending { ordering.reverse() } else { ordering }
        });
    }

    pub fn truncate(&mut self, limit: usize) {
        self.rows.truncate(limit);
    }

    /// Widest cell per column, header included.
    #[must_use]
    pub fn widths(&self) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
                self.rows
                    .iter()
                    .filter_map(|row| row.get(i))
                    .map(|cell| cell.text.chars().count())
                    .chain(std::iter::once(column.name.len()))
                    .max()
                    .unwrap_or(0)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn topics_body() -> Value {
        json!({"data": [
            {"topic_name": "orders", "partition_count": 12, "errors": "",
             "b_rate_15": 1536.0, "m_rate_15": 1500.0},
            {"topic_name": "audit", "partition_count": 3, "errors": "LeaderNotAvailable (4 times)",
             "b_rate_15": 2_097_152.0, "m_rate_15": 20.0},
            {"topic_name": "fresh", "partition_count": 1, "errors": ""},
            {"partition_count": "broken"}
        ]})
    }

    #[test]
    fn decode_topics_skips_bad_rows() {
        let rows = decode_page::<TopicRow>(&topics_body()).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].byte_rate, -1.0);
        assert!(decode_page::<TopicRow>(&json!([1, 2])).is_none());
    }

    #[test]
    fn decode_brokers_from_tuples() {
        let body = json!({"data": [[1, "kafka-1", 1024.0, 10.0], [2, "kafka-2"], ["x"]]});
        let rows = decode_page::<BrokerRow>(&body).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].hostname, "kafka-1");
        assert_eq!(rows[1].byte_rate, -1.0);
    }

    #[test]
    fn topic_table_renders_magnitudes() {
        let rows = decode_page::<TopicRow>(&topics_body()).unwrap();
        let table = Table::topics(&rows, 1);
        assert_eq!(table.rows[0][3].text, "1.5 KiB/s");
        assert_eq!(table.rows[0][4].text, "1.5 Kmsg/s");
        assert_eq!(table.rows[0][4].order.as_deref(), Some("1500"));
        assert_eq!(table.rows[2][3].text, "Unknown");
    }

    #[test]
    fn sort_by_byte_rate_uses_size_key() {
        let rows = decode_page::<TopicRow>(&topics_body()).unwrap();
        let mut table = Table::topics(&rows, 1);
        let idx = table.column_index("byte_rate").unwrap();
        table.sort_by(idx, true);
        let names: Vec<&str> = table.rows.iter().map(|r| r[0].text.as_str()).collect();
        assert_eq!(names, vec!["audit", "orders", "fresh"]);
    }

    #[test]
    fn sort_by_msg_rate_uses_exact_value() {
        let rows = decode_page::<TopicRow>(&topics_body()).unwrap();
        let mut table = Table::topics(&rows, 1);
        let idx = table.column_index("msg_rate").unwrap();
        table.sort_by(idx, false);
        let names: Vec<&str> = table.rows.iter().map(|r| r[0].text.as_str()).collect();
        assert_eq!(names, vec!["fresh", "audit", "orders"]);
    }

    #[test]
    fn sort_by_errors_puts_repeated_failures_last() {
        let rows = decode_page::<TopicRow>(&topics_body()).unwrap();
        let mut table = Table::topics(&rows, 1);
        table.sort_by(table.column_index("errors").unwrap(), false);
        assert_eq!(table.rows[2][0].text, "audit");
    }

    #[test]
    fn decode_groups_and_sort_by_members() {
        let body = json!({"data": [
            ["billing", "Stable", 3, 2],
            ["audit-reader", "Empty", 0, 1],
            ["search", "PreparingRebalance", 12, 4],
            [42, "Stable", 1, 1]
        ]});
        let rows = decode_page::<GroupRow>(&body).unwrap();
        assert_eq!(rows.len(), 3);
        let mut table = Table::groups(&rows);
        table.sort_by(table.column_index("members").unwrap(), true);
        let names: Vec<&str> = table.rows.iter().map(|r| r[0].text.as_str()).collect();
        assert_eq!(names, vec!["search", "billing", "audit-reader"]);
    }

    #[test]
    fn members_split_assignment_lines() {
        let body = json!({"data": [
            ["consumer-1-4f2a", "billing-app", "/10.0.0.7", "orders/0,1\npayments/3"],
            ["consumer-2-9c1b", "billing-app", "/10.0.0.8", ""]
        ]});
        let rows = decode_page::<MemberRow>(&body).unwrap();
        assert_eq!(rows[0].assignments, vec!["orders/0,1", "payments/3"]);
        assert!(rows[1].assignments.is_empty());
        let table = Table::members(&rows);
        assert_eq!(table.rows[0][3].text, "orders/0,1; payments/3");
    }

    #[test]
    fn offsets_sort_lag_with_text_cells_first() {
        let body = json!({"data": [
            ["orders", 0, 100, 0, 100, 90, "10", "10.0%"],
            ["orders", 1, 0, 5, 5, 5, "Empty topic", "0.0%"],
            ["orders", 2, 50, 50, 100, 20, "Out of retention", ""],
            ["orders", 3, 100, 0, 100, 40, "60", "60.0%"]
        ]});
        let rows = decode_page::<OffsetRow>(&body).unwrap();
        assert_eq!(rows.len(), 4);
        let mut table = Table::offsets(&rows);
        table.sort_by(table.column_index("lag").unwrap(), true);
        let partitions: Vec<&str> = table.rows.iter().map(|r| r[1].text.as_str()).collect();
        assert_eq!(&partitions[..2], &["3", "0"]);
    }

    #[test]
    fn topology_reports_status_and_sizes() {
        let body = json!({"data": [
            [0, 1_572_864.0, 1, [1, 2, 3], [1, 2, 3], null],
            [1, 3_221_225_472.0, 2, [2, 3, 1], [2, 3], null],
            [2, null, -1, [3, 1, 2], [], "LeaderNotAvailable"]
        ]});
        let rows = decode_page::<PartitionRow>(&body).unwrap();
        let mut table = Table::topology(&rows, 1);
        assert_eq!(table.rows[0][1].text, "1.5 MiB");
        assert_eq!(table.rows[0][5].text, "OK");
        assert_eq!(table.rows[1][5].text, "under-replicated");
        assert_eq!(table.rows[2][1].text, "Unknown");
        assert_eq!(table.rows[2][2].text, "Unknown");
        assert_eq!(table.rows[2][5].text, "LeaderNotAvailable");

        table.sort_by(table.column_index("size").unwrap(), true);
        let ids: Vec<&str> = table.rows.iter().map(|r| r[0].text.as_str()).collect();
        assert_eq!(ids, vec!["1", "0", "2"]);
    }

    #[test]
    fn widths_cover_header_and_cells() {
        let rows = vec![BrokerRow {
            id: 1001,
            hostname: "broker-a.internal".to_string(),
            byte_rate: 0.0,
            msg_rate: 0.0,
        }];
        let table = Table::brokers(&rows, 1);
        assert_eq!(table.widths(), vec![4, 17, 9, 8]);
    }
}
