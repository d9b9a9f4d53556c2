//! Sort keys for rendered table cells.
//!
//! Cells carry formatted text such as `"1.5 KiB/s"` or `"12 (3 times)"`.
//! Ordering works on a number pulled from the leading part of the text;
//! a cell without one sorts as `-1`, ahead of every real value.

use std::cmp::Ordering;
use std::sync::LazyLock;

use regex::Regex;

/// Key assigned to cells with no parseable prefix.
pub const UNPARSEABLE: f64 = -1.0;

static LEADING_NUMBER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:\.\d+)?)").ok());

static LEADING_SIZE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)^(\d+(?:\.\d+)?)\s*([a-z]+)").ok());

/// How a column orders its cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKind {
    /// Plain lexical order.
    Text,
    /// Leading decimal number.
    Numeric,
    /// Leading number scaled by its size unit.
    Size,
    /// Error cells: anything mentioning repeated failures sorts last.
    Error,
}

impl SortKind {
    /// Numeric key for `cell`, or `None` for text columns.
    #[must_use]
    pub fn key(self, cell: &str) -> Option<f64> {
        match self {
            Self::Text => None,
            Self::Numeric => Some(numeric_key(cell)),
            Self::Size => Some(size_key(cell)),
            Self::Error => Some(error_key(cell)),
        }
    }

    /// Total order over two cells of this column.
    #[must_use]
    pub fn compare(self, left: &str, right: &str) -> Ordering {
        match (self.key(left), self.key(right)) {
            (Some(a), Some(b)) => a.total_cmp(&b),
            _ => left.cmp(right),
        }
    }
}

/// First leading decimal number, or `-1`.
#[must_use]
pub fn numeric_key(cell: &str) -> f64 {
    LEADING_NUMBER
        .as_ref()
        .and_then(|re| re.captures(cell.trim()))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(UNPARSEABLE)
}

/// Leading number multiplied by its unit (`kb` = 1e3, `kib` = 1024, ...).
///
/// Unknown units and cells without a unit sort as `-1`.
#[must_use]
pub fn size_key(cell: &str) -> f64 {
    let Some(caps) = LEADING_SIZE.as_ref().and_then(|re| re.captures(cell.trim())) else {
        return UNPARSEABLE;
    };
    let number = caps.get(1).and_then(|m| m.as_str().parse::<f64>().ok());
    let multiplier = caps
        .get(2)
        .and_then(|m| unit_multiplier(&m.as_str().to_ascii_lowercase()));
    match (number, multiplier) {
        (Some(number), Some(multiplier)) => number * multiplier,
        _ => UNPARSEABLE,
    }
}

/// `2` when the cell reports repeated failures (`"... times"`), else `0`.
#[must_use]
pub fn error_key(cell: &str) -> f64 {
    if cell.contains("times") { 2.0 } else { 0.0 }
}

fn unit_multiplier(unit: &str) -> Option<f64> {
    let multiplier = match unit {
        "b" => 1.0,
        "kb" => 1e3,
        "kib" => 1024.0,
        "mb" => 1e6,
        "mib" => 1_048_576.0,
        "gb" => 1e9,
        "gib" => 1_073_741_824.0,
        "tb" => 1e12,
        "tib" => 1_099_511_627_776.0,
        "pb" => 1e15,
        "pib" => 1_125_899_906_842_624.0,
        "eb" => 1e18,
        "eib" => 1_152_921_504_606_846_976.0,
        _ => return None,
    };
    Some(multiplier)
}
