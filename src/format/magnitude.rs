//! Magnitude formatting: `1536` bytes/s renders as `1.5 KiB/s`, `1500` msg/s
//! as `1.5 Kmsg/s`, and the `-1` sentinel as `Unknown`.
//!
//! Every formatted value keeps the raw number next to the rendered text so a
//! front-end can show it on demand (tooltip, `--json` output).

#![allow(missing_docs)]

use std::fmt;

use serde::Serialize;

/// Raw value meaning "not available".
pub const UNKNOWN_SENTINEL: f64 = -1.0;

/// Rendered text for the sentinel.
pub const UNKNOWN_TEXT: &str = "Unknown";

/// Base plus ordered unit labels; `units[i]` names `base^i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitTable {
    pub base: u32,
    pub units: &'static [&'static str],
}

impl UnitTable {
    /// Binary byte units.
    pub const BYTES: Self = Self {
        base: 1024,
        units: &["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"],
    };

    /// Decimal count prefixes, meant to be followed by a suffix like `msg/s`.
    pub const COUNT: Self = Self {
        base: 1000,
        units: &["", "K", "M", "G", "T", "P", "E"],
    };

    /// Largest usable unit index.
    #[must_use]
    pub const fn max_index(&self) -> usize {
        self.units.len().saturating_sub(1)
    }

    /// Unit index for `magnitude >= 0`, clamped to the table.
    ///
    /// Values below one land on index 0.
    #[must_use]
    pub fn index_for(&self, magnitude: f64) -> usize {
        let base = f64::from(self.base);
        let mut index = 0;
        let mut threshold = base;
        while index < self.max_index() && magnitude >= threshold {
            index += 1;
            threshold *= base;
        }
        index
    }
}

/// A formatted value: display text plus the exact raw value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Magnitude {
    pub text: String,
    pub exact: f64,
}

impl Magnitude {
    /// Exact-value annotation shown alongside the rounded text.
    #[must_use]
    pub fn tooltip(&self) -> String {
        format!("{}", self.exact)
    }

    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.text == UNKNOWN_TEXT
    }
}

impl fmt::Display for Magnitude {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Format `value` as `"<number> <unit><suffix>"`.
///
/// The number is rounded to `decimals` fixed digits and then loses trailing
/// zeros, so `1024` bytes is `"1 KiB"` and `1536` is `"1.5 KiB"`. Negative
/// values other than the sentinel keep their sign and are scaled by their
/// absolute value. Non-finite input is treated like the sentinel.
#[must_use]
pub fn format_magnitude(value: f64, decimals: usize, suffix: &str, table: &UnitTable) -> Magnitude {
    if !value.is_finite() || value == UNKNOWN_SENTINEL {
        return Magnitude {
            text: UNKNOWN_TEXT.to_string(),
            exact: value,
        };
    }

    let index = table.index_for(value.abs());
    let divisor = f64::from(table.base).powi(i32::try_from(index).unwrap_or(i32::MAX));
    let number = trim_fixed(&format!("{:.*}", decimals, value / divisor));
    let unit = table.units.get(index).copied().unwrap_or_default();

    Magnitude {
        text: format!("{number} {unit}{suffix}"),
        exact: value,
    }
}

/// Byte count, e.g. `"3.2 MiB"`.
#[must_use]
pub fn format_bytes(value: f64, decimals: usize) -> Magnitude {
    format_magnitude(value, decimals, "", &UnitTable::BYTES)
}

/// Byte throughput, e.g. `"1.5 KiB/s"`.
#[must_use]
pub fn format_byte_rate(value: f64, decimals: usize) -> Magnitude {
    format_magnitude(value, decimals, "/s", &UnitTable::BYTES)
}

/// Message throughput, e.g. `"1.5 Kmsg/s"`.
#[must_use]
pub fn format_msg_rate(value: f64, decimals: usize) -> Magnitude {
    format_magnitude(value, decimals, "msg/s", &UnitTable::COUNT)
}

fn trim_fixed(fixed: &str) -> String {
    let trimmed = if fixed.contains('.') {
        fixed.trim_end_matches('0').trim_end_matches('.')
    } else {
        fixed
    };
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}
