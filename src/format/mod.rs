//! Human-readable rendering of byte counts and throughput numbers, plus the
//! sort keys used to order formatted table cells.

pub mod magnitude;
pub mod sort_key;

pub use magnitude::{Magnitude, UnitTable, format_magnitude};
pub use sort_key::{SortKind, error_key, numeric_key, size_key};
