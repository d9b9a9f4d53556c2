//! Terminal front-ends: the live tail screen, line streaming and listings.

pub mod listing;
pub mod plain;
pub mod tail_screen;

pub use listing::{render_table, table_json};
pub use plain::{LineFormat, PlainView};
pub use tail_screen::TerminalView;
