//! Live topic tail: records, bounded buffer, view capability, sources and
//! the self-rescheduling session that ties them together.

pub mod buffer;
pub mod clock;
pub mod driver;
pub mod entry;
pub mod session;
pub mod source;
pub mod view;

pub use buffer::EntryBuffer;
pub use clock::{Clock, ManualClock, SystemClock};
pub use driver::{ControlCommand, DriverSummary, StopReason, TailDriver};
pub use entry::{DisplayEntry, RawMessage};
pub use session::{CycleOutcome, Phase, SessionHandle, SessionSettings, TailSession};
pub use source::{HttpTailSource, TailCursor, TailSource};
pub use view::{MemoryView, Navigation, ScrollViewport, TailView};
