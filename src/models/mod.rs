pub mod evaluation;
pub mod memory;
pub mod plan;
pub mod slot;
pub mod trace;

pub use evaluation::{Evaluation, InteractionRecord};
pub use memory::{NoteEntry, SummaryEntry};
pub use plan::{Plan, RawPlan};
pub use slot::SlotRow;
pub use trace::{preview, ExecutionTrace, RunOutcome, PREVIEW_MAX_CHARS};
