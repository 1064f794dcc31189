//! Loop data model

pub mod error;
pub mod fix;
pub mod iteration;
pub mod levels;
pub mod result;
pub mod stats;

pub use error::{ErrorIdentity, NormalizedError, SourceLocation};
pub use fix::{CodeSketch, FixKind, FixStatus, FixSuggestion};
pub use iteration::{Iteration, IterationOutcome};
pub use levels::{Impact, Priority, Severity};
pub use result::LoopResult;
pub use stats::{DebugLoopStats, ErrorFrequency};
