//! Lake subset extractor service.
//!
//! Library half of the `lake-extractor` binary: region dispatch over a bounded
//! worker pool, process logging, region table loading and the interactive
//! lookup policy.

pub mod dispatch;
pub mod logging;
pub mod prompt;
pub mod table;

pub use dispatch::{
    DispatchSummary, Dispatcher, FailureKind, RegionOutcome, RunObserver, TracingObserver,
};
pub use prompt::InteractivePolicy;
