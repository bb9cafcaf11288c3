//! Breach detection against historical offsets
//!
//! The monitor compares each service's current aggregate with the same
//! aggregate at configured offsets in the past. A breach hands off to the
//! reconfirmation scheduler, which re-samples once after a cooldown.

pub mod evaluator;
pub mod monitor;
pub mod outcome;
pub mod recheck;
pub mod shutdown;

pub use evaluator::{evaluate, ComparisonResult, EvalError};
pub use monitor::{OffsetReport, OffsetSkip, ServiceMonitor, ServiceReport};
pub use outcome::{Outcome, OutcomeCounts, OutcomeLog, Stage};
pub use recheck::{
    run_recheck, RecheckHandle, RecheckOutcome, ReconfirmationScheduler, ReconfirmationTask,
};
pub use shutdown::{shutdown_channel, ShutdownSignal, ShutdownTrigger};
