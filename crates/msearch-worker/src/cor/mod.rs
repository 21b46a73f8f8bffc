//! Chain-of-responsibility engine: context, commands and chains.

pub mod chain;
pub mod command;
pub mod context;

pub use chain::{Chain, ChainBuilder};
pub use command::{record_outcome, Command};
pub use context::{
    ExecutionContext, SkipReason, Slot, StepError, StepRecord, StepStatus, TraceHandle, Value,
};
