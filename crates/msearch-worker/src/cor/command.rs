//! The unit of work of a chain.

use async_trait::async_trait;
use tracing::warn;

use crate::cor::context::{ExecutionContext, Slot};
use crate::error::WorkerResult;

/// A named step operating on the shared [`ExecutionContext`].
///
/// Implementations never return errors: failures are recorded in the
/// context with [`ExecutionContext::add_error`] and the enclosing chain
/// decides whether to continue.
#[async_trait]
pub trait Command: Send + Sync {
    fn name(&self) -> &str;

    fn input_slot(&self) -> Slot {
        Slot::Input
    }

    fn output_slot(&self) -> Slot {
        Slot::Output
    }

    /// Default: the invocation is still live and the input slot is set.
    fn is_eligible(&self, ctx: &ExecutionContext) -> bool {
        ctx.trace().is_active() && ctx.contains(&self.input_slot())
    }

    async fn execute(&self, ctx: &mut ExecutionContext);
}

/// Fold a step result into the context, returning the success value.
pub fn record_outcome<T>(ctx: &mut ExecutionContext, step: &str, result: WorkerResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(step = %step, "Step failed: {}", e);
            ctx.add_error(step, e);
            None
        }
    }
}
