//! Ordered execution of commands over one context.

use async_trait::async_trait;
use std::time::Instant;
use tracing::{debug, field, info_span, Instrument};

use crate::cor::command::Command;
use crate::cor::context::{ExecutionContext, SkipReason, Slot, StepStatus};
use crate::metrics;

/// An ordered pipeline of commands. A chain is itself a [`Command`], so
/// workflows nest.
///
/// After every step that was considered, the implicit output is piped into
/// the implicit input. When `continue_on_failure` is false, the first
/// recorded error halts the chain and every remaining step is recorded as
/// skipped.
pub struct Chain {
    name: String,
    commands: Vec<Box<dyn Command>>,
    continue_on_failure: bool,
}

pub struct ChainBuilder {
    name: String,
    commands: Vec<Box<dyn Command>>,
    continue_on_failure: bool,
}

impl ChainBuilder {
    pub fn step(mut self, command: impl Command + 'static) -> Self {
        self.commands.push(Box::new(command));
        self
    }

    pub fn boxed_step(mut self, command: Box<dyn Command>) -> Self {
        self.commands.push(command);
        self
    }

    pub fn continue_on_failure(mut self, value: bool) -> Self {
        self.continue_on_failure = value;
        self
    }

    pub fn build(self) -> Chain {
        Chain {
            name: self.name,
            commands: self.commands,
            continue_on_failure: self.continue_on_failure,
        }
    }
}

impl Chain {
    pub fn builder(name: impl Into<String>) -> ChainBuilder {
        ChainBuilder {
            name: name.into(),
            commands: Vec::new(),
            continue_on_failure: false,
        }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.commands.iter().map(|c| c.name()).collect()
    }

    async fn run_steps(&self, ctx: &mut ExecutionContext) {
        let mut halted: Option<SkipReason> = None;

        for command in &self.commands {
            let step = command.name();

            if halted.is_none() {
                if ctx.has_errors() && !self.continue_on_failure {
                    halted = Some(SkipReason::UpstreamFailure);
                } else if !ctx.trace().is_active() {
                    halted = Some(SkipReason::Cancelled);
                }
            }

            // A halted chain leaves the slots as the failing step left them.
            if let Some(reason) = halted {
                debug!(chain = %self.name, step = %step, "Skipping step: {:?}", reason);
                ctx.record_step(step, StepStatus::Skipped(reason));
                continue;
            }

            let status = if command.is_eligible(ctx) {
                self.run_step(command.as_ref(), ctx).await
            } else {
                debug!(chain = %self.name, step = %step, "Step not eligible");
                StepStatus::Skipped(SkipReason::NotEligible)
            };

            ctx.record_step(step, status);
            ctx.pipe();
        }
    }

    async fn run_step(&self, command: &dyn Command, ctx: &mut ExecutionContext) -> StepStatus {
        let step = command.name();
        let span = info_span!(parent: ctx.trace().span(), "step", step = %step, outcome = field::Empty);
        let handle = ctx.trace().child(span.clone());
        let previous = ctx.replace_trace(handle);

        let errors_before = ctx.error_count();
        let started = Instant::now();
        command.execute(ctx).instrument(span.clone()).await;

        let status = if ctx.error_count() > errors_before {
            StepStatus::Failed
        } else {
            StepStatus::Succeeded
        };
        metrics::record_step(step, status == StepStatus::Succeeded, started.elapsed().as_secs_f64());
        span.record("outcome", status.label());

        ctx.replace_trace(previous);
        status
    }
}

#[async_trait]
impl Command for Chain {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &mut ExecutionContext) {
        let span = info_span!(parent: ctx.trace().span(), "chain", chain = %self.name, outcome = field::Empty);
        let handle = ctx.trace().child(span.clone());
        let previous = ctx.replace_trace(handle);
        let errors_before = ctx.error_count();

        self.run_steps(ctx).instrument(span.clone()).await;

        let outcome = if ctx.error_count() > errors_before {
            "failed"
        } else {
            "succeeded"
        };
        span.record("outcome", outcome);
        ctx.replace_trace(previous);

        // Expose the final value as this chain's own output, so an
        // enclosing chain pipes it like any other step.
        if let Some(value) = ctx.remove(&Slot::Input) {
            ctx.set(Slot::Output, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cor::context::{TraceHandle, Value};
    use crate::error::WorkerError;
    use std::sync::{Arc, Mutex};
    use tracing::Span;

    type Log = Arc<Mutex<Vec<(String, Option<Value>)>>>;

    /// Records the input it saw, then writes its output or an error.
    struct Recorder {
        name: String,
        input: Slot,
        output: Option<Value>,
        side: Option<(Slot, Value)>,
        fail: bool,
        log: Log,
    }

    impl Recorder {
        fn new(name: &str, log: &Log) -> Self {
            Self {
                name: name.to_string(),
                input: Slot::Input,
                output: Some(Value::Text(format!("{}-out", name))),
                side: None,
                fail: false,
                log: log.clone(),
            }
        }

        fn failing(mut self) -> Self {
            self.fail = true;
            self
        }

        fn reading(mut self, slot: Slot) -> Self {
            self.input = slot;
            self
        }

        fn writing_side(mut self, slot: Slot, value: Value) -> Self {
            self.side = Some((slot, value));
            self
        }

        fn silent(mut self) -> Self {
            self.output = None;
            self
        }
    }

    #[async_trait]
    impl Command for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        fn input_slot(&self) -> Slot {
            self.input.clone()
        }

        async fn execute(&self, ctx: &mut ExecutionContext) {
            let seen = ctx.get(&Slot::Input).cloned();
            self.log.lock().unwrap().push((self.name.clone(), seen));

            if let Some((slot, value)) = &self.side {
                ctx.set(slot.clone(), value.clone());
            }
            if self.fail {
                ctx.add_error(&self.name, WorkerError::parse_failed("scripted failure"));
                return;
            }
            if let Some(output) = &self.output {
                ctx.set(self.output_slot(), output.clone());
            }
        }
    }

    fn context_with_input(input: &str) -> ExecutionContext {
        let mut ctx = ExecutionContext::new(TraceHandle::new(Span::none()));
        ctx.set(Slot::Input, input);
        ctx
    }

    fn executed(log: &Log) -> Vec<String> {
        log.lock().unwrap().iter().map(|(name, _)| name.clone()).collect()
    }

    fn statuses(ctx: &ExecutionContext) -> Vec<StepStatus> {
        ctx.history().iter().map(|r| r.status).collect()
    }

    #[tokio::test]
    async fn test_first_failure_halts_chain() {
        let log = Log::default();
        let chain = Chain::builder("halting")
            .step(Recorder::new("a", &log))
            .step(Recorder::new("b", &log).failing())
            .step(Recorder::new("c", &log))
            .step(Recorder::new("d", &log))
            .build();

        let mut ctx = context_with_input("payload");
        chain.execute(&mut ctx).await;

        assert_eq!(executed(&log), vec!["a", "b"]);
        assert_eq!(
            statuses(&ctx),
            vec![
                StepStatus::Succeeded,
                StepStatus::Failed,
                StepStatus::Skipped(SkipReason::UpstreamFailure),
                StepStatus::Skipped(SkipReason::UpstreamFailure),
            ]
        );
        assert_eq!(ctx.error_count(), 1);
        assert_eq!(ctx.errors()[0].step, "b");
    }

    #[tokio::test]
    async fn test_continue_on_failure_runs_every_step() {
        let log = Log::default();
        let chain = Chain::builder("tolerant")
            .step(Recorder::new("a", &log).failing())
            .step(Recorder::new("b", &log).reading(Slot::Named("seed".into())))
            .step(Recorder::new("c", &log).failing())
            .continue_on_failure(true)
            .build();

        let mut ctx = context_with_input("payload");
        ctx.set(Slot::Named("seed".into()), "x");
        chain.execute(&mut ctx).await;

        assert_eq!(executed(&log), vec!["a", "b", "c"]);
        assert_eq!(ctx.error_count(), 2);
    }

    #[tokio::test]
    async fn test_output_of_each_step_is_next_input() {
        let log = Log::default();
        let chain = Chain::builder("pipe")
            .step(Recorder::new("a", &log))
            .step(Recorder::new("b", &log).writing_side(Slot::Duration, Value::Seconds(90)))
            .step(Recorder::new("c", &log))
            .build();

        let mut ctx = context_with_input("payload");
        chain.execute(&mut ctx).await;

        let seen: Vec<Option<Value>> = log.lock().unwrap().iter().map(|(_, v)| v.clone()).collect();
        assert_eq!(
            seen,
            vec![
                Some(Value::Text("payload".into())),
                Some(Value::Text("a-out".into())),
                Some(Value::Text("b-out".into())),
            ]
        );
        assert_eq!(ctx.duration(), Some(90));
        assert_eq!(ctx.get(&Slot::Output), Some(&Value::Text("c-out".into())));
        assert!(!ctx.contains(&Slot::Input));
    }

    #[tokio::test]
    async fn test_ineligible_step_is_skipped_and_chain_continues() {
        let log = Log::default();
        let chain = Chain::builder("partial")
            .step(Recorder::new("needs-object", &log).reading(Slot::Object))
            .step(Recorder::new("uses-summary", &log).reading(Slot::Summary))
            .build();

        let mut ctx = context_with_input("payload");
        ctx.set(Slot::Summary, msearch_models::MediaSummary::default());
        chain.execute(&mut ctx).await;

        assert_eq!(executed(&log), vec!["uses-summary"]);
        assert_eq!(
            statuses(&ctx),
            vec![StepStatus::Skipped(SkipReason::NotEligible), StepStatus::Succeeded]
        );
        // The skipped step produced no output, so the pipe cleared the input.
        assert_eq!(log.lock().unwrap()[0].1, None);
        assert!(!ctx.has_errors());
    }

    #[tokio::test]
    async fn test_cancelled_invocation_skips_everything() {
        let log = Log::default();
        let chain = Chain::builder("cancelled")
            .step(Recorder::new("a", &log))
            .step(Recorder::new("b", &log))
            .build();

        let mut ctx = context_with_input("payload");
        ctx.trace().cancel();
        chain.execute(&mut ctx).await;

        assert!(executed(&log).is_empty());
        assert_eq!(
            statuses(&ctx),
            vec![
                StepStatus::Skipped(SkipReason::Cancelled),
                StepStatus::Skipped(SkipReason::Cancelled),
            ]
        );
    }

    #[tokio::test]
    async fn test_nested_chain_is_one_pipe_stage() {
        let log = Log::default();
        let inner = Chain::builder("inner")
            .step(Recorder::new("x", &log))
            .step(Recorder::new("y", &log))
            .build();
        let outer = Chain::builder("outer")
            .step(Recorder::new("a", &log))
            .step(inner)
            .step(Recorder::new("b", &log))
            .build();

        let mut ctx = context_with_input("payload");
        outer.execute(&mut ctx).await;

        assert_eq!(executed(&log), vec!["a", "x", "y", "b"]);
        let b_input = log.lock().unwrap()[3].1.clone();
        assert_eq!(b_input, Some(Value::Text("y-out".into())));
        assert_eq!(ctx.history().len(), 5);
    }

    #[tokio::test]
    async fn test_step_without_output_breaks_implicit_pipe_only() {
        let log = Log::default();
        let chain = Chain::builder("silent")
            .step(Recorder::new("a", &log).silent())
            .step(Recorder::new("b", &log))
            .build();

        let mut ctx = context_with_input("payload");
        chain.execute(&mut ctx).await;

        assert_eq!(executed(&log), vec!["a"]);
        assert_eq!(statuses(&ctx)[1], StepStatus::Skipped(SkipReason::NotEligible));
        assert_eq!(chain.step_names(), vec!["a", "b"]);
    }
}
