//! Per-invocation execution context.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn, Span};

use msearch_models::{Media, MediaObject, MediaSummary};

use crate::error::WorkerError;

/// Well-known context slots. `Input` and `Output` are the implicit pipe
/// between consecutive steps; the rest carry side-channel data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Slot {
    Input,
    Output,
    Object,
    Duration,
    ContentType,
    SummaryJson,
    Summary,
    Scenes,
    Media,
    Named(String),
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Input => write!(f, "input"),
            Slot::Output => write!(f, "output"),
            Slot::Object => write!(f, "object"),
            Slot::Duration => write!(f, "duration"),
            Slot::ContentType => write!(f, "content_type"),
            Slot::SummaryJson => write!(f, "summary_json"),
            Slot::Summary => write!(f, "summary"),
            Slot::Scenes => write!(f, "scenes"),
            Slot::Media => write!(f, "media"),
            Slot::Named(name) => write!(f, "{}", name),
        }
    }
}

/// A value stored in a slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Object(MediaObject),
    Seconds(u32),
    Summary(MediaSummary),
    /// Raw per-scene JSON fragments
    Fragments(Vec<String>),
    Media(Box<Media>),
    Path(PathBuf),
    Json(serde_json::Value),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&MediaObject> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_seconds(&self) -> Option<u32> {
        match self {
            Value::Seconds(s) => Some(*s),
            _ => None,
        }
    }

    pub fn as_summary(&self) -> Option<&MediaSummary> {
        match self {
            Value::Summary(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_fragments(&self) -> Option<&[String]> {
        match self {
            Value::Fragments(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_media(&self) -> Option<&Media> {
        match self {
            Value::Media(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Value::Path(p) => Some(p),
            _ => None,
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<MediaObject> for Value {
    fn from(o: MediaObject) -> Self {
        Value::Object(o)
    }
}

impl From<MediaSummary> for Value {
    fn from(s: MediaSummary) -> Self {
        Value::Summary(s)
    }
}

impl From<Media> for Value {
    fn from(m: Media) -> Self {
        Value::Media(Box::new(m))
    }
}

/// Tracing span plus the cancellation token of one invocation.
#[derive(Debug, Clone)]
pub struct TraceHandle {
    span: Span,
    cancel: CancellationToken,
}

impl TraceHandle {
    pub fn new(span: Span) -> Self {
        Self {
            span,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_token(span: Span, cancel: CancellationToken) -> Self {
        Self { span, cancel }
    }

    /// Handle for a nested scope. Cancelling `self` cancels the child.
    pub fn child(&self, span: Span) -> Self {
        Self {
            span,
            cancel: self.cancel.child_token(),
        }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled()
    }
}

/// An error recorded by a step.
#[derive(Debug)]
pub struct StepError {
    pub step: String,
    pub error: WorkerError,
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.step, self.error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    UpstreamFailure,
    NotEligible,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Succeeded,
    Failed,
    Skipped(SkipReason),
}

impl StepStatus {
    pub fn label(&self) -> &'static str {
        match self {
            StepStatus::Succeeded => "succeeded",
            StepStatus::Failed => "failed",
            StepStatus::Skipped(_) => "skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub step: String,
    pub status: StepStatus,
}

/// Mutable state threaded through one chain invocation.
///
/// Owned by exactly one invocation. Temporary artifacts are removed once,
/// by [`ExecutionContext::close`] or on drop if `close` was never called.
pub struct ExecutionContext {
    values: HashMap<Slot, Value>,
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    errors: Vec<StepError>,
    temp_artifacts: Vec<PathBuf>,
    history: Vec<StepRecord>,
    trace: TraceHandle,
    closed: bool,
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("values", &self.values)
            .field("errors", &self.errors)
            .field("temp_artifacts", &self.temp_artifacts)
            .field("history", &self.history)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl ExecutionContext {
    pub fn new(trace: TraceHandle) -> Self {
        Self {
            values: HashMap::new(),
            extensions: HashMap::new(),
            errors: Vec::new(),
            temp_artifacts: Vec::new(),
            history: Vec::new(),
            trace,
            closed: false,
        }
    }

    pub fn set(&mut self, slot: Slot, value: impl Into<Value>) {
        self.values.insert(slot, value.into());
    }

    pub fn get(&self, slot: &Slot) -> Option<&Value> {
        self.values.get(slot)
    }

    pub fn remove(&mut self, slot: &Slot) -> Option<Value> {
        self.values.remove(slot)
    }

    pub fn contains(&self, slot: &Slot) -> bool {
        self.values.contains_key(slot)
    }

    /// Move the implicit output into the implicit input.
    pub fn pipe(&mut self) {
        match self.values.remove(&Slot::Output) {
            Some(value) => {
                self.values.insert(Slot::Input, value);
            }
            None => {
                self.values.remove(&Slot::Input);
            }
        }
    }

    pub fn input_text(&self) -> Option<&str> {
        self.get(&Slot::Input).and_then(Value::as_text)
    }

    pub fn object(&self) -> Option<&MediaObject> {
        self.get(&Slot::Object).and_then(Value::as_object)
    }

    pub fn duration(&self) -> Option<u32> {
        self.get(&Slot::Duration).and_then(Value::as_seconds)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.get(&Slot::ContentType).and_then(Value::as_text)
    }

    pub fn summary(&self) -> Option<&MediaSummary> {
        self.get(&Slot::Summary).and_then(Value::as_summary)
    }

    pub fn fragments(&self) -> Option<&[String]> {
        self.get(&Slot::Scenes).and_then(Value::as_fragments)
    }

    pub fn media(&self) -> Option<&Media> {
        self.get(&Slot::Media).and_then(Value::as_media)
    }

    /// Store an ad hoc value keyed by its type.
    pub fn insert_extension<T: Any + Send + Sync>(&mut self, value: T) {
        self.extensions.insert(TypeId::of::<T>(), Box::new(value));
    }

    pub fn extension<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref::<T>())
    }

    pub fn add_error(&mut self, step: impl Into<String>, error: WorkerError) {
        self.errors.push(StepError {
            step: step.into(),
            error,
        });
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[StepError] {
        &self.errors
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn add_temp_artifact(&mut self, path: impl Into<PathBuf>) {
        self.temp_artifacts.push(path.into());
    }

    pub fn temp_artifacts(&self) -> &[PathBuf] {
        &self.temp_artifacts
    }

    pub fn trace(&self) -> &TraceHandle {
        &self.trace
    }

    /// Install `trace` and return the previous handle.
    pub fn replace_trace(&mut self, trace: TraceHandle) -> TraceHandle {
        std::mem::replace(&mut self.trace, trace)
    }

    pub fn record_step(&mut self, step: impl Into<String>, status: StepStatus) {
        self.history.push(StepRecord {
            step: step.into(),
            status,
        });
    }

    pub fn history(&self) -> &[StepRecord] {
        &self.history
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Remove every temporary artifact. Failures are logged, never raised.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        for path in self.temp_artifacts.drain(..) {
            let result = if path.is_dir() {
                std::fs::remove_dir_all(&path)
            } else {
                std::fs::remove_file(&path)
            };
            match result {
                Ok(()) => debug!("Removed temporary artifact {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove temporary artifact {}: {}", path.display(), e),
            }
        }
    }
}

impl Drop for ExecutionContext {
    fn drop(&mut self) {
        self.close();
    }
}
