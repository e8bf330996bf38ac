//! Instrumentation tracing infrastructure.
//!
//! Provides a trait-based tracing system for the instrumentation pass with
//! zero-cost abstraction. When using [`NoopTracer`], all trace methods
//! compile away entirely via monomorphization.
//!
//! | Tracer | Purpose |
//! |--------|---------|
//! | [`NoopTracer`] | Zero-cost no-op (production default) |
//! | [`RecordingTracer`] | Full event recording for tests and post-mortem analysis |

use crate::{block::BlockId, function::FnId};

/// Trace event emitted during instrumentation.
///
/// Used by [`RecordingTracer`] to capture a full pass trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// A lexical block was created.
    BlockCreated {
        block: BlockId,
        name: Option<String>,
    },
    /// A function record was opened.
    FunctionEntered {
        fn_id: FnId,
    },
    /// A function record was completed.
    FunctionExited {
        fn_id: FnId,
    },
    /// A capture of `name` from `block` was recorded on `fn_id`.
    CaptureRecorded {
        fn_id: FnId,
        block: BlockId,
        name: String,
    },
    /// An amendment (const violation or super use) was recorded.
    AmendmentRecorded {
        fn_id: FnId,
        kind: &'static str,
    },
    /// A direct `eval` call forced all visible bindings to be captured.
    EvalEscalation {
        fn_id: Option<FnId>,
    },
    /// The finalize pass renamed injected identifiers to a new prefix.
    PrefixFinalized {
        suffix: u32,
    },
}

/// Hook points for observing the instrumentation pass.
///
/// All methods have empty default bodies so implementations only override
/// what they care about.
pub trait InstrumentTracer {
    fn on_event(&mut self, _event: TraceEvent) {}
}

/// Zero-cost tracer that records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl InstrumentTracer for NoopTracer {}

/// Records every event for inspection after the pass.
#[derive(Debug, Clone, Default)]
pub struct RecordingTracer {
    events: Vec<TraceEvent>,
}

impl RecordingTracer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }
}

impl InstrumentTracer for RecordingTracer {
    fn on_event(&mut self, event: TraceEvent) {
        self.events.push(event);
    }
}
