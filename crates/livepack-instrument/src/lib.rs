//! Source instrumentation compiler for live-value serialization.
//!
//! Rewrites a JavaScript module so that every function in it becomes
//! inspectable at runtime — its identity, the block scopes it closes over
//! and the live bindings within those scopes — without changing observable
//! behavior. The instrumented module runs as the original would; invoking
//! any function with the runtime's sentinel reveals its scope state to the
//! serializer.
//!
//! The instrumentor consumes an ESTree-shaped AST as JSON (the parser and
//! the printer are external collaborators) and emits the mutated AST plus a
//! sidecar metadata bundle: per-function identity, captured-scope layout,
//! amendments the serializer must apply, the function's own AST, and a
//! shared sources map.
//!
//! ```no_run
//! use livepack_instrument::{instrument, Options};
//!
//! let ast: serde_json::Value = serde_json::from_str(r#"{"type":"Program","body":[]}"#).unwrap();
//! let options = Options::new("src/app.js", "");
//! let output = instrument(ast, &options).unwrap();
//! let instrumented = output.program_json();
//! ```

pub mod ast;
mod block;
mod error;
mod function;
mod ident;
mod instrument;
mod options;
mod output;
mod resolve;
mod srcmap;
mod trace;
mod trail;

pub use crate::{
    block::{BlockId, ROOT_BLOCK_ID},
    error::{CodeLoc, ErrorKind, InstrumentError},
    function::{Amendment, AmendmentKind, CapturedVar, FnId, FnKind},
    ident::{NAME_PREFIX, TRACKER_COMMENT_PREFIX, TRANSFORMED_MARKER},
    options::{Options, SourceType},
    output::{FnMeta, InstrumentOutput, ScopeMeta, SuperTargetMeta},
    srcmap::{NoSourceMap, OriginalPos, SourceMapConsumer},
    trace::{InstrumentTracer, NoopTracer, RecordingTracer, TraceEvent},
    trail::{Trail, TrailSeg},
};

/// Instruments one module. The input is ESTree JSON as produced by the host
/// parser; the output carries the mutated AST and the metadata bundle.
pub fn instrument(
    program_json: serde_json::Value,
    options: &Options<'_>,
) -> Result<InstrumentOutput, InstrumentError> {
    let mut tracer = NoopTracer;
    instrument_traced(program_json, options, &mut tracer)
}

/// [`instrument`] with a tracer receiving pass events. [`NoopTracer`]
/// monomorphizes all hooks away; [`RecordingTracer`] captures them.
pub fn instrument_traced<T: InstrumentTracer>(
    program_json: serde_json::Value,
    options: &Options<'_>,
    tracer: &mut T,
) -> Result<InstrumentOutput, InstrumentError> {
    let mut program: ast::Program = serde_json::from_value(program_json).map_err(|err| {
        InstrumentError::new(
            ErrorKind::UnexpectedNode,
            format!("module does not deserialize as an ESTree program: {err}"),
            None,
            &options.filename,
        )
    })?;
    let mut instr = instrument::Instrumentor::new(options, tracer);
    instr.run(&mut program)?;
    let suffix = instr.idents.finalize();
    instrument::tracker::finish_program(&mut instr, &mut program);
    if instr.idents.needs_rename() {
        output::rename_internal_idents(&mut program, &instr.idents);
        instr.tracer.on_event(TraceEvent::PrefixFinalized { suffix });
    }
    Ok(output::assemble(&instr, program))
}
