//! Host-facing configuration for a single instrumentation run.

use crate::srcmap::SourceMapConsumer;

/// How the module's top level is parsed, which also fixes its ambient
/// strictness: ES modules are always strict, scripts start sloppy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceType {
    #[default]
    Script,
    Module,
}

/// Configuration for one module's instrumentation.
///
/// One `Options` value describes exactly one module; modules share nothing,
/// so hosts instrumenting in parallel build one per thread. The two counters
/// exist for code evaluated inside `eval`: instrumentation of that code must
/// continue block-id numbering and name-suffix reservation where the outer
/// module left off.
pub struct Options<'a> {
    /// Filename used in tracker comments, metadata and error messages.
    pub filename: String,
    /// Full source text of the module, emitted in the shared sources map.
    pub source: String,
    pub source_type: SourceType,
    /// Require path of the tracker/scope-id runtime initializer.
    pub tracker_require_path: String,
    /// Require path of the eval helper runtime.
    pub eval_require_path: String,
    /// True when the input is code recovered from inside an `eval` call; the
    /// function-info emitters then go at the top of the program instead of
    /// the bottom.
    pub is_eval_code: bool,
    /// First block id to allocate. The module root block takes this id.
    pub next_block_id: u32,
    /// Starting value for the injected-name suffix counter.
    pub name_suffix_counter: u32,
    /// Optional consumer for an input source map; used only to remap the
    /// locations stored in serialized function ASTs.
    pub source_map: Option<&'a dyn SourceMapConsumer>,
}

impl<'a> Options<'a> {
    pub fn new(filename: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            source: source.into(),
            source_type: SourceType::Script,
            tracker_require_path: "livepack/init.js".to_owned(),
            eval_require_path: "livepack/eval.js".to_owned(),
            is_eval_code: false,
            next_block_id: crate::block::ROOT_BLOCK_ID,
            name_suffix_counter: 0,
            source_map: None,
        }
    }

    pub fn with_source_type(mut self, source_type: SourceType) -> Self {
        self.source_type = source_type;
        self
    }

    pub fn with_source_map(mut self, map: &'a dyn SourceMapConsumer) -> Self {
        self.source_map = Some(map);
        self
    }
}
