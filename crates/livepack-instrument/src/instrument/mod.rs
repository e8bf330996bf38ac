//! The instrumentation pass: a single depth-first traversal of the module
//! AST in source order.
//!
//! The driver maintains the absolute trail from the program root, the stack
//! of open function contexts, the stack of open blocks and the ambient
//! strictness. Specialized visitors (statements, expressions, functions,
//! classes, `eval`) consult the binding resolver and build up block and
//! function state; structural rewrites (parameter hoisting, super targets,
//! tracker injection) run on exit of the rewritten construct, after all
//! trails into it were taken, so recorded trails always address the
//! pre-mutation snapshot.

pub(crate) mod eval;
pub(crate) mod expr;
pub(crate) mod functions;
pub(crate) mod params;
pub(crate) mod scan;
pub(crate) mod stmt;
pub(crate) mod tracker;

use crate::{
    ast::{build, Program, Stmt},
    block::{BlockId, Blocks},
    error::{CodeLoc, ErrorKind, InstrumentError},
    function::{FnId, Functions},
    ident::{IdentTable, InternalName},
    options::{Options, SourceType},
    trace::{InstrumentTracer, TraceEvent},
    trail::{rebase, TrailSeg},
};

/// Traversal nesting limit. Prevents a stack overflow on pathologically
/// nested inputs; reported as an error instead.
#[cfg(not(debug_assertions))]
pub(crate) const MAX_NESTING_DEPTH: u16 = 400;
/// Debug builds have much larger stack frames; keep the limit low enough to
/// fail cleanly before the stack does.
#[cfg(debug_assertions)]
pub(crate) const MAX_NESTING_DEPTH: u16 = 120;

pub(crate) type Result<T> = std::result::Result<T, InstrumentError>;

/// One open function context on the traversal stack.
///
/// Class constructors push a context whose `record` is the class's record;
/// the class node itself pushes a transparent "shell" context so heritage
/// and computed-key code records captures on the class record's chain.
#[derive(Debug)]
pub(crate) struct FnCtx {
    pub record: FnId,
    pub is_arrow: bool,
    pub is_constructor: bool,
    pub is_class_shell: bool,
    pub param_block: BlockId,
    pub body_block: BlockId,
    pub name_block: Option<BlockId>,
    /// The super scope of the class/object this method belongs to.
    pub home_super_block: Option<BlockId>,
    /// Length of the absolute trail at the function node, for rebasing
    /// occurrence trails onto this function.
    pub trail_len: usize,
    pub saved_strict: bool,
}

/// One open class or object-literal super scope.
#[derive(Debug)]
pub(crate) struct SuperCtx {
    pub super_block: BlockId,
    /// Records of every function between a `super` use site and its method,
    /// the methods included; all of them need the resolved super target.
    pub fns_needing_target: Vec<FnId>,
    pub any_super: bool,
}

/// The instrumentation pass state.
pub(crate) struct Instrumentor<'a, T: InstrumentTracer> {
    pub opts: &'a Options<'a>,
    pub tracer: &'a mut T,
    pub blocks: Blocks,
    pub functions: Functions,
    pub idents: IdentTable,
    /// Absolute trail from the program root to the node being visited.
    pub trail: Vec<TrailSeg>,
    pub fn_stack: Vec<FnCtx>,
    pub block_stack: Vec<BlockId>,
    pub super_stack: Vec<SuperCtx>,
    pub strict: bool,
    depth: u16,
    pub eval_used: bool,
    pub import_used: bool,
    pub root_block: BlockId,
    /// Function records with no enclosing function, in source order.
    pub top_level_fns: Vec<FnId>,
    /// Names declared at the program top level, kept to associate bindings
    /// for declarations synthesized upstream.
    pub top_level_names: ahash::AHashSet<String>,
}

impl<'a, T: InstrumentTracer> Instrumentor<'a, T> {
    pub fn new(opts: &'a Options<'a>, tracer: &'a mut T) -> Self {
        let mut blocks = Blocks::new(opts.next_block_id);
        let root_block = blocks.create(Some("module".to_owned()), None, None, None);
        Self {
            opts,
            tracer,
            blocks,
            functions: Functions::new(),
            idents: IdentTable::new(opts.name_suffix_counter),
            trail: Vec::new(),
            fn_stack: Vec::new(),
            block_stack: Vec::new(),
            super_stack: Vec::new(),
            strict: false,
            depth: 0,
            eval_used: false,
            import_used: false,
            root_block,
            top_level_fns: Vec::new(),
            top_level_names: ahash::AHashSet::new(),
        }
    }

    /// Runs the pass over the program. On return the AST carries all
    /// per-function instrumentation; program-level injections and the
    /// finalize rename happen in the output assembler.
    pub fn run(&mut self, program: &mut Program) -> Result<()> {
        self.strict = self.opts.source_type == SourceType::Module
            || program.source_type == Some(SourceType::Module)
            || scan::has_use_strict(&program.body);

        let root = self.root_block;
        self.block_stack.push(root);

        scan::hoist_fn_scope(self, root, &program.body);
        scan::hoist_block_scope(self, root, &program.body);
        for stmt in &program.body {
            scan::register_import_bindings(self, root, stmt)?;
        }

        self.push_key("body");
        for (index, stmt) in program.body.iter_mut().enumerate() {
            self.push_index(index);
            self.visit_stmt(stmt)?;
            self.pop_trail(1);
        }
        self.pop_trail(1);

        debug_assert_eq!(self.block_stack.len(), 1, "block stack must unwind to the root");
        debug_assert!(self.fn_stack.is_empty(), "function stack must unwind completely");
        self.block_stack.pop();
        Ok(())
    }

    // -- errors -------------------------------------------------------------

    pub(crate) fn err(&self, kind: ErrorKind, message: impl Into<String>, loc: Option<CodeLoc>) -> InstrumentError {
        InstrumentError::new(kind, message, loc, &self.opts.filename)
    }

    pub(crate) fn unexpected_node(&self, node_type: &str, loc: Option<CodeLoc>) -> InstrumentError {
        self.err(
            ErrorKind::UnexpectedNode,
            format!("unsupported node type '{node_type}'"),
            loc,
        )
    }

    pub(crate) fn invariant(&self, message: impl Into<String>, loc: Option<CodeLoc>) -> InstrumentError {
        self.err(ErrorKind::InternalInvariant, message, loc)
    }

    // -- trail --------------------------------------------------------------

    pub(crate) fn push_key(&mut self, key: &'static str) {
        self.trail.push(TrailSeg::Key(key));
    }

    pub(crate) fn push_index(&mut self, index: usize) {
        self.trail
            .push(TrailSeg::Index(u32::try_from(index).expect("child index exceeds u32")));
    }

    pub(crate) fn pop_trail(&mut self, count: usize) {
        for _ in 0..count {
            self.trail.pop();
        }
    }

    // -- depth guard --------------------------------------------------------

    pub(crate) fn enter_depth(&mut self, loc: Option<CodeLoc>) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(self.err(
                ErrorKind::NestingTooDeep,
                format!("module nests deeper than {MAX_NESTING_DEPTH} levels"),
                loc,
            ));
        }
        Ok(())
    }

    pub(crate) fn leave_depth(&mut self) {
        self.depth -= 1;
    }

    // -- stacks -------------------------------------------------------------

    /// Creates a block and reports it to the tracer.
    pub(crate) fn create_block(
        &mut self,
        name: Option<String>,
        parent: Option<BlockId>,
        vars_forward: Option<BlockId>,
        owner: Option<FnId>,
    ) -> BlockId {
        let block = self.blocks.create(name.clone(), parent, vars_forward, owner);
        self.tracer.on_event(TraceEvent::BlockCreated { block, name });
        block
    }

    pub(crate) fn cur_block(&self) -> BlockId {
        *self.block_stack.last().expect("block stack is never empty during traversal")
    }

    /// The context captures and occurrences are recorded against: the
    /// innermost context, stepping past a constructor down to its class
    /// shell so trails rebase onto the class node.
    pub(crate) fn recording_ctx(&self) -> Option<&FnCtx> {
        let last = self.fn_stack.last()?;
        if last.is_constructor {
            let shell = &self.fn_stack[self.fn_stack.len() - 2];
            debug_assert_eq!(shell.record, last.record, "constructor context must sit on its class shell");
            Some(shell)
        } else {
            Some(last)
        }
    }

    /// The record id captures from the current position attach to first.
    pub(crate) fn cur_record(&self) -> Option<FnId> {
        self.fn_stack.last().map(|ctx| ctx.record)
    }

    // -- recording ----------------------------------------------------------

    /// Records an occurrence of a locally-bound name on the current function.
    pub(crate) fn record_local_occurrence(&mut self, name: &str) {
        let Some(ctx) = self.recording_ctx() else { return };
        let trail = rebase(&self.trail, ctx.trail_len);
        let record = ctx.record;
        self.functions
            .get_mut(record)
            .local_occurrences
            .entry(name.to_owned())
            .or_default()
            .push(trail);
    }

    /// Records a capture of `name` (declared in `decl_block`) on every open
    /// function from the innermost out to, but excluding, the declaring
    /// function. Allocates the block's scope-id slot.
    pub(crate) fn record_capture_chain(
        &mut self,
        decl_block: BlockId,
        name: &str,
        is_read: bool,
        is_write: bool,
        is_function_name: bool,
        with_trails: bool,
    ) {
        let owner = self.blocks.get(decl_block).owner_fn;
        let Some(innermost) = self.fn_stack.last() else { return };
        if owner == Some(innermost.record) {
            return;
        }
        let block_name = self.blocks.get(decl_block).name.clone();
        self.blocks.ensure_scope_id(decl_block);
        for ctx in self.fn_stack.iter().rev() {
            if Some(ctx.record) == owner {
                break;
            }
            // The constructor's record is its class's; the class shell
            // below it records with class-relative trails.
            if ctx.is_constructor {
                continue;
            }
            let trail = if with_trails {
                Some(rebase(&self.trail, ctx.trail_len))
            } else {
                None
            };
            self.functions.get_mut(ctx.record).record_capture(
                decl_block,
                block_name.as_deref(),
                name,
                is_read,
                is_write,
                is_function_name,
                trail,
            );
            self.tracer.on_event(TraceEvent::CaptureRecorded {
                fn_id: ctx.record,
                block: decl_block,
                name: name.to_owned(),
            });
        }
    }

    /// Marks `contains_eval` (or `contains_import`) on the current function
    /// and every enclosing one. Class shells are skipped: they share their
    /// record with the constructor, whose blocks are not on the scope chain
    /// of a sibling method, so flagging through the shell would disable the
    /// constructor's own rewrites for an eval it never sees. An eval in the
    /// constructor itself still lands on the class record through the
    /// constructor context.
    pub(crate) fn mark_fn_flag_chain(&mut self, eval: bool) {
        for ctx in &self.fn_stack {
            if ctx.is_class_shell {
                continue;
            }
            let record = self.functions.get_mut(ctx.record);
            if eval {
                record.contains_eval = true;
            } else {
                record.contains_import = true;
            }
        }
    }

    // -- injected declarations ---------------------------------------------

    /// Drains the scope-id and temp declarations queued on a hosting block
    /// and renders them, scope ids first.
    pub(crate) fn block_prologue_stmts(&mut self, block: BlockId) -> Vec<Stmt> {
        let record = self.blocks.get_mut(block);
        let scope_ids = std::mem::take(&mut record.pending_scope_ids);
        let temps = std::mem::take(&mut record.pending_temps);
        let mut stmts = Vec::with_capacity(scope_ids.len() + usize::from(!temps.is_empty()));
        for slot in scope_ids {
            stmts.push(build::const_decl(
                build::internal_ident(slot),
                build::call(build::internal_ident_expr(InternalName::GetScopeId), Vec::new()),
            ));
        }
        if !temps.is_empty() {
            stmts.push(build::let_decl_uninit(temps.into_iter().map(build::internal_ident).collect()));
        }
        stmts
    }

}
