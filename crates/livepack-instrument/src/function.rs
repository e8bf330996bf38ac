//! Per-function records built up during the pass.
//!
//! One record exists for every function, arrow, method and class in the
//! module. Class constructors are bound to their class's record rather than
//! getting one of their own. Records live in an arena indexed by [`FnId`];
//! parent/child links are ids so the cyclic function graph needs no heap
//! cycles, and metadata emission is a post-order sweep over indices.

use ahash::AHashMap;
use indexmap::{IndexMap, IndexSet};

use crate::{block::BlockId, ident::InternalName, trail::Trail};

/// Arena index of a function record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct FnId(u32);

impl FnId {
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Classification of a function record, in metadata order of precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, strum::IntoStaticStr)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum FnKind {
    Plain,
    Async,
    Generator,
    AsyncGenerator,
    Class,
    Method,
    Arrow,
}

/// Use of one captured variable by one function.
#[derive(Debug, Clone, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedVar {
    pub is_read_from: bool,
    pub is_assigned_to: bool,
    pub is_function_name: bool,
    /// Occurrence sites, relative to the capturing function's AST.
    pub trails: Vec<Trail>,
}

/// One captured scope of a function: the block plus the variables used.
#[derive(Debug, Clone, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedScope {
    pub block_name: Option<String>,
    /// Variables captured from this block, in first-use order.
    pub vars: IndexMap<String, CapturedVar>,
}

/// A non-standard rewrite the serializer must apply at a recorded site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AmendmentKind {
    /// Write to a `const`/class-name binding; always throws.
    ConstViolationConst,
    /// Write to a function-expression name in strict mode; throws.
    ConstViolationFnThrowing,
    /// Write to a function-expression name in sloppy mode; fails silently.
    ConstViolationFnSilent,
    SuperCall,
    SuperExpression,
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Amendment {
    pub kind: AmendmentKind,
    pub block_id: BlockId,
    pub trail: Trail,
}

/// The stable value a method's `super` dispatches through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuperTarget {
    /// The class's own inner name binding.
    ClassName(String),
    /// A `const` binding the class expression was assigned to.
    Binding(String),
    /// An injected temp slot.
    Temp(InternalName),
}

/// Everything recorded about one function.
#[derive(Debug)]
pub struct FunctionRecord {
    /// Record id: the parameter block's id, retargeted to the name block
    /// when the function contains direct `eval` and has a name.
    pub id: BlockId,
    pub parent: Option<FnId>,
    pub name: Option<String>,
    pub is_strict: bool,
    pub is_async: bool,
    pub is_generator: bool,
    pub is_arrow: bool,
    pub is_class: bool,
    pub is_method: bool,
    /// Captured scopes keyed by block id; sorted ascending on exit, which is
    /// the order the injected tracker call emits them.
    pub captured_scopes: IndexMap<BlockId, CapturedScope>,
    /// Names the serializer must treat as internal (renameable), with their
    /// occurrence sites relative to this function's AST.
    pub internal_vars: IndexMap<String, Vec<Trail>>,
    /// Occurrences of locally-bound names, kept so rewrites that lift a
    /// binding can report the sites.
    pub local_occurrences: AHashMap<String, Vec<Trail>>,
    /// Free names treated as globals (includes unshadowed module-locals).
    pub global_names: IndexSet<String>,
    pub amendments: Vec<Amendment>,
    pub contains_eval: bool,
    pub contains_import: bool,
    pub has_super_class: bool,
    /// Statement index of the first top-level `super(...)` call in a
    /// derived-class constructor.
    pub first_super_statement_index: Option<u32>,
    /// The first top-level `super(...)` statement is also the last statement.
    pub returns_super: bool,
    pub super_target: Option<SuperTarget>,
    /// Parameter names, recorded only when every parameter is a simple
    /// identifier and the function is sloppy; empty otherwise, and always
    /// empty in strict mode.
    pub arg_names: Vec<String>,
    pub children: Vec<FnId>,
    /// Absolute trail from the program root to the function node.
    pub trail: Trail,
    /// The function's AST as captured at entry, before any mutation, with
    /// nested functions elided to null (class constructors inline).
    pub ast_snapshot: serde_json::Value,
}

impl FunctionRecord {
    pub fn kind(&self) -> FnKind {
        if self.is_class {
            FnKind::Class
        } else if self.is_method {
            FnKind::Method
        } else if self.is_arrow {
            FnKind::Arrow
        } else if self.is_async && self.is_generator {
            FnKind::AsyncGenerator
        } else if self.is_async {
            FnKind::Async
        } else if self.is_generator {
            FnKind::Generator
        } else {
            FnKind::Plain
        }
    }

    /// Single-character code used in tracker comments, derived from the
    /// function's shape rather than its role.
    pub fn comment_code(&self) -> char {
        if self.is_class {
            'c'
        } else if self.is_async && self.is_generator {
            'b'
        } else if self.is_async {
            'a'
        } else if self.is_generator {
            'g'
        } else {
            'f'
        }
    }

    /// Records one use of a captured variable from `block`.
    pub fn record_capture(
        &mut self,
        block: BlockId,
        block_name: Option<&str>,
        name: &str,
        is_read: bool,
        is_write: bool,
        is_function_name: bool,
        trail: Option<Trail>,
    ) {
        let scope = self.captured_scopes.entry(block).or_insert_with(|| CapturedScope {
            block_name: block_name.map(str::to_owned),
            ..CapturedScope::default()
        });
        let var = scope.vars.entry(name.to_owned()).or_default();
        var.is_read_from |= is_read;
        var.is_assigned_to |= is_write;
        var.is_function_name |= is_function_name;
        if let Some(trail) = trail {
            var.trails.push(trail);
        }
    }

    /// Prepends an amendment, so records added while unwinding nested
    /// constructs come first.
    pub fn prepend_amendment(&mut self, kind: AmendmentKind, block_id: BlockId, trail: Trail) {
        self.amendments.insert(0, Amendment { kind, block_id, trail });
    }

    /// Sorts captured scopes ascending by block id. Called once on exit.
    pub fn sort_captured_scopes(&mut self) {
        self.captured_scopes.sort_keys();
    }
}

/// Arena of all function records of one module.
#[derive(Debug, Default)]
pub struct Functions {
    arena: Vec<FunctionRecord>,
}

impl Functions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: FunctionRecord) -> FnId {
        let id = FnId(u32::try_from(self.arena.len()).expect("function arena exceeds u32"));
        self.arena.push(record);
        id
    }

    pub fn get(&self, id: FnId) -> &FunctionRecord {
        &self.arena[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: FnId) -> &mut FunctionRecord {
        &mut self.arena[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FnId, &FunctionRecord)> {
        self.arena
            .iter()
            .enumerate()
            .map(|(index, record)| (FnId(u32::try_from(index).expect("function arena exceeds u32")), record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn empty_record() -> FunctionRecord {
        FunctionRecord {
            id: crate::block::Blocks::new(1).create(None, None, None, None),
            parent: None,
            name: None,
            is_strict: false,
            is_async: false,
            is_generator: false,
            is_arrow: false,
            is_class: false,
            is_method: false,
            captured_scopes: IndexMap::new(),
            internal_vars: IndexMap::new(),
            local_occurrences: AHashMap::new(),
            global_names: IndexSet::new(),
            amendments: Vec::new(),
            contains_eval: false,
            contains_import: false,
            has_super_class: false,
            first_super_statement_index: None,
            returns_super: false,
            super_target: None,
            arg_names: Vec::new(),
            children: Vec::new(),
            trail: Trail::new(),
            ast_snapshot: serde_json::Value::Null,
        }
    }

    #[test]
    fn kind_prefers_role_over_shape() {
        let mut record = empty_record();
        record.is_async = true;
        record.is_method = true;
        assert_eq!(record.kind(), FnKind::Method);
        // The comment code still reflects the shape.
        assert_eq!(record.comment_code(), 'a');
    }

    #[test]
    fn amendments_are_prepended() {
        let mut record = empty_record();
        let block = record.id;
        record.prepend_amendment(AmendmentKind::SuperExpression, block, Trail::new());
        record.prepend_amendment(AmendmentKind::ConstViolationConst, block, smallvec![]);
        assert_eq!(record.amendments[0].kind, AmendmentKind::ConstViolationConst);
        assert_eq!(record.amendments[1].kind, AmendmentKind::SuperExpression);
    }

    #[test]
    fn capture_flags_accumulate() {
        let mut record = empty_record();
        let block = record.id;
        record.record_capture(block, None, "x", true, false, false, None);
        record.record_capture(block, None, "x", false, true, false, None);
        let var = &record.captured_scopes[&block].vars["x"];
        assert!(var.is_read_from);
        assert!(var.is_assigned_to);
    }
}
