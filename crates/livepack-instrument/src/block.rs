//! Lexical blocks: the containers bindings live in.
//!
//! One block exists per binding region of the module: the program, each
//! function's parameter and body scopes, statement blocks, loop bodies, for
//! heads, catch params/bodies, switch bodies, class name/super scopes and
//! object-literal super scopes. Blocks form a tree by parent id and live in
//! an arena; nothing holds a reference to a block, only its id.
//!
//! Some blocks cannot physically host declarations (parameter scopes, for
//! heads, switch bodies, class scopes). Their `vars_block` forwards to the
//! nearest statement-hosting block, which is where injected scope-id and
//! temp declarations for them are emitted.

use indexmap::IndexMap;

use crate::{function::FnId, ident::InternalName};

/// Id of the module root block. Dense ids count up from here unless the
/// module is eval-context code continuing an outer module's numbering.
pub const ROOT_BLOCK_ID: u32 = 1;

/// Stable id of a block, unique and dense within a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct BlockId(u32);

impl BlockId {
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// What introduced a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Var,
    Let,
    Const,
    Param,
    CatchParam,
    /// `function f() {}` declaration.
    FunctionDecl,
    /// `class C {}` declaration.
    ClassDecl,
    /// The inner name binding of a named function expression.
    FunctionExprName,
    /// The inner name binding of a class (declaration or expression); always
    /// immutable.
    ClassName,
    Import,
    /// Implicit bindings: `this`, `arguments`, `super`.
    Synthetic,
}

/// A binding registered in a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub kind: BindingKind,
}

impl Binding {
    pub fn new(kind: BindingKind) -> Self {
        Self { kind }
    }

    /// Writes to the binding are erroneous (throwing or silent).
    pub fn is_const(self) -> bool {
        matches!(
            self.kind,
            BindingKind::Const | BindingKind::FunctionExprName | BindingKind::ClassName
        )
    }

    /// Writes fail silently in sloppy mode instead of throwing.
    pub fn is_silent_const(self) -> bool {
        self.kind == BindingKind::FunctionExprName
    }

    /// The binding names a function or class.
    pub fn is_function_name(self) -> bool {
        matches!(
            self.kind,
            BindingKind::FunctionDecl | BindingKind::ClassDecl | BindingKind::FunctionExprName | BindingKind::ClassName
        )
    }
}

/// A lexical block.
#[derive(Debug)]
pub struct Block {
    pub id: BlockId,
    /// Human-readable name for metadata (function name, `catch`, …).
    pub name: Option<String>,
    pub parent: Option<BlockId>,
    /// The block that physically hosts declarations for this block.
    pub vars_block: BlockId,
    /// The function whose scope subtree this block belongs to; `None` for
    /// program-level blocks.
    pub owner_fn: Option<FnId>,
    /// Bindings declared here, in declaration order.
    pub bindings: IndexMap<String, Binding>,
    /// Injected identifier that receives this block's runtime scope id.
    /// Allocated lazily the first time a binding of the block is captured.
    pub scope_id_slot: Option<InternalName>,
    /// Injected temp slots belonging to this block.
    pub temp_slots: Vec<InternalName>,
    /// Scope-id declarations awaiting emission at this block's exit, for
    /// this block and for blocks whose `vars_block` forwards here.
    pub pending_scope_ids: Vec<InternalName>,
    /// Temp declarations awaiting emission at this block's exit.
    pub pending_temps: Vec<InternalName>,
}

/// Arena of all blocks of one module.
#[derive(Debug)]
pub struct Blocks {
    arena: Vec<Block>,
    first_id: u32,
}

impl Blocks {
    pub fn new(first_id: u32) -> Self {
        Self {
            arena: Vec::new(),
            first_id,
        }
    }

    /// Creates a block. `vars_forward` is the hosting block for contexts
    /// that cannot hold declarations; `None` means the block hosts its own.
    pub fn create(
        &mut self,
        name: Option<String>,
        parent: Option<BlockId>,
        vars_forward: Option<BlockId>,
        owner_fn: Option<FnId>,
    ) -> BlockId {
        let id = BlockId(self.first_id + u32::try_from(self.arena.len()).expect("block arena exceeds u32"));
        self.arena.push(Block {
            id,
            name,
            parent,
            vars_block: vars_forward.unwrap_or(id),
            owner_fn,
            bindings: IndexMap::new(),
            scope_id_slot: None,
            temp_slots: Vec::new(),
            pending_scope_ids: Vec::new(),
            pending_temps: Vec::new(),
        });
        id
    }

    pub fn get(&self, id: BlockId) -> &Block {
        &self.arena[(id.0 - self.first_id) as usize]
    }

    pub fn get_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.arena[(id.0 - self.first_id) as usize]
    }

    /// First id not yet allocated; published in output so eval-context code
    /// can continue the numbering.
    pub fn next_id(&self) -> u32 {
        self.first_id + u32::try_from(self.arena.len()).expect("block arena exceeds u32")
    }

    /// Registers a binding. A later declaration overwrites an earlier one,
    /// except `var` never demotes a function declaration (`var x;` after
    /// `function x() {}` leaves `x` a function name).
    pub fn declare(&mut self, block: BlockId, name: &str, binding: Binding) {
        let bindings = &mut self.get_mut(block).bindings;
        if let Some(existing) = bindings.get(name)
            && existing.kind == BindingKind::FunctionDecl
            && binding.kind == BindingKind::Var
        {
            return;
        }
        bindings.insert(name.to_owned(), binding);
    }

    /// Finds the declaring block for `name`, walking ancestors from `start`.
    pub fn lookup(&self, start: BlockId, name: &str) -> Option<(BlockId, Binding)> {
        let mut current = Some(start);
        while let Some(id) = current {
            let block = self.get(id);
            if let Some(binding) = block.bindings.get(name) {
                return Some((id, *binding));
            }
            current = block.parent;
        }
        None
    }

    /// Returns the block's scope-id slot, allocating it on first use and
    /// queueing its declaration on the hosting block.
    pub fn ensure_scope_id(&mut self, id: BlockId) -> InternalName {
        if let Some(slot) = &self.get(id).scope_id_slot {
            return slot.clone();
        }
        let slot = InternalName::ScopeId(id.raw());
        self.get_mut(id).scope_id_slot = Some(slot.clone());
        let host = self.get(id).vars_block;
        self.get_mut(host).pending_scope_ids.push(slot.clone());
        slot
    }

    /// Records a temp slot on the block and queues its declaration on the
    /// hosting block.
    pub fn add_temp(&mut self, id: BlockId, name: InternalName) {
        self.get_mut(id).temp_slots.push(name.clone());
        let host = self.get(id).vars_block;
        self.get_mut(host).pending_temps.push(name);
    }

    /// The chain of block ids from `start` up to the root, nearest first.
    pub fn ancestor_chain(&self, start: BlockId) -> Vec<BlockId> {
        let mut chain = Vec::new();
        let mut current = Some(start);
        while let Some(id) = current {
            chain.push(id);
            current = self.get(id).parent;
        }
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_dense_from_the_seed() {
        let mut blocks = Blocks::new(ROOT_BLOCK_ID);
        let root = blocks.create(None, None, None, None);
        let child = blocks.create(Some("f".to_owned()), Some(root), None, None);
        assert_eq!(root.raw(), 1);
        assert_eq!(child.raw(), 2);
        assert_eq!(blocks.next_id(), 3);
    }

    #[test]
    fn lookup_walks_ancestors() {
        let mut blocks = Blocks::new(ROOT_BLOCK_ID);
        let root = blocks.create(None, None, None, None);
        let inner = blocks.create(None, Some(root), None, None);
        blocks.declare(root, "x", Binding::new(BindingKind::Const));
        let (found, binding) = blocks.lookup(inner, "x").expect("x should resolve");
        assert_eq!(found, root);
        assert!(binding.is_const());
    }

    #[test]
    fn var_does_not_demote_a_function_declaration() {
        let mut blocks = Blocks::new(ROOT_BLOCK_ID);
        let root = blocks.create(None, None, None, None);
        blocks.declare(root, "f", Binding::new(BindingKind::FunctionDecl));
        blocks.declare(root, "f", Binding::new(BindingKind::Var));
        let (_, binding) = blocks.lookup(root, "f").unwrap();
        assert!(binding.is_function_name());
    }

    #[test]
    fn scope_id_slot_allocates_once() {
        let mut blocks = Blocks::new(ROOT_BLOCK_ID);
        let root = blocks.create(None, None, None, None);
        let first = blocks.ensure_scope_id(root);
        let second = blocks.ensure_scope_id(root);
        assert_eq!(first, second);
        assert_eq!(first, InternalName::ScopeId(1));
    }
}
