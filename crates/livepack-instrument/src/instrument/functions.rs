//! Function, class and method visitors.
//!
//! Entry builds the scope pair (parameter block whose `vars_block` is the
//! body block), registers parameter bindings, snapshots the untouched AST
//! and pushes the function record. Exit sorts captured scopes, applies the
//! parameter rewrite, injects the tracker and materializes injected block
//! declarations.
//!
//! Classes are records of their own; their constructor shares the class's
//! record and blocks rather than getting its own. A transparent "shell"
//! context is pushed for the whole class node so heritage and computed-key
//! code participates in the class record's capture chain.

use crate::{
    ast::{
        build, CallExpr, ClassNode, ClassTag, Comment, DefaultDecl, Expr, FnBody, FnNode, MemberExpr, MethodKind,
        Stmt,
    },
    block::{Binding, BindingKind, BlockId},
    error::{CodeLoc, ErrorKind},
    function::{AmendmentKind, FnId, FunctionRecord, SuperTarget},
    ident::InternalName,
    trace::{InstrumentTracer, TraceEvent},
    trail::rebase,
};

use super::{scan, tracker, FnCtx, Instrumentor, Result, SuperCtx};

/// How a function node is being visited.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct FnConfig {
    pub is_method: bool,
    pub home_super_block: Option<BlockId>,
    /// The caller places the tracker comment (methods put it relative to
    /// their key).
    pub return_comment: bool,
}

impl<T: InstrumentTracer> Instrumentor<'_, T> {
    pub(crate) fn visit_fn_declaration(&mut self, func: &mut FnNode) -> Result<()> {
        // The declaration's binding was registered by the block scan.
        let comment = self.visit_function(func, FnConfig::default())?;
        debug_assert!(comment.is_none());
        Ok(())
    }

    pub(crate) fn visit_fn_expression(&mut self, func: &mut FnNode) -> Result<()> {
        let comment = self.visit_function(func, FnConfig::default())?;
        debug_assert!(comment.is_none());
        Ok(())
    }

    pub(crate) fn visit_default_decl(&mut self, decl: &mut DefaultDecl) -> Result<()> {
        match decl {
            DefaultDecl::Fn(func) => self.visit_fn_declaration(func),
            DefaultDecl::Class(class) => {
                let wrap = self.visit_class_node(class, None)?;
                if let Some(temp) = wrap {
                    // `export default class { … }` with super-using methods:
                    // the declaration becomes an expression assigned to the
                    // temp, keeping the inferred name "default".
                    let DefaultDecl::Class(mut class_node) =
                        std::mem::replace(decl, DefaultDecl::Expr(build::null_lit()))
                    else {
                        unreachable!()
                    };
                    class_node.node_type = ClassTag::ClassExpression;
                    let mut slot = Expr::Class(class_node);
                    self.wrap_class_expr(&mut slot, temp, Some("default"));
                    *decl = DefaultDecl::Expr(slot);
                }
                Ok(())
            }
            DefaultDecl::Expr(expr) => {
                self.visit_expr(expr)?;
                Ok(())
            }
        }
    }

    /// Visits a plain function, arrow or method. Returns the tracker comment
    /// when the caller asked to place it.
    pub(crate) fn visit_function(&mut self, func: &mut FnNode, cfg: FnConfig) -> Result<Option<Comment>> {
        let is_arrow = func.is_arrow();
        let name = func.id.as_ref().map(|id| id.name.clone());
        if let Some(name) = &name {
            self.idents.note_user_name(name);
        }

        let saved_strict = self.strict;
        let strict_fn = self.strict
            || match &func.body {
                FnBody::Block(block) => scan::has_use_strict(&block.body),
                FnBody::Expr(_) => false,
            };

        let parent_block = self.cur_block();
        let enclosing = self.cur_record();

        // A named function expression binds its own name in a scope wrapped
        // around the parameter scope.
        let name_block = if func.node_type == crate::ast::FnTag::FunctionExpression && name.is_some() {
            let vars_forward = self.blocks.get(parent_block).vars_block;
            let block = self.create_block(name.clone(), Some(parent_block), Some(vars_forward), enclosing);
            self.blocks.declare(
                block,
                name.as_deref().expect("named expression has a name"),
                Binding::new(BindingKind::FunctionExprName),
            );
            Some(block)
        } else {
            None
        };

        let scope_parent = name_block.unwrap_or(parent_block);
        let param_parent = cfg.home_super_block.unwrap_or(scope_parent);
        let param_block = self.create_block(name.clone(), Some(param_parent), None, None);
        let body_block = self.create_block(None, Some(param_block), None, None);
        self.blocks.get_mut(param_block).vars_block = body_block;

        let mut param_names = Vec::new();
        for param in &func.params {
            scan::pattern_names(param, &mut param_names);
        }
        for param_name in &param_names {
            self.blocks.declare(param_block, param_name, Binding::new(BindingKind::Param));
        }

        if let FnBody::Block(block) = &func.body {
            scan::hoist_fn_scope(self, body_block, &block.body);
        }

        let arg_names = if !strict_fn && !is_arrow {
            scan::simple_param_names(&func.params).unwrap_or_default()
        } else {
            Vec::new()
        };

        let snapshot = crate::output::ast_snapshot(&*func, self.opts.source_map);
        let record = FunctionRecord {
            id: param_block,
            parent: enclosing,
            name: name.clone(),
            is_strict: strict_fn,
            is_async: func.is_async,
            is_generator: func.generator,
            is_arrow,
            is_class: false,
            is_method: cfg.is_method,
            captured_scopes: indexmap::IndexMap::new(),
            internal_vars: indexmap::IndexMap::new(),
            local_occurrences: ahash::AHashMap::new(),
            global_names: indexmap::IndexSet::new(),
            amendments: Vec::new(),
            contains_eval: false,
            contains_import: false,
            has_super_class: false,
            first_super_statement_index: None,
            returns_super: false,
            super_target: None,
            arg_names,
            children: Vec::new(),
            trail: self.trail.iter().copied().collect(),
            ast_snapshot: snapshot,
        };
        let fn_id = self.functions.push(record);
        self.link_record(fn_id, enclosing);
        let owner = Some(fn_id);
        self.blocks.get_mut(param_block).owner_fn = owner;
        self.blocks.get_mut(body_block).owner_fn = owner;
        self.tracer.on_event(TraceEvent::FunctionEntered { fn_id });

        self.fn_stack.push(FnCtx {
            record: fn_id,
            is_arrow,
            is_constructor: false,
            is_class_shell: false,
            param_block,
            body_block,
            name_block,
            home_super_block: cfg.home_super_block,
            trail_len: self.trail.len(),
            saved_strict,
        });
        self.strict = strict_fn;

        if let Some(block) = name_block {
            self.block_stack.push(block);
        }
        self.visit_fn_params_and_body(func, param_block, body_block)?;
        if name_block.is_some() {
            self.block_stack.pop();
        }

        let ctx = self.fn_stack.pop().expect("function context pushed above");
        self.strict = ctx.saved_strict;
        self.exit_function(func, &ctx, cfg)
    }

    fn visit_fn_params_and_body(&mut self, func: &mut FnNode, param_block: BlockId, body_block: BlockId) -> Result<()> {
        self.block_stack.push(param_block);
        self.push_key("params");
        for (index, param) in func.params.iter_mut().enumerate() {
            self.push_index(index);
            self.visit_pat_declare(param)?;
            self.pop_trail(1);
        }
        self.pop_trail(1);
        self.block_stack.pop();

        self.push_key("body");
        match &mut func.body {
            FnBody::Block(block) => {
                scan::hoist_block_scope(self, body_block, &block.body);
                self.block_stack.push(param_block);
                self.block_stack.push(body_block);
                self.push_key("body");
                self.visit_stmt_list(&mut block.body)?;
                self.pop_trail(1);
                self.block_stack.pop();
                self.block_stack.pop();
            }
            FnBody::Expr(expr) => {
                self.block_stack.push(param_block);
                self.block_stack.push(body_block);
                self.visit_expr(expr)?;
                self.block_stack.pop();
                self.block_stack.pop();
            }
        }
        self.pop_trail(1);
        Ok(())
    }

    /// Shared exit path: captured-scope ordering, eval retarget, parameter
    /// rewrite, tracker injection, injected-declaration materialization.
    fn exit_function(&mut self, func: &mut FnNode, ctx: &FnCtx, cfg: FnConfig) -> Result<Option<Comment>> {
        let fn_id = ctx.record;
        self.functions.get_mut(fn_id).sort_captured_scopes();

        // Under direct eval, a named function's record moves to its name
        // scope so the name stays addressable inside dynamically loaded
        // code; the entry for that scope is then internal to the function.
        if self.functions.get(fn_id).contains_eval
            && let Some(name_block) = ctx.name_block
        {
            let record = self.functions.get_mut(fn_id);
            record.id = name_block;
            record.captured_scopes.shift_remove(&name_block);
        }

        let prologue = self.rewrite_params(func, ctx)?;
        let tracker_stmt = tracker::inject_tracker_call(self, func, fn_id)?;

        let mut head = Vec::new();
        if let Some(stmt) = tracker_stmt {
            head.push(stmt);
        }
        head.extend(self.block_prologue_stmts(ctx.body_block));
        head.extend(prologue);
        if !head.is_empty() {
            let body = ensure_block_body(func);
            body.splice(0..0, head);
        }

        self.tracer.on_event(TraceEvent::FunctionExited { fn_id });

        let comment = tracker::tracker_comment(self, fn_id);
        if cfg.return_comment {
            Ok(Some(comment))
        } else {
            func.base.leading_comments.push(comment);
            Ok(None)
        }
    }

    fn link_record(&mut self, fn_id: FnId, enclosing: Option<FnId>) {
        match enclosing {
            Some(parent) => self.functions.get_mut(parent).children.push(fn_id),
            None => self.top_level_fns.push(fn_id),
        }
    }

    // -- classes ------------------------------------------------------------

    /// Visits a class, returning the temp slot the caller must wrap the
    /// expression with when no stable name could serve as the super target.
    pub(crate) fn visit_class_node(
        &mut self,
        class: &mut ClassNode,
        binding_ctx: Option<(&str, bool)>,
    ) -> Result<Option<InternalName>> {
        let name = class.id.as_ref().map(|id| id.name.clone());
        if let Some(name) = &name {
            self.idents.note_user_name(name);
        }
        let saved_strict = self.strict;
        self.strict = true;

        let parent_block = self.cur_block();
        let enclosing = self.cur_record();
        let parent_vars = self.blocks.get(parent_block).vars_block;

        // The inner name binding is immutable and visible throughout the
        // class, including heritage and computed keys.
        let name_block = name.as_ref().map(|class_name| {
            let block = self.create_block(Some(class_name.clone()), Some(parent_block), Some(parent_vars), enclosing);
            self.blocks
                .declare(block, class_name, Binding::new(BindingKind::ClassName));
            block
        });
        let super_parent = name_block.unwrap_or(parent_block);
        let super_block = self.create_block(name.clone(), Some(super_parent), Some(parent_vars), enclosing);

        let param_block = self.create_block(name.clone(), Some(super_block), None, None);
        let body_block = self.create_block(None, Some(param_block), None, None);
        self.blocks.get_mut(param_block).vars_block = body_block;

        let has_super_class = class.super_class.is_some();
        let snapshot = crate::output::ast_snapshot(&*class, self.opts.source_map);
        let record = FunctionRecord {
            id: param_block,
            parent: enclosing,
            name: name.clone(),
            is_strict: true,
            is_async: false,
            is_generator: false,
            is_arrow: false,
            is_class: true,
            is_method: false,
            captured_scopes: indexmap::IndexMap::new(),
            internal_vars: indexmap::IndexMap::new(),
            local_occurrences: ahash::AHashMap::new(),
            global_names: indexmap::IndexSet::new(),
            amendments: Vec::new(),
            contains_eval: false,
            contains_import: false,
            has_super_class,
            first_super_statement_index: None,
            returns_super: false,
            super_target: None,
            arg_names: Vec::new(),
            children: Vec::new(),
            trail: self.trail.iter().copied().collect(),
            ast_snapshot: snapshot,
        };
        let fn_id = self.functions.push(record);
        self.link_record(fn_id, enclosing);
        self.blocks.get_mut(param_block).owner_fn = Some(fn_id);
        self.blocks.get_mut(body_block).owner_fn = Some(fn_id);
        self.tracer.on_event(TraceEvent::FunctionEntered { fn_id });

        self.fn_stack.push(FnCtx {
            record: fn_id,
            is_arrow: false,
            is_constructor: false,
            is_class_shell: true,
            param_block,
            body_block,
            name_block,
            home_super_block: None,
            trail_len: self.trail.len(),
            saved_strict,
        });
        self.super_stack.push(SuperCtx {
            super_block,
            fns_needing_target: Vec::new(),
            any_super: false,
        });

        if let Some(block) = name_block {
            self.block_stack.push(block);
        }

        if let Some(super_class) = &mut class.super_class {
            self.push_key("superClass");
            self.visit_expr(super_class)?;
            self.pop_trail(1);
        }

        self.push_key("body");
        self.push_key("body");
        for (index, member) in class.body.body.iter_mut().enumerate() {
            self.push_index(index);
            match member {
                crate::ast::ClassMember::Method(method) => {
                    self.visit_method_def(method, super_block, fn_id, param_block, body_block)?;
                }
                crate::ast::ClassMember::Field(field) => self.visit_class_field(field)?,
                crate::ast::ClassMember::Unknown(unknown) => {
                    return Err(self.unexpected_node(&unknown.node_type.clone(), unknown.start_loc()));
                }
            }
            self.pop_trail(1);
        }
        self.pop_trail(2);

        if name_block.is_some() {
            self.block_stack.pop();
        }

        let super_ctx = self.super_stack.pop().expect("super context pushed above");
        let wrap = self.resolve_super_target(&super_ctx, name.as_deref(), binding_ctx, parent_block);

        let ctx = self.fn_stack.pop().expect("class shell pushed above");
        self.strict = ctx.saved_strict;
        self.exit_class(class, &ctx)?;
        Ok(wrap)
    }

    /// Picks the stable value `super` dispatches through and records it on
    /// every function that needs it. Returns the temp slot when one was
    /// allocated (the caller wraps the expression).
    fn resolve_super_target(
        &mut self,
        super_ctx: &SuperCtx,
        class_name: Option<&str>,
        binding_ctx: Option<(&str, bool)>,
        parent_block: BlockId,
    ) -> Option<InternalName> {
        if !super_ctx.any_super {
            return None;
        }
        let (target, wrap) = if let Some(name) = class_name {
            (SuperTarget::ClassName(name.to_owned()), None)
        } else if let Some((binding, true)) = binding_ctx {
            (SuperTarget::Binding(binding.to_owned()), None)
        } else {
            let temp = self.idents.alloc_temp();
            self.blocks.add_temp(parent_block, temp.clone());
            (SuperTarget::Temp(temp.clone()), Some(temp))
        };
        let mut seen = ahash::AHashSet::new();
        for &fn_id in &super_ctx.fns_needing_target {
            if seen.insert(fn_id) {
                self.functions.get_mut(fn_id).super_target = Some(target.clone());
            }
        }
        wrap
    }

    /// Class exit: the class record's tracker lives in the constructor,
    /// synthesized when the class has none.
    fn exit_class(&mut self, class: &mut ClassNode, ctx: &FnCtx) -> Result<()> {
        let fn_id = ctx.record;
        self.functions.get_mut(fn_id).sort_captured_scopes();
        if self.functions.get(fn_id).contains_eval
            && let Some(name_block) = ctx.name_block
        {
            let record = self.functions.get_mut(fn_id);
            record.id = name_block;
            record.captured_scopes.shift_remove(&name_block);
        }

        let has_super_class = class.super_class.is_some();
        let ctor = find_constructor(class);
        if ctor.is_none() {
            class
                .body
                .body
                .push(synthesize_constructor(has_super_class));
        }
        let ctor = find_constructor(class).expect("constructor exists or was synthesized");
        let Expr::Fn(ctor_fn) = &mut ctor.value else {
            return Err(self.invariant("constructor value is not a function", ctor.base.start_loc()));
        };
        let tracker_stmt = tracker::inject_tracker_call(self, ctor_fn, fn_id)?;

        let mut head = Vec::new();
        if let Some(stmt) = tracker_stmt {
            head.push(stmt);
        }
        head.extend(self.block_prologue_stmts(ctx.body_block));
        if !head.is_empty() {
            let body = ensure_block_body(ctor_fn);
            body.splice(0..0, head);
        }

        self.tracer.on_event(TraceEvent::FunctionExited { fn_id });
        let comment = tracker::tracker_comment(self, fn_id);
        class.base.leading_comments.push(comment);
        Ok(())
    }

    /// A public class field: its key and initializer are ordinary expression
    /// positions in the class's scope chain. Private fields (a
    /// `PrivateIdentifier` key) are not supported.
    fn visit_class_field(&mut self, field: &mut crate::ast::PropertyDef) -> Result<()> {
        if let Expr::Unknown(key) = &field.key {
            return Err(self.unexpected_node(&key.node_type.clone(), key.start_loc()));
        }
        if field.computed {
            self.push_key("key");
            self.visit_expr(&mut field.key)?;
            self.pop_trail(1);
        }
        if let Some(value) = &mut field.value {
            self.push_key("value");
            self.visit_expr(value)?;
            self.pop_trail(1);
        }
        Ok(())
    }

    fn visit_method_def(
        &mut self,
        method: &mut crate::ast::MethodDef,
        super_block: BlockId,
        class_fn: FnId,
        class_param_block: BlockId,
        class_body_block: BlockId,
    ) -> Result<()> {
        // Private methods parse with a `PrivateIdentifier` key; same
        // unsupported territory as private fields.
        if let Expr::Unknown(key) = &method.key {
            return Err(self.unexpected_node(&key.node_type.clone(), key.start_loc()));
        }
        if method.computed {
            self.push_key("key");
            self.visit_expr(&mut method.key)?;
            self.pop_trail(1);
        }
        let Expr::Fn(func) = &mut method.value else {
            return Err(self.unexpected_node("MethodDefinition value", method.base.start_loc()));
        };
        self.push_key("value");
        let comment = if method.kind == MethodKind::Constructor {
            self.visit_constructor(func, class_fn, super_block, class_param_block, class_body_block)?;
            None
        } else {
            self.visit_function(
                func,
                FnConfig {
                    is_method: true,
                    home_super_block: Some(super_block),
                    return_comment: true,
                },
            )?
        };
        self.pop_trail(1);
        if let Some(comment) = comment {
            place_method_comment(method.computed, &mut method.key, &mut method.value, comment);
        }
        Ok(())
    }

    /// The constructor of the enclosing class: shares the class's record and
    /// scope blocks.
    fn visit_constructor(
        &mut self,
        func: &mut FnNode,
        class_fn: FnId,
        super_block: BlockId,
        param_block: BlockId,
        body_block: BlockId,
    ) -> Result<()> {
        let mut param_names = Vec::new();
        for param in &func.params {
            scan::pattern_names(param, &mut param_names);
        }
        for param_name in &param_names {
            self.blocks.declare(param_block, param_name, Binding::new(BindingKind::Param));
        }
        if let FnBody::Block(block) = &func.body {
            scan::hoist_fn_scope(self, body_block, &block.body);
        }

        if self.functions.get(class_fn).has_super_class
            && let FnBody::Block(block) = &func.body
        {
            let (first_index, is_last) = scan::first_super_call_index(&block.body);
            let record = self.functions.get_mut(class_fn);
            record.first_super_statement_index = first_index;
            record.returns_super = first_index.is_some() && is_last;
        }

        let saved_strict = self.strict;
        self.fn_stack.push(FnCtx {
            record: class_fn,
            is_arrow: false,
            is_constructor: true,
            is_class_shell: false,
            param_block,
            body_block,
            name_block: None,
            home_super_block: Some(super_block),
            trail_len: self.trail.len(),
            saved_strict,
        });

        self.visit_fn_params_and_body(func, param_block, body_block)?;

        let ctx = self.fn_stack.pop().expect("constructor context pushed above");
        self.strict = ctx.saved_strict;

        // Parameter hoisting runs now; the tracker waits for class exit so
        // captures from later members are complete.
        let prologue = self.rewrite_params(func, &ctx)?;
        if !prologue.is_empty() {
            let body = ensure_block_body(func);
            body.splice(0..0, prologue);
        }
        Ok(())
    }

    // -- object literals ----------------------------------------------------

    /// An object literal: a super scope for its methods, and on exit a temp
    /// slot assignment when any of them used `super`.
    pub(crate) fn visit_object_expr(&mut self, slot: &mut Expr) -> Result<()> {
        let Expr::Object(object) = slot else { unreachable!() };
        let parent_block = self.cur_block();
        let enclosing = self.cur_record();
        let parent_vars = self.blocks.get(parent_block).vars_block;
        let super_block = self.create_block(None, Some(parent_block), Some(parent_vars), enclosing);
        self.super_stack.push(SuperCtx {
            super_block,
            fns_needing_target: Vec::new(),
            any_super: false,
        });

        self.push_key("properties");
        for (index, member) in object.properties.iter_mut().enumerate() {
            self.push_index(index);
            match member {
                crate::ast::ObjectMember::Prop(prop) => {
                    if prop.computed {
                        self.push_key("key");
                        self.visit_expr(&mut prop.key)?;
                        self.pop_trail(1);
                    }
                    if prop.is_method_like() {
                        let Expr::Fn(func) = &mut prop.value else {
                            return Err(self.unexpected_node("object method value", prop.base.start_loc()));
                        };
                        self.push_key("value");
                        let comment = self.visit_function(
                            func,
                            FnConfig {
                                is_method: true,
                                home_super_block: Some(super_block),
                                return_comment: true,
                            },
                        )?;
                        self.pop_trail(1);
                        if let Some(comment) = comment {
                            place_method_comment(prop.computed, &mut prop.key, &mut prop.value, comment);
                        }
                    } else {
                        self.push_key("value");
                        self.visit_expr(&mut prop.value)?;
                        self.pop_trail(1);
                    }
                }
                crate::ast::ObjectMember::Spread(spread) => {
                    self.push_key("argument");
                    self.visit_expr(&mut spread.argument)?;
                    self.pop_trail(1);
                }
                crate::ast::ObjectMember::Unknown(unknown) => {
                    return Err(self.unexpected_node(&unknown.node_type.clone(), unknown.start_loc()));
                }
            }
            self.pop_trail(1);
        }
        self.pop_trail(1);

        let super_ctx = self.super_stack.pop().expect("super context pushed above");
        if super_ctx.any_super {
            let temp = self.idents.alloc_temp();
            self.blocks.add_temp(parent_block, temp.clone());
            let mut seen = ahash::AHashSet::new();
            for &fn_id in &super_ctx.fns_needing_target {
                if seen.insert(fn_id) {
                    self.functions.get_mut(fn_id).super_target = Some(SuperTarget::Temp(temp.clone()));
                }
            }
            let original = build::take_expr(slot);
            *slot = build::assign(build::internal_ident(temp), original);
        }
        Ok(())
    }

    /// Wraps a class expression whose super target is a temp slot:
    /// `t = class …`, or `t = {K: class …}.K` to preserve an inferred name.
    pub(crate) fn wrap_class_expr(&mut self, slot: &mut Expr, temp: InternalName, inferred: Option<&str>) {
        let class_expr = build::take_expr(slot);
        let value = match inferred {
            Some(name) => build::member(build::object_expr_single(build::ident(name), class_expr), name),
            None => class_expr,
        };
        *slot = build::assign(build::internal_ident(temp), value);
    }

    // -- super --------------------------------------------------------------

    pub(crate) fn visit_super_call(&mut self, call: &mut CallExpr) -> Result<()> {
        let loc = call.base.start_loc();
        self.handle_super_use(AmendmentKind::SuperCall, loc)?;
        self.visit_call_arguments(call)
    }

    pub(crate) fn visit_super_expression(&mut self, member: &mut MemberExpr) -> Result<()> {
        let loc = member.base.start_loc();
        self.handle_super_use(AmendmentKind::SuperExpression, loc)
    }

    fn handle_super_use(&mut self, kind: AmendmentKind, loc: Option<CodeLoc>) -> Result<()> {
        // Walk out through arrows (and class shells) to the enclosing
        // method/constructor; a plain function on the way means `super` has
        // no home object here.
        let mut home_index = None;
        for (index, ctx) in self.fn_stack.iter().enumerate().rev() {
            if ctx.home_super_block.is_some() {
                home_index = Some(index);
                break;
            }
            if !ctx.is_arrow && !ctx.is_class_shell {
                break;
            }
        }
        let Some(home_index) = home_index else {
            return Err(self.unexpected_node("Super outside a method", loc));
        };
        let home_record = self.fn_stack[home_index].record;
        let home_param_block = self.fn_stack[home_index].param_block;
        let home_body_block = self.fn_stack[home_index].body_block;
        let home_is_ctor = self.fn_stack[home_index].is_constructor;
        let super_block = self.fn_stack[home_index]
            .home_super_block
            .expect("home context has a super block");
        let in_arrow = home_index + 1 < self.fn_stack.len();

        // Arrows inside a sloppy method that redefines `arguments` cannot be
        // rewritten: the rewriter threads `this`/`super` through the
        // enclosing function and the redefinition breaks that.
        if in_arrow && !self.functions.get(home_record).is_strict {
            let redefined = self.blocks.get(home_param_block).bindings.contains_key("arguments")
                || self.blocks.get(home_body_block).bindings.contains_key("arguments");
            if redefined {
                return Err(self.err(
                    ErrorKind::SuperInArrowRedefinedArguments,
                    "arrow function using 'super' inside a sloppy function that redefines 'arguments'",
                    loc,
                ));
            }
        }

        // Every function that records the `super` capture needs the resolved
        // target: the chain from the use site out to the scope that owns the
        // super block.
        let owner = self.blocks.get(super_block).owner_fn;
        let needing: Vec<FnId> = self
            .fn_stack
            .iter()
            .rev()
            .take_while(|ctx| Some(ctx.record) != owner)
            .map(|ctx| ctx.record)
            .collect();
        let Some(super_ctx) = self
            .super_stack
            .iter_mut()
            .rev()
            .find(|ctx| ctx.super_block == super_block)
        else {
            return Err(self.invariant("super scope missing for method", loc));
        };
        super_ctx.any_super = true;
        super_ctx.fns_needing_target.extend(needing);

        self.record_amendment(kind, super_block);
        self.blocks
            .declare(super_block, "super", Binding::new(BindingKind::Synthetic));
        self.record_capture_chain(super_block, "super", true, false, false, true);

        let class_has_super = self.functions.get(home_record).has_super_class;
        if home_is_ctor && class_has_super {
            // The serializer reroutes constructor `this` through a
            // temporary; give it the sites on the class record.
            let shell = &self.fn_stack[home_index - 1];
            debug_assert_eq!(shell.record, home_record);
            let trail = rebase(&self.trail, shell.trail_len);
            self.functions
                .get_mut(home_record)
                .internal_vars
                .entry("this".to_owned())
                .or_default()
                .push(trail);
        } else if !home_is_ctor {
            self.blocks
                .declare(home_param_block, "this", Binding::new(BindingKind::Synthetic));
            self.record_capture_chain(home_param_block, "this", true, false, false, true);
        }
        Ok(())
    }
}

/// Converts a concise arrow body into a block body so statements can be
/// injected, and returns the statement list.
pub(crate) fn ensure_block_body(func: &mut FnNode) -> &mut Vec<Stmt> {
    if matches!(func.body, FnBody::Expr(_)) {
        let FnBody::Expr(expr) = std::mem::replace(&mut func.body, FnBody::Block(build::block_stmt(Vec::new())))
        else {
            unreachable!()
        };
        func.body = FnBody::Block(build::block_stmt(vec![build::return_stmt(*expr)]));
        func.expression = Some(false);
    }
    match &mut func.body {
        FnBody::Block(block) => &mut block.body,
        FnBody::Expr(_) => unreachable!("converted above"),
    }
}

fn find_constructor(class: &mut ClassNode) -> Option<&mut crate::ast::MethodDef> {
    class.body.body.iter_mut().find_map(|member| match member {
        crate::ast::ClassMember::Method(method) if method.kind == MethodKind::Constructor => Some(&mut **method),
        _ => None,
    })
}

/// Builds the default constructor a class would have had, ready to receive
/// the tracker: `constructor() {}` or `constructor(...args) { super(...args); }`.
fn synthesize_constructor(has_super_class: bool) -> crate::ast::ClassMember {
    let (params, body) = if has_super_class {
        let rest = crate::ast::Pat::Rest(Box::new(crate::ast::RestPat {
            node_type: crate::ast::RestTag,
            base: crate::ast::NodeBase::default(),
            argument: crate::ast::Pat::Ident(build::ident("args")),
        }));
        let spread = Expr::Spread(Box::new(crate::ast::SpreadNode {
            node_type: crate::ast::SpreadTag,
            base: crate::ast::NodeBase::default(),
            argument: build::ident_expr("args"),
        }));
        let super_call = Expr::Call(Box::new(CallExpr {
            node_type: crate::ast::CallExprTag,
            base: crate::ast::NodeBase::default(),
            callee: Expr::SuperRef(crate::ast::SuperNode {
                node_type: crate::ast::SuperTag,
                base: crate::ast::NodeBase::default(),
            }),
            arguments: vec![spread],
            optional: false,
        }));
        (vec![rest], vec![build::expr_stmt(super_call)])
    } else {
        (Vec::new(), Vec::new())
    };
    let value = Expr::Fn(Box::new(FnNode {
        node_type: crate::ast::FnTag::FunctionExpression,
        base: crate::ast::NodeBase::default(),
        id: None,
        params,
        body: FnBody::Block(build::block_stmt(body)),
        generator: false,
        is_async: false,
        expression: None,
    }));
    crate::ast::ClassMember::Method(Box::new(crate::ast::MethodDef {
        node_type: crate::ast::MethodDefTag,
        base: crate::ast::NodeBase::default(),
        key: build::ident_expr("constructor"),
        value,
        kind: MethodKind::Constructor,
        computed: false,
        is_static: false,
    }))
}

/// Places a method's tracker comment: before a computed key, after a plain
/// one (on the value function, which prints between key and params).
fn place_method_comment(computed: bool, key: &mut Expr, value: &mut Expr, comment: Comment) {
    if computed {
        if let Some(base) = expr_base_mut(key) {
            base.leading_comments.push(comment);
            return;
        }
    }
    if let Expr::Fn(func) = value {
        func.base.leading_comments.push(comment);
    }
}

fn expr_base_mut(expr: &mut Expr) -> Option<&mut crate::ast::NodeBase> {
    match expr {
        Expr::Ident(n) => Some(&mut n.base),
        Expr::Lit(n) => Some(&mut n.base),
        Expr::Template(n) => Some(&mut n.base),
        Expr::Member(n) => Some(&mut n.base),
        Expr::Call(n) => Some(&mut n.base),
        Expr::Binary(n) => Some(&mut n.base),
        Expr::Cond(n) => Some(&mut n.base),
        _ => None,
    }
}
