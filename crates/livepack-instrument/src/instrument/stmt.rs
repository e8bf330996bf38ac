//! Statement visitors.
//!
//! Block-creating constructs live here: statement blocks, loop bodies, for
//! heads, catch clauses and switch bodies. Each creates its block, registers
//! hoisted bindings, visits children with the trail maintained, and on exit
//! prepends whatever scope-id/temp declarations accumulated on the block.

use crate::{
    ast::{build, BlockStmt, ForInit, ForTarget, Stmt, VarDeclKind},
    block::{Binding, BindingKind, BlockId},
    trace::InstrumentTracer,
};

use super::{scan, Instrumentor, Result};

impl<T: InstrumentTracer> Instrumentor<'_, T> {
    pub(crate) fn visit_stmt(&mut self, stmt: &mut Stmt) -> Result<()> {
        let loc = match stmt {
            Stmt::Unknown(unknown) => {
                return Err(self.unexpected_node(&unknown.node_type.clone(), unknown.start_loc()));
            }
            _ => None,
        };
        self.enter_depth(loc)?;
        let result = self.visit_stmt_inner(stmt);
        self.leave_depth();
        result
    }

    fn visit_stmt_inner(&mut self, stmt: &mut Stmt) -> Result<()> {
        match stmt {
            Stmt::Expr(expr_stmt) => {
                self.push_key("expression");
                self.visit_expr(&mut expr_stmt.expression)?;
                self.pop_trail(1);
            }
            Stmt::Block(block_stmt) => self.visit_scoped_block(block_stmt)?,
            Stmt::Empty(_) | Stmt::Debugger(_) | Stmt::Break(_) | Stmt::Continue(_) => {}
            Stmt::Return(return_stmt) => {
                if let Some(argument) = &mut return_stmt.argument {
                    self.push_key("argument");
                    self.visit_expr(argument)?;
                    self.pop_trail(1);
                }
            }
            Stmt::Labeled(labeled) => {
                // The label identifier is not a binding reference.
                self.push_key("body");
                self.visit_stmt(&mut labeled.body)?;
                self.pop_trail(1);
            }
            Stmt::If(if_stmt) => {
                self.push_key("test");
                self.visit_expr(&mut if_stmt.test)?;
                self.pop_trail(1);
                self.push_key("consequent");
                self.visit_stmt(&mut if_stmt.consequent)?;
                self.pop_trail(1);
                if let Some(alternate) = &mut if_stmt.alternate {
                    self.push_key("alternate");
                    self.visit_stmt(alternate)?;
                    self.pop_trail(1);
                }
            }
            Stmt::Switch(switch) => {
                self.push_key("discriminant");
                self.visit_expr(&mut switch.discriminant)?;
                self.pop_trail(1);

                // `let`/`const` inside cases scope to a dedicated block
                // covering the whole switch body.
                let parent = self.cur_block();
                let vars_block = self.blocks.get(parent).vars_block;
                let owner = self.cur_record();
                let block = self.create_block(Some("switch".to_owned()), Some(parent), Some(vars_block), owner);
                for case in &switch.cases {
                    scan::hoist_block_scope(self, block, &case.consequent);
                }
                self.block_stack.push(block);
                self.push_key("cases");
                for (case_index, case) in switch.cases.iter_mut().enumerate() {
                    self.push_index(case_index);
                    if let Some(test) = &mut case.test {
                        self.push_key("test");
                        self.visit_expr(test)?;
                        self.pop_trail(1);
                    }
                    self.push_key("consequent");
                    self.visit_stmt_list(&mut case.consequent)?;
                    self.pop_trail(1);
                    self.pop_trail(1);
                }
                self.pop_trail(1);
                self.block_stack.pop();
            }
            Stmt::Throw(throw) => {
                self.push_key("argument");
                self.visit_expr(&mut throw.argument)?;
                self.pop_trail(1);
            }
            Stmt::Try(try_stmt) => {
                self.push_key("block");
                self.visit_scoped_block(&mut try_stmt.block)?;
                self.pop_trail(1);
                if let Some(handler) = &mut try_stmt.handler {
                    self.push_key("handler");
                    self.visit_catch_clause(handler)?;
                    self.pop_trail(1);
                }
                if let Some(finalizer) = &mut try_stmt.finalizer {
                    self.push_key("finalizer");
                    self.visit_scoped_block(finalizer)?;
                    self.pop_trail(1);
                }
            }
            Stmt::While(while_stmt) => {
                self.push_key("test");
                self.visit_expr(&mut while_stmt.test)?;
                self.pop_trail(1);
                let block = self.loop_body_block();
                self.visit_loop_body(&mut while_stmt.body, block)?;
            }
            Stmt::DoWhile(do_while) => {
                let block = self.loop_body_block();
                self.visit_loop_body(&mut do_while.body, block)?;
                self.push_key("test");
                self.visit_expr(&mut do_while.test)?;
                self.pop_trail(1);
            }
            Stmt::For(for_stmt) => {
                let (head, body_block) = self.for_head_blocks();
                if let Some(ForInit::Decl(decl)) = &for_stmt.init
                    && decl.kind != VarDeclKind::Var
                {
                    self.declare_lexical_decl(head, decl.kind, &decl.declarations);
                }
                self.block_stack.push(head);
                if let Some(init) = &mut for_stmt.init {
                    self.push_key("init");
                    match init {
                        ForInit::Decl(decl) => self.visit_var_decl(decl)?,
                        ForInit::Expr(expr) => self.visit_expr(expr)?,
                    }
                    self.pop_trail(1);
                }
                if let Some(test) = &mut for_stmt.test {
                    self.push_key("test");
                    self.visit_expr(test)?;
                    self.pop_trail(1);
                }
                if let Some(update) = &mut for_stmt.update {
                    self.push_key("update");
                    self.visit_expr(update)?;
                    self.pop_trail(1);
                }
                self.visit_loop_body(&mut for_stmt.body, body_block)?;
                self.block_stack.pop();
            }
            Stmt::ForIn(for_in) => {
                let (head, body_block) = self.for_head_blocks();
                self.visit_for_target(head, &mut for_in.left)?;
                self.block_stack.push(head);
                self.push_key("right");
                self.visit_expr(&mut for_in.right)?;
                self.pop_trail(1);
                self.visit_loop_body(&mut for_in.body, body_block)?;
                self.block_stack.pop();
            }
            Stmt::ForOf(for_of) => {
                let (head, body_block) = self.for_head_blocks();
                self.visit_for_target(head, &mut for_of.left)?;
                self.block_stack.push(head);
                self.push_key("right");
                self.visit_expr(&mut for_of.right)?;
                self.pop_trail(1);
                self.visit_loop_body(&mut for_of.body, body_block)?;
                self.block_stack.pop();
            }
            Stmt::VarDecl(decl) => {
                if self.fn_stack.is_empty() {
                    let mut names = Vec::new();
                    for declarator in &decl.declarations {
                        scan::pattern_names(&declarator.id, &mut names);
                    }
                    self.top_level_names.extend(names);
                }
                self.visit_var_decl(decl)?;
            }
            Stmt::Fn(func) => self.visit_fn_declaration(func)?,
            Stmt::Class(class) => {
                // Statement-position classes are always named, so the super
                // target is the class's own name and no wrap arises.
                let wrap = self.visit_class_node(class, None)?;
                if wrap.is_some() {
                    return Err(self.invariant("anonymous class in statement position", class.base.start_loc()));
                }
            }
            Stmt::Import(_) | Stmt::ExportAll(_) => {
                // Bindings were registered up front; specifier names are not
                // reference positions.
            }
            Stmt::ExportNamed(export) => {
                if let Some(declaration) = &mut export.declaration {
                    self.push_key("declaration");
                    self.visit_stmt(declaration)?;
                    self.pop_trail(1);
                }
            }
            Stmt::ExportDefault(export) => {
                self.push_key("declaration");
                self.visit_default_decl(&mut export.declaration)?;
                self.pop_trail(1);
            }
            Stmt::Unknown(_) => unreachable!("rejected before dispatch"),
        }
        Ok(())
    }

    pub(crate) fn visit_stmt_list(&mut self, stmts: &mut [Stmt]) -> Result<()> {
        for (index, stmt) in stmts.iter_mut().enumerate() {
            self.push_index(index);
            self.visit_stmt(stmt)?;
            self.pop_trail(1);
        }
        Ok(())
    }

    /// A `{ ... }` statement block in a position that gets its own scope.
    pub(crate) fn visit_scoped_block(&mut self, block_stmt: &mut BlockStmt) -> Result<()> {
        let parent = self.cur_block();
        let owner = self.cur_record();
        let block = self.create_block(None, Some(parent), None, owner);
        scan::hoist_block_scope(self, block, &block_stmt.body);
        self.block_stack.push(block);
        self.push_key("body");
        self.visit_stmt_list(&mut block_stmt.body)?;
        self.pop_trail(1);
        self.block_stack.pop();
        let prologue = self.block_prologue_stmts(block);
        block_stmt.body.splice(0..0, prologue);
        Ok(())
    }

    fn visit_catch_clause(&mut self, handler: &mut crate::ast::CatchClause) -> Result<()> {
        let parent = self.cur_block();
        let owner = self.cur_record();
        let param_block = self.create_block(Some("catch".to_owned()), Some(parent), None, owner);
        let body_block = self.create_block(None, Some(param_block), None, owner);
        self.blocks.get_mut(param_block).vars_block = body_block;

        if let Some(param) = &mut handler.param {
            let mut names = Vec::new();
            scan::pattern_names(param, &mut names);
            for name in names {
                self.blocks
                    .declare(param_block, &name, Binding::new(BindingKind::CatchParam));
            }
            self.block_stack.push(param_block);
            self.push_key("param");
            self.visit_pat_declare(param)?;
            self.pop_trail(1);
            self.block_stack.pop();
        }

        scan::hoist_block_scope(self, body_block, &handler.body.body);
        self.block_stack.push(param_block);
        self.block_stack.push(body_block);
        self.push_key("body");
        self.push_key("body");
        self.visit_stmt_list(&mut handler.body.body)?;
        self.pop_trail(2);
        self.block_stack.pop();
        self.block_stack.pop();

        // Param-block slots forward into the catch body.
        let prologue = self.block_prologue_stmts(body_block);
        handler.body.body.splice(0..0, prologue);
        Ok(())
    }

    fn loop_body_block(&mut self) -> BlockId {
        let parent = self.cur_block();
        let owner = self.cur_record();
        self.create_block(None, Some(parent), None, owner)
    }

    /// Creates the for-head block and its body block; head declarations are
    /// hosted by the body so scope-id slots run per iteration.
    fn for_head_blocks(&mut self) -> (BlockId, BlockId) {
        let parent = self.cur_block();
        let owner = self.cur_record();
        let head = self.create_block(None, Some(parent), None, owner);
        let body = self.create_block(None, Some(head), None, owner);
        self.blocks.get_mut(head).vars_block = body;
        (head, body)
    }

    fn declare_lexical_decl(&mut self, block: BlockId, kind: VarDeclKind, declarations: &[crate::ast::VarDeclarator]) {
        let binding_kind = match kind {
            VarDeclKind::Let => BindingKind::Let,
            VarDeclKind::Const => BindingKind::Const,
            VarDeclKind::Var => return,
        };
        let mut names = Vec::new();
        for declarator in declarations {
            scan::pattern_names(&declarator.id, &mut names);
        }
        for name in names {
            self.blocks.declare(block, &name, Binding::new(binding_kind));
        }
    }

    fn visit_for_target(&mut self, head: BlockId, left: &mut ForTarget) -> Result<()> {
        match left {
            ForTarget::Decl(decl) => {
                if decl.kind != VarDeclKind::Var {
                    self.declare_lexical_decl(head, decl.kind, &decl.declarations);
                }
                self.block_stack.push(head);
                self.push_key("left");
                self.visit_var_decl(decl)?;
                self.pop_trail(1);
                self.block_stack.pop();
            }
            ForTarget::Pat(pat) => {
                // Assigning to an existing target writes it on every
                // iteration.
                self.push_key("left");
                self.visit_pat_assign(pat, false)?;
                self.pop_trail(1);
            }
        }
        Ok(())
    }

    /// Visits a loop body, wrapping a non-block body in braces if injected
    /// declarations need somewhere to live.
    fn visit_loop_body(&mut self, body_slot: &mut Stmt, block: BlockId) -> Result<()> {
        self.push_key("body");
        if let Stmt::Block(block_stmt) = body_slot {
            scan::hoist_block_scope(self, block, &block_stmt.body);
            self.block_stack.push(block);
            self.push_key("body");
            self.visit_stmt_list(&mut block_stmt.body)?;
            self.pop_trail(1);
            self.block_stack.pop();
            let prologue = self.block_prologue_stmts(block);
            block_stmt.body.splice(0..0, prologue);
        } else {
            self.block_stack.push(block);
            self.visit_stmt(body_slot)?;
            self.block_stack.pop();
            let prologue = self.block_prologue_stmts(block);
            if !prologue.is_empty() {
                let original = build::take_stmt(body_slot);
                let mut body = prologue;
                body.push(original);
                *body_slot = Stmt::Block(build::block_stmt(body));
            }
        }
        self.pop_trail(1);
        Ok(())
    }

    pub(crate) fn visit_var_decl(&mut self, decl: &mut crate::ast::VarDecl) -> Result<()> {
        let is_const = decl.kind == VarDeclKind::Const;
        self.push_key("declarations");
        for (index, declarator) in decl.declarations.iter_mut().enumerate() {
            self.push_index(index);
            self.push_key("id");
            self.visit_pat_declare(&mut declarator.id)?;
            self.pop_trail(1);
            if let Some(init) = &mut declarator.init {
                self.push_key("init");
                // `const C = class { ... }`: the declarator can serve as the
                // class's super target, and its name is the inferred name.
                let target_name = declarator.id.as_ident().map(|ident| ident.name.clone());
                if let (crate::ast::Expr::Class(class), Some(name)) = (&mut *init, &target_name) {
                    let wrap = self.visit_class_node(class, Some((name.as_str(), is_const)))?;
                    if let Some(temp) = wrap {
                        let inferred = target_name.clone();
                        self.wrap_class_expr(init, temp, inferred.as_deref());
                    }
                } else {
                    self.visit_expr(init)?;
                }
                self.pop_trail(1);
            }
            self.pop_trail(1);
        }
        self.pop_trail(1);
        Ok(())
    }
}
