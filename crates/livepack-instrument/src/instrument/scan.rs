//! Pre-scans that register bindings before a scope's statements are visited.
//!
//! Uses may precede declarations (`var` hoisting, function hoisting, TDZ
//! `let`), so each block registers its bindings up front: a deep scan from
//! each function body for `var` declarations (stopping at nested functions),
//! and a shallow scan per block for lexical declarations and function/class
//! declarations at that statement level.

use crate::{
    ast::{DefaultDecl, ForInit, ForTarget, Pat, Stmt, VarDecl, VarDeclKind},
    block::{Binding, BindingKind, BlockId},
    error::ErrorKind,
    trace::InstrumentTracer,
};

use super::{Instrumentor, Result};

/// True when the statement list opens with a `"use strict"` directive.
pub(crate) fn has_use_strict(body: &[Stmt]) -> bool {
    for stmt in body {
        let Stmt::Expr(expr_stmt) = stmt else { return false };
        // Directive prologue: leading expression statements that are string
        // literals. Parsers that mark directives set the `directive` field.
        if let Some(directive) = &expr_stmt.directive {
            if directive == "use strict" {
                return true;
            }
            continue;
        }
        match &expr_stmt.expression {
            crate::ast::Expr::Lit(lit) if lit.value.is_string() => {
                if lit.as_str() == Some("use strict") {
                    return true;
                }
            }
            _ => return false,
        }
    }
    false
}

/// Collects the names a pattern binds, in source order.
pub(crate) fn pattern_names(pat: &Pat, out: &mut Vec<String>) {
    match pat {
        Pat::Ident(ident) => out.push(ident.name.clone()),
        Pat::Assign(assign) => pattern_names(&assign.left, out),
        Pat::Object(object) => {
            for prop in &object.properties {
                match prop {
                    crate::ast::ObjectPatProp::Prop(prop) => pattern_names(&prop.value, out),
                    crate::ast::ObjectPatProp::Rest(rest) => pattern_names(&rest.argument, out),
                }
            }
        }
        Pat::Array(array) => {
            for element in array.elements.iter().flatten() {
                pattern_names(element, out);
            }
        }
        Pat::Rest(rest) => pattern_names(&rest.argument, out),
        // Member-expression targets bind nothing.
        Pat::Expr(_) => {}
    }
}

/// Parameter names when every parameter is a simple identifier.
pub(crate) fn simple_param_names(params: &[Pat]) -> Option<Vec<String>> {
    params
        .iter()
        .map(|param| param.as_ident().map(|ident| ident.name.clone()))
        .collect()
}

fn declare_var_names(instr: &mut Instrumentor<'_, impl InstrumentTracer>, block: BlockId, decl: &VarDecl) {
    let mut names = Vec::new();
    for declarator in &decl.declarations {
        pattern_names(&declarator.id, &mut names);
    }
    for name in names {
        instr.blocks.declare(block, &name, Binding::new(BindingKind::Var));
    }
}

/// Deep scan from a function body (or the program) registering `var`
/// declarations into `block`. Stops at nested functions and classes; their
/// bodies hoist into their own scopes.
pub(crate) fn hoist_fn_scope(instr: &mut Instrumentor<'_, impl InstrumentTracer>, block: BlockId, body: &[Stmt]) {
    for stmt in body {
        hoist_fn_scope_stmt(instr, block, stmt);
    }
}

fn hoist_fn_scope_stmt(instr: &mut Instrumentor<'_, impl InstrumentTracer>, block: BlockId, stmt: &Stmt) {
    match stmt {
        Stmt::VarDecl(decl) => {
            if decl.kind == VarDeclKind::Var {
                declare_var_names(instr, block, decl);
            }
        }
        Stmt::Block(inner) => hoist_fn_scope(instr, block, &inner.body),
        Stmt::If(if_stmt) => {
            hoist_fn_scope_stmt(instr, block, &if_stmt.consequent);
            if let Some(alternate) = &if_stmt.alternate {
                hoist_fn_scope_stmt(instr, block, alternate);
            }
        }
        Stmt::Labeled(labeled) => hoist_fn_scope_stmt(instr, block, &labeled.body),
        Stmt::While(while_stmt) => hoist_fn_scope_stmt(instr, block, &while_stmt.body),
        Stmt::DoWhile(do_while) => hoist_fn_scope_stmt(instr, block, &do_while.body),
        Stmt::For(for_stmt) => {
            if let Some(ForInit::Decl(decl)) = &for_stmt.init
                && decl.kind == VarDeclKind::Var
            {
                declare_var_names(instr, block, decl);
            }
            hoist_fn_scope_stmt(instr, block, &for_stmt.body);
        }
        Stmt::ForIn(for_in) => {
            if let ForTarget::Decl(decl) = &for_in.left
                && decl.kind == VarDeclKind::Var
            {
                declare_var_names(instr, block, decl);
            }
            hoist_fn_scope_stmt(instr, block, &for_in.body);
        }
        Stmt::ForOf(for_of) => {
            if let ForTarget::Decl(decl) = &for_of.left
                && decl.kind == VarDeclKind::Var
            {
                declare_var_names(instr, block, decl);
            }
            hoist_fn_scope_stmt(instr, block, &for_of.body);
        }
        Stmt::Switch(switch) => {
            for case in &switch.cases {
                hoist_fn_scope(instr, block, &case.consequent);
            }
        }
        Stmt::Try(try_stmt) => {
            hoist_fn_scope(instr, block, &try_stmt.block.body);
            if let Some(handler) = &try_stmt.handler {
                hoist_fn_scope(instr, block, &handler.body.body);
            }
            if let Some(finalizer) = &try_stmt.finalizer {
                hoist_fn_scope(instr, block, &finalizer.body);
            }
        }
        Stmt::ExportNamed(export) => {
            if let Some(declaration) = &export.declaration {
                hoist_fn_scope_stmt(instr, block, declaration);
            }
        }
        _ => {}
    }
}

/// Shallow scan of one block's statement level: lexical declarations,
/// function declarations and class declarations bind here.
pub(crate) fn hoist_block_scope(instr: &mut Instrumentor<'_, impl InstrumentTracer>, block: BlockId, body: &[Stmt]) {
    for stmt in body {
        hoist_block_scope_stmt(instr, block, stmt);
    }
}

fn hoist_block_scope_stmt(instr: &mut Instrumentor<'_, impl InstrumentTracer>, block: BlockId, stmt: &Stmt) {
    match stmt {
        Stmt::VarDecl(decl) => {
            let kind = match decl.kind {
                VarDeclKind::Var => return,
                VarDeclKind::Let => BindingKind::Let,
                VarDeclKind::Const => BindingKind::Const,
            };
            let mut names = Vec::new();
            for declarator in &decl.declarations {
                pattern_names(&declarator.id, &mut names);
            }
            for name in names {
                instr.blocks.declare(block, &name, Binding::new(kind));
            }
        }
        Stmt::Fn(func) => {
            if let Some(id) = &func.id {
                instr
                    .blocks
                    .declare(block, &id.name, Binding::new(BindingKind::FunctionDecl));
            }
        }
        Stmt::Class(class) => {
            if let Some(id) = &class.id {
                instr
                    .blocks
                    .declare(block, &id.name, Binding::new(BindingKind::ClassDecl));
            }
        }
        Stmt::Labeled(labeled) => hoist_block_scope_stmt(instr, block, &labeled.body),
        Stmt::ExportNamed(export) => {
            if let Some(declaration) = &export.declaration {
                hoist_block_scope_stmt(instr, block, declaration);
            }
        }
        Stmt::ExportDefault(export) => match &export.declaration {
            DefaultDecl::Fn(func) => {
                if let Some(id) = &func.id {
                    instr
                        .blocks
                        .declare(block, &id.name, Binding::new(BindingKind::FunctionDecl));
                }
            }
            DefaultDecl::Class(class) => {
                if let Some(id) = &class.id {
                    instr
                        .blocks
                        .declare(block, &id.name, Binding::new(BindingKind::ClassDecl));
                }
            }
            DefaultDecl::Expr(_) => {}
        },
        _ => {}
    }
}

/// Registers import bindings, rejecting locals that are already bound.
pub(crate) fn register_import_bindings(
    instr: &mut Instrumentor<'_, impl InstrumentTracer>,
    block: BlockId,
    stmt: &Stmt,
) -> Result<()> {
    let Stmt::Import(import) = stmt else { return Ok(()) };
    for spec in &import.specifiers {
        let Some(local) = spec.local() else {
            return Err(instr.unexpected_node("ImportSpecifier", import.base.start_loc()));
        };
        instr.idents.note_user_name(&local.name);
        if instr.blocks.get(block).bindings.contains_key(&local.name) {
            return Err(instr.err(
                ErrorKind::DuplicateImportName,
                format!("import name '{}' is already bound", local.name),
                local.base.start_loc(),
            ));
        }
        instr
            .blocks
            .declare(block, &local.name, Binding::new(BindingKind::Import));
    }
    Ok(())
}

/// Whether this statement level lexically binds `name` (`let`/`const`,
/// class or function declaration). Pure form of the shallow hoist scan, used
/// by rewrites that must stop renaming at a shadowing scope.
pub(crate) fn stmts_bind_lexically(stmts: &[Stmt], name: &str) -> bool {
    stmts.iter().any(|stmt| stmt_binds_lexically(stmt, name))
}

fn stmt_binds_lexically(stmt: &Stmt, name: &str) -> bool {
    match stmt {
        Stmt::VarDecl(decl) if decl.kind != VarDeclKind::Var => decl.declarations.iter().any(|declarator| {
            let mut names = Vec::new();
            pattern_names(&declarator.id, &mut names);
            names.iter().any(|bound| bound == name)
        }),
        Stmt::Fn(func) => func.id.as_ref().is_some_and(|id| id.name == name),
        Stmt::Class(class) => class.id.as_ref().is_some_and(|id| id.name == name),
        Stmt::Labeled(labeled) => stmt_binds_lexically(&labeled.body, name),
        Stmt::ExportNamed(export) => export
            .declaration
            .as_ref()
            .is_some_and(|declaration| stmt_binds_lexically(declaration, name)),
        _ => false,
    }
}

/// Whether this function-body statement list binds `name` as a `var` or
/// hoisted function declaration, descending into nested blocks but not into
/// nested functions. Pure form of the deep hoist scan.
pub(crate) fn stmts_bind_var_deep(stmts: &[Stmt], name: &str) -> bool {
    stmts.iter().any(|stmt| stmt_binds_var_deep(stmt, name))
}

fn var_decl_binds(decl: &VarDecl, name: &str) -> bool {
    decl.kind == VarDeclKind::Var
        && decl.declarations.iter().any(|declarator| {
            let mut names = Vec::new();
            pattern_names(&declarator.id, &mut names);
            names.iter().any(|bound| bound == name)
        })
}

fn stmt_binds_var_deep(stmt: &Stmt, name: &str) -> bool {
    match stmt {
        Stmt::VarDecl(decl) => var_decl_binds(decl, name),
        Stmt::Fn(func) => func.id.as_ref().is_some_and(|id| id.name == name),
        Stmt::Block(block) => stmts_bind_var_deep(&block.body, name),
        Stmt::If(if_stmt) => {
            stmt_binds_var_deep(&if_stmt.consequent, name)
                || if_stmt
                    .alternate
                    .as_ref()
                    .is_some_and(|alternate| stmt_binds_var_deep(alternate, name))
        }
        Stmt::Labeled(labeled) => stmt_binds_var_deep(&labeled.body, name),
        Stmt::While(while_stmt) => stmt_binds_var_deep(&while_stmt.body, name),
        Stmt::DoWhile(do_while) => stmt_binds_var_deep(&do_while.body, name),
        Stmt::For(for_stmt) => {
            matches!(&for_stmt.init, Some(ForInit::Decl(decl)) if var_decl_binds(decl, name))
                || stmt_binds_var_deep(&for_stmt.body, name)
        }
        Stmt::ForIn(for_in) => {
            matches!(&for_in.left, ForTarget::Decl(decl) if var_decl_binds(decl, name))
                || stmt_binds_var_deep(&for_in.body, name)
        }
        Stmt::ForOf(for_of) => {
            matches!(&for_of.left, ForTarget::Decl(decl) if var_decl_binds(decl, name))
                || stmt_binds_var_deep(&for_of.body, name)
        }
        Stmt::Switch(switch) => switch.cases.iter().any(|case| stmts_bind_var_deep(&case.consequent, name)),
        Stmt::Try(try_stmt) => {
            stmts_bind_var_deep(&try_stmt.block.body, name)
                || try_stmt
                    .handler
                    .as_ref()
                    .is_some_and(|handler| stmts_bind_var_deep(&handler.body.body, name))
                || try_stmt
                    .finalizer
                    .as_ref()
                    .is_some_and(|finalizer| stmts_bind_var_deep(&finalizer.body, name))
        }
        Stmt::ExportNamed(export) => export
            .declaration
            .as_ref()
            .is_some_and(|declaration| stmt_binds_var_deep(declaration, name)),
        _ => false,
    }
}

/// Index of the first top-level `super(...)` statement in a constructor
/// body, and whether that statement is also the last one.
pub(crate) fn first_super_call_index(body: &[Stmt]) -> (Option<u32>, bool) {
    for (index, stmt) in body.iter().enumerate() {
        if let Stmt::Expr(expr_stmt) = stmt
            && let crate::ast::Expr::Call(call) = &expr_stmt.expression
            && matches!(call.callee, crate::ast::Expr::SuperRef(_))
        {
            let index_u32 = u32::try_from(index).expect("statement index exceeds u32");
            return (Some(index_u32), index == body.len() - 1);
        }
    }
    (None, false)
}
