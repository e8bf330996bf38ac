//! Parameter rewriting.
//!
//! Complex parameters (defaults, destructuring, non-trailing rest) are moved
//! into the function body so the tracker can run without re-evaluating
//! default expressions and so one reconstructed binding can reference
//! another. Arity is preserved: a defaulted parameter stays defaulted
//! (`t = undefined`), a bare pattern becomes a bare temp, a rest stays rest.
//! TDZ order is preserved by reconstructing all moved parameters in source
//! order inside a single `let`, with `t !== undefined ? t : default` keeping
//! default evaluation lazy and at most once.
//!
//! Moving parameter expressions into the body can collide with body `var`
//! and function declarations. Colliding bindings are lifted: declarations
//! become assignments against a `let` at the head of the body, function
//! declarations hoist through a wrapper declaration (preserving the original
//! function's source lines), and references are renamed where the binding
//! was truly distinct from the parameter scope.
//!
//! Functions containing direct `eval` are left unrewritten apart from the
//! tracker: moving or renaming their bindings would change what the
//! evaluated code sees.

use ahash::AHashMap;

use crate::{
    ast::{
        build, AssignExpr, AssignPat, ClassNode, Expr, FnBody, FnNode, ForInit, ForTarget, Ident, Pat, RestPat,
        Stmt, VarDeclKind,
    },
    ident::InternalName,
    trace::InstrumentTracer,
};

use super::{scan, FnCtx, Instrumentor, Result};

/// What to do with a colliding body binding: rename to a fresh temp, or keep
/// the name (the binding is the parameter itself) and only convert the
/// declaration to an assignment.
#[derive(Debug, Clone)]
enum LiftAction {
    Rename(InternalName),
    ConvertOnly,
}

#[derive(Debug, Default)]
struct LiftPlan {
    targets: AHashMap<String, LiftAction>,
    /// `let` bindings needed at the head of the body: fresh temps for
    /// renamed bindings, original names for bindings that lost their `var`
    /// as collateral of a declarator split.
    lifted_lets: Vec<Ident>,
    /// Hoist-wrapper functions to call at the head of the body.
    wrapper_calls: Vec<InternalName>,
}

impl LiftPlan {
    fn lift_user_name(&mut self, name: &str) {
        if !self.lifted_lets.iter().any(|ident| ident.name == name) {
            self.lifted_lets.push(build::ident(name));
        }
    }
}

impl<T: InstrumentTracer> Instrumentor<'_, T> {
    /// Rewrites the function's parameters on exit. Returns the statements to
    /// prepend to the body (reconstruction `let`, lifted `let`s, wrapper
    /// calls).
    pub(crate) fn rewrite_params(&mut self, func: &mut FnNode, ctx: &FnCtx) -> Result<Vec<Stmt>> {
        if self.functions.get(ctx.record).contains_eval {
            return Ok(Vec::new());
        }
        let Some(first_complex) = func.params.iter().position(|param| !matches!(param, Pat::Ident(_))) else {
            return Ok(Vec::new());
        };
        // A trailing `...x` alone needs no rewrite.
        if first_complex == func.params.len() - 1
            && matches!(
                &func.params[first_complex],
                Pat::Rest(rest) if matches!(rest.argument, Pat::Ident(_))
            )
        {
            return Ok(Vec::new());
        }

        // One complex parameter moves the whole list: reconstruction happens
        // in source order inside a single `let`, so every parameter must be
        // reachable from the body under its temp.
        let mut referenced = Vec::new();
        let mut moved_names = Vec::new();
        for param in &func.params {
            collect_param_expr_idents(param, &mut referenced);
            scan::pattern_names(param, &mut moved_names);
        }

        let mut reconstruction = Vec::new();
        let mut any_default_or_rest = false;
        for param in func.params.iter_mut() {
            let temp = self.idents.alloc_temp();
            let temp_ident = build::internal_ident(temp);
            let original = std::mem::replace(param, Pat::Ident(temp_ident.clone()));
            match original {
                Pat::Ident(user) => {
                    reconstruction.push(build::declarator(
                        Pat::Ident(user),
                        Some(Expr::Ident(temp_ident)),
                    ));
                }
                Pat::Assign(assign) => {
                    any_default_or_rest = true;
                    *param = Pat::Assign(Box::new(AssignPat {
                        node_type: crate::ast::AssignPatTag,
                        base: crate::ast::NodeBase::default(),
                        left: Pat::Ident(temp_ident.clone()),
                        right: build::undefined_expr(),
                    }));
                    let init = build::cond(
                        build::binary("!==", Expr::Ident(temp_ident.clone()), build::undefined_expr()),
                        Expr::Ident(temp_ident),
                        assign.right,
                    );
                    reconstruction.push(build::declarator(assign.left, Some(init)));
                }
                Pat::Rest(rest) => {
                    any_default_or_rest = true;
                    *param = Pat::Rest(Box::new(RestPat {
                        node_type: crate::ast::RestTag,
                        base: crate::ast::NodeBase::default(),
                        argument: Pat::Ident(temp_ident.clone()),
                    }));
                    reconstruction.push(build::declarator(rest.argument, Some(Expr::Ident(temp_ident))));
                }
                pattern @ (Pat::Object(_) | Pat::Array(_)) => {
                    reconstruction.push(build::declarator(pattern, Some(Expr::Ident(temp_ident))));
                }
                Pat::Expr(expr) => {
                    return Err(self.invariant("expression in parameter position", expr.start_loc()));
                }
            }
        }

        // All-simple parameter lists alias `arguments` in sloppy mode; a
        // trailing defaulted temp keeps the list non-simple so the rewrite
        // does not introduce aliasing the original never had.
        if !any_default_or_rest && !self.functions.get(ctx.record).is_strict {
            let temp = self.idents.alloc_temp();
            func.params.push(Pat::Assign(Box::new(AssignPat {
                node_type: crate::ast::AssignPatTag,
                base: crate::ast::NodeBase::default(),
                left: Pat::Ident(build::internal_ident(temp)),
                right: build::undefined_expr(),
            })));
        }

        let mut prologue = vec![Stmt::VarDecl(build::var_decl(VarDeclKind::Let, reconstruction))];

        // Body `var`/function declarations that clash with the moved
        // parameters or with the names their expressions reference.
        let plan = self.build_lift_plan(ctx, &referenced, &moved_names);
        if !plan.targets.is_empty() {
            let FnBody::Block(block) = &mut func.body else {
                return Ok(prologue);
            };
            let mut plan = plan;
            apply_lift_in_own_scope(&mut self.idents, &mut block.body, &mut plan);
            if !plan.lifted_lets.is_empty() {
                prologue.push(build::let_decl_uninit(std::mem::take(&mut plan.lifted_lets)));
            }
            for wrapper in &plan.wrapper_calls {
                prologue.push(build::expr_stmt(build::call(
                    build::internal_ident_expr(wrapper.clone()),
                    Vec::new(),
                )));
            }
            // Renamed bindings go in the metadata so downstream rewrites can
            // apply the same renaming to the recorded AST.
            let record = self.functions.get_mut(ctx.record);
            for (name, action) in &plan.targets {
                if matches!(action, LiftAction::Rename(_))
                    && let Some(trails) = record.local_occurrences.get(name)
                {
                    let trails = trails.clone();
                    record.internal_vars.entry(name.clone()).or_default().extend(trails);
                }
            }
        }
        Ok(prologue)
    }

    fn build_lift_plan(&mut self, ctx: &FnCtx, referenced: &[String], moved_names: &[String]) -> LiftPlan {
        let mut plan = LiftPlan::default();
        let body_bindings: Vec<String> = self
            .blocks
            .get(ctx.body_block)
            .bindings
            .iter()
            .filter(|(_, binding)| {
                matches!(
                    binding.kind,
                    crate::block::BindingKind::Var | crate::block::BindingKind::FunctionDecl
                )
            })
            .map(|(name, _)| name.clone())
            .collect();
        for name in body_bindings {
            if moved_names.contains(&name) {
                // The body declaration re-declares a parameter: same
                // binding, so only the declaration form changes.
                plan.targets.insert(name, LiftAction::ConvertOnly);
            } else if referenced.contains(&name) {
                // A distinct binding shadowing a name the parameter
                // expressions need: rename it out of the way.
                let fresh = self.idents.alloc_temp();
                plan.lifted_lets.push(build::internal_ident(fresh.clone()));
                plan.targets.insert(name, LiftAction::Rename(fresh));
            }
        }
        plan
    }
}

/// Collects every identifier referenced inside a parameter's default values
/// and computed keys. Over-approximates (names bound inside nested arrows
/// are included); lifting a binding that did not strictly need it is
/// semantically transparent.
fn collect_param_expr_idents(pat: &Pat, out: &mut Vec<String>) {
    match pat {
        Pat::Ident(_) => {}
        Pat::Assign(assign) => {
            collect_param_expr_idents(&assign.left, out);
            collect_expr_idents(&assign.right, out);
        }
        Pat::Object(object) => {
            for prop in &object.properties {
                match prop {
                    crate::ast::ObjectPatProp::Prop(prop) => {
                        if prop.computed {
                            collect_expr_idents(&prop.key, out);
                        }
                        collect_param_expr_idents(&prop.value, out);
                    }
                    crate::ast::ObjectPatProp::Rest(rest) => collect_param_expr_idents(&rest.argument, out),
                }
            }
        }
        Pat::Array(array) => {
            for element in array.elements.iter().flatten() {
                collect_param_expr_idents(element, out);
            }
        }
        Pat::Rest(rest) => collect_param_expr_idents(&rest.argument, out),
        Pat::Expr(expr) => collect_expr_idents(expr, out),
    }
}

fn collect_expr_idents(expr: &Expr, out: &mut Vec<String>) {
    // Serialization sees every identifier in the subtree; names in
    // non-reference positions only over-approximate the collision set.
    collect_expr_idents_value(&serde_json::to_value(expr).expect("AST serializes"), out);
}

fn collect_expr_idents_value(value: &serde_json::Value, out: &mut Vec<String>) {
    match value {
        serde_json::Value::Object(map) => {
            if map.get("type").and_then(serde_json::Value::as_str) == Some("Identifier")
                && let Some(name) = map.get("name").and_then(serde_json::Value::as_str)
            {
                out.push(name.to_owned());
            }
            for child in map.values() {
                collect_expr_idents_value(child, out);
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                collect_expr_idents_value(item, out);
            }
        }
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Lift application: declaration conversion in the function's own var scope,
// reference renaming everywhere the binding stays visible.
// ---------------------------------------------------------------------------

fn apply_lift_in_own_scope(
    idents: &mut crate::ident::IdentTable,
    stmts: &mut Vec<Stmt>,
    plan: &mut LiftPlan,
) {
    let mut index = 0;
    while index < stmts.len() {
        let replacement = convert_stmt(idents, &mut stmts[index], plan);
        match replacement {
            Some(new_stmts) => {
                let count = new_stmts.len();
                stmts.splice(index..=index, new_stmts);
                index += count;
            }
            None => index += 1,
        }
    }
}

/// Converts one statement in the function's own var scope. Returns
/// replacement statements when the statement itself must change.
fn convert_stmt(
    idents: &mut crate::ident::IdentTable,
    stmt: &mut Stmt,
    plan: &mut LiftPlan,
) -> Option<Vec<Stmt>> {
    match stmt {
        Stmt::VarDecl(decl) if decl.kind == VarDeclKind::Var => {
            // Classify each declarator before any renaming touches its
            // binding identifiers.
            let targeted: Vec<bool> = decl
                .declarations
                .iter()
                .map(|declarator| pattern_targeted(&declarator.id, plan))
                .collect();
            if !targeted.contains(&true) {
                // References inside pattern defaults, computed keys and
                // initializers still rename; non-targeted binding names
                // never match.
                for declarator in &mut decl.declarations {
                    rename_in_pat_bindings(&mut declarator.id, plan);
                    if let Some(init) = &mut declarator.init {
                        rename_in_expr(init, plan);
                    }
                }
                return None;
            }
            let decl = match std::mem::replace(stmt, build::empty_stmt()) {
                Stmt::VarDecl(decl) => decl,
                _ => unreachable!(),
            };
            let mut out = Vec::new();
            let mut kept = Vec::new();
            for (declarator, is_targeted) in decl.declarations.into_iter().zip(targeted) {
                let mut declarator = declarator;
                if is_targeted {
                    // Names the declarator binds that are not lift targets
                    // still lose their `var`; they get a head `let` under
                    // their own name.
                    let mut names = Vec::new();
                    scan::pattern_names(&declarator.id, &mut names);
                    for name in &names {
                        if !plan.targets.contains_key(name) {
                            plan.lift_user_name(name);
                        }
                    }
                    let mut target = declarator.id;
                    rename_in_pat_bindings(&mut target, plan);
                    if let Some(mut init) = declarator.init {
                        rename_in_expr(&mut init, plan);
                        out.push(build::expr_stmt(Expr::Assign(Box::new(AssignExpr {
                            node_type: crate::ast::AssignExprTag,
                            base: crate::ast::NodeBase::default(),
                            operator: "=".to_owned(),
                            left: target,
                            right: init,
                        }))));
                    }
                    // An initializer-less declarator vanishes; the binding
                    // lives on as the parameter or the lifted `let`.
                } else {
                    rename_in_pat_bindings(&mut declarator.id, plan);
                    if let Some(init) = &mut declarator.init {
                        rename_in_expr(init, plan);
                    }
                    kept.push(declarator);
                }
            }
            if !kept.is_empty() {
                out.insert(0, Stmt::VarDecl(build::var_decl(VarDeclKind::Var, kept)));
            }
            Some(out)
        }
        Stmt::VarDecl(decl) => {
            // Lexical declarations cannot be lift targets (a same-scope
            // `let` beside a `var` is a syntax error, and nested blocks
            // shadow before recursing); only their references rename.
            for declarator in &mut decl.declarations {
                rename_in_pat_bindings(&mut declarator.id, plan);
                if let Some(init) = &mut declarator.init {
                    rename_in_expr(init, plan);
                }
            }
            None
        }
        Stmt::Fn(func) => {
            let Some(name) = func.id.as_ref().map(|id| id.name.clone()) else {
                return None;
            };
            let Some(action) = plan.targets.get(&name).cloned() else {
                rename_in_fn(func, plan);
                return None;
            };
            // Hoist through a wrapper declaration: the wrapper is itself
            // hoisted, its call at the body head performs the assignment,
            // and the original function keeps its lines (and its own name
            // for self-reference).
            let target = match action {
                LiftAction::Rename(fresh) => build::internal_ident(fresh),
                LiftAction::ConvertOnly => build::ident(name),
            };
            let wrapper = idents.alloc_temp();
            plan.wrapper_calls.push(wrapper.clone());
            let original = match std::mem::replace(stmt, build::empty_stmt()) {
                Stmt::Fn(func) => func,
                _ => unreachable!(),
            };
            let mut fn_expr = original;
            fn_expr.node_type = crate::ast::FnTag::FunctionExpression;
            let assignment = build::assign(target, Expr::Fn(fn_expr));
            Some(vec![build::fn_decl(
                build::internal_ident(wrapper),
                vec![build::expr_stmt(assignment)],
            )])
        }
        Stmt::Class(class) => {
            rename_in_class(class, plan);
            None
        }
        Stmt::Block(block) => {
            let shadowed = shadowed_targets(plan, |name| scan::stmts_bind_lexically(&block.body, name));
            with_shadowed(plan, shadowed, |plan| {
                apply_lift_in_own_scope(idents, &mut block.body, plan);
            });
            None
        }
        Stmt::If(if_stmt) => {
            rename_in_expr(&mut if_stmt.test, plan);
            convert_single(idents, &mut if_stmt.consequent, plan);
            if let Some(alternate) = &mut if_stmt.alternate {
                convert_single(idents, alternate, plan);
            }
            None
        }
        Stmt::Labeled(labeled) => {
            convert_single(idents, &mut labeled.body, plan);
            None
        }
        Stmt::While(while_stmt) => {
            rename_in_expr(&mut while_stmt.test, plan);
            convert_single(idents, &mut while_stmt.body, plan);
            None
        }
        Stmt::DoWhile(do_while) => {
            convert_single(idents, &mut do_while.body, plan);
            rename_in_expr(&mut do_while.test, plan);
            None
        }
        Stmt::For(for_stmt) => {
            let shadowed = shadowed_targets(plan, |name| {
                matches!(&for_stmt.init, Some(ForInit::Decl(decl)) if decl.kind != VarDeclKind::Var && decl_binds(decl, name))
            });
            with_shadowed(plan, shadowed, |plan| {
                if let Some(init) = &mut for_stmt.init {
                    match init {
                        ForInit::Decl(decl) if decl.kind == VarDeclKind::Var => {
                            convert_for_head_var(init, plan);
                        }
                        ForInit::Decl(decl) => {
                            for declarator in &mut decl.declarations {
                                if let Some(init) = &mut declarator.init {
                                    rename_in_expr(init, plan);
                                }
                            }
                        }
                        ForInit::Expr(expr) => rename_in_expr(expr, plan),
                    }
                }
                if let Some(test) = &mut for_stmt.test {
                    rename_in_expr(test, plan);
                }
                if let Some(update) = &mut for_stmt.update {
                    rename_in_expr(update, plan);
                }
                convert_single(idents, &mut for_stmt.body, plan);
            });
            None
        }
        Stmt::ForIn(for_in) => {
            convert_for_each(idents, &mut for_in.left, &mut for_in.right, &mut for_in.body, plan);
            None
        }
        Stmt::ForOf(for_of) => {
            convert_for_each(idents, &mut for_of.left, &mut for_of.right, &mut for_of.body, plan);
            None
        }
        Stmt::Switch(switch) => {
            rename_in_expr(&mut switch.discriminant, plan);
            let binds = |name: &str| {
                switch
                    .cases
                    .iter()
                    .any(|case| scan::stmts_bind_lexically(&case.consequent, name))
            };
            let shadowed = shadowed_targets(plan, binds);
            with_shadowed(plan, shadowed, |plan| {
                for case in &mut switch.cases {
                    if let Some(test) = &mut case.test {
                        rename_in_expr(test, plan);
                    }
                    apply_lift_in_own_scope(idents, &mut case.consequent, plan);
                }
            });
            None
        }
        Stmt::Try(try_stmt) => {
            let shadowed = shadowed_targets(plan, |name| scan::stmts_bind_lexically(&try_stmt.block.body, name));
            with_shadowed(plan, shadowed, |plan| {
                apply_lift_in_own_scope(idents, &mut try_stmt.block.body, plan);
            });
            if let Some(handler) = &mut try_stmt.handler {
                let param_binds = shadowed_targets(plan, |name| {
                    handler.param.as_ref().is_some_and(|param| pattern_binds(param, name))
                });
                with_shadowed(plan, param_binds, |plan| {
                    let shadowed = shadowed_targets(plan, |name| scan::stmts_bind_lexically(&handler.body.body, name));
                    with_shadowed(plan, shadowed, |plan| {
                        apply_lift_in_own_scope(idents, &mut handler.body.body, plan);
                    });
                });
            }
            if let Some(finalizer) = &mut try_stmt.finalizer {
                let shadowed = shadowed_targets(plan, |name| scan::stmts_bind_lexically(&finalizer.body, name));
                with_shadowed(plan, shadowed, |plan| {
                    apply_lift_in_own_scope(idents, &mut finalizer.body, plan);
                });
            }
            None
        }
        Stmt::Expr(expr_stmt) => {
            rename_in_expr(&mut expr_stmt.expression, plan);
            None
        }
        Stmt::Return(return_stmt) => {
            if let Some(argument) = &mut return_stmt.argument {
                rename_in_expr(argument, plan);
            }
            None
        }
        Stmt::Throw(throw) => {
            rename_in_expr(&mut throw.argument, plan);
            None
        }
        Stmt::ExportNamed(export) => {
            if let Some(declaration) = &mut export.declaration {
                convert_single(idents, declaration, plan);
            }
            None
        }
        Stmt::ExportDefault(export) => {
            if let crate::ast::DefaultDecl::Expr(expr) = &mut export.declaration {
                rename_in_expr(expr, plan);
            }
            None
        }
        _ => None,
    }
}

/// Converts a statement in a non-list position (loop body, if branch).
/// Returns true when the statement changed shape. List-splitting conversions
/// wrap into a block.
fn convert_single(idents: &mut crate::ident::IdentTable, stmt: &mut Stmt, plan: &mut LiftPlan) -> bool {
    if let Some(replacement) = convert_stmt(idents, stmt, plan) {
        *stmt = match replacement.len() {
            0 => build::empty_stmt(),
            1 => replacement.into_iter().next().expect("length checked"),
            _ => Stmt::Block(build::block_stmt(replacement)),
        };
        true
    } else {
        false
    }
}

fn convert_for_each(
    idents: &mut crate::ident::IdentTable,
    left: &mut ForTarget,
    right: &mut Expr,
    body: &mut Stmt,
    plan: &mut LiftPlan,
) {
    let lexical_shadow = shadowed_targets(plan, |name| {
        matches!(&*left, ForTarget::Decl(decl) if decl.kind != VarDeclKind::Var && decl_binds(decl, name))
    });
    with_shadowed(plan, lexical_shadow, |plan| {
        match left {
            ForTarget::Decl(decl) if decl.kind == VarDeclKind::Var => {
                // A targeted `var` head loses its declaration; the binding
                // lives on in the head `let`, so the head becomes a plain
                // assignment target.
                let targeted = decl
                    .declarations
                    .iter()
                    .any(|declarator| pattern_targeted(&declarator.id, plan));
                if targeted {
                    let mut declarators = std::mem::take(&mut decl.declarations);
                    let mut pat = declarators.remove(0).id;
                    let mut names = Vec::new();
                    scan::pattern_names(&pat, &mut names);
                    for name in &names {
                        if !plan.targets.contains_key(name) {
                            plan.lift_user_name(name);
                        }
                    }
                    rename_in_pat_bindings(&mut pat, plan);
                    *left = ForTarget::Pat(pat);
                }
            }
            ForTarget::Decl(_) => {}
            ForTarget::Pat(pat) => rename_in_pat_bindings(pat, plan),
        }
        rename_in_expr(right, plan);
        convert_single(idents, body, plan);
    });
}

fn pattern_targeted(pat: &Pat, plan: &LiftPlan) -> bool {
    let mut names = Vec::new();
    scan::pattern_names(pat, &mut names);
    names.iter().any(|name| plan.targets.contains_key(name))
}

/// Converts a targeted `for (var …;;)` head into assignments: the bindings
/// move to the head `let`, the initializers stay in place.
fn convert_for_head_var(init_slot: &mut ForInit, plan: &mut LiftPlan) {
    let ForInit::Decl(decl) = init_slot else { return };
    let targeted = decl
        .declarations
        .iter()
        .any(|declarator| pattern_targeted(&declarator.id, plan));
    if !targeted {
        for declarator in &mut decl.declarations {
            if let Some(init) = &mut declarator.init {
                rename_in_expr(init, plan);
            }
        }
        return;
    }
    let declarators = std::mem::take(&mut decl.declarations);
    let mut assignments = Vec::new();
    for declarator in declarators {
        let mut names = Vec::new();
        scan::pattern_names(&declarator.id, &mut names);
        for name in &names {
            if !plan.targets.contains_key(name) {
                plan.lift_user_name(name);
            }
        }
        let mut target = declarator.id;
        rename_in_pat_bindings(&mut target, plan);
        if let Some(mut init) = declarator.init {
            rename_in_expr(&mut init, plan);
            assignments.push(Expr::Assign(Box::new(AssignExpr {
                node_type: crate::ast::AssignExprTag,
                base: crate::ast::NodeBase::default(),
                operator: "=".to_owned(),
                left: target,
                right: init,
            })));
        }
    }
    *init_slot = match assignments.len() {
        0 => {
            // Nothing left to run in the head.
            ForInit::Expr(build::undefined_expr())
        }
        1 => ForInit::Expr(assignments.into_iter().next().expect("length checked")),
        _ => ForInit::Expr(Expr::Seq(crate::ast::SeqExpr {
            node_type: crate::ast::SeqExprTag,
            base: crate::ast::NodeBase::default(),
            expressions: assignments,
        })),
    };
}

fn decl_binds(decl: &crate::ast::VarDecl, name: &str) -> bool {
    decl.declarations.iter().any(|declarator| pattern_binds(&declarator.id, name))
}

fn pattern_binds(pat: &Pat, name: &str) -> bool {
    let mut names = Vec::new();
    scan::pattern_names(pat, &mut names);
    names.iter().any(|bound| bound == name)
}

/// Removes targets shadowed in a nested scope, returning them for
/// restoration.
fn shadowed_targets(plan: &LiftPlan, binds: impl Fn(&str) -> bool) -> Vec<(String, LiftAction)> {
    plan.targets
        .iter()
        .filter(|(name, _)| binds(name))
        .map(|(name, action)| (name.clone(), action.clone()))
        .collect()
}

fn with_shadowed(plan: &mut LiftPlan, shadowed: Vec<(String, LiftAction)>, f: impl FnOnce(&mut LiftPlan)) {
    for (name, _) in &shadowed {
        plan.targets.remove(name);
    }
    f(plan);
    for (name, action) in shadowed {
        plan.targets.insert(name, action);
    }
}

// ---------------------------------------------------------------------------
// Reference renaming
// ---------------------------------------------------------------------------

fn rename_ident(ident: &mut Ident, plan: &LiftPlan) {
    if ident.internal.is_some() {
        return;
    }
    if let Some(LiftAction::Rename(fresh)) = plan.targets.get(&ident.name) {
        // The replacement is an injected temp: mark it internal so the
        // finalize pass renames it with the rest.
        ident.name = crate::ident::IdentTable::provisional(fresh);
        ident.internal = Some(fresh.clone());
        ident.binding_hint = None;
    }
}

/// Renames binding identifiers inside a pattern that is being converted to
/// an assignment target.
fn rename_in_pat_bindings(pat: &mut Pat, plan: &mut LiftPlan) {
    match pat {
        Pat::Ident(ident) => rename_ident(ident, plan),
        Pat::Assign(assign) => {
            rename_in_pat_bindings(&mut assign.left, plan);
            rename_in_expr(&mut assign.right, plan);
        }
        Pat::Object(object) => {
            for prop in &mut object.properties {
                match prop {
                    crate::ast::ObjectPatProp::Prop(prop) => {
                        if prop.computed {
                            rename_in_expr(&mut prop.key, plan);
                        }
                        rename_in_pat_bindings(&mut prop.value, plan);
                    }
                    crate::ast::ObjectPatProp::Rest(rest) => rename_in_pat_bindings(&mut rest.argument, plan),
                }
            }
        }
        Pat::Array(array) => {
            for element in array.elements.iter_mut().flatten() {
                rename_in_pat_bindings(element, plan);
            }
        }
        Pat::Rest(rest) => rename_in_pat_bindings(&mut rest.argument, plan),
        Pat::Expr(expr) => rename_in_expr(expr, plan),
    }
}

fn rename_in_fn(func: &mut FnNode, plan: &mut LiftPlan) {
    let binds = |name: &str| fn_binds_name(func, name);
    let shadowed = shadowed_targets(plan, binds);
    with_shadowed(plan, shadowed, |plan| {
        for param in &mut func.params {
            rename_in_param_exprs(param, plan);
        }
        match &mut func.body {
            FnBody::Block(block) => {
                for stmt in &mut block.body {
                    rename_in_stmt(stmt, plan);
                }
            }
            FnBody::Expr(expr) => rename_in_expr(expr, plan),
        }
    });
}

/// Whether a nested function rebinds `name` in any of its scopes.
fn fn_binds_name(func: &FnNode, name: &str) -> bool {
    if func.id.as_ref().is_some_and(|id| id.name == name) {
        return true;
    }
    if func.params.iter().any(|param| pattern_binds(param, name)) {
        return true;
    }
    match &func.body {
        FnBody::Block(block) => {
            scan::stmts_bind_var_deep(&block.body, name) || scan::stmts_bind_lexically(&block.body, name)
        }
        FnBody::Expr(_) => false,
    }
}

/// Renames only inside default values and computed keys; binding positions
/// of a nested function's parameters belong to that function.
fn rename_in_param_exprs(pat: &mut Pat, plan: &mut LiftPlan) {
    match pat {
        Pat::Ident(_) => {}
        Pat::Assign(assign) => {
            rename_in_param_exprs(&mut assign.left, plan);
            rename_in_expr(&mut assign.right, plan);
        }
        Pat::Object(object) => {
            for prop in &mut object.properties {
                match prop {
                    crate::ast::ObjectPatProp::Prop(prop) => {
                        if prop.computed {
                            rename_in_expr(&mut prop.key, plan);
                        }
                        rename_in_param_exprs(&mut prop.value, plan);
                    }
                    crate::ast::ObjectPatProp::Rest(rest) => rename_in_param_exprs(&mut rest.argument, plan),
                }
            }
        }
        Pat::Array(array) => {
            for element in array.elements.iter_mut().flatten() {
                rename_in_param_exprs(element, plan);
            }
        }
        Pat::Rest(rest) => rename_in_param_exprs(&mut rest.argument, plan),
        Pat::Expr(expr) => rename_in_expr(expr, plan),
    }
}

fn rename_in_class(class: &mut ClassNode, plan: &mut LiftPlan) {
    let binds = |name: &str| class.id.as_ref().is_some_and(|id| id.name == name);
    let shadowed = shadowed_targets(plan, binds);
    with_shadowed(plan, shadowed, |plan| {
        if let Some(super_class) = &mut class.super_class {
            rename_in_expr(super_class, plan);
        }
        for member in &mut class.body.body {
            match member {
                crate::ast::ClassMember::Method(method) => {
                    if method.computed {
                        rename_in_expr(&mut method.key, plan);
                    }
                    if let Expr::Fn(func) = &mut method.value {
                        rename_in_fn(func, plan);
                    }
                }
                crate::ast::ClassMember::Field(field) => {
                    if field.computed {
                        rename_in_expr(&mut field.key, plan);
                    }
                    if let Some(value) = &mut field.value {
                        rename_in_expr(value, plan);
                    }
                }
                crate::ast::ClassMember::Unknown(_) => {}
            }
        }
    });
}

fn rename_in_stmt(stmt: &mut Stmt, plan: &mut LiftPlan) {
    match stmt {
        Stmt::Expr(expr_stmt) => rename_in_expr(&mut expr_stmt.expression, plan),
        Stmt::Block(block) => {
            let shadowed = shadowed_targets(plan, |name| {
                scan::stmts_bind_lexically(&block.body, name) || scan::stmts_bind_var_deep(&block.body, name)
            });
            with_shadowed(plan, shadowed, |plan| {
                for stmt in &mut block.body {
                    rename_in_stmt(stmt, plan);
                }
            });
        }
        Stmt::Empty(_) | Stmt::Debugger(_) | Stmt::Break(_) | Stmt::Continue(_) => {}
        Stmt::Return(return_stmt) => {
            if let Some(argument) = &mut return_stmt.argument {
                rename_in_expr(argument, plan);
            }
        }
        Stmt::Labeled(labeled) => rename_in_stmt(&mut labeled.body, plan),
        Stmt::If(if_stmt) => {
            rename_in_expr(&mut if_stmt.test, plan);
            rename_in_stmt(&mut if_stmt.consequent, plan);
            if let Some(alternate) = &mut if_stmt.alternate {
                rename_in_stmt(alternate, plan);
            }
        }
        Stmt::Switch(switch) => {
            rename_in_expr(&mut switch.discriminant, plan);
            for case in &mut switch.cases {
                if let Some(test) = &mut case.test {
                    rename_in_expr(test, plan);
                }
                for stmt in &mut case.consequent {
                    rename_in_stmt(stmt, plan);
                }
            }
        }
        Stmt::Throw(throw) => rename_in_expr(&mut throw.argument, plan),
        Stmt::Try(try_stmt) => {
            for stmt in &mut try_stmt.block.body {
                rename_in_stmt(stmt, plan);
            }
            if let Some(handler) = &mut try_stmt.handler {
                let shadowed = shadowed_targets(plan, |name| {
                    handler.param.as_ref().is_some_and(|param| pattern_binds(param, name))
                });
                with_shadowed(plan, shadowed, |plan| {
                    for stmt in &mut handler.body.body {
                        rename_in_stmt(stmt, plan);
                    }
                });
            }
            if let Some(finalizer) = &mut try_stmt.finalizer {
                for stmt in &mut finalizer.body {
                    rename_in_stmt(stmt, plan);
                }
            }
        }
        Stmt::While(while_stmt) => {
            rename_in_expr(&mut while_stmt.test, plan);
            rename_in_stmt(&mut while_stmt.body, plan);
        }
        Stmt::DoWhile(do_while) => {
            rename_in_stmt(&mut do_while.body, plan);
            rename_in_expr(&mut do_while.test, plan);
        }
        Stmt::For(for_stmt) => {
            if let Some(init) = &mut for_stmt.init {
                match init {
                    ForInit::Decl(decl) => {
                        for declarator in &mut decl.declarations {
                            if let Some(init) = &mut declarator.init {
                                rename_in_expr(init, plan);
                            }
                        }
                    }
                    ForInit::Expr(expr) => rename_in_expr(expr, plan),
                }
            }
            if let Some(test) = &mut for_stmt.test {
                rename_in_expr(test, plan);
            }
            if let Some(update) = &mut for_stmt.update {
                rename_in_expr(update, plan);
            }
            rename_in_stmt(&mut for_stmt.body, plan);
        }
        Stmt::ForIn(for_in) => {
            if let ForTarget::Pat(pat) = &mut for_in.left {
                rename_in_pat_bindings(pat, plan);
            }
            rename_in_expr(&mut for_in.right, plan);
            rename_in_stmt(&mut for_in.body, plan);
        }
        Stmt::ForOf(for_of) => {
            if let ForTarget::Pat(pat) = &mut for_of.left {
                rename_in_pat_bindings(pat, plan);
            }
            rename_in_expr(&mut for_of.right, plan);
            rename_in_stmt(&mut for_of.body, plan);
        }
        Stmt::VarDecl(decl) => {
            for declarator in &mut decl.declarations {
                rename_in_pat_bindings(&mut declarator.id, plan);
                if let Some(init) = &mut declarator.init {
                    rename_in_expr(init, plan);
                }
            }
        }
        Stmt::Fn(func) => rename_in_fn(func, plan),
        Stmt::Class(class) => rename_in_class(class, plan),
        Stmt::Import(_) | Stmt::ExportAll(_) => {}
        Stmt::ExportNamed(export) => {
            if let Some(declaration) = &mut export.declaration {
                rename_in_stmt(declaration, plan);
            }
        }
        Stmt::ExportDefault(export) => {
            if let crate::ast::DefaultDecl::Expr(expr) = &mut export.declaration {
                rename_in_expr(expr, plan);
            }
        }
        Stmt::Unknown(_) => {}
    }
}

fn rename_in_expr(expr: &mut Expr, plan: &mut LiftPlan) {
    match expr {
        Expr::Ident(ident) => rename_ident(ident, plan),
        Expr::Lit(_) | Expr::This(_) | Expr::SuperRef(_) | Expr::Meta(_) | Expr::Unknown(_) => {}
        Expr::Template(template) => {
            for inner in &mut template.expressions {
                rename_in_expr(inner, plan);
            }
        }
        Expr::TaggedTemplate(tagged) => {
            rename_in_expr(&mut tagged.tag, plan);
            for inner in &mut tagged.quasi.expressions {
                rename_in_expr(inner, plan);
            }
        }
        Expr::Array(array) => {
            for element in array.elements.iter_mut().flatten() {
                rename_in_expr(element, plan);
            }
        }
        Expr::Object(object) => {
            for member in &mut object.properties {
                match member {
                    crate::ast::ObjectMember::Prop(prop) => {
                        if prop.computed {
                            rename_in_expr(&mut prop.key, plan);
                        }
                        rename_in_expr(&mut prop.value, plan);
                    }
                    crate::ast::ObjectMember::Spread(spread) => rename_in_expr(&mut spread.argument, plan),
                    crate::ast::ObjectMember::Unknown(_) => {}
                }
            }
        }
        Expr::Fn(func) => rename_in_fn(func, plan),
        Expr::Class(class) => rename_in_class(class, plan),
        Expr::Unary(unary) => rename_in_expr(&mut unary.argument, plan),
        Expr::Update(update) => rename_in_expr(&mut update.argument, plan),
        Expr::Binary(binary) => {
            rename_in_expr(&mut binary.left, plan);
            rename_in_expr(&mut binary.right, plan);
        }
        Expr::Logical(logical) => {
            rename_in_expr(&mut logical.left, plan);
            rename_in_expr(&mut logical.right, plan);
        }
        Expr::Assign(assign) => {
            rename_in_pat_bindings(&mut assign.left, plan);
            rename_in_expr(&mut assign.right, plan);
        }
        Expr::Cond(cond) => {
            rename_in_expr(&mut cond.test, plan);
            rename_in_expr(&mut cond.consequent, plan);
            rename_in_expr(&mut cond.alternate, plan);
        }
        Expr::Call(call) => {
            rename_in_expr(&mut call.callee, plan);
            for argument in &mut call.arguments {
                rename_in_expr(argument, plan);
            }
        }
        Expr::New(new) => {
            rename_in_expr(&mut new.callee, plan);
            for argument in &mut new.arguments {
                rename_in_expr(argument, plan);
            }
        }
        Expr::Seq(seq) => {
            for inner in &mut seq.expressions {
                rename_in_expr(inner, plan);
            }
        }
        Expr::Member(member) => {
            rename_in_expr(&mut member.object, plan);
            if member.computed {
                rename_in_expr(&mut member.property, plan);
            }
        }
        Expr::Yield(yield_expr) => {
            if let Some(argument) = &mut yield_expr.argument {
                rename_in_expr(argument, plan);
            }
        }
        Expr::Await(await_expr) => rename_in_expr(&mut await_expr.argument, plan),
        Expr::ImportCall(import) => rename_in_expr(&mut import.source, plan),
        Expr::Chain(chain) => rename_in_expr(&mut chain.expression, plan),
        Expr::Spread(spread) => rename_in_expr(&mut spread.argument, plan),
    }
}
