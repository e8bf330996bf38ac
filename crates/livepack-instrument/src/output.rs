//! Output assembly.
//!
//! Runs after the traversal and program-level injection: finalizes injected
//! identifier names (rewriting the prefix when a user name forced the
//! counter up), serializes per-function metadata and packages the mutated
//! AST with the sources map and module flags.

use indexmap::IndexMap;
use serde::Serialize;

use crate::{
    ast::{
        ClassMember, DefaultDecl, Expr, FnBody, ForInit, ForTarget, Ident, ObjectMember, ObjectPatProp, Pat, Program,
        Stmt,
    },
    function::{Amendment, CapturedVar, FnId, FnKind, Functions, SuperTarget},
    ident::IdentTable,
    instrument::Instrumentor,
    srcmap::SourceMapConsumer,
    trace::InstrumentTracer,
    trail::Trail,
};

/// One captured scope in emitted metadata, ascending by block id.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeMeta {
    pub block_id: u32,
    pub block_name: Option<String>,
    pub vars: IndexMap<String, CapturedVar>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SuperTargetMeta {
    ClassName { name: String },
    Binding { name: String },
    Temp { name: String },
}

/// The serialized record for one function, nested through `children`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FnMeta {
    pub id: u32,
    pub name: Option<String>,
    pub kind: FnKind,
    pub is_method: bool,
    pub is_strict: bool,
    pub scopes: Vec<ScopeMeta>,
    pub internal_vars: IndexMap<String, Vec<Trail>>,
    pub global_names: Vec<String>,
    pub amendments: Vec<Amendment>,
    pub contains_eval: bool,
    pub contains_import: bool,
    pub has_super_class: bool,
    pub first_super_statement_index: Option<u32>,
    pub returns_super: bool,
    pub super_target: Option<SuperTargetMeta>,
    pub arg_names: Vec<String>,
    pub child_ids: Vec<u32>,
    pub ast: serde_json::Value,
    #[serde(skip)]
    pub children: Vec<FnMeta>,
}

impl FnMeta {
    pub fn build(functions: &Functions, idents: &IdentTable, fn_id: FnId) -> Self {
        let record = functions.get(fn_id);
        let scopes = record
            .captured_scopes
            .iter()
            .map(|(block_id, scope)| ScopeMeta {
                block_id: block_id.raw(),
                block_name: scope.block_name.clone(),
                vars: scope.vars.clone(),
            })
            .collect();
        let super_target = record.super_target.as_ref().map(|target| match target {
            SuperTarget::ClassName(name) => SuperTargetMeta::ClassName { name: name.clone() },
            SuperTarget::Binding(name) => SuperTargetMeta::Binding { name: name.clone() },
            SuperTarget::Temp(temp) => SuperTargetMeta::Temp {
                name: idents.final_name(temp),
            },
        });
        Self {
            id: record.id.raw(),
            name: record.name.clone(),
            kind: record.kind(),
            is_method: record.is_method,
            is_strict: record.is_strict,
            scopes,
            internal_vars: record.internal_vars.clone(),
            global_names: record.global_names.iter().cloned().collect(),
            amendments: record.amendments.clone(),
            contains_eval: record.contains_eval,
            contains_import: record.contains_import,
            has_super_class: record.has_super_class,
            first_super_statement_index: record.first_super_statement_index,
            returns_super: record.returns_super,
            super_target,
            arg_names: record.arg_names.clone(),
            child_ids: record
                .children
                .iter()
                .map(|&child| functions.get(child).id.raw())
                .collect(),
            ast: record.ast_snapshot.clone(),
            children: record
                .children
                .iter()
                .map(|&child| Self::build(functions, idents, child))
                .collect(),
        }
    }
}

/// The JSON blob embedded in an emitted info getter.
pub(crate) fn fn_meta_json(functions: &Functions, idents: &IdentTable, fn_id: FnId) -> serde_json::Value {
    serde_json::to_value(FnMeta::build(functions, idents, fn_id)).expect("metadata serializes")
}

/// Everything a host gets back for one module.
#[derive(Debug)]
pub struct InstrumentOutput {
    /// The instrumented AST, serializable back to ESTree JSON.
    pub program: Program,
    /// Function metadata for records with no enclosing function, children
    /// nested inside.
    pub functions: Vec<FnMeta>,
    /// Filename → full source text.
    pub sources: IndexMap<String, String>,
    pub eval_used: bool,
    pub import_used: bool,
    /// First block id not allocated by this module.
    pub next_block_id: u32,
    /// Final injected-name suffix counter.
    pub name_suffix_counter: u32,
}

impl InstrumentOutput {
    /// The instrumented AST as ESTree JSON.
    pub fn program_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.program).expect("AST serializes")
    }
}

pub(crate) fn assemble<T: InstrumentTracer>(instr: &Instrumentor<'_, T>, program: Program) -> InstrumentOutput {
    let functions = instr
        .top_level_fns
        .iter()
        .map(|&fn_id| FnMeta::build(&instr.functions, &instr.idents, fn_id))
        .collect();
    let mut sources = IndexMap::new();
    sources.insert(instr.opts.filename.clone(), instr.opts.source.clone());
    InstrumentOutput {
        program,
        functions,
        sources,
        eval_used: instr.eval_used,
        import_used: instr.import_used,
        next_block_id: instr.blocks.next_id(),
        name_suffix_counter: instr.idents.suffix_counter(),
    }
}

// ---------------------------------------------------------------------------
// Function AST snapshots
// ---------------------------------------------------------------------------

/// Serializes a function or class node as captured at entry: nested
/// functions elided to null (class constructors inline into their class),
/// locations remapped through the input source map when one is supplied.
pub(crate) fn ast_snapshot<S: Serialize>(node: &S, source_map: Option<&dyn SourceMapConsumer>) -> serde_json::Value {
    let mut value = serde_json::to_value(node).expect("AST serializes");
    elide_nested_functions(&mut value, true, false);
    if let Some(map) = source_map {
        remap_locs(&mut value, map);
    }
    value
}

const FUNCTION_TYPES: &[&str] = &[
    "FunctionDeclaration",
    "FunctionExpression",
    "ArrowFunctionExpression",
    "ClassDeclaration",
    "ClassExpression",
];

fn elide_nested_functions(value: &mut serde_json::Value, is_root: bool, keep_fn_here: bool) {
    match value {
        serde_json::Value::Object(map) => {
            if !is_root
                && !keep_fn_here
                && map
                    .get("type")
                    .and_then(serde_json::Value::as_str)
                    .is_some_and(|node_type| FUNCTION_TYPES.contains(&node_type))
            {
                *value = serde_json::Value::Null;
                return;
            }
            let is_ctor_def = map.get("type").and_then(serde_json::Value::as_str) == Some("MethodDefinition")
                && map.get("kind").and_then(serde_json::Value::as_str) == Some("constructor");
            for (key, child) in map.iter_mut() {
                elide_nested_functions(child, false, is_ctor_def && key == "value");
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                elide_nested_functions(item, false, false);
            }
        }
        _ => {}
    }
}

/// Remaps each retained node's `loc` through the input source map. A node
/// whose start and end land in different original files is left unmapped.
fn remap_locs(value: &mut serde_json::Value, map: &dyn SourceMapConsumer) {
    let serde_json::Value::Object(object) = value else {
        if let serde_json::Value::Array(items) = value {
            for item in items {
                remap_locs(item, map);
            }
        }
        return;
    };
    let remapped = match object.get("loc") {
        Some(serde_json::Value::Object(loc)) => {
            match (parse_pos(loc.get("start")), parse_pos(loc.get("end"))) {
                (Some(start), Some(end)) => match (map.original_position(start), map.original_position(end)) {
                    (Some(orig_start), Some(orig_end)) if orig_start.filename == orig_end.filename => {
                        Some(serde_json::json!({
                            "start": {"line": orig_start.loc.line, "column": orig_start.loc.column},
                            "end": {"line": orig_end.loc.line, "column": orig_end.loc.column},
                            "filename": orig_start.filename,
                        }))
                    }
                    _ => None,
                },
                _ => None,
            }
        }
        _ => None,
    };
    if let Some(new_loc) = remapped {
        object.insert("loc".to_owned(), new_loc);
    }
    for (key, child) in object.iter_mut() {
        if key != "loc" {
            remap_locs(child, map);
        }
    }
}

fn parse_pos(value: Option<&serde_json::Value>) -> Option<crate::error::CodeLoc> {
    let object = value?.as_object()?;
    let line = u32::try_from(object.get("line")?.as_u64()?).ok()?;
    let column = u32::try_from(object.get("column")?.as_u64()?).ok()?;
    Some(crate::error::CodeLoc::new(line, column))
}

// ---------------------------------------------------------------------------
// Finalize renaming
// ---------------------------------------------------------------------------

/// Rewrites every injected identifier to its final name. Only runs when a
/// user identifier forced the suffix counter past zero.
pub(crate) fn rename_internal_idents(program: &mut Program, idents: &IdentTable) {
    for stmt in &mut program.body {
        rename_stmt(stmt, idents);
    }
}

fn rename_ident(ident: &mut Ident, idents: &IdentTable) {
    if let Some(internal) = &ident.internal {
        ident.name = idents.final_name(internal);
    }
}

fn rename_pat(pat: &mut Pat, idents: &IdentTable) {
    match pat {
        Pat::Ident(ident) => rename_ident(ident, idents),
        Pat::Assign(assign) => {
            rename_pat(&mut assign.left, idents);
            rename_expr(&mut assign.right, idents);
        }
        Pat::Object(object) => {
            for prop in &mut object.properties {
                match prop {
                    ObjectPatProp::Prop(prop) => {
                        rename_expr(&mut prop.key, idents);
                        rename_pat(&mut prop.value, idents);
                    }
                    ObjectPatProp::Rest(rest) => rename_pat(&mut rest.argument, idents),
                }
            }
        }
        Pat::Array(array) => {
            for element in array.elements.iter_mut().flatten() {
                rename_pat(element, idents);
            }
        }
        Pat::Rest(rest) => rename_pat(&mut rest.argument, idents),
        Pat::Expr(expr) => rename_expr(expr, idents),
    }
}

fn rename_fn(func: &mut crate::ast::FnNode, idents: &IdentTable) {
    if let Some(id) = &mut func.id {
        rename_ident(id, idents);
    }
    for param in &mut func.params {
        rename_pat(param, idents);
    }
    match &mut func.body {
        FnBody::Block(block) => {
            for stmt in &mut block.body {
                rename_stmt(stmt, idents);
            }
        }
        FnBody::Expr(expr) => rename_expr(expr, idents),
    }
}

fn rename_class(class: &mut crate::ast::ClassNode, idents: &IdentTable) {
    if let Some(id) = &mut class.id {
        rename_ident(id, idents);
    }
    if let Some(super_class) = &mut class.super_class {
        rename_expr(super_class, idents);
    }
    for member in &mut class.body.body {
        match member {
            ClassMember::Method(method) => {
                rename_expr(&mut method.key, idents);
                rename_expr(&mut method.value, idents);
            }
            ClassMember::Field(field) => {
                rename_expr(&mut field.key, idents);
                if let Some(value) = &mut field.value {
                    rename_expr(value, idents);
                }
            }
            ClassMember::Unknown(_) => {}
        }
    }
}

fn rename_stmt(stmt: &mut Stmt, idents: &IdentTable) {
    match stmt {
        Stmt::Expr(expr_stmt) => rename_expr(&mut expr_stmt.expression, idents),
        Stmt::Block(block) => {
            for stmt in &mut block.body {
                rename_stmt(stmt, idents);
            }
        }
        Stmt::Empty(_) | Stmt::Debugger(_) | Stmt::Break(_) | Stmt::Continue(_) => {}
        Stmt::Return(return_stmt) => {
            if let Some(argument) = &mut return_stmt.argument {
                rename_expr(argument, idents);
            }
        }
        Stmt::Labeled(labeled) => rename_stmt(&mut labeled.body, idents),
        Stmt::If(if_stmt) => {
            rename_expr(&mut if_stmt.test, idents);
            rename_stmt(&mut if_stmt.consequent, idents);
            if let Some(alternate) = &mut if_stmt.alternate {
                rename_stmt(alternate, idents);
            }
        }
        Stmt::Switch(switch) => {
            rename_expr(&mut switch.discriminant, idents);
            for case in &mut switch.cases {
                if let Some(test) = &mut case.test {
                    rename_expr(test, idents);
                }
                for stmt in &mut case.consequent {
                    rename_stmt(stmt, idents);
                }
            }
        }
        Stmt::Throw(throw) => rename_expr(&mut throw.argument, idents),
        Stmt::Try(try_stmt) => {
            for stmt in &mut try_stmt.block.body {
                rename_stmt(stmt, idents);
            }
            if let Some(handler) = &mut try_stmt.handler {
                if let Some(param) = &mut handler.param {
                    rename_pat(param, idents);
                }
                for stmt in &mut handler.body.body {
                    rename_stmt(stmt, idents);
                }
            }
            if let Some(finalizer) = &mut try_stmt.finalizer {
                for stmt in &mut finalizer.body {
                    rename_stmt(stmt, idents);
                }
            }
        }
        Stmt::While(while_stmt) => {
            rename_expr(&mut while_stmt.test, idents);
            rename_stmt(&mut while_stmt.body, idents);
        }
        Stmt::DoWhile(do_while) => {
            rename_stmt(&mut do_while.body, idents);
            rename_expr(&mut do_while.test, idents);
        }
        Stmt::For(for_stmt) => {
            if let Some(init) = &mut for_stmt.init {
                match init {
                    ForInit::Decl(decl) => rename_var_decl(decl, idents),
                    ForInit::Expr(expr) => rename_expr(expr, idents),
                }
            }
            if let Some(test) = &mut for_stmt.test {
                rename_expr(test, idents);
            }
            if let Some(update) = &mut for_stmt.update {
                rename_expr(update, idents);
            }
            rename_stmt(&mut for_stmt.body, idents);
        }
        Stmt::ForIn(for_in) => {
            rename_for_target(&mut for_in.left, idents);
            rename_expr(&mut for_in.right, idents);
            rename_stmt(&mut for_in.body, idents);
        }
        Stmt::ForOf(for_of) => {
            rename_for_target(&mut for_of.left, idents);
            rename_expr(&mut for_of.right, idents);
            rename_stmt(&mut for_of.body, idents);
        }
        Stmt::VarDecl(decl) => rename_var_decl(decl, idents),
        Stmt::Fn(func) => rename_fn(func, idents),
        Stmt::Class(class) => rename_class(class, idents),
        Stmt::Import(_) | Stmt::ExportAll(_) => {}
        Stmt::ExportNamed(export) => {
            if let Some(declaration) = &mut export.declaration {
                rename_stmt(declaration, idents);
            }
        }
        Stmt::ExportDefault(export) => match &mut export.declaration {
            DefaultDecl::Fn(func) => rename_fn(func, idents),
            DefaultDecl::Class(class) => rename_class(class, idents),
            DefaultDecl::Expr(expr) => rename_expr(expr, idents),
        },
        Stmt::Unknown(_) => {}
    }
}

fn rename_for_target(target: &mut ForTarget, idents: &IdentTable) {
    match target {
        ForTarget::Decl(decl) => rename_var_decl(decl, idents),
        ForTarget::Pat(pat) => rename_pat(pat, idents),
    }
}

fn rename_var_decl(decl: &mut crate::ast::VarDecl, idents: &IdentTable) {
    for declarator in &mut decl.declarations {
        rename_pat(&mut declarator.id, idents);
        if let Some(init) = &mut declarator.init {
            rename_expr(init, idents);
        }
    }
}

fn rename_expr(expr: &mut Expr, idents: &IdentTable) {
    match expr {
        Expr::Ident(ident) => rename_ident(ident, idents),
        Expr::Lit(_) | Expr::This(_) | Expr::SuperRef(_) | Expr::Unknown(_) => {}
        Expr::Template(template) => {
            for inner in &mut template.expressions {
                rename_expr(inner, idents);
            }
        }
        Expr::TaggedTemplate(tagged) => {
            rename_expr(&mut tagged.tag, idents);
            for inner in &mut tagged.quasi.expressions {
                rename_expr(inner, idents);
            }
        }
        Expr::Array(array) => {
            for element in array.elements.iter_mut().flatten() {
                rename_expr(element, idents);
            }
        }
        Expr::Object(object) => {
            for member in &mut object.properties {
                match member {
                    ObjectMember::Prop(prop) => {
                        rename_expr(&mut prop.key, idents);
                        rename_expr(&mut prop.value, idents);
                    }
                    ObjectMember::Spread(spread) => rename_expr(&mut spread.argument, idents),
                    ObjectMember::Unknown(_) => {}
                }
            }
        }
        Expr::Fn(func) => rename_fn(func, idents),
        Expr::Class(class) => rename_class(class, idents),
        Expr::Unary(unary) => rename_expr(&mut unary.argument, idents),
        Expr::Update(update) => rename_expr(&mut update.argument, idents),
        Expr::Binary(binary) => {
            rename_expr(&mut binary.left, idents);
            rename_expr(&mut binary.right, idents);
        }
        Expr::Logical(logical) => {
            rename_expr(&mut logical.left, idents);
            rename_expr(&mut logical.right, idents);
        }
        Expr::Assign(assign) => {
            rename_pat(&mut assign.left, idents);
            rename_expr(&mut assign.right, idents);
        }
        Expr::Cond(cond) => {
            rename_expr(&mut cond.test, idents);
            rename_expr(&mut cond.consequent, idents);
            rename_expr(&mut cond.alternate, idents);
        }
        Expr::Call(call) => {
            rename_expr(&mut call.callee, idents);
            for argument in &mut call.arguments {
                rename_expr(argument, idents);
            }
        }
        Expr::New(new) => {
            rename_expr(&mut new.callee, idents);
            for argument in &mut new.arguments {
                rename_expr(argument, idents);
            }
        }
        Expr::Seq(seq) => {
            for inner in &mut seq.expressions {
                rename_expr(inner, idents);
            }
        }
        Expr::Member(member) => {
            rename_expr(&mut member.object, idents);
            rename_expr(&mut member.property, idents);
        }
        Expr::Yield(yield_expr) => {
            if let Some(argument) = &mut yield_expr.argument {
                rename_expr(argument, idents);
            }
        }
        Expr::Await(await_expr) => rename_expr(&mut await_expr.argument, idents),
        Expr::ImportCall(import) => rename_expr(&mut import.source, idents),
        Expr::Meta(_) => {}
        Expr::Chain(chain) => rename_expr(&mut chain.expression, idents),
        Expr::Spread(spread) => rename_expr(&mut spread.argument, idents),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elision_nulls_nested_functions_but_keeps_the_root() {
        let mut value = serde_json::json!({
            "type": "FunctionDeclaration",
            "body": {
                "type": "BlockStatement",
                "body": [{
                    "type": "ReturnStatement",
                    "argument": {"type": "ArrowFunctionExpression", "params": [], "body": {"type": "Identifier", "name": "x"}},
                }],
            },
        });
        elide_nested_functions(&mut value, true, false);
        assert_eq!(value["type"], "FunctionDeclaration");
        assert_eq!(value["body"]["body"][0]["argument"], serde_json::Value::Null);
    }

    #[test]
    fn elision_inlines_class_constructors() {
        let mut value = serde_json::json!({
            "type": "ClassDeclaration",
            "body": {"type": "ClassBody", "body": [
                {"type": "MethodDefinition", "kind": "constructor", "value": {"type": "FunctionExpression", "params": []}},
                {"type": "MethodDefinition", "kind": "method", "value": {"type": "FunctionExpression", "params": []}},
            ]},
        });
        elide_nested_functions(&mut value, true, false);
        assert_eq!(value["body"]["body"][0]["value"]["type"], "FunctionExpression");
        assert_eq!(value["body"]["body"][1]["value"], serde_json::Value::Null);
    }
}
