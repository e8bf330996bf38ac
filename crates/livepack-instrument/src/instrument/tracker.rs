//! Tracker injection.
//!
//! Every function gets a call to the injected tracker as close to entry as
//! the grammar allows. The call passes the function's info getter and a thunk
//! producing `[[scopeId, var1, var2, …], …]` — one inner array per captured
//! scope, ascending by block id, giving the live values of the captured
//! names. In normal calls the tracker is an inert no-op; at serialization
//! time the function is invoked with no arguments so parameter defaults run,
//! which is why the preferred home for the call is the first parameter
//! default.
//!
//! At program level one require-prologue is emitted, plus one zero-argument
//! info-getter declaration per function record and a shared sources getter.

use crate::{
    ast::{build, AssignPat, Comment, Expr, FnNode, Pat, Program, Stmt},
    function::{FnId, SuperTarget},
    ident::{InternalName, TRANSFORMED_MARKER},
    trace::InstrumentTracer,
};

use super::{Instrumentor, Result};

/// Builds and places the tracker call for one function (the constructor node
/// for a class record). Returns the statement to prepend when no parameter
/// position could host the call.
pub(crate) fn inject_tracker_call<T: InstrumentTracer>(
    instr: &mut Instrumentor<'_, T>,
    func: &mut FnNode,
    fn_id: FnId,
) -> Result<Option<Stmt>> {
    let tracker_call = build_tracker_call(instr, fn_id);

    // First choice: amend the first parameter default. `tracker() || d`
    // keeps the default's value (the tracker returns a falsy sentinel) and
    // runs on the no-argument call serialization makes.
    for param in &mut func.params {
        if let Pat::Assign(assign) = param {
            let old = std::mem::replace(&mut assign.right, build::null_lit());
            assign.right = build::logical("||", tracker_call, old);
            return Ok(None);
        }
    }

    // Second choice: a destructuring parameter whose first element can carry
    // a default.
    for param in &mut func.params {
        match param {
            Pat::Object(object) => {
                for prop in &mut object.properties {
                    if let crate::ast::ObjectPatProp::Prop(prop) = prop
                        && let Pat::Ident(_) = &prop.value
                    {
                        let target = std::mem::replace(&mut prop.value, Pat::Ident(build::ident("__")));
                        prop.value = Pat::Assign(Box::new(AssignPat {
                            node_type: crate::ast::AssignPatTag,
                            base: crate::ast::NodeBase::default(),
                            left: target,
                            right: build::logical("||", tracker_call, build::undefined_expr()),
                        }));
                        return Ok(None);
                    }
                }
            }
            Pat::Array(array) => {
                if let Some(Some(element)) = array.elements.first_mut()
                    && matches!(element, Pat::Ident(_))
                {
                    let target = std::mem::replace(element, Pat::Ident(build::ident("__")));
                    *element = Pat::Assign(Box::new(AssignPat {
                        node_type: crate::ast::AssignPatTag,
                        base: crate::ast::NodeBase::default(),
                        left: target,
                        right: build::logical("||", tracker_call, build::undefined_expr()),
                    }));
                    return Ok(None);
                }
            }
            _ => {}
        }
    }

    // Fallback: body prologue.
    Ok(Some(build::expr_stmt(tracker_call)))
}

/// `livepack_tracker(livepack_getFnInfo_<id>, () => [[scopeId, a, b], …])`.
fn build_tracker_call<T: InstrumentTracer>(instr: &Instrumentor<'_, T>, fn_id: FnId) -> Expr {
    let record = instr.functions.get(fn_id);
    let mut scope_arrays = Vec::with_capacity(record.captured_scopes.len());
    for (&block_id, scope) in &record.captured_scopes {
        let slot = instr
            .blocks
            .get(block_id)
            .scope_id_slot
            .clone()
            .expect("captured block has a scope-id slot");
        let mut elements = Vec::with_capacity(scope.vars.len() + 1);
        elements.push(build::internal_ident_expr(slot));
        for name in scope.vars.keys() {
            elements.push(captured_value_expr(name, record.super_target.as_ref()));
        }
        scope_arrays.push(build::array_expr(elements));
    }
    build::call(
        build::internal_ident_expr(InternalName::Tracker),
        vec![
            build::internal_ident_expr(InternalName::FnInfo(record.id.raw())),
            build::arrow_expr(build::array_expr(scope_arrays)),
        ],
    )
}

/// The expression yielding a captured variable's live value inside the
/// tracker thunk. `super` has no value; its slot stands in.
fn captured_value_expr(name: &str, super_target: Option<&SuperTarget>) -> Expr {
    match name {
        "this" => Expr::This(crate::ast::ThisExpr {
            node_type: crate::ast::ThisTag,
            base: crate::ast::NodeBase::default(),
        }),
        "super" => match super_target {
            Some(SuperTarget::ClassName(class_name) | SuperTarget::Binding(class_name)) => {
                build::ident_expr(class_name.clone())
            }
            Some(SuperTarget::Temp(temp)) => build::internal_ident_expr(temp.clone()),
            // No target was resolved; the serializer rejects such a record.
            None => build::undefined_expr(),
        },
        _ => build::ident_expr(name),
    }
}

/// The per-function tracker comment:
/// `livepack_track:<id>;<kind>;<filename>` with the filename JSON-escaped
/// and `*/` broken so the comment cannot terminate early.
pub(crate) fn tracker_comment<T: InstrumentTracer>(instr: &Instrumentor<'_, T>, fn_id: FnId) -> Comment {
    let record = instr.functions.get(fn_id);
    let escaped = escape_comment_filename(&instr.opts.filename);
    Comment::block(format!(
        "{}{};{};{}",
        crate::ident::TRACKER_COMMENT_PREFIX,
        record.id.raw(),
        record.comment_code(),
        escaped,
    ))
}

fn escape_comment_filename(filename: &str) -> String {
    let quoted = serde_json::to_string(filename).expect("strings serialize");
    // Strip the surrounding quotes from the JSON string form.
    let inner = &quoted[1..quoted.len() - 1];
    inner.replace("*/", "*\\/")
}

/// Program-level emission: require prologue, root scope-id, eval helpers,
/// info getters and the shared sources getter. Runs before the finalize
/// rename; every injected identifier is provisional and internally marked.
pub(crate) fn finish_program<T: InstrumentTracer>(instr: &mut Instrumentor<'_, T>, program: &mut Program) {
    let mut prologue = Vec::new();

    prologue.push(build::const_destructure(
        vec![
            build::internal_ident(InternalName::Tracker),
            build::internal_ident(InternalName::GetScopeId),
        ],
        build::call(
            build::require_call(&instr.opts.tracker_require_path),
            vec![
                build::str_lit(instr.opts.filename.clone()),
                build::ident_expr("module"),
                build::ident_expr("require"),
            ],
        ),
    ));
    if instr.eval_used {
        prologue.push(build::const_destructure(
            vec![
                build::internal_ident(InternalName::Eval),
                build::internal_ident(InternalName::Preval),
                build::internal_ident(InternalName::GetEval),
            ],
            build::call(
                build::require_call(&instr.opts.eval_require_path),
                vec![
                    build::str_lit(instr.opts.filename.clone()),
                    build::num_lit(instr.blocks.next_id()),
                    build::num_lit(instr.idents.suffix_counter()),
                ],
            ),
        ));
    }
    prologue.extend(instr.block_prologue_stmts(instr.root_block));

    let mut getters = Vec::new();
    let emit_sources = !instr.functions.is_empty() || instr.eval_used;
    let fn_ids: Vec<FnId> = instr.functions.iter().map(|(fn_id, _)| fn_id).collect();
    for fn_id in fn_ids {
        getters.push(build_fn_info_getter(instr, fn_id));
    }
    if emit_sources {
        getters.push(build::fn_decl(
            build::internal_ident(InternalName::GetSources),
            vec![build::return_stmt(build::object_expr_str_map([(
                instr.opts.filename.as_str(),
                instr.opts.source.as_str(),
            )]))],
        ));
    }

    // Injected statements go above anything an upstream module-to-script
    // transform inserted; info getters go at the end, or at the top for
    // code recovered from inside an eval.
    if instr.opts.is_eval_code {
        prologue.extend(getters);
        program.body.splice(0..0, prologue);
    } else {
        program.body.splice(0..0, prologue);
        program.body.extend(getters);
    }

    program
        .base
        .leading_comments
        .insert(0, Comment::block(TRANSFORMED_MARKER));
}

/// `function livepack_getFnInfo_<id>() { return ["<json>", [childGetters…],
/// livepack_getSources]; }`
fn build_fn_info_getter<T: InstrumentTracer>(instr: &Instrumentor<'_, T>, fn_id: FnId) -> Stmt {
    let record = instr.functions.get(fn_id);
    let json = crate::output::fn_meta_json(&instr.functions, &instr.idents, fn_id);
    let json_text = serde_json::to_string(&json).expect("metadata serializes");
    let child_getters = record
        .children
        .iter()
        .map(|&child| build::internal_ident_expr(InternalName::FnInfo(instr.functions.get(child).id.raw())))
        .collect();
    let payload = build::array_expr(vec![
        build::str_lit(json_text),
        build::array_expr(child_getters),
        build::internal_ident_expr(InternalName::GetSources),
    ]);
    build::fn_decl(
        build::internal_ident(InternalName::FnInfo(record.id.raw())),
        vec![build::return_stmt(payload)],
    )
}
