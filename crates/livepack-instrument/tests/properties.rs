//! Structural properties of the instrumented output: block-id uniqueness,
//! capture completeness, scope ordering, name non-collision, arity
//! preservation and scope-id placement.

mod common;

use common::*;
use livepack_instrument::{instrument_traced, Options, RecordingTracer, TraceEvent};
use pretty_assertions::assert_eq;
use serde_json::json;

/// `function a(){ let x; function b(){ let y; return function(){ return x + y; }; } }`
fn nested_closures() -> Vec<serde_json::Value> {
    let innermost = json!({
        "type": "FunctionExpression",
        "id": null,
        "params": [],
        "body": block(vec![return_stmt(json!({
            "type": "BinaryExpression", "operator": "+", "left": ident("x"), "right": ident("y"),
        }))]),
        "generator": false,
        "async": false,
    });
    vec![fn_decl(
        "a",
        vec![],
        vec![
            var_decl("let", "x", num(1)),
            fn_decl("b", vec![], vec![var_decl("let", "y", num(2)), return_stmt(innermost)]),
        ],
    )]
}

// =============================================================================
// Block ids and scope ordering
// =============================================================================

/// Property: block ids referenced anywhere in metadata are unique per scope
/// list, dense below `next_block_id`, and captured-scope lists are sorted
/// ascending.
#[test]
fn block_ids_unique_and_scopes_sorted() {
    let output = run(nested_closures());
    let mut all_records = Vec::new();
    let mut stack: Vec<&livepack_instrument::FnMeta> = output.functions.iter().collect();
    while let Some(meta) = stack.pop() {
        all_records.push(meta);
        stack.extend(meta.children.iter());
    }
    let mut record_ids = Vec::new();
    for meta in &all_records {
        record_ids.push(meta.id);
        let block_ids: Vec<u32> = meta.scopes.iter().map(|scope| scope.block_id).collect();
        let mut sorted = block_ids.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(block_ids, sorted, "captured scopes are ascending and unique");
        for &block_id in &block_ids {
            assert!(block_id < output.next_block_id);
        }
    }
    record_ids.sort_unstable();
    let mut deduped = record_ids.clone();
    deduped.dedup();
    assert_eq!(record_ids, deduped, "record ids are unique");
}

/// Property: every function between a use and its binding records the
/// capture (here `b` records `x` although only the innermost reads it).
#[test]
fn capture_chains_are_complete() {
    let output = run(nested_closures());
    let a = &output.functions[0];
    let b = &a.children[0];
    let innermost = &b.children[0];

    assert!(b.scopes.iter().any(|scope| scope.vars.contains_key("x")));
    let inner_vars: Vec<&String> = innermost
        .scopes
        .iter()
        .flat_map(|scope| scope.vars.keys())
        .collect();
    assert!(inner_vars.contains(&&"x".to_owned()));
    assert!(inner_vars.contains(&&"y".to_owned()));
    // x lives further out than y; ascending block ids put it first.
    assert!(innermost.scopes[0].vars.contains_key("x"));
    assert!(innermost.scopes[1].vars.contains_key("y"));
}

// =============================================================================
// Name non-collision
// =============================================================================

/// Property: injected names never collide with user names, however the
/// source was constructed. A user `livepack_…` name pushes the suffix
/// counter and every injected identifier is re-prefixed.
#[test]
fn user_prefix_names_force_a_rename() {
    let output = run(vec![
        var_decl("var", "livepack_foo", num(1)),
        fn_decl("f", vec![], vec![return_stmt(ident("livepack_foo"))]),
    ]);
    assert_eq!(output.name_suffix_counter, 1);
    let program = output.program_json();
    for name in all_ident_names(&program) {
        if name.starts_with("livepack") && name != "livepack_foo" {
            assert!(
                name.starts_with("livepack1_"),
                "injected name {name} must carry the bumped prefix"
            );
        }
    }
}

/// Counter seeds account for numbered user names.
#[test]
fn numbered_user_prefix_names_raise_the_counter_past_them() {
    let output = run(vec![var_decl("var", "livepack3_x", num(1)), fn_decl("f", vec![], vec![])]);
    assert_eq!(output.name_suffix_counter, 4);
    let program = output.program_json();
    assert!(all_ident_names(&program).iter().any(|name| name == "livepack4_tracker"));
}

// =============================================================================
// Arity preservation
// =============================================================================

/// Property: the rewritten parameter list keeps the original `.length`
/// (count of parameters before the first default or rest).
#[test]
fn param_rewrite_preserves_arity_shape() {
    fn arity(params: &[serde_json::Value]) -> usize {
        params
            .iter()
            .take_while(|param| param["type"] == "Identifier" || param["type"] == "ObjectPattern" || param["type"] == "ArrayPattern")
            .count()
    }

    // ([a], b) — a destructured parameter still counts toward length.
    let output = run(vec![fn_decl(
        "f",
        vec![
            json!({"type": "ArrayPattern", "elements": [ident("a")]}),
            ident("b"),
        ],
        vec![],
    )]);
    let program = output.program_json();
    let f = &find_nodes(&program, &|node| {
        node["type"] == "FunctionDeclaration" && node["id"]["name"] == "f"
    })[0];
    let params = f["params"].as_array().unwrap();
    assert_eq!(arity(params), 2, "both replacements stay bare identifiers");
    // Sloppy all-simple replacements get a trailing defaulted temp to break
    // the arguments linkage; it does not count toward length.
    assert_eq!(params.last().unwrap()["type"], "AssignmentPattern");

    // A trailing `...rest` alone is left untouched.
    let output = run(vec![fn_decl(
        "g",
        vec![ident("a"), json!({"type": "RestElement", "argument": ident("r")})],
        vec![],
    )]);
    let program = output.program_json();
    let g = &find_nodes(&program, &|node| {
        node["type"] == "FunctionDeclaration" && node["id"]["name"] == "g"
    })[0];
    assert_eq!(g["params"][0]["name"], "a");
    assert_eq!(g["params"][1]["type"], "RestElement");
    assert_eq!(g["params"][1]["argument"]["name"], "r");
}

// =============================================================================
// Scope-id placement
// =============================================================================

/// A per-iteration binding captured by a closure gets its scope id
/// initialized inside the loop body, once per iteration.
#[test]
fn loop_captures_get_per_iteration_scope_ids() {
    let output = run(vec![json!({
        "type": "ForStatement",
        "init": {
            "type": "VariableDeclaration", "kind": "let",
            "declarations": [{"type": "VariableDeclarator", "id": ident("i"), "init": num(0)}],
        },
        "test": null,
        "update": null,
        "body": block(vec![expr_stmt(call(member(ident("fns"), "push"), vec![arrow(vec![], ident("i"))]))]),
    })]);
    let program = output.program_json();
    let for_stmt = &find_nodes(&program, &|node| node["type"] == "ForStatement")[0];
    let loop_body = for_stmt["body"]["body"].as_array().unwrap();
    assert_eq!(loop_body[0]["type"], "VariableDeclaration");
    assert_eq!(loop_body[0]["declarations"][0]["id"]["name"], "livepack_scopeId_2");
    // The arrow's metadata points at the same block.
    assert_eq!(output.functions[0].scopes[0].block_id, 2);
    assert!(output.functions[0].scopes[0].vars.contains_key("i"));
}

/// A caught binding captured by a closure initializes its scope id inside
/// the catch body.
#[test]
fn catch_captures_get_scope_ids_in_the_catch_body() {
    let output = run(vec![json!({
        "type": "TryStatement",
        "block": block(vec![]),
        "handler": {
            "type": "CatchClause",
            "param": ident("e"),
            "body": block(vec![expr_stmt(assign(ident("leak"), arrow(vec![], ident("e"))))]),
        },
        "finalizer": null,
    })]);
    let program = output.program_json();
    let handler = &find_nodes(&program, &|node| node["type"] == "CatchClause")[0];
    let catch_body = handler["body"]["body"].as_array().unwrap();
    assert_eq!(catch_body[0]["type"], "VariableDeclaration");
    assert!(catch_body[0]["declarations"][0]["id"]["name"]
        .as_str()
        .unwrap()
        .starts_with("livepack_scopeId_"));
}

/// `let` inside switch cases scopes to a dedicated block whose scope id is
/// hosted by the enclosing statement block.
#[test]
fn switch_case_lets_use_a_dedicated_block() {
    let output = run(vec![json!({
        "type": "SwitchStatement",
        "discriminant": ident("v"),
        "cases": [{
            "type": "SwitchCase",
            "test": num(1),
            "consequent": [
                var_decl("let", "z", num(1)),
                expr_stmt(assign(ident("fn"), arrow(vec![], ident("z")))),
            ],
        }],
    })]);
    // The arrow captures z from the switch block.
    let arrow_meta = &output.functions[0];
    assert_eq!(arrow_meta.scopes.len(), 1);
    assert!(arrow_meta.scopes[0].vars.contains_key("z"));
    // The scope-id const lands at program level (the switch's hosting
    // block), not inside a case.
    let program = output.program_json();
    let consts = find_nodes(&program, &|node| {
        node["type"] == "VariableDeclaration"
            && node["declarations"][0]["id"]["name"]
                .as_str()
                .is_some_and(|name| name.starts_with("livepack_scopeId_"))
    });
    assert_eq!(consts.len(), 1);
    let body = program["body"].as_array().unwrap();
    assert!(
        body.iter().any(|stmt| stmt == consts[0]),
        "scope-id const is a top-level statement"
    );
}

// =============================================================================
// Indirect eval
// =============================================================================

/// A bare unshadowed `eval` reference becomes a `getEval()` call and flags
/// the module.
#[test]
fn bare_eval_reference_goes_through_get_eval() {
    let output = run(vec![var_decl("var", "e", ident("eval"))]);
    assert!(output.eval_used);
    let program = output.program_json();
    let declarator = &find_nodes(&program, &|node| {
        node["type"] == "VariableDeclarator" && node["id"]["name"] == "e"
    })[0];
    assert_eq!(declarator["init"]["type"], "CallExpression");
    assert_eq!(declarator["init"]["callee"]["name"], "livepack_getEval");
    // No function contains a direct eval, so no record is flagged.
    assert!(output.functions.is_empty());
}

/// A shadowed `eval` is an ordinary binding: no wrapping, no module flag.
#[test]
fn shadowed_eval_is_not_special() {
    let output = run(vec![
        var_decl("var", "eval", num(1)),
        fn_decl("f", vec![], vec![expr_stmt(call(ident("eval"), vec![str_lit("x")]))]),
    ]);
    assert!(!output.eval_used);
    assert!(!output.functions[0].contains_eval);
    let program = output.program_json();
    assert!(calls_to(&program, "livepack_preval").is_empty());
}

// =============================================================================
// Tracing
// =============================================================================

/// The recording tracer observes the pass.
#[test]
fn recording_tracer_captures_pass_events() {
    let program = json!({"type": "Program", "sourceType": "script", "body": [fn_decl("f", vec![ident("x")], vec![return_stmt(arrow(vec![], ident("x")))])]});
    let options = Options::new("test.js", "");
    let mut tracer = RecordingTracer::new();
    instrument_traced(program, &options, &mut tracer).expect("instrumentation should succeed");
    assert!(tracer
        .events()
        .iter()
        .any(|event| matches!(event, TraceEvent::FunctionEntered { .. })));
    assert!(tracer
        .events()
        .iter()
        .any(|event| matches!(event, TraceEvent::CaptureRecorded { name, .. } if name == "x")));
    assert!(tracer
        .events()
        .iter()
        .any(|event| matches!(event, TraceEvent::BlockCreated { .. })));
}
