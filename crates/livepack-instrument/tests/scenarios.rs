//! End-to-end scenarios: one test per canonical input shape, asserting the
//! instrumented AST and emitted metadata semantically.

mod common;

use common::*;
use pretty_assertions::assert_eq;
use serde_json::json;

// =============================================================================
// 1. Closure capture (S1)
// =============================================================================

/// `function f(x){ return () => x; }` — the arrow captures `x` from `f`'s
/// parameter scope; the scope-id declaration lands in `f`'s body.
#[test]
fn closure_capture_records_scope_and_var() {
    let output = run(vec![fn_decl("f", vec![ident("x")], vec![return_stmt(arrow(vec![], ident("x")))])]);

    assert_eq!(output.functions.len(), 1);
    let f = &output.functions[0];
    assert_eq!(f.id, 2, "f's record id is its parameter block");
    assert!(f.scopes.is_empty(), "f itself captures nothing");

    assert_eq!(f.children.len(), 1);
    let arrow_meta = &f.children[0];
    assert_eq!(arrow_meta.scopes.len(), 1);
    let scope = &arrow_meta.scopes[0];
    assert_eq!(scope.block_id, 2);
    assert_eq!(scope.block_name.as_deref(), Some("f"));
    let var = &scope.vars["x"];
    assert!(var.is_read_from);
    assert!(!var.is_assigned_to);
    assert_eq!(var.trails.len(), 1);

    let program = output.program_json();
    // f's body: tracker call, scope-id const, then the original return.
    let body = fn_body(&program, "f");
    assert_eq!(body.len(), 3);
    assert_eq!(body[0]["expression"]["callee"]["name"], "livepack_tracker");
    assert_eq!(body[1]["type"], "VariableDeclaration");
    assert_eq!(body[1]["kind"], "const");
    assert_eq!(body[1]["declarations"][0]["id"]["name"], "livepack_scopeId_2");
    assert_eq!(body[1]["declarations"][0]["init"]["callee"]["name"], "livepack_getScopeId");

    // The arrow's tracker thunk emits the captured scope with `x` live.
    let arrow_node = &body[2]["argument"];
    assert_eq!(arrow_node["type"], "ArrowFunctionExpression");
    let arrow_body = arrow_node["body"]["body"].as_array().unwrap();
    assert_eq!(arrow_body.len(), 2, "tracker statement plus original return");
    let thunk = &arrow_body[0]["expression"]["arguments"][1];
    assert_eq!(
        thunk["body"]["elements"][0]["elements"],
        json!([{"type": "Identifier", "name": "livepack_scopeId_2"}, {"type": "Identifier", "name": "x"}]),
    );
}

/// The tracker comment is attached to the function and carries
/// `<id>;<kind>;<filename>`.
#[test]
fn tracker_comment_is_stable_and_parseable() {
    let output = run(vec![fn_decl("f", vec![], vec![])]);
    let program = output.program_json();
    let functions = find_nodes(&program, &|node| node["type"] == "FunctionDeclaration" && node["id"]["name"] == "f");
    assert_eq!(
        functions[0]["leadingComments"][0]["value"],
        "livepack_track:2;f;test.js"
    );
}

// =============================================================================
// 2. `arguments` (S2)
// =============================================================================

/// `function g(){ return arguments; }` — no outer capture, empty argNames.
#[test]
fn own_arguments_is_not_a_capture() {
    let output = run(vec![fn_decl("g", vec![], vec![return_stmt(ident("arguments"))])]);
    let g = &output.functions[0];
    assert!(g.scopes.is_empty());
    assert!(g.arg_names.is_empty());
    assert!(g.global_names.is_empty(), "arguments inside a function is not a global");
}

/// Parameter names are recorded for sloppy functions with simple parameters.
#[test]
fn arg_names_recorded_for_simple_sloppy_params() {
    let output = run(vec![fn_decl(
        "g",
        vec![ident("a"), ident("b")],
        vec![return_stmt(ident("arguments"))],
    )]);
    assert_eq!(output.functions[0].arg_names, vec!["a", "b"]);
}

/// An arrow referencing `arguments` captures the enclosing function's.
#[test]
fn arrow_captures_enclosing_arguments() {
    let output = run(vec![fn_decl(
        "g",
        vec![],
        vec![return_stmt(arrow(vec![], ident("arguments")))],
    )]);
    let arrow_meta = &output.functions[0].children[0];
    assert_eq!(arrow_meta.scopes.len(), 1);
    assert!(arrow_meta.scopes[0].vars.contains_key("arguments"));
}

// =============================================================================
// 3. Class with super (S3)
// =============================================================================

/// `class C extends B { m(){ super.m(); } }` — the super target is the class
/// name; no temp slot appears.
#[test]
fn class_method_super_uses_class_name() {
    let output = run(vec![class_decl(
        "C",
        Some(ident("B")),
        vec![method(
            "method",
            "m",
            vec![],
            vec![expr_stmt(call(member(super_node(), "m"), vec![]))],
        )],
    )]);

    let class_meta = &output.functions[0];
    assert_eq!(class_meta.kind, livepack_instrument::FnKind::Class);
    assert!(class_meta.has_super_class);
    assert!(class_meta.global_names.contains(&"B".to_owned()));
    assert!(matches!(
        class_meta.super_target,
        Some(livepack_instrument::SuperTargetMeta::ClassName { ref name }) if name == "C"
    ));

    let m = &class_meta.children[0];
    assert!(m.is_method);
    assert_eq!(m.amendments.len(), 1);
    assert_eq!(m.amendments[0].kind, livepack_instrument::AmendmentKind::SuperExpression);
    assert!(m.scopes.iter().any(|scope| scope.vars.contains_key("super")));
    assert!(matches!(
        m.super_target,
        Some(livepack_instrument::SuperTargetMeta::ClassName { ref name }) if name == "C"
    ));

    let program = output.program_json();
    assert!(
        all_ident_names(&program).iter().all(|name| !name.contains("_temp_")),
        "a named class never needs a temp slot"
    );
    // A constructor was synthesized to host the class's tracker.
    let ctors = find_nodes(&program, &|node| {
        node["type"] == "MethodDefinition" && node["kind"] == "constructor"
    });
    assert_eq!(ctors.len(), 1);
    let ctor_body = ctors[0]["value"]["body"]["body"].as_array().unwrap();
    assert_eq!(ctor_body[0]["expression"]["callee"]["name"], "livepack_tracker");
    // Derived-class default behavior is preserved: super(...args) follows.
    assert_eq!(ctor_body[1]["expression"]["callee"]["type"], "Super");
}

// =============================================================================
// 4. Object method with super (S4)
// =============================================================================

/// `const o = { m(){ return super.m(); } };` — the enclosing block gains a
/// temp slot and the object is assigned through it.
#[test]
fn object_method_super_allocates_temp_slot() {
    let output = run(vec![json!({
        "type": "VariableDeclaration",
        "kind": "const",
        "declarations": [{
            "type": "VariableDeclarator",
            "id": ident("o"),
            "init": {
                "type": "ObjectExpression",
                "properties": [object_method("m", vec![], vec![return_stmt(call(member(super_node(), "m"), vec![]))])],
            },
        }],
    })]);

    let m = &output.functions[0];
    assert!(matches!(
        m.super_target,
        Some(livepack_instrument::SuperTargetMeta::Temp { ref name }) if name == "livepack_temp_0"
    ));
    assert_eq!(m.amendments[0].kind, livepack_instrument::AmendmentKind::SuperExpression);

    let program = output.program_json();
    // The temp is declared at program level (the object sits in the root
    // block) and the initializer routes through it.
    let temp_decls = find_nodes(&program, &|node| {
        node["type"] == "VariableDeclaration"
            && node["kind"] == "let"
            && node["declarations"][0]["id"]["name"] == "livepack_temp_0"
    });
    assert_eq!(temp_decls.len(), 1);
    let o_decl = find_nodes(&program, &|node| {
        node["type"] == "VariableDeclarator" && node["id"]["name"] == "o"
    });
    let init = &o_decl[0]["init"];
    assert_eq!(init["type"], "AssignmentExpression");
    assert_eq!(init["left"]["name"], "livepack_temp_0");
    assert_eq!(init["right"]["type"], "ObjectExpression");
}

// =============================================================================
// 5. Direct eval (S5)
// =============================================================================

/// `function f(){ var x = 1; eval("x"); return x; }` — the eval argument is
/// wrapped in `preval` with the full visible-binding list.
#[test]
fn direct_eval_wraps_argument_in_preval() {
    let output = run(vec![fn_decl(
        "f",
        vec![],
        vec![
            var_decl("var", "x", num(1)),
            expr_stmt(call(ident("eval"), vec![str_lit("x")])),
            return_stmt(ident("x")),
        ],
    )]);

    let f = &output.functions[0];
    assert!(f.contains_eval);
    assert!(output.eval_used);

    let program = output.program_json();
    let prevals = calls_to(&program, "livepack_preval");
    assert_eq!(prevals.len(), 1);
    let args = prevals[0]["arguments"].as_array().unwrap();
    assert_eq!(args[0]["value"], "x", "the user's code argument comes first");

    // Binding list: every statically visible binding, outermost block first.
    let entries = args[1]["elements"].as_array().unwrap();
    let first = entries[0]["elements"].as_array().unwrap();
    assert_eq!(first[0]["value"], "f");
    assert_eq!(first[1]["value"], 1);
    assert_eq!(first[3]["value"], "module");
    let second = entries[1]["elements"].as_array().unwrap();
    assert_eq!(second[0]["value"], "x");
    assert_eq!(second[1]["value"], 3, "x lives in f's body block");
    assert_eq!(second[4]["value"], false, "x is not const");

    assert_eq!(args[2]["value"], false, "sloppy mode");
    assert_eq!(args[3]["type"], "ArrayExpression", "argNames applies inside a function");

    // The callee stays a bare `eval` so the call remains direct.
    let eval_calls = find_nodes(&program, &|node| {
        node["type"] == "CallExpression" && node["callee"]["name"] == "eval"
    });
    assert_eq!(eval_calls.len(), 1);

    // The eval helper prologue is emitted.
    let eval_prologue = find_nodes(&program, &|node| {
        node["type"] == "VariableDeclaration"
            && node["declarations"][0]["id"]["type"] == "ArrayPattern"
            && node["declarations"][0]["id"]["elements"][0]["name"] == "livepack_eval"
    });
    assert_eq!(eval_prologue.len(), 1);
}

/// Direct eval forces every visible binding into the captures of every
/// enclosing function.
#[test]
fn eval_escalation_captures_visible_bindings() {
    let output = run(vec![fn_decl(
        "f",
        vec![],
        vec![expr_stmt(call(ident("eval"), vec![str_lit("x")]))],
    )]);
    let f = &output.functions[0];
    // `f` itself is visible at the call site and becomes a mandatory capture.
    assert!(f.scopes.iter().any(|scope| scope.vars.contains_key("f")));
    assert!(f.scopes[0].vars["f"].is_function_name);
}

// =============================================================================
// 6. Parameter rewrite (S6)
// =============================================================================

/// `function h(a, b = a){ return a + b; }` — parameters move to temps, the
/// body reconstructs them in order, and arity is preserved.
#[test]
fn complex_params_are_hoisted_into_the_body() {
    let output = run(vec![fn_decl(
        "h",
        vec![
            ident("a"),
            json!({"type": "AssignmentPattern", "left": ident("b"), "right": ident("a")}),
        ],
        vec![return_stmt(json!({
            "type": "BinaryExpression", "operator": "+", "left": ident("a"), "right": ident("b"),
        }))],
    )]);
    let program = output.program_json();
    let h = &find_nodes(&program, &|node| {
        node["type"] == "FunctionDeclaration" && node["id"]["name"] == "h"
    })[0];

    let params = h["params"].as_array().unwrap();
    assert_eq!(params.len(), 2);
    assert_eq!(params[0]["name"], "livepack_temp_0");
    assert_eq!(params[1]["type"], "AssignmentPattern");
    assert_eq!(params[1]["left"]["name"], "livepack_temp_1");
    // The tracker rides the first default; the default value is untouched
    // behind it.
    assert_eq!(params[1]["right"]["type"], "LogicalExpression");
    assert_eq!(params[1]["right"]["operator"], "||");
    assert_eq!(params[1]["right"]["left"]["callee"]["name"], "livepack_tracker");
    assert_eq!(params[1]["right"]["right"]["name"], "undefined");

    // Arity: one parameter before the first default, as in the original.
    let simple_prefix = params
        .iter()
        .take_while(|param| param["type"] == "Identifier")
        .count();
    assert_eq!(simple_prefix, 1);

    // Reconstruction: a single let, in parameter order, defaults lazy.
    let body = h["body"]["body"].as_array().unwrap();
    assert_eq!(body[0]["type"], "VariableDeclaration");
    assert_eq!(body[0]["kind"], "let");
    let declarators = body[0]["declarations"].as_array().unwrap();
    assert_eq!(declarators[0]["id"]["name"], "a");
    assert_eq!(declarators[0]["init"]["name"], "livepack_temp_0");
    assert_eq!(declarators[1]["id"]["name"], "b");
    let cond = &declarators[1]["init"];
    assert_eq!(cond["type"], "ConditionalExpression");
    assert_eq!(cond["test"]["operator"], "!==");
    assert_eq!(cond["alternate"]["name"], "a");
    assert_eq!(body[1]["type"], "ReturnStatement");
}
