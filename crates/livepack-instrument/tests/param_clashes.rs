//! Parameter hoisting against body declarations that reuse or shadow names
//! the moved parameters need.

mod common;

use common::*;
use pretty_assertions::assert_eq;
use serde_json::json;

fn f_body<'a>(program: &'a serde_json::Value) -> &'a Vec<serde_json::Value> {
    fn_body(program, "f")
}

/// `function f(x = y){ var y = 1; return [x, y]; }` — the default reads the
/// outer `y`; the body's distinct `var y` is renamed out of the way and its
/// declaration becomes an assignment against a head `let`.
#[test]
fn body_var_shadowing_a_param_default_is_renamed() {
    let output = run(vec![fn_decl(
        "f",
        vec![json!({"type": "AssignmentPattern", "left": ident("x"), "right": ident("y")})],
        vec![
            var_decl("var", "y", num(1)),
            return_stmt(json!({"type": "ArrayExpression", "elements": [ident("x"), ident("y")]})),
        ],
    )]);
    let f = &output.functions[0];
    // The default's `y` resolves outside the function.
    assert!(f.global_names.contains(&"y".to_owned()));
    // The renamed binding's occurrence sites are recorded for downstream
    // renaming: the declaration and the array reference.
    assert_eq!(f.internal_vars["y"].len(), 2);

    let program = output.program_json();
    let body = f_body(&program);
    // Reconstruction, lifted let, converted assignment, original return.
    assert_eq!(body[0]["kind"], "let");
    assert_eq!(body[0]["declarations"][0]["id"]["name"], "x");
    assert_eq!(body[1]["kind"], "let");
    assert_eq!(body[1]["declarations"][0]["id"]["name"], "livepack_temp_1");
    assert_eq!(body[2]["expression"]["type"], "AssignmentExpression");
    assert_eq!(body[2]["expression"]["left"]["name"], "livepack_temp_1");
    assert_eq!(body[3]["type"], "ReturnStatement");
    let elements = body[3]["argument"]["elements"].as_array().unwrap();
    assert_eq!(elements[0]["name"], "x");
    assert_eq!(elements[1]["name"], "livepack_temp_1");
    // The default expression still reads the outer `y`.
    let recon_default = &body[0]["declarations"][0]["init"]["alternate"];
    assert_eq!(recon_default["name"], "y");
}

/// A body function declaration shadowing a name used in a parameter default
/// hoists through a wrapper so its source lines survive.
#[test]
fn body_fn_decl_shadowing_a_param_default_hoists_via_wrapper() {
    let output = run(vec![fn_decl(
        "f",
        vec![json!({"type": "AssignmentPattern", "left": ident("x"), "right": ident("g")})],
        vec![fn_decl("g", vec![], vec![]), return_stmt(ident("x"))],
    )]);
    let program = output.program_json();
    let body = f_body(&program);

    assert_eq!(body[0]["declarations"][0]["id"]["name"], "x");
    assert_eq!(body[1]["declarations"][0]["id"]["name"], "livepack_temp_1");
    // The wrapper call runs at the head, before any body code.
    assert_eq!(body[2]["expression"]["callee"]["name"], "livepack_temp_2");
    // The wrapper declaration holds the original function as an expression
    // that keeps its own name.
    assert_eq!(body[3]["type"], "FunctionDeclaration");
    assert_eq!(body[3]["id"]["name"], "livepack_temp_2");
    let assignment = &body[3]["body"]["body"][0]["expression"];
    assert_eq!(assignment["left"]["name"], "livepack_temp_1");
    assert_eq!(assignment["right"]["type"], "FunctionExpression");
    assert_eq!(assignment["right"]["id"]["name"], "g");
    assert_eq!(body[4]["type"], "ReturnStatement");
}

/// Parameter names re-declared as body `var`s keep their name (same
/// binding); only the declaration form changes.
#[test]
fn body_var_redeclaring_a_param_converts_without_rename() {
    let output = run(vec![fn_decl(
        "f",
        vec![json!({"type": "ObjectPattern", "properties": [{
            "type": "Property", "kind": "init", "computed": false, "shorthand": true,
            "key": ident("x"), "value": ident("x"),
        }]})],
        vec![var_decl("var", "x", num(1)), return_stmt(ident("x"))],
    )]);
    let program = output.program_json();
    let body = f_body(&program);
    // Reconstruction binds x from the temp.
    assert_eq!(body[0]["kind"], "let");
    // The var became an assignment to the same name.
    assert_eq!(body[1]["expression"]["type"], "AssignmentExpression");
    assert_eq!(body[1]["expression"]["left"]["name"], "x");
    assert_eq!(body[2]["type"], "ReturnStatement");
    assert_eq!(body[2]["argument"]["name"], "x");
}

/// Direct eval in one method must not reach the class's shared record: the
/// constructor's scope chain never passes through a sibling method, so its
/// parameter rewrite still runs.
#[test]
fn method_eval_does_not_disable_the_constructor_rewrite() {
    let output = run(vec![class_decl(
        "C",
        None,
        vec![
            method(
                "constructor",
                "constructor",
                vec![
                    ident("a"),
                    json!({"type": "ObjectPattern", "properties": [{
                        "type": "Property", "kind": "init", "computed": false, "shorthand": true,
                        "key": ident("b"), "value": ident("b"),
                    }]}),
                ],
                vec![],
            ),
            method("method", "m", vec![], vec![expr_stmt(call(ident("eval"), vec![str_lit("x")]))]),
        ],
    )]);
    let class_meta = &output.functions[0];
    assert!(!class_meta.contains_eval, "the eval belongs to the method, not the class record");
    assert!(class_meta.children[0].contains_eval, "the method itself is flagged");

    let program = output.program_json();
    let ctors = find_nodes(&program, &|node| {
        node["type"] == "MethodDefinition" && node["kind"] == "constructor"
    });
    let params = ctors[0]["value"]["params"].as_array().unwrap();
    assert_eq!(params[0]["name"], "livepack_temp_0");
    assert_eq!(params[1]["name"], "livepack_temp_1");
    let ctor_body = ctors[0]["value"]["body"]["body"].as_array().unwrap();
    // Tracker first, then the reconstruction covering both parameters.
    assert_eq!(ctor_body[0]["expression"]["callee"]["name"], "livepack_tracker");
    assert_eq!(ctor_body[1]["kind"], "let");
    assert_eq!(ctor_body[1]["declarations"][0]["id"]["name"], "a");
    assert_eq!(ctor_body[1]["declarations"][1]["id"]["type"], "ObjectPattern");
}

/// Functions containing direct eval keep their parameters in place; only the
/// tracker rides the first default.
#[test]
fn direct_eval_disables_the_param_rewrite() {
    let output = run(vec![fn_decl(
        "f",
        vec![json!({"type": "AssignmentPattern", "left": ident("a"), "right": num(1)})],
        vec![expr_stmt(call(ident("eval"), vec![str_lit("a")]))],
    )]);
    assert!(output.functions[0].contains_eval);
    let program = output.program_json();
    let f = &find_nodes(&program, &|node| {
        node["type"] == "FunctionDeclaration" && node["id"]["name"] == "f"
    })[0];
    let params = f["params"].as_array().unwrap();
    assert_eq!(params[0]["left"]["name"], "a", "the parameter is not moved");
    assert_eq!(params[0]["right"]["left"]["callee"]["name"], "livepack_tracker");
    assert_eq!(params[0]["right"]["right"]["value"], 1);
    // No reconstruction let in the body.
    let body = f_body(&program);
    assert!(body.iter().all(|stmt| stmt["kind"] != "let"));
}
