//! Shared helpers for building ESTree JSON inputs and querying instrumented
//! output.

use livepack_instrument::{instrument, InstrumentOutput, Options};
use serde_json::{json, Value};

/// Instruments a program built from JSON, with default script options.
pub fn run(body: Vec<Value>) -> InstrumentOutput {
    run_named(body, "test.js")
}

pub fn run_named(body: Vec<Value>, filename: &str) -> InstrumentOutput {
    let program = json!({"type": "Program", "sourceType": "script", "body": body});
    let options = Options::new(filename, "// source text");
    instrument(program, &options).expect("instrumentation should succeed")
}

pub fn try_run(body: Vec<Value>) -> Result<InstrumentOutput, livepack_instrument::InstrumentError> {
    let program = json!({"type": "Program", "sourceType": "script", "body": body});
    let options = Options::new("test.js", "// source text");
    instrument(program, &options)
}

pub fn try_run_module(body: Vec<Value>) -> Result<InstrumentOutput, livepack_instrument::InstrumentError> {
    let program = json!({"type": "Program", "sourceType": "module", "body": body});
    let options = Options::new("test.js", "// source text").with_source_type(livepack_instrument::SourceType::Module);
    instrument(program, &options)
}

// -- node builders ----------------------------------------------------------

pub fn ident(name: &str) -> Value {
    json!({"type": "Identifier", "name": name})
}

pub fn num(value: u32) -> Value {
    json!({"type": "Literal", "value": value})
}

pub fn str_lit(value: &str) -> Value {
    json!({"type": "Literal", "value": value})
}

pub fn expr_stmt(expression: Value) -> Value {
    json!({"type": "ExpressionStatement", "expression": expression})
}

pub fn return_stmt(argument: Value) -> Value {
    json!({"type": "ReturnStatement", "argument": argument})
}

pub fn block(body: Vec<Value>) -> Value {
    json!({"type": "BlockStatement", "body": body})
}

pub fn var_decl(kind: &str, name: &str, init: Value) -> Value {
    json!({
        "type": "VariableDeclaration",
        "kind": kind,
        "declarations": [{"type": "VariableDeclarator", "id": ident(name), "init": init}],
    })
}

pub fn fn_decl(name: &str, params: Vec<Value>, body: Vec<Value>) -> Value {
    json!({
        "type": "FunctionDeclaration",
        "id": ident(name),
        "params": params,
        "body": block(body),
        "generator": false,
        "async": false,
    })
}

pub fn arrow(params: Vec<Value>, body_expr: Value) -> Value {
    json!({
        "type": "ArrowFunctionExpression",
        "id": null,
        "params": params,
        "body": body_expr,
        "expression": true,
        "generator": false,
        "async": false,
    })
}

pub fn call(callee: Value, arguments: Vec<Value>) -> Value {
    json!({"type": "CallExpression", "callee": callee, "arguments": arguments, "optional": false})
}

pub fn member(object: Value, property: &str) -> Value {
    json!({"type": "MemberExpression", "object": object, "property": ident(property), "computed": false, "optional": false})
}

pub fn assign(target: Value, value: Value) -> Value {
    json!({"type": "AssignmentExpression", "operator": "=", "left": target, "right": value})
}

pub fn method(kind: &str, name: &str, params: Vec<Value>, body: Vec<Value>) -> Value {
    json!({
        "type": "MethodDefinition",
        "kind": kind,
        "computed": false,
        "static": false,
        "key": ident(name),
        "value": {
            "type": "FunctionExpression",
            "id": null,
            "params": params,
            "body": block(body),
            "generator": false,
            "async": false,
        },
    })
}

pub fn class_decl(name: &str, super_class: Option<Value>, members: Vec<Value>) -> Value {
    json!({
        "type": "ClassDeclaration",
        "id": ident(name),
        "superClass": super_class,
        "body": {"type": "ClassBody", "body": members},
    })
}

pub fn object_method(name: &str, params: Vec<Value>, body: Vec<Value>) -> Value {
    json!({
        "type": "Property",
        "kind": "init",
        "method": true,
        "computed": false,
        "shorthand": false,
        "key": ident(name),
        "value": {
            "type": "FunctionExpression",
            "id": null,
            "params": params,
            "body": block(body),
            "generator": false,
            "async": false,
        },
    })
}

pub fn super_node() -> Value {
    json!({"type": "Super"})
}

// -- output queries ---------------------------------------------------------

/// Every node (JSON object) in the tree satisfying the predicate.
pub fn find_nodes<'a>(value: &'a Value, pred: &dyn Fn(&Value) -> bool) -> Vec<&'a Value> {
    let mut found = Vec::new();
    collect_nodes(value, pred, &mut found);
    found
}

fn collect_nodes<'a>(value: &'a Value, pred: &dyn Fn(&Value) -> bool, out: &mut Vec<&'a Value>) {
    match value {
        Value::Object(map) => {
            if pred(value) {
                out.push(value);
            }
            for child in map.values() {
                collect_nodes(child, pred, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_nodes(item, pred, out);
            }
        }
        _ => {}
    }
}

/// All identifier names appearing anywhere in the tree.
pub fn all_ident_names(value: &Value) -> Vec<String> {
    find_nodes(value, &|node| node["type"] == "Identifier")
        .into_iter()
        .filter_map(|node| node["name"].as_str().map(str::to_owned))
        .collect()
}

/// The statements of a named function declaration in instrumented output.
pub fn fn_body<'a>(program: &'a Value, name: &str) -> &'a Vec<Value> {
    let functions = find_nodes(program, &|node| {
        node["type"] == "FunctionDeclaration" && node["id"]["name"] == name
    });
    assert_eq!(functions.len(), 1, "exactly one function named {name}");
    functions[0]["body"]["body"].as_array().expect("function has a block body")
}

/// Calls to an injected identifier whose name starts with the given prefix.
pub fn calls_to<'a>(program: &'a Value, callee_prefix: &str) -> Vec<&'a Value> {
    find_nodes(program, &|node| {
        node["type"] == "CallExpression"
            && node["callee"]["type"] == "Identifier"
            && node["callee"]["name"]
                .as_str()
                .is_some_and(|name| name.starts_with(callee_prefix))
    })
}
