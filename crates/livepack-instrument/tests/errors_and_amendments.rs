//! Error taxonomy and amendment recording: const violations, unsupported
//! syntax, duplicate imports, and the super-target fallbacks.

mod common;

use common::*;
use livepack_instrument::{AmendmentKind, ErrorKind, SuperTargetMeta};
use pretty_assertions::assert_eq;
use serde_json::json;

// =============================================================================
// Const violations
// =============================================================================

/// Writing a captured `const` records an amendment instead of a write
/// dependency.
#[test]
fn const_write_records_amendment_not_dependency() {
    let output = run(vec![
        var_decl("const", "c", num(1)),
        fn_decl("f", vec![], vec![expr_stmt(assign(ident("c"), num(2)))]),
    ]);
    let f = &output.functions[0];
    assert_eq!(f.amendments.len(), 1);
    assert_eq!(f.amendments[0].kind, AmendmentKind::ConstViolationConst);
    assert!(f.scopes.is_empty(), "a pure write to a const is not a capture");
}

/// A compound write still records the read half of the dependency.
#[test]
fn compound_const_write_keeps_the_read() {
    let output = run(vec![
        var_decl("const", "c", num(1)),
        fn_decl(
            "f",
            vec![],
            vec![expr_stmt(json!({
                "type": "AssignmentExpression", "operator": "+=", "left": ident("c"), "right": num(2),
            }))],
        ),
    ]);
    let f = &output.functions[0];
    assert_eq!(f.amendments[0].kind, AmendmentKind::ConstViolationConst);
    let var = &f.scopes[0].vars["c"];
    assert!(var.is_read_from);
    assert!(!var.is_assigned_to);
}

/// Writing a function expression's own name fails silently in sloppy mode
/// and throws in strict mode; the amendment kind records which.
#[test]
fn fn_expr_name_write_kind_follows_strictness() {
    let sloppy = run(vec![var_decl(
        "var",
        "g",
        json!({
            "type": "FunctionExpression",
            "id": ident("h"),
            "params": [],
            "body": block(vec![expr_stmt(assign(ident("h"), num(1)))]),
            "generator": false,
            "async": false,
        }),
    )]);
    assert_eq!(sloppy.functions[0].amendments[0].kind, AmendmentKind::ConstViolationFnSilent);

    let strict = run(vec![var_decl(
        "var",
        "g",
        json!({
            "type": "FunctionExpression",
            "id": ident("h"),
            "params": [],
            "body": block(vec![
                expr_stmt(json!({"type": "Literal", "value": "use strict"})),
                expr_stmt(assign(ident("h"), num(1))),
            ]),
            "generator": false,
            "async": false,
        }),
    )]);
    assert_eq!(
        strict.functions[0].amendments[0].kind,
        AmendmentKind::ConstViolationFnThrowing
    );
}

// =============================================================================
// Super-target fallbacks
// =============================================================================

/// An anonymous class in a `const` declarator uses that binding as its super
/// target; no temp appears.
#[test]
fn anonymous_class_in_const_declarator_uses_the_binding() {
    let output = run(vec![json!({
        "type": "VariableDeclaration",
        "kind": "const",
        "declarations": [{
            "type": "VariableDeclarator",
            "id": ident("C"),
            "init": {
                "type": "ClassExpression",
                "id": null,
                "superClass": ident("B"),
                "body": {"type": "ClassBody", "body": [method(
                    "method", "m", vec![],
                    vec![expr_stmt(call(member(super_node(), "m"), vec![]))],
                )]},
            },
        }],
    })]);
    let class_meta = &output.functions[0];
    assert!(matches!(
        class_meta.super_target,
        Some(SuperTargetMeta::Binding { ref name }) if name == "C"
    ));
    let program = output.program_json();
    assert!(all_ident_names(&program).iter().all(|name| !name.contains("_temp_")));
}

/// An anonymous class assigned to a plain identifier takes a temp and keeps
/// its inferred name through `{x: class …}.x`.
#[test]
fn anonymous_class_in_assignment_wraps_to_preserve_name() {
    let output = run(vec![expr_stmt(assign(
        ident("x"),
        json!({
            "type": "ClassExpression",
            "id": null,
            "superClass": ident("B"),
            "body": {"type": "ClassBody", "body": [method(
                "method", "m", vec![],
                vec![expr_stmt(call(member(super_node(), "m"), vec![]))],
            )]},
        }),
    ))]);
    let class_meta = &output.functions[0];
    assert!(matches!(
        class_meta.super_target,
        Some(SuperTargetMeta::Temp { ref name }) if name == "livepack_temp_0"
    ));

    let program = output.program_json();
    let outer = &find_nodes(&program, &|node| {
        node["type"] == "AssignmentExpression" && node["left"]["name"] == "x"
    })[0];
    let wrapped = &outer["right"];
    assert_eq!(wrapped["type"], "AssignmentExpression");
    assert_eq!(wrapped["left"]["name"], "livepack_temp_0");
    assert_eq!(wrapped["right"]["type"], "MemberExpression");
    assert_eq!(wrapped["right"]["property"]["name"], "x");
    assert_eq!(wrapped["right"]["object"]["type"], "ObjectExpression");
}

/// Super calls in a derived constructor record the first-statement index and
/// whether it is also the last statement.
#[test]
fn derived_constructor_records_super_call_position() {
    let output = run(vec![class_decl(
        "C",
        Some(ident("B")),
        vec![method(
            "constructor",
            "constructor",
            vec![],
            vec![expr_stmt(call(super_node(), vec![]))],
        )],
    )]);
    let class_meta = &output.functions[0];
    assert_eq!(class_meta.first_super_statement_index, Some(0));
    assert!(class_meta.returns_super);
    assert_eq!(class_meta.amendments[0].kind, AmendmentKind::SuperCall);
    // The super-call site itself is recorded for the `this` reroute.
    assert_eq!(class_meta.internal_vars["this"].len(), 1);
}

#[test]
fn derived_constructor_super_not_last_clears_returns_super() {
    let output = run(vec![class_decl(
        "C",
        Some(ident("B")),
        vec![method(
            "constructor",
            "constructor",
            vec![],
            vec![
                expr_stmt(call(super_node(), vec![])),
                expr_stmt(assign(member(json!({"type": "ThisExpression"}), "x"), num(1))),
            ],
        )],
    )]);
    let class_meta = &output.functions[0];
    assert_eq!(class_meta.first_super_statement_index, Some(0));
    assert!(!class_meta.returns_super);
    // `this` after super in a derived constructor is recorded for rerouting.
    assert!(class_meta.internal_vars.contains_key("this"));
}

// =============================================================================
// Errors
// =============================================================================

/// Unknown node types are a hard error, never a silent pass-through.
#[test]
fn unknown_statement_type_is_rejected() {
    let err = try_run(vec![json!({
        "type": "WithStatement",
        "object": ident("o"),
        "body": block(vec![]),
    })])
    .expect_err("with statements are unsupported");
    assert_eq!(err.kind(), ErrorKind::UnexpectedNode);
    assert!(err.message().contains("WithStatement"), "message names the node: {err}");
}

/// Public class fields are ordinary members; their initializers take part
/// in capture analysis like any other expression in the class.
#[test]
fn public_class_field_initializers_record_captures() {
    let output = run(vec![fn_decl(
        "f",
        vec![ident("o")],
        vec![class_decl(
            "C",
            None,
            vec![json!({
                "type": "PropertyDefinition",
                "key": ident("x"),
                "value": ident("o"),
                "computed": false,
                "static": false,
            })],
        )],
    )]);
    let class_meta = &output.functions[0].children[0];
    assert_eq!(class_meta.scopes.len(), 1);
    assert_eq!(class_meta.scopes[0].block_id, 2, "o lives in f's parameter block");
    assert!(class_meta.scopes[0].vars.contains_key("o"));
}

/// Private members (fields and methods) are unsupported syntax.
#[test]
fn private_class_members_are_rejected() {
    let private_key = json!({"type": "PrivateIdentifier", "name": "x"});
    let err = try_run(vec![class_decl(
        "C",
        None,
        vec![json!({
            "type": "PropertyDefinition",
            "key": private_key,
            "value": num(1),
            "computed": false,
            "static": false,
        })],
    )])
    .expect_err("private fields are unsupported");
    assert_eq!(err.kind(), ErrorKind::UnexpectedNode);
    assert!(err.message().contains("PrivateIdentifier"), "message names the node: {err}");

    let err = try_run(vec![class_decl(
        "C",
        None,
        vec![json!({
            "type": "MethodDefinition",
            "kind": "method",
            "computed": false,
            "static": false,
            "key": {"type": "PrivateIdentifier", "name": "m"},
            "value": {
                "type": "FunctionExpression",
                "id": null,
                "params": [],
                "body": block(vec![]),
                "generator": false,
                "async": false,
            },
        })],
    )])
    .expect_err("private methods are unsupported");
    assert_eq!(err.kind(), ErrorKind::UnexpectedNode);
}

#[test]
fn unknown_class_member_is_rejected() {
    let err = try_run(vec![class_decl(
        "C",
        None,
        vec![json!({
            "type": "StaticBlock",
            "body": [],
        })],
    )])
    .expect_err("static blocks are unsupported");
    assert_eq!(err.kind(), ErrorKind::UnexpectedNode);
    assert!(err.message().contains("StaticBlock"), "message names the node: {err}");
}

/// An import binding a name that is already bound is an error.
#[test]
fn duplicate_import_name_is_rejected() {
    let import = |local: &str| {
        json!({
            "type": "ImportDeclaration",
            "specifiers": [{
                "type": "ImportSpecifier",
                "local": ident(local),
                "imported": ident(local),
            }],
            "source": {"type": "Literal", "value": "mod"},
        })
    };
    let err = try_run_module(vec![import("x"), import("x")]).expect_err("second import of x must fail");
    assert_eq!(err.kind(), ErrorKind::DuplicateImportName);
    assert!(err.message().contains('x'));
}

/// `super` with no enclosing method is invalid input.
#[test]
fn super_outside_a_method_is_rejected() {
    let err = try_run(vec![fn_decl(
        "f",
        vec![],
        vec![expr_stmt(member(super_node(), "x"))],
    )])
    .expect_err("super needs a home object");
    assert_eq!(err.kind(), ErrorKind::UnexpectedNode);
}

/// An arrow using `super` inside a sloppy method that redefines `arguments`
/// is explicitly unsupported.
#[test]
fn super_in_arrow_with_redefined_arguments_is_rejected() {
    let err = try_run(vec![expr_stmt(json!({
        "type": "ObjectExpression",
        "properties": [object_method(
            "m",
            vec![],
            vec![
                var_decl("var", "arguments", num(1)),
                return_stmt(arrow(vec![], member(super_node(), "x"))),
            ],
        )],
    }))])
    .expect_err("the rewriter cannot thread super through this shape");
    assert_eq!(err.kind(), ErrorKind::SuperInArrowRedefinedArguments);
}

/// A binding hint claiming a declaration that is nowhere visible is an
/// unresolvable reference.
#[test]
fn binding_hint_without_declaration_is_unresolvable() {
    let err = try_run(vec![fn_decl(
        "f",
        vec![],
        vec![return_stmt(json!({"type": "Identifier", "name": "ghost", "bindingHint": "let"}))],
    )])
    .expect_err("hinted binding has no declaration");
    assert_eq!(err.kind(), ErrorKind::BindingUnresolvable);
    assert!(err.message().contains("ghost"));
}

/// The module marker comment is prepended to every transformed program.
#[test]
fn transformed_marker_is_prepended() {
    let output = run(vec![]);
    let program = output.program_json();
    assert_eq!(program["leadingComments"][0]["value"], "livepack_track:transform");
}
