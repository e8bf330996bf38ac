//! Constructors for injected AST nodes.
//!
//! Everything built here has no source location (injected code is
//! synthetic) and identifiers built from an [`InternalName`] carry the
//! internal marker so later passes skip them.

use crate::ident::{IdentTable, InternalName};

use super::{
    ArrayExpr, ArrayPat, AssignExpr, BinExpr, BlockStmt, CallExpr, CondExpr, Expr, ExprStmt, FnBody, FnNode, FnTag,
    Ident, Lit, LogicalExpr, MemberExpr, NodeBase, ObjectExpr, ObjectMember, Pat, Property, PropKind, ReturnStmt,
    Stmt, VarDecl, VarDeclKind, VarDeclarator,
};

/// A plain identifier node, e.g. a reference to a user binding or to
/// `require`/`module` in injected code.
pub fn ident(name: impl Into<String>) -> Ident {
    Ident {
        node_type: super::IdentTag,
        base: NodeBase::default(),
        name: name.into(),
        internal: None,
        binding_hint: None,
    }
}

/// An injected identifier with the internal marker set. The rendered name is
/// provisional; the finalize pass rewrites it if the prefix counter moved.
pub fn internal_ident(name: InternalName) -> Ident {
    Ident {
        node_type: super::IdentTag,
        base: NodeBase::default(),
        name: IdentTable::provisional(&name),
        internal: Some(name),
        binding_hint: None,
    }
}

pub fn ident_expr(name: impl Into<String>) -> Expr {
    Expr::Ident(ident(name))
}

pub fn internal_ident_expr(name: InternalName) -> Expr {
    Expr::Ident(internal_ident(name))
}

pub fn str_lit(value: impl Into<String>) -> Expr {
    Expr::Lit(Lit {
        node_type: super::LitTag,
        base: NodeBase::default(),
        value: serde_json::Value::String(value.into()),
        raw: None,
        regex: None,
        bigint: None,
    })
}

pub fn num_lit(value: u32) -> Expr {
    Expr::Lit(Lit {
        node_type: super::LitTag,
        base: NodeBase::default(),
        value: serde_json::Value::from(value),
        raw: None,
        regex: None,
        bigint: None,
    })
}

pub fn bool_lit(value: bool) -> Expr {
    Expr::Lit(Lit {
        node_type: super::LitTag,
        base: NodeBase::default(),
        value: serde_json::Value::Bool(value),
        raw: None,
        regex: None,
        bigint: None,
    })
}

pub fn null_lit() -> Expr {
    Expr::Lit(Lit {
        node_type: super::LitTag,
        base: NodeBase::default(),
        value: serde_json::Value::Null,
        raw: None,
        regex: None,
        bigint: None,
    })
}

/// The expression `undefined` (the global, not a literal).
pub fn undefined_expr() -> Expr {
    ident_expr("undefined")
}

pub fn array_expr(elements: Vec<Expr>) -> Expr {
    Expr::Array(ArrayExpr {
        node_type: super::ArrayExprTag,
        base: NodeBase::default(),
        elements: elements.into_iter().map(Some).collect(),
    })
}

/// `{ key: value }` with a single non-computed property.
pub fn object_expr_single(key: Ident, value: Expr) -> Expr {
    Expr::Object(ObjectExpr {
        node_type: super::ObjectExprTag,
        base: NodeBase::default(),
        properties: vec![ObjectMember::Prop(Box::new(Property {
            node_type: super::PropertyTag,
            base: NodeBase::default(),
            key: Expr::Ident(key),
            value,
            kind: PropKind::Init,
            computed: false,
            shorthand: false,
            method: false,
        }))],
    })
}

/// `{ "filename": "source", ... }` style object from string pairs.
pub fn object_expr_str_map<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Expr {
    Expr::Object(ObjectExpr {
        node_type: super::ObjectExprTag,
        base: NodeBase::default(),
        properties: pairs
            .into_iter()
            .map(|(key, value)| {
                ObjectMember::Prop(Box::new(Property {
                    node_type: super::PropertyTag,
                    base: NodeBase::default(),
                    key: str_lit(key),
                    value: str_lit(value),
                    kind: PropKind::Init,
                    computed: false,
                    shorthand: false,
                    method: false,
                }))
            })
            .collect(),
    })
}

pub fn call(callee: Expr, arguments: Vec<Expr>) -> Expr {
    Expr::Call(Box::new(CallExpr {
        node_type: super::CallExprTag,
        base: NodeBase::default(),
        callee,
        arguments,
        optional: false,
    }))
}

/// Non-computed member access `object.name`.
pub fn member(object: Expr, name: impl Into<String>) -> Expr {
    Expr::Member(Box::new(MemberExpr {
        node_type: super::MemberExprTag,
        base: NodeBase::default(),
        object,
        property: ident_expr(name),
        computed: false,
        optional: false,
    }))
}

/// Plain assignment `target = value`.
pub fn assign(target: Ident, value: Expr) -> Expr {
    Expr::Assign(Box::new(AssignExpr {
        node_type: super::AssignExprTag,
        base: NodeBase::default(),
        operator: "=".to_owned(),
        left: Pat::Ident(target),
        right: value,
    }))
}

pub fn binary(operator: &str, left: Expr, right: Expr) -> Expr {
    Expr::Binary(Box::new(BinExpr {
        node_type: super::BinExprTag,
        base: NodeBase::default(),
        operator: operator.to_owned(),
        left,
        right,
    }))
}

pub fn logical(operator: &str, left: Expr, right: Expr) -> Expr {
    Expr::Logical(Box::new(LogicalExpr {
        node_type: super::LogicalExprTag,
        base: NodeBase::default(),
        operator: operator.to_owned(),
        left,
        right,
    }))
}

pub fn cond(test: Expr, consequent: Expr, alternate: Expr) -> Expr {
    Expr::Cond(Box::new(CondExpr {
        node_type: super::CondExprTag,
        base: NodeBase::default(),
        test,
        consequent,
        alternate,
    }))
}

pub fn expr_stmt(expression: Expr) -> Stmt {
    Stmt::Expr(ExprStmt {
        node_type: super::ExprStmtTag,
        base: NodeBase::default(),
        expression,
        directive: None,
    })
}

pub fn return_stmt(argument: Expr) -> Stmt {
    Stmt::Return(ReturnStmt {
        node_type: super::ReturnStmtTag,
        base: NodeBase::default(),
        argument: Some(argument),
    })
}

pub fn block_stmt(body: Vec<Stmt>) -> BlockStmt {
    BlockStmt {
        node_type: super::BlockStmtTag,
        base: NodeBase::default(),
        body,
    }
}

pub fn declarator(id: Pat, init: Option<Expr>) -> VarDeclarator {
    VarDeclarator {
        node_type: super::VarDeclaratorTag,
        base: NodeBase::default(),
        id,
        init,
    }
}

pub fn var_decl(kind: VarDeclKind, declarations: Vec<VarDeclarator>) -> VarDecl {
    VarDecl {
        node_type: super::VarDeclTag,
        base: NodeBase::default(),
        kind,
        declarations,
    }
}

/// `const <name> = <init>;`
pub fn const_decl(name: Ident, init: Expr) -> Stmt {
    Stmt::VarDecl(var_decl(
        VarDeclKind::Const,
        vec![declarator(Pat::Ident(name), Some(init))],
    ))
}

/// `let a, b, c;` (uninitialized).
pub fn let_decl_uninit(names: Vec<Ident>) -> Stmt {
    Stmt::VarDecl(var_decl(
        VarDeclKind::Let,
        names.into_iter().map(|name| declarator(Pat::Ident(name), None)).collect(),
    ))
}

/// `const [a, b, ...] = <init>;`
pub fn const_destructure(names: Vec<Ident>, init: Expr) -> Stmt {
    let pattern = Pat::Array(ArrayPat {
        node_type: super::ArrayPatTag,
        base: NodeBase::default(),
        elements: names.into_iter().map(|name| Some(Pat::Ident(name))).collect(),
    });
    Stmt::VarDecl(var_decl(VarDeclKind::Const, vec![declarator(pattern, Some(init))]))
}

/// A zero-argument arrow with an expression body: `() => <expr>`.
pub fn arrow_expr(body: Expr) -> Expr {
    Expr::Fn(Box::new(FnNode {
        node_type: FnTag::ArrowFunctionExpression,
        base: NodeBase::default(),
        id: None,
        params: Vec::new(),
        body: FnBody::Expr(Box::new(body)),
        generator: false,
        is_async: false,
        expression: Some(true),
    }))
}

/// A zero-argument function declaration: `function <name>() { <body> }`.
pub fn fn_decl(name: Ident, body: Vec<Stmt>) -> Stmt {
    Stmt::Fn(Box::new(FnNode {
        node_type: FnTag::FunctionDeclaration,
        base: NodeBase::default(),
        id: Some(name),
        params: Vec::new(),
        body: FnBody::Block(block_stmt(body)),
        generator: false,
        is_async: false,
        expression: None,
    }))
}

/// `require("<path>")` — the module-system binding, not an injected name.
pub fn require_call(path: &str) -> Expr {
    call(ident_expr("require"), vec![str_lit(path)])
}

/// Swaps an expression out of the tree, leaving a placeholder. Used by
/// rewrites that wrap an existing expression in a new parent.
pub fn take_expr(slot: &mut Expr) -> Expr {
    std::mem::replace(slot, null_lit())
}

pub fn empty_stmt() -> Stmt {
    Stmt::Empty(super::EmptyStmt {
        node_type: super::EmptyStmtTag,
        base: NodeBase::default(),
    })
}

/// Swaps a statement out of the tree, leaving an empty statement. Used by
/// rewrites that wrap an existing statement in a new block.
pub fn take_stmt(slot: &mut Stmt) -> Stmt {
    std::mem::replace(slot, empty_stmt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_idents_carry_the_marker_and_provisional_name() {
        let node = internal_ident(InternalName::ScopeId(3));
        assert!(node.is_internal());
        assert_eq!(node.name, "livepack_scopeId_3");
        // The marker must not survive serialization.
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json, serde_json::json!({"type": "Identifier", "name": "livepack_scopeId_3"}));
    }

    #[test]
    fn const_destructure_builds_array_pattern() {
        let stmt = const_destructure(
            vec![internal_ident(InternalName::Tracker), internal_ident(InternalName::GetScopeId)],
            require_call("livepack/init.js"),
        );
        let json = serde_json::to_value(&stmt).unwrap();
        assert_eq!(json["type"], "VariableDeclaration");
        assert_eq!(json["kind"], "const");
        assert_eq!(json["declarations"][0]["id"]["type"], "ArrayPattern");
        assert_eq!(json["declarations"][0]["init"]["callee"]["name"], "require");
    }
}
