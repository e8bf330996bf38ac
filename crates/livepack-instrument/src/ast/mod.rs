//! Typed model of the ESTree AST the host parser supplies.
//!
//! The instrumentor consumes and emits ESTree-shaped JSON; this module gives
//! that JSON a tagged-variant Rust form so every visitor dispatch is an
//! exhaustive `match`. Each node struct carries its `"type"` tag as a strict
//! marker field, and the node enums are untagged unions over those structs,
//! so dispatch during deserialization happens on the tag value each struct
//! demands. Node types outside the supported grammar (private class fields,
//! decorators, import attributes, future syntax) collect into
//! [`UnknownNode`]; visiting one is a hard `unexpected-node` error, never a
//! silent pass-through.
//!
//! Injected identifiers carry an [`internal`](Ident::internal) marker that
//! never serializes; later passes short-circuit on the marker rather than
//! comparing names.

pub mod build;

use serde::{Deserialize, Serialize};

use crate::{error::CodeLoc, ident::InternalName, options::SourceType};

/// Declares a unit marker type that serializes as a fixed `"type"` string and
/// refuses to deserialize from anything else.
macro_rules! node_tag {
    ($(#[$meta:meta])* $name:ident = $text:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct $name;

        impl Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str($text)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let tag = String::deserialize(deserializer)?;
                if tag == $text {
                    Ok(Self)
                } else {
                    Err(serde::de::Error::invalid_value(
                        serde::de::Unexpected::Str(&tag),
                        &$text,
                    ))
                }
            }
        }
    };
}

node_tag!(ProgramTag = "Program");
node_tag!(IdentTag = "Identifier");
node_tag!(LitTag = "Literal");
node_tag!(ExprStmtTag = "ExpressionStatement");
node_tag!(BlockStmtTag = "BlockStatement");
node_tag!(EmptyStmtTag = "EmptyStatement");
node_tag!(DebuggerStmtTag = "DebuggerStatement");
node_tag!(ReturnStmtTag = "ReturnStatement");
node_tag!(LabeledStmtTag = "LabeledStatement");
node_tag!(BreakStmtTag = "BreakStatement");
node_tag!(ContinueStmtTag = "ContinueStatement");
node_tag!(IfStmtTag = "IfStatement");
node_tag!(SwitchStmtTag = "SwitchStatement");
node_tag!(SwitchCaseTag = "SwitchCase");
node_tag!(ThrowStmtTag = "ThrowStatement");
node_tag!(TryStmtTag = "TryStatement");
node_tag!(CatchClauseTag = "CatchClause");
node_tag!(WhileStmtTag = "WhileStatement");
node_tag!(DoWhileStmtTag = "DoWhileStatement");
node_tag!(ForStmtTag = "ForStatement");
node_tag!(ForInStmtTag = "ForInStatement");
node_tag!(ForOfStmtTag = "ForOfStatement");
node_tag!(VarDeclTag = "VariableDeclaration");
node_tag!(VarDeclaratorTag = "VariableDeclarator");
node_tag!(ThisTag = "ThisExpression");
node_tag!(SuperTag = "Super");
node_tag!(ArrayExprTag = "ArrayExpression");
node_tag!(ObjectExprTag = "ObjectExpression");
node_tag!(PropertyTag = "Property");
node_tag!(SpreadTag = "SpreadElement");
node_tag!(UnaryExprTag = "UnaryExpression");
node_tag!(UpdateExprTag = "UpdateExpression");
node_tag!(BinExprTag = "BinaryExpression");
node_tag!(LogicalExprTag = "LogicalExpression");
node_tag!(AssignExprTag = "AssignmentExpression");
node_tag!(CondExprTag = "ConditionalExpression");
node_tag!(CallExprTag = "CallExpression");
node_tag!(NewExprTag = "NewExpression");
node_tag!(SeqExprTag = "SequenceExpression");
node_tag!(MemberExprTag = "MemberExpression");
node_tag!(YieldExprTag = "YieldExpression");
node_tag!(AwaitExprTag = "AwaitExpression");
node_tag!(ImportExprTag = "ImportExpression");
node_tag!(MetaPropertyTag = "MetaProperty");
node_tag!(ChainExprTag = "ChainExpression");
node_tag!(TemplateLitTag = "TemplateLiteral");
node_tag!(TemplateElementTag = "TemplateElement");
node_tag!(TaggedTemplateTag = "TaggedTemplateExpression");
node_tag!(ObjectPatTag = "ObjectPattern");
node_tag!(ArrayPatTag = "ArrayPattern");
node_tag!(RestTag = "RestElement");
node_tag!(AssignPatTag = "AssignmentPattern");
node_tag!(ClassBodyTag = "ClassBody");
node_tag!(MethodDefTag = "MethodDefinition");
node_tag!(PropertyDefTag = "PropertyDefinition");
node_tag!(ImportDeclTag = "ImportDeclaration");
node_tag!(ImportSpecTag = "ImportSpecifier");
node_tag!(ImportDefaultSpecTag = "ImportDefaultSpecifier");
node_tag!(ImportNamespaceSpecTag = "ImportNamespaceSpecifier");
node_tag!(ExportNamedTag = "ExportNamedDeclaration");
node_tag!(ExportDefaultTag = "ExportDefaultDeclaration");
node_tag!(ExportAllTag = "ExportAllDeclaration");
node_tag!(ExportSpecTag = "ExportSpecifier");

/// A line/column pair inside a `loc` object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pos {
    pub line: u32,
    pub column: u32,
}

impl Pos {
    pub fn code_loc(self) -> CodeLoc {
        CodeLoc::new(self.line, self.column)
    }
}

/// Source span of a node. `filename` is set only when a loc has been remapped
/// through an input source map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SrcSpan {
    pub start: Pos,
    pub end: Pos,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// Kind discriminator of an attached comment. Babel attaches
/// `CommentBlock`/`CommentLine`; Acorn-style tooling uses `Block`/`Line`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommentKind {
    CommentBlock,
    CommentLine,
    Block,
    Line,
}

/// A comment attached to a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(rename = "type")]
    pub kind: CommentKind,
    pub value: String,
}

impl Comment {
    pub fn block(value: impl Into<String>) -> Self {
        Self {
            kind: CommentKind::CommentBlock,
            value: value.into(),
        }
    }
}

/// Fields common to every node: location, byte offsets and attached comments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeBase {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<SrcSpan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<u32>,
    #[serde(default, rename = "leadingComments", skip_serializing_if = "Vec::is_empty")]
    pub leading_comments: Vec<Comment>,
    #[serde(default, rename = "innerComments", skip_serializing_if = "Vec::is_empty")]
    pub inner_comments: Vec<Comment>,
    #[serde(default, rename = "trailingComments", skip_serializing_if = "Vec::is_empty")]
    pub trailing_comments: Vec<Comment>,
}

impl NodeBase {
    /// Start position for error reporting, if the parser kept locations.
    pub fn start_loc(&self) -> Option<CodeLoc> {
        self.loc.as_ref().map(|span| span.start.code_loc())
    }
}

/// Binding-resolution hint the parser may attach to an identifier.
///
/// Consulted only where the parser's report is authoritative: the
/// function-name-in-body case and declarations synthesized upstream that the
/// block scan cannot see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BindingHint {
    Param,
    Var,
    Let,
    Const,
    Hoisted,
    Local,
    ModuleLocal,
    Unresolved,
}

/// An identifier occurrence or binding name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ident {
    #[serde(rename = "type")]
    pub node_type: IdentTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub name: String,
    /// Marker for injected identifiers; never serialized. Carries the
    /// structured name so the finalize pass re-renders it without parsing.
    #[serde(skip)]
    pub internal: Option<InternalName>,
    #[serde(default, rename = "bindingHint", skip_serializing_if = "Option::is_none")]
    pub binding_hint: Option<BindingHint>,
}

impl Ident {
    pub fn is_internal(&self) -> bool {
        self.internal.is_some()
    }
}

/// A literal. The value is kept as raw JSON to preserve number/string/regex
/// fidelity across the round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lit {
    #[serde(rename = "type")]
    pub node_type: LitTag,
    #[serde(flatten)]
    pub base: NodeBase,
    #[serde(default)]
    pub value: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<RegexLit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bigint: Option<String>,
}

impl Lit {
    pub fn as_str(&self) -> Option<&str> {
        self.value.as_str()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegexLit {
    pub pattern: String,
    pub flags: String,
}

/// A node the grammar tables do not cover. Keeps the raw type tag for error
/// messages and the remaining fields for faithful re-emission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnknownNode {
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<SrcSpan>,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, serde_json::Value>,
}

impl UnknownNode {
    pub fn start_loc(&self) -> Option<CodeLoc> {
        self.loc.as_ref().map(|span| span.start.code_loc())
    }
}

// ---------------------------------------------------------------------------
// Program
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    #[serde(rename = "type")]
    pub node_type: ProgramTag,
    #[serde(flatten)]
    pub base: NodeBase,
    #[serde(default, rename = "sourceType", skip_serializing_if = "Option::is_none")]
    pub source_type: Option<SourceType>,
    pub body: Vec<Stmt>,
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

/// A statement or module declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Stmt {
    Expr(ExprStmt),
    Block(BlockStmt),
    Empty(EmptyStmt),
    Debugger(DebuggerStmt),
    Return(ReturnStmt),
    Labeled(Box<LabeledStmt>),
    Break(BreakStmt),
    Continue(ContinueStmt),
    If(Box<IfStmt>),
    Switch(SwitchStmt),
    Throw(ThrowStmt),
    Try(Box<TryStmt>),
    While(Box<WhileStmt>),
    DoWhile(Box<DoWhileStmt>),
    For(Box<ForStmt>),
    ForIn(Box<ForInStmt>),
    ForOf(Box<ForOfStmt>),
    VarDecl(VarDecl),
    Fn(Box<FnNode>),
    Class(Box<ClassNode>),
    Import(ImportDecl),
    ExportNamed(Box<ExportNamedDecl>),
    ExportDefault(Box<ExportDefaultDecl>),
    ExportAll(ExportAllDecl),
    Unknown(UnknownNode),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExprStmt {
    #[serde(rename = "type")]
    pub node_type: ExprStmtTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub expression: Expr,
    /// Present on directive-prologue statements (`"use strict"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directive: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockStmt {
    #[serde(rename = "type")]
    pub node_type: BlockStmtTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmptyStmt {
    #[serde(rename = "type")]
    pub node_type: EmptyStmtTag,
    #[serde(flatten)]
    pub base: NodeBase,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebuggerStmt {
    #[serde(rename = "type")]
    pub node_type: DebuggerStmtTag,
    #[serde(flatten)]
    pub base: NodeBase,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnStmt {
    #[serde(rename = "type")]
    pub node_type: ReturnStmtTag,
    #[serde(flatten)]
    pub base: NodeBase,
    #[serde(default)]
    pub argument: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledStmt {
    #[serde(rename = "type")]
    pub node_type: LabeledStmtTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub label: Ident,
    pub body: Stmt,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakStmt {
    #[serde(rename = "type")]
    pub node_type: BreakStmtTag,
    #[serde(flatten)]
    pub base: NodeBase,
    #[serde(default)]
    pub label: Option<Ident>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinueStmt {
    #[serde(rename = "type")]
    pub node_type: ContinueStmtTag,
    #[serde(flatten)]
    pub base: NodeBase,
    #[serde(default)]
    pub label: Option<Ident>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfStmt {
    #[serde(rename = "type")]
    pub node_type: IfStmtTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub test: Expr,
    pub consequent: Stmt,
    #[serde(default)]
    pub alternate: Option<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchStmt {
    #[serde(rename = "type")]
    pub node_type: SwitchStmtTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub discriminant: Expr,
    pub cases: Vec<SwitchCase>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchCase {
    #[serde(rename = "type")]
    pub node_type: SwitchCaseTag,
    #[serde(flatten)]
    pub base: NodeBase,
    #[serde(default)]
    pub test: Option<Expr>,
    pub consequent: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThrowStmt {
    #[serde(rename = "type")]
    pub node_type: ThrowStmtTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub argument: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TryStmt {
    #[serde(rename = "type")]
    pub node_type: TryStmtTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub block: BlockStmt,
    #[serde(default)]
    pub handler: Option<CatchClause>,
    #[serde(default)]
    pub finalizer: Option<BlockStmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatchClause {
    #[serde(rename = "type")]
    pub node_type: CatchClauseTag,
    #[serde(flatten)]
    pub base: NodeBase,
    #[serde(default)]
    pub param: Option<Pat>,
    pub body: BlockStmt,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhileStmt {
    #[serde(rename = "type")]
    pub node_type: WhileStmtTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub test: Expr,
    pub body: Stmt,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoWhileStmt {
    #[serde(rename = "type")]
    pub node_type: DoWhileStmtTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub body: Stmt,
    pub test: Expr,
}

/// `for (init; test; update) body`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForStmt {
    #[serde(rename = "type")]
    pub node_type: ForStmtTag,
    #[serde(flatten)]
    pub base: NodeBase,
    #[serde(default)]
    pub init: Option<ForInit>,
    #[serde(default)]
    pub test: Option<Expr>,
    #[serde(default)]
    pub update: Option<Expr>,
    pub body: Stmt,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ForInit {
    Decl(VarDecl),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForInStmt {
    #[serde(rename = "type")]
    pub node_type: ForInStmtTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub left: ForTarget,
    pub right: Expr,
    pub body: Stmt,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForOfStmt {
    #[serde(rename = "type")]
    pub node_type: ForOfStmtTag,
    #[serde(flatten)]
    pub base: NodeBase,
    #[serde(default, rename = "await")]
    pub is_await: bool,
    pub left: ForTarget,
    pub right: Expr,
    pub body: Stmt,
}

/// Left side of a `for-in`/`for-of` head: a fresh declaration or an existing
/// assignment target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ForTarget {
    Decl(VarDecl),
    Pat(Pat),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarDeclKind {
    Var,
    Let,
    Const,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarDecl {
    #[serde(rename = "type")]
    pub node_type: VarDeclTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub kind: VarDeclKind,
    pub declarations: Vec<VarDeclarator>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarDeclarator {
    #[serde(rename = "type")]
    pub node_type: VarDeclaratorTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub id: Pat,
    #[serde(default)]
    pub init: Option<Expr>,
}

// ---------------------------------------------------------------------------
// Functions and classes
// ---------------------------------------------------------------------------

/// The `"type"` tag of a function node. One struct serves all three shapes;
/// the tag distinguishes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FnTag {
    FunctionDeclaration,
    FunctionExpression,
    ArrowFunctionExpression,
}

/// A function of any shape: declaration, expression or arrow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FnNode {
    #[serde(rename = "type")]
    pub node_type: FnTag,
    #[serde(flatten)]
    pub base: NodeBase,
    #[serde(default)]
    pub id: Option<Ident>,
    pub params: Vec<Pat>,
    pub body: FnBody,
    #[serde(default)]
    pub generator: bool,
    #[serde(default, rename = "async")]
    pub is_async: bool,
    /// Arrow-only flag kept for fidelity: true when the body is a bare
    /// expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<bool>,
}

impl FnNode {
    pub fn is_arrow(&self) -> bool {
        self.node_type == FnTag::ArrowFunctionExpression
    }
}

/// A function body: a block, or a bare expression for concise arrows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FnBody {
    Block(BlockStmt),
    Expr(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassTag {
    ClassDeclaration,
    ClassExpression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassNode {
    #[serde(rename = "type")]
    pub node_type: ClassTag,
    #[serde(flatten)]
    pub base: NodeBase,
    #[serde(default)]
    pub id: Option<Ident>,
    #[serde(default, rename = "superClass")]
    pub super_class: Option<Expr>,
    pub body: ClassBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassBody {
    #[serde(rename = "type")]
    pub node_type: ClassBodyTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub body: Vec<ClassMember>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClassMember {
    Method(Box<MethodDef>),
    Field(Box<PropertyDef>),
    Unknown(UnknownNode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodKind {
    Constructor,
    Method,
    Get,
    Set,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDef {
    #[serde(rename = "type")]
    pub node_type: MethodDefTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub key: Expr,
    /// Always a `FunctionExpression`; validated at visit time.
    pub value: Expr,
    pub kind: MethodKind,
    #[serde(default)]
    pub computed: bool,
    #[serde(default, rename = "static")]
    pub is_static: bool,
}

/// A public class field: `class C { x = init; }`. Private fields parse with
/// a `PrivateIdentifier` key and are rejected at visit time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDef {
    #[serde(rename = "type")]
    pub node_type: PropertyDefTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub key: Expr,
    #[serde(default)]
    pub value: Option<Expr>,
    #[serde(default)]
    pub computed: bool,
    #[serde(default, rename = "static")]
    pub is_static: bool,
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Expr {
    Ident(Ident),
    Lit(Lit),
    Template(TemplateLit),
    TaggedTemplate(Box<TaggedTemplateExpr>),
    This(ThisExpr),
    SuperRef(SuperNode),
    Array(ArrayExpr),
    Object(ObjectExpr),
    Fn(Box<FnNode>),
    Class(Box<ClassNode>),
    Unary(Box<UnaryExpr>),
    Update(Box<UpdateExpr>),
    Binary(Box<BinExpr>),
    Logical(Box<LogicalExpr>),
    Assign(Box<AssignExpr>),
    Cond(Box<CondExpr>),
    Call(Box<CallExpr>),
    New(Box<NewExpr>),
    Seq(SeqExpr),
    Member(Box<MemberExpr>),
    Yield(Box<YieldExpr>),
    Await(Box<AwaitExpr>),
    ImportCall(Box<ImportExpr>),
    Meta(MetaProperty),
    Chain(Box<ChainExpr>),
    Spread(Box<SpreadNode>),
    Unknown(UnknownNode),
}

impl Expr {
    /// Start location for error reporting, when the node kept one.
    pub fn start_loc(&self) -> Option<CodeLoc> {
        match self {
            Self::Ident(n) => n.base.start_loc(),
            Self::Lit(n) => n.base.start_loc(),
            Self::Template(n) => n.base.start_loc(),
            Self::TaggedTemplate(n) => n.base.start_loc(),
            Self::This(n) => n.base.start_loc(),
            Self::SuperRef(n) => n.base.start_loc(),
            Self::Array(n) => n.base.start_loc(),
            Self::Object(n) => n.base.start_loc(),
            Self::Fn(n) => n.base.start_loc(),
            Self::Class(n) => n.base.start_loc(),
            Self::Unary(n) => n.base.start_loc(),
            Self::Update(n) => n.base.start_loc(),
            Self::Binary(n) => n.base.start_loc(),
            Self::Logical(n) => n.base.start_loc(),
            Self::Assign(n) => n.base.start_loc(),
            Self::Cond(n) => n.base.start_loc(),
            Self::Call(n) => n.base.start_loc(),
            Self::New(n) => n.base.start_loc(),
            Self::Seq(n) => n.base.start_loc(),
            Self::Member(n) => n.base.start_loc(),
            Self::Yield(n) => n.base.start_loc(),
            Self::Await(n) => n.base.start_loc(),
            Self::ImportCall(n) => n.base.start_loc(),
            Self::Meta(n) => n.base.start_loc(),
            Self::Chain(n) => n.base.start_loc(),
            Self::Spread(n) => n.base.start_loc(),
            Self::Unknown(n) => n.start_loc(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThisExpr {
    #[serde(rename = "type")]
    pub node_type: ThisTag,
    #[serde(flatten)]
    pub base: NodeBase,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuperNode {
    #[serde(rename = "type")]
    pub node_type: SuperTag,
    #[serde(flatten)]
    pub base: NodeBase,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayExpr {
    #[serde(rename = "type")]
    pub node_type: ArrayExprTag,
    #[serde(flatten)]
    pub base: NodeBase,
    /// `None` entries are elisions (`[a, , b]`).
    pub elements: Vec<Option<Expr>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectExpr {
    #[serde(rename = "type")]
    pub node_type: ObjectExprTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub properties: Vec<ObjectMember>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObjectMember {
    Prop(Box<Property>),
    Spread(Box<SpreadNode>),
    Unknown(UnknownNode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropKind {
    Init,
    Get,
    Set,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    #[serde(rename = "type")]
    pub node_type: PropertyTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub key: Expr,
    pub value: Expr,
    pub kind: PropKind,
    #[serde(default)]
    pub computed: bool,
    #[serde(default)]
    pub shorthand: bool,
    #[serde(default)]
    pub method: bool,
}

impl Property {
    /// True for `m() {}` / `get m() {}` / `set m(v) {}` members.
    pub fn is_method_like(&self) -> bool {
        self.method || self.kind != PropKind::Init
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadNode {
    #[serde(rename = "type")]
    pub node_type: SpreadTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub argument: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnaryExpr {
    #[serde(rename = "type")]
    pub node_type: UnaryExprTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub operator: String,
    #[serde(default)]
    pub prefix: bool,
    pub argument: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateExpr {
    #[serde(rename = "type")]
    pub node_type: UpdateExprTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub operator: String,
    pub argument: Expr,
    #[serde(default)]
    pub prefix: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinExpr {
    #[serde(rename = "type")]
    pub node_type: BinExprTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub operator: String,
    pub left: Expr,
    pub right: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalExpr {
    #[serde(rename = "type")]
    pub node_type: LogicalExprTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub operator: String,
    pub left: Expr,
    pub right: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignExpr {
    #[serde(rename = "type")]
    pub node_type: AssignExprTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub operator: String,
    pub left: Pat,
    pub right: Expr,
}

impl AssignExpr {
    /// True for plain `=`, false for compound operators which also read.
    pub fn is_plain_assign(&self) -> bool {
        self.operator == "="
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CondExpr {
    #[serde(rename = "type")]
    pub node_type: CondExprTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub test: Expr,
    pub consequent: Expr,
    pub alternate: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallExpr {
    #[serde(rename = "type")]
    pub node_type: CallExprTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub callee: Expr,
    pub arguments: Vec<Expr>,
    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExpr {
    #[serde(rename = "type")]
    pub node_type: NewExprTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub callee: Expr,
    #[serde(default)]
    pub arguments: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeqExpr {
    #[serde(rename = "type")]
    pub node_type: SeqExprTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub expressions: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberExpr {
    #[serde(rename = "type")]
    pub node_type: MemberExprTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub object: Expr,
    pub property: Expr,
    #[serde(default)]
    pub computed: bool,
    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldExpr {
    #[serde(rename = "type")]
    pub node_type: YieldExprTag,
    #[serde(flatten)]
    pub base: NodeBase,
    #[serde(default)]
    pub argument: Option<Expr>,
    #[serde(default)]
    pub delegate: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwaitExpr {
    #[serde(rename = "type")]
    pub node_type: AwaitExprTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub argument: Expr,
}

/// Dynamic `import(source)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportExpr {
    #[serde(rename = "type")]
    pub node_type: ImportExprTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub source: Expr,
    /// Import attributes argument; not supported, visiting one is an error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Expr>,
}

/// `new.target` / `import.meta`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaProperty {
    #[serde(rename = "type")]
    pub node_type: MetaPropertyTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub meta: Ident,
    pub property: Ident,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainExpr {
    #[serde(rename = "type")]
    pub node_type: ChainExprTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub expression: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateLit {
    #[serde(rename = "type")]
    pub node_type: TemplateLitTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub quasis: Vec<TemplateElement>,
    pub expressions: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateElement {
    #[serde(rename = "type")]
    pub node_type: TemplateElementTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub value: TemplateRaw,
    #[serde(default)]
    pub tail: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRaw {
    pub raw: String,
    #[serde(default)]
    pub cooked: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedTemplateExpr {
    #[serde(rename = "type")]
    pub node_type: TaggedTemplateTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub tag: Expr,
    pub quasi: TemplateLit,
}

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

/// A binding or assignment target. The `Expr` variant covers assignment
/// contexts where the target is an arbitrary expression (`obj.x = v`,
/// `[a.b] = arr`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Pat {
    Ident(Ident),
    Assign(Box<AssignPat>),
    Object(ObjectPat),
    Array(ArrayPat),
    Rest(Box<RestPat>),
    Expr(Box<Expr>),
}

impl Pat {
    pub fn as_ident(&self) -> Option<&Ident> {
        match self {
            Self::Ident(ident) => Some(ident),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignPat {
    #[serde(rename = "type")]
    pub node_type: AssignPatTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub left: Pat,
    pub right: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectPat {
    #[serde(rename = "type")]
    pub node_type: ObjectPatTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub properties: Vec<ObjectPatProp>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObjectPatProp {
    Prop(Box<PatProperty>),
    Rest(Box<RestPat>),
}

/// A `key: pattern` entry of an object pattern. Distinct from [`Property`]
/// because its value is a pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatProperty {
    #[serde(rename = "type")]
    pub node_type: PropertyTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub key: Expr,
    pub value: Pat,
    #[serde(default)]
    pub kind: Option<PropKind>,
    #[serde(default)]
    pub computed: bool,
    #[serde(default)]
    pub shorthand: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayPat {
    #[serde(rename = "type")]
    pub node_type: ArrayPatTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub elements: Vec<Option<Pat>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestPat {
    #[serde(rename = "type")]
    pub node_type: RestTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub argument: Pat,
}

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportDecl {
    #[serde(rename = "type")]
    pub node_type: ImportDeclTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub specifiers: Vec<ImportSpec>,
    pub source: Lit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImportSpec {
    Named(ImportNamedSpec),
    Default(ImportDefaultSpec),
    Namespace(ImportNamespaceSpec),
    Unknown(UnknownNode),
}

impl ImportSpec {
    pub fn local(&self) -> Option<&Ident> {
        match self {
            Self::Named(spec) => Some(&spec.local),
            Self::Default(spec) => Some(&spec.local),
            Self::Namespace(spec) => Some(&spec.local),
            Self::Unknown(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportNamedSpec {
    #[serde(rename = "type")]
    pub node_type: ImportSpecTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub local: Ident,
    pub imported: ModuleExportName,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportDefaultSpec {
    #[serde(rename = "type")]
    pub node_type: ImportDefaultSpecTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub local: Ident,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportNamespaceSpec {
    #[serde(rename = "type")]
    pub node_type: ImportNamespaceSpecTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub local: Ident,
}

/// An exported/imported name: an identifier, or a string for arbitrary
/// module export names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModuleExportName {
    Ident(Ident),
    Lit(Lit),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportNamedDecl {
    #[serde(rename = "type")]
    pub node_type: ExportNamedTag,
    #[serde(flatten)]
    pub base: NodeBase,
    #[serde(default)]
    pub declaration: Option<Stmt>,
    #[serde(default)]
    pub specifiers: Vec<ExportSpec>,
    #[serde(default)]
    pub source: Option<Lit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSpec {
    #[serde(rename = "type")]
    pub node_type: ExportSpecTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub local: ModuleExportName,
    pub exported: ModuleExportName,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDefaultDecl {
    #[serde(rename = "type")]
    pub node_type: ExportDefaultTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub declaration: DefaultDecl,
}

/// The payload of `export default`: a (possibly anonymous) function or class
/// declaration, or an arbitrary expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefaultDecl {
    Fn(Box<FnNode>),
    Class(Box<ClassNode>),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportAllDecl {
    #[serde(rename = "type")]
    pub node_type: ExportAllTag,
    #[serde(flatten)]
    pub base: NodeBase,
    pub source: Lit,
    #[serde(default)]
    pub exported: Option<ModuleExportName>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_expr(json: serde_json::Value) -> Expr {
        serde_json::from_value(json).expect("expression should deserialize")
    }

    #[test]
    fn identifier_round_trips_with_type_tag() {
        let json = serde_json::json!({"type": "Identifier", "name": "x"});
        let expr = parse_expr(json.clone());
        assert!(matches!(&expr, Expr::Ident(ident) if ident.name == "x"));
        assert_eq!(serde_json::to_value(&expr).unwrap(), json);
    }

    #[test]
    fn unknown_node_type_is_captured_not_rejected() {
        let json = serde_json::json!({"type": "PrivateIdentifier", "name": "#x"});
        let expr = parse_expr(json.clone());
        match &expr {
            Expr::Unknown(unknown) => assert_eq!(unknown.node_type, "PrivateIdentifier"),
            other => panic!("expected Unknown, got {other:?}"),
        }
        // Unknown nodes re-serialize with their original fields intact.
        assert_eq!(serde_json::to_value(&expr).unwrap(), json);
    }

    #[test]
    fn function_tags_disambiguate_shapes() {
        let arrow = parse_expr(serde_json::json!({
            "type": "ArrowFunctionExpression",
            "id": null,
            "params": [],
            "body": {"type": "Identifier", "name": "x"},
            "expression": true,
        }));
        match arrow {
            Expr::Fn(func) => {
                assert!(func.is_arrow());
                assert!(matches!(func.body, FnBody::Expr(_)));
            }
            other => panic!("expected function, got {other:?}"),
        }
    }

    #[test]
    fn assignment_left_accepts_member_expressions() {
        let expr = parse_expr(serde_json::json!({
            "type": "AssignmentExpression",
            "operator": "=",
            "left": {
                "type": "MemberExpression",
                "object": {"type": "Identifier", "name": "o"},
                "property": {"type": "Identifier", "name": "p"},
                "computed": false,
            },
            "right": {"type": "Literal", "value": 1},
        }));
        match expr {
            Expr::Assign(assign) => assert!(matches!(assign.left, Pat::Expr(_))),
            other => panic!("expected assignment, got {other:?}"),
        }
    }

    #[test]
    fn array_holes_deserialize_as_none() {
        let expr = parse_expr(serde_json::json!({
            "type": "ArrayExpression",
            "elements": [{"type": "Literal", "value": 1}, null],
        }));
        match expr {
            Expr::Array(array) => {
                assert_eq!(array.elements.len(), 2);
                assert!(array.elements[1].is_none());
            }
            other => panic!("expected array, got {other:?}"),
        }
    }
}
