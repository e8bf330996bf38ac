//! Error types for the instrumentation pass.
//!
//! Instrumentation is offline and deterministic, so every failure is a
//! programming error in the input or in the instrumentor itself, reported with
//! the source location of the offending node. No error is recoverable: a
//! failed module produces no output and the host decides whether to abort the
//! build or skip the module.

use std::fmt;

/// A line/column position in the original source.
///
/// Lines are 1-based and columns 0-based, matching the convention of the
/// ESTree `loc` objects the parser supplies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CodeLoc {
    pub line: u32,
    pub column: u32,
}

impl CodeLoc {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for CodeLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Classification of instrumentation failures.
///
/// The set is closed: new syntax the visitors do not understand must surface
/// as [`ErrorKind::UnexpectedNode`] rather than passing through silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorKind {
    /// A visitor encountered a construct it does not support (unknown node
    /// type, or a known node in an impossible position such as `super`
    /// outside a method).
    UnexpectedNode,
    /// An identifier reference could not be classified and is not a
    /// recognized global or module-local name.
    BindingUnresolvable,
    /// An import statement binds a local identifier that is already bound.
    DuplicateImportName,
    /// An internal consistency check failed. Always a bug in the
    /// instrumentor, never in the input.
    InternalInvariant,
    /// An arrow function using `super` appears inside a sloppy-mode function
    /// that redefines `arguments`; the rewriter cannot support this shape.
    SuperInArrowRedefinedArguments,
    /// The module nests deeper than the traversal limit.
    NestingTooDeep,
}

/// A fatal instrumentation error with source position.
#[derive(Debug, Clone)]
pub struct InstrumentError {
    kind: ErrorKind,
    message: String,
    loc: Option<CodeLoc>,
    filename: String,
}

impl InstrumentError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, loc: Option<CodeLoc>, filename: &str) -> Self {
        Self {
            kind,
            message: message.into(),
            loc,
            filename: filename.to_owned(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn loc(&self) -> Option<CodeLoc> {
        self.loc
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }
}

impl fmt::Display for InstrumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind: &'static str = self.kind.into();
        match self.loc {
            Some(loc) => write!(f, "{kind}: {} ({}:{loc})", self.message, self.filename),
            None => write!(f, "{kind}: {} ({})", self.message, self.filename),
        }
    }
}

impl std::error::Error for InstrumentError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_location_and_filename() {
        let err = InstrumentError::new(
            ErrorKind::UnexpectedNode,
            "unsupported node type 'Decorator'",
            Some(CodeLoc::new(3, 14)),
            "src/app.js",
        );
        assert_eq!(
            err.to_string(),
            "unexpected-node: unsupported node type 'Decorator' (src/app.js:3:14)"
        );
    }

    #[test]
    fn kind_strings_are_kebab_case() {
        let kind: &'static str = ErrorKind::SuperInArrowRedefinedArguments.into();
        assert_eq!(kind, "super-in-arrow-redefined-arguments");
    }
}
