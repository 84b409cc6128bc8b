//! Error kinds shared by the front-end and the optimizer.
//!
//! Every fatal error kind from the front-end or the optimizer is a variant
//! here. `UnsupportedFoldOpcode` is the one non-fatal kind; it is only ever
//! logged, never propagated as an `Err`.

use std::fmt;

use crate::lexer::Span;

/// A source location used for front-end diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub span: Span,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "offset {}", self.span.offset)
    }
}

/// All fatal error kinds, plus the `UnsupportedFoldOpcode` diagnostic.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("ParseFailure: {0}")]
    ParseFailure(String),

    #[error("Redeclaration: {name}")]
    Redeclaration { name: String },

    #[error("UndeclaredVariable: {name}")]
    UndeclaredVariable { name: String },

    #[error("MalformedIf: {0}")]
    MalformedIf(String),

    #[error("MalformedStatement: {0}")]
    MalformedStatement(String),

    #[error("IRLoadFailure: {0}")]
    IRLoadFailure(String),

    /// Non-fatal: the instruction is left unchanged and a diagnostic is
    /// emitted. Reported by `optim::constfold` via `tracing::warn!`, never
    /// returned as an `Err`.
    #[error("UnsupportedFoldOpcode: {0}")]
    UnsupportedFoldOpcode(String),
}

/// Emit the single-line diagnostic format required by the CLI contract:
/// one line on stderr naming the error kind and, where applicable, the
/// offending identifier.
pub fn report(err: &Error) {
    eprintln!("{err}");
}
