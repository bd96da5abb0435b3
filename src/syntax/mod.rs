//! Syntax model consumed from the parser front-end.
//!
//! Tokenizing and tree construction happen upstream. A front-end hands the
//! resolver one [`SourceFile`] per file: the original text plus either an
//! [`Ast`] or the parse errors that prevented building one.

pub mod ast;
pub mod build;

use std::sync::Arc;

use text_size::TextRange;

pub use ast::*;

/// A parse failure reported by the front-end.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseError {
    pub message: Arc<str>,
    /// Position of the failure, when the front-end knows it.
    pub range: Option<TextRange>,
}

impl ParseError {
    pub fn new(message: impl Into<Arc<str>>) -> Self {
        Self {
            message: message.into(),
            range: None,
        }
    }

    pub fn at(message: impl Into<Arc<str>>, range: TextRange) -> Self {
        Self {
            message: message.into(),
            range: Some(range),
        }
    }
}

/// One file as supplied by the front-end.
#[derive(Clone, Debug)]
pub struct SourceFile {
    pub path: Arc<str>,
    pub text: Arc<str>,
    /// `None` when the front-end could not produce a tree.
    pub ast: Option<Ast>,
    pub errors: Vec<ParseError>,
}

impl SourceFile {
    /// A successfully parsed file.
    pub fn parsed(path: impl Into<Arc<str>>, text: impl Into<Arc<str>>, ast: Ast) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
            ast: Some(ast),
            errors: Vec::new(),
        }
    }

    /// A file whose parse failed outright.
    pub fn failed(
        path: impl Into<Arc<str>>,
        text: impl Into<Arc<str>>,
        errors: Vec<ParseError>,
    ) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
            ast: None,
            errors,
        }
    }

    pub fn is_parsed(&self) -> bool {
        self.ast.is_some()
    }
}
