//! # usage-resolver
//!
//! Finds every place a class, member, function or constant is used across
//! a PHP code base, and says how sure it is about each one.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! ide     → Query, candidate filter, usage visitor, confidence scoring
//!   ↓
//! hir     → Symbol table, relationship graph, name resolution
//!   ↓
//! syntax  → AST handed over by the parser front-end
//!   ↓
//! base    → Primitives (FileId, spans, line index)
//! ```

/// Foundation types: FileId, spans, line lookup
pub mod base;

/// Semantic model: symbols, relationships, name resolution
pub mod hir;

/// Usage search and scoring
pub mod ide;

/// AST consumed from the parser front-end
pub mod syntax;

pub use base::{FileId, LineCol, LineIndex, TextRange, TextSize};
pub use hir::{Diagnostic, SymbolTable};
pub use ide::{
    Analysis, AnalysisHost, Confidence, ScoredUsage, SearchConfig, SearchError, SearchResult,
    UsageKind,
};
pub use syntax::{Ast, SourceFile};
