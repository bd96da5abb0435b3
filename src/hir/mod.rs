//! Semantic model: declared symbols, the relationship graph and name
//! resolution.
//!
//! Indexing runs in two steps. [`collect_declarations`] walks one file's AST
//! and produces its symbols plus *pending* relationships; the
//! [`SymbolTable`] stores both and links the relationships lazily in
//! [`SymbolTable::ensure_relationships`], after every file is known. During
//! a search the table is read-only and shared between workers.

mod cache;
mod collect;
mod context;
mod diagnostics;
mod resolve;
mod source;
mod symbols;
mod table;

pub use cache::{CacheKey, ContentHash, IndexCache, IndexEntry, MemoryIndexCache};
pub use collect::{collect_declarations, is_builtin_type};
pub use context::{ImportTable, LexicalContext};
pub use diagnostics::{Category, Diagnostic, DiagnosticCollector, Severity, codes};
pub use resolve::{NameKind, NameResolver, ResolvedName, same_name};
pub use source::FileSet;
pub use symbols::{
    Ancestor, Ancestors, DeclaredSymbol, DispatchHandlers, MEMBER_SEPARATOR, MemberAccess,
    RelationshipKind, SymbolKey, SymbolKind, TypeEdge, TypeRef, Visibility, fold_name,
    member_name, same_type_name,
};
pub use table::{
    DEFAULT_ANCESTOR_LIMIT, PendingRelationship, RejectedEdge, RelationshipError, SymbolTable,
};
