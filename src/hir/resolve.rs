//! Name resolution: turning a name as written into a canonical
//! fully-qualified name.
//!
//! # Algorithm
//!
//! For a raw name and a [`LexicalContext`], first match wins:
//!
//! 1. absolute names (`\App\Widget`) are taken verbatim;
//! 2. an exact import alias maps to its target, shadowing any declaration
//!    under the current namespace;
//! 3. a qualified name whose first segment is an import alias has that
//!    prefix substituted (`namespace\X` is relative to the current namespace);
//! 4. namespace + name, if declared;
//! 5. the global form, if declared;
//! 6. functions and constants only: the global form, if it is a known
//!    built-in;
//! 7. otherwise [`ResolvedName::Unresolved`] carrying the namespace-qualified
//!    candidate.
//!
//! `self`, `static` and `parent` never go through the import table; they
//! resolve against the context's enclosing-type stack.

use std::sync::Arc;

use rustc_hash::FxHashSet;
use smol_str::SmolStr;
use tracing::trace;

use super::context::LexicalContext;
use super::symbols::{SymbolKind, fold_name, same_type_name};
use super::table::SymbolTable;
use crate::syntax::{NS_SEPARATOR, UseKind};

// ============================================================================
// RESOLVED NAME
// ============================================================================

/// Which namespace a name lives in; picks the import table and the
/// existence check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NameKind {
    Class,
    Function,
    Constant,
}

impl NameKind {
    fn import_kind(self) -> UseKind {
        match self {
            NameKind::Class => UseKind::Class,
            NameKind::Function => UseKind::Function,
            NameKind::Constant => UseKind::Constant,
        }
    }
}

/// Outcome of resolving one name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolvedName {
    /// A canonical fully-qualified name (without leading separator).
    Qualified(Arc<str>),
    /// A global function or constant from the built-in registry.
    Builtin(Arc<str>),
    /// Nothing matched. Not an error: callers score it as dynamic.
    Unresolved { candidate: Arc<str> },
}

impl ResolvedName {
    /// The resolved name, or the best-effort candidate.
    pub fn fqn(&self) -> &Arc<str> {
        match self {
            ResolvedName::Qualified(fqn) | ResolvedName::Builtin(fqn) => fqn,
            ResolvedName::Unresolved { candidate } => candidate,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, ResolvedName::Unresolved { .. })
    }

    /// Whether the resolved name (or candidate) denotes `target` under the
    /// case rules of `kind`.
    pub fn names(&self, target: &str, kind: NameKind) -> bool {
        same_name(self.fqn(), target, kind)
    }
}

/// Name equality under the case rules of `kind`.
pub fn same_name(a: &str, b: &str, kind: NameKind) -> bool {
    match kind {
        NameKind::Class | NameKind::Function => same_type_name(a, b),
        NameKind::Constant => {
            fold_name(SymbolKind::Constant, a) == fold_name(SymbolKind::Constant, b)
        }
    }
}

/// How the steps of the algorithm apply to a particular name.
enum Plan {
    /// Steps 1-3: no existence check.
    Definite(String),
    /// Steps 4-5: ordered candidates, the first declared one wins.
    Search(Vec<String>),
}

// ============================================================================
// RESOLVER
// ============================================================================

/// Resolves names against a [`SymbolTable`].
///
/// Cheap to construct; holds only borrows.
#[derive(Clone, Copy, Debug)]
pub struct NameResolver<'a> {
    table: &'a SymbolTable,
    builtin_functions: Option<&'a FxHashSet<SmolStr>>,
    builtin_constants: Option<&'a FxHashSet<SmolStr>>,
}

impl<'a> NameResolver<'a> {
    pub fn new(table: &'a SymbolTable) -> Self {
        Self {
            table,
            builtin_functions: None,
            builtin_constants: None,
        }
    }

    /// Enable the built-in fallback. Function names must be lower case.
    pub fn with_builtins(
        mut self,
        functions: &'a FxHashSet<SmolStr>,
        constants: &'a FxHashSet<SmolStr>,
    ) -> Self {
        self.builtin_functions = Some(functions);
        self.builtin_constants = Some(constants);
        self
    }

    pub fn table(&self) -> &'a SymbolTable {
        self.table
    }

    /// Resolve `raw` as written at a position described by `ctx`.
    pub fn resolve(&self, raw: &str, ctx: &LexicalContext, kind: NameKind) -> ResolvedName {
        if raw.trim_matches(NS_SEPARATOR).is_empty() {
            return ResolvedName::Unresolved {
                candidate: Arc::from(raw),
            };
        }
        if kind == NameKind::Class {
            if let Some(relative) = self.resolve_relative_keyword(raw, ctx) {
                return relative;
            }
        }

        let resolved = match plan(raw, ctx, kind) {
            Plan::Definite(fqn) => ResolvedName::Qualified(Arc::from(fqn)),
            Plan::Search(candidates) => {
                if let Some(found) = candidates.iter().find(|c| self.exists(c, kind)) {
                    ResolvedName::Qualified(Arc::from(found.as_str()))
                } else if let Some(builtin) = self.builtin(raw, kind) {
                    ResolvedName::Builtin(builtin)
                } else {
                    let candidate = candidates
                        .into_iter()
                        .next()
                        .unwrap_or_else(|| raw.to_string());
                    ResolvedName::Unresolved {
                        candidate: Arc::from(candidate),
                    }
                }
            }
        };
        trace!(raw, ?kind, namespace = ?ctx.namespace(), ?resolved, "resolved name");
        resolved
    }

    /// The ordered candidate names `raw` may denote, for references that are
    /// linked later (after all files are indexed).
    pub fn candidates(raw: &str, ctx: &LexicalContext, kind: NameKind) -> Vec<Arc<str>> {
        match plan(raw, ctx, kind) {
            Plan::Definite(fqn) => vec![Arc::from(fqn)],
            Plan::Search(candidates) => candidates.into_iter().map(Arc::from).collect(),
        }
    }

    /// The enclosing type, for `self` and `static`.
    ///
    /// Late static binding is approximated by the declaring type.
    pub fn resolve_self(&self, ctx: &LexicalContext) -> Option<Arc<str>> {
        ctx.current_type().cloned()
    }

    /// The type the enclosing type extends.
    pub fn resolve_parent(&self, ctx: &LexicalContext) -> Option<Arc<str>> {
        ctx.current_type().and_then(|t| self.table.parent_of(t))
    }

    fn resolve_relative_keyword(&self, raw: &str, ctx: &LexicalContext) -> Option<ResolvedName> {
        let target = if raw.eq_ignore_ascii_case("self") || raw.eq_ignore_ascii_case("static") {
            self.resolve_self(ctx)
        } else if raw.eq_ignore_ascii_case("parent") {
            self.resolve_parent(ctx)
        } else {
            return None;
        };
        Some(match target {
            Some(fqn) => ResolvedName::Qualified(fqn),
            None => ResolvedName::Unresolved {
                candidate: Arc::from(raw),
            },
        })
    }

    fn exists(&self, fqn: &str, kind: NameKind) -> bool {
        match kind {
            NameKind::Class => self.table.contains_type(fqn),
            NameKind::Function => self.table.lookup(SymbolKind::Function, fqn).is_some(),
            NameKind::Constant => self.table.lookup(SymbolKind::Constant, fqn).is_some(),
        }
    }

    fn builtin(&self, raw: &str, kind: NameKind) -> Option<Arc<str>> {
        if raw.contains(NS_SEPARATOR) {
            return None;
        }
        let registered = match kind {
            NameKind::Class => false,
            NameKind::Function => self
                .builtin_functions
                .is_some_and(|set| set.contains(raw.to_ascii_lowercase().as_str())),
            NameKind::Constant => self.builtin_constants.is_some_and(|set| set.contains(raw)),
        };
        registered.then(|| Arc::from(raw))
    }
}

fn plan(raw: &str, ctx: &LexicalContext, kind: NameKind) -> Plan {
    // 1. absolute
    if let Some(absolute) = raw.strip_prefix(NS_SEPARATOR) {
        return Plan::Definite(absolute.to_string());
    }

    let imports = ctx.imports();
    let import_kind = kind.import_kind();

    // 2. exact alias
    if let Some(target) = imports.get(import_kind, raw) {
        return Plan::Definite(target.to_string());
    }

    // 3. aliased or namespace-relative prefix
    if let Some((head, rest)) = raw.split_once(NS_SEPARATOR) {
        if head.eq_ignore_ascii_case("namespace") {
            return Plan::Definite(ctx.qualify(rest));
        }
        // Prefixes always name namespaces or classes, so the class table applies.
        if let Some(target) = imports.get(UseKind::Class, head) {
            return Plan::Definite(format!("{}{}{}", target, NS_SEPARATOR, rest));
        }
    }

    // 4./5. namespace-local, then global
    match ctx.namespace() {
        Some(_) => Plan::Search(vec![ctx.qualify(raw), raw.to_string()]),
        None => Plan::Search(vec![raw.to_string()]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::FileId;
    use crate::hir::symbols::{DeclaredSymbol, RelationshipKind};

    fn table_with(classes: &[&str]) -> SymbolTable {
        let mut table = SymbolTable::new();
        for fqn in classes {
            table.upsert_symbol(DeclaredSymbol::new(SymbolKind::Class, *fqn, FileId::new(0)));
        }
        table
    }

    #[test]
    fn test_absolute_name_is_verbatim() {
        let table = SymbolTable::new();
        let resolver = NameResolver::new(&table);
        let ctx = LexicalContext::in_namespace("App");

        assert_eq!(
            resolver.resolve("\\Vendor\\Thing", &ctx, NameKind::Class),
            ResolvedName::Qualified(Arc::from("Vendor\\Thing"))
        );
    }

    #[test]
    fn test_alias_shadows_namespace_local_declaration() {
        let table = table_with(&["App\\Short", "My\\Namespace\\Real"]);
        let resolver = NameResolver::new(&table);
        let mut ctx = LexicalContext::in_namespace("App");
        ctx.add_import(UseKind::Class, "Short", "My\\Namespace\\Real");

        assert_eq!(
            resolver.resolve("Short", &ctx, NameKind::Class).fqn().as_ref(),
            "My\\Namespace\\Real"
        );
        assert_eq!(
            resolver.resolve("short", &ctx, NameKind::Class).fqn().as_ref(),
            "My\\Namespace\\Real"
        );
    }

    #[test]
    fn test_alias_prefix_substitution() {
        let table = SymbolTable::new();
        let resolver = NameResolver::new(&table);
        let mut ctx = LexicalContext::in_namespace("App");
        ctx.add_import(UseKind::Class, "Models", "Domain\\Models");

        assert_eq!(
            resolver.resolve("Models\\User", &ctx, NameKind::Class),
            ResolvedName::Qualified(Arc::from("Domain\\Models\\User"))
        );
        assert_eq!(
            resolver.resolve("namespace\\Local", &ctx, NameKind::Class),
            ResolvedName::Qualified(Arc::from("App\\Local"))
        );
    }

    #[test]
    fn test_namespace_then_global_fallback() {
        let table = table_with(&["App\\Widget", "Exception"]);
        let resolver = NameResolver::new(&table);
        let ctx = LexicalContext::in_namespace("App");

        assert_eq!(
            resolver.resolve("Widget", &ctx, NameKind::Class).fqn().as_ref(),
            "App\\Widget"
        );
        assert_eq!(
            resolver.resolve("Exception", &ctx, NameKind::Class).fqn().as_ref(),
            "Exception"
        );
    }

    #[test]
    fn test_unresolved_carries_namespace_candidate() {
        let table = SymbolTable::new();
        let resolver = NameResolver::new(&table);
        let ctx = LexicalContext::in_namespace("App");

        let resolved = resolver.resolve("Missing", &ctx, NameKind::Class);
        assert!(!resolved.is_resolved());
        assert_eq!(resolved.fqn().as_ref(), "App\\Missing");
    }

    #[test]
    fn test_builtin_fallback_only_for_functions_and_constants() {
        let table = SymbolTable::new();
        let functions: FxHashSet<SmolStr> = ["strlen"].into_iter().map(SmolStr::from).collect();
        let constants: FxHashSet<SmolStr> = ["PHP_EOL"].into_iter().map(SmolStr::from).collect();
        let resolver = NameResolver::new(&table).with_builtins(&functions, &constants);
        let ctx = LexicalContext::in_namespace("App");

        assert_eq!(
            resolver.resolve("STRLEN", &ctx, NameKind::Function),
            ResolvedName::Builtin(Arc::from("STRLEN"))
        );
        assert_eq!(
            resolver.resolve("PHP_EOL", &ctx, NameKind::Constant),
            ResolvedName::Builtin(Arc::from("PHP_EOL"))
        );
        assert!(!resolver.resolve("strlen", &ctx, NameKind::Class).is_resolved());
    }

    #[test]
    fn test_self_and_parent_use_type_stack() {
        let mut table = table_with(&["App\\Base", "App\\Child"]);
        table
            .upsert_relationship("App\\Child", "App\\Base", RelationshipKind::Extends)
            .unwrap();
        let resolver = NameResolver::new(&table);
        let mut ctx = LexicalContext::in_namespace("App");
        ctx.push_type("App\\Child");

        assert_eq!(resolver.resolve("self", &ctx, NameKind::Class).fqn().as_ref(), "App\\Child");
        assert_eq!(resolver.resolve("static", &ctx, NameKind::Class).fqn().as_ref(), "App\\Child");
        assert_eq!(resolver.resolve("parent", &ctx, NameKind::Class).fqn().as_ref(), "App\\Base");

        ctx.pop_type();
        assert!(!resolver.resolve("self", &ctx, NameKind::Class).is_resolved());
    }

    #[test]
    fn test_separator_only_names_are_unresolved() {
        let table = SymbolTable::new();
        let resolver = NameResolver::new(&table);
        let ctx = LexicalContext::new();
        assert!(!resolver.resolve("\\\\", &ctx, NameKind::Class).is_resolved());
    }

    #[test]
    fn test_candidates_for_deferred_links() {
        let ctx = LexicalContext::in_namespace("App");
        let candidates = NameResolver::candidates("Base", &ctx, NameKind::Class);
        let candidates: Vec<_> = candidates.iter().map(|c| c.as_ref()).collect();
        assert_eq!(candidates, vec!["App\\Base", "Base"]);
    }
}
