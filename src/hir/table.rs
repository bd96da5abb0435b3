//! Symbol table: declared entities plus the type-relationship arena.
//!
//! # Architecture
//!
//! Symbols are stored once, keyed by [`SymbolKey`] (kind + case-folded
//! qualified name), in insertion order. Relationships live in a separate
//! arena of [`TypeEdge`]s indexed by child name, so the inheritance graph
//! never holds references between symbols and cycles are rejected at
//! insertion time instead of being discovered during a walk.
//!
//! Declarations collected from files register their relationships as
//! *pending*: parent names are kept as candidate lists and only linked once
//! every file is known (see [`SymbolTable::ensure_relationships`]). This is
//! what lets an edge point at a type that is indexed later.

use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{trace, warn};

use super::symbols::{
    Ancestor, Ancestors, DeclaredSymbol, MemberAccess, RelationshipKind, SymbolKey, SymbolKind,
    TypeEdge, TypeRef, fold_name, member_name, same_type_name,
};
use crate::base::FileId;

/// Default bound on the number of ancestors a single walk may produce.
pub const DEFAULT_ANCESTOR_LIMIT: usize = 256;

// ============================================================================
// ERRORS
// ============================================================================

/// Why a relationship edge was refused.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RelationshipError {
    #[error("`{child}` cannot {kind} itself")]
    SelfReference {
        child: Arc<str>,
        kind: RelationshipKind,
    },
    #[error("`{child}` {kind} `{parent}` would create an inheritance cycle")]
    Cycle {
        child: Arc<str>,
        parent: Arc<str>,
        kind: RelationshipKind,
    },
}

/// A relationship declared in a file, waiting to be linked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingRelationship {
    pub child: Arc<str>,
    pub parent: TypeRef,
    pub kind: RelationshipKind,
    /// 0-indexed line of the clause.
    pub line: u32,
}

/// A pending relationship that [`SymbolTable::ensure_relationships`] refused.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RejectedEdge {
    pub file: FileId,
    pub line: u32,
    pub error: RelationshipError,
}

// ============================================================================
// SYMBOL TABLE
// ============================================================================

#[derive(Clone, Debug)]
pub struct SymbolTable {
    /// The single source of truth for all symbols.
    symbols: IndexMap<SymbolKey, DeclaredSymbol>,
    /// Keys declared by each file (only keys whose current symbol came from it).
    by_file: FxHashMap<FileId, Vec<SymbolKey>>,
    /// Edge arena.
    edges: Vec<TypeEdge>,
    /// Folded child name -> edge indices, in insertion order.
    outgoing: FxHashMap<Arc<str>, Vec<usize>>,
    /// Relationships collected per file, linked lazily.
    pending: IndexMap<FileId, Vec<PendingRelationship>>,
    relationships_dirty: bool,
    rejected: Vec<RejectedEdge>,
    ancestor_limit: usize,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self {
            symbols: IndexMap::new(),
            by_file: FxHashMap::default(),
            edges: Vec::new(),
            outgoing: FxHashMap::default(),
            pending: IndexMap::new(),
            relationships_dirty: false,
            rejected: Vec::new(),
            ancestor_limit: DEFAULT_ANCESTOR_LIMIT,
        }
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the length of any ancestor walk.
    pub fn with_ancestor_limit(mut self, limit: usize) -> Self {
        self.ancestor_limit = limit.max(1);
        self
    }

    pub fn set_ancestor_limit(&mut self, limit: usize) {
        self.ancestor_limit = limit.max(1);
    }

    pub fn ancestor_limit(&self) -> usize {
        self.ancestor_limit
    }

    // ========================================================================
    // SYMBOLS
    // ========================================================================

    /// Insert or replace the symbol with the same (kind, qualified name).
    ///
    /// Replacement is last-write-wins and not an error. Returns the entry
    /// that was replaced, if any.
    pub fn upsert_symbol(&mut self, symbol: DeclaredSymbol) -> Option<DeclaredSymbol> {
        let key = symbol.key();
        let file = symbol.file;
        let previous = self.symbols.insert(key.clone(), symbol);

        if let Some(prev) = &previous {
            if prev.file != file {
                if let Some(keys) = self.by_file.get_mut(&prev.file) {
                    keys.retain(|k| k != &key);
                }
                trace!(symbol = %prev.qualified_name, from = %prev.file, to = %file, "symbol redeclared");
            }
        }
        let keys = self.by_file.entry(file).or_default();
        if !keys.contains(&key) {
            keys.push(key);
        }
        previous
    }

    /// Exact lookup by kind and qualified name.
    pub fn lookup(&self, kind: SymbolKind, fqn: &str) -> Option<&DeclaredSymbol> {
        self.symbols.get(&SymbolKey::new(kind, fqn))
    }

    /// Look up a class, interface, trait or enum.
    pub fn lookup_type(&self, fqn: &str) -> Option<&DeclaredSymbol> {
        SymbolKind::CLASS_LIKE
            .iter()
            .find_map(|&kind| self.lookup(kind, fqn))
    }

    pub fn contains_type(&self, fqn: &str) -> bool {
        self.lookup_type(fqn).is_some()
    }

    /// Class-likes whose local name matches `short` (case-insensitively).
    pub fn types_named(&self, short: &str) -> Vec<&DeclaredSymbol> {
        self.symbols
            .values()
            .filter(|s| s.kind.is_class_like() && s.name.eq_ignore_ascii_case(short))
            .collect()
    }

    /// Remove every symbol and pending relationship declared by `file`.
    pub fn remove_file(&mut self, file: FileId) {
        if let Some(keys) = self.by_file.remove(&file) {
            for key in keys {
                if self.symbols.get(&key).is_some_and(|s| s.file == file) {
                    self.symbols.shift_remove(&key);
                }
            }
        }
        if self.pending.shift_remove(&file).is_some() {
            self.relationships_dirty = true;
        }
    }

    pub fn symbols_in_file(&self, file: FileId) -> Vec<&DeclaredSymbol> {
        self.by_file
            .get(&file)
            .map(|keys| keys.iter().filter_map(|k| self.symbols.get(k)).collect())
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeclaredSymbol> {
        self.symbols.values()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Pick the first candidate that names a declared type, falling back to
    /// the first candidate as a deferred reference.
    pub fn resolve_type_ref(&self, type_ref: &TypeRef) -> Option<Arc<str>> {
        type_ref
            .candidates
            .iter()
            .find_map(|c| self.lookup_type(c).map(|s| s.qualified_name.clone()))
            .or_else(|| type_ref.preferred().cloned())
    }

    // ========================================================================
    // RELATIONSHIPS
    // ========================================================================

    /// Record `child -> parent`. Refuses edges that would close a cycle; the
    /// table is left untouched in that case.
    pub fn upsert_relationship(
        &mut self,
        child: &str,
        parent: &str,
        kind: RelationshipKind,
    ) -> Result<(), RelationshipError> {
        self.insert_edge(child, parent, kind, None)
    }

    fn insert_edge(
        &mut self,
        child: &str,
        parent: &str,
        kind: RelationshipKind,
        origin: Option<FileId>,
    ) -> Result<(), RelationshipError> {
        let child = child.trim_start_matches('\\');
        let parent = parent.trim_start_matches('\\');

        if same_type_name(child, parent) {
            return Err(RelationshipError::SelfReference {
                child: Arc::from(child),
                kind,
            });
        }
        if self.reaches(parent, child) {
            return Err(RelationshipError::Cycle {
                child: Arc::from(child),
                parent: Arc::from(parent),
                kind,
            });
        }

        let child_key = type_key(child);
        if let Some(existing) = self.outgoing.get(&child_key) {
            let duplicate = existing.iter().any(|&i| {
                let e = &self.edges[i];
                e.kind == kind && same_type_name(&e.parent, parent)
            });
            if duplicate {
                return Ok(());
            }
        }

        let idx = self.edges.len();
        self.edges.push(TypeEdge {
            child: Arc::from(child),
            parent: Arc::from(parent),
            kind,
            origin,
        });
        self.outgoing.entry(child_key).or_default().push(idx);
        Ok(())
    }

    /// Whether `to` is reachable from `from` along existing edges.
    fn reaches(&self, from: &str, to: &str) -> bool {
        let target = type_key(to);
        let mut seen: FxHashSet<Arc<str>> = FxHashSet::default();
        let mut stack = vec![type_key(from)];
        while let Some(current) = stack.pop() {
            if current == target {
                return true;
            }
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(indices) = self.outgoing.get(&current) {
                stack.extend(indices.iter().map(|&i| type_key(&self.edges[i].parent)));
            }
        }
        false
    }

    /// Direct edges of `fqn`: trait uses first, then extends, then implements.
    pub fn direct_supertypes(&self, fqn: &str) -> Vec<&TypeEdge> {
        let mut edges: Vec<&TypeEdge> = self
            .outgoing
            .get(&type_key(fqn))
            .map(|indices| indices.iter().map(|&i| &self.edges[i]).collect())
            .unwrap_or_default();
        edges.sort_by_key(|e| match e.kind {
            RelationshipKind::UsesTrait => 0,
            RelationshipKind::Extends => 1,
            RelationshipKind::Implements => 2,
        });
        edges
    }

    /// The type `fqn` extends, as written in its declaration.
    pub fn parent_of(&self, fqn: &str) -> Option<Arc<str>> {
        self.direct_supertypes(fqn)
            .into_iter()
            .find(|e| e.kind == RelationshipKind::Extends)
            .map(|e| {
                self.lookup_type(&e.parent)
                    .map(|s| s.qualified_name.clone())
                    .unwrap_or_else(|| e.parent.clone())
            })
    }

    /// Linearized supertype chain of `fqn`, closest first.
    ///
    /// Depth-first preorder over trait uses, then the parent class, then
    /// interfaces, which yields member-lookup precedence (own traits shadow
    /// the parent, the parent shadows its own ancestors). The walk is
    /// iterative, skips already-visited types, stops a branch at the first
    /// undeclared type and never produces more than the configured limit.
    pub fn ancestors_of(&self, fqn: &str) -> Ancestors {
        let mut out = Ancestors::default();
        let mut seen: FxHashSet<Arc<str>> = FxHashSet::default();
        seen.insert(type_key(fqn));

        let mut stack: Vec<(Arc<str>, RelationshipKind, u32)> = Vec::new();
        push_children(&mut stack, self.direct_supertypes(fqn), 1);

        while let Some((name, via, depth)) = stack.pop() {
            if !seen.insert(type_key(&name)) {
                continue;
            }
            let Some(symbol) = self.lookup_type(&name) else {
                trace!(%fqn, unresolved = %name, "ancestor chain is partial");
                out.unresolved.push(name);
                continue;
            };
            if out.chain.len() >= self.ancestor_limit {
                out.truncated = true;
                break;
            }
            out.chain.push(Ancestor {
                fqn: symbol.qualified_name.clone(),
                via,
                depth,
            });
            push_children(&mut stack, self.direct_supertypes(&name), depth + 1);
        }
        out
    }

    /// Whether `ancestor` is `fqn` itself or one of its ancestors.
    pub fn is_same_or_ancestor(&self, ancestor: &str, fqn: &str) -> bool {
        same_type_name(ancestor, fqn) || self.ancestors_of(fqn).contains(ancestor)
    }

    /// Find the declaration `member` resolves to when looked up on `type_fqn`,
    /// walking the ancestor chain.
    pub fn find_member(
        &self,
        type_fqn: &str,
        member: &str,
        kind: SymbolKind,
    ) -> Option<&DeclaredSymbol> {
        if let Some(own) = self.lookup(kind, &member_name(type_fqn, member)) {
            return Some(own);
        }
        self.ancestors_of(type_fqn)
            .chain
            .iter()
            .find_map(|a| self.lookup(kind, &member_name(&a.fqn, member)))
    }

    /// The type (`type_fqn` or an ancestor) whose catch-all handler receives
    /// an otherwise undeclared `access`.
    pub fn catch_all_for(&self, type_fqn: &str, access: MemberAccess) -> Option<Arc<str>> {
        if let Some(own) = self.lookup_type(type_fqn) {
            if own.dispatch.handles(access) {
                return Some(own.qualified_name.clone());
            }
        }
        self.ancestors_of(type_fqn).chain.iter().find_map(|a| {
            self.lookup_type(&a.fqn)
                .filter(|s| s.dispatch.handles(access))
                .map(|s| s.qualified_name.clone())
        })
    }

    // ========================================================================
    // PENDING RELATIONSHIPS
    // ========================================================================

    /// Replace the relationships declared by `file`.
    pub fn set_pending_relationships(&mut self, file: FileId, pending: Vec<PendingRelationship>) {
        self.pending.insert(file, pending);
        self.relationships_dirty = true;
    }

    /// Link all pending relationships if anything changed since the last call.
    ///
    /// Edges inserted directly through [`upsert_relationship`](Self::upsert_relationship)
    /// are kept; file-declared edges are rebuilt from scratch in file order.
    pub fn ensure_relationships(&mut self) -> &[RejectedEdge] {
        if !self.relationships_dirty {
            return &self.rejected;
        }
        self.relationships_dirty = false;
        self.rejected.clear();

        self.edges.retain(|e| e.origin.is_none());
        self.outgoing.clear();
        for (idx, edge) in self.edges.iter().enumerate() {
            self.outgoing.entry(type_key(&edge.child)).or_default().push(idx);
        }

        let work: Vec<(FileId, PendingRelationship)> = self
            .pending
            .iter()
            .flat_map(|(&file, rels)| rels.iter().map(move |r| (file, r.clone())))
            .collect();

        for (file, rel) in work {
            let Some(parent) = self.resolve_type_ref(&rel.parent) else {
                continue;
            };
            if let Err(error) = self.insert_edge(&rel.child, &parent, rel.kind, Some(file)) {
                warn!(%file, line = rel.line + 1, %error, "relationship rejected");
                self.rejected.push(RejectedEdge {
                    file,
                    line: rel.line,
                    error,
                });
            }
        }
        &self.rejected
    }

    /// Whether pending relationships changed since they were last linked.
    pub fn relationships_dirty(&self) -> bool {
        self.relationships_dirty
    }

    /// Relationships refused by the last [`ensure_relationships`](Self::ensure_relationships).
    pub fn rejected_edges(&self) -> &[RejectedEdge] {
        &self.rejected
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

fn type_key(fqn: &str) -> Arc<str> {
    Arc::from(fold_name(SymbolKind::Class, fqn))
}

fn push_children(
    stack: &mut Vec<(Arc<str>, RelationshipKind, u32)>,
    edges: Vec<&TypeEdge>,
    depth: u32,
) {
    stack.extend(
        edges
            .into_iter()
            .rev()
            .map(|e| (e.parent.clone(), e.kind, depth)),
    );
}
