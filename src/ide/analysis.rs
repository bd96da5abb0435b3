//! `AnalysisHost` owns the indexed corpus; `Analysis` is an immutable
//! snapshot that answers usage searches.
//!
//! Indexing goes through the host and is sequential per file. A snapshot
//! shares the symbol table and the file map by `Arc`; indexing after a
//! snapshot was taken copies them on write, so searches in flight keep a
//! consistent view.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use text_size::TextRange;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::config::SearchConfig;
use super::filter::filter_candidates;
use super::query::{Query, QueryError, parse_query};
use super::score::{Confidence, score};
use super::visitor::{RawUsage, Resolution, UsageKind, UsageSink, UsageVisitor};
use crate::base::{FileId, LineIndex};
use crate::hir::{
    Ancestors, CacheKey, ContentHash, Diagnostic, DiagnosticCollector, FileSet, IndexCache,
    IndexEntry, LexicalContext, SymbolTable, collect_declarations,
};
use crate::syntax::SourceFile;

/// Failures that abort a whole search. Everything else is reported as a
/// [`Diagnostic`] next to the results.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SearchError {
    #[error("no files have been indexed")]
    NoFiles,
    #[error("invalid search configuration: {0}")]
    InvalidConfig(String),
    #[error("search was cancelled")]
    Cancelled,
}

// ============================================================================
// RESULTS
// ============================================================================

/// Lines surrounding a usage. Line numbers are 1-indexed and inclusive.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ContextWindow {
    pub start_line: u32,
    pub end_line: u32,
    pub lines: Vec<Arc<str>>,
}

impl ContextWindow {
    /// `radius` lines either side of the 0-indexed `line`, clipped to the file.
    pub fn around(lines: &LineIndex, text: &str, line: u32, radius: u32) -> Self {
        let last = (lines.line_count() as u32).saturating_sub(1);
        let line = line.min(last);
        let start = line.saturating_sub(radius);
        let end = line.saturating_add(radius).min(last);
        Self {
            start_line: start + 1,
            end_line: end + 1,
            lines: (start..=end)
                .map(|l| Arc::from(lines.line_text(text, l).unwrap_or("")))
                .collect(),
        }
    }
}

/// One reported reference site.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ScoredUsage {
    pub path: Arc<str>,
    /// 1-indexed.
    pub line: u32,
    /// 1-indexed, in bytes.
    pub column: u32,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub range: TextRange,
    pub snippet: Arc<str>,
    pub kind: UsageKind,
    pub confidence: Confidence,
    pub context: ContextWindow,
}

/// Usages ranked best first, plus everything that went wrong on the way.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SearchResult {
    pub usages: Vec<ScoredUsage>,
    pub diagnostics: Vec<Diagnostic>,
}

impl SearchResult {
    pub fn len(&self) -> usize {
        self.usages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.usages.is_empty()
    }

    pub fn with_confidence(&self, tier: Confidence) -> impl Iterator<Item = &ScoredUsage> {
        self.usages.iter().filter(move |u| u.confidence == tier)
    }
}

// ============================================================================
// HOST
// ============================================================================

/// Owns the indexed files and the symbol table built from them.
pub struct AnalysisHost {
    files: Arc<IndexMap<FileId, Arc<SourceFile>>>,
    file_set: FileSet,
    table: Arc<SymbolTable>,
    config: SearchConfig,
    cache: Option<Arc<dyn IndexCache>>,
}

impl Default for AnalysisHost {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AnalysisHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisHost")
            .field("files", &self.files.len())
            .field("symbols", &self.table.len())
            .field("config", &self.config)
            .field("cached", &self.cache.is_some())
            .finish()
    }
}

impl AnalysisHost {
    pub fn new() -> Self {
        Self::with_config(SearchConfig::default())
    }

    pub fn with_config(config: SearchConfig) -> Self {
        let table = SymbolTable::new().with_ancestor_limit(config.max_ancestor_depth);
        Self {
            files: Arc::new(IndexMap::new()),
            file_set: FileSet::new(),
            table: Arc::new(table),
            config,
            cache: None,
        }
    }

    /// Reuse declaration entries across hosts or runs.
    pub fn with_cache(mut self, cache: Arc<dyn IndexCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: SearchConfig) {
        if config.max_ancestor_depth != self.table.ancestor_limit() {
            Arc::make_mut(&mut self.table).set_ancestor_limit(config.max_ancestor_depth);
        }
        self.config = config;
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn file_set(&self) -> &FileSet {
        &self.file_set
    }

    /// Index one file, replacing whatever it declared before.
    ///
    /// Files whose contents are unchanged since they were last indexed are
    /// skipped.
    pub fn set_file(&mut self, file: SourceFile) -> FileId {
        let id = self.file_set.file_id(&file.path);
        let hash = ContentHash::of(&file.text);
        if self.is_unchanged(id, &hash) {
            trace!(path = %file.path, "contents unchanged, skipping");
            return id;
        }
        let entry = self.collect(&file, id, &hash);
        self.install(id, file, hash, entry);
        id
    }

    /// Index a batch of files. Declarations are collected in parallel and
    /// installed in order, so later files still win on conflicts.
    pub fn set_files(&mut self, files: Vec<SourceFile>) -> Vec<FileId> {
        let ids: Vec<FileId> = files.iter().map(|f| self.file_set.file_id(&f.path)).collect();

        let this = &*self;
        let collected: Vec<(ContentHash, bool, Option<Arc<IndexEntry>>)> = files
            .par_iter()
            .zip(ids.par_iter())
            .map(|(file, &id)| {
                let hash = ContentHash::of(&file.text);
                if this.is_unchanged(id, &hash) {
                    (hash, true, None)
                } else {
                    let entry = this.collect(file, id, &hash);
                    (hash, false, entry)
                }
            })
            .collect();

        for ((file, &id), (hash, unchanged, entry)) in files.into_iter().zip(&ids).zip(collected) {
            if !unchanged {
                self.install(id, file, hash, entry);
            }
        }
        debug!(files = ids.len(), symbols = self.table.len(), "indexed batch");
        ids
    }

    /// Drop a file and everything it declared. Returns whether it was indexed.
    pub fn remove_file(&mut self, path: &str) -> bool {
        let Some(id) = self.file_set.lookup(path) else {
            return false;
        };
        if Arc::make_mut(&mut self.files).shift_remove(&id).is_none() {
            return false;
        }
        Arc::make_mut(&mut self.table).remove_file(id);
        self.file_set.forget(id);
        if let Some(cache) = &self.cache {
            cache.invalidate(path);
        }
        debug!(%path, "removed file");
        true
    }

    /// A read-only snapshot for searching. Links pending relationships first.
    pub fn analysis(&mut self) -> Analysis {
        if self.table.relationships_dirty() {
            let table = Arc::make_mut(&mut self.table);
            let rejected = table.ensure_relationships().len();
            debug!(edges = table.edge_count(), rejected, "linked relationships");
        }
        Analysis {
            files: Arc::clone(&self.files),
            table: Arc::clone(&self.table),
            config: self.config.clone(),
        }
    }

    fn is_unchanged(&self, id: FileId, hash: &ContentHash) -> bool {
        self.files.contains_key(&id) && self.file_set.hash(id).as_ref() == Some(hash)
    }

    /// Declarations of `file`, from the cache when possible. `None` when the
    /// file has no syntax tree.
    fn collect(&self, file: &SourceFile, id: FileId, hash: &ContentHash) -> Option<Arc<IndexEntry>> {
        let ast = file.ast.as_ref()?;
        let key = CacheKey {
            path: file.path.clone(),
            hash: hash.clone(),
        };
        if let Some(hit) = self.cache.as_ref().and_then(|c| c.get(&key)) {
            trace!(path = %file.path, "index cache hit");
            return Some(hit);
        }
        let entry = collect_declarations(id, ast, &LineIndex::new(&file.text));
        if let Some(cache) = &self.cache {
            cache.put(key, entry.clone());
        }
        Some(Arc::new(entry))
    }

    fn install(&mut self, id: FileId, file: SourceFile, hash: ContentHash, entry: Option<Arc<IndexEntry>>) {
        let table = Arc::make_mut(&mut self.table);
        table.remove_file(id);
        let (symbols, relationships) = match entry {
            Some(entry) => {
                for symbol in &entry.symbols {
                    let mut symbol = symbol.clone();
                    symbol.file = id;
                    table.upsert_symbol(symbol);
                }
                (entry.symbols.len(), entry.relationships.clone())
            }
            None => (0, Vec::new()),
        };
        let relationship_count = relationships.len();
        table.set_pending_relationships(id, relationships);
        self.file_set.set_hash(id, hash);
        debug!(path = %file.path, %id, symbols, relationships = relationship_count, "indexed file");
        Arc::make_mut(&mut self.files).insert(id, Arc::new(file));
    }
}

// ============================================================================
// ANALYSIS SNAPSHOT
// ============================================================================

/// Immutable view of the corpus. Cheap to clone and safe to share.
#[derive(Clone, Debug)]
pub struct Analysis {
    files: Arc<IndexMap<FileId, Arc<SourceFile>>>,
    table: Arc<SymbolTable>,
    config: SearchConfig,
}

impl Analysis {
    pub fn table(&self) -> &SymbolTable {
        &self.table
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn file(&self, id: FileId) -> Option<&SourceFile> {
        self.files.get(&id).map(|f| f.as_ref())
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Parse and bind a query string.
    pub fn resolve_query(&self, raw: &str) -> Result<Query, QueryError> {
        parse_query(raw).map(|parsed| Query::resolve(parsed, &self.table))
    }

    pub fn ancestors(&self, fqn: &str) -> Ancestors {
        self.table.ancestors_of(fqn)
    }

    /// Find every usage of the symbol named by `query`.
    pub fn find_usages(&self, query: &str) -> Result<SearchResult, SearchError> {
        self.find_usages_with_cancel(query, &CancellationToken::new())
    }

    /// [`find_usages`](Self::find_usages), stopping early once `cancel` fires.
    ///
    /// A malformed query yields an empty result with a warning, not an error.
    pub fn find_usages_with_cancel(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<SearchResult, SearchError> {
        self.config.validate()?;
        if self.files.is_empty() {
            return Err(SearchError::NoFiles);
        }

        let mut diagnostics = DiagnosticCollector::new();
        self.report_index_problems(&mut diagnostics);

        let query = match self.resolve_query(query) {
            Ok(query) => query,
            Err(error) => {
                debug!(%query, %error, "malformed query");
                diagnostics.malformed_query(query, &error.to_string());
                return Ok(SearchResult {
                    usages: Vec::new(),
                    diagnostics: diagnostics.take_sorted(),
                });
            }
        };
        if let Query::Member { owner, .. } = &query {
            let ancestors = self.table.ancestors_of(owner);
            if ancestors.is_partial() && self.table.contains_type(owner) {
                diagnostics.partial_ancestors(owner, &ancestors.unresolved, ancestors.truncated);
            }
        }

        let files: Vec<&Arc<SourceFile>> = self.files.values().collect();
        let texts: Vec<&str> = files.iter().map(|f| f.text.as_ref()).collect();
        let candidates = filter_candidates(&query, &texts, &self.config);

        let search = |index: &usize| -> Option<FileResult> {
            if cancel.is_cancelled() {
                return None;
            }
            Some(self.search_file(&query, files[*index]))
        };
        let results: Vec<Option<FileResult>> = if self.config.parallel {
            candidates.par_iter().map(search).collect()
        } else {
            candidates.iter().map(search).collect()
        };
        if cancel.is_cancelled() {
            debug!(%query, "search cancelled");
            return Err(SearchError::Cancelled);
        }

        let mut usages = Vec::new();
        for result in results.into_iter().flatten() {
            usages.extend(result.usages);
            diagnostics.extend(result.diagnostics);
        }
        rank(&mut usages);
        debug!(
            %query,
            files = files.len(),
            candidates = candidates.len(),
            usages = usages.len(),
            "search finished"
        );
        Ok(SearchResult {
            usages,
            diagnostics: diagnostics.take_sorted(),
        })
    }

    /// Parse failures and rejected relationships, reported with every search.
    fn report_index_problems(&self, diagnostics: &mut DiagnosticCollector) {
        for file in self.files.values() {
            if file.ast.is_some() {
                continue;
            }
            warn!(path = %file.path, errors = file.errors.len(), "file has no syntax tree");
            if file.errors.is_empty() {
                diagnostics.parse_failure(&file.path, None, "no syntax tree was produced");
                continue;
            }
            let lines = LineIndex::new(&file.text);
            for error in &file.errors {
                let line = error
                    .range
                    .map(|r| lines.line_col(r.start()).line_one_indexed());
                diagnostics.parse_failure(&file.path, line, &error.message);
            }
        }

        for rejected in self.table.rejected_edges() {
            let path = self
                .files
                .get(&rejected.file)
                .map(|f| f.path.clone())
                .unwrap_or_else(|| Arc::from(rejected.file.to_string()));
            diagnostics.relationship_cycle(&path, rejected.line + 1, &rejected.error.to_string());
        }
    }

    fn search_file(&self, query: &Query, file: &SourceFile) -> FileResult {
        let mut result = FileResult::default();
        let Some(ast) = &file.ast else {
            return result;
        };
        if file.text.len() > self.config.max_file_bytes {
            warn!(path = %file.path, bytes = file.text.len(), "file too large, skipped");
            let mut diagnostics = DiagnosticCollector::new();
            diagnostics.oversized_file(&file.path, file.text.len(), self.config.max_file_bytes);
            result.diagnostics = diagnostics.take();
            return result;
        }

        let mut sink = ScoringSink {
            text: &file.text,
            lines: LineIndex::new(&file.text),
            radius: self.config.context_radius,
            limit: self.config.max_usages_per_file,
            usages: Vec::new(),
            diagnostics: DiagnosticCollector::new(),
            truncated: false,
        };
        UsageVisitor::new(query, &self.table, &self.config).visit_with(
            ast,
            &file.text,
            &file.path,
            &mut sink,
        );
        result.usages = sink.usages;
        result.diagnostics = sink.diagnostics.take();
        result
    }
}

#[derive(Default)]
struct FileResult {
    usages: Vec<ScoredUsage>,
    diagnostics: Vec<Diagnostic>,
}

/// Scores usages as the visitor emits them, while the lexical context at
/// the site is still available.
struct ScoringSink<'f> {
    text: &'f str,
    lines: LineIndex,
    radius: u32,
    limit: usize,
    usages: Vec<ScoredUsage>,
    diagnostics: DiagnosticCollector,
    truncated: bool,
}

impl UsageSink for ScoringSink<'_> {
    fn accept(&mut self, usage: RawUsage, ctx: &LexicalContext) {
        if self.usages.len() >= self.limit {
            if !self.truncated {
                self.truncated = true;
                warn!(path = %usage.path, limit = self.limit, "usage limit reached");
                self.diagnostics.truncated_results(&usage.path, self.limit);
            }
            return;
        }
        if let Resolution::Unresolved(name) = &usage.evidence.resolution {
            self.diagnostics.unresolved_name(&usage.path, usage.line, name);
        }

        let confidence = score(&usage, ctx);
        let context =
            ContextWindow::around(&self.lines, self.text, usage.line.saturating_sub(1), self.radius);
        self.usages.push(ScoredUsage {
            path: usage.path,
            line: usage.line,
            column: usage.column,
            range: usage.range,
            snippet: usage.snippet,
            kind: usage.kind,
            confidence,
            context,
        });
    }
}

/// Best first; the same site reported twice under one kind keeps its best tier.
fn rank(usages: &mut Vec<ScoredUsage>) {
    usages.sort_by(|a, b| {
        b.confidence
            .cmp(&a.confidence)
            .then_with(|| a.path.cmp(&b.path))
            .then_with(|| a.line.cmp(&b.line))
            .then_with(|| a.column.cmp(&b.column))
            .then_with(|| a.kind.cmp(&b.kind))
    });
    let mut seen: FxHashSet<(Arc<str>, TextRange, UsageKind)> = FxHashSet::default();
    usages.retain(|u| seen.insert((u.path.clone(), u.range, u.kind)));
}
