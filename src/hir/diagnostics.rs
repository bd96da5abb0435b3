//! Diagnostics: the structured error summary returned next to results.
//!
//! Nothing in the engine aborts a search because of a single bad file or
//! name. Such conditions become [`Diagnostic`]s, accumulated in a
//! [`DiagnosticCollector`] and surfaced alongside whatever usages were found.

use std::fmt;
use std::sync::Arc;

// ============================================================================
// DIAGNOSTIC TYPES
// ============================================================================

/// Severity level of a diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

/// What went wrong, broadly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Category {
    /// The upstream front-end could not produce a tree for a file.
    Parse,
    /// A name could not be resolved; the site is still reported as dynamic.
    Unresolved,
    /// An inheritance edge was dropped because it would close a cycle.
    Cycle,
    /// A size or depth bound was hit.
    Resource,
    /// The query string itself was unusable.
    Query,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Parse => "parse",
            Category::Unresolved => "unresolved",
            Category::Cycle => "cycle",
            Category::Resource => "resource",
            Category::Query => "query",
        }
    }
}

/// One entry of the error summary.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Diagnostic {
    pub category: Category,
    pub severity: Severity,
    /// Path of the file concerned; `None` for query-level problems.
    pub file: Option<Arc<str>>,
    /// 1-indexed line, when known.
    pub line: Option<u32>,
    /// Verbatim text of that line.
    pub snippet: Option<Arc<str>>,
    /// Stable code (see [`codes`]).
    pub code: &'static str,
    pub message: Arc<str>,
}

impl Diagnostic {
    pub fn error(category: Category, code: &'static str, message: impl Into<Arc<str>>) -> Self {
        Self::new(category, Severity::Error, code, message)
    }

    pub fn warning(category: Category, code: &'static str, message: impl Into<Arc<str>>) -> Self {
        Self::new(category, Severity::Warning, code, message)
    }

    fn new(
        category: Category,
        severity: Severity,
        code: &'static str,
        message: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            category,
            severity,
            file: None,
            line: None,
            snippet: None,
            code,
            message: message.into(),
        }
    }

    pub fn in_file(mut self, path: impl Into<Arc<str>>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Attach a 1-indexed line.
    pub fn at_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_snippet(mut self, snippet: impl Into<Arc<str>>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }

    fn sort_key(&self) -> (Option<&str>, Option<u32>, &'static str, &str) {
        (self.file.as_deref(), self.line, self.code, &self.message)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.severity.as_str(), self.code)?;
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, " {}:{}", file, line)?,
            (Some(file), None) => write!(f, " {}", file)?,
            _ => {}
        }
        write!(f, ": {}", self.message)
    }
}

// ============================================================================
// DIAGNOSTIC CODES
// ============================================================================

/// Stable diagnostic codes.
pub mod codes {
    /// The front-end produced no tree for a file.
    pub const PARSE_FAILURE: &str = "E0001";
    /// An inheritance edge would create a cycle.
    pub const RELATIONSHIP_CYCLE: &str = "E0002";

    /// A name could not be resolved.
    pub const UNRESOLVED_NAME: &str = "W0001";
    /// A file produced more usages than the per-file bound.
    pub const TRUNCATED_RESULTS: &str = "W0002";
    /// A file exceeded the size bound and was skipped.
    pub const OVERSIZED_FILE: &str = "W0003";
    /// The query string was empty or malformed.
    pub const MALFORMED_QUERY: &str = "W0004";
    /// An ancestor walk stopped early.
    pub const PARTIAL_ANCESTORS: &str = "W0005";
}

// ============================================================================
// DIAGNOSTIC COLLECTOR
// ============================================================================

/// Collects diagnostics during indexing and search.
#[derive(Clone, Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.extend(diagnostics);
    }

    /// The front-end could not produce a tree for `path`.
    pub fn parse_failure(&mut self, path: &str, line: Option<u32>, message: &str) {
        let mut diag = Diagnostic::error(
            Category::Parse,
            codes::PARSE_FAILURE,
            format!("could not parse file: {}", message),
        )
        .in_file(path);
        diag.line = line;
        self.add(diag);
    }

    /// An inheritance edge declared at `line` (1-indexed) was dropped.
    pub fn relationship_cycle(&mut self, path: &str, line: u32, message: &str) {
        self.add(
            Diagnostic::error(Category::Cycle, codes::RELATIONSHIP_CYCLE, message)
                .in_file(path)
                .at_line(line),
        );
    }

    pub fn unresolved_name(&mut self, path: &str, line: u32, name: &str) {
        self.add(
            Diagnostic::warning(
                Category::Unresolved,
                codes::UNRESOLVED_NAME,
                format!("unresolved name '{}'", name),
            )
            .in_file(path)
            .at_line(line),
        );
    }

    pub fn truncated_results(&mut self, path: &str, limit: usize) {
        self.add(
            Diagnostic::warning(
                Category::Resource,
                codes::TRUNCATED_RESULTS,
                format!("more than {} usages in file; remaining sites dropped", limit),
            )
            .in_file(path),
        );
    }

    pub fn oversized_file(&mut self, path: &str, size: usize, limit: usize) {
        self.add(
            Diagnostic::warning(
                Category::Resource,
                codes::OVERSIZED_FILE,
                format!("file is {} bytes, above the {} byte limit; skipped", size, limit),
            )
            .in_file(path),
        );
    }

    pub fn malformed_query(&mut self, query: &str, reason: &str) {
        self.add(Diagnostic::warning(
            Category::Query,
            codes::MALFORMED_QUERY,
            format!("malformed query '{}': {}", query, reason),
        ));
    }

    /// The supertypes of `type_fqn` could only be walked partially.
    pub fn partial_ancestors(&mut self, type_fqn: &str, unresolved: &[Arc<str>], truncated: bool) {
        let mut message = format!("ancestors of '{}' are incomplete", type_fqn);
        if !unresolved.is_empty() {
            let names: Vec<&str> = unresolved.iter().map(|n| n.as_ref()).collect();
            message.push_str(&format!("; undeclared: {}", names.join(", ")));
        }
        if truncated {
            message.push_str("; depth limit reached");
        }
        self.add(Diagnostic::warning(
            Category::Resource,
            codes::PARTIAL_ANCESTORS,
            message,
        ));
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn diagnostics_for_file(&self, path: &str) -> Vec<&Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.file.as_deref() == Some(path))
            .collect()
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Take all diagnostics in a stable order (file, line, code), removing
    /// exact duplicates, and leave the collector empty.
    pub fn take_sorted(&mut self) -> Vec<Diagnostic> {
        let mut out = std::mem::take(&mut self.diagnostics);
        out.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        out.dedup();
        out
    }

    pub fn take(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    pub fn clear(&mut self) {
        self.diagnostics.clear();
    }
}
