//! Helpers shared by the integration tests.
//!
//! Tests assemble ASTs by hand with `usages::syntax::build`; [`Src`] finds
//! the byte ranges of the pieces inside the source text.

#![allow(dead_code)]

use usages::syntax::{Ast, SourceFile, Stmt};
use usages::{AnalysisHost, Confidence, ScoredUsage, SearchConfig, TextRange, TextSize, UsageKind};

/// Source text of one test file.
pub struct Src {
    pub path: &'static str,
    pub text: &'static str,
}

impl Src {
    pub const fn new(path: &'static str, text: &'static str) -> Self {
        Self { path, text }
    }

    /// Range of the `nth` (0-based) occurrence of `needle`.
    pub fn at(&self, needle: &str, nth: usize) -> TextRange {
        let start = self
            .text
            .match_indices(needle)
            .nth(nth)
            .map(|(i, _)| i)
            .unwrap_or_else(|| panic!("`{needle}` #{nth} not found in {}", self.path));
        TextRange::at(
            TextSize::from(start as u32),
            TextSize::from(needle.len() as u32),
        )
    }

    pub fn file(&self, stmts: Vec<Stmt>) -> SourceFile {
        SourceFile::parsed(self.path, self.text, Ast::new(stmts))
    }
}

pub fn host_with(files: Vec<SourceFile>) -> AnalysisHost {
    host_with_config(SearchConfig::default(), files)
}

pub fn host_with_config(config: SearchConfig, files: Vec<SourceFile>) -> AnalysisHost {
    let mut host = AnalysisHost::with_config(config);
    host.set_files(files);
    host
}

/// `(path, line, kind, confidence)` per usage, in result order.
pub fn summary(usages: &[ScoredUsage]) -> Vec<(&str, u32, UsageKind, Confidence)> {
    usages
        .iter()
        .map(|u| (u.path.as_ref(), u.line, u.kind, u.confidence))
        .collect()
}

pub fn has_code(diagnostics: &[usages::Diagnostic], code: &str) -> bool {
    diagnostics.iter().any(|d| d.code == code)
}
