//! Search configuration.

use rustc_hash::FxHashSet;
use smol_str::SmolStr;

use super::SearchError;

const BUILTIN_FUNCTIONS: &[&str] = &[
    "array_filter", "array_key_exists", "array_keys", "array_map", "array_merge",
    "array_values", "count", "explode", "implode", "in_array", "is_array", "is_string",
    "json_decode", "json_encode", "sprintf", "str_contains", "str_replace", "strlen",
    "strtolower", "strtoupper", "substr", "trim",
];

const BUILTIN_CONSTANTS: &[&str] = &[
    "PHP_EOL", "PHP_INT_MAX", "PHP_INT_MIN", "PHP_VERSION", "E_ALL", "E_ERROR", "E_WARNING",
    "DIRECTORY_SEPARATOR", "JSON_THROW_ON_ERROR", "SORT_STRING",
];

const INDIRECT_CALL_FUNCTIONS: &[&str] = &[
    "call_user_func",
    "call_user_func_array",
    "forward_static_call",
    "forward_static_call_array",
    "is_callable",
    "method_exists",
    "property_exists",
    "constant",
];

/// Tunables for one search. All policy parameters live here rather than in
/// the algorithms.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SearchConfig {
    /// Lines before and after a usage in its context window.
    pub context_radius: u32,
    /// Assignment hops a mediating value may be traced through before the
    /// site is treated as untraceable.
    pub trace_hop_limit: u32,
    /// Global functions the resolver accepts when nothing user-declared
    /// matches. Lower case.
    pub builtin_functions: FxHashSet<SmolStr>,
    /// Global constants the resolver accepts when nothing user-declared matches.
    pub builtin_constants: FxHashSet<SmolStr>,
    /// Reflection-style helpers whose string or callable arguments name
    /// functions and members. Lower case.
    pub indirect_call_functions: FxHashSet<SmolStr>,
    /// Retry the candidate filter case-insensitively when the exact pass
    /// for a case-sensitive name (constant, property) finds nothing.
    pub case_insensitive_fallback: bool,
    /// Files larger than this are skipped with a warning.
    pub max_file_bytes: usize,
    /// Usages kept per file; the rest are dropped with a warning.
    pub max_usages_per_file: usize,
    /// Bound on any ancestor walk.
    pub max_ancestor_depth: usize,
    /// Visit candidate files on the rayon pool.
    pub parallel: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            context_radius: 2,
            trace_hop_limit: 3,
            builtin_functions: to_set(BUILTIN_FUNCTIONS),
            builtin_constants: to_set(BUILTIN_CONSTANTS),
            indirect_call_functions: to_set(INDIRECT_CALL_FUNCTIONS),
            case_insensitive_fallback: true,
            max_file_bytes: 8 * 1024 * 1024,
            max_usages_per_file: 10_000,
            max_ancestor_depth: crate::hir::DEFAULT_ANCESTOR_LIMIT,
            parallel: true,
        }
    }
}

fn to_set(items: &[&str]) -> FxHashSet<SmolStr> {
    items.iter().map(|s| SmolStr::new(s)).collect()
}

impl SearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context_radius(mut self, radius: u32) -> Self {
        self.context_radius = radius;
        self
    }

    pub fn with_trace_hop_limit(mut self, hops: u32) -> Self {
        self.trace_hop_limit = hops;
        self
    }

    pub fn with_builtin_functions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.builtin_functions = names
            .into_iter()
            .map(|n| SmolStr::new(n.as_ref().to_ascii_lowercase()))
            .collect();
        self
    }

    pub fn with_builtin_constants<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.builtin_constants = names.into_iter().map(|n| SmolStr::new(n.as_ref())).collect();
        self
    }

    pub fn with_indirect_call_functions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.indirect_call_functions = names
            .into_iter()
            .map(|n| SmolStr::new(n.as_ref().to_ascii_lowercase()))
            .collect();
        self
    }

    pub fn with_case_insensitive_fallback(mut self, enabled: bool) -> Self {
        self.case_insensitive_fallback = enabled;
        self
    }

    pub fn with_max_file_bytes(mut self, bytes: usize) -> Self {
        self.max_file_bytes = bytes;
        self
    }

    pub fn with_max_usages_per_file(mut self, limit: usize) -> Self {
        self.max_usages_per_file = limit;
        self
    }

    pub fn with_max_ancestor_depth(mut self, depth: usize) -> Self {
        self.max_ancestor_depth = depth;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Whether `name` is a reflection-style helper.
    pub fn is_indirect_call(&self, name: &str) -> bool {
        let name = name.trim_start_matches('\\');
        self.indirect_call_functions
            .contains(name.to_ascii_lowercase().as_str())
    }

    pub fn validate(&self) -> Result<(), SearchError> {
        let invalid = |reason: &str| Err(SearchError::InvalidConfig(reason.to_string()));
        if self.trace_hop_limit == 0 {
            return invalid("trace_hop_limit must be at least 1");
        }
        if self.max_usages_per_file == 0 {
            return invalid("max_usages_per_file must be at least 1");
        }
        if self.max_ancestor_depth == 0 {
            return invalid("max_ancestor_depth must be at least 1");
        }
        Ok(())
    }
}
