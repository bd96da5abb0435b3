//! Candidate filter: a cheap text pre-pass choosing which files to walk.
//!
//! The filter may let through files without a match but must never drop a
//! file the visitor would find a match in. Member queries therefore require
//! only the member name (a subclass receiver never spells the owner's
//! name), and files with dynamic member access or reflection helpers are
//! always kept. Names the language compares without case (class-likes,
//! functions, methods) are matched ignoring ASCII case in every file.

use tracing::debug;

use super::config::SearchConfig;
use super::query::Query;
use crate::hir::SymbolKind;

/// Substrings that make a file relevant to a member query regardless of
/// its member names.
const DYNAMIC_MARKERS: &[&str] = &["->$", "->{", "::$", "::{"];

/// What a file's text must contain to be worth walking.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Patterns {
    /// All of these must appear.
    pub required: Vec<String>,
    /// Any one of these is enough on its own.
    pub sufficient: Vec<String>,
    /// `required` names something case-insensitive.
    pub ignore_case: bool,
}

impl Patterns {
    /// Derive the patterns for `query`.
    pub fn for_query(query: &Query, config: &SearchConfig) -> Self {
        match query {
            // `new Descendant()` reaches a constructor without naming it or its owner.
            Query::Member { member, .. } if member.eq_ignore_ascii_case("__construct") => {
                Self::default()
            }
            Query::Member { member, kind, .. } => {
                let mut sufficient: Vec<String> =
                    DYNAMIC_MARKERS.iter().map(|m| m.to_string()).collect();
                let mut helpers: Vec<String> = config
                    .indirect_call_functions
                    .iter()
                    .map(|f| f.to_string())
                    .collect();
                helpers.sort();
                sufficient.extend(helpers);
                Self {
                    required: vec![member.to_string()],
                    sufficient,
                    ignore_case: *kind == SymbolKind::Method,
                }
            }
            Query::Type { .. } | Query::Function { .. } => Self {
                required: vec![query.short_name().to_string()],
                sufficient: Vec::new(),
                ignore_case: true,
            },
            Query::Constant { .. } => Self {
                required: vec![query.short_name().to_string()],
                sufficient: Vec::new(),
                ignore_case: false,
            },
        }
    }

    /// No usable pattern: every file is a candidate.
    pub fn is_empty(&self) -> bool {
        self.required.iter().all(|p| p.is_empty())
    }

    fn matches(&self, text: &str, ignore_case: bool) -> bool {
        let contains = |needle: &str| {
            if ignore_case {
                contains_ignore_ascii_case(text, needle)
            } else {
                text.contains(needle)
            }
        };
        self.required.iter().all(|p| contains(p.as_str()))
            || self
                .sufficient
                .iter()
                .any(|p| contains_ignore_ascii_case(text, p))
    }
}

/// Narrow `files` to those that may reference `query`.
///
/// Case-insensitive names are matched ignoring ASCII case. Case-sensitive
/// ones (constants, properties) are matched exactly first; if that keeps
/// nothing and the config allows it, the pass is repeated ignoring case.
/// Returns indices into `files`, in order.
pub fn filter_candidates<T: AsRef<str>>(
    query: &Query,
    files: &[T],
    config: &SearchConfig,
) -> Vec<usize> {
    let patterns = Patterns::for_query(query, config);
    if patterns.is_empty() {
        return (0..files.len()).collect();
    }

    let pass = |ignore_case: bool| -> Vec<usize> {
        files
            .iter()
            .enumerate()
            .filter(|(_, text)| patterns.matches(text.as_ref(), ignore_case))
            .map(|(i, _)| i)
            .collect()
    };

    let mut candidates = pass(patterns.ignore_case);
    if candidates.is_empty() && !patterns.ignore_case && config.case_insensitive_fallback {
        candidates = pass(true);
    }
    debug!(
        %query,
        files = files.len(),
        candidates = candidates.len(),
        "filtered candidate files"
    );
    candidates
}

fn contains_ignore_ascii_case(haystack: &str, needle: &str) -> bool {
    let needle = needle.as_bytes();
    if needle.is_empty() {
        return true;
    }
    haystack
        .as_bytes()
        .windows(needle.len())
        .any(|window| window.eq_ignore_ascii_case(needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn type_query(fqn: &str) -> Query {
        Query::Type {
            fqn: Arc::from(fqn),
        }
    }

    #[test]
    fn test_type_query_requires_short_name() {
        let files = ["new Widget();", "new Gadget();", "use App\\Ui\\Widget as W;"];
        let found = filter_candidates(&type_query("App\\Ui\\Widget"), &files, &SearchConfig::default());
        assert_eq!(found, vec![0, 2]);
    }

    #[test]
    fn test_type_names_match_in_any_case() {
        let files = ["new Widget();", "new widget();", "nothing here"];
        let strict = SearchConfig::default().with_case_insensitive_fallback(false);
        assert_eq!(filter_candidates(&type_query("Widget"), &files, &strict), vec![0, 1]);

        let function = Query::Function {
            fqn: Arc::from("App\\helper"),
        };
        let calls = ["helper();", "HELPER();"];
        assert_eq!(filter_candidates(&function, &calls, &strict), vec![0, 1]);
    }

    #[test]
    fn test_case_insensitive_fallback() {
        let constant = Query::Constant {
            fqn: Arc::from("LIMIT"),
        };
        let files = ["echo limit;", "nothing here"];
        let config = SearchConfig::default();
        assert_eq!(filter_candidates(&constant, &files, &config), vec![0]);

        let strict = config.clone().with_case_insensitive_fallback(false);
        assert!(filter_candidates(&constant, &files, &strict).is_empty());

        let exact = ["echo LIMIT;", "echo limit;"];
        assert_eq!(filter_candidates(&constant, &exact, &config), vec![0]);
    }

    #[test]
    fn test_method_names_ignore_case_properties_do_not() {
        let method = Query::Member {
            owner: Arc::from("Base"),
            member: Arc::from("method"),
            kind: SymbolKind::Method,
        };
        let files = ["$d->method();", "$d->METHOD();", "$d->title;", "$d->Title;"];
        assert_eq!(filter_candidates(&method, &files, &SearchConfig::default()), vec![0, 1]);

        let property = Query::Member {
            owner: Arc::from("Base"),
            member: Arc::from("title"),
            kind: SymbolKind::Property,
        };
        assert_eq!(filter_candidates(&property, &files, &SearchConfig::default()), vec![2]);
    }

    #[test]
    fn test_member_query_keeps_dynamic_files() {
        let query = Query::Member {
            owner: Arc::from("Base"),
            member: Arc::from("method"),
            kind: SymbolKind::Method,
        };
        let files = [
            "$d->method();",
            "$d->$name();",
            "call_user_func([$d, $m]);",
            "$d->other();",
        ];
        let found = filter_candidates(&query, &files, &SearchConfig::default());
        assert_eq!(found, vec![0, 1, 2]);
    }

    #[test]
    fn test_constructor_query_scans_everything() {
        let query = Query::Member {
            owner: Arc::from("Base"),
            member: Arc::from("__construct"),
            kind: SymbolKind::Method,
        };
        let files = ["new Derived();", "echo 1;"];
        let found = filter_candidates(&query, &files, &SearchConfig::default());
        assert_eq!(found, vec![0, 1]);
    }

    #[test]
    fn test_contains_ignore_ascii_case() {
        assert!(contains_ignore_ascii_case("Call_User_Func(", "call_user_func"));
        assert!(!contains_ignore_ascii_case("abc", "abcd"));
    }
}
