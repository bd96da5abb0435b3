//! Lexical context: the namespace, import and enclosing-type state in effect
//! at a position while a file is walked.
//!
//! A context is built fresh for every file and mutated as the walker enters
//! namespaces, reads `use` statements and enters type declarations. It is
//! never shared across files.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::syntax::UseKind;

/// Imported-name → fully-qualified-name aliases of the current namespace.
///
/// Class and function aliases are keyed case-insensitively; constant aliases
/// are matched exactly.
#[derive(Clone, Debug, Default)]
pub struct ImportTable {
    classes: FxHashMap<String, Arc<str>>,
    functions: FxHashMap<String, Arc<str>>,
    constants: FxHashMap<String, Arc<str>>,
}

impl ImportTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `local` as an alias of `target` (written with or without a
    /// leading separator). A later import of the same alias replaces it.
    pub fn add(&mut self, kind: UseKind, local: &str, target: &str) {
        let target: Arc<str> = Arc::from(target.trim_start_matches('\\'));
        let key = alias_key(kind, local);
        self.map_mut(kind).insert(key, target);
    }

    pub fn get(&self, kind: UseKind, local: &str) -> Option<&Arc<str>> {
        self.map(kind).get(&alias_key(kind, local))
    }

    pub fn len(&self) -> usize {
        self.classes.len() + self.functions.len() + self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.classes.clear();
        self.functions.clear();
        self.constants.clear();
    }

    fn map(&self, kind: UseKind) -> &FxHashMap<String, Arc<str>> {
        match kind {
            UseKind::Class => &self.classes,
            UseKind::Function => &self.functions,
            UseKind::Constant => &self.constants,
        }
    }

    fn map_mut(&mut self, kind: UseKind) -> &mut FxHashMap<String, Arc<str>> {
        match kind {
            UseKind::Class => &mut self.classes,
            UseKind::Function => &mut self.functions,
            UseKind::Constant => &mut self.constants,
        }
    }
}

fn alias_key(kind: UseKind, local: &str) -> String {
    match kind {
        UseKind::Constant => local.to_string(),
        UseKind::Class | UseKind::Function => local.to_ascii_lowercase(),
    }
}

/// Per-file, per-position resolution state.
#[derive(Clone, Debug, Default)]
pub struct LexicalContext {
    /// Current namespace without leading separator; `None` for the global namespace.
    namespace: Option<Arc<str>>,
    imports: ImportTable,
    /// Enclosing type declarations, innermost last. Anonymous classes push
    /// their synthetic name.
    type_stack: Vec<Arc<str>>,
}

impl LexicalContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context positioned inside `namespace` with no imports.
    pub fn in_namespace(namespace: &str) -> Self {
        let mut ctx = Self::new();
        ctx.enter_namespace(Some(namespace));
        ctx
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Switch namespace. Imports are scoped to a namespace declaration, so
    /// they are dropped.
    pub fn enter_namespace(&mut self, namespace: Option<&str>) {
        self.namespace = namespace
            .map(|ns| ns.trim_matches('\\'))
            .filter(|ns| !ns.is_empty())
            .map(Arc::from);
        self.imports.clear();
    }

    pub fn add_import(&mut self, kind: UseKind, local: &str, target: &str) {
        self.imports.add(kind, local, target);
    }

    pub fn imports(&self) -> &ImportTable {
        &self.imports
    }

    pub fn push_type(&mut self, fqn: impl Into<Arc<str>>) {
        self.type_stack.push(fqn.into());
    }

    pub fn pop_type(&mut self) -> Option<Arc<str>> {
        self.type_stack.pop()
    }

    /// The innermost enclosing type declaration.
    pub fn current_type(&self) -> Option<&Arc<str>> {
        self.type_stack.last()
    }

    /// `local` prefixed with the current namespace.
    pub fn qualify(&self, local: &str) -> String {
        let local = local.trim_start_matches('\\');
        match &self.namespace {
            Some(ns) => format!("{}\\{}", ns, local),
            None => local.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_switch_drops_imports() {
        let mut ctx = LexicalContext::in_namespace("\\App\\Ui");
        ctx.add_import(UseKind::Class, "Model", "\\App\\Data\\Model");
        assert_eq!(ctx.namespace(), Some("App\\Ui"));
        assert_eq!(
            ctx.imports().get(UseKind::Class, "model").map(|t| t.as_ref()),
            Some("App\\Data\\Model")
        );

        ctx.enter_namespace(None);
        assert!(ctx.namespace().is_none());
        assert!(ctx.imports().is_empty());
    }

    #[test]
    fn test_constant_aliases_are_case_sensitive() {
        let mut imports = ImportTable::new();
        imports.add(UseKind::Constant, "VERSION", "App\\VERSION");
        imports.add(UseKind::Function, "Helper", "App\\helper");

        assert!(imports.get(UseKind::Constant, "VERSION").is_some());
        assert!(imports.get(UseKind::Constant, "version").is_none());
        assert!(imports.get(UseKind::Function, "HELPER").is_some());
        assert!(imports.get(UseKind::Class, "Helper").is_none());
    }

    #[test]
    fn test_type_stack() {
        let mut ctx = LexicalContext::new();
        assert!(ctx.current_type().is_none());
        ctx.push_type("App\\Outer");
        ctx.push_type("App\\Inner");
        assert_eq!(ctx.current_type().map(|t| t.as_ref()), Some("App\\Inner"));
        ctx.pop_type();
        assert_eq!(ctx.current_type().map(|t| t.as_ref()), Some("App\\Outer"));
        assert_eq!(ctx.qualify("Widget"), "Widget");
    }
}
