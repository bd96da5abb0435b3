//! Declared symbols and the structural relationships between them.

use std::sync::Arc;

use crate::base::FileId;
pub use crate::syntax::Visibility;

/// Separator between an owning type and a member in a qualified name.
pub const MEMBER_SEPARATOR: &str = "::";

// ============================================================================
// SYMBOL KIND
// ============================================================================

/// What kind of entity a declared symbol is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SymbolKind {
    Class,
    Interface,
    Trait,
    Enum,
    Function,
    Method,
    Property,
    /// Global constants, class constants and enum cases.
    Constant,
}

impl SymbolKind {
    /// Kinds that share the type namespace.
    pub const CLASS_LIKE: [SymbolKind; 4] = [
        SymbolKind::Class,
        SymbolKind::Interface,
        SymbolKind::Trait,
        SymbolKind::Enum,
    ];

    pub fn is_class_like(&self) -> bool {
        matches!(
            self,
            SymbolKind::Class | SymbolKind::Interface | SymbolKind::Trait | SymbolKind::Enum
        )
    }

    /// Methods, properties and class constants (when owned by a type).
    pub fn is_member_kind(&self) -> bool {
        matches!(
            self,
            SymbolKind::Method | SymbolKind::Property | SymbolKind::Constant
        )
    }

    /// Whether the language compares names of this kind case-insensitively.
    ///
    /// Applies to the member part only; owning types are always case-insensitive.
    pub fn is_case_insensitive(&self) -> bool {
        !matches!(self, SymbolKind::Property | SymbolKind::Constant)
    }

    pub fn display(&self) -> &'static str {
        match self {
            SymbolKind::Class => "class",
            SymbolKind::Interface => "interface",
            SymbolKind::Trait => "trait",
            SymbolKind::Enum => "enum",
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Property => "property",
            SymbolKind::Constant => "constant",
        }
    }
}

impl From<crate::syntax::ClassKind> for SymbolKind {
    fn from(kind: crate::syntax::ClassKind) -> Self {
        use crate::syntax::ClassKind;
        match kind {
            ClassKind::Class => SymbolKind::Class,
            ClassKind::Interface => SymbolKind::Interface,
            ClassKind::Trait => SymbolKind::Trait,
            ClassKind::Enum => SymbolKind::Enum,
        }
    }
}

// ============================================================================
// KEYS
// ============================================================================

/// Table key: kind plus the case-folded qualified name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SymbolKey {
    pub kind: SymbolKind,
    pub folded: Arc<str>,
}

impl SymbolKey {
    pub fn new(kind: SymbolKind, qualified_name: &str) -> Self {
        Self {
            kind,
            folded: Arc::from(fold_name(kind, qualified_name)),
        }
    }
}

/// Case-fold a qualified name according to the language rules for `kind`.
///
/// Namespaces and type names fold to lower case. The final segment of a
/// constant or property stays as written.
pub fn fold_name(kind: SymbolKind, qualified_name: &str) -> String {
    let name = qualified_name.trim_start_matches('\\');
    if kind.is_case_insensitive() {
        return name.to_ascii_lowercase();
    }
    if let Some((owner, member)) = name.rsplit_once(MEMBER_SEPARATOR) {
        return format!("{}{}{}", owner.to_ascii_lowercase(), MEMBER_SEPARATOR, member);
    }
    match name.rsplit_once('\\') {
        Some((ns, local)) => format!("{}\\{}", ns.to_ascii_lowercase(), local),
        None => name.to_string(),
    }
}

/// Case-insensitive equality for type and function names.
pub fn same_type_name(a: &str, b: &str) -> bool {
    a.trim_start_matches('\\')
        .eq_ignore_ascii_case(b.trim_start_matches('\\'))
}

/// `Owner::member`
pub fn member_name(owner: &str, member: &str) -> String {
    format!("{}{}{}", owner, MEMBER_SEPARATOR, member)
}

// ============================================================================
// DECLARED SYMBOL
// ============================================================================

/// A reference to a type as written in a declaration, kept as an ordered list
/// of candidate qualified names. The first candidate that exists in the
/// table when it is consulted wins; when none exists the first one is used
/// as the deferred (not-yet-indexed) target.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeRef {
    pub candidates: Vec<Arc<str>>,
}

impl TypeRef {
    pub fn single(fqn: impl Into<Arc<str>>) -> Self {
        Self {
            candidates: vec![fqn.into()],
        }
    }

    pub fn preferred(&self) -> Option<&Arc<str>> {
        self.candidates.first()
    }
}

/// Catch-all handlers a type declares (directly, not inherited).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct DispatchHandlers {
    /// `__call`
    pub call: bool,
    /// `__callStatic`
    pub call_static: bool,
    /// `__get` / `__set` / `__isset` / `__unset`
    pub property: bool,
}

impl DispatchHandlers {
    pub fn any(&self) -> bool {
        self.call || self.call_static || self.property
    }

    /// Record a method name if it is one of the catch-all handlers.
    pub fn note_method(&mut self, method: &str) {
        match method.to_ascii_lowercase().as_str() {
            "__call" => self.call = true,
            "__callstatic" => self.call_static = true,
            "__get" | "__set" | "__isset" | "__unset" => self.property = true,
            _ => {}
        }
    }

    pub fn handles(&self, access: MemberAccess) -> bool {
        match access {
            MemberAccess::InstanceMethod => self.call,
            MemberAccess::StaticMethod => self.call_static,
            MemberAccess::InstanceProperty => self.property,
            MemberAccess::StaticProperty | MemberAccess::Constant => false,
        }
    }
}

/// The syntactic shape of a member access, used to pick symbol kinds and
/// catch-all handlers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemberAccess {
    InstanceMethod,
    StaticMethod,
    InstanceProperty,
    StaticProperty,
    Constant,
}

impl MemberAccess {
    pub fn symbol_kind(self) -> SymbolKind {
        match self {
            MemberAccess::InstanceMethod | MemberAccess::StaticMethod => SymbolKind::Method,
            MemberAccess::InstanceProperty | MemberAccess::StaticProperty => SymbolKind::Property,
            MemberAccess::Constant => SymbolKind::Constant,
        }
    }
}

/// One declared entity.
#[derive(Clone, Debug, PartialEq)]
pub struct DeclaredSymbol {
    /// Local name (`render`, `Widget`).
    pub name: Arc<str>,
    /// Canonical qualified name (`App\Ui\Widget`, `App\Ui\Widget::render`).
    pub qualified_name: Arc<str>,
    pub kind: SymbolKind,
    pub file: FileId,
    /// 0-indexed position of the declaration name.
    pub start_line: u32,
    pub start_col: u32,
    pub visibility: Option<Visibility>,
    pub is_static: bool,
    /// Owning type for members.
    pub owner: Option<Arc<str>>,
    /// Property type, or return type for methods and functions.
    pub declared_type: Vec<TypeRef>,
    /// Catch-all handlers (class-likes only).
    pub dispatch: DispatchHandlers,
}

impl DeclaredSymbol {
    pub fn new(
        kind: SymbolKind,
        qualified_name: impl Into<Arc<str>>,
        file: FileId,
    ) -> Self {
        let qualified_name: Arc<str> = qualified_name.into();
        let (owner, name) = match qualified_name.rsplit_once(MEMBER_SEPARATOR) {
            Some((owner, member)) if kind.is_member_kind() => {
                (Some(Arc::from(owner)), Arc::from(member))
            }
            _ => {
                let local = qualified_name
                    .rsplit('\\')
                    .next()
                    .unwrap_or(qualified_name.as_ref());
                (None, Arc::from(local))
            }
        };
        Self {
            name,
            qualified_name,
            kind,
            file,
            start_line: 0,
            start_col: 0,
            visibility: None,
            is_static: false,
            owner,
            declared_type: Vec::new(),
            dispatch: DispatchHandlers::default(),
        }
    }

    pub fn key(&self) -> SymbolKey {
        SymbolKey::new(self.kind, &self.qualified_name)
    }

    pub fn with_position(mut self, line: u32, col: u32) -> Self {
        self.start_line = line;
        self.start_col = col;
        self
    }
}

// ============================================================================
// RELATIONSHIPS
// ============================================================================

/// Directed edge kinds between class-like symbols.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RelationshipKind {
    Extends,
    Implements,
    UsesTrait,
}

impl RelationshipKind {
    pub fn display(&self) -> &'static str {
        match self {
            RelationshipKind::Extends => "extends",
            RelationshipKind::Implements => "implements",
            RelationshipKind::UsesTrait => "uses",
        }
    }
}

impl std::fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display())
    }
}

/// One stored edge `child -> parent`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeEdge {
    pub child: Arc<str>,
    pub parent: Arc<str>,
    pub kind: RelationshipKind,
    /// File whose declaration produced the edge; `None` for edges inserted
    /// directly through the table API.
    pub origin: Option<FileId>,
}

/// One entry of a linearized ancestor chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ancestor {
    pub fqn: Arc<str>,
    /// Kind of the edge that reached this ancestor.
    pub via: RelationshipKind,
    /// 1 for direct supertypes.
    pub depth: u32,
}

/// Result of [`SymbolTable::ancestors_of`](super::SymbolTable::ancestors_of).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Ancestors {
    /// Closest first; no duplicates.
    pub chain: Vec<Ancestor>,
    /// Edge targets that are not (yet) declared; their branches stop there.
    pub unresolved: Vec<Arc<str>>,
    /// The walk hit the depth bound.
    pub truncated: bool,
}

impl Ancestors {
    pub fn is_partial(&self) -> bool {
        !self.unresolved.is_empty() || self.truncated
    }

    pub fn contains(&self, fqn: &str) -> bool {
        self.chain.iter().any(|a| same_type_name(&a.fqn, fqn))
    }

    pub fn names(&self) -> impl Iterator<Item = &Arc<str>> {
        self.chain.iter().map(|a| &a.fqn)
    }
}
