//! AST node types produced by the parser front-end.
//!
//! The tree mirrors the surface syntax closely enough for usage search:
//! every node that can name a declared entity keeps the name exactly as
//! written (see [`Name`]) together with its byte range, so the resolver can
//! apply import and namespace rules and the search can report precise
//! positions. Nodes the search does not care about are folded into
//! [`Expr::Compound`] and [`Stmt::Block`].

use smol_str::SmolStr;
use text_size::TextRange;

/// Namespace separator as written in source.
pub const NS_SEPARATOR: char = '\\';

/// A (possibly qualified) name exactly as written: `Widget`, `Ui\Widget`,
/// `\App\Ui\Widget` or `namespace\Widget`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Name {
    pub text: SmolStr,
    pub range: TextRange,
}

impl Name {
    pub fn new(text: impl Into<SmolStr>, range: TextRange) -> Self {
        Self {
            text: text.into(),
            range,
        }
    }

    /// Written with a leading separator (`\App\Widget`).
    pub fn is_fully_qualified(&self) -> bool {
        self.text.starts_with(NS_SEPARATOR)
    }

    /// Written relative to the current namespace (`namespace\Widget`).
    pub fn is_namespace_relative(&self) -> bool {
        self.text
            .get(..10)
            .is_some_and(|head| head.eq_ignore_ascii_case("namespace\\"))
    }

    /// Last segment of the name.
    pub fn short_name(&self) -> &str {
        self.text
            .rsplit(NS_SEPARATOR)
            .next()
            .unwrap_or(self.text.as_str())
    }
}

/// A plain identifier with its range (member names, declaration names).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ident {
    pub text: SmolStr,
    pub range: TextRange,
}

impl Ident {
    pub fn new(text: impl Into<SmolStr>, range: TextRange) -> Self {
        Self {
            text: text.into(),
            range,
        }
    }
}

/// The root of one parsed file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Ast {
    pub stmts: Vec<Stmt>,
}

impl Ast {
    pub fn new(stmts: Vec<Stmt>) -> Self {
        Self { stmts }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClassKind {
    Class,
    Interface,
    Trait,
    Enum,
}

/// Which import table a `use` statement feeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UseKind {
    Class,
    Function,
    Constant,
}

// ============================================================================
// STATEMENTS
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    /// `namespace A\B;` (body `None`, applies to following statements) or
    /// `namespace A\B { ... }`.
    Namespace(NamespaceDecl),
    Use(UseDecl),
    ClassLike(ClassDecl),
    Function(FunctionDecl),
    /// Top-level `const NAME = value;`
    Const(Vec<ConstItem>),
    Expr(Expr),
    Return(Option<Expr>, TextRange),
    Echo(Vec<Expr>),
    If {
        cond: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Vec<Stmt>,
    },
    /// `while`, `do`, `for` and `switch` bodies: header expressions plus a body.
    Loop {
        header: Vec<Expr>,
        body: Vec<Stmt>,
    },
    Foreach {
        subject: Expr,
        key: Option<Expr>,
        value: Expr,
        body: Vec<Stmt>,
    },
    Try {
        body: Vec<Stmt>,
        catches: Vec<CatchClause>,
        finally: Vec<Stmt>,
    },
    Block(Vec<Stmt>),
    /// `/** @var Type $name */` attached to the following statement.
    VarDoc {
        var: SmolStr,
        ty: TypeHint,
        range: TextRange,
    },
    /// `global $a, $b;` and `static $a;` - the variables lose local provenance.
    Global(Vec<SmolStr>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct NamespaceDecl {
    pub name: Option<Name>,
    pub body: Option<Vec<Stmt>>,
    pub range: TextRange,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UseDecl {
    pub kind: UseKind,
    /// Group uses (`use A\{B, C}`) are flattened by the front-end.
    pub items: Vec<UseItem>,
    pub range: TextRange,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UseItem {
    /// Imported name; always absolute whether or not a leading `\` is written.
    pub name: Name,
    pub alias: Option<Ident>,
}

impl UseItem {
    /// The local name this import binds.
    pub fn local_name(&self) -> &str {
        self.alias
            .as_ref()
            .map(|a| a.text.as_str())
            .unwrap_or_else(|| self.name.short_name())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConstItem {
    pub name: Ident,
    pub value: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CatchClause {
    pub types: Vec<Name>,
    pub var: Option<SmolStr>,
    pub body: Vec<Stmt>,
    pub range: TextRange,
}

// ============================================================================
// DECLARATIONS
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct ClassDecl {
    pub kind: ClassKind,
    /// `None` for anonymous classes.
    pub name: Option<Ident>,
    /// `extends` list: one entry for classes, any number for interfaces.
    pub extends: Vec<Name>,
    pub implements: Vec<Name>,
    pub members: Vec<Member>,
    pub range: TextRange,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Member {
    Method(MethodDecl),
    Property(PropertyDecl),
    Constant(ClassConstDecl),
    EnumCase(EnumCaseDecl),
    TraitUse(TraitUse),
}

#[derive(Clone, Debug, PartialEq)]
pub struct MethodDecl {
    pub name: Ident,
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_abstract: bool,
    pub params: Vec<Param>,
    pub return_type: Option<TypeHint>,
    /// `None` for abstract and interface methods.
    pub body: Option<Vec<Stmt>>,
    pub range: TextRange,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PropertyDecl {
    /// Property name without the leading `$`.
    pub name: Ident,
    pub visibility: Visibility,
    pub is_static: bool,
    pub ty: Option<TypeHint>,
    pub doc_type: Option<TypeHint>,
    pub default: Option<Expr>,
    pub range: TextRange,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClassConstDecl {
    pub name: Ident,
    pub visibility: Visibility,
    pub value: Expr,
    pub range: TextRange,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EnumCaseDecl {
    pub name: Ident,
    pub value: Option<Expr>,
    pub range: TextRange,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TraitUse {
    pub traits: Vec<Name>,
    pub range: TextRange,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDecl {
    pub name: Ident,
    pub params: Vec<Param>,
    pub return_type: Option<TypeHint>,
    pub body: Vec<Stmt>,
    pub range: TextRange,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    /// Variable name without the leading `$`.
    pub name: SmolStr,
    pub ty: Option<TypeHint>,
    /// `@param` type from the enclosing docblock.
    pub doc_type: Option<TypeHint>,
    pub default: Option<Expr>,
    /// Constructor promotion (`public function __construct(private Foo $foo)`).
    pub promoted: Option<Visibility>,
    pub range: TextRange,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TypeHint {
    /// A class name or a scalar/pseudo type keyword (`int`, `self`, `mixed`).
    Named(Name),
    Nullable(Box<TypeHint>),
    Union(Vec<TypeHint>),
    Intersection(Vec<TypeHint>),
}

impl TypeHint {
    /// Every named component, in source order.
    pub fn names(&self) -> Vec<&Name> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(hint) = stack.pop() {
            match hint {
                TypeHint::Named(name) => out.push(name),
                TypeHint::Nullable(inner) => stack.push(inner.as_ref()),
                TypeHint::Union(parts) | TypeHint::Intersection(parts) => {
                    stack.extend(parts.iter().rev())
                }
            }
        }
        out
    }
}

// ============================================================================
// EXPRESSIONS
// ============================================================================

/// The class operand of `new`, `::` and `instanceof`.
#[derive(Clone, Debug, PartialEq)]
pub enum ClassRef {
    Named(Name),
    SelfRef(TextRange),
    Static(TextRange),
    Parent(TextRange),
    /// `new $class`, `$class::make()`, `new ($factory())`
    Dynamic(Box<Expr>),
}

/// A member name after `->` or `::`.
#[derive(Clone, Debug, PartialEq)]
pub enum MemberName {
    Ident(Ident),
    /// `$obj->$method()`, `$obj->{$name}`
    Dynamic(Box<Expr>),
}

/// The callee of a plain call expression.
#[derive(Clone, Debug, PartialEq)]
pub enum Callee {
    Name(Name),
    /// `$fn()`, `($this->handler)()`
    Expr(Box<Expr>),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// `$name`; `$this` has name `this`.
    Variable {
        name: SmolStr,
        range: TextRange,
    },
    /// A string literal with escapes already processed.
    Str {
        value: SmolStr,
        range: TextRange,
    },
    /// Numbers, booleans, heredocs and other literals the search ignores.
    Literal(TextRange),
    New {
        class: ClassRef,
        args: Vec<Expr>,
        range: TextRange,
    },
    /// `new class(...) extends Base { ... }`
    AnonymousClass {
        class: Box<ClassDecl>,
        args: Vec<Expr>,
        range: TextRange,
    },
    Call {
        callee: Callee,
        args: Vec<Expr>,
        range: TextRange,
    },
    MethodCall {
        receiver: Box<Expr>,
        method: MemberName,
        args: Vec<Expr>,
        nullsafe: bool,
        range: TextRange,
    },
    PropertyFetch {
        receiver: Box<Expr>,
        property: MemberName,
        nullsafe: bool,
        range: TextRange,
    },
    StaticCall {
        class: ClassRef,
        method: MemberName,
        args: Vec<Expr>,
        range: TextRange,
    },
    /// `Foo::$bar`; the member name is stored without `$`.
    StaticPropertyFetch {
        class: ClassRef,
        property: MemberName,
        range: TextRange,
    },
    /// `Foo::BAR`, `Suit::Hearts`, `Foo::class`
    ClassConstFetch {
        class: ClassRef,
        constant: Ident,
        range: TextRange,
    },
    ConstFetch {
        name: Name,
        range: TextRange,
    },
    Instanceof {
        expr: Box<Expr>,
        class: ClassRef,
        range: TextRange,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
        range: TextRange,
    },
    Array {
        items: Vec<Expr>,
        range: TextRange,
    },
    Closure {
        params: Vec<Param>,
        uses: Vec<SmolStr>,
        return_type: Option<TypeHint>,
        body: Vec<Stmt>,
        range: TextRange,
    },
    ArrowFn {
        params: Vec<Param>,
        return_type: Option<TypeHint>,
        body: Box<Expr>,
        range: TextRange,
    },
    /// Operators, ternaries, `match`, casts: children only.
    Compound {
        children: Vec<Expr>,
        range: TextRange,
    },
}

impl Expr {
    pub fn range(&self) -> TextRange {
        match self {
            Expr::Variable { range, .. }
            | Expr::Str { range, .. }
            | Expr::New { range, .. }
            | Expr::AnonymousClass { range, .. }
            | Expr::Call { range, .. }
            | Expr::MethodCall { range, .. }
            | Expr::PropertyFetch { range, .. }
            | Expr::StaticCall { range, .. }
            | Expr::StaticPropertyFetch { range, .. }
            | Expr::ClassConstFetch { range, .. }
            | Expr::ConstFetch { range, .. }
            | Expr::Instanceof { range, .. }
            | Expr::Assign { range, .. }
            | Expr::Array { range, .. }
            | Expr::Closure { range, .. }
            | Expr::ArrowFn { range, .. }
            | Expr::Compound { range, .. } => *range,
            Expr::Literal(range) => *range,
        }
    }
}
