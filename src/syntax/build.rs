//! Constructors for assembling ASTs.
//!
//! Front-end adapters and tests use these instead of spelling out every
//! struct literal. Ranges are always supplied by the caller.

use smol_str::SmolStr;
use text_size::TextRange;

use super::ast::*;

pub fn name(text: impl Into<SmolStr>, range: TextRange) -> Name {
    Name::new(text, range)
}

pub fn ident(text: impl Into<SmolStr>, range: TextRange) -> Ident {
    Ident::new(text, range)
}

pub fn named_type(name: Name) -> TypeHint {
    TypeHint::Named(name)
}

pub fn nullable(hint: TypeHint) -> TypeHint {
    TypeHint::Nullable(Box::new(hint))
}

// ============================================================================
// EXPRESSIONS
// ============================================================================

pub fn var(name: impl Into<SmolStr>, range: TextRange) -> Expr {
    Expr::Variable {
        name: name.into(),
        range,
    }
}

pub fn this(range: TextRange) -> Expr {
    var("this", range)
}

pub fn string(value: impl Into<SmolStr>, range: TextRange) -> Expr {
    Expr::Str {
        value: value.into(),
        range,
    }
}

pub fn new_object(class: ClassRef, range: TextRange) -> Expr {
    Expr::New {
        class,
        args: Vec::new(),
        range,
    }
}

pub fn new_named(class: Name, range: TextRange) -> Expr {
    new_object(ClassRef::Named(class), range)
}

pub fn call(callee: Name, args: Vec<Expr>, range: TextRange) -> Expr {
    Expr::Call {
        callee: Callee::Name(callee),
        args,
        range,
    }
}

pub fn call_expr(callee: Expr, args: Vec<Expr>, range: TextRange) -> Expr {
    Expr::Call {
        callee: Callee::Expr(Box::new(callee)),
        args,
        range,
    }
}

pub fn method_call(receiver: Expr, method: Ident, range: TextRange) -> Expr {
    Expr::MethodCall {
        receiver: Box::new(receiver),
        method: MemberName::Ident(method),
        args: Vec::new(),
        nullsafe: false,
        range,
    }
}

pub fn nullsafe_method_call(receiver: Expr, method: Ident, range: TextRange) -> Expr {
    Expr::MethodCall {
        receiver: Box::new(receiver),
        method: MemberName::Ident(method),
        args: Vec::new(),
        nullsafe: true,
        range,
    }
}

pub fn dynamic_method_call(receiver: Expr, method: Expr, range: TextRange) -> Expr {
    Expr::MethodCall {
        receiver: Box::new(receiver),
        method: MemberName::Dynamic(Box::new(method)),
        args: Vec::new(),
        nullsafe: false,
        range,
    }
}

pub fn property_fetch(receiver: Expr, property: Ident, range: TextRange) -> Expr {
    Expr::PropertyFetch {
        receiver: Box::new(receiver),
        property: MemberName::Ident(property),
        nullsafe: false,
        range,
    }
}

pub fn static_call(class: ClassRef, method: Ident, range: TextRange) -> Expr {
    Expr::StaticCall {
        class,
        method: MemberName::Ident(method),
        args: Vec::new(),
        range,
    }
}

pub fn static_property(class: ClassRef, property: Ident, range: TextRange) -> Expr {
    Expr::StaticPropertyFetch {
        class,
        property: MemberName::Ident(property),
        range,
    }
}

pub fn class_const(class: ClassRef, constant: Ident, range: TextRange) -> Expr {
    Expr::ClassConstFetch {
        class,
        constant,
        range,
    }
}

pub fn const_fetch(name: Name) -> Expr {
    let range = name.range;
    Expr::ConstFetch { name, range }
}

pub fn instance_of(expr: Expr, class: ClassRef, range: TextRange) -> Expr {
    Expr::Instanceof {
        expr: Box::new(expr),
        class,
        range,
    }
}

pub fn assign(target: Expr, value: Expr, range: TextRange) -> Expr {
    Expr::Assign {
        target: Box::new(target),
        value: Box::new(value),
        range,
    }
}

pub fn array(items: Vec<Expr>, range: TextRange) -> Expr {
    Expr::Array { items, range }
}

/// Attach call arguments to a call-like expression; other nodes are returned unchanged.
pub fn with_args(mut expr: Expr, new_args: Vec<Expr>) -> Expr {
    match &mut expr {
        Expr::New { args, .. }
        | Expr::Call { args, .. }
        | Expr::MethodCall { args, .. }
        | Expr::StaticCall { args, .. }
        | Expr::AnonymousClass { args, .. } => *args = new_args,
        _ => {}
    }
    expr
}

// ============================================================================
// STATEMENTS & DECLARATIONS
// ============================================================================

pub fn expr_stmt(expr: Expr) -> Stmt {
    Stmt::Expr(expr)
}

pub fn namespace(name: Name, range: TextRange) -> Stmt {
    Stmt::Namespace(NamespaceDecl {
        name: Some(name),
        body: None,
        range,
    })
}

pub fn use_class(name: Name, alias: Option<Ident>, range: TextRange) -> Stmt {
    use_of(UseKind::Class, name, alias, range)
}

pub fn use_of(kind: UseKind, name: Name, alias: Option<Ident>, range: TextRange) -> Stmt {
    Stmt::Use(UseDecl {
        kind,
        items: vec![UseItem { name, alias }],
        range,
    })
}

pub fn param(name: impl Into<SmolStr>, ty: Option<TypeHint>, range: TextRange) -> Param {
    Param {
        name: name.into(),
        ty,
        doc_type: None,
        default: None,
        promoted: None,
        range,
    }
}

/// Builder for class-like declarations.
#[derive(Clone, Debug)]
pub struct ClassBuilder {
    decl: ClassDecl,
}

impl ClassBuilder {
    pub fn new(kind: ClassKind, name: Ident, range: TextRange) -> Self {
        Self {
            decl: ClassDecl {
                kind,
                name: Some(name),
                extends: Vec::new(),
                implements: Vec::new(),
                members: Vec::new(),
                range,
            },
        }
    }

    pub fn class(name: Ident, range: TextRange) -> Self {
        Self::new(ClassKind::Class, name, range)
    }

    pub fn extends(mut self, parent: Name) -> Self {
        self.decl.extends.push(parent);
        self
    }

    pub fn implements(mut self, iface: Name) -> Self {
        self.decl.implements.push(iface);
        self
    }

    pub fn uses_trait(mut self, trait_name: Name) -> Self {
        let range = trait_name.range;
        self.decl.members.push(Member::TraitUse(TraitUse {
            traits: vec![trait_name],
            range,
        }));
        self
    }

    pub fn member(mut self, member: Member) -> Self {
        self.decl.members.push(member);
        self
    }

    pub fn method(self, method: MethodDecl) -> Self {
        self.member(Member::Method(method))
    }

    pub fn property(self, name: Ident, ty: Option<TypeHint>) -> Self {
        let range = name.range;
        self.member(Member::Property(PropertyDecl {
            name,
            visibility: Visibility::Public,
            is_static: false,
            ty,
            doc_type: None,
            default: None,
            range,
        }))
    }

    pub fn constant(self, name: Ident) -> Self {
        let range = name.range;
        self.member(Member::Constant(ClassConstDecl {
            name,
            visibility: Visibility::Public,
            value: Expr::Literal(range),
            range,
        }))
    }

    pub fn build(self) -> ClassDecl {
        self.decl
    }

    pub fn stmt(self) -> Stmt {
        Stmt::ClassLike(self.decl)
    }
}

/// Builder for methods.
#[derive(Clone, Debug)]
pub struct MethodBuilder {
    decl: MethodDecl,
}

impl MethodBuilder {
    pub fn new(name: Ident) -> Self {
        let range = name.range;
        Self {
            decl: MethodDecl {
                name,
                visibility: Visibility::Public,
                is_static: false,
                is_abstract: false,
                params: Vec::new(),
                return_type: None,
                body: Some(Vec::new()),
                range,
            },
        }
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.decl.visibility = visibility;
        self
    }

    pub fn is_static(mut self) -> Self {
        self.decl.is_static = true;
        self
    }

    pub fn param(mut self, param: Param) -> Self {
        self.decl.params.push(param);
        self
    }

    pub fn returns(mut self, hint: TypeHint) -> Self {
        self.decl.return_type = Some(hint);
        self
    }

    pub fn body(mut self, body: Vec<Stmt>) -> Self {
        self.decl.body = Some(body);
        self
    }

    pub fn range(mut self, range: TextRange) -> Self {
        self.decl.range = range;
        self
    }

    pub fn build(self) -> MethodDecl {
        self.decl
    }
}

/// Builder for free functions.
#[derive(Clone, Debug)]
pub struct FunctionBuilder {
    decl: FunctionDecl,
}

impl FunctionBuilder {
    pub fn new(name: Ident) -> Self {
        let range = name.range;
        Self {
            decl: FunctionDecl {
                name,
                params: Vec::new(),
                return_type: None,
                body: Vec::new(),
                range,
            },
        }
    }

    pub fn param(mut self, param: Param) -> Self {
        self.decl.params.push(param);
        self
    }

    pub fn returns(mut self, hint: TypeHint) -> Self {
        self.decl.return_type = Some(hint);
        self
    }

    pub fn body(mut self, body: Vec<Stmt>) -> Self {
        self.decl.body = body;
        self
    }

    pub fn stmt(self) -> Stmt {
        Stmt::Function(self.decl)
    }
}
