//! Usage visitor: one walk over a file's AST reporting every site that may
//! reference the queried symbol.
//!
//! The walk maintains a [`LexicalContext`] (namespace, imports, enclosing
//! types) and a per-function [`Env`] of traced local values. Each site is
//! emitted as a [`RawUsage`] carrying the [`Evidence`] the scorer needs:
//! how names resolved, how the receiver's type is known, whether a
//! string or variable mediated the target, and whether a member is declared.
//!
//! # Member matching
//!
//! For a query `Q::m`, a site with receiver type `R` matches when looking
//! `m` up on `R` finds the same declaration as looking it up on `Q`. A call
//! through a subclass that inherits `m` matches; a call through a subclass
//! that overrides it does not. When neither type declares `m` the site still
//! matches if `Q` is `R` or an ancestor of `R`, and is marked undeclared (it
//! can only reach a catch-all handler).

use std::sync::Arc;

use text_size::TextRange;
use tracing::trace;

use super::config::SearchConfig;
use super::query::Query;
use super::trace::{Env, Origin, Value};
use crate::base::LineIndex;
use crate::hir::{
    LexicalContext, MemberAccess, NameKind, NameResolver, ResolvedName, SymbolKey, SymbolKind,
    SymbolTable, is_builtin_type, same_name, same_type_name,
};
use crate::syntax::{
    Ast, Callee, ClassDecl, ClassRef, Expr, Ident, Member, MemberName, Name, Param, Stmt,
    TypeHint, UseDecl, UseKind,
};

/// Type-stack entry for anonymous classes.
pub const ANONYMOUS_CLASS: &str = "class@anonymous";

// ============================================================================
// RAW USAGES
// ============================================================================

/// Syntactic category of a reference site.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum UsageKind {
    Instantiation,
    StaticMemberAccess,
    InstanceMemberAccess,
    TypePosition,
    InheritanceClause,
    ConstantAccess,
    DynamicCall,
    FunctionCall,
    Import,
}

impl UsageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageKind::Instantiation => "instantiation",
            UsageKind::StaticMemberAccess => "static-member-access",
            UsageKind::InstanceMemberAccess => "instance-member-access",
            UsageKind::TypePosition => "type-position",
            UsageKind::InheritanceClause => "inheritance-clause",
            UsageKind::ConstantAccess => "constant-access",
            UsageKind::DynamicCall => "dynamic-call",
            UsageKind::FunctionCall => "function-call",
            UsageKind::Import => "import",
        }
    }
}

impl std::fmt::Display for UsageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the name at a site resolved.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Resolution {
    #[default]
    Resolved,
    Builtin,
    /// No declaration matched; carries the candidate name.
    Unresolved(Arc<str>),
}

impl From<&ResolvedName> for Resolution {
    fn from(name: &ResolvedName) -> Self {
        match name {
            ResolvedName::Qualified(_) => Resolution::Resolved,
            ResolvedName::Builtin(_) => Resolution::Builtin,
            ResolvedName::Unresolved { candidate } => Resolution::Unresolved(candidate.clone()),
        }
    }
}

/// What a member site was matched against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberEvidence {
    pub name: Arc<str>,
    pub access: MemberAccess,
    /// The member is declared on the receiver type or its ancestors.
    pub declared: bool,
    /// Type whose catch-all handler receives the access, when undeclared.
    pub catch_all: Option<Arc<str>>,
}

/// Everything the scorer looks at besides the usage kind.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Evidence {
    pub resolution: Resolution,
    /// How the receiver's (or static class operand's) type is known.
    pub receiver: Option<Origin>,
    pub receiver_type: Option<Arc<str>>,
    /// How a string or variable naming the class or member is known.
    pub mediator: Option<Origin>,
    pub member: Option<MemberEvidence>,
    /// Reached through a reflection-style helper.
    pub reflective: bool,
    /// `?->` access.
    pub nullsafe: bool,
}

/// One syntactic reference site, before scoring.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawUsage {
    pub path: Arc<str>,
    /// Span of the referencing name (or mediating expression).
    pub range: TextRange,
    /// 1-indexed.
    pub line: u32,
    /// 1-indexed, in bytes.
    pub column: u32,
    /// The whole source line, verbatim.
    pub snippet: Arc<str>,
    pub kind: UsageKind,
    pub evidence: Evidence,
}

/// Receives usages as the visitor finds them, together with the lexical
/// context at the site.
pub trait UsageSink {
    fn accept(&mut self, usage: RawUsage, ctx: &LexicalContext);
}

impl UsageSink for Vec<RawUsage> {
    fn accept(&mut self, usage: RawUsage, _ctx: &LexicalContext) {
        self.push(usage);
    }
}

// ============================================================================
// VISITOR
// ============================================================================

/// Searches files for one query against a read-only symbol table.
#[derive(Clone, Copy, Debug)]
pub struct UsageVisitor<'a> {
    query: &'a Query,
    table: &'a SymbolTable,
    config: &'a SearchConfig,
}

impl<'a> UsageVisitor<'a> {
    pub fn new(query: &'a Query, table: &'a SymbolTable, config: &'a SearchConfig) -> Self {
        Self {
            query,
            table,
            config,
        }
    }

    /// Collect the usages in one file.
    pub fn visit(&self, ast: &Ast, text: &str, path: &Arc<str>) -> Vec<RawUsage> {
        let mut out = Vec::new();
        self.visit_with(ast, text, path, &mut out);
        out
    }

    /// Walk one file, handing each usage to `sink`.
    pub fn visit_with<'t, S: UsageSink>(
        &self,
        ast: &'t Ast,
        text: &'t str,
        path: &Arc<str>,
        sink: &'t mut S,
    ) where
        'a: 't,
    {
        let owner_decl = match self.query {
            Query::Member {
                owner,
                member,
                kind,
            } => self
                .table
                .find_member(owner, member, *kind)
                .map(|s| s.key()),
            _ => None,
        };
        let mut walker = Walker {
            query: self.query,
            table: self.table,
            config: self.config,
            resolver: NameResolver::new(self.table)
                .with_builtins(&self.config.builtin_functions, &self.config.builtin_constants),
            owner_decl,
            path: path.clone(),
            text,
            lines: LineIndex::new(text),
            ctx: LexicalContext::new(),
            env: Env::new(self.config.trace_hop_limit),
            sink,
        };
        walker.stmts(&ast.stmts);
    }
}

/// The receiver side of a member access.
#[derive(Clone, Copy)]
enum Receiver<'t> {
    Instance(&'t Expr),
    Static(&'t ClassRef),
}

/// A member name as written after `->` or `::`.
#[derive(Clone, Copy)]
enum MemberRef<'t> {
    Ident(&'t Ident),
    Dynamic(&'t Expr),
}

impl<'t> From<&'t MemberName> for MemberRef<'t> {
    fn from(name: &'t MemberName) -> Self {
        match name {
            MemberName::Ident(ident) => MemberRef::Ident(ident),
            MemberName::Dynamic(expr) => MemberRef::Dynamic(expr),
        }
    }
}

struct Walker<'t, S> {
    query: &'t Query,
    table: &'t SymbolTable,
    config: &'t SearchConfig,
    resolver: NameResolver<'t>,
    /// Declaration the member query resolves to on its own type.
    owner_decl: Option<SymbolKey>,
    path: Arc<str>,
    text: &'t str,
    lines: LineIndex,
    ctx: LexicalContext,
    env: Env<'t>,
    sink: &'t mut S,
}

impl<'t, S: UsageSink> Walker<'t, S> {
    // ========================================================================
    // STATEMENTS
    // ========================================================================

    fn stmts(&mut self, stmts: &'t [Stmt]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &'t Stmt) {
        match stmt {
            Stmt::Namespace(ns) => {
                let name = ns.name.as_ref().map(|n| n.text.as_str());
                self.ctx.enter_namespace(name);
                if let Some(body) = &ns.body {
                    self.stmts(body);
                    self.ctx.enter_namespace(None);
                }
            }
            Stmt::Use(decl) => self.use_decl(decl),
            Stmt::ClassLike(class) => self.class_decl(class),
            Stmt::Function(function) => {
                let saved = self.enter_function(&function.params, function.return_type.as_ref());
                self.stmts(&function.body);
                self.env = saved;
            }
            Stmt::Const(items) => {
                for item in items {
                    self.expr(&item.value);
                }
            }
            Stmt::Expr(expr) | Stmt::Return(Some(expr), _) => self.expr(expr),
            Stmt::Return(None, _) => {}
            Stmt::Echo(exprs) => self.exprs(exprs),
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.expr(cond);
                self.stmts(then_branch);
                self.stmts(else_branch);
            }
            Stmt::Loop { header, body } => {
                self.exprs(header);
                self.stmts(body);
            }
            Stmt::Foreach {
                subject,
                key,
                value,
                body,
            } => {
                self.expr(subject);
                if let Some(key) = key {
                    self.forget_targets(key);
                }
                self.forget_targets(value);
                self.stmts(body);
            }
            Stmt::Try {
                body,
                catches,
                finally,
            } => {
                self.stmts(body);
                for catch in catches {
                    for ty in &catch.types {
                        self.class_name_site(ty, UsageKind::TypePosition);
                    }
                    if let Some(var) = &catch.var {
                        let ty = catch.types.first().and_then(|t| self.named_type(t));
                        self.env.bind_annotated(var, ty);
                    }
                    self.stmts(&catch.body);
                }
                self.stmts(finally);
            }
            Stmt::Block(body) => self.stmts(body),
            Stmt::VarDoc { var, ty, .. } => {
                if let Some(ty) = self.hint_type(ty) {
                    self.env.annotate(var, ty);
                }
            }
            Stmt::Global(vars) => {
                for var in vars {
                    self.env.forget(var);
                }
            }
        }
    }

    fn use_decl(&mut self, decl: &'t UseDecl) {
        for item in &decl.items {
            self.ctx
                .add_import(decl.kind, item.local_name(), &item.name.text);
            let target = item.name.text.trim_start_matches('\\');
            let matched = match (self.query, decl.kind) {
                (Query::Type { fqn }, UseKind::Class) => same_type_name(target, fqn),
                (Query::Function { fqn }, UseKind::Function) => {
                    same_name(target, fqn, NameKind::Function)
                }
                (Query::Constant { fqn }, UseKind::Constant) => {
                    same_name(target, fqn, NameKind::Constant)
                }
                _ => false,
            };
            if matched {
                self.emit(UsageKind::Import, item.name.range, Evidence::default());
            }
        }
    }

    fn class_decl(&mut self, class: &'t ClassDecl) {
        let fqn: Arc<str> = match &class.name {
            Some(name) => Arc::from(self.ctx.qualify(&name.text)),
            None => Arc::from(ANONYMOUS_CLASS),
        };
        for parent in class.extends.iter().chain(&class.implements) {
            self.class_name_site(parent, UsageKind::InheritanceClause);
        }

        self.ctx.push_type(fqn);
        for member in &class.members {
            match member {
                Member::Method(method) => {
                    let saved = self.enter_function(&method.params, method.return_type.as_ref());
                    if let Some(body) = &method.body {
                        self.stmts(body);
                    }
                    self.env = saved;
                }
                Member::Property(property) => {
                    if let Some(ty) = &property.ty {
                        self.type_hint(ty);
                    }
                    if let Some(default) = &property.default {
                        self.expr(default);
                    }
                }
                Member::Constant(constant) => self.expr(&constant.value),
                Member::EnumCase(case) => {
                    if let Some(value) = &case.value {
                        self.expr(value);
                    }
                }
                Member::TraitUse(uses) => {
                    for name in &uses.traits {
                        self.class_name_site(name, UsageKind::InheritanceClause);
                    }
                }
            }
        }
        self.ctx.pop_type();
    }

    /// Report parameter and return types, then open a fresh scope holding
    /// the parameters. Returns the enclosing scope for restoring.
    fn enter_function(&mut self, params: &'t [Param], return_type: Option<&'t TypeHint>) -> Env<'t> {
        for param in params {
            if let Some(ty) = &param.ty {
                self.type_hint(ty);
            }
            if let Some(default) = &param.default {
                self.expr(default);
            }
        }
        if let Some(ty) = return_type {
            self.type_hint(ty);
        }

        let mut scope = self.env.nested();
        for param in params {
            let ty = param
                .ty
                .as_ref()
                .or(param.doc_type.as_ref())
                .and_then(|hint| self.hint_type(hint));
            scope.bind_param(&param.name, ty);
        }
        std::mem::replace(&mut self.env, scope)
    }

    /// Variables written by `foreach` and destructuring lose their provenance.
    fn forget_targets(&mut self, target: &'t Expr) {
        match target {
            Expr::Variable { name, .. } => self.env.forget(name),
            Expr::Array { items, .. } => {
                for item in items {
                    self.forget_targets(item);
                }
            }
            other => self.expr(other),
        }
    }

    // ========================================================================
    // EXPRESSIONS
    // ========================================================================

    fn exprs(&mut self, exprs: &'t [Expr]) {
        for expr in exprs {
            self.expr(expr);
        }
    }

    fn expr(&mut self, expr: &'t Expr) {
        match expr {
            Expr::Variable { .. } | Expr::Str { .. } | Expr::Literal(_) => {}
            Expr::ConstFetch { name, .. } => self.constant_site(name),
            Expr::New { class, args, .. } => {
                self.class_site(class, UsageKind::Instantiation);
                self.constructor_site(class);
                self.exprs(args);
            }
            Expr::AnonymousClass { class, args, .. } => {
                self.exprs(args);
                self.class_decl(class);
            }
            Expr::Call { callee, args, .. } => {
                match callee {
                    Callee::Name(name) if self.config.is_indirect_call(&name.text) => {
                        self.indirect_call(&name.text, args)
                    }
                    Callee::Name(name) => self.function_site(name),
                    Callee::Expr(inner) => {
                        self.expr(inner);
                        let value = self.eval(inner);
                        self.callable_string(&value, inner.range(), false);
                    }
                }
                self.exprs(args);
            }
            Expr::MethodCall {
                receiver,
                method,
                args,
                nullsafe,
                ..
            } => {
                self.expr(receiver);
                self.member_name_expr(method);
                self.member_site(
                    Receiver::Instance(receiver),
                    method.into(),
                    MemberAccess::InstanceMethod,
                    *nullsafe,
                );
                self.exprs(args);
            }
            Expr::PropertyFetch {
                receiver,
                property,
                nullsafe,
                ..
            } => {
                self.expr(receiver);
                self.member_name_expr(property);
                self.member_site(
                    Receiver::Instance(receiver),
                    property.into(),
                    MemberAccess::InstanceProperty,
                    *nullsafe,
                );
            }
            Expr::StaticCall {
                class,
                method,
                args,
                ..
            } => {
                self.class_site(class, UsageKind::StaticMemberAccess);
                self.member_name_expr(method);
                self.member_site(
                    Receiver::Static(class),
                    method.into(),
                    MemberAccess::StaticMethod,
                    false,
                );
                self.exprs(args);
            }
            Expr::StaticPropertyFetch {
                class, property, ..
            } => {
                self.class_site(class, UsageKind::StaticMemberAccess);
                self.member_name_expr(property);
                self.member_site(
                    Receiver::Static(class),
                    property.into(),
                    MemberAccess::StaticProperty,
                    false,
                );
            }
            Expr::ClassConstFetch {
                class, constant, ..
            } => {
                self.class_site(class, UsageKind::ConstantAccess);
                if !constant.text.eq_ignore_ascii_case("class") {
                    self.member_site(
                        Receiver::Static(class),
                        MemberRef::Ident(constant),
                        MemberAccess::Constant,
                        false,
                    );
                }
            }
            Expr::Instanceof { expr, class, .. } => {
                self.expr(expr);
                self.class_site(class, UsageKind::TypePosition);
            }
            Expr::Assign { target, value, .. } => {
                self.expr(value);
                match target.as_ref() {
                    Expr::Variable { name, .. } if name != "this" => {
                        let traced = self.eval(value);
                        self.env.assign(name, traced);
                    }
                    Expr::Array { .. } => self.forget_targets(target),
                    other => self.expr(other),
                }
            }
            Expr::Array { items, .. } => self.exprs(items),
            Expr::Closure {
                params,
                uses,
                return_type,
                body,
                ..
            } => {
                let saved = self.enter_function(params, return_type.as_ref());
                for var in uses {
                    self.env.forget(var);
                }
                self.stmts(body);
                self.env = saved;
            }
            Expr::ArrowFn {
                params,
                return_type,
                body,
                ..
            } => {
                let saved = self.enter_function(params, return_type.as_ref());
                self.expr(body);
                self.env = saved;
            }
            Expr::Compound { children, .. } => self.exprs(children),
        }
    }

    fn member_name_expr(&mut self, name: &'t MemberName) {
        if let MemberName::Dynamic(expr) = name {
            self.expr(expr);
        }
    }

    // ========================================================================
    // SITES
    // ========================================================================

    /// A class name in a type hint.
    fn type_hint(&mut self, hint: &'t TypeHint) {
        for name in hint.names() {
            self.class_name_site(name, UsageKind::TypePosition);
        }
    }

    /// A class name as written, for type queries.
    fn class_name_site(&mut self, name: &'t Name, kind: UsageKind) {
        let Query::Type { fqn } = self.query else {
            return;
        };
        if is_builtin_type(&name.text) {
            return;
        }
        if is_relative_keyword(&name.text) {
            let target = if name.text.eq_ignore_ascii_case("parent") {
                self.resolver.resolve_parent(&self.ctx)
            } else {
                self.resolver.resolve_self(&self.ctx)
            };
            self.relative_class_site(target, kind, name.range);
            return;
        }
        let resolved = self.resolver.resolve(&name.text, &self.ctx, NameKind::Class);
        if resolved.names(fqn, NameKind::Class) {
            let evidence = Evidence {
                resolution: Resolution::from(&resolved),
                ..Evidence::default()
            };
            self.emit(kind, name.range, evidence);
        }
    }

    /// The class operand of `new`, `::` or `instanceof`, for type queries.
    fn class_site(&mut self, class: &'t ClassRef, kind: UsageKind) {
        match class {
            ClassRef::Named(name) => self.class_name_site(name, kind),
            ClassRef::Dynamic(expr) => {
                self.expr(expr);
                let Query::Type { fqn } = self.query else {
                    return;
                };
                let value = self.eval(expr);
                if !value.origin.is_traceable() {
                    return;
                }
                let named = value
                    .text
                    .as_deref()
                    .map(|t| t.trim_start_matches('\\'))
                    .or(value.ty.as_deref());
                if named.is_some_and(|n| same_type_name(n, fqn)) {
                    let evidence = Evidence {
                        mediator: Some(value.origin),
                        ..Evidence::default()
                    };
                    self.emit(kind, expr.range(), evidence);
                }
            }
            ClassRef::SelfRef(range) | ClassRef::Static(range) => {
                let target = self.resolver.resolve_self(&self.ctx);
                self.relative_class_site(target, kind, *range);
            }
            ClassRef::Parent(range) => {
                let target = self.resolver.resolve_parent(&self.ctx);
                self.relative_class_site(target, kind, *range);
            }
        }
    }

    /// `self`, `static` or `parent` naming the queried type. Outside a type
    /// the keyword names nothing and no site is reported.
    fn relative_class_site(
        &mut self,
        target: Option<Arc<str>>,
        kind: UsageKind,
        range: TextRange,
    ) {
        let Query::Type { fqn } = self.query else {
            return;
        };
        if target.is_some_and(|t| same_type_name(&t, fqn)) {
            let evidence = Evidence {
                receiver: Some(Origin::SelfRef),
                ..Evidence::default()
            };
            self.emit(kind, range, evidence);
        }
    }

    /// `new X` reaching a queried constructor.
    fn constructor_site(&mut self, class: &'t ClassRef) {
        if !self.is_constructor_query() {
            return;
        }
        let (value, resolution) = self.class_value(class);
        let Some(ty) = value.ty.clone() else {
            return;
        };
        let Some(member) = self.member_match(&ty, MemberAccess::InstanceMethod) else {
            return;
        };
        let (receiver, mediator, range) = match class {
            ClassRef::Dynamic(expr) => (None, Some(value.origin), expr.range()),
            ClassRef::Named(name) => (Some(value.origin), None, name.range),
            ClassRef::SelfRef(range) | ClassRef::Static(range) | ClassRef::Parent(range) => {
                (Some(value.origin), None, *range)
            }
        };
        let evidence = Evidence {
            resolution,
            receiver,
            receiver_type: Some(ty),
            mediator,
            member: Some(member),
            ..Evidence::default()
        };
        self.emit(UsageKind::Instantiation, range, evidence);
    }

    fn member_site(
        &mut self,
        receiver: Receiver<'t>,
        name: MemberRef<'t>,
        access: MemberAccess,
        nullsafe: bool,
    ) {
        let Query::Member { member, kind, .. } = self.query else {
            return;
        };
        if access.symbol_kind() != *kind {
            return;
        }

        let (range, mediator) = match name {
            MemberRef::Ident(ident) => {
                if !same_member(&ident.text, member, *kind) {
                    return;
                }
                (ident.range, None)
            }
            MemberRef::Dynamic(expr) => {
                let value = self.eval(expr);
                match &value.text {
                    Some(text) if value.origin.is_traceable() => {
                        if !same_member(text, member, *kind) {
                            return;
                        }
                        (expr.range(), Some(value.origin))
                    }
                    _ => (expr.range(), Some(Origin::Untraceable)),
                }
            }
        };
        let untraceable_name = mediator == Some(Origin::Untraceable);

        let (value, resolution) = match receiver {
            Receiver::Instance(expr) => (self.eval(expr), Resolution::Resolved),
            Receiver::Static(class) => self.class_value(class),
        };

        let Some(receiver_type) = value.ty.clone() else {
            // Nothing ties an untraceable name on an untraceable receiver to the query.
            if untraceable_name {
                return;
            }
            let evidence = Evidence {
                resolution,
                receiver: Some(Origin::Untraceable),
                mediator,
                member: Some(MemberEvidence {
                    name: member.clone(),
                    access,
                    declared: self.owner_decl.is_some(),
                    catch_all: None,
                }),
                nullsafe,
                ..Evidence::default()
            };
            self.emit(UsageKind::DynamicCall, range, evidence);
            return;
        };

        let Some(matched) = self.member_match(&receiver_type, access) else {
            return;
        };
        let usage_kind = if untraceable_name {
            UsageKind::DynamicCall
        } else {
            match access {
                MemberAccess::Constant => UsageKind::ConstantAccess,
                MemberAccess::StaticMethod | MemberAccess::StaticProperty => {
                    UsageKind::StaticMemberAccess
                }
                MemberAccess::InstanceMethod | MemberAccess::InstanceProperty => {
                    UsageKind::InstanceMemberAccess
                }
            }
        };
        let evidence = Evidence {
            resolution,
            receiver: Some(value.origin),
            receiver_type: Some(receiver_type),
            mediator,
            member: Some(matched),
            nullsafe,
            ..Evidence::default()
        };
        self.emit(usage_kind, range, evidence);
    }

    /// Whether `m` looked up on `receiver` is the queried member.
    fn member_match(&self, receiver: &str, access: MemberAccess) -> Option<MemberEvidence> {
        let Query::Member {
            owner,
            member,
            kind,
        } = self.query
        else {
            return None;
        };
        let on_receiver = self.table.find_member(receiver, member, *kind);
        let evidence = |declared: bool, catch_all: Option<Arc<str>>| MemberEvidence {
            name: member.clone(),
            access,
            declared,
            catch_all,
        };
        match (&self.owner_decl, on_receiver) {
            (Some(expected), Some(found)) if *expected == found.key() => {
                Some(evidence(true, None))
            }
            (None, None) if self.table.is_same_or_ancestor(owner, receiver) => {
                // Every class has a constructor, declared or not.
                if self.is_constructor_query() {
                    return Some(evidence(true, None));
                }
                let catch_all = self.table.catch_all_for(receiver, access);
                Some(evidence(false, catch_all))
            }
            _ => None,
        }
    }

    fn function_site(&mut self, name: &'t Name) {
        let Query::Function { fqn } = self.query else {
            return;
        };
        let resolved = self
            .resolver
            .resolve(&name.text, &self.ctx, NameKind::Function);
        if resolved.names(fqn, NameKind::Function) {
            let evidence = Evidence {
                resolution: Resolution::from(&resolved),
                ..Evidence::default()
            };
            self.emit(UsageKind::FunctionCall, name.range, evidence);
        }
    }

    fn constant_site(&mut self, name: &'t Name) {
        let Query::Constant { fqn } = self.query else {
            return;
        };
        let resolved = self
            .resolver
            .resolve(&name.text, &self.ctx, NameKind::Constant);
        if resolved.names(fqn, NameKind::Constant) {
            let evidence = Evidence {
                resolution: Resolution::from(&resolved),
                ..Evidence::default()
            };
            self.emit(UsageKind::ConstantAccess, name.range, evidence);
        }
    }

    /// `call_user_func([$w, 'render'])`, `method_exists($w, 'render')`,
    /// `constant('App\VERSION')` and friends.
    fn indirect_call(&mut self, function: &str, args: &'t [Expr]) {
        let function = function.trim_start_matches('\\').to_ascii_lowercase();
        let (object, target) = match (function.as_str(), args) {
            ("method_exists" | "property_exists", [object, member, ..]) => (Some(object), member),
            (_, [Expr::Array { items, .. }, ..]) if items.len() == 2 => (Some(&items[0]), &items[1]),
            (_, [first, ..]) => (None, first),
            (_, []) => return,
        };
        let value = self.eval(target);
        let Some(text) = value.text.clone().filter(|_| value.origin.is_traceable()) else {
            return;
        };

        match object {
            Some(object) => {
                let receiver = self.eval(object);
                let ty = receiver
                    .ty
                    .clone()
                    .or_else(|| receiver.text.as_deref().map(absolute));
                let access = if function == "property_exists" {
                    MemberAccess::InstanceProperty
                } else {
                    MemberAccess::InstanceMethod
                };
                self.callable_member(ty, &text, access, target.range(), true);
            }
            None if function == "constant" => match text.split_once("::") {
                Some((class, member)) => self.callable_member(
                    Some(absolute(class)),
                    member,
                    MemberAccess::Constant,
                    target.range(),
                    true,
                ),
                None => {
                    if let Query::Constant { fqn } = self.query {
                        if same_name(&absolute(&text), fqn, NameKind::Constant) {
                            let evidence = Evidence {
                                reflective: true,
                                ..Evidence::default()
                            };
                            self.emit(UsageKind::DynamicCall, target.range(), evidence);
                        }
                    }
                }
            },
            None => self.callable_string(&value, target.range(), true),
        }
    }

    /// A string used as a callable: `'helper'` or `'Widget::make'`.
    fn callable_string(&mut self, value: &Value, range: TextRange, reflective: bool) {
        let Some(text) = value.text.as_deref().filter(|_| value.origin.is_traceable()) else {
            return;
        };
        if let Some((class, member)) = text.split_once("::") {
            let ty = Some(absolute(class));
            if reflective {
                self.callable_member(ty, member, MemberAccess::StaticMethod, range, true);
            } else {
                self.mediated_member(ty, member, value.origin, range);
            }
            return;
        }
        if let Query::Function { fqn } = self.query {
            if same_name(&absolute(text), fqn, NameKind::Function) {
                let evidence = Evidence {
                    mediator: (!reflective).then_some(value.origin),
                    reflective,
                    ..Evidence::default()
                };
                self.emit(UsageKind::DynamicCall, range, evidence);
            }
        }
    }

    /// A member named by a reflection helper's arguments.
    fn callable_member(
        &mut self,
        ty: Option<Arc<str>>,
        member_text: &str,
        access: MemberAccess,
        range: TextRange,
        reflective: bool,
    ) {
        let Query::Member { member, kind, .. } = self.query else {
            return;
        };
        if access.symbol_kind() != *kind || !same_member(member_text, member, *kind) {
            return;
        }
        let matched = match &ty {
            Some(ty) => match self.member_match(ty, access) {
                Some(matched) => matched,
                None => return,
            },
            None => MemberEvidence {
                name: member.clone(),
                access,
                declared: self.owner_decl.is_some(),
                catch_all: None,
            },
        };
        let evidence = Evidence {
            receiver_type: ty,
            member: Some(matched),
            reflective,
            ..Evidence::default()
        };
        self.emit(UsageKind::DynamicCall, range, evidence);
    }

    /// `$f = 'Widget::make'; $f();`
    fn mediated_member(
        &mut self,
        ty: Option<Arc<str>>,
        member_text: &str,
        origin: Origin,
        range: TextRange,
    ) {
        let Query::Member { member, kind, .. } = self.query else {
            return;
        };
        let access = MemberAccess::StaticMethod;
        if access.symbol_kind() != *kind || !same_member(member_text, member, *kind) {
            return;
        }
        let Some(matched) = ty.as_deref().and_then(|t| self.member_match(t, access)) else {
            return;
        };
        let evidence = Evidence {
            receiver: Some(origin),
            receiver_type: ty,
            mediator: Some(origin),
            member: Some(matched),
            ..Evidence::default()
        };
        self.emit(UsageKind::DynamicCall, range, evidence);
    }

    fn emit(&mut self, kind: UsageKind, range: TextRange, evidence: Evidence) {
        let pos = self.lines.line_col(range.start());
        let snippet = self.lines.line_text(self.text, pos.line).unwrap_or("");
        let usage = RawUsage {
            path: self.path.clone(),
            range,
            line: pos.line_one_indexed(),
            column: pos.col_one_indexed(),
            snippet: Arc::from(snippet),
            kind,
            evidence,
        };
        trace!(path = %self.path, line = usage.line, kind = %kind, "usage site");
        self.sink.accept(usage, &self.ctx);
    }

    // ========================================================================
    // VALUE TRACING
    // ========================================================================

    fn eval(&self, expr: &Expr) -> Value {
        match expr {
            Expr::Variable { name, .. } if name == "this" => {
                Value::object(self.ctx.current_type().cloned(), Origin::SelfRef)
            }
            Expr::Variable { name, .. } => self.env.get(name),
            Expr::Str { value, .. } => Value::string(value.as_str(), Origin::Explicit),
            Expr::ClassConstFetch {
                class, constant, ..
            } if constant.text.eq_ignore_ascii_case("class") => {
                let (value, _) = self.class_value(class);
                match value.ty {
                    Some(ty) => Value::string(ty, value.origin),
                    None => Value::untraceable(),
                }
            }
            Expr::New { class, .. } => {
                let (value, _) = self.class_value(class);
                let origin = match value.origin {
                    Origin::Explicit => Origin::Constructed,
                    other => other,
                };
                Value::object(value.ty, origin)
            }
            Expr::MethodCall {
                receiver,
                method: MemberName::Ident(method),
                ..
            } => self.member_type(self.eval(receiver), method, SymbolKind::Method),
            Expr::PropertyFetch {
                receiver,
                property: MemberName::Ident(property),
                ..
            } => self.member_type(self.eval(receiver), property, SymbolKind::Property),
            Expr::StaticCall {
                class,
                method: MemberName::Ident(method),
                ..
            } => self.member_type(self.class_value(class).0, method, SymbolKind::Method),
            Expr::StaticPropertyFetch {
                class,
                property: MemberName::Ident(property),
                ..
            } => self.member_type(self.class_value(class).0, property, SymbolKind::Property),
            Expr::Call {
                callee: Callee::Name(name),
                ..
            } => {
                let resolved = self
                    .resolver
                    .resolve(&name.text, &self.ctx, NameKind::Function);
                let ty = self
                    .table
                    .lookup(SymbolKind::Function, resolved.fqn())
                    .and_then(|f| f.declared_type.first())
                    .and_then(|t| self.table.resolve_type_ref(t));
                Value::object(ty, Origin::Annotated)
            }
            Expr::Assign { value, .. } => self.eval(value),
            _ => Value::untraceable(),
        }
    }

    /// The class a `ClassRef` denotes, and how that is known.
    fn class_value(&self, class: &ClassRef) -> (Value, Resolution) {
        match class {
            ClassRef::Named(name) => {
                let resolved = self.resolver.resolve(&name.text, &self.ctx, NameKind::Class);
                let value = Value::object(Some(resolved.fqn().clone()), Origin::Explicit);
                (value, Resolution::from(&resolved))
            }
            ClassRef::SelfRef(_) | ClassRef::Static(_) => (
                Value::object(self.resolver.resolve_self(&self.ctx), Origin::SelfRef),
                Resolution::Resolved,
            ),
            ClassRef::Parent(_) => (
                Value::object(self.resolver.resolve_parent(&self.ctx), Origin::SelfRef),
                Resolution::Resolved,
            ),
            ClassRef::Dynamic(expr) => {
                let value = self.eval(expr);
                let ty = value
                    .text
                    .as_deref()
                    .map(absolute)
                    .or_else(|| value.ty.clone());
                (Value::object(ty, value.origin), Resolution::Resolved)
            }
        }
    }

    /// Declared type of a member looked up on a traced receiver.
    fn member_type(&self, receiver: Value, name: &Ident, kind: SymbolKind) -> Value {
        let Some(ty) = receiver.ty.as_deref() else {
            return Value::untraceable();
        };
        let declared = self
            .table
            .find_member(ty, &name.text, kind)
            .and_then(|s| s.declared_type.first())
            .and_then(|t| self.table.resolve_type_ref(t));
        Value::object(declared, receiver.origin.weaker(Origin::Annotated))
    }

    /// The class a type hint names, for binding parameters.
    fn hint_type(&self, hint: &TypeHint) -> Option<Arc<str>> {
        hint.names().into_iter().find_map(|name| self.named_type(name))
    }

    fn named_type(&self, name: &Name) -> Option<Arc<str>> {
        if is_builtin_type(&name.text) {
            return None;
        }
        let resolved = self.resolver.resolve(&name.text, &self.ctx, NameKind::Class);
        Some(resolved.fqn().clone())
    }

    fn is_constructor_query(&self) -> bool {
        matches!(
            self.query,
            Query::Member { member, kind: SymbolKind::Method, .. }
                if member.eq_ignore_ascii_case("__construct")
        )
    }
}

fn is_relative_keyword(name: &str) -> bool {
    ["self", "static", "parent"]
        .iter()
        .any(|k| name.eq_ignore_ascii_case(k))
}

/// Member name equality: methods ignore case, properties and constants do not.
fn same_member(a: &str, b: &str, kind: SymbolKind) -> bool {
    if kind.is_case_insensitive() {
        a.eq_ignore_ascii_case(b)
    } else {
        a == b
    }
}

/// Class names in strings are always fully qualified.
fn absolute(name: &str) -> Arc<str> {
    Arc::from(name.trim_start_matches('\\'))
}
