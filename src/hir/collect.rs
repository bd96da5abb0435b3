//! Declaration collection: one pass over a file's AST producing the symbols
//! it declares and the type relationships it states.
//!
//! Relationship targets are not resolved here. Each parent name becomes a
//! [`TypeRef`] holding the candidates the resolver would try, and the
//! table links them once every file is known.

use text_size::TextRange;
use tracing::debug;

use super::cache::IndexEntry;
use super::context::LexicalContext;
use super::resolve::{NameKind, NameResolver};
use super::symbols::{
    DeclaredSymbol, DispatchHandlers, RelationshipKind, SymbolKind, TypeRef, member_name,
};
use super::table::PendingRelationship;
use crate::base::{FileId, LineIndex};
use crate::syntax::{Ast, ClassDecl, FunctionDecl, Member, Name, Stmt, TypeHint, Visibility};

/// Type keywords that never name a declared type.
const BUILTIN_TYPES: &[&str] = &[
    "int", "integer", "float", "double", "string", "bool", "boolean", "array", "callable",
    "iterable", "object", "mixed", "void", "null", "never", "false", "true", "resource",
];

/// Whether a type hint component is a language keyword rather than a class name.
pub fn is_builtin_type(name: &str) -> bool {
    BUILTIN_TYPES.iter().any(|t| t.eq_ignore_ascii_case(name))
}

/// Collect the declarations of one file.
pub fn collect_declarations(file: FileId, ast: &Ast, lines: &LineIndex) -> IndexEntry {
    let mut collector = DeclarationCollector {
        file,
        lines,
        ctx: LexicalContext::new(),
        entry: IndexEntry::default(),
    };
    collector.walk(&ast.stmts);
    debug!(
        %file,
        symbols = collector.entry.symbols.len(),
        relationships = collector.entry.relationships.len(),
        "collected declarations"
    );
    collector.entry
}

struct DeclarationCollector<'l> {
    file: FileId,
    lines: &'l LineIndex,
    ctx: LexicalContext,
    entry: IndexEntry,
}

impl DeclarationCollector<'_> {
    fn walk(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Namespace(ns) => {
                let name = ns.name.as_ref().map(|n| n.text.as_str());
                self.ctx.enter_namespace(name);
                if let Some(body) = &ns.body {
                    self.walk(body);
                    self.ctx.enter_namespace(None);
                }
            }
            Stmt::Use(decl) => {
                for item in &decl.items {
                    self.ctx
                        .add_import(decl.kind, item.local_name(), &item.name.text);
                }
            }
            Stmt::ClassLike(class) => self.class_like(class),
            Stmt::Function(function) => {
                self.function(function);
                self.walk(&function.body);
            }
            Stmt::Const(items) => {
                for item in items {
                    let fqn = self.ctx.qualify(&item.name.text);
                    let symbol = self.symbol(SymbolKind::Constant, fqn, item.name.range);
                    self.entry.symbols.push(symbol);
                }
            }
            Stmt::If {
                then_branch,
                else_branch,
                ..
            } => {
                self.walk(then_branch);
                self.walk(else_branch);
            }
            Stmt::Loop { body, .. } | Stmt::Foreach { body, .. } | Stmt::Block(body) => {
                self.walk(body)
            }
            Stmt::Try {
                body,
                catches,
                finally,
            } => {
                self.walk(body);
                for catch in catches {
                    self.walk(&catch.body);
                }
                self.walk(finally);
            }
            Stmt::Expr(_)
            | Stmt::Return(..)
            | Stmt::Echo(_)
            | Stmt::VarDoc { .. }
            | Stmt::Global(_) => {}
        }
    }

    fn class_like(&mut self, class: &ClassDecl) {
        // Anonymous classes declare nothing addressable.
        let Some(name) = &class.name else {
            return;
        };
        let fqn = self.ctx.qualify(&name.text);
        let mut symbol = self.symbol(class.kind.into(), fqn.as_str(), name.range);

        let mut dispatch = DispatchHandlers::default();
        for member in &class.members {
            if let Member::Method(method) = member {
                dispatch.note_method(&method.name.text);
            }
        }
        symbol.dispatch = dispatch;
        self.entry.symbols.push(symbol);

        // Interfaces list their parents under `extends`.
        for parent in &class.extends {
            self.relationship(&fqn, parent, RelationshipKind::Extends);
        }
        for iface in &class.implements {
            self.relationship(&fqn, iface, RelationshipKind::Implements);
        }

        self.ctx.push_type(fqn.as_str());
        for member in &class.members {
            self.member(&fqn, member);
        }
        self.ctx.pop_type();
    }

    fn member(&mut self, owner: &str, member: &Member) {
        match member {
            Member::Method(method) => {
                let mut symbol = self.symbol(
                    SymbolKind::Method,
                    member_name(owner, &method.name.text),
                    method.name.range,
                );
                symbol.visibility = Some(method.visibility);
                symbol.is_static = method.is_static;
                symbol.declared_type = self.type_refs(method.return_type.as_ref());
                self.entry.symbols.push(symbol);

                if method.name.text.eq_ignore_ascii_case("__construct") {
                    for param in &method.params {
                        let Some(visibility) = param.promoted else {
                            continue;
                        };
                        let mut property = self.symbol(
                            SymbolKind::Property,
                            member_name(owner, &param.name),
                            param.range,
                        );
                        property.visibility = Some(visibility);
                        property.declared_type =
                            self.type_refs(param.ty.as_ref().or(param.doc_type.as_ref()));
                        self.entry.symbols.push(property);
                    }
                }
                if let Some(body) = &method.body {
                    self.walk(body);
                }
            }
            Member::Property(property) => {
                let mut symbol = self.symbol(
                    SymbolKind::Property,
                    member_name(owner, &property.name.text),
                    property.name.range,
                );
                symbol.visibility = Some(property.visibility);
                symbol.is_static = property.is_static;
                symbol.declared_type =
                    self.type_refs(property.ty.as_ref().or(property.doc_type.as_ref()));
                self.entry.symbols.push(symbol);
            }
            Member::Constant(constant) => {
                let mut symbol = self.symbol(
                    SymbolKind::Constant,
                    member_name(owner, &constant.name.text),
                    constant.name.range,
                );
                symbol.visibility = Some(constant.visibility);
                symbol.is_static = true;
                self.entry.symbols.push(symbol);
            }
            Member::EnumCase(case) => {
                let mut symbol = self.symbol(
                    SymbolKind::Constant,
                    member_name(owner, &case.name.text),
                    case.name.range,
                );
                symbol.visibility = Some(Visibility::Public);
                symbol.is_static = true;
                symbol.declared_type = vec![TypeRef::single(owner)];
                self.entry.symbols.push(symbol);
            }
            Member::TraitUse(uses) => {
                for trait_name in &uses.traits {
                    self.relationship(owner, trait_name, RelationshipKind::UsesTrait);
                }
            }
        }
    }

    fn function(&mut self, function: &FunctionDecl) {
        let fqn = self.ctx.qualify(&function.name.text);
        let mut symbol = self.symbol(SymbolKind::Function, fqn, function.name.range);
        symbol.declared_type = self.type_refs(function.return_type.as_ref());
        self.entry.symbols.push(symbol);
    }

    fn relationship(&mut self, child: &str, parent: &Name, kind: RelationshipKind) {
        let candidates = NameResolver::candidates(&parent.text, &self.ctx, NameKind::Class);
        self.entry.relationships.push(PendingRelationship {
            child: child.into(),
            parent: TypeRef { candidates },
            kind,
            line: self.lines.line_col(parent.range.start()).line,
        });
    }

    /// Candidate lists for every class component of a hint.
    fn type_refs(&self, hint: Option<&TypeHint>) -> Vec<TypeRef> {
        let Some(hint) = hint else {
            return Vec::new();
        };
        hint.names()
            .into_iter()
            .filter_map(|name| {
                let text = name.text.as_str();
                if text.eq_ignore_ascii_case("self") || text.eq_ignore_ascii_case("static") {
                    return self.ctx.current_type().cloned().map(TypeRef::single);
                }
                if text.eq_ignore_ascii_case("parent") || is_builtin_type(text) {
                    return None;
                }
                Some(TypeRef {
                    candidates: NameResolver::candidates(text, &self.ctx, NameKind::Class),
                })
            })
            .collect()
    }

    fn symbol(&self, kind: SymbolKind, fqn: impl AsRef<str>, at: TextRange) -> DeclaredSymbol {
        let pos = self.lines.line_col(at.start());
        DeclaredSymbol::new(kind, fqn.as_ref(), self.file).with_position(pos.line, pos.col)
    }
}
