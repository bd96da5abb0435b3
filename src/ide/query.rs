//! Query strings: parsing and resolution against the symbol table.
//!
//! Accepted forms:
//!
//! - `Widget`, `App\Ui\Widget`, `\App\Ui\Widget`: a type (or, when no such
//!   type is declared, a function or constant of that name)
//! - `App\Ui\Widget::render`, `App\Ui\Widget::render()`: a member
//! - `App\Ui\Widget::$title`: a property
//! - `App\helper()`: a function

use std::fmt;
use std::sync::Arc;

use crate::hir::{MEMBER_SEPARATOR, SymbolKind, SymbolTable, member_name};
use crate::syntax::NS_SEPARATOR;

/// Why a query string was refused.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("query is empty")]
    Empty,
    #[error("`{0}` is not a valid name")]
    InvalidName(String),
    #[error("member name is missing")]
    MissingMember,
}

/// What the query string says, before consulting the table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParsedQuery {
    /// A type, function or constant name; which one depends on the table.
    Name(Arc<str>),
    Function(Arc<str>),
    Member {
        owner: Arc<str>,
        member: Arc<str>,
        /// `Some` when the syntax fixes the kind (`$prop`, `method()`).
        kind: Option<SymbolKind>,
    },
}

/// Parse a query string.
pub fn parse_query(raw: &str) -> Result<ParsedQuery, QueryError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(QueryError::Empty);
    }

    if let Some((owner, member)) = raw.split_once(MEMBER_SEPARATOR) {
        let owner = validate_name(owner)?;
        let member = member.trim();
        let (member, kind) = if let Some(prop) = member.strip_prefix('$') {
            (prop, Some(SymbolKind::Property))
        } else if let Some(method) = member.strip_suffix("()") {
            (method, Some(SymbolKind::Method))
        } else {
            (member, None)
        };
        if member.is_empty() {
            return Err(QueryError::MissingMember);
        }
        if !is_identifier(member) || member.eq_ignore_ascii_case("class") {
            return Err(QueryError::InvalidName(member.to_string()));
        }
        return Ok(ParsedQuery::Member {
            owner,
            member: Arc::from(member),
            kind,
        });
    }

    if let Some(function) = raw.strip_suffix("()") {
        return Ok(ParsedQuery::Function(validate_name(function)?));
    }
    Ok(ParsedQuery::Name(validate_name(raw)?))
}

/// Strip one leading separator and check every segment is an identifier.
fn validate_name(raw: &str) -> Result<Arc<str>, QueryError> {
    let name = raw.trim();
    let name = name.strip_prefix(NS_SEPARATOR).unwrap_or(name);
    if name.is_empty() {
        return Err(if raw.trim().is_empty() {
            QueryError::Empty
        } else {
            QueryError::InvalidName(raw.to_string())
        });
    }
    if !name.split(NS_SEPARATOR).all(is_identifier) {
        return Err(QueryError::InvalidName(raw.to_string()));
    }
    Ok(Arc::from(name))
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) if first == '_' || unicode_ident::is_xid_start(first) => {}
        _ => return false,
    }
    chars.all(unicode_ident::is_xid_continue)
}

/// A query bound to a concrete search mode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Query {
    Type {
        fqn: Arc<str>,
    },
    Member {
        owner: Arc<str>,
        member: Arc<str>,
        /// `Method`, `Property` or `Constant`.
        kind: SymbolKind,
    },
    Function {
        fqn: Arc<str>,
    },
    Constant {
        fqn: Arc<str>,
    },
}

impl Query {
    /// Bind a parsed query to declared names where possible.
    ///
    /// A bare short name that is not itself declared resolves to the single
    /// class-like with that short name, if there is exactly one.
    pub fn resolve(parsed: ParsedQuery, table: &SymbolTable) -> Self {
        match parsed {
            ParsedQuery::Function(fqn) => Query::Function { fqn },
            ParsedQuery::Name(name) => {
                if let Some(ty) = table.lookup_type(&name) {
                    return Query::Type {
                        fqn: ty.qualified_name.clone(),
                    };
                }
                if let Some(f) = table.lookup(SymbolKind::Function, &name) {
                    return Query::Function {
                        fqn: f.qualified_name.clone(),
                    };
                }
                if let Some(c) = table.lookup(SymbolKind::Constant, &name) {
                    return Query::Constant {
                        fqn: c.qualified_name.clone(),
                    };
                }
                Query::Type {
                    fqn: unique_short_name(table, &name).unwrap_or(name),
                }
            }
            ParsedQuery::Member {
                owner,
                member,
                kind,
            } => {
                let owner = table
                    .lookup_type(&owner)
                    .map(|s| s.qualified_name.clone())
                    .or_else(|| unique_short_name(table, &owner))
                    .unwrap_or(owner);
                let kind = kind.unwrap_or_else(|| {
                    [SymbolKind::Method, SymbolKind::Constant, SymbolKind::Property]
                        .into_iter()
                        .find(|&k| table.find_member(&owner, &member, k).is_some())
                        .unwrap_or(SymbolKind::Method)
                });
                Query::Member {
                    owner,
                    member,
                    kind,
                }
            }
        }
    }

    /// Local name of the type, function or constant (the owner's, for members).
    pub fn short_name(&self) -> &str {
        let fqn: &str = match self {
            Query::Type { fqn } | Query::Function { fqn } | Query::Constant { fqn } => fqn,
            Query::Member { owner, .. } => owner,
        };
        fqn.rsplit(NS_SEPARATOR).next().unwrap_or(fqn)
    }

    pub fn member(&self) -> Option<&str> {
        match self {
            Query::Member { member, .. } => Some(member),
            _ => None,
        }
    }

    pub fn is_member(&self) -> bool {
        matches!(self, Query::Member { .. })
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Type { fqn } | Query::Constant { fqn } => f.write_str(fqn),
            Query::Function { fqn } => write!(f, "{}()", fqn),
            Query::Member {
                owner,
                member,
                kind: SymbolKind::Property,
            } => write!(f, "{}{}${}", owner, MEMBER_SEPARATOR, member),
            Query::Member { owner, member, .. } => f.write_str(&member_name(owner, member)),
        }
    }
}

fn unique_short_name(table: &SymbolTable, name: &str) -> Option<Arc<str>> {
    if name.contains(NS_SEPARATOR) {
        return None;
    }
    match table.types_named(name).as_slice() {
        [only] => Some(only.qualified_name.clone()),
        _ => None,
    }
}
