//! Bounded value tracing inside one function or method body.
//!
//! The visitor records, per local variable, what is known about the value it
//! holds: the type of the object, or the text of a string naming a class or
//! member, together with how that knowledge was obtained ([`Origin`]). Each
//! assignment from another variable adds a hop; past the configured limit,
//! or across a function boundary, the value becomes untraceable.

use std::sync::Arc;

use rustc_hash::FxHashMap;

/// How the type or text of a value is known.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Spelled out at the site (`Widget::make()`, `'render'`).
    Explicit,
    /// `$this`, `self`, `static`, `parent`.
    SelfRef,
    /// Produced by `new Widget` in the same expression.
    Constructed,
    /// A declared parameter, property or return type, or an `@var` hint.
    Annotated,
    /// Followed through local assignments.
    Traced { hops: u32 },
    Untraceable,
}

impl Origin {
    /// Higher is more certain.
    pub fn rank(self) -> u8 {
        match self {
            Origin::Explicit | Origin::SelfRef | Origin::Constructed => 3,
            Origin::Annotated => 2,
            Origin::Traced { .. } => 1,
            Origin::Untraceable => 0,
        }
    }

    /// The less certain of two origins.
    pub fn weaker(self, other: Origin) -> Origin {
        if other.rank() < self.rank() { other } else { self }
    }

    pub fn is_traceable(self) -> bool {
        self != Origin::Untraceable
    }
}

/// What is known about one value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Value {
    /// Class of the object the value holds.
    pub ty: Option<Arc<str>>,
    /// Contents of the string the value holds.
    pub text: Option<Arc<str>>,
    pub origin: Origin,
}

impl Value {
    pub fn untraceable() -> Self {
        Self {
            ty: None,
            text: None,
            origin: Origin::Untraceable,
        }
    }

    pub fn object(ty: Option<Arc<str>>, origin: Origin) -> Self {
        match ty {
            Some(ty) => Self {
                ty: Some(ty),
                text: None,
                origin,
            },
            None => Self::untraceable(),
        }
    }

    pub fn string(text: impl Into<Arc<str>>, origin: Origin) -> Self {
        Self {
            ty: None,
            text: Some(text.into()),
            origin,
        }
    }

    pub fn is_known(&self) -> bool {
        self.origin.is_traceable() && (self.ty.is_some() || self.text.is_some())
    }

    /// The value as seen through one more assignment.
    fn hop(self, limit: u32) -> Self {
        let hops = match self.origin {
            Origin::Untraceable => return Self::untraceable(),
            Origin::Traced { hops } => hops + 1,
            _ => 1,
        };
        if hops > limit {
            return Self::untraceable();
        }
        Self {
            origin: Origin::Traced { hops },
            ..self
        }
    }
}

/// Local variables of the function body being walked.
#[derive(Clone, Debug)]
pub struct Env<'a> {
    vars: FxHashMap<&'a str, Value>,
    /// `@var` hints; consulted when assignments say nothing about the type.
    doc_types: FxHashMap<&'a str, Arc<str>>,
    hop_limit: u32,
}

impl<'a> Env<'a> {
    pub fn new(hop_limit: u32) -> Self {
        Self {
            vars: FxHashMap::default(),
            doc_types: FxHashMap::default(),
            hop_limit,
        }
    }

    /// A fresh scope with the same limit (closures, nested functions).
    pub fn nested(&self) -> Self {
        Self::new(self.hop_limit)
    }

    /// Bind a parameter; a declared type makes it annotated.
    pub fn bind_param(&mut self, name: &'a str, ty: Option<Arc<str>>) {
        self.vars.insert(name, Value::object(ty, Origin::Annotated));
    }

    /// `$name = <value>`
    pub fn assign(&mut self, name: &'a str, value: Value) {
        let value = value.hop(self.hop_limit);
        self.vars.insert(name, value);
    }

    /// `/** @var Type $name */`
    pub fn annotate(&mut self, name: &'a str, ty: Arc<str>) {
        self.doc_types.insert(name, ty);
    }

    /// Bind with a known type that needs no tracing (catch variables).
    pub fn bind_annotated(&mut self, name: &'a str, ty: Option<Arc<str>>) {
        self.vars.insert(name, Value::object(ty, Origin::Annotated));
    }

    /// The variable's provenance is lost (`global`, `foreach`, captures).
    pub fn forget(&mut self, name: &'a str) {
        self.vars.insert(name, Value::untraceable());
    }

    pub fn get(&self, name: &str) -> Value {
        let value = self
            .vars
            .get(name)
            .cloned()
            .unwrap_or_else(Value::untraceable);
        if value.ty.is_none() {
            if let Some(doc) = self.doc_types.get(name) {
                return Value {
                    ty: Some(doc.clone()),
                    text: value.text,
                    origin: Origin::Annotated,
                };
            }
        }
        value
    }
}
