//! Declaration tree.
//!
//! An immutable snapshot of the declarations one pass looks at. Hosts build it
//! (see [`crate::host`]) and the validator, aggregator and repairs read it.
//! Repairs never mutate a snapshot in place; they produce a new one.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::diagnostics::Location;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    Class,
    Struct,
    Interface,
    Record,
    Enum,
    Union,
}

impl TypeKind {
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Struct => "struct",
            Self::Interface => "interface",
            Self::Record => "record",
            Self::Enum => "enum",
            Self::Union => "union",
        }
    }

    pub fn is_class_like(self) -> bool {
        self == Self::Class
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modifier {
    Public,
    Internal,
    Private,
    Static,
    Abstract,
    Sealed,
    Partial,
}

/// Source text of a type as written in a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeRef {
    Named(String),
    /// The host could not resolve the type (inferred, opaque or erroneous).
    Unresolved(String),
}

impl TypeRef {
    pub fn named(text: impl Into<String>) -> Self {
        Self::Named(text.into())
    }

    pub fn resolved(&self) -> Option<&str> {
        match self {
            Self::Named(text) => Some(text),
            Self::Unresolved(_) => None,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Named(text) | Self::Unresolved(text) => text,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceMode {
    #[default]
    Default,
    Persistent,
}

/// Settings carried by a persistence marker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    pub identifier: Option<String>,
    pub mode: PersistenceMode,
}

impl Marker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn identifier(mut self, identifier: &str) -> Self {
        self.identifier = Some(identifier.to_string());
        self
    }

    pub fn persistent(mut self) -> Self {
        self.mode = PersistenceMode::Persistent;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub ty: TypeRef,
}

/// One statement of a method body, with the names of everything it invokes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    pub text: String,
    pub invocations: Vec<String>,
}

impl Statement {
    pub fn invocation(callee: &str) -> Self {
        Self {
            text: format!("{callee}();"),
            invocations: vec![callee.to_string()],
        }
    }

    pub fn other(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            invocations: Vec::new(),
        }
    }

    pub fn invokes(&self, callee: &str) -> bool {
        self.invocations.iter().any(|name| name == callee)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberKind {
    Field {
        ty: TypeRef,
        is_read_only: bool,
        is_const: bool,
    },
    Property {
        ty: TypeRef,
        /// No setter
        is_read_only: bool,
    },
    Method {
        /// `None` for methods returning nothing.
        return_type: Option<TypeRef>,
        parameters: Vec<Parameter>,
        body: Vec<Statement>,
    },
    Constructor {
        parameters: Vec<Parameter>,
        body: Vec<Statement>,
    },
}

impl MemberKind {
    pub fn body(&self) -> &[Statement] {
        match self {
            Self::Method { body, .. } | Self::Constructor { body, .. } => body,
            Self::Field { .. } | Self::Property { .. } => &[],
        }
    }

    pub fn is_method(&self) -> bool {
        matches!(self, Self::Method { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDeclaration {
    /// Name identifiers are derived from.
    pub name: String,
    /// Name generated code uses to reach the member.
    pub symbol: String,
    pub kind: MemberKind,
    pub marker: Option<Marker>,
    pub is_static: bool,
}

impl MemberDeclaration {
    fn new(name: &str, kind: MemberKind) -> Self {
        Self {
            name: name.to_string(),
            symbol: name.to_string(),
            kind,
            marker: None,
            is_static: false,
        }
    }

    pub fn field(name: &str, ty: &str) -> Self {
        Self::new(
            name,
            MemberKind::Field {
                ty: TypeRef::named(ty),
                is_read_only: false,
                is_const: false,
            },
        )
    }

    pub fn property(name: &str, ty: &str) -> Self {
        Self::new(
            name,
            MemberKind::Property {
                ty: TypeRef::named(ty),
                is_read_only: false,
            },
        )
    }

    /// A getter-shaped method: no parameters, returns `ty`.
    pub fn getter(name: &str, ty: &str) -> Self {
        Self::method(name, Some(ty), &[])
    }

    /// A setter-shaped method: one parameter of `ty`, returns nothing.
    pub fn setter(name: &str, ty: &str) -> Self {
        Self::method(name, None, &[("value", ty)])
    }

    pub fn method(name: &str, return_type: Option<&str>, parameters: &[(&str, &str)]) -> Self {
        Self::new(
            name,
            MemberKind::Method {
                return_type: return_type.map(TypeRef::named),
                parameters: parameters
                    .iter()
                    .map(|(name, ty)| Parameter {
                        name: name.to_string(),
                        ty: TypeRef::named(*ty),
                    })
                    .collect(),
                body: Vec::new(),
            },
        )
    }

    pub fn constructor(name: &str) -> Self {
        Self::new(
            name,
            MemberKind::Constructor {
                parameters: Vec::new(),
                body: Vec::new(),
            },
        )
    }

    pub fn marked(mut self, marker: Marker) -> Self {
        self.marker = Some(marker);
        self
    }

    pub fn saved(self) -> Self {
        self.marked(Marker::new())
    }

    pub fn symbol(mut self, symbol: &str) -> Self {
        self.symbol = symbol.to_string();
        self
    }

    pub fn read_only(mut self) -> Self {
        match &mut self.kind {
            MemberKind::Field { is_read_only, .. } | MemberKind::Property { is_read_only, .. } => {
                *is_read_only = true
            }
            MemberKind::Method { .. } | MemberKind::Constructor { .. } => {}
        }
        self
    }

    pub fn constant(mut self) -> Self {
        if let MemberKind::Field { is_const, .. } = &mut self.kind {
            *is_const = true;
        }
        self.is_static = true;
        self
    }

    pub fn with_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn with_statement(mut self, statement: Statement) -> Self {
        match &mut self.kind {
            MemberKind::Method { body, .. } | MemberKind::Constructor { body, .. } => {
                body.push(statement)
            }
            MemberKind::Field { .. } | MemberKind::Property { .. } => {}
        }
        self
    }

    pub fn is_marked(&self) -> bool {
        self.marker.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDeclaration {
    pub name: String,
    /// Enclosing namespace segments, outermost first.
    pub namespace: Vec<String>,
    pub kind: TypeKind,
    pub modifiers: Vec<Modifier>,
    /// Base type and implemented capabilities, as declared.
    pub bases: Vec<String>,
    pub attributes: Vec<String>,
    pub members: Vec<MemberDeclaration>,
}

impl TypeDeclaration {
    pub fn new(name: &str, kind: TypeKind) -> Self {
        Self {
            name: name.to_string(),
            namespace: Vec::new(),
            kind,
            modifiers: Vec::new(),
            bases: Vec::new(),
            attributes: Vec::new(),
            members: Vec::new(),
        }
    }

    pub fn class(name: &str) -> Self {
        Self::new(name, TypeKind::Class)
    }

    pub fn in_namespace(mut self, namespace: &[&str]) -> Self {
        self.namespace = namespace.iter().map(|segment| segment.to_string()).collect();
        self
    }

    pub fn with_modifier(mut self, modifier: Modifier) -> Self {
        if !self.modifiers.contains(&modifier) {
            self.modifiers.push(modifier);
        }
        self
    }

    pub fn partial(self) -> Self {
        self.with_modifier(Modifier::Partial)
    }

    pub fn with_base(mut self, base: &str) -> Self {
        self.bases.push(base.to_string());
        self
    }

    pub fn with_attribute(mut self, attribute: &str) -> Self {
        self.attributes.push(attribute.to_string());
        self
    }

    pub fn with_member(mut self, member: MemberDeclaration) -> Self {
        self.members.push(member);
        self
    }

    /// `a::b::Type`
    pub fn qualified_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}::{}", self.namespace.join("::"), self.name)
        }
    }

    pub fn location(&self) -> Location {
        Location::of_type(self.qualified_name())
    }

    pub fn member_location(&self, member: &MemberDeclaration) -> Location {
        Location::of_member(self.qualified_name(), member.symbol.clone())
    }

    pub fn is_partial(&self) -> bool {
        self.modifiers.contains(&Modifier::Partial)
    }

    pub fn has_marked_members(&self) -> bool {
        self.members.iter().any(MemberDeclaration::is_marked)
    }

    pub fn member(&self, symbol: &str) -> Option<&MemberDeclaration> {
        self.members.iter().find(|member| member.symbol == symbol)
    }

    /// Any statement anywhere in the body invokes `callee`.
    pub fn invokes(&self, callee: &str) -> bool {
        self.members
            .iter()
            .flat_map(|member| member.kind.body())
            .any(|statement| statement.invokes(callee))
    }
}

/// Capability queries the validator and emitter ask of the host.
pub trait TypeHierarchy {
    /// `ty` is `base`, or derives from it directly or transitively.
    fn is_derived_from(&self, ty: &TypeDeclaration, base: &str) -> bool;

    /// `ty` or one of its ancestors lists `interface` as a capability.
    fn implements(&self, ty: &TypeDeclaration, interface: &str) -> bool;
}

/// All declarations seen by one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceModel {
    pub types: Vec<TypeDeclaration>,
}

impl SourceModel {
    pub fn new(types: Vec<TypeDeclaration>) -> Self {
        Self { types }
    }

    pub fn with_type(mut self, ty: TypeDeclaration) -> Self {
        self.types.push(ty);
        self
    }

    /// Finds a type by qualified name, falling back to its simple name.
    pub fn find(&self, name: &str) -> Option<&TypeDeclaration> {
        self.types
            .iter()
            .find(|ty| ty.qualified_name() == name)
            .or_else(|| self.types.iter().find(|ty| ty.name == name))
    }

    pub(crate) fn position(&self, qualified_name: &str) -> Option<usize> {
        self.types
            .iter()
            .position(|ty| ty.qualified_name() == qualified_name)
    }

    fn base_name(base: &str) -> &str {
        base.rsplit("::").next().unwrap_or(base)
    }

    // Walks the declared bases breadth-first; the visited set guards against cyclic declarations.
    fn ancestors_any(&self, ty: &TypeDeclaration, mut hit: impl FnMut(&str) -> bool) -> bool {
        let mut visited = HashSet::new();
        let mut pending: Vec<&TypeDeclaration> = vec![ty];
        visited.insert(ty.qualified_name());

        while let Some(current) = pending.pop() {
            for base in &current.bases {
                if hit(Self::base_name(base)) {
                    return true;
                }
                if let Some(parent) = self.find(base) {
                    if visited.insert(parent.qualified_name()) {
                        pending.push(parent);
                    }
                }
            }
        }

        false
    }
}

impl TypeHierarchy for SourceModel {
    fn is_derived_from(&self, ty: &TypeDeclaration, base: &str) -> bool {
        let wanted = Self::base_name(base);
        ty.name == wanted || self.ancestors_any(ty, |name| name == wanted)
    }

    fn implements(&self, ty: &TypeDeclaration, interface: &str) -> bool {
        let wanted = Self::base_name(interface);
        self.ancestors_any(ty, |name| name == wanted)
    }
}
