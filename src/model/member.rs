use serde::Serialize;

use super::decl::{Marker, MemberDeclaration, MemberKind, TypeRef};

/// Shape of a marked member, reduced to what aggregation and emission need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MemberDescriptor {
    Field {
        ty: TypeRef,
        is_read_only: bool,
        is_const: bool,
    },
    Property {
        ty: TypeRef,
        is_read_only: bool,
    },
    Method {
        /// `None` when the method returns nothing.
        return_type: Option<TypeRef>,
        parameters: Vec<TypeRef>,
    },
}

impl MemberDescriptor {
    /// Resolution priority when several members share an id; higher wins.
    pub fn priority(&self) -> u8 {
        match self {
            Self::Method { .. } => 3,
            Self::Property { .. } => 2,
            Self::Field { .. } => 1,
        }
    }

    pub fn roles(&self) -> Roles {
        match self {
            Self::Field {
                is_read_only,
                is_const,
                ..
            } => Roles {
                get: true,
                set: !is_read_only && !is_const,
            },
            Self::Property { is_read_only, .. } => Roles {
                get: true,
                set: !is_read_only,
            },
            Self::Method {
                return_type,
                parameters,
            } => Roles {
                get: parameters.is_empty() && return_type.is_some(),
                set: parameters.len() == 1 && return_type.is_none(),
            },
        }
    }

    /// Type a setter casts incoming values to.
    pub fn value_type(&self) -> Option<&TypeRef> {
        match self {
            Self::Field { ty, .. } | Self::Property { ty, .. } => Some(ty),
            Self::Method {
                return_type,
                parameters,
            } => parameters.first().or(return_type.as_ref()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Roles {
    pub get: bool,
    pub set: bool,
}

impl Roles {
    pub fn any(self) -> bool {
        self.get || self.set
    }
}

/// A declaration carrying the persistence marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkedMember {
    pub descriptor: MemberDescriptor,
    pub declared_name: String,
    pub symbol: String,
    pub declaring_type: String,
    pub marker: Marker,
    pub is_static: bool,
    pub roles: Roles,
    /// Position among the type's members.
    pub order: usize,
}

impl MarkedMember {
    /// `None` for unmarked members and for constructors.
    pub fn ingest(declaring_type: &str, order: usize, member: &MemberDeclaration) -> Option<Self> {
        let marker = member.marker.clone()?;
        let descriptor = match &member.kind {
            MemberKind::Field {
                ty,
                is_read_only,
                is_const,
            } => MemberDescriptor::Field {
                ty: ty.clone(),
                is_read_only: *is_read_only,
                is_const: *is_const,
            },
            MemberKind::Property { ty, is_read_only } => MemberDescriptor::Property {
                ty: ty.clone(),
                is_read_only: *is_read_only,
            },
            MemberKind::Method {
                return_type,
                parameters,
                ..
            } => MemberDescriptor::Method {
                return_type: return_type.clone(),
                parameters: parameters.iter().map(|parameter| parameter.ty.clone()).collect(),
            },
            MemberKind::Constructor { .. } => return None,
        };
        let roles = descriptor.roles();

        Some(Self {
            descriptor,
            declared_name: member.name.clone(),
            symbol: member.symbol.clone(),
            declaring_type: declaring_type.to_string(),
            marker,
            is_static: member.is_static,
            roles,
            order,
        })
    }

    pub fn is_method(&self) -> bool {
        matches!(self.descriptor, MemberDescriptor::Method { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ingest(member: MemberDeclaration) -> MarkedMember {
        MarkedMember::ingest("Player", 0, &member.saved()).unwrap()
    }

    #[test]
    fn test_field_roles() {
        assert_eq!(
            ingest(MemberDeclaration::field("hp", "i32")).roles,
            Roles { get: true, set: true }
        );
        assert_eq!(
            ingest(MemberDeclaration::field("hp", "i32").read_only()).roles,
            Roles { get: true, set: false }
        );
        assert_eq!(
            ingest(MemberDeclaration::field("MAX", "i32").constant()).roles,
            Roles { get: true, set: false }
        );
    }

    #[test]
    fn test_method_roles() {
        assert_eq!(
            ingest(MemberDeclaration::getter("GetDrag", "f32")).roles,
            Roles { get: true, set: false }
        );
        assert_eq!(
            ingest(MemberDeclaration::setter("SetDrag", "f32")).roles,
            Roles { get: false, set: true }
        );
        assert!(!ingest(MemberDeclaration::method("Reset", None, &[])).roles.any());
        assert!(
            !ingest(MemberDeclaration::method("Mix", None, &[("a", "f32"), ("b", "f32")]))
                .roles
                .any()
        );
        assert!(!ingest(MemberDeclaration::method("Apply", Some("bool"), &[("a", "f32")])).roles.any());
    }

    #[test]
    fn test_unmarked_and_constructors_are_skipped() {
        assert!(MarkedMember::ingest("Player", 0, &MemberDeclaration::field("hp", "i32")).is_none());
        assert!(MarkedMember::ingest("Player", 0, &MemberDeclaration::constructor("new").saved()).is_none());
    }

    #[test]
    fn test_priority_order() {
        let field = ingest(MemberDeclaration::field("drag", "f32"));
        let property = ingest(MemberDeclaration::property("Drag", "f32"));
        let method = ingest(MemberDeclaration::getter("GetDrag", "f32"));
        assert!(method.descriptor.priority() > property.descriptor.priority());
        assert!(property.descriptor.priority() > field.descriptor.priority());
    }

    #[test]
    fn test_value_type_of_setter_is_its_parameter() {
        let setter = ingest(MemberDeclaration::setter("SetVelocity", "Vector3"));
        assert_eq!(setter.descriptor.value_type(), Some(&TypeRef::named("Vector3")));
    }
}
