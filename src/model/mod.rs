pub mod decl;
pub mod enclosing;
pub mod entry;
pub mod member;

pub use decl::{
    Marker, MemberDeclaration, MemberKind, Modifier, Parameter, PersistenceMode, SourceModel,
    Statement, TypeDeclaration, TypeHierarchy, TypeKind, TypeRef,
};
pub use enclosing::EnclosingType;
pub use entry::{Entry, EntryTable};
pub use member::{MarkedMember, MemberDescriptor, Roles};
