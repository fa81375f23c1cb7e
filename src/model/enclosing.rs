use crate::core::config::{GeneratorConfig, REGISTRATION_METHOD};

use super::decl::{TypeDeclaration, TypeHierarchy};

/// Eligibility facts about the type that owns marked members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnclosingType {
    pub is_class_like: bool,
    pub is_partial_like: bool,
    pub implements_identifiable: bool,
    pub is_host_managed_lifecycle: bool,
    pub has_registration_call: bool,
}

impl EnclosingType {
    pub fn resolve(
        hierarchy: &impl TypeHierarchy,
        ty: &TypeDeclaration,
        config: &GeneratorConfig,
    ) -> Self {
        Self {
            is_class_like: ty.kind.is_class_like(),
            is_partial_like: ty.is_partial(),
            implements_identifiable: hierarchy.implements(ty, &config.identifiable_capability),
            is_host_managed_lifecycle: hierarchy.is_derived_from(ty, &config.lifecycle_base),
            has_registration_call: ty.invokes(REGISTRATION_METHOD),
        }
    }

    /// Has a way to key its persisted data.
    pub fn has_owner_key(&self) -> bool {
        self.implements_identifiable || self.is_host_managed_lifecycle
    }
}
