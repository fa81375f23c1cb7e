//! Registration procedure synthesis.
//!
//! [`emit`] turns a resolved entry table into a [`SynthesizedProcedure`], a
//! target-neutral description of the calls the registration procedure makes.
//! [`render::RustRenderer`] turns that description into Rust tokens.

pub mod render;

use serde::Serialize;
use tracing::{Level, event};

use crate::core::config::{GeneratorConfig, REGISTRATION_METHOD};
use crate::core::error::{Result, SaveGenError};
use crate::model::{
    EnclosingType, EntryTable, MarkedMember, MemberDescriptor, PersistenceMode, TypeDeclaration,
};

pub use render::{GeneratedSource, RustRenderer};

/// How the procedure obtains the key its entry context is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum OwnerKey {
    /// `<capability>::<accessor>(&instance)`
    Identity { capability: String, accessor: String },
    /// The instance handle itself.
    Instance,
}

/// Read side of an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Accessor {
    /// `instance.symbol.clone()`
    Read { symbol: String },
    /// `instance.symbol()`
    Call { symbol: String },
    /// `Self::symbol`
    ReadAssociated { symbol: String },
    /// `Self::symbol()`
    CallAssociated { symbol: String },
}

/// Write side of an entry. `value_type` is what incoming values are cast to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Mutator {
    /// `instance.symbol = value`
    Assign { symbol: String, value_type: String },
    /// `instance.symbol(value)`
    Call { symbol: String, value_type: String },
    /// `Self::symbol(value)`
    CallAssociated { symbol: String, value_type: String },
}

impl Mutator {
    pub fn value_type(&self) -> &str {
        match self {
            Self::Assign { value_type, .. }
            | Self::Call { value_type, .. }
            | Self::CallAssociated { value_type, .. } => value_type,
        }
    }
}

/// Roles an entry binds. An absent role is never passed as a placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Binding {
    Both(Accessor, Mutator),
    Getter(Accessor),
    Setter(Mutator),
}

impl Binding {
    pub fn getter(&self) -> Option<&Accessor> {
        match self {
            Self::Both(getter, _) | Self::Getter(getter) => Some(getter),
            Self::Setter(_) => None,
        }
    }

    pub fn setter(&self) -> Option<&Mutator> {
        match self {
            Self::Both(_, setter) | Self::Setter(setter) => Some(setter),
            Self::Getter(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindCall {
    pub id: String,
    pub mode: PersistenceMode,
    pub binding: Binding,
}

impl BindCall {
    /// Entry context method this call goes through.
    pub fn method_name(&self) -> &'static str {
        match (self.mode, &self.binding) {
            (PersistenceMode::Default, Binding::Both(..)) => "bind",
            (PersistenceMode::Default, Binding::Getter(_)) => "bind_getter",
            (PersistenceMode::Default, Binding::Setter(_)) => "bind_setter",
            (PersistenceMode::Persistent, Binding::Both(..)) => "bind_persistent",
            (PersistenceMode::Persistent, Binding::Getter(_)) => "bind_persistent_getter",
            (PersistenceMode::Persistent, Binding::Setter(_)) => "bind_persistent_setter",
        }
    }
}

/// Registration procedure of one type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SynthesizedProcedure {
    pub type_name: String,
    pub namespace: Vec<String>,
    pub owner: OwnerKey,
    pub calls: Vec<BindCall>,
}

impl SynthesizedProcedure {
    pub fn name(&self) -> &'static str {
        REGISTRATION_METHOD
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.calls.iter().map(|call| call.id.as_str())
    }
}

fn accessor_for(member: &MarkedMember) -> Accessor {
    let symbol = member.symbol.clone();
    match (&member.descriptor, member.is_static) {
        (MemberDescriptor::Method { .. }, false) => Accessor::Call { symbol },
        (MemberDescriptor::Method { .. }, true) => Accessor::CallAssociated { symbol },
        (_, false) => Accessor::Read { symbol },
        (_, true) => Accessor::ReadAssociated { symbol },
    }
}

fn mutator_for(member: &MarkedMember) -> Result<Mutator> {
    let value_type = member
        .descriptor
        .value_type()
        .and_then(|ty| ty.resolved())
        .ok_or_else(|| SaveGenError::UnresolvedValueType {
            type_name: member.declaring_type.clone(),
            member: member.symbol.clone(),
        })?
        .to_string();
    let symbol = member.symbol.clone();

    match (&member.descriptor, member.is_static) {
        (MemberDescriptor::Method { .. }, false) => Ok(Mutator::Call { symbol, value_type }),
        (MemberDescriptor::Method { .. }, true) => {
            Ok(Mutator::CallAssociated { symbol, value_type })
        }
        (_, false) => Ok(Mutator::Assign { symbol, value_type }),
        (_, true) => Err(SaveGenError::UnsupportedMember {
            type_name: member.declaring_type.clone(),
            member: member.symbol.clone(),
            reason: "associated items cannot be assigned".to_string(),
        }),
    }
}

/// Builds the registration procedure for `ty` from its resolved entries.
///
/// The owner key is the identity capability when the type has one, and the
/// instance otherwise. Calls follow the entry table order.
pub fn emit(
    ty: &TypeDeclaration,
    enclosing: &EnclosingType,
    entries: &EntryTable,
    config: &GeneratorConfig,
) -> Result<SynthesizedProcedure> {
    let owner = if enclosing.implements_identifiable {
        OwnerKey::Identity {
            capability: config.identifiable_capability.clone(),
            accessor: config.identity_accessor.clone(),
        }
    } else {
        OwnerKey::Instance
    };

    let mut calls = Vec::with_capacity(entries.len());
    for entry in entries.values() {
        let getter = entry.getter.as_ref().map(accessor_for);
        let setter = entry.setter.as_ref().map(mutator_for).transpose()?;
        let binding = match (getter, setter) {
            (Some(getter), Some(setter)) => Binding::Both(getter, setter),
            (Some(getter), None) => Binding::Getter(getter),
            (None, Some(setter)) => Binding::Setter(setter),
            (None, None) => return Err(SaveGenError::EmptyEntry(entry.id.clone())),
        };
        calls.push(BindCall {
            id: entry.id.clone(),
            mode: entry.mode,
            binding,
        });
    }

    event!(
        Level::DEBUG,
        type_name = %ty.qualified_name(),
        calls = calls.len(),
        "registration procedure emitted"
    );

    Ok(SynthesizedProcedure {
        type_name: ty.name.clone(),
        namespace: ty.namespace.clone(),
        owner,
        calls,
    })
}
