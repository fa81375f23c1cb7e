//! Structural validation of marked members and their enclosing types.

use std::collections::{BTreeSet, HashSet};
use std::sync::{Mutex, PoisonError};

use rayon::prelude::*;
use tracing::{Level, event, info_span};

use crate::aggregate::derive_id;
use crate::core::config::{GeneratorConfig, REGISTRATION_METHOD};
use crate::diagnostics::{Diagnostic, DiagnosticId, Location};
use crate::model::{
    EnclosingType, MarkedMember, MemberDeclaration, MemberDescriptor, SourceModel,
    TypeDeclaration,
};

/// Outcome of validating one type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeVerdict {
    pub type_path: String,
    pub diagnostics: Vec<Diagnostic>,
    /// A structural rule failed; the type must not be synthesized.
    pub blocked: bool,
    /// Members left out of aggregation because of their shape.
    pub excluded: BTreeSet<usize>,
}

impl TypeVerdict {
    fn new(type_path: String) -> Self {
        Self {
            type_path,
            diagnostics: Vec::new(),
            blocked: false,
            excluded: BTreeSet::new(),
        }
    }

    pub fn has(&self, id: DiagnosticId) -> bool {
        self.diagnostics.iter().any(|diagnostic| diagnostic.id == id)
    }
}

/// One validation pass.
///
/// Type-level rules are reported once per type for the lifetime of the pass,
/// even when several members (or threads) reach them.
pub struct ValidationPass<'a> {
    config: &'a GeneratorConfig,
    reported: Mutex<HashSet<(DiagnosticId, String)>>,
}

impl<'a> ValidationPass<'a> {
    pub fn new(config: &'a GeneratorConfig) -> Self {
        Self {
            config,
            reported: Mutex::new(HashSet::new()),
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        self.config
    }

    /// Validates every type that has marked members, in parallel.
    ///
    /// Verdicts come back in declaration order.
    pub fn validate_model(&self, model: &SourceModel) -> Vec<TypeVerdict> {
        let span = info_span!("savegen.validate", types = model.types.len());
        let _guard = span.enter();

        model
            .types
            .par_iter()
            .filter(|ty| ty.has_marked_members())
            .map(|ty| self.validate_type(model, ty))
            .collect()
    }

    pub fn validate_type(&self, model: &SourceModel, ty: &TypeDeclaration) -> TypeVerdict {
        let enclosing = EnclosingType::resolve(model, ty, self.config);
        let mut verdict = TypeVerdict::new(ty.qualified_name());

        for (index, member) in ty.members.iter().enumerate() {
            self.validate_member(ty, &enclosing, index, member, &mut verdict);
        }

        event!(
            Level::DEBUG,
            type_path = %verdict.type_path,
            diagnostics = verdict.diagnostics.len(),
            blocked = verdict.blocked,
            "type validated"
        );
        verdict
    }

    fn validate_member(
        &self,
        ty: &TypeDeclaration,
        enclosing: &EnclosingType,
        index: usize,
        member: &MemberDeclaration,
        verdict: &mut TypeVerdict,
    ) {
        let Some(marked) = MarkedMember::ingest(&ty.name, index, member) else {
            return;
        };
        let location = ty.member_location(member);

        if !enclosing.is_class_like {
            verdict.blocked = true;
            verdict.diagnostics.push(self.diagnostic(
                DiagnosticId::MustBeInsideAClass,
                location.clone(),
                vec![ty.kind.keyword().to_string(), location.to_string()],
            ));
            return;
        }

        if !enclosing.has_owner_key() {
            verdict.blocked = true;
            verdict.diagnostics.push(self.diagnostic(
                DiagnosticId::MustImplementIdentifiable,
                location,
                vec![
                    ty.name.clone(),
                    self.config.identifiable_capability.clone(),
                    self.config.lifecycle_base.clone(),
                ],
            ));
            self.check_extensible(ty, enclosing, verdict);
            return;
        }

        self.check_extensible(ty, enclosing, verdict);

        if let MemberDescriptor::Method {
            return_type,
            parameters,
        } = &marked.descriptor
        {
            let returns_void = return_type.is_none();
            let rule = match parameters.len() {
                0 if returns_void => Some(DiagnosticId::GetMethodMustReturnAndNoParameters),
                0 => None,
                1 if returns_void => None,
                _ => Some(DiagnosticId::SetMethodMustBeVoidAndHaveParameters),
            };
            if let Some(rule) = rule {
                verdict.excluded.insert(index);
                verdict.diagnostics.push(self.diagnostic(
                    rule,
                    location,
                    vec![marked.symbol.clone(), derive_id(&marked, self.config)],
                ));
            }
        }

        if !enclosing.has_registration_call
            && self.first_report(DiagnosticId::MustCallRegistrationEntryPoint, &verdict.type_path)
        {
            verdict.diagnostics.push(self.diagnostic(
                DiagnosticId::MustCallRegistrationEntryPoint,
                ty.location(),
                vec![ty.name.clone(), REGISTRATION_METHOD.to_string()],
            ));
        }
    }

    fn check_extensible(
        &self,
        ty: &TypeDeclaration,
        enclosing: &EnclosingType,
        verdict: &mut TypeVerdict,
    ) {
        if enclosing.is_partial_like {
            return;
        }
        verdict.blocked = true;
        if self.first_report(DiagnosticId::ClassMustBeExtensible, &verdict.type_path) {
            verdict.diagnostics.push(self.diagnostic(
                DiagnosticId::ClassMustBeExtensible,
                ty.location(),
                vec![ty.name.clone()],
            ));
        }
    }

    fn first_report(&self, id: DiagnosticId, type_path: &str) -> bool {
        let mut reported = self.reported.lock().unwrap_or_else(PoisonError::into_inner);
        reported.insert((id, type_path.to_string()))
    }

    fn diagnostic(&self, id: DiagnosticId, location: Location, args: Vec<String>) -> Diagnostic {
        Diagnostic::new(id, self.config.severity_of(id), location, args)
    }
}
