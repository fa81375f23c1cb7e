//! Point-fixes for structural diagnostics.
//!
//! A repair is an [`EditScript`]: an ordered list of declaration edits applied
//! atomically to a [`SourceModel`]. Every edit is idempotent, so a script can be
//! applied any number of times and batches may contain duplicates.

use serde::{Deserialize, Serialize};
use tracing::{Level, event, info_span};

use crate::core::config::{GeneratorConfig, REGISTRATION_METHOD};
use crate::core::error::{Result, SaveGenError};
use crate::diagnostics::{Diagnostic, DiagnosticId};
use crate::model::{
    MemberDeclaration, MemberKind, Modifier, SourceModel, Statement, TypeDeclaration, TypeKind,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditOp {
    AddModifier {
        type_path: String,
        modifier: Modifier,
    },
    AddCapability {
        type_path: String,
        capability: String,
    },
    ChangeKind {
        type_path: String,
        kind: TypeKind,
    },
    /// Skipped when a member with the same symbol exists.
    InsertMember {
        type_path: String,
        index: usize,
        member: MemberDeclaration,
    },
    /// Skipped when the body already holds an identical statement.
    InsertStatement {
        type_path: String,
        member: String,
        index: usize,
        statement: Statement,
    },
}

impl EditOp {
    fn type_path(&self) -> &str {
        match self {
            Self::AddModifier { type_path, .. }
            | Self::AddCapability { type_path, .. }
            | Self::ChangeKind { type_path, .. }
            | Self::InsertMember { type_path, .. }
            | Self::InsertStatement { type_path, .. } => type_path,
        }
    }

    fn apply_to(&self, ty: &mut TypeDeclaration) -> Result<()> {
        match self {
            Self::AddModifier { modifier, .. } => {
                if !ty.modifiers.contains(modifier) {
                    ty.modifiers.push(*modifier);
                }
            }
            Self::AddCapability { capability, .. } => {
                let wanted = last_segment(capability);
                if !ty.bases.iter().any(|base| last_segment(base) == wanted) {
                    ty.bases.push(capability.clone());
                }
            }
            Self::ChangeKind { kind, .. } => ty.kind = *kind,
            Self::InsertMember { index, member, .. } => {
                if ty.member(&member.symbol).is_some() {
                    return Ok(());
                }
                if *index > ty.members.len() {
                    return Err(SaveGenError::EditOutOfRange(format!(
                        "member index {index} in '{}'",
                        ty.qualified_name()
                    )));
                }
                ty.members.insert(*index, member.clone());
            }
            Self::InsertStatement {
                member,
                index,
                statement,
                ..
            } => {
                let type_name = ty.qualified_name();
                let target = ty
                    .members
                    .iter_mut()
                    .find(|candidate| candidate.symbol == *member)
                    .ok_or_else(|| SaveGenError::MemberNotFound {
                        type_name: type_name.clone(),
                        member: member.clone(),
                    })?;
                let body = match &mut target.kind {
                    MemberKind::Method { body, .. } | MemberKind::Constructor { body, .. } => body,
                    MemberKind::Field { .. } | MemberKind::Property { .. } => {
                        return Err(SaveGenError::EditOutOfRange(format!(
                            "'{type_name}::{member}' has no body"
                        )));
                    }
                };
                if body.contains(statement) {
                    return Ok(());
                }
                if *index > body.len() {
                    return Err(SaveGenError::EditOutOfRange(format!(
                        "statement index {index} in '{type_name}::{member}'"
                    )));
                }
                body.insert(*index, statement.clone());
            }
        }
        Ok(())
    }
}

fn last_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

/// Named, ordered edits fixing one diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditScript {
    pub title: String,
    pub diagnostic: DiagnosticId,
    pub ops: Vec<EditOp>,
}

impl EditScript {
    /// Applies every edit to a copy of `model`. On error `model` is left as it was.
    pub fn apply(&self, model: &SourceModel) -> Result<SourceModel> {
        let mut next = model.clone();
        for op in &self.ops {
            let position = next
                .position(op.type_path())
                .ok_or_else(|| SaveGenError::TypeNotFound(op.type_path().to_string()))?;
            op.apply_to(&mut next.types[position])?;
        }
        event!(Level::DEBUG, title = %self.title, ops = self.ops.len(), "edit script applied");
        Ok(next)
    }
}

/// The repair for `diagnostic`, if its rule has one.
pub fn repair_for(
    diagnostic: &Diagnostic,
    model: &SourceModel,
    config: &GeneratorConfig,
) -> Option<EditScript> {
    let ty = model.find(&diagnostic.location.type_path)?;
    let type_path = ty.qualified_name();

    let (title, ops) = match diagnostic.id {
        DiagnosticId::ClassMustBeExtensible => (
            format!("Make '{}' partial", ty.name),
            vec![EditOp::AddModifier {
                type_path,
                modifier: Modifier::Partial,
            }],
        ),
        DiagnosticId::MustBeInsideAClass => (
            format!("Convert '{}' to a class", ty.name),
            vec![EditOp::ChangeKind {
                type_path,
                kind: TypeKind::Class,
            }],
        ),
        DiagnosticId::MustImplementIdentifiable => (
            format!("Implement '{}' on '{}'", config.identifiable_capability, ty.name),
            vec![EditOp::AddCapability {
                type_path,
                capability: config.identifiable_capability.clone(),
            }],
        ),
        DiagnosticId::MustCallRegistrationEntryPoint => (
            format!("Call '{REGISTRATION_METHOD}' from '{}'", config.lifecycle_hook),
            registration_call_ops(ty, type_path, config),
        ),
        DiagnosticId::GetMethodMustReturnAndNoParameters
        | DiagnosticId::SetMethodMustBeVoidAndHaveParameters
        | DiagnosticId::UnresolvedValueType
        | DiagnosticId::GenerationFailed => return None,
    };

    Some(EditScript {
        title,
        diagnostic: diagnostic.id,
        ops,
    })
}

fn registration_call_ops(
    ty: &TypeDeclaration,
    type_path: String,
    config: &GeneratorConfig,
) -> Vec<EditOp> {
    let hook = &config.lifecycle_hook;
    let mut ops = Vec::with_capacity(2);

    if ty.member(hook).is_none() {
        let index = ty
            .members
            .iter()
            .position(|member| member.kind.is_method())
            .unwrap_or(ty.members.len());
        ops.push(EditOp::InsertMember {
            type_path: type_path.clone(),
            index,
            member: MemberDeclaration::method(hook, None, &[]),
        });
    }

    ops.push(EditOp::InsertStatement {
        type_path,
        member: hook.clone(),
        index: 0,
        statement: Statement::invocation(REGISTRATION_METHOD),
    });
    ops
}

/// Applies the repair of every `id` diagnostic in turn.
pub fn fix_all(
    model: &SourceModel,
    diagnostics: &[Diagnostic],
    id: DiagnosticId,
    config: &GeneratorConfig,
) -> Result<SourceModel> {
    let span = info_span!("savegen.repair", id = %id);
    let _guard = span.enter();

    let mut current = model.clone();
    let mut applied = 0usize;
    for diagnostic in diagnostics.iter().filter(|diagnostic| diagnostic.id == id) {
        if let Some(script) = repair_for(diagnostic, &current, config) {
            current = script.apply(&current)?;
            applied += 1;
        }
    }

    event!(Level::INFO, applied, "repairs applied");
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::ValidationPass;

    fn diagnostics(model: &SourceModel, config: &GeneratorConfig) -> Vec<Diagnostic> {
        ValidationPass::new(config)
            .validate_model(model)
            .into_iter()
            .flat_map(|verdict| verdict.diagnostics)
            .collect()
    }

    fn count(model: &SourceModel, config: &GeneratorConfig, id: DiagnosticId) -> usize {
        diagnostics(model, config)
            .iter()
            .filter(|diagnostic| diagnostic.id == id)
            .count()
    }

    fn broken() -> SourceModel {
        SourceModel::new(vec![
            TypeDeclaration::class("Ship")
                .in_namespace(&["game"])
                .with_member(MemberDeclaration::field("_hp", "i32").saved())
                .with_member(MemberDeclaration::getter("GetDrag", "f32").saved()),
            TypeDeclaration::new("Point", TypeKind::Struct)
                .with_base("Behaviour")
                .with_member(MemberDeclaration::field("x", "f32").saved()),
        ])
    }

    #[test]
    fn test_each_repair_converges_and_is_idempotent() {
        let config = GeneratorConfig::new();
        let ids = [
            DiagnosticId::MustImplementIdentifiable,
            DiagnosticId::ClassMustBeExtensible,
            DiagnosticId::MustBeInsideAClass,
        ];

        for id in ids {
            let model = broken();
            let found = diagnostics(&model, &config);
            assert!(found.iter().any(|diagnostic| diagnostic.id == id), "{id} not reported");

            let fixed = fix_all(&model, &found, id, &config).unwrap();
            assert_eq!(count(&fixed, &config, id), 0, "{id} still reported");

            let again = fix_all(&fixed, &found, id, &config).unwrap();
            assert_eq!(again, fixed);
        }
    }

    #[test]
    fn test_registration_repair_converges() {
        let config = GeneratorConfig::new();
        let model = SourceModel::new(vec![
            TypeDeclaration::class("Ship")
                .partial()
                .with_base("Behaviour")
                .with_member(MemberDeclaration::field("_hp", "i32").saved()),
        ]);
        let found = diagnostics(&model, &config);
        let fixed =
            fix_all(&model, &found, DiagnosticId::MustCallRegistrationEntryPoint, &config).unwrap();

        assert_eq!(count(&fixed, &config, DiagnosticId::MustCallRegistrationEntryPoint), 0);
        let hook = fixed.find("Ship").unwrap().member("awake").unwrap();
        assert_eq!(hook.kind.body(), &[Statement::invocation(REGISTRATION_METHOD)]);
    }

    #[test]
    fn test_hook_is_created_before_first_method() {
        let ty = TypeDeclaration::class("Ship")
            .partial()
            .with_base("Behaviour")
            .with_member(MemberDeclaration::field("_hp", "i32").saved())
            .with_member(MemberDeclaration::getter("GetDrag", "f32").saved());
        let model = SourceModel::new(vec![ty]);
        let diagnostic = Diagnostic::new(
            DiagnosticId::MustCallRegistrationEntryPoint,
            crate::diagnostics::Severity::Warning,
            model.types[0].location(),
            vec![],
        );
        let script = repair_for(&diagnostic, &model, &GeneratorConfig::new()).unwrap();
        let fixed = script.apply(&model).unwrap();

        let symbols: Vec<_> = fixed.types[0].members.iter().map(|m| m.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["_hp", "awake", "GetDrag"]);
        assert_eq!(script.apply(&fixed).unwrap(), fixed);
    }

    #[test]
    fn test_existing_hook_gets_call_first() {
        let ty = TypeDeclaration::class("Ship")
            .partial()
            .with_base("Behaviour")
            .with_member(MemberDeclaration::field("_hp", "i32").saved())
            .with_member(
                MemberDeclaration::method("awake", None, &[])
                    .with_statement(Statement::other("self.ready = true;")),
            );
        let model = SourceModel::new(vec![ty]);
        let found = diagnostics(&model, &GeneratorConfig::new());
        let fixed = fix_all(
            &model,
            &found,
            DiagnosticId::MustCallRegistrationEntryPoint,
            &GeneratorConfig::new(),
        )
        .unwrap();

        let body = fixed.types[0].member("awake").unwrap().kind.body();
        assert_eq!(body[0], Statement::invocation(REGISTRATION_METHOD));
        assert_eq!(body.len(), 2);
    }

    #[test]
    fn test_change_kind_keeps_members_and_attributes() {
        let model = SourceModel::new(vec![
            TypeDeclaration::new("Point", TypeKind::Struct)
                .with_attribute("derive(Debug)")
                .with_member(MemberDeclaration::field("x", "f32").saved()),
        ]);
        let script = EditScript {
            title: "Convert 'Point' to a class".into(),
            diagnostic: DiagnosticId::MustBeInsideAClass,
            ops: vec![EditOp::ChangeKind { type_path: "Point".into(), kind: TypeKind::Class }],
        };
        let fixed = script.apply(&model).unwrap();

        assert_eq!(fixed.types[0].kind, TypeKind::Class);
        assert_eq!(fixed.types[0].attributes, model.types[0].attributes);
        assert_eq!(fixed.types[0].members, model.types[0].members);
    }

    #[test]
    fn test_failed_script_leaves_model_untouched() {
        let model = broken();
        let script = EditScript {
            title: "broken".into(),
            diagnostic: DiagnosticId::ClassMustBeExtensible,
            ops: vec![
                EditOp::AddModifier { type_path: "game::Ship".into(), modifier: Modifier::Partial },
                EditOp::InsertStatement {
                    type_path: "game::Ship".into(),
                    member: "missing".into(),
                    index: 0,
                    statement: Statement::invocation(REGISTRATION_METHOD),
                },
            ],
        };

        assert_eq!(
            script.apply(&model).unwrap_err(),
            SaveGenError::MemberNotFound { type_name: "game::Ship".into(), member: "missing".into() }
        );
        assert!(!model.find("game::Ship").unwrap().is_partial());

        let unknown = EditScript {
            ops: vec![EditOp::ChangeKind { type_path: "Nope".into(), kind: TypeKind::Class }],
            ..script
        };
        assert_eq!(unknown.apply(&model).unwrap_err(), SaveGenError::TypeNotFound("Nope".into()));
    }

    #[test]
    fn test_method_shape_rules_have_no_repair() {
        let model = broken();
        let diagnostic = Diagnostic::new(
            DiagnosticId::GetMethodMustReturnAndNoParameters,
            crate::diagnostics::Severity::Error,
            model.types[0].location(),
            vec![],
        );
        assert!(repair_for(&diagnostic, &model, &GeneratorConfig::new()).is_none());
    }
}
