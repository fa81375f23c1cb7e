//! One generation pass: validate, gate, aggregate, emit and render.

use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};

use serde::Serialize;
use tracing::{Level, event, info_span};

use crate::aggregate::{aggregate, collect_marked_members};
use crate::core::config::GeneratorConfig;
use crate::core::error::{Result, SaveGenError};
use crate::diagnostics::{Diagnostic, DiagnosticId};
use crate::emit::{GeneratedSource, RustRenderer, SynthesizedProcedure, emit};
use crate::model::{EnclosingType, SourceModel, TypeDeclaration};
use crate::validate::{TypeVerdict, ValidationPass};

/// Output for one synthesized type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedType {
    pub type_path: String,
    pub procedure: SynthesizedProcedure,
    pub source: GeneratedSource,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenerationOutput {
    pub diagnostics: Vec<Diagnostic>,
    pub generated: Vec<GeneratedType>,
}

impl GenerationOutput {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn diagnostics_of(&self, id: DiagnosticId) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |diagnostic| diagnostic.id == id)
    }

    pub fn procedure(&self, type_path: &str) -> Option<&SynthesizedProcedure> {
        self.generated
            .iter()
            .find(|generated| generated.type_path == type_path)
            .map(|generated| &generated.procedure)
    }
}

type Synthesized = (SynthesizedProcedure, GeneratedSource);

/// Runs generation passes over declaration snapshots.
///
/// A failure while synthesizing one type, panics included, becomes a
/// diagnostic for that type; the other types are still generated.
#[derive(Debug, Clone)]
pub struct Generator {
    config: GeneratorConfig,
    renderer: RustRenderer,
}

impl Generator {
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        config.validate()?;
        let renderer = RustRenderer::from_config(&config)?;
        Ok(Self { config, renderer })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn renderer(&self) -> &RustRenderer {
        &self.renderer
    }

    pub fn run(&self, model: &SourceModel) -> GenerationOutput {
        self.run_with(model, |model, ty, excluded| self.synthesize(model, ty, excluded))
    }

    fn run_with<F>(&self, model: &SourceModel, synthesize: F) -> GenerationOutput
    where
        F: Fn(&SourceModel, &TypeDeclaration, &BTreeSet<usize>) -> Result<Synthesized>,
    {
        let span = info_span!("savegen.generate", types = model.types.len());
        let _guard = span.enter();

        let pass = ValidationPass::new(&self.config);
        let verdicts = pass.validate_model(model);
        let mut output = GenerationOutput::default();

        for verdict in verdicts {
            let TypeVerdict {
                type_path,
                diagnostics,
                blocked,
                excluded,
            } = verdict;
            output.diagnostics.extend(diagnostics);

            if blocked {
                event!(Level::DEBUG, type_path = %type_path, "synthesis skipped");
                continue;
            }
            let Some(ty) = model.find(&type_path) else {
                continue;
            };

            let synthesized = isolated(|| synthesize(model, ty, &excluded));

            match synthesized {
                Ok((procedure, source)) => {
                    event!(
                        Level::DEBUG,
                        type_path = %type_path,
                        entries = procedure.calls.len(),
                        "type synthesized"
                    );
                    output.generated.push(GeneratedType {
                        type_path,
                        procedure,
                        source,
                    });
                }
                Err(err) => {
                    event!(Level::ERROR, type_path = %type_path, error = %err, "synthesis failed");
                    output.diagnostics.push(self.failure(ty, &err));
                }
            }
        }

        event!(
            Level::INFO,
            diagnostics = output.diagnostics.len(),
            generated = output.generated.len(),
            "generation pass finished"
        );
        output
    }

    fn synthesize(
        &self,
        model: &SourceModel,
        ty: &TypeDeclaration,
        excluded: &BTreeSet<usize>,
    ) -> Result<Synthesized> {
        let enclosing = EnclosingType::resolve(model, ty, &self.config);
        let members = collect_marked_members(ty, excluded);
        let entries = aggregate(ty, &members, &self.config)?;
        let procedure = emit(ty, &enclosing, &entries, &self.config)?;
        let source = self.renderer.render_source(&procedure)?;
        Ok((procedure, source))
    }

    fn failure(&self, ty: &TypeDeclaration, err: &SaveGenError) -> Diagnostic {
        let id = match err {
            SaveGenError::UnresolvedValueType { .. } => DiagnosticId::UnresolvedValueType,
            _ => DiagnosticId::GenerationFailed,
        };
        Diagnostic::new(
            id,
            self.config.severity_of(id),
            ty.location(),
            vec![ty.name.clone(), err.to_string()],
        )
    }
}

fn isolated<T>(work: impl FnOnce() -> Result<T>) -> Result<T> {
    panic::catch_unwind(AssertUnwindSafe(work))
        .unwrap_or_else(|payload| Err(SaveGenError::Panicked(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MemberDeclaration, MemberKind, Statement, TypeRef};

    fn generator() -> Generator {
        Generator::new(GeneratorConfig::new()).unwrap()
    }

    fn ship(name: &str) -> TypeDeclaration {
        TypeDeclaration::class(name)
            .partial()
            .with_base("Behaviour")
            .with_member(MemberDeclaration::field("_position", "Vector3").saved())
            .with_member(
                MemberDeclaration::method("awake", None, &[])
                    .with_statement(Statement::invocation("register_save_object")),
            )
    }

    #[test]
    fn test_clean_type_generates_without_diagnostics() {
        let output = generator().run(&SourceModel::new(vec![ship("Ship")]));
        assert!(output.diagnostics.is_empty());
        assert_eq!(output.generated.len(), 1);
        assert_eq!(output.generated[0].source.hint_name, "Ship.save.g.rs");
        assert_eq!(
            output.procedure("Ship").unwrap().ids().collect::<Vec<_>>(),
            vec!["position"]
        );
    }

    #[test]
    fn test_blocked_type_produces_no_output() {
        let model = SourceModel::new(vec![
            TypeDeclaration::class("Crate")
                .partial()
                .with_member(MemberDeclaration::field("_loot", "u32").saved()),
            ship("Ship"),
        ]);
        let output = generator().run(&model);

        assert_eq!(output.diagnostics_of(DiagnosticId::MustImplementIdentifiable).count(), 1);
        assert!(output.procedure("Crate").is_none());
        assert!(output.procedure("Ship").is_some());
    }

    #[test]
    fn test_warnings_do_not_block() {
        let model = SourceModel::new(vec![
            TypeDeclaration::class("Ship")
                .partial()
                .with_base("Behaviour")
                .with_member(MemberDeclaration::field("_position", "Vector3").saved()),
        ]);
        let output = generator().run(&model);

        assert_eq!(output.diagnostics_of(DiagnosticId::MustCallRegistrationEntryPoint).count(), 1);
        assert!(!output.has_errors());
        assert!(output.procedure("Ship").is_some());
    }

    #[test]
    fn test_failure_is_isolated_per_type() {
        let mut field = MemberDeclaration::field("_cargo", "Cargo").saved();
        if let MemberKind::Field { ty, .. } = &mut field.kind {
            *ty = TypeRef::Unresolved("_".into());
        }
        let broken = ship("Hauler").with_member(field);
        let bad_name = ship("Tug").with_member(MemberDeclaration::field("car go", "u8").saved());

        let output = generator().run(&SourceModel::new(vec![broken, bad_name, ship("Ship")]));

        let unresolved: Vec<_> = output.diagnostics_of(DiagnosticId::UnresolvedValueType).collect();
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].location.type_path, "Hauler");

        let failed: Vec<_> = output.diagnostics_of(DiagnosticId::GenerationFailed).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].location.type_path, "Tug");

        assert!(output.procedure("Hauler").is_none());
        assert!(output.procedure("Tug").is_none());
        assert!(output.procedure("Ship").is_some());
    }

    #[test]
    fn test_panic_during_synthesis_is_isolated() {
        let generator = generator();
        let model = SourceModel::new(vec![ship("Hauler"), ship("Tug"), ship("Ship")]);

        let output = generator.run_with(&model, |model, ty, excluded| {
            if ty.name == "Tug" {
                panic!("tug exploded");
            }
            generator.synthesize(model, ty, excluded)
        });

        let failed: Vec<_> = output.diagnostics_of(DiagnosticId::GenerationFailed).collect();
        assert_eq!(output.diagnostics.len(), 1);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].location.type_path, "Tug");
        assert_eq!(
            failed[0].args,
            vec!["Tug".to_string(), "Generation panicked: tug exploded".to_string()]
        );

        assert!(output.procedure("Tug").is_none());
        assert!(output.procedure("Hauler").is_some());
        assert!(output.procedure("Ship").is_some());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let err = Generator::new(GeneratorConfig::new().runtime_path("not a path")).unwrap_err();
        assert!(matches!(err, SaveGenError::Config(_)));
    }

    #[test]
    fn test_panic_message() {
        let result: std::thread::Result<()> = std::panic::catch_unwind(|| panic!("boom"));
        assert_eq!(panic_message(result.unwrap_err().as_ref()), "boom");
    }
}
