// ============================================================================
// savegen Library
// ============================================================================

//! Save-registration synthesis.
//!
//! Members carrying the persistence marker are validated, aggregated into
//! named entries and turned into a `register_save_object` procedure binding
//! each entry id to its accessor and mutator.
//!
//! ```
//! use savegen::{Generator, GeneratorConfig, MemberDeclaration, SourceModel, Statement, TypeDeclaration};
//!
//! let ship = TypeDeclaration::class("Ship")
//!     .partial()
//!     .with_base("Behaviour")
//!     .with_member(MemberDeclaration::field("_position", "Vector3").saved())
//!     .with_member(MemberDeclaration::getter("GetDrag", "f32").saved())
//!     .with_member(MemberDeclaration::setter("SetDrag", "f32").saved())
//!     .with_member(
//!         MemberDeclaration::method("awake", None, &[])
//!             .with_statement(Statement::invocation("register_save_object")),
//!     );
//!
//! let generator = Generator::new(GeneratorConfig::new()).unwrap();
//! let output = generator.run(&SourceModel::new(vec![ship]));
//!
//! assert!(output.diagnostics.is_empty());
//! let ids: Vec<_> = output.procedure("Ship").unwrap().ids().collect();
//! assert_eq!(ids, vec!["position", "drag"]);
//! ```

pub mod aggregate;
pub mod core;
pub mod diagnostics;
pub mod emit;
pub mod generator;
pub mod host;
pub mod model;
pub mod naming;
pub mod repair;
pub mod validate;

// Re-export main types for convenience
pub use crate::core::config::REGISTRATION_METHOD;
pub use crate::core::{GeneratorConfig, Result, SaveGenError};
pub use diagnostics::{Diagnostic, DiagnosticId, Location, Severity};
pub use emit::{BindCall, GeneratedSource, OwnerKey, RustRenderer, SynthesizedProcedure};
pub use generator::{GeneratedType, GenerationOutput, Generator};
pub use model::{
    Entry, EntryTable, Marker, MarkedMember, MemberDeclaration, SourceModel, Statement,
    TypeDeclaration, TypeHierarchy, TypeKind,
};
pub use naming::{to_snake_case, trim_decorations};
pub use repair::{EditOp, EditScript, fix_all, repair_for};
pub use validate::{TypeVerdict, ValidationPass};
