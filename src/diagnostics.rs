//! Diagnostic identifiers, descriptors and reported diagnostics.
//!
//! Every rule the validator enforces has one [`DiagnosticId`]. The id is the
//! stable, machine-readable key: repairs are keyed by it and severity
//! overrides in [`GeneratorConfig`](crate::GeneratorConfig) are looked up by it.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DiagnosticId {
    #[serde(rename = "SAVE001")]
    ClassMustBeExtensible,
    #[serde(rename = "SAVE002")]
    MustBeInsideAClass,
    #[serde(rename = "SAVE003")]
    MustImplementIdentifiable,
    #[serde(rename = "SAVE004")]
    GetMethodMustReturnAndNoParameters,
    #[serde(rename = "SAVE005")]
    SetMethodMustBeVoidAndHaveParameters,
    #[serde(rename = "SAVE006")]
    MustCallRegistrationEntryPoint,
    #[serde(rename = "SAVE007")]
    UnresolvedValueType,
    #[serde(rename = "SAVE008")]
    GenerationFailed,
}

impl DiagnosticId {
    pub const ALL: [DiagnosticId; 8] = [
        DiagnosticId::ClassMustBeExtensible,
        DiagnosticId::MustBeInsideAClass,
        DiagnosticId::MustImplementIdentifiable,
        DiagnosticId::GetMethodMustReturnAndNoParameters,
        DiagnosticId::SetMethodMustBeVoidAndHaveParameters,
        DiagnosticId::MustCallRegistrationEntryPoint,
        DiagnosticId::UnresolvedValueType,
        DiagnosticId::GenerationFailed,
    ];

    pub fn code(self) -> &'static str {
        self.descriptor().code
    }

    pub fn descriptor(self) -> &'static DiagnosticDescriptor {
        match self {
            Self::ClassMustBeExtensible => &CLASS_MUST_BE_EXTENSIBLE,
            Self::MustBeInsideAClass => &MUST_BE_INSIDE_A_CLASS,
            Self::MustImplementIdentifiable => &MUST_IMPLEMENT_IDENTIFIABLE,
            Self::GetMethodMustReturnAndNoParameters => &GET_METHOD_MUST_RETURN,
            Self::SetMethodMustBeVoidAndHaveParameters => &SET_METHOD_MUST_BE_VOID,
            Self::MustCallRegistrationEntryPoint => &MUST_CALL_REGISTRATION,
            Self::UnresolvedValueType => &UNRESOLVED_VALUE_TYPE,
            Self::GenerationFailed => &GENERATION_FAILED,
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.code() == code)
    }
}

impl fmt::Display for DiagnosticId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => f.write_str("error"),
            Self::Warning => f.write_str("warning"),
            Self::Info => f.write_str("info"),
        }
    }
}

/// Static description of one rule.
#[derive(Debug)]
pub struct DiagnosticDescriptor {
    pub code: &'static str,
    pub title: &'static str,
    /// Message with positional `{0}`, `{1}`, ... placeholders.
    pub template: &'static str,
    pub category: &'static str,
    pub default_severity: Severity,
}

static CLASS_MUST_BE_EXTENSIBLE: DiagnosticDescriptor = DiagnosticDescriptor {
    code: "SAVE001",
    title: "A class containing '#[save]' members must be partial",
    template: "The class '{0}' must be partial so the save registration can be generated for it",
    category: "Save",
    default_severity: Severity::Warning,
};

static MUST_BE_INSIDE_A_CLASS: DiagnosticDescriptor = DiagnosticDescriptor {
    code: "SAVE002",
    title: "The '#[save]' marker must be inside a class",
    template: "The use of '#[save]' inside a '{0}' is not supported at '{1}'",
    category: "Save",
    default_severity: Severity::Error,
};

static MUST_IMPLEMENT_IDENTIFIABLE: DiagnosticDescriptor = DiagnosticDescriptor {
    code: "SAVE003",
    title: "A class containing '#[save]' members must be identifiable",
    template: "The class '{0}' must implement '{1}' or derive from '{2}' to be saved",
    category: "Save",
    default_severity: Severity::Error,
};

static GET_METHOD_MUST_RETURN: DiagnosticDescriptor = DiagnosticDescriptor {
    code: "SAVE004",
    title: "A saved getter method must return a value and take no parameters",
    template: "The method '{0}' cannot be saved as '{1}': a getter must return a value and take no parameters",
    category: "Save",
    default_severity: Severity::Error,
};

static SET_METHOD_MUST_BE_VOID: DiagnosticDescriptor = DiagnosticDescriptor {
    code: "SAVE005",
    title: "A saved setter method must return nothing and take exactly one parameter",
    template: "The method '{0}' cannot be saved as '{1}': a setter must return nothing and take exactly one parameter",
    category: "Save",
    default_severity: Severity::Error,
};

static MUST_CALL_REGISTRATION: DiagnosticDescriptor = DiagnosticDescriptor {
    code: "SAVE006",
    title: "A class containing '#[save]' members must call the registration entry point",
    template: "The class '{0}' never calls '{1}', so its saved members are never registered",
    category: "Save",
    default_severity: Severity::Warning,
};

static UNRESOLVED_VALUE_TYPE: DiagnosticDescriptor = DiagnosticDescriptor {
    code: "SAVE007",
    title: "The value type of a saved member could not be resolved",
    template: "Save registration for '{0}' was skipped: {1}",
    category: "Save",
    default_severity: Severity::Error,
};

static GENERATION_FAILED: DiagnosticDescriptor = DiagnosticDescriptor {
    code: "SAVE008",
    title: "Save registration generation failed",
    template: "Save registration for '{0}' failed: {1}",
    category: "Save",
    default_severity: Severity::Error,
};

/// Where a diagnostic points: a type, optionally narrowed to one of its members.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// Namespace-qualified type name, `a::b::Type`.
    pub type_path: String,
    pub member: Option<String>,
}

impl Location {
    pub fn of_type(type_path: impl Into<String>) -> Self {
        Self {
            type_path: type_path.into(),
            member: None,
        }
    }

    pub fn of_member(type_path: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            type_path: type_path.into(),
            member: Some(member.into()),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.member {
            Some(member) => write!(f, "{}::{}", self.type_path, member),
            None => f.write_str(&self.type_path),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub id: DiagnosticId,
    pub severity: Severity,
    pub message: String,
    pub args: Vec<String>,
    pub location: Location,
}

impl Diagnostic {
    pub fn new(id: DiagnosticId, severity: Severity, location: Location, args: Vec<String>) -> Self {
        let message = format_message(id.descriptor().template, &args);
        Self {
            id,
            severity,
            message,
            args,
            location,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {} ({})", self.severity, self.id, self.message, self.location)
    }
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{(\d+)\}").expect("placeholder pattern is valid"))
}

/// Substitutes positional `{n}` placeholders. Placeholders without an argument are kept verbatim.
pub fn format_message(template: &str, args: &[String]) -> String {
    placeholder_pattern()
        .replace_all(template, |caps: &regex::Captures<'_>| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|index| args.get(index))
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
