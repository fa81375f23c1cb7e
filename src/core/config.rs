use std::collections::BTreeMap;

use serde::Deserialize;

use crate::core::error::{Result, SaveGenError};
use crate::diagnostics::{DiagnosticId, Severity};

/// Name of the synthesized registration procedure.
///
/// The emitter names the generated member with it and the validator searches
/// type bodies for invocations of it, so it is not configurable.
pub const REGISTRATION_METHOD: &str = "register_save_object";

/// Generator configuration
///
/// Names the host conventions the generator relies on. Every field has a
/// default, so a partial JSON document is enough to override one of them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Attribute that marks a member for saving (`#[save]`)
    pub marker_attribute: String,

    /// Interface granting a stable identity key
    pub identifiable_capability: String,

    /// Method of the identity capability returning the key
    pub identity_accessor: String,

    /// Base type whose instances have a host-managed lifecycle
    pub lifecycle_base: String,

    /// Initialization hook invoked by the host on lifecycle-managed instances
    pub lifecycle_hook: String,

    /// Accessor-style prefixes trimmed from method names, tried in order
    pub accessor_prefixes: Vec<String>,

    /// Path of the persistence runtime used by generated code
    pub runtime_path: String,

    /// Per-rule severity overrides
    pub severity_overrides: BTreeMap<DiagnosticId, Severity>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            marker_attribute: "save".to_string(),
            identifiable_capability: "Identifiable".to_string(),
            identity_accessor: "guid".to_string(),
            lifecycle_base: "Behaviour".to_string(),
            lifecycle_hook: "awake".to_string(),
            accessor_prefixes: vec!["Set".to_string(), "Get".to_string()],
            runtime_path: "::save_system".to_string(),
            severity_overrides: BTreeMap::new(),
        }
    }
}

impl GeneratorConfig {
    /// Create a configuration with default conventions
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a JSON document; missing keys keep their defaults
    ///
    /// ```
    /// # use savegen::GeneratorConfig;
    /// let config = GeneratorConfig::from_json(r#"{ "lifecycle_hook": "start" }"#).unwrap();
    /// assert_eq!(config.lifecycle_hook, "start");
    /// assert_eq!(config.identity_accessor, "guid");
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the marker attribute name
    pub fn marker_attribute(mut self, name: &str) -> Self {
        self.marker_attribute = name.to_string();
        self
    }

    /// Set the identity capability name
    pub fn identifiable_capability(mut self, name: &str) -> Self {
        self.identifiable_capability = name.to_string();
        self
    }

    /// Set the identity accessor method
    pub fn identity_accessor(mut self, name: &str) -> Self {
        self.identity_accessor = name.to_string();
        self
    }

    /// Set the lifecycle base type
    pub fn lifecycle_base(mut self, name: &str) -> Self {
        self.lifecycle_base = name.to_string();
        self
    }

    /// Set the lifecycle initialization hook
    pub fn lifecycle_hook(mut self, name: &str) -> Self {
        self.lifecycle_hook = name.to_string();
        self
    }

    /// Replace the accessor prefixes
    pub fn accessor_prefixes(mut self, prefixes: &[&str]) -> Self {
        self.accessor_prefixes = prefixes.iter().map(|prefix| prefix.to_string()).collect();
        self
    }

    /// Set the runtime path
    pub fn runtime_path(mut self, path: &str) -> Self {
        self.runtime_path = path.to_string();
        self
    }

    /// Override the severity of one rule
    pub fn severity(mut self, id: DiagnosticId, severity: Severity) -> Self {
        self.severity_overrides.insert(id, severity);
        self
    }

    /// Effective severity of a rule
    pub fn severity_of(&self, id: DiagnosticId) -> Severity {
        self.severity_overrides
            .get(&id)
            .copied()
            .unwrap_or(id.descriptor().default_severity)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let names = [
            ("marker_attribute", &self.marker_attribute),
            ("identifiable_capability", &self.identifiable_capability),
            ("identity_accessor", &self.identity_accessor),
            ("lifecycle_base", &self.lifecycle_base),
            ("lifecycle_hook", &self.lifecycle_hook),
            ("runtime_path", &self.runtime_path),
        ];
        for (key, value) in names {
            if value.trim().is_empty() {
                return Err(SaveGenError::Config(format!("{key} cannot be empty")));
            }
        }

        let identifiers = [
            ("marker_attribute", &self.marker_attribute),
            ("identity_accessor", &self.identity_accessor),
            ("lifecycle_hook", &self.lifecycle_hook),
        ];
        for (key, value) in identifiers {
            if syn::parse_str::<syn::Ident>(value).is_err() {
                return Err(SaveGenError::Config(format!(
                    "{key} must be an identifier, got '{value}'"
                )));
            }
        }

        let paths = [
            ("identifiable_capability", &self.identifiable_capability),
            ("lifecycle_base", &self.lifecycle_base),
            ("runtime_path", &self.runtime_path),
        ];
        for (key, value) in paths {
            if syn::parse_str::<syn::Path>(value).is_err() {
                return Err(SaveGenError::Config(format!("{key} must be a path, got '{value}'")));
            }
        }

        if self.accessor_prefixes.iter().any(|prefix| prefix.is_empty()) {
            return Err(SaveGenError::Config(
                "accessor_prefixes cannot contain an empty prefix".to_string(),
            ));
        }

        if self.lifecycle_hook == REGISTRATION_METHOD {
            return Err(SaveGenError::Config(format!(
                "lifecycle_hook cannot be '{REGISTRATION_METHOD}'"
            )));
        }

        Ok(())
    }
}
