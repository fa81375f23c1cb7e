use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SaveGenError {
    #[error("Member '{member}' of '{type_name}' has no resolvable value type")]
    UnresolvedValueType { type_name: String, member: String },

    #[error("Entry '{0}' has neither a getter nor a setter")]
    EmptyEntry(String),

    #[error("Member '{member}' of '{type_name}' cannot be registered: {reason}")]
    UnsupportedMember {
        type_name: String,
        member: String,
        reason: String,
    },

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Invalid type '{0}'")]
    InvalidType(String),

    #[error("Invalid path '{0}'")]
    InvalidPath(String),

    #[error("Type '{0}' not found")]
    TypeNotFound(String),

    #[error("Member '{member}' not found in type '{type_name}'")]
    MemberNotFound { type_name: String, member: String },

    #[error("Edit out of range: {0}")]
    EditOutOfRange(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Generation panicked: {0}")]
    Panicked(String),
}

pub type Result<T> = std::result::Result<T, SaveGenError>;

impl From<serde_json::Error> for SaveGenError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}
