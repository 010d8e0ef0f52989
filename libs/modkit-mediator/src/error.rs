use thiserror::Error;

use crate::kind::FieldKind;

/// Library-local result type.
pub type Result<T> = std::result::Result<T, MediatorError>;

/// Errors surfaced directly to the caller.
///
/// Validation and persistence failures of `save` are not represented here:
/// they are recorded in the mediator's error log instead.
#[derive(Debug, Error)]
pub enum MediatorError {
    #[error("unknown resource type: {0}")]
    UnknownResourceType(String),

    #[error("no entity binding registered for class '{0}'")]
    UnknownEntityClass(String),

    #[error("unknown attribute '{attribute}' for resource type '{resource_type}'")]
    UnknownAttribute {
        resource_type: String,
        attribute: String,
    },

    #[error("invalid value for '{attribute}': expected {expected}, got {got}")]
    InvalidValue {
        attribute: String,
        expected: FieldKind,
        got: String,
    },

    #[error("unknown filter operator: {0}")]
    UnknownOperator(String),

    #[error("attribute conversion failed: {0}")]
    Attributes(#[from] serde_json::Error),

    #[error(transparent)]
    Db(#[from] sea_orm::DbErr),

    #[error("configuration error: {0}")]
    Config(#[from] Box<figment::Error>),
}

impl MediatorError {
    pub(crate) fn unknown_attribute(
        resource_type: impl Into<String>,
        attribute: impl Into<String>,
    ) -> Self {
        Self::UnknownAttribute {
            resource_type: resource_type.into(),
            attribute: attribute.into(),
        }
    }

    pub(crate) fn invalid_value(
        attribute: impl Into<String>,
        expected: FieldKind,
        got: &serde_json::Value,
    ) -> Self {
        Self::InvalidValue {
            attribute: attribute.into(),
            expected,
            got: got.to_string(),
        }
    }

    /// Returns `true` for programmer/configuration errors (unknown names and
    /// malformed values) as opposed to data-access failures.
    #[must_use]
    pub fn is_lookup(&self) -> bool {
        matches!(
            self,
            Self::UnknownResourceType(_)
                | Self::UnknownEntityClass(_)
                | Self::UnknownAttribute { .. }
                | Self::InvalidValue { .. }
                | Self::UnknownOperator(_)
        )
    }
}
