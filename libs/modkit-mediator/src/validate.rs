//! Optional validation capability of entity models.

use std::fmt;

/// A single failed constraint reported by [`Validate::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    /// Path of the offending property, e.g. `name`.
    pub property_path: String,
    pub message: String,
}

impl ValidationFailure {
    #[must_use]
    pub fn new(property_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            property_path: property_path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationFailure {
    /// Renders the entry appended to the mediator's error log.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Property {}: {}", self.property_path, self.message)
    }
}

/// Implemented by entity models that can check themselves before being saved.
///
/// Register such entities with
/// [`EntityRegistry::register_validated`](crate::EntityRegistry::register_validated);
/// entities registered with `register` are saved without validation.
pub trait Validate {
    /// # Errors
    /// Returns every failed constraint, in the order they were checked.
    fn validate(&self) -> Result<(), Vec<ValidationFailure>>;
}

/// Validation capability of a registered entity class.
pub(crate) enum Capability<M> {
    Validatable(fn(&M) -> Result<(), Vec<ValidationFailure>>),
    Plain,
}

impl<M> Clone for Capability<M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M> Copy for Capability<M> {}

impl<M> Capability<M> {
    pub(crate) fn check(self, model: &M) -> Result<(), Vec<ValidationFailure>> {
        match self {
            Capability::Validatable(validate) => validate(model),
            Capability::Plain => Ok(()),
        }
    }

    pub(crate) fn is_validatable(self) -> bool {
        matches!(self, Capability::Validatable(_))
    }
}
