use std::collections::BTreeMap;

use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{MediatorError, Result};

/// Configuration of a [`Mediator`](crate::Mediator), read from the `mediator`
/// section of the host's configuration.
///
/// ```yaml
/// mediator:
///   href: https://api.example.com/v1
///   resources:
///     widgets: widgets
///     users: users
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MediatorConfig {
    /// Base of every generated link, without a trailing slash.
    pub href: String,
    /// Resource type → entity class (table) name.
    #[serde(default)]
    pub resources: BTreeMap<String, String>,
}

impl MediatorConfig {
    pub const SECTION: &'static str = "mediator";

    /// Extracts the `mediator` section from `figment`.
    ///
    /// # Errors
    /// [`MediatorError::Config`] if the section is missing or malformed.
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        figment
            .extract_inner(Self::SECTION)
            .map_err(|e| MediatorError::Config(Box::new(e)))
    }
}
