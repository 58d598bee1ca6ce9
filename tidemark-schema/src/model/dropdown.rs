//! Dropdown definitions.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// A dropdown: a named, ordered list of allowed values.
///
/// Dropdowns are identified by display name, which must be globally unique.
/// Option order is significant; the remote platform only accepts whole-list
/// replacement, so updates always carry the full option list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropdownDefinition {
    /// Display name (identity key, globally unique).
    pub name: SmolStr,
    /// Ordered allowed values.
    pub options: Vec<SmolStr>,
    /// Whether the dropdown is archived on the platform.
    #[serde(default)]
    pub archived: bool,
}

impl DropdownDefinition {
    /// Create a new dropdown.
    pub fn new<I, S>(name: impl Into<SmolStr>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        Self {
            name: name.into(),
            options: options.into_iter().map(Into::into).collect(),
            archived: false,
        }
    }

    /// Set the archived flag.
    pub fn with_archived(mut self, archived: bool) -> Self {
        self.archived = archived;
        self
    }

    /// Position of an option in the list.
    pub fn option_position(&self, option: &str) -> Option<usize> {
        self.options.iter().position(|o| o.as_str() == option)
    }
}

impl std::fmt::Display for DropdownDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} options)", self.name, self.options.len())
    }
}
