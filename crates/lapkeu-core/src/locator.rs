use serde::{Deserialize, Serialize};
use std::fmt;

/// Structural/content predicate identifying an element across re-renders.
///
/// The report form regenerates element identifiers on every postback, so a
/// locator is never a literal id. It describes what the element *is*: an
/// attribute substring that survives re-rendering, its visible text, or its
/// structural role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Locator {
    /// An element whose id attribute contains the substring.
    ByAttributeSubstring(String),
    /// An element whose trimmed visible text equals the string.
    ByVisibleText(String),
    /// An element with the given role attribute.
    ByStructuralRole(String),
}

impl Locator {
    pub fn attr(fragment: impl Into<String>) -> Self {
        Locator::ByAttributeSubstring(fragment.into())
    }

    pub fn text(text: impl Into<String>) -> Self {
        Locator::ByVisibleText(text.into())
    }

    pub fn role(role: impl Into<String>) -> Self {
        Locator::ByStructuralRole(role.into())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::ByAttributeSubstring(s) => write!(f, "[id*={}]", s),
            Locator::ByVisibleText(s) => write!(f, "[text={}]", s),
            Locator::ByStructuralRole(s) => write!(f, "[role={}]", s),
        }
    }
}

/// One field-changing step against the form, carried as plain data so the
/// synchronization engine can execute it and log it uniformly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Select a dropdown option by its visible text.
    SelectOption { field: Locator, value: String },
    /// Replace a text input's value and commit it (blur).
    TypeText { field: Locator, text: String },
    /// Set a checkbox to the given state.
    SetChecked { field: Locator, checked: bool },
    /// Click an element.
    Click { target: Locator },
}

impl Action {
    /// The locator the action operates on.
    pub fn target(&self) -> &Locator {
        match self {
            Action::SelectOption { field, .. } => field,
            Action::TypeText { field, .. } => field,
            Action::SetChecked { field, .. } => field,
            Action::Click { target } => target,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::SelectOption { field, value } => write!(f, "select {} on {}", value, field),
            Action::TypeText { field, text } => write!(f, "type {:?} into {}", text, field),
            Action::SetChecked { field, checked } => write!(f, "set {} checked={}", field, checked),
            Action::Click { target } => write!(f, "click {}", target),
        }
    }
}
