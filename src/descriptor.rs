//! Element descriptors - flat snapshots of candidate nodes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// CSS selector for every node worth an accessor.
pub const CANDIDATE_SELECTOR: &str = "input, button, a, select, textarea, h1, h2, h3, h4, h5, h6, p, [role=\"button\"], [data-test-id], [data-qa], [data-cy]";

/// Test attributes in priority order.
pub const TEST_ATTRIBUTES: [&str; 3] = ["data-test-id", "data-qa", "data-cy"];

/// Snapshot of one candidate node at extraction time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementDescriptor {
    /// Lowercase tag name.
    pub tag: String,
    /// Position among all elements with the same tag, in document order.
    pub ordinal: usize,
    pub id: Option<String>,
    /// Raw `class` attribute.
    pub class_name: Option<String>,
    pub name: Option<String>,
    /// Raw `type` attribute.
    pub input_type: Option<String>,
    pub role: Option<String>,
    pub aria_label: Option<String>,
    /// Whitespace-collapsed text content.
    #[serde(default)]
    pub text: String,
    /// Every `data-*` attribute.
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl ElementDescriptor {
    /// Create a descriptor for a bare element.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            ..Default::default()
        }
    }

    /// Attribute value, treating an empty value as absent.
    pub fn data_attr(&self, name: &str) -> Option<&str> {
        non_empty(self.data.get(name).map(String::as_str))
    }

    /// Aria-label if it has any text, otherwise the text content.
    pub fn preferred_text(&self) -> String {
        preferred_text(self.aria_label.as_deref(), &self.text)
    }

    /// Non-empty class tokens in attribute order. Class lists split on ASCII
    /// whitespace only, as in the DOM.
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.class_name
            .as_deref()
            .unwrap_or_default()
            .split_ascii_whitespace()
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_class(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_type(mut self, input_type: impl Into<String>) -> Self {
        self.input_type = Some(input_type.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_aria_label(mut self, label: impl Into<String>) -> Self {
        self.aria_label = Some(label.into());
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = normalize_text(text);
        self
    }

    pub fn with_data(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(name.into(), value.into());
        self
    }

    pub fn with_ordinal(mut self, ordinal: usize) -> Self {
        self.ordinal = ordinal;
        self
    }
}

/// Trim and collapse every whitespace run into a single space.
pub fn normalize_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The text an element is matched by: its aria-label, or its text content
/// when the label is missing or blank.
pub fn preferred_text(aria_label: Option<&str>, text: &str) -> String {
    let label = normalize_text(aria_label.unwrap_or_default());
    if label.is_empty() {
        normalize_text(text)
    } else {
        label
    }
}

pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
