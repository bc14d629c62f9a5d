//! Selector resolution.
//!
//! Strategies are tried in order of robustness under DOM churn and the
//! first one that produces a selector wins:
//!
//! 1. test attributes (`data-test-id`, `data-qa`, `data-cy`)
//! 2. id, when `#id` matches exactly one element
//! 3. `name` attribute
//! 4. text or aria-label, for text-bearing interactive labels
//! 5. a class token matching exactly one element
//! 6. tag name, refined by input type or role
//!
//! Uniqueness checks hit the tree at resolution time. A query that fails is
//! logged and its strategy skipped; the fallback always succeeds.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::classify::Classification;
use crate::descriptor::{non_empty, ElementDescriptor, TEST_ATTRIBUTES};
use crate::dom::DomTree;
use crate::Result;

/// Labels for which visible text is a meaningful selector.
pub const TEXT_LABELS: [&str; 7] = [
    "button",
    "link",
    "heading",
    "label",
    "actionElement",
    "searchButton",
    "accountLink",
];

/// Ids and class tokens usable as `#ident` / `.ident` without escaping.
static CSS_IDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?[_a-zA-Z][_a-zA-Z0-9-]*$").unwrap());

/// Which step of the waterfall produced a selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    TestAttribute,
    Id,
    Name,
    Text,
    Class,
    Fallback,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Strategy::TestAttribute => "test-attribute",
            Strategy::Id => "id",
            Strategy::Name => "name",
            Strategy::Text => "text",
            Strategy::Class => "class",
            Strategy::Fallback => "fallback",
        };
        f.write_str(s)
    }
}

/// A chosen selector and the text its property name is derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorCandidate {
    pub selector: String,
    pub basis_text: String,
    /// 1-based position among same-text elements, appended to the property
    /// name when the text selector is shared.
    pub ordinal_suffix: Option<usize>,
    pub strategy: Strategy,
}

impl SelectorCandidate {
    fn new(selector: String, basis_text: String, strategy: Strategy) -> Self {
        Self {
            selector,
            basis_text,
            ordinal_suffix: None,
            strategy,
        }
    }
}

/// Resolves selectors against one document.
pub struct SelectorResolver<'a, D: DomTree + ?Sized> {
    tree: &'a D,
}

impl<'a, D: DomTree + ?Sized> SelectorResolver<'a, D> {
    pub fn new(tree: &'a D) -> Self {
        Self { tree }
    }

    /// Pick the selector for `el`.
    pub async fn resolve(
        &self,
        el: &ElementDescriptor,
        class: &Classification,
    ) -> SelectorCandidate {
        let label = class.label.as_str();

        if let Some(c) = by_test_attribute(el, label) {
            return c;
        }
        if let Some(c) = self.by_id(el, label).await {
            return c;
        }
        if let Some(name) = non_empty(el.name.as_deref()) {
            return SelectorCandidate::new(
                format!("[name=\"{}\"]", css_string(name)),
                format!("{} {}", name, label),
                Strategy::Name,
            );
        }
        if let Some(c) = self.by_text(el, label).await {
            return c;
        }
        if let Some(c) = self.by_class(el, label).await {
            return c;
        }
        fallback(el, label)
    }

    async fn by_id(&self, el: &ElementDescriptor, label: &str) -> Option<SelectorCandidate> {
        let id = non_empty(el.id.as_deref())?;
        if !CSS_IDENT.is_match(id) {
            debug!("Skipping id {:?}: not a plain CSS identifier", id);
            return None;
        }
        let count = checked(self.tree.count_by_id(id).await, "id")?;
        if count != 1 {
            debug!("Skipping id {:?}: {} matches", id, count);
            return None;
        }
        Some(SelectorCandidate::new(
            format!("#{}", id),
            format!("{} {}", id, label),
            Strategy::Id,
        ))
    }

    async fn by_text(&self, el: &ElementDescriptor, label: &str) -> Option<SelectorCandidate> {
        if !TEXT_LABELS.contains(&label) {
            return None;
        }
        let text = el.preferred_text();
        if text.is_empty() {
            return None;
        }

        let matches = checked(self.tree.text_matches(&el.tag, &text).await, "text")?;
        let Some(index) = matches.iter().position(|&o| o == el.ordinal) else {
            debug!("<{}> #{} not among its own text matches", el.tag, el.ordinal);
            return None;
        };

        let mut candidate = SelectorCandidate::new(
            format!("{}={}", el.tag, text),
            format!("{} {}", text, label),
            Strategy::Text,
        );
        if matches.len() > 1 {
            debug!(
                "Text selector {:?} shared by {} elements",
                candidate.selector,
                matches.len()
            );
            candidate.ordinal_suffix = Some(index + 1);
        }
        Some(candidate)
    }

    async fn by_class(&self, el: &ElementDescriptor, label: &str) -> Option<SelectorCandidate> {
        for class in el.classes().filter(|c| CSS_IDENT.is_match(c)) {
            let Some(count) = checked(self.tree.count_by_class(class).await, "class") else {
                continue;
            };
            if count == 1 {
                return Some(SelectorCandidate::new(
                    format!(".{}", class),
                    format!("{} {}", class, label),
                    Strategy::Class,
                ));
            }
        }
        None
    }
}

fn by_test_attribute(el: &ElementDescriptor, label: &str) -> Option<SelectorCandidate> {
    TEST_ATTRIBUTES.iter().find_map(|attr| {
        el.data_attr(attr).map(|value| {
            SelectorCandidate::new(
                format!("[{}=\"{}\"]", attr, css_string(value)),
                format!("{} {}", value, label),
                Strategy::TestAttribute,
            )
        })
    })
}

fn fallback(el: &ElementDescriptor, label: &str) -> SelectorCandidate {
    let tag = el.tag.as_str();
    if let (true, Some(input_type)) = (tag == "input", non_empty(el.input_type.as_deref())) {
        return SelectorCandidate::new(
            format!("{}[type=\"{}\"]", tag, css_string(input_type)),
            format!("{}Input", input_type),
            Strategy::Fallback,
        );
    }
    if let Some(role) = non_empty(el.role.as_deref()) {
        return SelectorCandidate::new(
            format!("{}[role=\"{}\"]", tag, css_string(role)),
            format!("{} {}", role, tag),
            Strategy::Fallback,
        );
    }
    SelectorCandidate::new(
        tag.to_string(),
        format!("{} {}Generic", tag, label),
        Strategy::Fallback,
    )
}

/// Turn a failed tree query into a skipped strategy.
fn checked<T>(result: Result<T>, strategy: &str) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("{} lookup failed, skipping strategy: {}", strategy, e);
            None
        }
    }
}

/// Escape a value for a double-quoted CSS string.
fn css_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
