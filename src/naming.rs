//! Property name derivation and collision resolution.

use std::collections::HashSet;

/// Camel-case identifier from free text.
///
/// Everything except ASCII letters, digits, whitespace and hyphens is
/// dropped. Tokens split on whitespace and hyphens; the first token gets a
/// lower-case first letter, every later token an upper-case one, and the
/// rest of each token is kept as written. A result starting with a digit
/// gets a leading `_` so it stays a valid JavaScript identifier.
pub fn derive(basis: &str) -> String {
    let cleaned: String = basis
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace() || *c == '-')
        .collect();

    let mut out = String::with_capacity(cleaned.len());
    for (i, token) in cleaned
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|t| !t.is_empty())
        .enumerate()
    {
        let mut chars = token.chars();
        if let Some(first) = chars.next() {
            if i == 0 {
                out.push(first.to_ascii_lowercase());
            } else {
                out.push(first.to_ascii_uppercase());
            }
            out.extend(chars);
        }
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Names already committed in one generation run.
///
/// Assignment is order dependent: the first element to claim a name keeps
/// it and later claimants get `1`, `2`, ... appended.
#[derive(Debug, Default, Clone)]
pub struct NameRegistry {
    taken: HashSet<String>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit `candidate`, suffixed if needed, and return the name used.
    pub fn commit(&mut self, candidate: &str) -> String {
        let mut name = candidate.to_string();
        let mut counter = 1;
        while self.taken.contains(&name) {
            name = format!("{}{}", candidate, counter);
            counter += 1;
        }
        self.taken.insert(name.clone());
        name
    }

    pub fn contains(&self, name: &str) -> bool {
        self.taken.contains(name)
    }

    pub fn len(&self) -> usize {
        self.taken.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taken.is_empty()
    }
}
