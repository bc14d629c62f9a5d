//! Page object rendering.

use crate::generate::PageObjectEntry;

pub const DEFAULT_CLASS_NAME: &str = "MyPage";

const HEADER: &str = "// Generated by eoka-po";

const OPEN_METHOD_HINT: &str = "    /**
     * Optional: Add an open method if this page has a direct URL
     * open() {
     *     return super.open('path/to/my/page');
     * }
     */";

/// Renders entries into a WebdriverIO page object class.
#[derive(Debug, Clone)]
pub struct Emitter {
    class_name: String,
}

impl Emitter {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// One accessor line.
    pub fn accessor(entry: &PageObjectEntry) -> String {
        format!(
            "    get {}() {{ return $('{}'); }}",
            entry.property_name,
            js_single_quoted(&entry.selector)
        )
    }

    /// The full class, accessors in entry order.
    pub fn render(&self, entries: &[PageObjectEntry]) -> String {
        let accessors: Vec<String> = entries.iter().map(Self::accessor).collect();
        format!(
            "\n{header}\n\nclass {name} {{\n{accessors}\n\n{hint}\n}}\n\nexport default new {name}();\n",
            header = HEADER,
            name = self.class_name,
            accessors = accessors.join("\n"),
            hint = OPEN_METHOD_HINT,
        )
    }
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new(DEFAULT_CLASS_NAME)
    }
}

/// Escape text for a single-quoted JS string literal.
fn js_single_quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::Strategy;
    use crate::Classification;

    fn entry(name: &str, selector: &str) -> PageObjectEntry {
        PageObjectEntry {
            property_name: name.into(),
            selector: selector.into(),
            strategy: Strategy::Fallback,
            classification: Classification::fallback(),
        }
    }

    #[test]
    fn test_render_template() {
        let out = Emitter::new("LoginPage").render(&[
            entry("emailInputField", "#email"),
            entry("logInButton", "button=Log in"),
        ]);
        let expected = "
// Generated by eoka-po

class LoginPage {
    get emailInputField() { return $('#email'); }
    get logInButton() { return $('button=Log in'); }

    /**
     * Optional: Add an open method if this page has a direct URL
     * open() {
     *     return super.open('path/to/my/page');
     * }
     */
}

export default new LoginPage();
";
        assert_eq!(out, expected);
    }

    #[test]
    fn test_render_preserves_order() {
        let out = Emitter::default().render(&[entry("b", "b"), entry("a", "a")]);
        let b = out.find("get b()").unwrap();
        let a = out.find("get a()").unwrap();
        assert!(b < a);
        assert!(out.contains("class MyPage {"));
    }

    #[test]
    fn test_accessor_escapes_quotes() {
        let line = Emitter::accessor(&entry("dontSaveButton", "button=Don't save"));
        assert_eq!(line, r"    get dontSaveButton() { return $('button=Don\'t save'); }");

        let line = Emitter::accessor(&entry("x", r#"[data-qa="a\b"]"#));
        assert_eq!(line, r#"    get x() { return $('[data-qa="a\\b"]'); }"#);
    }
}
