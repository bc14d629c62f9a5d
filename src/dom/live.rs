use async_trait::async_trait;
use eoka::Page;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;

use super::DomTree;
use crate::descriptor::{ElementDescriptor, CANDIDATE_SELECTOR};
use crate::{Error, Result};

#[derive(Deserialize)]
struct RawElement {
    tag: String,
    ordinal: usize,
    id: Option<String>,
    class_name: Option<String>,
    name: Option<String>,
    input_type: Option<String>,
    role: Option<String>,
    aria_label: Option<String>,
    text: String,
    data: BTreeMap<String, String>,
}

/// Shared helpers injected ahead of every query. `preferred` must agree
/// with [`crate::descriptor::preferred_text`]; `tagKey` with the lowercased
/// local names the snapshot backend uses, so mixed-case SVG tags index the
/// same way in both.
const PRELUDE_JS: &str = r#"
    const norm = s => (s || '').trim().replace(/\s+/g, ' ');
    const preferred = el => norm(el.getAttribute('aria-label')) || norm(el.textContent);
    const tagKey = el => el.localName.toLowerCase();
    const byTag = new Map();
    const sameTag = tag => {
        if (!byTag.has(tag)) {
            byTag.set(tag, Array.from(document.querySelectorAll('*')).filter(e => tagKey(e) === tag));
        }
        return byTag.get(tag);
    };
"#;

/// Enumerates candidate nodes. Expects `__po_candidates` to be defined.
const EXTRACT_JS: &str = r#"
    const results = [];
    for (const el of document.querySelectorAll(__po_candidates)) {
        const tag = tagKey(el);
        const data = {};
        for (const attr of el.attributes) {
            if (attr.name.startsWith('data-')) data[attr.name] = attr.value;
        }
        results.push({
            tag,
            ordinal: sameTag(tag).indexOf(el),
            id: el.getAttribute('id'),
            class_name: el.getAttribute('class'),
            name: el.getAttribute('name'),
            input_type: el.getAttribute('type'),
            role: el.getAttribute('role'),
            aria_label: el.getAttribute('aria-label'),
            text: norm(el.textContent),
            data,
        });
    }
    return JSON.stringify(results);
"#;

/// A live browser page. Every query runs against the DOM as it is when the
/// query is issued.
pub struct LiveDocument<'a> {
    page: &'a Page,
}

impl<'a> LiveDocument<'a> {
    pub fn new(page: &'a Page) -> Self {
        Self { page }
    }

    pub fn page(&self) -> &Page {
        self.page
    }

    /// Run `body` inside an IIFE with the prelude and parse its JSON result.
    async fn query<T: DeserializeOwned>(&self, bindings: &str, body: &str) -> Result<T> {
        let js = format!("(() => {{ {}{}{} }})()", bindings, PRELUDE_JS, body);
        let json_str: String = self.page.evaluate(&js).await?;
        serde_json::from_str(&json_str)
            .map_err(|e| Error::Document(format!("query parse error: {}", e)))
    }
}

/// Render a Rust string as a JS string literal.
fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

#[async_trait]
impl<'a> DomTree for LiveDocument<'a> {
    async fn extract(&self) -> Result<Vec<ElementDescriptor>> {
        let bindings = format!("const __po_candidates = {};", js_string(CANDIDATE_SELECTOR));
        let raw: Vec<RawElement> = self.query(&bindings, EXTRACT_JS).await?;

        Ok(raw
            .into_iter()
            .map(|r| ElementDescriptor {
                tag: r.tag,
                ordinal: r.ordinal,
                id: r.id,
                class_name: r.class_name,
                name: r.name,
                input_type: r.input_type,
                role: r.role,
                aria_label: r.aria_label,
                text: r.text,
                data: r.data,
            })
            .collect())
    }

    async fn count_by_id(&self, id: &str) -> Result<usize> {
        let bindings = format!("const __po_id = {};", js_string(id));
        self.query(
            &bindings,
            "return JSON.stringify(document.querySelectorAll('#' + CSS.escape(__po_id)).length);",
        )
        .await
    }

    async fn count_by_class(&self, class: &str) -> Result<usize> {
        let bindings = format!("const __po_class = {};", js_string(class));
        self.query(
            &bindings,
            "return JSON.stringify(document.querySelectorAll('.' + CSS.escape(__po_class)).length);",
        )
        .await
    }

    async fn text_matches(&self, tag: &str, text: &str) -> Result<Vec<usize>> {
        let bindings = format!(
            "const __po_tag = {}; const __po_text = {};",
            js_string(tag),
            js_string(text)
        );
        self.query(
            &bindings,
            r#"
            const out = [];
            sameTag(__po_tag).forEach((el, i) => {
                if (preferred(el) === __po_text) out.push(i);
            });
            return JSON.stringify(out);
            "#,
        )
        .await
    }
}
