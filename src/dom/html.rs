use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use super::DomTree;
use crate::descriptor::{self, ElementDescriptor, CANDIDATE_SELECTOR};
use crate::{Error, Result};

/// One element of the parsed snapshot.
#[derive(Debug, Clone)]
struct Node {
    descriptor: ElementDescriptor,
    preferred_text: String,
    candidate: bool,
}

/// A parsed HTML snapshot.
///
/// The document is flattened into owned element records at parse time, in
/// document order, so the snapshot can be shared across tasks.
#[derive(Debug, Clone)]
pub struct HtmlDocument {
    nodes: Vec<Node>,
}

impl HtmlDocument {
    /// Parse a full HTML document (fragments are wrapped as the HTML parser
    /// would wrap them).
    pub fn parse(source: &str) -> Result<Self> {
        let candidates =
            Selector::parse(CANDIDATE_SELECTOR).map_err(|e| Error::Document(e.to_string()))?;
        let html = Html::parse_document(source);

        let mut ordinals: HashMap<String, usize> = HashMap::new();
        let mut nodes = Vec::new();

        for el in html.root_element().descendants().filter_map(ElementRef::wrap) {
            let tag = el.value().name().to_ascii_lowercase();
            let ordinal = ordinals.entry(tag.clone()).or_insert(0);
            let descriptor = describe(&el, tag, *ordinal);
            *ordinal += 1;

            nodes.push(Node {
                preferred_text: descriptor.preferred_text(),
                candidate: candidates.matches(&el),
                descriptor,
            });
        }

        debug!(
            "Parsed document: {} elements, {} candidates",
            nodes.len(),
            nodes.iter().filter(|n| n.candidate).count()
        );
        Ok(Self { nodes })
    }

    /// Read and parse an HTML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let source = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&source)
    }

    /// Total number of elements in the snapshot.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn describe(el: &ElementRef<'_>, tag: String, ordinal: usize) -> ElementDescriptor {
    let element = el.value();
    let attr = |name: &str| element.attr(name).map(str::to_string);

    ElementDescriptor {
        tag,
        ordinal,
        id: attr("id"),
        class_name: attr("class"),
        name: attr("name"),
        input_type: attr("type"),
        role: attr("role"),
        aria_label: attr("aria-label"),
        text: descriptor::normalize_text(&el.text().collect::<String>()),
        data: element
            .attrs()
            .filter(|(name, _)| name.starts_with("data-"))
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect(),
    }
}

#[async_trait]
impl DomTree for HtmlDocument {
    async fn extract(&self) -> Result<Vec<ElementDescriptor>> {
        Ok(self
            .nodes
            .iter()
            .filter(|n| n.candidate)
            .map(|n| n.descriptor.clone())
            .collect())
    }

    async fn count_by_id(&self, id: &str) -> Result<usize> {
        Ok(self
            .nodes
            .iter()
            .filter(|n| n.descriptor.id.as_deref() == Some(id))
            .count())
    }

    async fn count_by_class(&self, class: &str) -> Result<usize> {
        Ok(self
            .nodes
            .iter()
            .filter(|n| n.descriptor.classes().any(|c| c == class))
            .count())
    }

    async fn text_matches(&self, tag: &str, text: &str) -> Result<Vec<usize>> {
        Ok(self
            .nodes
            .iter()
            .filter(|n| n.descriptor.tag == tag && n.preferred_text == text)
            .map(|n| n.descriptor.ordinal)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<html><body>
  <h1>  Welcome
      back </h1>
  <div class="card">
    <p class="lead intro">Hello</p>
    <button data-test-id="login" class="btn">Log in</button>
    <button class="btn">Log in</button>
    <a href="/help" aria-label="Help center">?</a>
  </div>
  <div role="button" id="menu">Menu</div>
  <span data-qa="badge"></span>
  <div class="card">not a candidate</div>
  <input type="email" name="email">
</body></html>
"#;

    #[tokio::test]
    async fn test_extracts_candidates_in_document_order() {
        let doc = HtmlDocument::parse(PAGE).unwrap();
        let els = doc.extract().await.unwrap();
        let tags: Vec<_> = els.iter().map(|e| e.tag.as_str()).collect();
        assert_eq!(
            tags,
            vec!["h1", "p", "button", "button", "a", "div", "span", "input"]
        );
    }

    #[tokio::test]
    async fn test_descriptor_fields() {
        let doc = HtmlDocument::parse(PAGE).unwrap();
        let els = doc.extract().await.unwrap();

        assert_eq!(els[0].text, "Welcome back");
        assert_eq!(els[1].class_name.as_deref(), Some("lead intro"));
        assert_eq!(els[2].data_attr("data-test-id"), Some("login"));
        assert_eq!(els[3].ordinal, 1);
        assert_eq!(els[4].aria_label.as_deref(), Some("Help center"));
        assert_eq!(els[5].role.as_deref(), Some("button"));
        assert_eq!(els[5].ordinal, 1);
        assert_eq!(els[6].data_attr("data-qa"), Some("badge"));
        assert_eq!(els[6].text, "");
        assert_eq!(els[7].input_type.as_deref(), Some("email"));
        assert_eq!(els[7].name.as_deref(), Some("email"));
        assert_eq!(els[7].id, None);
    }

    #[tokio::test]
    async fn test_uniqueness_queries() {
        let doc = HtmlDocument::parse(PAGE).unwrap();
        assert_eq!(doc.count_by_id("menu").await.unwrap(), 1);
        assert_eq!(doc.count_by_id("missing").await.unwrap(), 0);
        assert_eq!(doc.count_by_class("card").await.unwrap(), 2);
        assert_eq!(doc.count_by_class("lead").await.unwrap(), 1);
        assert_eq!(doc.count_by_class("btn").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_text_matches_use_preferred_text() {
        let doc = HtmlDocument::parse(PAGE).unwrap();
        assert_eq!(doc.text_matches("button", "Log in").await.unwrap(), vec![0, 1]);
        assert_eq!(doc.text_matches("a", "Help center").await.unwrap(), vec![0]);
        assert!(doc.text_matches("a", "?").await.unwrap().is_empty());
        assert!(doc.text_matches("p", "Log in").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_class_tokens_split_on_ascii_whitespace_only() {
        let doc = HtmlDocument::parse("<p class=\"a\u{a0}b\tc\">x</p>").unwrap();
        assert_eq!(doc.count_by_class("a").await.unwrap(), 0);
        assert_eq!(doc.count_by_class("a\u{a0}b").await.unwrap(), 1);
        assert_eq!(doc.count_by_class("c").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_svg_candidates_use_lowercased_local_name() {
        let doc = HtmlDocument::parse(
            r#"<svg><clipPath data-cy="clip"></clipPath></svg><svg><clipPath></clipPath></svg>"#,
        )
        .unwrap();
        let found = doc.extract().await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].tag, "clippath");
        assert_eq!(found[0].ordinal, 0);
    }

    #[tokio::test]
    async fn test_empty_document() {
        let doc = HtmlDocument::parse("").unwrap();
        assert!(doc.extract().await.unwrap().is_empty());
        // html, head and body are always synthesized
        assert_eq!(doc.len(), 3);
    }
}
