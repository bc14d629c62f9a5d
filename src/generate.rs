//! The generation pipeline.
//!
//! extract -> classify -> resolve selector -> derive name -> emit, one
//! descriptor at a time in document order. Name collisions and text-match
//! ordinals depend on that order, so descriptors are never processed
//! concurrently.

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::classify::{Classification, Classifier, ClassifierAdapter};
use crate::dom::DomTree;
use crate::emit::Emitter;
use crate::naming::{self, NameRegistry};
use crate::selector::{SelectorResolver, Strategy};
use crate::Result;

/// One accessor of the generated class.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageObjectEntry {
    pub property_name: String,
    pub selector: String,
    pub strategy: Strategy,
    #[serde(flatten)]
    pub classification: Classification,
}

/// Result of one generation run.
#[derive(Debug, Clone)]
pub struct PageObject {
    pub entries: Vec<PageObjectEntry>,
    emitter: Emitter,
}

impl PageObject {
    /// Page object source text.
    pub fn render(&self) -> String {
        self.emitter.render(&self.entries)
    }

    /// Entries as a pretty JSON array.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.entries)?)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Runs the pipeline against any [`DomTree`].
#[derive(Clone, Default)]
pub struct Generator {
    classifier: ClassifierAdapter,
    emitter: Emitter,
}

impl Generator {
    pub fn new(classifier: Arc<dyn Classifier>, emitter: Emitter) -> Self {
        Self {
            classifier: ClassifierAdapter::new(classifier),
            emitter,
        }
    }

    pub fn with_emitter(mut self, emitter: Emitter) -> Self {
        self.emitter = emitter;
        self
    }

    /// Generate a page object from the tree's current state.
    ///
    /// Only extraction failures fail the run; anything that goes wrong for a
    /// single element is absorbed while resolving that element.
    pub async fn generate<D: DomTree + ?Sized>(&self, tree: &D) -> Result<PageObject> {
        let start = Instant::now();
        let descriptors = tree.extract().await?;
        debug!("Extracted {} candidate elements", descriptors.len());

        let resolver = SelectorResolver::new(tree);
        let mut names = NameRegistry::new();
        let mut entries = Vec::with_capacity(descriptors.len());

        for el in &descriptors {
            let classification = self.classifier.classify(el).await;
            let candidate = resolver.resolve(el, &classification).await;

            let mut base = naming::derive(&candidate.basis_text);
            if base.is_empty() {
                debug!(
                    "Skipping <{}> #{}: no usable name in {:?}",
                    el.tag, el.ordinal, candidate.basis_text
                );
                continue;
            }
            if let Some(n) = candidate.ordinal_suffix {
                base.push_str(&n.to_string());
            }
            let property_name = names.commit(&base);

            debug!(
                "{} -> {} via {}",
                property_name, candidate.selector, candidate.strategy
            );
            entries.push(PageObjectEntry {
                property_name,
                selector: candidate.selector,
                strategy: candidate.strategy,
                classification,
            });
        }

        info!(
            "Generated {} accessors from {} elements in {}ms",
            entries.len(),
            descriptors.len(),
            start.elapsed().as_millis()
        );

        Ok(PageObject {
            entries,
            emitter: self.emitter.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::TagClassifier;
    use crate::descriptor::ElementDescriptor;
    use crate::dom::HtmlDocument;
    use crate::Error;
    use async_trait::async_trait;
    use std::collections::HashSet;

    /// Labels everything with one fixed label.
    struct Fixed(&'static str);

    #[async_trait]
    impl Classifier for Fixed {
        async fn classify(&self, _: &ElementDescriptor) -> Result<Classification> {
            Ok(Classification::new(self.0, 0.9))
        }
    }

    fn generator(label: &'static str) -> Generator {
        Generator::new(Arc::new(Fixed(label)), Emitter::default())
    }

    fn names(po: &PageObject) -> Vec<&str> {
        po.entries.iter().map(|e| e.property_name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_same_text_buttons() {
        let doc = HtmlDocument::parse("<button>Save</button><button>Save</button>").unwrap();
        let po = generator("button").generate(&doc).await.unwrap();
        assert_eq!(names(&po), vec!["saveButton1", "saveButton2"]);
        assert!(po.entries.iter().all(|e| e.selector == "button=Save"));
    }

    #[tokio::test]
    async fn test_identical_basis_gets_suffix() {
        let html = r#"<input name="Submit Order"><select name="Submit Order"></select>"#;
        let po = generator("button").generate(&doc(html)).await.unwrap();
        assert_eq!(names(&po), vec!["submitOrderButton", "submitOrderButton1"]);
    }

    #[tokio::test]
    async fn test_names_are_unique() {
        let html = r#"
            <input type="text"><input type="text"><input type="text">
            <p>Save</p><p>Save</p>
            <a>Home</a><a data-qa="home">Start</a>
        "#;
        let po = generator("link").generate(&doc(html)).await.unwrap();
        let unique: HashSet<_> = names(&po).into_iter().collect();
        assert_eq!(unique.len(), po.len());
        assert_eq!(po.len(), 7);
        assert_eq!(&names(&po)[..3], &["textInput", "textInput1", "textInput2"]);
    }

    #[tokio::test]
    async fn test_generation_is_idempotent() {
        let html = r#"
            <h1>Checkout</h1>
            <form><input id="card" type="text"><input name="cvc">
            <button type="submit" class="btn primary">Pay</button></form>
            <a href="/help">Help</a><p class="fine-print">Terms apply</p>
        "#;
        let doc = doc(html);
        let generator = Generator::default();
        let first = generator.generate(&doc).await.unwrap().render();
        let second = generator.generate(&doc).await.unwrap().render();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_empty_names_are_skipped() {
        let doc = doc(r#"<span data-qa="!!!"></span><button id="ok">OK</button>"#);
        let po = generator("").generate(&doc).await.unwrap();
        assert_eq!(names(&po), vec!["ok"]);
    }

    #[tokio::test]
    async fn test_tag_classifier_end_to_end() {
        let html = r#"<h2>Your cart</h2><a href="/">Home</a><input type="search">"#;
        let generator = Generator::new(Arc::new(TagClassifier), Emitter::new("CartPage"));
        let po = generator.generate(&doc(html)).await.unwrap();
        assert_eq!(names(&po), vec!["yourCartHeading", "homeLink", "searchInput"]);

        let json: serde_json::Value = serde_json::from_str(&po.to_json().unwrap()).unwrap();
        assert_eq!(json[0]["propertyName"], "yourCartHeading");
        assert_eq!(json[0]["selector"], "h2=Your cart");
        assert_eq!(json[0]["strategy"], "text");
        assert_eq!(json[0]["type"], "heading");
        assert_eq!(json[2]["strategy"], "fallback");
    }

    struct Unreachable;

    #[async_trait]
    impl DomTree for Unreachable {
        async fn extract(&self) -> Result<Vec<ElementDescriptor>> {
            Err(Error::Document("page closed".into()))
        }
        async fn count_by_id(&self, _: &str) -> Result<usize> {
            Ok(0)
        }
        async fn count_by_class(&self, _: &str) -> Result<usize> {
            Ok(0)
        }
        async fn text_matches(&self, _: &str, _: &str) -> Result<Vec<usize>> {
            Ok(vec![])
        }
    }

    /// A tree holding one bare `<div>`.
    struct BareDiv;

    #[async_trait]
    impl DomTree for BareDiv {
        async fn extract(&self) -> Result<Vec<ElementDescriptor>> {
            Ok(vec![ElementDescriptor::new("div")])
        }
        async fn count_by_id(&self, _: &str) -> Result<usize> {
            Ok(0)
        }
        async fn count_by_class(&self, _: &str) -> Result<usize> {
            Ok(0)
        }
        async fn text_matches(&self, _: &str, _: &str) -> Result<Vec<usize>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_bare_element_falls_back_to_tag() {
        let po = generator("element").generate(&BareDiv).await.unwrap();
        assert_eq!(names(&po), vec!["divElementGeneric"]);
        assert_eq!(po.entries[0].selector, "div");
        assert_eq!(po.entries[0].strategy, Strategy::Fallback);
    }

    #[tokio::test]
    async fn test_extraction_failure_fails_run() {
        let err = Generator::default().generate(&Unreachable).await.unwrap_err();
        assert!(err.to_string().contains("page closed"));
    }

    fn doc(html: &str) -> HtmlDocument {
        HtmlDocument::parse(html).unwrap()
    }
}
