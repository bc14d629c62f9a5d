//! Element classification.
//!
//! A [`Classifier`] is any capability that labels a descriptor. The
//! [`ClassifierAdapter`] wraps one and never fails: a faulting classifier
//! is replaced by the generic [`Classification::fallback`] label so one bad
//! element cannot abort a generation run.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::descriptor::ElementDescriptor;
use crate::Result;

/// Label used when a classifier faults.
pub const FALLBACK_LABEL: &str = "element";

/// A semantic label plus the classifier's confidence in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    #[serde(rename = "type")]
    pub label: String,
    /// In `[0, 1]`.
    pub confidence: f32,
}

impl Classification {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn fallback() -> Self {
        Self::new(FALLBACK_LABEL, 0.0)
    }
}

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, element: &ElementDescriptor) -> Result<Classification>;
}

/// Which built-in classifier to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierKind {
    /// Small linear model over three element features.
    #[default]
    Linear,
    /// Rule table over tag, role and type.
    Tag,
}

impl ClassifierKind {
    pub fn build(self) -> Arc<dyn Classifier> {
        match self {
            ClassifierKind::Linear => Arc::new(LinearClassifier::new()),
            ClassifierKind::Tag => Arc::new(TagClassifier),
        }
    }
}

impl fmt::Display for ClassifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassifierKind::Linear => write!(f, "linear"),
            ClassifierKind::Tag => write!(f, "tag"),
        }
    }
}

/// Infallible front for any [`Classifier`].
#[derive(Clone)]
pub struct ClassifierAdapter {
    inner: Arc<dyn Classifier>,
}

impl ClassifierAdapter {
    pub fn new(inner: Arc<dyn Classifier>) -> Self {
        Self { inner }
    }

    pub async fn classify(&self, element: &ElementDescriptor) -> Classification {
        match self.inner.classify(element).await {
            Ok(c) => {
                debug!(
                    "Classified <{}> #{} as {} ({:.2})",
                    element.tag, element.ordinal, c.label, c.confidence
                );
                c
            }
            Err(e) => {
                warn!(
                    "Classifier failed for <{}> #{}: {}; using '{}'",
                    element.tag, element.ordinal, e, FALLBACK_LABEL
                );
                Classification::fallback()
            }
        }
    }
}

impl Default for ClassifierAdapter {
    fn default() -> Self {
        Self::new(ClassifierKind::default().build())
    }
}

// =============================================================================
// LinearClassifier
// =============================================================================

const LINEAR_LABELS: [&str; 3] = ["inputField", "button", "link"];

/// Weights and biases of the linear model. Rows are features, columns are
/// labels.
#[derive(Debug, Clone)]
struct LinearModel {
    weights: [[f32; 3]; 3],
    biases: [f32; 3],
}

impl LinearModel {
    fn builtin() -> Self {
        Self {
            weights: [[0.8, 0.1, 0.1], [0.2, 0.7, 0.1], [0.1, 0.1, 0.9]],
            biases: [-0.5, -0.5, -0.5],
        }
    }

    /// Softmax over `features * weights + biases`.
    fn predict(&self, features: [f32; 3]) -> [f32; 3] {
        let mut logits = self.biases;
        for (row, x) in self.weights.iter().zip(features) {
            for (logit, w) in logits.iter_mut().zip(row) {
                *logit += x * w;
            }
        }

        let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let exps = logits.map(|l| (l - max).exp());
        let sum: f32 = exps.iter().sum();
        exps.map(|e| e / sum)
    }
}

/// Features: is a form field, has significant text, is button-like.
fn features(el: &ElementDescriptor) -> [f32; 3] {
    let flag = |b: bool| if b { 1.0 } else { 0.0 };
    let is_form_field = matches!(el.tag.as_str(), "input" | "textarea" | "select");
    let has_text = el.text.chars().count() > 5
        || el.aria_label.as_deref().is_some_and(|l| !l.is_empty());
    let is_button = el.tag == "button"
        || el.input_type.as_deref() == Some("submit")
        || el.role.as_deref() == Some("button");
    [flag(is_form_field), flag(has_text), flag(is_button)]
}

/// On-device linear classifier over three binary features. Labels are
/// `inputField`, `button` and `link`.
///
/// The model is built on first use and shared by every later call.
#[derive(Debug, Default)]
pub struct LinearClassifier {
    model: OnceCell<LinearModel>,
}

impl LinearClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    async fn model(&self) -> &LinearModel {
        self.model
            .get_or_init(|| async {
                debug!("Linear classifier model loaded");
                LinearModel::builtin()
            })
            .await
    }
}

#[async_trait]
impl Classifier for LinearClassifier {
    async fn classify(&self, element: &ElementDescriptor) -> Result<Classification> {
        let probs = self.model().await.predict(features(element));

        // First maximum wins on ties.
        let mut best = 0;
        for (i, p) in probs.iter().enumerate() {
            if *p > probs[best] {
                best = i;
            }
        }

        Ok(Classification::new(LINEAR_LABELS[best], probs[best]))
    }
}

// =============================================================================
// TagClassifier
// =============================================================================

/// Deterministic rule table over tag, role and type attributes.
#[derive(Debug, Default, Clone, Copy)]
pub struct TagClassifier;

#[async_trait]
impl Classifier for TagClassifier {
    async fn classify(&self, el: &ElementDescriptor) -> Result<Classification> {
        let input_type = el.input_type.as_deref().unwrap_or_default();
        let label = match el.tag.as_str() {
            "a" => "link",
            "button" => "button",
            "input" if matches!(input_type, "submit" | "button" | "reset") => "button",
            "input" | "textarea" | "select" => "inputField",
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => "heading",
            "label" => "label",
            _ if el.role.as_deref() == Some("button") => "actionElement",
            "p" => "paragraph",
            _ => FALLBACK_LABEL,
        };
        let confidence = if label == FALLBACK_LABEL { 0.5 } else { 1.0 };
        Ok(Classification::new(label, confidence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    struct Broken;

    #[async_trait]
    impl Classifier for Broken {
        async fn classify(&self, _: &ElementDescriptor) -> Result<Classification> {
            Err(Error::Classification("model unavailable".into()))
        }
    }

    async fn linear(el: ElementDescriptor) -> Classification {
        LinearClassifier::new().classify(&el).await.unwrap()
    }

    #[tokio::test]
    async fn test_linear_labels() {
        let c = linear(ElementDescriptor::new("input").with_type("email")).await;
        assert_eq!(c.label, "inputField");

        let c = linear(ElementDescriptor::new("h2").with_text("Order summary")).await;
        assert_eq!(c.label, "button");

        // Button-like elements score highest on the third column.
        let c = linear(ElementDescriptor::new("button").with_text("Save")).await;
        assert_eq!(c.label, "link");
        assert!((c.confidence - 0.5267).abs() < 1e-3, "{}", c.confidence);
    }

    #[tokio::test]
    async fn test_linear_tie_picks_first_label() {
        let c = linear(ElementDescriptor::new("p")).await;
        assert_eq!(c.label, "inputField");
        assert!((c.confidence - 1.0 / 3.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_linear_is_deterministic_and_model_is_shared() {
        let classifier = LinearClassifier::new();
        let el = ElementDescriptor::new("a").with_aria_label("Account");
        let first = classifier.classify(&el).await.unwrap();
        let model = classifier.model().await as *const LinearModel;
        let second = classifier.classify(&el).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(model, classifier.model().await as *const LinearModel);
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = LinearModel::builtin().predict([1.0, 1.0, 1.0]);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[tokio::test]
    async fn test_tag_classifier() {
        let cases = [
            (ElementDescriptor::new("a"), "link"),
            (ElementDescriptor::new("input").with_type("submit"), "button"),
            (ElementDescriptor::new("input"), "inputField"),
            (ElementDescriptor::new("h3"), "heading"),
            (ElementDescriptor::new("span").with_role("button"), "actionElement"),
            (ElementDescriptor::new("p"), "paragraph"),
            (ElementDescriptor::new("span"), "element"),
        ];
        for (el, expected) in cases {
            let c = TagClassifier.classify(&el).await.unwrap();
            assert_eq!(c.label, expected, "<{}>", el.tag);
        }
    }

    #[tokio::test]
    async fn test_adapter_falls_back_on_failure() {
        let adapter = ClassifierAdapter::new(Arc::new(Broken));
        let c = adapter.classify(&ElementDescriptor::new("button")).await;
        assert_eq!(c, Classification::fallback());
        assert_eq!(c.label, "element");
    }

    #[test]
    fn test_classification_serializes_type_field() {
        let json = serde_json::to_string(&Classification::new("button", 0.75)).unwrap();
        assert_eq!(json, r#"{"type":"button","confidence":0.75}"#);
    }

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(Classification::new("x", 1.7).confidence, 1.0);
        assert_eq!(Classification::new("x", -0.2).confidence, 0.0);
    }
}
