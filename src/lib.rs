//! # eoka-po
//!
//! Page object generation. Inspect a document, pick the most robust selector
//! for every notable element and emit a WebdriverIO-style page object class.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use eoka_po::{Generator, HtmlDocument};
//!
//! # #[tokio::main]
//! # async fn main() -> eoka_po::Result<()> {
//! let doc = HtmlDocument::parse(r#"<button data-test-id="submit">Send</button>"#)?;
//! let page_object = Generator::default().generate(&doc).await?;
//! println!("{}", page_object.render());
//! # Ok(())
//! # }
//! ```

pub mod classify;
pub mod config;
pub mod descriptor;
pub mod dom;
pub mod emit;
pub mod generate;
pub mod mcp;
pub mod naming;
pub mod selector;
pub mod transport;

pub use classify::{
    Classification, Classifier, ClassifierAdapter, ClassifierKind, LinearClassifier,
    TagClassifier,
};
pub use config::{BrowserConfig, Config, OutputConfig, OutputFormat, Target};
pub use descriptor::ElementDescriptor;
pub use dom::{DomTree, HtmlDocument, LiveDocument};
pub use emit::Emitter;
pub use generate::{Generator, PageObject, PageObjectEntry};
pub use naming::NameRegistry;
pub use selector::{SelectorCandidate, SelectorResolver, Strategy};
pub use transport::{PageContext, Request, RequestHandler, Response};

/// Result type for eoka-po operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading config, reading a document or
/// carrying a generate request.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("browser error: {0}")]
    Browser(#[from] eoka::Error),

    #[error("document error: {0}")]
    Document(String),

    #[error("classification failed: {0}")]
    Classification(String),

    #[error("generation failed: {0}")]
    Generation(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("a generation is already in progress")]
    Busy,

    #[error("timeout: {0}")]
    Timeout(String),
}
