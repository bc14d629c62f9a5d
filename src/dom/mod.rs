//! Document backends.
//!
//! A [`DomTree`] is whatever holds the document: a parsed HTML snapshot or a
//! live browser page. Extraction and every uniqueness check go through it,
//! so the resolver always sees the tree as it is at query time.

mod html;
mod live;

pub use html::HtmlDocument;
pub use live::LiveDocument;

use async_trait::async_trait;

use crate::descriptor::ElementDescriptor;
use crate::Result;

#[async_trait]
pub trait DomTree: Send + Sync {
    /// Descriptors for every candidate node, in document order.
    async fn extract(&self) -> Result<Vec<ElementDescriptor>>;

    /// Number of elements `#<id>` matches.
    async fn count_by_id(&self, id: &str) -> Result<usize>;

    /// Number of elements `.<class>` matches.
    async fn count_by_class(&self, class: &str) -> Result<usize>;

    /// Ordinals of the `tag` elements whose preferred text equals `text`,
    /// in document order.
    async fn text_matches(&self, tag: &str, text: &str) -> Result<Vec<usize>>;
}

#[async_trait]
impl<T: DomTree + ?Sized> DomTree for Box<T> {
    async fn extract(&self) -> Result<Vec<ElementDescriptor>> {
        (**self).extract().await
    }

    async fn count_by_id(&self, id: &str) -> Result<usize> {
        (**self).count_by_id(id).await
    }

    async fn count_by_class(&self, class: &str) -> Result<usize> {
        (**self).count_by_class(class).await
    }

    async fn text_matches(&self, tag: &str, text: &str) -> Result<Vec<usize>> {
        (**self).text_matches(tag, text).await
    }
}

#[async_trait]
impl<T: DomTree + ?Sized> DomTree for &T {
    async fn extract(&self) -> Result<Vec<ElementDescriptor>> {
        (**self).extract().await
    }

    async fn count_by_id(&self, id: &str) -> Result<usize> {
        (**self).count_by_id(id).await
    }

    async fn count_by_class(&self, class: &str) -> Result<usize> {
        (**self).count_by_class(class).await
    }

    async fn text_matches(&self, tag: &str, text: &str) -> Result<Vec<usize>> {
        (**self).text_matches(tag, text).await
    }
}
