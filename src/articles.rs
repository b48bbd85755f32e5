//! The article capability and its logging decorator.
//!
//! [`ArticleService`] is the capability interface consumers depend on.
//! [`InMemoryArticleService`] is a raw implementation and
//! [`ArticleServiceLoggingDecorator`] the instrumented one; both are
//! interchangeable behind `Arc<dyn ArticleService>`.

mod decorator;
mod memory;
mod model;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::capability::Capability;
use crate::error::CompositionError;
use crate::registry::ServiceCollection;

pub use decorator::ArticleServiceLoggingDecorator;
pub use memory::InMemoryArticleService;
pub use model::{ArticleDto, ArticleTranslationDto, CreateArticleRequest, UpdateArticleRequest};

/// Failures of article operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArticleError {
    /// No article has the given id.
    #[error("article {0} not found")]
    NotFound(i64),
    /// The request was rejected before reaching storage.
    #[error("invalid article request: {0}")]
    Invalid(String),
    /// The backing store failed.
    #[error("article storage failure: {0}")]
    Storage(String),
}

/// Reading and writing articles.
#[async_trait]
pub trait ArticleService: Send + Sync {
    /// Returns one page of articles (1-based `page_number`) rendered in
    /// `language_key`, newest first, along with the unpaginated total.
    /// `writer_id` restricts the listing to one writer.
    async fn get_articles(
        &self,
        page_number: u32,
        page_size: u32,
        language_key: &str,
        writer_id: Option<&str>,
    ) -> Result<(Vec<ArticleDto>, usize), ArticleError>;

    /// Returns one article rendered in `language_key`.
    async fn get_article_by_id(&self, id: i64, language_key: &str)
        -> Result<ArticleDto, ArticleError>;

    /// Creates an article owned by `writer_id`.
    async fn create_article(
        &self,
        request: CreateArticleRequest,
        writer_id: &str,
    ) -> Result<ArticleDto, ArticleError>;

    /// Updates the publication flag and one translation of an article.
    async fn update_article(
        &self,
        id: i64,
        request: UpdateArticleRequest,
    ) -> Result<ArticleDto, ArticleError>;

    /// Deletes an article; returns `false` if it did not exist.
    async fn delete_article(&self, id: i64) -> Result<bool, ArticleError>;
}

impl Capability for dyn ArticleService {
    const NAME: &'static str = "ArticleService";
}

/// Wraps the registered [`ArticleService`] in an
/// [`ArticleServiceLoggingDecorator`].
///
/// # Errors
///
/// Returns [`CompositionError::NotRegistered`] if no article service has
/// been registered yet.
pub fn decorate_article_service(services: &mut ServiceCollection) -> Result<(), CompositionError> {
    services.decorate::<dyn ArticleService, _>(|inner, logger| {
        Arc::new(ArticleServiceLoggingDecorator::new(inner, logger))
    })?;
    Ok(())
}
