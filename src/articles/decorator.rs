use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use super::model::{ArticleDto, CreateArticleRequest, UpdateArticleRequest};
use super::{ArticleError, ArticleService};
use crate::instrument::Instrumentation;
use crate::logging::CapabilityLogger;
use crate::serializer::LogArg;

/// Logs every [`ArticleService`] call before delegating it unchanged.
#[derive(Debug)]
pub struct ArticleServiceLoggingDecorator {
    base: Instrumentation<dyn ArticleService>,
}

/// The paged listing logged as a single object.
#[derive(Debug, Serialize)]
struct ArticlePage<'a> {
    total_count: usize,
    articles: &'a [ArticleDto],
}

impl ArticleServiceLoggingDecorator {
    /// Wraps `inner`, logging through `logger`.
    pub fn new(inner: Arc<dyn ArticleService>, logger: CapabilityLogger) -> Self {
        Self {
            base: Instrumentation::new(inner, logger),
        }
    }

    /// Returns the instrumentation shared by every method.
    pub fn instrumentation(&self) -> &Instrumentation<dyn ArticleService> {
        &self.base
    }
}

#[async_trait]
impl ArticleService for ArticleServiceLoggingDecorator {
    async fn get_articles(
        &self,
        page_number: u32,
        page_size: u32,
        language_key: &str,
        writer_id: Option<&str>,
    ) -> Result<(Vec<ArticleDto>, usize), ArticleError> {
        const OP: &str = "get_articles";
        let params = [
            LogArg::new(&page_number),
            LogArg::new(&page_size),
            LogArg::new(&language_key),
            LogArg::new(&writer_id),
        ];

        self.base.record_entry(OP, &params);
        let result = self
            .base
            .inner()
            .get_articles(page_number, page_size, language_key, writer_id)
            .await;
        match &result {
            Ok((articles, total_count)) => {
                let page = ArticlePage {
                    total_count: *total_count,
                    articles,
                };
                self.base.record_exit(OP, &LogArg::new(&page));
            }
            Err(err) => self.base.record_failure(OP, err, &params),
        }
        result
    }

    async fn get_article_by_id(
        &self,
        id: i64,
        language_key: &str,
    ) -> Result<ArticleDto, ArticleError> {
        self.base
            .observe(
                "get_article_by_id",
                &[LogArg::new(&id), LogArg::new(&language_key)],
                || self.base.inner().get_article_by_id(id, language_key),
            )
            .await
    }

    async fn create_article(
        &self,
        request: CreateArticleRequest,
        writer_id: &str,
    ) -> Result<ArticleDto, ArticleError> {
        let params = [LogArg::new(&request), LogArg::new(&writer_id)];
        let call = || self.base.inner().create_article(request.clone(), writer_id);
        self.base.observe("create_article", &params, call).await
    }

    async fn update_article(
        &self,
        id: i64,
        request: UpdateArticleRequest,
    ) -> Result<ArticleDto, ArticleError> {
        let params = [LogArg::new(&id), LogArg::new(&request)];
        let call = || self.base.inner().update_article(id, request.clone());
        self.base.observe("update_article", &params, call).await
    }

    async fn delete_article(&self, id: i64) -> Result<bool, ArticleError> {
        self.base
            .observe(
                "delete_article",
                &[LogArg::new(&id)],
                || self.base.inner().delete_article(id),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::articles::InMemoryArticleService;
    use crate::capability::Capability;
    use crate::record::{Level, Phase};
    use crate::sink::MemorySink;

    fn decorated() -> (ArticleServiceLoggingDecorator, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let logger = CapabilityLogger::new(<dyn ArticleService>::NAME, sink.clone());
        let service =
            ArticleServiceLoggingDecorator::new(Arc::new(InMemoryArticleService::new()), logger);
        (service, sink)
    }

    #[tokio::test]
    async fn create_logs_request_and_result() {
        let (service, sink) = decorated();

        let created = service
            .create_article(CreateArticleRequest::new("A", "B"), "w1")
            .await
            .unwrap();
        assert_eq!(created.id, 1);

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].phase(), Phase::Entry);
        assert_eq!(records[0].operation(), "create_article");
        assert_eq!(
            records[0].payload(),
            r#"param1: {"title":"A","content":"B","language_key":"en","is_published":false}, param2: "w1""#
        );
        assert_eq!(records[1].phase(), Phase::Exit);
        assert!(records[1].payload().starts_with(r#"{"id":1,"writer_id":"w1""#));
    }

    #[tokio::test]
    async fn not_found_is_logged_and_returned_unchanged() {
        let (service, sink) = decorated();

        let err = service.get_article_by_id(999, "en").await.unwrap_err();
        assert_eq!(err, ArticleError::NotFound(999));

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].phase(), Phase::Failure);
        assert_eq!(records[1].level(), Level::Error);
        assert_eq!(records[1].payload(), r#"param1: 999, param2: "en""#);
        assert_eq!(records[1].failure(), Some("article 999 not found"));
    }

    #[tokio::test]
    async fn listing_logs_total_with_truncated_articles() {
        let (service, sink) = decorated();
        service
            .create_article(CreateArticleRequest::new("A", "B"), "w1")
            .await
            .unwrap();
        sink.clear();

        let (articles, total) = service.get_articles(1, 10, "en", None).await.unwrap();
        assert_eq!((articles.len(), total), (1, 1));

        let records = sink.records();
        assert_eq!(records[0].payload(), r#"param1: 1, param2: 10, param3: "en", param4: null"#);
        assert_eq!(records[1].payload(), r#"{"total_count":1,"articles":["[...]"]}"#);
    }

    #[tokio::test]
    async fn listing_failure_logs_parameters() {
        let (service, sink) = decorated();

        assert!(service.get_articles(0, 10, "en", Some("w1")).await.is_err());

        let records = sink.records();
        assert_eq!(records[1].phase(), Phase::Failure);
        assert_eq!(records[1].payload(), r#"param1: 0, param2: 10, param3: "en", param4: "w1""#);
    }

    #[tokio::test]
    async fn delete_logs_boolean_result() {
        let (service, sink) = decorated();

        assert!(!service.delete_article(7).await.unwrap());
        assert_eq!(sink.records()[1].payload(), "false");
    }
}
