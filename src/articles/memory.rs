use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::{ArticleDto, ArticleTranslationDto, CreateArticleRequest, UpdateArticleRequest};
use super::{ArticleError, ArticleService};

#[derive(Debug, Clone)]
struct Translation {
    id: i64,
    title: String,
    content: String,
    language_key: String,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<&Translation> for ArticleTranslationDto {
    fn from(t: &Translation) -> Self {
        Self {
            id: t.id,
            title: t.title.clone(),
            content: t.content.clone(),
            language_key: t.language_key.clone(),
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
struct Article {
    id: i64,
    writer_id: String,
    is_published: bool,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
    translations: Vec<Translation>,
}

impl Article {
    fn render(&self, language_key: &str) -> ArticleDto {
        ArticleDto {
            id: self.id,
            writer_id: self.writer_id.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            is_published: self.is_published,
            current_translation: self
                .translations
                .iter()
                .find(|t| t.language_key == language_key)
                .map(ArticleTranslationDto::from),
            all_translations: self.translations.iter().map(ArticleTranslationDto::from).collect(),
        }
    }
}

#[derive(Debug, Default)]
struct Store {
    last_article_id: i64,
    last_translation_id: i64,
    articles: BTreeMap<i64, Article>,
}

/// An [`ArticleService`] over an in-process map.
///
/// Ids are assigned sequentially from 1. Nothing is persisted.
#[derive(Debug, Default)]
pub struct InMemoryArticleService {
    store: Mutex<Store>,
}

impl InMemoryArticleService {
    /// Creates an empty service.
    pub fn new() -> Self {
        Self::default()
    }

    // Every mutation completes before the guard drops, so poisoning is ignored.
    fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ArticleService for InMemoryArticleService {
    async fn get_articles(
        &self,
        page_number: u32,
        page_size: u32,
        language_key: &str,
        writer_id: Option<&str>,
    ) -> Result<(Vec<ArticleDto>, usize), ArticleError> {
        if page_number == 0 {
            return Err(ArticleError::Invalid("page number starts at 1".to_string()));
        }

        let store = self.store();
        let matching: Vec<&Article> = store
            .articles
            .values()
            .rev()
            .filter(|a| writer_id.map_or(true, |w| a.writer_id == w))
            .collect();
        let total = matching.len();
        let skip = (page_number as usize - 1).saturating_mul(page_size as usize);

        let page = matching
            .into_iter()
            .skip(skip)
            .take(page_size as usize)
            .map(|a| a.render(language_key))
            .collect();
        Ok((page, total))
    }

    async fn get_article_by_id(
        &self,
        id: i64,
        language_key: &str,
    ) -> Result<ArticleDto, ArticleError> {
        self.store()
            .articles
            .get(&id)
            .map(|a| a.render(language_key))
            .ok_or(ArticleError::NotFound(id))
    }

    async fn create_article(
        &self,
        request: CreateArticleRequest,
        writer_id: &str,
    ) -> Result<ArticleDto, ArticleError> {
        if request.title.trim().is_empty() {
            return Err(ArticleError::Invalid("title must not be empty".to_string()));
        }
        if writer_id.is_empty() {
            return Err(ArticleError::Invalid("writer id must not be empty".to_string()));
        }

        let now = Utc::now();
        let mut store = self.store();
        store.last_article_id += 1;
        store.last_translation_id += 1;

        let article = Article {
            id: store.last_article_id,
            writer_id: writer_id.to_string(),
            is_published: request.is_published,
            created_at: now,
            updated_at: None,
            translations: vec![Translation {
                id: store.last_translation_id,
                title: request.title,
                content: request.content,
                language_key: request.language_key.clone(),
                created_at: now,
                updated_at: None,
            }],
        };
        let rendered = article.render(&request.language_key);
        store.articles.insert(article.id, article);
        Ok(rendered)
    }

    async fn update_article(
        &self,
        id: i64,
        request: UpdateArticleRequest,
    ) -> Result<ArticleDto, ArticleError> {
        if request.language_key.is_empty() {
            return Err(ArticleError::Invalid("language key must not be empty".to_string()));
        }

        let now = Utc::now();
        let mut store = self.store();
        let next_translation_id = store.last_translation_id + 1;
        let article = store.articles.get_mut(&id).ok_or(ArticleError::NotFound(id))?;

        if let Some(is_published) = request.is_published {
            article.is_published = is_published;
        }

        let mut added = false;
        let index = match article
            .translations
            .iter()
            .position(|t| t.language_key == request.language_key)
        {
            Some(index) => index,
            None => {
                article.translations.push(Translation {
                    id: next_translation_id,
                    title: String::new(),
                    content: String::new(),
                    language_key: request.language_key.clone(),
                    created_at: now,
                    updated_at: None,
                });
                added = true;
                article.translations.len() - 1
            }
        };

        let translation = &mut article.translations[index];
        if let Some(title) = request.title {
            translation.title = title;
        }
        if let Some(content) = request.content {
            translation.content = content;
        }
        translation.updated_at = Some(now);
        article.updated_at = Some(now);

        let rendered = article.render(&request.language_key);
        if added {
            store.last_translation_id = next_translation_id;
        }
        Ok(rendered)
    }

    async fn delete_article(&self, id: i64) -> Result<bool, ArticleError> {
        Ok(self.store().articles.remove(&id).is_some())
    }
}
