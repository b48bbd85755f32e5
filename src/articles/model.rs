use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An article as returned to callers, rendered in one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleDto {
    /// Article id.
    pub id: i64,
    /// Id of the writer who owns the article.
    pub writer_id: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time, if ever updated.
    pub updated_at: Option<DateTime<Utc>>,
    /// Whether the article is visible to readers.
    pub is_published: bool,
    /// Translation in the requested language, if one exists.
    pub current_translation: Option<ArticleTranslationDto>,
    /// Every translation of the article.
    pub all_translations: Vec<ArticleTranslationDto>,
}

/// One language version of an article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleTranslationDto {
    /// Translation id.
    pub id: i64,
    /// Title in this language.
    pub title: String,
    /// Body in this language.
    pub content: String,
    /// Language key, e.g. `en`.
    pub language_key: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time, if ever updated.
    pub updated_at: Option<DateTime<Utc>>,
}

/// Request to create an article with its first translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateArticleRequest {
    /// Title of the first translation.
    pub title: String,
    /// Body of the first translation.
    pub content: String,
    /// Language of the first translation.
    #[serde(default = "default_language")]
    pub language_key: String,
    /// Whether to publish immediately.
    #[serde(default)]
    pub is_published: bool,
}

fn default_language() -> String {
    "en".to_string()
}

impl CreateArticleRequest {
    /// An unpublished English article.
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            language_key: default_language(),
            is_published: false,
        }
    }
}

/// Request to update an article.
///
/// Absent fields are left unchanged. A translation for `language_key` is
/// created if the article has none.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UpdateArticleRequest {
    /// Language of the translation to update or add.
    pub language_key: String,
    /// New title.
    pub title: Option<String>,
    /// New body.
    pub content: Option<String>,
    /// New publication flag.
    pub is_published: Option<bool>,
}
