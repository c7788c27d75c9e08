use std::{
    collections::HashMap,
    hash::{Hash, Hasher},
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("document id must not be empty")]
    EmptyId,
}

/// コンテンツソースから取得した記事 1 件。
///
/// 生成後は変更されない。スコアリングと配送は読み取りのみ行う。
/// 同一性は `id` だけで決まり、配送先の冪等キーとしても使われる。
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    id: String,
    url: String,
    content: String,
    source: String,
    timestamp: DateTime<Utc>,
    metadata: HashMap<String, String>,
}

impl Document {
    /// `id` だけを持つドキュメントを作成する。その他のフィールドは空で、`with_*` で埋める。
    ///
    /// # Errors
    /// `id` が空文字列の場合は [`DocumentError::EmptyId`] を返す。
    pub fn new(id: impl Into<String>) -> Result<Self, DocumentError> {
        let id = id.into();
        if id.is_empty() {
            return Err(DocumentError::EmptyId);
        }
        Ok(Self {
            id,
            url: String::new(),
            content: String::new(),
            source: String::new(),
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        })
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// メタデータ全体を置き換える。
    #[must_use]
    pub fn with_metadata<I, K, V>(mut self, metadata: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.metadata = metadata
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        self
    }

    #[must_use]
    pub fn with_metadata_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// 取得時刻（公開時刻ではない）。
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    #[must_use]
    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Document {}

impl Hash for Document {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
