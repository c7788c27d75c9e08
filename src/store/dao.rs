use anyhow::{Context, Result};
use sqlx::{PgPool, types::Json};

use crate::pipeline::Document;

const CREATE_DOCUMENTS_TABLE: &str = r"
    CREATE TABLE IF NOT EXISTS documents (
        id TEXT PRIMARY KEY,
        url TEXT NOT NULL DEFAULT '',
        content TEXT NOT NULL DEFAULT '',
        source TEXT NOT NULL DEFAULT '',
        captured_at TIMESTAMPTZ NOT NULL,
        metadata JSONB NOT NULL DEFAULT '{}'::jsonb
    )
";

/// 関連ドキュメントの保存先。`id` を主キーとして upsert する。
#[derive(Debug, Clone)]
pub(crate) struct DocumentDao {
    pool: PgPool,
}

impl DocumentDao {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// `documents` テーブルが無ければ作成する。
    pub(crate) async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(CREATE_DOCUMENTS_TABLE)
            .execute(&self.pool)
            .await
            .context("failed to create documents table")?;
        Ok(())
    }

    /// ドキュメントを保存する。同じ `id` が既にあれば内容を置き換える。
    pub(crate) async fn upsert_document(&self, document: &Document) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO documents (id, url, content, source, captured_at, metadata)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                url = EXCLUDED.url,
                content = EXCLUDED.content,
                source = EXCLUDED.source,
                captured_at = EXCLUDED.captured_at,
                metadata = EXCLUDED.metadata
            ",
        )
        .bind(document.id())
        .bind(document.url())
        .bind(document.content())
        .bind(document.source())
        .bind(document.timestamp())
        .bind(Json(document.metadata()))
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to upsert document {}", document.id()))?;

        Ok(())
    }

    pub(crate) async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("document store ping failed")?;
        Ok(())
    }
}
