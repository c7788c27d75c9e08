//! 下流のコアサービスへドキュメントを転送するクライアント。

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Url};
use tracing::debug;

use super::headers::build_idempotent_headers;
use crate::pipeline::Document;

#[derive(Debug, Clone)]
pub(crate) struct CoreServiceConfig {
    pub(crate) endpoint: String,
    pub(crate) connect_timeout: Duration,
}

#[derive(Debug, Clone)]
pub(crate) struct CoreServiceClient {
    client: Client,
    endpoint: Url,
}

impl CoreServiceClient {
    /// # Errors
    /// URLのパースまたはHTTPクライアントの構築に失敗した場合はエラーを返します。
    pub(crate) fn new(config: CoreServiceConfig) -> Result<Self> {
        let CoreServiceConfig {
            endpoint,
            connect_timeout,
        } = config;
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .context("failed to build core-service HTTP client")?;

        let endpoint = Url::parse(&endpoint).context("invalid core-service URL")?;

        Ok(Self { client, endpoint })
    }

    /// ドキュメントを JSON で POST する。`id` を Idempotency-Key として付与する。
    ///
    /// # Errors
    /// リクエストが失敗した場合、またはサーバーがエラー状態を返した場合はエラーを返します。
    pub(crate) async fn submit_document(&self, document: &Document) -> Result<()> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .headers(build_idempotent_headers(document.id()))
            .json(document)
            .send()
            .await
            .context("core-service request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("core-service returned error status {status}: {error_body}");
        }

        debug!(document_id = document.id(), %status, "document accepted by core-service");
        Ok(())
    }
}
