use async_trait::async_trait;

use super::document::Document;
use crate::{clients::CoreServiceClient, store::dao::DocumentDao};

/// 関連ドキュメントの配送先。
///
/// 同じドキュメントが複数回届くことがあるため、実装は `id` を冪等キーとして扱うこと。
#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// ログやメトリクスに使う配送先の名前。
    fn name(&self) -> &'static str;

    async fn deliver(&self, document: &Document) -> anyhow::Result<()>;
}

/// コアサービスへ HTTP で転送する配送先。
pub(crate) struct HttpForwardSink {
    client: CoreServiceClient,
}

impl HttpForwardSink {
    pub(crate) fn new(client: CoreServiceClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DeliverySink for HttpForwardSink {
    fn name(&self) -> &'static str {
        "core_service"
    }

    async fn deliver(&self, document: &Document) -> anyhow::Result<()> {
        self.client.submit_document(document).await
    }
}

/// ドキュメントストアへ upsert する配送先。
pub(crate) struct DocumentStoreSink {
    dao: DocumentDao,
}

impl DocumentStoreSink {
    pub(crate) fn new(dao: DocumentDao) -> Self {
        Self { dao }
    }
}

#[async_trait]
impl DeliverySink for DocumentStoreSink {
    fn name(&self) -> &'static str {
        "document_store"
    }

    async fn deliver(&self, document: &Document) -> anyhow::Result<()> {
        self.dao.upsert_document(document).await
    }
}
