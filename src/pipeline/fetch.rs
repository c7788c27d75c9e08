use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};

use super::document::Document;
use crate::clients::{GuardianClient, guardian::GuardianResult};

const GUARDIAN_SOURCE_LABEL: &str = "The Guardian";

/// トピックに関する記事を取得する外部コンテンツソース。
///
/// プロトコル・認証・パースの詳細はすべて実装側の責務。
/// 本文を持たない項目は返す前に取り除いておくこと。
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch(&self, topic: &str) -> anyhow::Result<Vec<Document>>;
}

pub(crate) struct GuardianContentSource {
    client: GuardianClient,
}

impl GuardianContentSource {
    pub(crate) fn new(client: GuardianClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ContentSource for GuardianContentSource {
    async fn fetch(&self, topic: &str) -> anyhow::Result<Vec<Document>> {
        let results = self.client.search(topic).await?;
        let total = results.len();
        let documents = convert_results(results);

        debug!(
            topic,
            total,
            kept = documents.len(),
            "converted guardian results to documents"
        );
        Ok(documents)
    }
}

/// 検索結果を Document に変換する。本文が空、または ID が空の結果は捨てる。
fn convert_results(results: Vec<GuardianResult>) -> Vec<Document> {
    let captured_at = Utc::now();

    results
        .into_iter()
        .filter(|result| !result.fields.body_text.is_empty())
        .filter_map(|result| match Document::new(result.id) {
            Ok(doc) => Some(
                doc.with_url(result.web_url)
                    .with_content(result.fields.body_text)
                    .with_source(GUARDIAN_SOURCE_LABEL)
                    .with_timestamp(captured_at)
                    .with_metadata_entry("section", result.section_name),
            ),
            Err(error) => {
                warn!(%error, "skipping guardian result without id");
                None
            }
        })
        .collect()
}
