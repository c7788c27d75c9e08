//! The Guardian Content API からの記事検索クライアント。

use std::{num::NonZeroUsize, time::Duration};

use anyhow::{Context, Result};
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::debug;

/// 検索結果 1 件。必要なフィールドのみ取り出す。
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GuardianResult {
    #[serde(default)]
    pub(crate) id: String,
    #[serde(default)]
    pub(crate) web_url: String,
    #[serde(default)]
    pub(crate) section_name: String,
    #[serde(default)]
    pub(crate) fields: GuardianFields,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GuardianFields {
    #[serde(default)]
    pub(crate) body_text: String,
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    response: SearchResponse,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<GuardianResult>,
}

/// Guardian クライアントの設定。
#[derive(Debug, Clone)]
pub(crate) struct GuardianConfig {
    pub(crate) base_url: String,
    pub(crate) api_key: String,
    pub(crate) page_size: NonZeroUsize,
    pub(crate) connect_timeout: Duration,
}

#[derive(Debug, Clone)]
pub(crate) struct GuardianClient {
    client: Client,
    base_url: Url,
    api_key: String,
    page_size: NonZeroUsize,
}

impl GuardianClient {
    /// # Errors
    /// URLのパースまたはHTTPクライアントの構築に失敗した場合はエラーを返します。
    pub(crate) fn new(config: GuardianConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .context("failed to build guardian HTTP client")?;

        let base_url = Url::parse(&config.base_url).context("invalid guardian base URL")?;

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key,
            page_size: config.page_size,
        })
    }

    /// トピックで記事を検索し、本文付きの結果を返す。
    ///
    /// # Errors
    /// リクエストの失敗、エラーステータス、レスポンスのパース失敗時はエラーを返します。
    pub(crate) async fn search(&self, topic: &str) -> Result<Vec<GuardianResult>> {
        let mut url = self
            .base_url
            .join("search")
            .context("failed to build search URL")?;

        url.query_pairs_mut()
            .append_pair("show-fields", "bodyText")
            .append_pair("page-size", &self.page_size.to_string())
            .append_pair("api-key", &self.api_key)
            .append_pair("q", topic);

        debug!(topic, path = url.path(), "querying guardian content API");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("guardian search request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("guardian returned error status {status}: {error_body}");
        }

        let envelope = response
            .json::<SearchEnvelope>()
            .await
            .context("failed to deserialize guardian search response")?;

        Ok(envelope.response.results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: String) -> GuardianConfig {
        GuardianConfig {
            base_url,
            api_key: "test-key".to_string(),
            page_size: NonZeroUsize::new(10).expect("non-zero"),
            connect_timeout: Duration::from_secs(3),
        }
    }

    #[tokio::test]
    async fn search_sends_expected_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("show-fields", "bodyText"))
            .and(query_param("page-size", "10"))
            .and(query_param("api-key", "test-key"))
            .and(query_param("q", "space science"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"response": {"results": []}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = GuardianClient::new(test_config(server.uri())).expect("client should build");
        let results = client
            .search("space science")
            .await
            .expect("search should succeed");

        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn search_parses_results() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "response": {
                "status": "ok",
                "results": [
                    {
                        "id": "science/2025/jan/01/comet",
                        "webUrl": "https://www.theguardian.com/science/2025/jan/01/comet",
                        "sectionName": "Science",
                        "fields": {"bodyText": "Test content"}
                    }
                ]
            }
        });
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let client = GuardianClient::new(test_config(server.uri())).expect("client should build");
        let results = client.search("science").await.expect("search should succeed");

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "science/2025/jan/01/comet");
        assert_eq!(results[0].section_name, "Science");
        assert_eq!(results[0].fields.body_text, "Test content");
    }

    #[tokio::test]
    async fn search_tolerates_missing_fields() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "response": {"results": [{"id": "no-body"}]}
        });
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let client = GuardianClient::new(test_config(server.uri())).expect("client should build");
        let results = client.search("science").await.expect("search should succeed");

        assert_eq!(results.len(), 1);
        assert!(results[0].fields.body_text.is_empty());
        assert!(results[0].web_url.is_empty());
    }

    #[tokio::test]
    async fn search_fails_on_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
            .mount(&server)
            .await;

        let client = GuardianClient::new(test_config(server.uri())).expect("client should build");
        let error = client
            .search("science")
            .await
            .expect_err("error status should fail");

        assert!(error.to_string().contains("401"));
    }

    #[tokio::test]
    async fn search_fails_on_unparseable_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let client = GuardianClient::new(test_config(server.uri())).expect("client should build");

        assert!(client.search("science").await.is_err());
    }
}
