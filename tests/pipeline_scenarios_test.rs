// 公開 API だけを使った取り込み実行のシナリオテスト。
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ingest_worker::{
    observability::metrics::Metrics,
    pipeline::{ContentSource, DeliverySink, Document, PipelineOrchestrator, RunStatus},
    scheduler::{RunContext, Trigger},
};
use uuid::Uuid;

struct FixedSource(Vec<Document>);

#[async_trait]
impl ContentSource for FixedSource {
    async fn fetch(&self, _topic: &str) -> anyhow::Result<Vec<Document>> {
        Ok(self.0.clone())
    }
}

struct UnavailableSource;

#[async_trait]
impl ContentSource for UnavailableSource {
    async fn fetch(&self, _topic: &str) -> anyhow::Result<Vec<Document>> {
        anyhow::bail!("upstream returned 503")
    }
}

#[derive(Default)]
struct CollectingSink {
    delivered: Mutex<Vec<String>>,
    reject: Option<&'static str>,
}

impl CollectingSink {
    fn delivered(&self) -> Vec<String> {
        self.delivered.lock().expect("delivered lock").clone()
    }
}

#[async_trait]
impl DeliverySink for CollectingSink {
    fn name(&self) -> &'static str {
        "collecting"
    }

    async fn deliver(&self, document: &Document) -> anyhow::Result<()> {
        if self.reject == Some(document.id()) {
            anyhow::bail!("downstream rejected {}", document.id());
        }
        self.delivered
            .lock()
            .expect("delivered lock")
            .push(document.id().to_string());
        Ok(())
    }
}

fn pipeline(
    source: impl ContentSource + 'static,
    sink: Arc<CollectingSink>,
) -> PipelineOrchestrator {
    PipelineOrchestrator::builder()
        .with_content_source(Arc::new(source))
        .with_delivery_sink(sink)
        .with_metrics(Arc::new(Metrics::standalone().expect("metrics")))
        .build()
        .expect("pipeline builds")
}

fn run_context(topic: &str) -> RunContext {
    RunContext::new(Uuid::new_v4(), topic, Trigger::Manual)
}

fn guardian_like(id: &str, url: &str, content: &str, section: &str) -> Document {
    Document::new(id)
        .expect("valid id")
        .with_url(url)
        .with_content(content)
        .with_source("The Guardian")
        .with_metadata_entry("section", section)
}

#[tokio::test]
async fn content_only_match_is_not_delivered() {
    let sink = Arc::new(CollectingSink::default());
    let source = FixedSource(vec![guardian_like(
        "tech/1",
        "http://x.com/tech",
        "science science science",
        "Technology",
    )]);

    let result = pipeline(source, Arc::clone(&sink))
        .run(&run_context("science"))
        .await;

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.documents_fetched, 1);
    assert_eq!(result.documents_relevant, 0);
    assert!(sink.delivered().is_empty());
}

#[tokio::test]
async fn url_match_is_delivered() {
    let sink = Arc::new(CollectingSink::default());
    let source = FixedSource(vec![guardian_like(
        "science/1",
        "http://x.com/science",
        "",
        "Science",
    )]);

    let result = pipeline(source, Arc::clone(&sink))
        .run(&run_context("science"))
        .await;

    assert_eq!(result.documents_delivered, 1);
    assert_eq!(sink.delivered(), vec!["science/1"]);
}

#[tokio::test]
async fn one_rejected_delivery_leaves_others_in_source_order() {
    let sink = Arc::new(CollectingSink {
        reject: Some("science/2"),
        ..CollectingSink::default()
    });
    let source = FixedSource(
        ["science/1", "science/2", "science/3"]
            .into_iter()
            .map(|id| guardian_like(id, &format!("https://example.com/{id}"), "", "Science"))
            .collect(),
    );

    let result = pipeline(source, Arc::clone(&sink))
        .run(&run_context("science"))
        .await;

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(sink.delivered(), vec!["science/1", "science/3"]);
    assert_eq!(result.delivery_failures.len(), 1);
    assert_eq!(result.delivery_failures[0].document_id, "science/2");
}

#[tokio::test]
async fn unavailable_source_reports_fetch_failure() {
    let sink = Arc::new(CollectingSink::default());

    let result = pipeline(UnavailableSource, Arc::clone(&sink))
        .run(&run_context("science"))
        .await;

    assert!(matches!(
        &result.status,
        RunStatus::FetchFailed { error } if error.contains("503")
    ));
    assert_eq!(result.documents_delivered, 0);
    assert!(sink.delivered().is_empty());
}
