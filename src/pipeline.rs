use std::{num::NonZeroUsize, panic::AssertUnwindSafe, sync::Arc, time::Duration};

use anyhow::{Result, anyhow};
use futures::{FutureExt, StreamExt, stream};
use prometheus::Gauge;
use tokio::time::{Instant, timeout};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{observability::metrics::Metrics, scheduler::RunContext};

pub(crate) mod deliver;
pub mod document;
pub mod error;
pub(crate) mod fetch;
pub mod relevance;

pub use deliver::DeliverySink;
pub use document::{Document, DocumentError};
pub use error::{DeliveryError, FetchError};
pub use fetch::ContentSource;
pub use relevance::{RelevanceScorer, TopicScorer};

/// 外部呼び出しの上限と配送の並列度。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    pub fetch_timeout: Duration,
    pub delivery_timeout: Duration,
    pub delivery_concurrency: NonZeroUsize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(10),
            delivery_timeout: Duration::from_secs(10),
            delivery_concurrency: NonZeroUsize::MIN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// 取得できた全ドキュメントを処理した。配送失敗があっても完了扱い。
    Completed,
    /// コンテンツソースの失敗で中断した。スコアリング・配送は一切行っていない。
    FetchFailed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure {
    pub document_id: String,
    pub error: String,
}

/// 1 回の実行結果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub run_id: Uuid,
    pub topic: String,
    pub status: RunStatus,
    pub documents_fetched: usize,
    pub documents_relevant: usize,
    pub documents_delivered: usize,
    pub delivery_failures: Vec<DeliveryFailure>,
}

impl RunResult {
    fn empty(run: &RunContext, status: RunStatus) -> Self {
        Self {
            run_id: run.run_id,
            topic: run.topic.clone(),
            status,
            documents_fetched: 0,
            documents_relevant: 0,
            documents_delivered: 0,
            delivery_failures: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }
}

enum DocumentOutcome {
    Irrelevant,
    Delivered,
    Failed(DeliveryFailure),
}

/// 実行中ゲージを上げ、drop 時に下げる。実行 future が途中で破棄されても戻る。
struct ActiveRunGuard<'a> {
    gauge: &'a Gauge,
}

impl<'a> ActiveRunGuard<'a> {
    fn enter(gauge: &'a Gauge) -> Self {
        gauge.inc();
        Self { gauge }
    }
}

impl Drop for ActiveRunGuard<'_> {
    fn drop(&mut self) {
        self.gauge.dec();
    }
}

/// fetch → score → deliver を 1 回分実行する。
///
/// ドキュメント単位で失敗を閉じ込め、1 件の配送失敗が残りを止めることはない。
/// 実行間で状態は持たない。
pub struct PipelineOrchestrator {
    source: Arc<dyn ContentSource>,
    sink: Arc<dyn DeliverySink>,
    scorer: RelevanceScorer,
    settings: PipelineSettings,
    metrics: Arc<Metrics>,
}

#[derive(Default)]
pub struct PipelineBuilder {
    source: Option<Arc<dyn ContentSource>>,
    sink: Option<Arc<dyn DeliverySink>>,
    settings: PipelineSettings,
    metrics: Option<Arc<Metrics>>,
}

impl PipelineOrchestrator {
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// トピックについて 1 回実行する。失敗は結果に記録され、呼び出し元へは伝播しない。
    pub async fn run(&self, run: &RunContext) -> RunResult {
        let started = Instant::now();
        self.metrics.runs_started.inc();
        let _active = ActiveRunGuard::enter(&self.metrics.active_runs);

        let result = self.execute(run).await;

        self.metrics
            .run_duration
            .observe(started.elapsed().as_secs_f64());
        result
    }

    async fn execute(&self, run: &RunContext) -> RunResult {
        info!(
            run_id = %run.run_id,
            topic = %run.topic,
            trigger = %run.trigger,
            "pipeline run started"
        );

        let documents = match self.fetch(&run.topic).await {
            Ok(documents) => documents,
            Err(error) => {
                self.metrics.runs_fetch_failed.inc();
                error!(
                    run_id = %run.run_id,
                    topic = %run.topic,
                    %error,
                    "content fetch failed, aborting run"
                );
                return RunResult::empty(
                    run,
                    RunStatus::FetchFailed {
                        error: error.to_string(),
                    },
                );
            }
        };

        let mut result = RunResult::empty(run, RunStatus::Completed);
        result.documents_fetched = documents.len();
        #[allow(clippy::cast_precision_loss)]
        let fetched = documents.len() as f64;
        self.metrics.documents_fetched.inc_by(fetched);
        info!(run_id = %run.run_id, count = documents.len(), "fetched documents");

        let scorer = self.scorer.for_topic(run.topic.as_str());
        let scorer = &scorer;
        let outcomes: Vec<DocumentOutcome> = stream::iter(documents)
            .map(|document| self.process_isolated(run, scorer, document))
            .buffered(self.settings.delivery_concurrency.get())
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                DocumentOutcome::Irrelevant => {}
                DocumentOutcome::Delivered => {
                    result.documents_relevant += 1;
                    result.documents_delivered += 1;
                }
                DocumentOutcome::Failed(failure) => {
                    result.documents_relevant += 1;
                    result.delivery_failures.push(failure);
                }
            }
        }

        self.metrics.runs_completed.inc();
        info!(
            run_id = %run.run_id,
            topic = %run.topic,
            fetched = result.documents_fetched,
            relevant = result.documents_relevant,
            delivered = result.documents_delivered,
            failed = result.delivery_failures.len(),
            "pipeline run completed"
        );
        result
    }

    async fn fetch(&self, topic: &str) -> Result<Vec<Document>, FetchError> {
        let timer = self.metrics.fetch_duration.start_timer();
        let outcome = timeout(self.settings.fetch_timeout, self.source.fetch(topic)).await;
        timer.observe_duration();

        match outcome {
            Ok(Ok(documents)) => Ok(documents),
            Ok(Err(error)) => Err(FetchError::Source(error)),
            Err(_) => Err(FetchError::Timeout(self.settings.fetch_timeout)),
        }
    }

    /// スコアリングや配送先の panic も、そのドキュメントの配送失敗として扱う。
    async fn process_isolated(
        &self,
        run: &RunContext,
        scorer: &TopicScorer,
        document: Document,
    ) -> DocumentOutcome {
        let document_id = document.id().to_string();
        match AssertUnwindSafe(self.process_document(run, scorer, document))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                self.metrics.delivery_failures.inc();
                error!(run_id = %run.run_id, %document_id, "document processing panicked");
                DocumentOutcome::Failed(DeliveryFailure {
                    document_id,
                    error: "document processing panicked".to_string(),
                })
            }
        }
    }

    async fn process_document(
        &self,
        run: &RunContext,
        scorer: &TopicScorer,
        document: Document,
    ) -> DocumentOutcome {
        let score = scorer.score(&document);
        let relevant = score >= relevance::THRESHOLD;
        debug!(
            run_id = %run.run_id,
            document_id = document.id(),
            score,
            relevant,
            "relevance score computed"
        );

        if !relevant {
            return DocumentOutcome::Irrelevant;
        }
        self.metrics.documents_relevant.inc();

        match self.deliver(&document).await {
            Ok(()) => {
                self.metrics.documents_delivered.inc();
                info!(
                    run_id = %run.run_id,
                    document_id = document.id(),
                    sink = self.sink.name(),
                    "document delivered"
                );
                DocumentOutcome::Delivered
            }
            Err(error) => {
                self.metrics.delivery_failures.inc();
                warn!(
                    run_id = %run.run_id,
                    document_id = document.id(),
                    sink = self.sink.name(),
                    %error,
                    "document delivery failed, continuing with next document"
                );
                DocumentOutcome::Failed(DeliveryFailure {
                    document_id: document.id().to_string(),
                    error: error.to_string(),
                })
            }
        }
    }

    async fn deliver(&self, document: &Document) -> Result<(), DeliveryError> {
        let timer = self.metrics.delivery_duration.start_timer();
        let outcome = timeout(self.settings.delivery_timeout, self.sink.deliver(document)).await;
        timer.observe_duration();

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(error)) => Err(DeliveryError::Sink(error)),
            Err(_) => Err(DeliveryError::Timeout(self.settings.delivery_timeout)),
        }
    }
}

impl PipelineBuilder {
    #[must_use]
    pub fn with_content_source(mut self, source: Arc<dyn ContentSource>) -> Self {
        self.source = Some(source);
        self
    }

    #[must_use]
    pub fn with_delivery_sink(mut self, sink: Arc<dyn DeliverySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    #[must_use]
    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// # Errors
    /// コンテンツソースか配送先が未設定の場合、またはメトリクスの登録に失敗した場合はエラーを返す。
    pub fn build(self) -> Result<PipelineOrchestrator> {
        let source = self
            .source
            .ok_or_else(|| anyhow!("content source must be configured before build"))?;
        let sink = self
            .sink
            .ok_or_else(|| anyhow!("delivery sink must be configured before build"))?;
        let metrics = match self.metrics {
            Some(metrics) => metrics,
            None => Arc::new(Metrics::standalone()?),
        };

        Ok(PipelineOrchestrator {
            source,
            sink,
            scorer: RelevanceScorer::new(),
            settings: self.settings,
            metrics,
        })
    }
}
