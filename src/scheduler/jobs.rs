use std::{fmt, sync::Arc};

use tracing::warn;
use uuid::Uuid;

use super::lock::{RunPermit, TopicLocks};
use crate::{
    config::OverlapPolicy,
    observability::metrics::Metrics,
    pipeline::{PipelineOrchestrator, RunResult},
};

/// 実行を開始したきっかけ。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Manual,
    Scheduled,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manual => f.write_str("manual"),
            Self::Scheduled => f.write_str("scheduled"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    pub topic: String,
    pub trigger: Trigger,
}

impl RunContext {
    #[must_use]
    pub fn new(run_id: Uuid, topic: impl Into<String>, trigger: Trigger) -> Self {
        Self {
            run_id,
            topic: topic.into(),
            trigger,
        }
    }
}

/// 手動トリガーと定期実行の両方から使われる実行窓口。
#[derive(Clone)]
pub struct Scheduler {
    pipeline: Arc<PipelineOrchestrator>,
    locks: TopicLocks,
    metrics: Arc<Metrics>,
}

impl Scheduler {
    #[must_use]
    pub fn new(
        pipeline: Arc<PipelineOrchestrator>,
        overlap_policy: OverlapPolicy,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            pipeline,
            locks: TopicLocks::new(overlap_policy),
            metrics,
        }
    }

    /// トピックの実行枠を確保する。重複を許さない設定で実行中なら `None`。
    #[must_use]
    pub fn try_reserve(&self, topic: &str) -> Option<RunPermit> {
        let permit = self.locks.try_acquire(topic);
        if permit.is_none() {
            self.metrics.runs_skipped.inc();
            warn!(topic, "run for topic already in progress, skipping");
        }
        permit
    }

    /// 確保済みの枠で実行する。枠は実行終了時に解放される。
    pub async fn run(&self, context: RunContext, permit: RunPermit) -> RunResult {
        let result = self.pipeline.run(&context).await;
        drop(permit);
        result
    }

    /// 枠の確保から実行までをまとめて行う。確保できなければ `None`。
    pub async fn run_now(&self, context: RunContext) -> Option<RunResult> {
        let permit = self.try_reserve(&context.topic)?;
        Some(self.run(context, permit).await)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;
    use crate::pipeline::{ContentSource, DeliverySink, Document};

    /// `release` が通知されるまで fetch を止めておくソース。
    struct GatedSource {
        calls: AtomicUsize,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl ContentSource for GatedSource {
        async fn fetch(&self, _topic: &str) -> anyhow::Result<Vec<Document>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.entered.notify_one();
            self.release.notified().await;
            Ok(Vec::new())
        }
    }

    struct NullSink;

    #[async_trait]
    impl DeliverySink for NullSink {
        fn name(&self) -> &'static str {
            "null"
        }

        async fn deliver(&self, _document: &Document) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn scheduler(policy: OverlapPolicy) -> (Scheduler, Arc<GatedSource>, Arc<Metrics>) {
        let source = Arc::new(GatedSource {
            calls: AtomicUsize::new(0),
            entered: Notify::new(),
            release: Notify::new(),
        });
        let metrics = Arc::new(Metrics::standalone().expect("metrics"));
        let pipeline = PipelineOrchestrator::builder()
            .with_content_source(Arc::clone(&source) as Arc<dyn ContentSource>)
            .with_delivery_sink(Arc::new(NullSink))
            .with_metrics(Arc::clone(&metrics))
            .build()
            .expect("pipeline builds");
        (
            Scheduler::new(Arc::new(pipeline), policy, Arc::clone(&metrics)),
            source,
            metrics,
        )
    }

    #[test]
    fn trigger_displays_lowercase() {
        assert_eq!(Trigger::Manual.to_string(), "manual");
        assert_eq!(Trigger::Scheduled.to_string(), "scheduled");
    }

    #[tokio::test]
    async fn skip_policy_rejects_overlapping_run_for_same_topic() {
        let (scheduler, source, metrics) = scheduler(OverlapPolicy::Skip);

        let first = scheduler.clone();
        let running = tokio::spawn(async move {
            first
                .run_now(RunContext::new(Uuid::new_v4(), "science", Trigger::Scheduled))
                .await
        });
        source.entered.notified().await;

        assert!(scheduler.try_reserve("science").is_none());
        assert!(scheduler.try_reserve("politics").is_some());
        assert!((metrics.runs_skipped.get() - 1.0).abs() < f64::EPSILON);

        source.release.notify_one();
        let result = running.await.expect("task joins").expect("run executed");
        assert!(result.is_completed());

        assert!(scheduler.try_reserve("science").is_some());
    }

    #[tokio::test]
    async fn allow_policy_permits_overlapping_runs() {
        let (scheduler, source, _metrics) = scheduler(OverlapPolicy::Allow);

        let first = scheduler.clone();
        let running = tokio::spawn(async move {
            first
                .run_now(RunContext::new(Uuid::new_v4(), "science", Trigger::Manual))
                .await
        });
        source.entered.notified().await;

        assert!(scheduler.try_reserve("science").is_some());

        source.release.notify_one();
        running.await.expect("task joins").expect("run executed");
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }
}
