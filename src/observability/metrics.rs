//! Prometheusメトリクス定義。

use prometheus::{
    Counter, Gauge, Histogram, Registry, register_counter_with_registry,
    register_gauge_with_registry, register_histogram_with_registry,
};

/// メトリクスコレクター。
#[derive(Debug, Clone)]
pub struct Metrics {
    // 実行単位のカウンター
    pub runs_started: Counter,
    pub runs_completed: Counter,
    pub runs_fetch_failed: Counter,
    pub runs_skipped: Counter,

    // ドキュメント単位のカウンター
    pub documents_fetched: Counter,
    pub documents_relevant: Counter,
    pub documents_delivered: Counter,
    pub delivery_failures: Counter,

    // ヒストグラム
    pub fetch_duration: Histogram,
    pub delivery_duration: Histogram,
    pub run_duration: Histogram,

    // ゲージ
    pub active_runs: Gauge,
}

impl Metrics {
    /// 新しいメトリクスコレクターを作成する。
    ///
    /// # Errors
    /// 同じレジストリに同名のメトリクスが登録済みの場合はエラーを返す。
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        Ok(Self {
            runs_started: register_counter_with_registry!(
                "ingest_runs_started_total",
                "Total number of pipeline runs started",
                registry
            )?,
            runs_completed: register_counter_with_registry!(
                "ingest_runs_completed_total",
                "Total number of pipeline runs that processed every fetched document",
                registry
            )?,
            runs_fetch_failed: register_counter_with_registry!(
                "ingest_runs_fetch_failed_total",
                "Total number of pipeline runs aborted by a content source failure",
                registry
            )?,
            runs_skipped: register_counter_with_registry!(
                "ingest_runs_skipped_total",
                "Runs rejected because the same topic was already running",
                registry
            )?,
            documents_fetched: register_counter_with_registry!(
                "ingest_documents_fetched_total",
                "Total number of documents returned by the content source",
                registry
            )?,
            documents_relevant: register_counter_with_registry!(
                "ingest_documents_relevant_total",
                "Total number of documents at or above the relevance threshold",
                registry
            )?,
            documents_delivered: register_counter_with_registry!(
                "ingest_documents_delivered_total",
                "Total number of documents accepted by the delivery sink",
                registry
            )?,
            delivery_failures: register_counter_with_registry!(
                "ingest_delivery_failures_total",
                "Total number of documents the delivery sink failed to accept",
                registry
            )?,
            fetch_duration: register_histogram_with_registry!(
                "ingest_fetch_duration_seconds",
                "Duration of content source fetches",
                registry
            )?,
            delivery_duration: register_histogram_with_registry!(
                "ingest_delivery_duration_seconds",
                "Duration of single document deliveries",
                registry
            )?,
            run_duration: register_histogram_with_registry!(
                "ingest_run_duration_seconds",
                "Duration of entire pipeline runs",
                registry
            )?,
            active_runs: register_gauge_with_registry!(
                "ingest_active_runs",
                "Number of currently executing pipeline runs",
                registry
            )?,
        })
    }

    /// 独立したレジストリに登録したメトリクスを作る。テストや単体利用向け。
    ///
    /// # Errors
    /// メトリクスの登録に失敗した場合はエラーを返す。
    pub fn standalone() -> Result<Self, prometheus::Error> {
        Self::new(&Registry::new())
    }
}
