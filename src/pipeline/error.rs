use std::time::Duration;

use thiserror::Error;

/// コンテンツソースから取得できなかった。その実行だけを中断する。
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("content source failed: {0:#}")]
    Source(#[source] anyhow::Error),
    #[error("content source timed out after {0:?}")]
    Timeout(Duration),
}

/// 1 件のドキュメントを配送できなかった。実行は継続する。
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("delivery sink failed: {0:#}")]
    Sink(#[source] anyhow::Error),
    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),
}
