//! HTTP Idempotency-Keyヘッダーのヘルパー機能。
//!
//! 下流サービスはドキュメントの `id` をキーに重複配送を吸収する。

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

/// Idempotency-Keyヘッダーの名前。
pub(crate) const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// ドキュメントIDを Idempotency-Key とするヘッダーマップを構築する。
///
/// ヘッダー値として不正な文字を含むIDの場合は空のマップを返す。
pub(crate) fn build_idempotent_headers(document_id: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();

    if let Ok(value) = HeaderValue::from_str(document_id)
        && let Ok(name) = HeaderName::from_bytes(IDEMPOTENCY_KEY_HEADER.as_bytes())
    {
        headers.insert(name, value);
    }

    headers
}
