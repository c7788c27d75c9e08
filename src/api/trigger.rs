use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    app::AppState,
    scheduler::{RunContext, Trigger},
};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TriggerParams {
    #[serde(default)]
    topic: Option<String>,
}

#[derive(Debug, Serialize)]
struct TriggerResponse {
    run_id: Uuid,
    topic: String,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// 取り込みを非同期で開始し、完了を待たずに 202 を返す。
pub(crate) async fn trigger_ingestion(
    State(state): State<AppState>,
    Query(params): Query<TriggerParams>,
) -> impl IntoResponse {
    let topic = resolve_topic(params.topic, state.config().default_topic());
    state.telemetry().record_manual_trigger_invocation(&topic);

    let Some(permit) = state.scheduler().try_reserve(&topic) else {
        let body = Json(ErrorResponse {
            error: format!("an ingestion run for topic `{topic}` is already in progress"),
        });
        return (StatusCode::CONFLICT, body).into_response();
    };

    let run_id = Uuid::new_v4();
    let context = RunContext::new(run_id, topic.clone(), Trigger::Manual);
    let scheduler = state.scheduler().clone();

    tokio::spawn(async move {
        let result = scheduler.run(context, permit).await;
        debug!(%run_id, status = ?result.status, "manual ingestion run finished");
    });

    info!(%run_id, topic = %topic, "manual ingestion run accepted");

    let body = Json(TriggerResponse {
        run_id,
        topic,
        status: "accepted",
    });
    (StatusCode::ACCEPTED, body).into_response()
}

/// 未指定・空白のみのトピックは既定トピックに置き換える。
fn resolve_topic(requested: Option<String>, default_topic: &str) -> String {
    requested
        .map(|topic| topic.trim().to_string())
        .filter(|topic| !topic.is_empty())
        .unwrap_or_else(|| default_topic.to_string())
}
