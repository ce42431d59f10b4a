use {
    crate::{
        AppState,
        adapters::api_errors::ApiError,
        domain::{
            error::OutboxError,
            event::{CURRENT_VERSION, Event},
            id::EntryId,
            outbox::OutboxLog,
        },
        infra::postgres::outbox_repo::OutboxStats,
    },
    axum::{Json, extract::State, http::StatusCode},
    serde::{Deserialize, Serialize},
};

#[derive(Debug, Deserialize)]
pub struct AppendRequest {
    pub action: String,
    #[serde(default = "current_version")]
    pub version: i32,
    pub payload: serde_json::Value,
}

fn current_version() -> i32 {
    CURRENT_VERSION
}

#[derive(Debug, Serialize)]
pub struct AppendResponse {
    pub id: EntryId,
}

#[derive(Debug, Deserialize)]
pub struct CompactRequest {
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct CompactResponse {
    pub deleted: u64,
}

/// Record one replayable mutation and wake the dispatcher.
///
/// The payload is decoded up front: an entry this build cannot replay would
/// block everything queued behind it.
pub async fn append_event(
    State(state): State<AppState>,
    Json(req): Json<AppendRequest>,
) -> Result<(StatusCode, Json<AppendResponse>), ApiError> {
    let payload = serde_json::to_vec(&req.payload)?;
    let action = Event::decode(&req.action, req.version, &payload)?.action();

    let id = state
        .broker
        .mutate(|store| store.publish(action, req.version, &payload))
        .await?;

    tracing::info!(entry_id = %id, %action, "outbox entry appended");
    Ok((StatusCode::CREATED, Json(AppendResponse { id })))
}

pub async fn outbox_stats(State(state): State<AppState>) -> Result<Json<OutboxStats>, ApiError> {
    let stats = state.broker.read(|store| store.stats()).await?;
    Ok(Json(stats))
}

/// Drop the oldest `count` entries. The only way to get past an entry that
/// will never apply.
pub async fn compact(
    State(state): State<AppState>,
    Json(req): Json<CompactRequest>,
) -> Result<Json<CompactResponse>, ApiError> {
    if req.count < 1 {
        return Err(OutboxError::Validation("count must be at least 1".into()).into());
    }

    let deleted = state
        .broker
        .mutate(|store| store.clean_log(req.count))
        .await?;

    tracing::warn!(requested = req.count, deleted, "outbox compacted");
    Ok(Json(CompactResponse { deleted }))
}
