use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    routing::get,
};

use gomeetup_core::EventId;
use gomeetup_events::{EventRecord, NewEvent};

use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::CallerContext;

pub fn router() -> Router {
    Router::new()
        .route("/events", get(list_events).post(create_event))
        .route("/events/:id", get(get_event).delete(delete_event))
}

fn parse_event_id(raw: &str) -> Result<EventId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::invalid_request("Invalid event id"))
}

async fn list_events(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
) -> Result<Json<Vec<EventRecord>>, ApiError> {
    authz::require(&caller, "events", "read")?;
    Ok(Json(services.events.list().await?))
}

async fn get_event(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> Result<Json<EventRecord>, ApiError> {
    authz::require(&caller, "events", "read")?;
    let id = parse_event_id(&id)?;

    services
        .events
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Event not found"))
}

async fn create_event(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    body: Result<Json<NewEvent>, JsonRejection>,
) -> Result<Json<EventRecord>, ApiError> {
    authz::require(&caller, "events", "create")?;
    let Json(new_event) = body.map_err(|e| ApiError::invalid_request(e.body_text()))?;

    let record = new_event.into_record(EventId::new())?;
    let stored = services.events.insert(record).await?;

    tracing::info!(event_id = %stored.id, created_by = %caller.user_id(), "event created");
    Ok(Json(stored))
}

async fn delete_event(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> Result<Json<EventRecord>, ApiError> {
    authz::require(&caller, "events", "delete")?;
    let id = parse_event_id(&id)?;

    let removed = services
        .events
        .remove(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Event not found"))?;

    tracing::info!(event_id = %removed.id, deleted_by = %caller.user_id(), "event deleted");
    Ok(Json(removed))
}
