use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::ApiError;
use crate::handlers::session_middleware::ApiJson;
use crate::utils::validation::is_valid_phone;
use crate::AppState;

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct OpenRequest {
    /// When given, the join link is sent to this number by SMS.
    pub phone: Option<String>,
}

#[derive(Deserialize)]
pub struct ChatRequest {
    pub text: String,
}

#[derive(Deserialize)]
pub struct MediaReport {
    pub granted: bool,
}

pub async fn open(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<OpenRequest>,
) -> Json<Value> {
    let room = state.rooms.open();
    tracing::info!(room_id = %room.id(), "Consultation opened");

    let mut link_sent = false;
    if let Some(phone) = request.phone.as_deref().map(str::trim).filter(|p| is_valid_phone(p)) {
        let link = format!("{}/consultation/{}", state.config.frontend_url.trim_end_matches('/'), room.id());
        let meeting_id: String = room.id().chars().take(8).collect();
        link_sent = state.sms.send_consultation_link(phone, &link, &meeting_id).await;
    }

    let mut body = json!(room.snapshot().await);
    body["link_sent"] = json!(link_sent);
    Json(body)
}

pub async fn get_room(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let room = state.rooms.get(&id)?;
    Ok(Json(json!(room.snapshot().await)))
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<ChatRequest>,
) -> Result<Json<Value>, ApiError> {
    let room = state.rooms.get(&id)?;
    let message = room.send_message(&request.text).await?;
    Ok(Json(json!(message)))
}

pub async fn toggle_audio(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let enabled = state.rooms.get(&id)?.toggle_audio().await?;
    Ok(Json(json!({ "audio_enabled": enabled })))
}

pub async fn toggle_video(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let enabled = state.rooms.get(&id)?.toggle_video().await?;
    Ok(Json(json!({ "video_enabled": enabled })))
}

pub async fn report_media(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ApiJson(report): ApiJson<MediaReport>,
) -> Result<Json<Value>, ApiError> {
    let room = state.rooms.get(&id)?;
    room.report_media_access(report.granted).await?;
    Ok(Json(json!(room.snapshot().await)))
}

pub async fn end(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let duration = state.rooms.end(&id).await?;
    Ok(Json(json!({ "status": "ended", "duration": duration })))
}
