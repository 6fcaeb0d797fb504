use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    crud,
    error::{AppError, AppResult},
    models::{Record, HR_SENDER},
    schema::{CONVERSATIONS, CONVERSATION_MESSAGES, MESSAGES},
    state::AppState,
};

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub message: String,
}

pub fn conversation_routes() -> Router<AppState> {
    let router = Router::new()
        .route(
            "/",
            get(list_conversations).merge(crud::creator(&CONVERSATIONS)),
        )
        .route("/:id", crud::deleter(&CONVERSATIONS));
    crud::relation_routes(router, &CONVERSATIONS)
}

pub fn message_routes() -> Router<AppState> {
    Router::new().route(
        "/conversation/:id",
        crud::related_lister(&MESSAGES, &CONVERSATION_MESSAGES).post(send_message),
    )
}

pub async fn list_conversations(State(state): State<AppState>) -> AppResult<Json<Vec<Value>>> {
    let summaries = state
        .store
        .conversation_summaries()
        .await
        .map_err(|err| AppError::server("failed to list conversations", err))?;
    Ok(Json(summaries.into_iter().map(Value::Object).collect()))
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(conversation_id): Path<i64>,
    Json(payload): Json<SendMessageRequest>,
) -> AppResult<Json<Value>> {
    if payload.message.trim().is_empty() {
        return Err(AppError::bad_request("message must not be empty"));
    }

    let mut fields = Record::new();
    fields.insert("conversation_id".to_string(), json!(conversation_id));
    fields.insert("sender".to_string(), json!(HR_SENDER));
    fields.insert("message".to_string(), json!(payload.message));

    crud::insert(&state, &MESSAGES, MESSAGES.writable_fields(&fields)).await
}
