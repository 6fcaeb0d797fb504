use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::{
    auth::password,
    crud,
    error::{AppError, AppResult},
    mail,
    schema::HR_ACCOUNTS,
    state::AppState,
};

const INVALID_CREDENTIALS: &str = "invalid credentials";

#[derive(Deserialize)]
pub struct DeleteAccountRequest {
    pub password: String,
}

#[derive(Deserialize)]
pub struct RecoveryRequest {
    pub email: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            crud::lister(&HR_ACCOUNTS).merge(crud::creator(&HR_ACCOUNTS)),
        )
        .route("/recovery", post(send_recovery_email))
        .route(
            "/:id",
            crud::updater(&HR_ACCOUNTS).delete(delete_account),
        )
}

pub async fn delete_account(
    State(state): State<AppState>,
    Path(account_id): Path<i64>,
    Json(payload): Json<DeleteAccountRequest>,
) -> AppResult<Json<Value>> {
    let account = state
        .store
        .find(&HR_ACCOUNTS, account_id)
        .await
        .map_err(|err| AppError::server("failed to load HR account", err))?
        .ok_or_else(|| AppError::not_found("account not found"))?;

    let stored_hash = account
        .get("password")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::bad_request(INVALID_CREDENTIALS))?;

    let valid = password::verify(payload.password, stored_hash.to_string())
        .await
        .map_err(|_| AppError::bad_request(INVALID_CREDENTIALS))?;
    if !valid {
        warn!(account_id, "HR account deletion rejected: password mismatch");
        return Err(AppError::bad_request(INVALID_CREDENTIALS));
    }

    crud::remove(&state, &HR_ACCOUNTS, account_id).await
}

pub async fn send_recovery_email(
    State(state): State<AppState>,
    Json(payload): Json<RecoveryRequest>,
) -> AppResult<Json<Value>> {
    let email = payload.email.trim();
    if !mail::is_valid_address(email) {
        return Err(AppError::bad_request("email must be a valid address"));
    }

    let message = mail::recovery_mail(email, &state.config.recovery_url);
    state
        .mailer
        .send(message)
        .await
        .map_err(|err| AppError::server("failed to send recovery email", err))?;

    info!(%email, "recovery email dispatched");
    Ok(Json(json!({ "message": "Recovery email sent" })))
}
