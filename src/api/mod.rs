use axum::Json;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::routing::post;
use axum::{Router, extract::State, http::StatusCode, routing::get};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::PushSubscription;
use crate::services::{SchedulerState, TickReport};
use crate::state::AppState;

/// Header the upstream authentication layer sets to the caller's user id.
pub const USER_ID_HEADER: &str = "x-user-id";

pub struct CallerId(pub String);

impl<S: Send + Sync> FromRequestParts<S> for CallerId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| CallerId(v.to_string()))
            .ok_or(AppError::Unauthorized)
    }
}

#[derive(Deserialize)]
struct SubscribeRequest {
    subscription: PushSubscription,
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    success: bool,
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SchedulerStatus {
    state: SchedulerState,
    tick_period_secs: u64,
    window_secs: u64,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/reminders/subscribe", post(subscribe_push))
        .route("/reminders/unsubscribe", post(unsubscribe_push))
        .route("/scheduler", get(scheduler_status))
        .route("/scheduler/run", post(run_scheduler_now))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}

async fn subscribe_push(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Json(req): Json<SubscribeRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state.subscriptions.set(&user_id, &req.subscription).await?;
    Ok(Json(MessageResponse {
        success: true,
        message: "Successfully subscribed to push notifications".to_string(),
    }))
}

async fn unsubscribe_push(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
) -> Result<Json<MessageResponse>, AppError> {
    state.subscriptions.unset(&user_id).await?;
    Ok(Json(MessageResponse {
        success: true,
        message: "Successfully unsubscribed from push notifications".to_string(),
    }))
}

async fn scheduler_status(State(state): State<AppState>) -> Json<SchedulerStatus> {
    let config = state.scheduler.config();
    Json(SchedulerStatus {
        state: state.scheduler.state(),
        tick_period_secs: config.tick_period.as_secs(),
        window_secs: config.look_ahead.as_secs(),
    })
}

async fn run_scheduler_now(State(state): State<AppState>) -> Json<TickReport> {
    Json(state.scheduler.tick().await)
}
