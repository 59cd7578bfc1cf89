//! Notification endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use common::IdempotencyToken;
use messaging::NotificationRequest;
use notifications::{DeliveryRecord, DispatchOutcome};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SendEmailRequest {
    pub recipient: String,
    pub subject: Option<String>,
    pub template: String,
    #[serde(default)]
    pub data: serde_json::Value,
    /// Supplied by callers that may retry; a fresh one is generated otherwise.
    pub idempotency_token: Option<String>,
}

/// A failed send is reported here with `success: false`; the caller may
/// retry with the same token.
#[derive(Serialize)]
pub struct SendEmailResponse {
    pub success: bool,
    pub duplicate: bool,
    pub delivery: DeliveryRecord,
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub recipient: Option<String>,
}

/// POST /notifications/email: render and send one email synchronously.
#[tracing::instrument(skip(state, req), fields(template = %req.template))]
pub async fn send_email(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SendEmailRequest>,
) -> Result<Json<SendEmailResponse>, ApiError> {
    if req.recipient.trim().is_empty() {
        return Err(ApiError::BadRequest("recipient is required".to_string()));
    }
    let token = req
        .idempotency_token
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let request = NotificationRequest {
        recipient: req.recipient,
        subject: req.subject,
        template: req.template,
        data: req.data,
        idempotency_token: IdempotencyToken::new(token),
    };

    let outcome = state.notifications.dispatch(&request).await?;
    Ok(Json(SendEmailResponse {
        success: outcome.is_success(),
        duplicate: matches!(outcome, DispatchOutcome::AlreadyDelivered(_)),
        delivery: outcome.record().clone(),
    }))
}

/// GET /notifications?recipient=: delivery log, most recent first.
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<DeliveryRecord>>, ApiError> {
    Ok(Json(
        state
            .notifications
            .list_deliveries(query.recipient.as_deref())
            .await?,
    ))
}
