//! Withdrawal handlers
//!
//! Every route authenticates the bearer token first; the processing route
//! then hands the session to the orchestrator, which runs the live-token
//! guard itself.

use crate::api::AppState;
use crate::auth::{bearer_token, CallerIdentity, Session};
use crate::error::{AuthError, WithdrawalError, WithdrawalResult};
use crate::withdrawals::types::{
    NewWithdrawal, ProcessOutcome, WalletSummary, WithdrawalRequest,
};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

/// Optional companion header carrying the caller's refresh token
pub const REFRESH_TOKEN_HEADER: &str = "x-refresh-token";

#[derive(Debug, Deserialize)]
struct ProcessWithdrawalBody {
    withdrawal_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
struct CreateWithdrawalBody {
    amount: i64,
    destination_phone: String,
    #[serde(default)]
    destination_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: Uuid,
}

fn session_from_headers(headers: &HeaderMap) -> WithdrawalResult<Session> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    let session = Session::from_bearer(bearer_token(value)?);

    Ok(
        match headers
            .get(REFRESH_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.trim().is_empty())
        {
            Some(refresh) => session.with_refresh_token(refresh.trim()),
            None => session,
        },
    )
}

async fn caller(state: &AppState, headers: &HeaderMap) -> WithdrawalResult<CallerIdentity> {
    let session = session_from_headers(headers)?;
    state.orchestrator.authorize(&session).await
}

fn parse_body<T: serde::de::DeserializeOwned>(body: &Bytes) -> WithdrawalResult<T> {
    serde_json::from_slice(body)
        .map_err(|_| WithdrawalError::Validation("Invalid request body".to_string()))
}

/// POST /process-withdrawal
pub async fn process_withdrawal(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> WithdrawalResult<Json<ProcessOutcome>> {
    let session = session_from_headers(&headers)?;

    let withdrawal_id = parse_body::<ProcessWithdrawalBody>(&body)?
        .withdrawal_id
        .ok_or_else(|| WithdrawalError::Validation("withdrawal_id is required".to_string()))?;

    let outcome = state.orchestrator.process(withdrawal_id, &session).await?;
    Ok(Json(outcome))
}

/// POST /businesses/:business_id/withdrawals
pub async fn create_withdrawal(
    State(state): State<AppState>,
    Path(business_id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> WithdrawalResult<(StatusCode, Json<CreatedResponse>)> {
    let caller = caller(&state, &headers).await?;
    let body: CreateWithdrawalBody = parse_body(&body)?;

    let id = state
        .orchestrator
        .store()
        .create_withdrawal(
            caller.user_id,
            NewWithdrawal {
                business_id,
                amount: body.amount,
                destination_phone: body.destination_phone,
                destination_name: body.destination_name,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

/// GET /businesses/:business_id/withdrawals
pub async fn list_withdrawals(
    State(state): State<AppState>,
    Path(business_id): Path<Uuid>,
    headers: HeaderMap,
) -> WithdrawalResult<Json<Vec<WithdrawalRequest>>> {
    let caller = caller(&state, &headers).await?;
    let rows = state
        .orchestrator
        .store()
        .list_withdrawals(caller.user_id, business_id)
        .await?;
    Ok(Json(rows))
}

/// GET /businesses/:business_id/wallet
pub async fn wallet_summary(
    State(state): State<AppState>,
    Path(business_id): Path<Uuid>,
    headers: HeaderMap,
) -> WithdrawalResult<Json<WalletSummary>> {
    let caller = caller(&state, &headers).await?;
    let summary = state
        .orchestrator
        .store()
        .wallet_summary(caller.user_id, business_id)
        .await?;
    Ok(Json(summary))
}

/// POST /withdrawals/:withdrawal_id/cancel
pub async fn cancel_withdrawal(
    State(state): State<AppState>,
    Path(withdrawal_id): Path<Uuid>,
    headers: HeaderMap,
) -> WithdrawalResult<Json<Value>> {
    let caller = caller(&state, &headers).await?;
    state
        .orchestrator
        .store()
        .cancel_withdrawal(caller.user_id, withdrawal_id)
        .await?;

    info!("Withdrawal {} canceled by owner", withdrawal_id);
    Ok(Json(json!({ "success": true, "withdrawal_id": withdrawal_id })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_session_requires_authorization_header() {
        let headers = HeaderMap::new();
        let err = session_from_headers(&headers).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_session_reads_refresh_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer a.b.c"));
        headers.insert(REFRESH_TOKEN_HEADER, HeaderValue::from_static("refresh-1"));

        let session = session_from_headers(&headers).unwrap();
        assert_eq!(session.access_token, "a.b.c");
        assert_eq!(session.refresh_token.as_deref(), Some("refresh-1"));
    }

    #[test]
    fn test_malformed_body_is_validation_error() {
        let err = parse_body::<ProcessWithdrawalBody>(&Bytes::from_static(b"{not json"))
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let parsed = parse_body::<ProcessWithdrawalBody>(&Bytes::from_static(b"{}")).unwrap();
        assert!(parsed.withdrawal_id.is_none());
    }
}
