use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::api::AppState;

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub environment: String,
    pub gateway_environment: String,
    /// `None` when the service runs without a database
    pub database_reachable: Option<bool>,
}

pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, StatusCode> {
    let version = env!("CARGO_PKG_VERSION").to_string();

    #[cfg(feature = "database")]
    let database_reachable = match &state.db_pool {
        Some(pool) => Some(crate::database::health_check(pool).await.is_ok()),
        None => None,
    };
    #[cfg(not(feature = "database"))]
    let database_reachable = None;

    let status = if database_reachable == Some(false) {
        "degraded"
    } else {
        "healthy"
    };

    let response = HealthResponse {
        status: status.to_string(),
        version,
        environment: state.environment.clone(),
        gateway_environment: state.gateway_environment.as_str().to_string(),
        database_reachable,
    };

    Ok(Json(response))
}
