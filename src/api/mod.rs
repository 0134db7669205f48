//! HTTP surface

pub mod health;
pub mod withdrawals;

use crate::payments::types::GatewayEnvironment;
use crate::withdrawals::WithdrawalOrchestrator;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<WithdrawalOrchestrator>,
    pub environment: String,
    pub gateway_environment: GatewayEnvironment,
    #[cfg(feature = "database")]
    pub db_pool: Option<sqlx::PgPool>,
}

impl AppState {
    pub fn new(
        orchestrator: Arc<WithdrawalOrchestrator>,
        environment: impl Into<String>,
        gateway_environment: GatewayEnvironment,
    ) -> Self {
        Self {
            orchestrator,
            environment: environment.into(),
            gateway_environment,
            #[cfg(feature = "database")]
            db_pool: None,
        }
    }

    #[cfg(feature = "database")]
    pub fn with_db_pool(mut self, pool: sqlx::PgPool) -> Self {
        self.db_pool = Some(pool);
        self
    }
}

/// The web app calls these routes directly from the browser
fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static("apikey"),
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static(withdrawals::REFRESH_TOKEN_HEADER),
        ])
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/process-withdrawal", post(withdrawals::process_withdrawal))
        .route(
            "/businesses/:business_id/withdrawals",
            post(withdrawals::create_withdrawal).get(withdrawals::list_withdrawals),
        )
        .route(
            "/businesses/:business_id/wallet",
            get(withdrawals::wallet_summary),
        )
        .route(
            "/withdrawals/:withdrawal_id/cancel",
            post(withdrawals::cancel_withdrawal),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors())
        .with_state(state)
}
