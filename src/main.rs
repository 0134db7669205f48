use moneymaker_backend::api::{self, AppState};
use moneymaker_backend::auth::{AuthApiClient, SessionGuard};
use moneymaker_backend::config::Config;
use moneymaker_backend::database::withdrawal_repository::WithdrawalRepository;
use moneymaker_backend::database::{init_pool, PoolConfig};
use moneymaker_backend::payments::providers::FedaPayProvider;
use moneymaker_backend::withdrawals::WithdrawalOrchestrator;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;

    tracing::info!("Starting MoneyMaker Backend");
    tracing::info!("Environment: {}", config.server.environment);
    tracing::info!("FedaPay environment: {}", config.fedapay.environment());

    let pool = init_pool(
        &config.database.url,
        Some(PoolConfig::from(&config.database)),
    )
    .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    let gateway_environment = config.fedapay.environment();
    let gateway = Arc::new(FedaPayProvider::new(config.fedapay.clone())?);
    let auth_client = Arc::new(AuthApiClient::new(config.auth.clone())?);
    let store = Arc::new(WithdrawalRepository::new(pool.clone()));

    let orchestrator = Arc::new(WithdrawalOrchestrator::new(
        store,
        gateway,
        auth_client.clone(),
        SessionGuard::new(auth_client),
    ));

    let state = AppState::new(orchestrator, config.server.environment.clone(), gateway_environment)
        .with_db_pool(pool);
    let app = api::router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
