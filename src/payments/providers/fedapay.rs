//! FedaPay payout provider implementation
//!
//! Mobile-money payouts across the West African markets FedaPay serves.
//! A payout is created first, then started; both calls are authenticated
//! with the account secret key.

use crate::payments::error::{PayoutError, PayoutResult};
use crate::payments::traits::PayoutGateway;
use crate::payments::types::{
    CountryCode, CreatedPayout, GatewayEnvironment, PayoutModeConfig, StartedPayout,
};
use crate::withdrawals::types::WithdrawalSnapshot;
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{error, info, warn};

const CREATE_FALLBACK_MESSAGE: &str = "Payout creation failed";
const START_FALLBACK_MESSAGE: &str = "Payout start failed";
const MAX_BACKOFF_SECS: u64 = 30;

/// FedaPay provider configuration
#[derive(Clone)]
pub struct FedaPayConfig {
    /// FedaPay API secret key
    pub secret_key: String,
    /// API base URL, derived from the environment unless overridden
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Retries on HTTP 429 only
    pub max_retries: u32,
    /// ISO code of the payout currency
    pub currency: String,
    pub payout_modes: PayoutModeConfig,
}

impl std::fmt::Debug for FedaPayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FedaPayConfig")
            .field("secret_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("currency", &self.currency)
            .field("payout_modes", &self.payout_modes)
            .finish()
    }
}

impl FedaPayConfig {
    pub fn new(secret_key: impl Into<String>, environment: GatewayEnvironment) -> Self {
        Self {
            secret_key: secret_key.into(),
            base_url: environment.default_base_url().to_string(),
            timeout_secs: 30,
            max_retries: 2,
            currency: "XOF".to_string(),
            payout_modes: PayoutModeConfig::new(environment),
        }
    }

    /// Create config from environment variables
    pub fn from_env() -> PayoutResult<Self> {
        let secret_key = std::env::var("FEDAPAY_SECRET_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                PayoutError::configuration("FEDAPAY_SECRET_KEY environment variable is required")
            })?;

        let environment = GatewayEnvironment::parse(
            &std::env::var("FEDAPAY_ENVIRONMENT").unwrap_or_else(|_| "sandbox".to_string()),
        );

        let base_url = std::env::var("FEDAPAY_BASE_URL")
            .unwrap_or_else(|_| environment.default_base_url().to_string());

        let timeout_secs = std::env::var("FEDAPAY_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        let max_retries = std::env::var("FEDAPAY_MAX_RETRIES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(2);

        let currency = std::env::var("FEDAPAY_CURRENCY").unwrap_or_else(|_| "XOF".to_string());

        Ok(Self {
            secret_key,
            base_url,
            timeout_secs,
            max_retries,
            currency,
            payout_modes: PayoutModeConfig::from_env(environment),
        })
    }

    pub fn environment(&self) -> GatewayEnvironment {
        self.payout_modes.environment
    }
}

/// FedaPay payout provider
pub struct FedaPayProvider {
    config: FedaPayConfig,
    client: Client,
}

impl FedaPayProvider {
    /// Create a new FedaPay provider instance
    pub fn new(config: FedaPayConfig) -> PayoutResult<Self> {
        if config.secret_key.trim().is_empty() {
            return Err(PayoutError::configuration("FedaPay secret key is empty"));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("MoneyMaker-Backend/1.0")
            .build()
            .map_err(|e| {
                PayoutError::configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        info!(
            "FedaPay provider initialized for {} environment with URL: {}",
            config.environment(),
            config.base_url
        );

        Ok(Self { config, client })
    }

    /// Create provider from environment variables
    pub fn from_env() -> PayoutResult<Self> {
        Self::new(FedaPayConfig::from_env()?)
    }

    pub fn config(&self) -> &FedaPayConfig {
        &self.config
    }

    /// Make an authenticated request to the FedaPay API.
    ///
    /// Only rate limiting is retried: any other failure may already have
    /// moved money and must go back to the caller.
    async fn make_request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        endpoint: &str,
        body: &B,
        fallback_message: &str,
    ) -> PayoutResult<Value> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint);

        for attempt in 0..=self.config.max_retries {
            let response = self
                .client
                .request(method.clone(), &url)
                .header("Authorization", format!("Bearer {}", self.config.secret_key))
                .header("Content-Type", "application/json")
                .json(body)
                .send()
                .await
                .map_err(|e| self.transport_error(e))?;

            let status = response.status();
            let response_text = response.text().await.map_err(|e| self.transport_error(e))?;
            let payload: Value = serde_json::from_str(&response_text).unwrap_or(Value::Null);

            if status.is_success() {
                return Ok(payload);
            }

            if status.as_u16() == 429 {
                if attempt < self.config.max_retries {
                    let backoff = retry_backoff(attempt);
                    warn!(
                        "FedaPay rate limited, retrying after {:?} (attempt {})",
                        backoff,
                        attempt + 1
                    );
                    tokio::time::sleep(backoff).await;
                    continue;
                }
                return Err(PayoutError::RateLimited);
            }

            let message = extract_api_error_message(&payload, fallback_message);
            error!(
                "FedaPay API error: endpoint={} status={} message={}",
                endpoint, status, message
            );
            return Err(PayoutError::rejected(status.as_u16(), message));
        }

        Err(PayoutError::RateLimited)
    }

    fn transport_error(&self, err: reqwest::Error) -> PayoutError {
        if err.is_timeout() {
            PayoutError::Timeout {
                seconds: self.config.timeout_secs,
            }
        } else {
            PayoutError::from(err)
        }
    }
}

#[async_trait]
impl PayoutGateway for FedaPayProvider {
    async fn create_payout(&self, snapshot: &WithdrawalSnapshot) -> PayoutResult<CreatedPayout> {
        let country = CountryCode::from_phone(&snapshot.destination_phone);
        let mode = self.config.payout_modes.resolve(country)?;
        let (firstname, lastname) = split_customer_name(snapshot);

        let payload = CreatePayoutPayload {
            amount: snapshot.amount,
            mode: &mode,
            currency: Currency {
                iso: &self.config.currency,
            },
            description: format!("MoneyMaker withdrawal - {}", snapshot.business_name),
            customer: Customer {
                firstname,
                lastname,
                phone_number: PhoneNumber {
                    number: &snapshot.destination_phone,
                    country: country.as_str(),
                },
            },
            merchant_reference: snapshot.merchant_reference(),
        };

        info!(
            "Creating FedaPay payout: withdrawal_id={} amount={} country={} mode={}",
            snapshot.withdrawal_id, snapshot.amount, country, mode
        );

        let raw = self
            .make_request(Method::POST, "/payouts", &payload, CREATE_FALLBACK_MESSAGE)
            .await?;

        let id = extract_payout_id(&raw).ok_or(PayoutError::IdMissing)?;
        let reference = string_field(&raw, "reference");

        info!(
            "FedaPay payout created: withdrawal_id={} payout_id={}",
            snapshot.withdrawal_id, id
        );

        Ok(CreatedPayout {
            id,
            reference,
            country,
            raw,
        })
    }

    async fn start_payout(
        &self,
        payout: &CreatedPayout,
        snapshot: &WithdrawalSnapshot,
    ) -> PayoutResult<StartedPayout> {
        // The start endpoint takes a list of payouts
        let payload = [StartPayoutItem {
            id: payout_id_value(&payout.id),
            phone_number: PhoneNumber {
                number: &snapshot.destination_phone,
                country: payout.country.as_str(),
            },
        }];

        let raw = self
            .make_request(Method::PUT, "/payouts/start", &payload, START_FALLBACK_MESSAGE)
            .await?;

        let reference = extract_started_reference(&raw)
            .or_else(|| payout.reference.clone())
            .unwrap_or_else(|| payout.id.clone());

        info!(
            "FedaPay payout started: withdrawal_id={} payout_id={} reference={}",
            snapshot.withdrawal_id, payout.id, reference
        );

        Ok(StartedPayout { reference, raw })
    }

    fn name(&self) -> &'static str {
        "FedaPay"
    }
}

/// Where a payout id may sit in a creation response, in lookup order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdLocation {
    TopLevel,
    Data,
    Transfer,
    V1,
    FirstPayout,
}

const PAYOUT_ID_LOCATIONS: [IdLocation; 5] = [
    IdLocation::TopLevel,
    IdLocation::Data,
    IdLocation::Transfer,
    IdLocation::V1,
    IdLocation::FirstPayout,
];

impl IdLocation {
    fn extract(&self, payload: &Value) -> Option<String> {
        let candidate = match self {
            Self::TopLevel => payload.get("id"),
            Self::Data => payload.get("data").and_then(|v| v.get("id")),
            Self::Transfer => payload.get("transfer").and_then(|v| v.get("id")),
            Self::V1 => payload.get("v1").and_then(|v| v.get("id")),
            Self::FirstPayout => payload
                .get("payouts")
                .and_then(Value::as_array)
                .and_then(|rows| rows.first())
                .and_then(|v| v.get("id")),
        };
        candidate.and_then(scalar_to_string)
    }
}

/// Where started rows may sit in a start response, in lookup order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StartedRowsLocation {
    TopLevelArray,
    Payouts,
}

const STARTED_ROWS_LOCATIONS: [StartedRowsLocation; 2] =
    [StartedRowsLocation::TopLevelArray, StartedRowsLocation::Payouts];

impl StartedRowsLocation {
    fn rows<'a>(&self, payload: &'a Value) -> Option<&'a Vec<Value>> {
        match self {
            Self::TopLevelArray => payload.as_array(),
            Self::Payouts => payload.get("payouts").and_then(Value::as_array),
        }
    }
}

fn extract_payout_id(payload: &Value) -> Option<String> {
    PAYOUT_ID_LOCATIONS
        .iter()
        .find_map(|location| location.extract(payload))
}

fn extract_started_reference(payload: &Value) -> Option<String> {
    STARTED_ROWS_LOCATIONS
        .iter()
        .find_map(|location| location.rows(payload))
        .and_then(|rows| rows.first())
        .and_then(|row| string_field(row, "reference"))
}

/// First usable message from a gateway error body: `message`, then `error`,
/// then the first entry of `errors` (a string or an object with `message`).
pub fn extract_api_error_message(payload: &Value, fallback: &str) -> String {
    let non_blank = |value: Option<&Value>| {
        value
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
    };

    if let Some(message) = non_blank(payload.get("message")) {
        return message;
    }

    if let Some(message) = non_blank(payload.get("error")) {
        return message;
    }

    if let Some(first) = payload
        .get("errors")
        .and_then(Value::as_array)
        .and_then(|errors| errors.first())
    {
        if let Some(message) = first.as_str() {
            return message.to_string();
        }
        if let Some(message) = first.get("message").and_then(Value::as_str) {
            return message.to_string();
        }
    }

    fallback.to_string()
}

/// Destination name, else business name, else "Client"; the first word is
/// the first name and the rest the last name (the first name when alone).
fn split_customer_name(snapshot: &WithdrawalSnapshot) -> (String, String) {
    let customer_name = snapshot
        .destination_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .or_else(|| Some(snapshot.business_name.trim()).filter(|name| !name.is_empty()))
        .unwrap_or("Client");

    let mut parts = customer_name.split_whitespace();
    let firstname = parts.next().unwrap_or("Client").to_string();
    let rest: Vec<&str> = parts.collect();
    let lastname = if rest.is_empty() {
        firstname.clone()
    } else {
        rest.join(" ")
    };

    (firstname, lastname)
}

/// Exponential backoff after a 429, capped
fn retry_backoff(attempt: u32) -> Duration {
    Duration::from_secs(2_u64.saturating_pow(attempt).min(MAX_BACKOFF_SECS))
}

fn payout_id_value(id: &str) -> Value {
    id.parse::<i64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::String(id.to_string()))
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn string_field(value: &Value, field: &str) -> Option<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// Create payout request body
#[derive(Debug, Serialize)]
struct CreatePayoutPayload<'a> {
    amount: i64,
    mode: &'a str,
    currency: Currency<'a>,
    description: String,
    customer: Customer<'a>,
    merchant_reference: String,
}

#[derive(Debug, Serialize)]
struct Currency<'a> {
    iso: &'a str,
}

#[derive(Debug, Serialize)]
struct Customer<'a> {
    firstname: String,
    lastname: String,
    phone_number: PhoneNumber<'a>,
}

#[derive(Debug, Serialize)]
struct PhoneNumber<'a> {
    number: &'a str,
    country: &'a str,
}

// Start payout request item
#[derive(Debug, Serialize)]
struct StartPayoutItem<'a> {
    id: Value,
    phone_number: PhoneNumber<'a>,
}
