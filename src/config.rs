use crate::auth::client::AuthConfig;
use crate::payments::providers::fedapay::FedaPayConfig;
use anyhow::{anyhow, Context, Result};
use std::env;
use std::time::Duration;

/// Upper bound for `FEDAPAY_MAX_RETRIES`
pub const MAX_GATEWAY_RETRIES: u32 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub fedapay: FedaPayConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let server = ServerConfig {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .context("PORT not set")?
                .parse()
                .context("PORT must be a valid number")?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        };

        let database = DatabaseConfig {
            url: env::var("DATABASE_URL").context("DATABASE_URL not set")?,
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .context("DATABASE_MAX_CONNECTIONS must be a valid number")?,
        };

        let auth = AuthConfig {
            url: env::var("AUTH_URL").context("AUTH_URL not set")?,
            api_key: env::var("AUTH_API_KEY").context("AUTH_API_KEY not set")?,
            timeout: Duration::from_secs(10),
        };

        let fedapay = FedaPayConfig::from_env().context("Invalid FedaPay configuration")?;

        let config = Config {
            server,
            database,
            auth,
            fedapay,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port < 1024 {
            return Err(anyhow!(
                "Port must be at least 1024, got {}",
                self.server.port
            ));
        }

        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&self.server.environment.as_str()) {
            return Err(anyhow!(
                "Environment must be one of: {:?}, got {}",
                valid_environments,
                self.server.environment
            ));
        }

        if self.database.url.trim().is_empty() {
            return Err(anyhow!("DATABASE_URL cannot be empty"));
        }

        if self.database.max_connections == 0 {
            return Err(anyhow!("DATABASE_MAX_CONNECTIONS must be greater than 0"));
        }

        if self.auth.url.trim().is_empty() {
            return Err(anyhow!("AUTH_URL cannot be empty"));
        }

        if self.auth.api_key.trim().is_empty() {
            return Err(anyhow!("AUTH_API_KEY cannot be empty"));
        }

        if self.fedapay.base_url.trim().is_empty() {
            return Err(anyhow!("FEDAPAY_BASE_URL cannot be empty"));
        }

        if self.fedapay.timeout_secs == 0 {
            return Err(anyhow!("FEDAPAY_TIMEOUT_SECS must be greater than 0"));
        }

        if self.fedapay.max_retries > MAX_GATEWAY_RETRIES {
            return Err(anyhow!(
                "FEDAPAY_MAX_RETRIES must be at most {}, got {}",
                MAX_GATEWAY_RETRIES,
                self.fedapay.max_retries
            ));
        }

        if self.fedapay.currency.trim().len() != 3 {
            return Err(anyhow!(
                "FEDAPAY_CURRENCY must be a 3-letter ISO code, got {}",
                self.fedapay.currency
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::types::GatewayEnvironment;

    fn sample() -> Config {
        Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                environment: "development".to_string(),
            },
            database: DatabaseConfig {
                url: "postgres://localhost/moneymaker".to_string(),
                max_connections: 5,
            },
            auth: AuthConfig {
                url: "http://localhost:9999/auth/v1".to_string(),
                api_key: "anon".to_string(),
                timeout: Duration::from_secs(5),
            },
            fedapay: FedaPayConfig::new("sk_sandbox_test", GatewayEnvironment::Sandbox),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_rejects_privileged_port() {
        let mut config = sample();
        config.server.port = 80;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_unknown_environment() {
        let mut config = sample();
        config.server.environment = "qa".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Environment must be one of"));
    }

    #[test]
    fn test_rejects_unbounded_retries() {
        let mut config = sample();
        config.fedapay.max_retries = MAX_GATEWAY_RETRIES;
        assert!(config.validate().is_ok());

        config.fedapay.max_retries = 64;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("FEDAPAY_MAX_RETRIES"));
    }

    #[test]
    fn test_debug_output_hides_credentials() {
        let printed = format!("{:?}", sample());
        assert!(!printed.contains("sk_sandbox_test"));
        assert!(!printed.contains("\"anon\""));
    }

    #[test]
    fn test_rejects_bad_currency() {
        let mut config = sample();
        config.fedapay.currency = "CFA franc".to_string();
        assert!(config.validate().is_err());
    }
}
