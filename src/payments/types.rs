//! Payout gateway types
//!
//! Country and payout-mode resolution plus the normalized results of the
//! create and start calls.

use crate::payments::error::{PayoutError, PayoutResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Mobile-money countries served by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CountryCode {
    BJ,
    TG,
    CI,
    GN,
    NE,
    SN,
    ML,
    BF,
}

/// Dialing prefix table, checked in order
const DIALING_PREFIXES: [(&str, CountryCode); 8] = [
    ("+229", CountryCode::BJ),
    ("+228", CountryCode::TG),
    ("+225", CountryCode::CI),
    ("+224", CountryCode::GN),
    ("+227", CountryCode::NE),
    ("+221", CountryCode::SN),
    ("+223", CountryCode::ML),
    ("+226", CountryCode::BF),
];

impl CountryCode {
    pub const ALL: [CountryCode; 8] = [
        CountryCode::BJ,
        CountryCode::TG,
        CountryCode::CI,
        CountryCode::GN,
        CountryCode::NE,
        CountryCode::SN,
        CountryCode::ML,
        CountryCode::BF,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BJ => "BJ",
            Self::TG => "TG",
            Self::CI => "CI",
            Self::GN => "GN",
            Self::NE => "NE",
            Self::SN => "SN",
            Self::ML => "ML",
            Self::BF => "BF",
        }
    }

    /// Country of a phone number from its dialing prefix, Benin when unknown
    pub fn from_phone(phone: &str) -> Self {
        let normalized: String = phone.chars().filter(|c| !c.is_whitespace()).collect();
        DIALING_PREFIXES
            .iter()
            .find(|(prefix, _)| normalized.starts_with(prefix))
            .map(|(_, country)| *country)
            .unwrap_or(CountryCode::BJ)
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CountryCode {
    type Err = PayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|country| country.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| PayoutError::configuration(format!("Unknown country code: {}", s)))
    }
}

/// Gateway environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayEnvironment {
    Sandbox,
    Live,
}

impl GatewayEnvironment {
    /// Anything other than `live` is treated as sandbox
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("live") {
            Self::Live
        } else {
            Self::Sandbox
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sandbox => "sandbox",
            Self::Live => "live",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Live => "https://api.fedapay.com/v1",
            Self::Sandbox => "https://sandbox-api.fedapay.com/v1",
        }
    }
}

impl fmt::Display for GatewayEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payout mode used when nothing is configured outside live
pub const SANDBOX_PAYOUT_MODE: &str = "momo_test";

/// Payout mode selection, resolved once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutModeConfig {
    pub environment: GatewayEnvironment,
    pub mode_override: Option<String>,
    pub mode_by_country: HashMap<CountryCode, String>,
}

impl PayoutModeConfig {
    pub fn new(environment: GatewayEnvironment) -> Self {
        Self {
            environment,
            mode_override: None,
            mode_by_country: HashMap::new(),
        }
    }

    /// Read `FEDAPAY_PAYOUT_MODE` and every `FEDAPAY_PAYOUT_MODE_<CC>`
    pub fn from_env(environment: GatewayEnvironment) -> Self {
        let read = |name: &str| {
            std::env::var(name)
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mode_by_country = CountryCode::ALL
            .into_iter()
            .filter_map(|country| {
                read(&format!("FEDAPAY_PAYOUT_MODE_{}", country)).map(|mode| (country, mode))
            })
            .collect();

        Self {
            environment,
            mode_override: read("FEDAPAY_PAYOUT_MODE"),
            mode_by_country,
        }
    }

    pub fn with_override(mut self, mode: impl Into<String>) -> Self {
        self.mode_override = Some(mode.into());
        self
    }

    pub fn with_country_mode(mut self, country: CountryCode, mode: impl Into<String>) -> Self {
        self.mode_by_country.insert(country, mode.into());
        self
    }

    /// Global override, then per-country override, then the sandbox default.
    /// Live payouts never fall back to a default mode.
    pub fn resolve(&self, country: CountryCode) -> PayoutResult<String> {
        if let Some(mode) = &self.mode_override {
            return Ok(mode.clone());
        }

        if let Some(mode) = self.mode_by_country.get(&country) {
            return Ok(mode.clone());
        }

        match self.environment {
            GatewayEnvironment::Sandbox => Ok(SANDBOX_PAYOUT_MODE.to_string()),
            GatewayEnvironment::Live => Err(PayoutError::configuration(format!(
                "Payout mode not configured for {}. Set FEDAPAY_PAYOUT_MODE or FEDAPAY_PAYOUT_MODE_{}.",
                country, country
            ))),
        }
    }
}

/// A payout created at the gateway but not yet started
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedPayout {
    pub id: String,
    /// Reference already present in the creation response, if any
    pub reference: Option<String>,
    pub country: CountryCode,
    pub raw: serde_json::Value,
}

/// A payout the gateway accepted to start
#[derive(Debug, Clone, PartialEq)]
pub struct StartedPayout {
    pub reference: String,
    pub raw: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_country_from_phone() {
        assert_eq!(CountryCode::from_phone("+229 01 23 45 67"), CountryCode::BJ);
        assert_eq!(CountryCode::from_phone("+228 90 00 00 00"), CountryCode::TG);
        assert_eq!(CountryCode::from_phone("+2250700000000"), CountryCode::CI);
        assert_eq!(CountryCode::from_phone("+224 620 00 00 00"), CountryCode::GN);
        assert_eq!(CountryCode::from_phone("+227 90 00 00 00"), CountryCode::NE);
        assert_eq!(CountryCode::from_phone("+221 77 000 00 00"), CountryCode::SN);
        assert_eq!(CountryCode::from_phone("+223 70 00 00 00"), CountryCode::ML);
        assert_eq!(CountryCode::from_phone("+226 70 00 00 00"), CountryCode::BF);
    }

    #[test]
    fn test_unknown_prefix_defaults_to_benin() {
        assert_eq!(CountryCode::from_phone("+33 6 00 00 00 00"), CountryCode::BJ);
        assert_eq!(CountryCode::from_phone("97000000"), CountryCode::BJ);
    }

    #[test]
    fn test_sandbox_defaults_to_momo_test() {
        let config = PayoutModeConfig::new(GatewayEnvironment::Sandbox);
        assert_eq!(config.resolve(CountryCode::BJ).unwrap(), "momo_test");
    }

    #[test]
    fn test_live_without_mode_is_a_configuration_error() {
        let config = PayoutModeConfig::new(GatewayEnvironment::Live);
        let err = config.resolve(CountryCode::SN).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("FEDAPAY_PAYOUT_MODE_SN"));
    }

    #[test]
    fn test_override_order() {
        let config = PayoutModeConfig::new(GatewayEnvironment::Live)
            .with_country_mode(CountryCode::SN, "wave_sn");
        assert_eq!(config.resolve(CountryCode::SN).unwrap(), "wave_sn");
        assert!(config.resolve(CountryCode::BJ).is_err());

        let config = config.with_override("mtn_open");
        assert_eq!(config.resolve(CountryCode::SN).unwrap(), "mtn_open");
        assert_eq!(config.resolve(CountryCode::BJ).unwrap(), "mtn_open");
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!(GatewayEnvironment::parse("LIVE"), GatewayEnvironment::Live);
        assert_eq!(GatewayEnvironment::parse("sandbox"), GatewayEnvironment::Sandbox);
        assert_eq!(GatewayEnvironment::parse("staging"), GatewayEnvironment::Sandbox);
    }
}
