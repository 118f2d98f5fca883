//! `bitcoin_price` tool backed by the CoinGecko `simple/price` endpoint.
//!
//! Every call performs one live request with a fixed timeout. There is no
//! caching and no retry.

use super::ToolError;
use crate::mcp::ToolHandler;
use crate::value::{ArgumentError, Arguments, FromArguments};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// Upper bound on one price request
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum PriceError {
    #[error("unsupported currency: {0}")]
    UnsupportedCurrency(String),
    #[error("error making request to CoinGecko API: {0}")]
    Request(#[source] reqwest::Error),
    #[error("CoinGecko API returned HTTP {0}")]
    Status(u16),
    #[error("error parsing JSON response: {0}")]
    Decode(#[source] reqwest::Error),
    #[error("no {0} quote in CoinGecko response")]
    MissingQuote(Currency),
}

/// Quote currencies accepted by the tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
    Jpy,
    Aud,
    Cad,
    Chf,
    Cny,
    Krw,
    Rub,
}

impl Currency {
    pub const ALL: [Currency; 10] = [
        Currency::Usd,
        Currency::Eur,
        Currency::Gbp,
        Currency::Jpy,
        Currency::Aud,
        Currency::Cad,
        Currency::Chf,
        Currency::Cny,
        Currency::Krw,
        Currency::Rub,
    ];

    /// Lower-case code used as the CoinGecko response key
    pub fn key(self) -> &'static str {
        match self {
            Currency::Usd => "usd",
            Currency::Eur => "eur",
            Currency::Gbp => "gbp",
            Currency::Jpy => "jpy",
            Currency::Aud => "aud",
            Currency::Cad => "cad",
            Currency::Chf => "chf",
            Currency::Cny => "cny",
            Currency::Krw => "krw",
            Currency::Rub => "rub",
        }
    }

    /// Resolve a user-supplied code. Empty input means USD.
    pub fn resolve(raw: &str) -> Result<Self, PriceError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(Currency::Usd);
        }
        raw.parse()
    }
}

impl FromStr for Currency {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::ALL
            .into_iter()
            .find(|c| c.key().eq_ignore_ascii_case(s))
            .ok_or_else(|| PriceError::UnsupportedCurrency(s.to_string()))
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key().to_ascii_uppercase())
    }
}

#[derive(Debug, Deserialize)]
struct SimplePriceResponse {
    bitcoin: HashMap<String, f64>,
}

/// Blocking client for the price endpoint
#[derive(Debug, Clone)]
pub struct PriceClient {
    http: reqwest::blocking::Client,
    base_url: String,
}

impl PriceClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Current Bitcoin price in `currency`
    pub fn bitcoin_price(&self, currency: Currency) -> Result<f64, PriceError> {
        let vs_currencies = Currency::ALL
            .iter()
            .map(|c| c.key())
            .collect::<Vec<_>>()
            .join(",");

        let resp = self
            .http
            .get(format!("{}/simple/price", self.base_url))
            .query(&[("ids", "bitcoin"), ("vs_currencies", vs_currencies.as_str())])
            .send()
            .map_err(PriceError::Request)?;

        if !resp.status().is_success() {
            return Err(PriceError::Status(resp.status().as_u16()));
        }

        let body: SimplePriceResponse = resp.json().map_err(PriceError::Decode)?;
        body.bitcoin
            .get(currency.key())
            .copied()
            .ok_or(PriceError::MissingQuote(currency))
    }
}

pub struct BitcoinPriceArgs {
    pub currency: Option<String>,
}

impl FromArguments for BitcoinPriceArgs {
    fn from_arguments(args: &Arguments) -> Result<Self, ArgumentError> {
        Ok(Self {
            currency: args.optional_str("currency")?.map(str::to_string),
        })
    }
}

pub struct BitcoinPrice {
    client: PriceClient,
}

impl BitcoinPrice {
    pub fn new(client: PriceClient) -> Self {
        Self { client }
    }
}

impl ToolHandler for BitcoinPrice {
    fn name(&self) -> &str {
        "bitcoin_price"
    }

    fn description(&self) -> &str {
        "Get the latest Bitcoin price in various currencies"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "currency": {
                    "type": "string",
                    "description": "The currency to get the Bitcoin price in (USD, EUR, GBP, JPY, AUD, CAD, CHF, CNY, KRW, RUB)"
                }
            },
            "required": ["currency"]
        })
    }

    fn call(&self, args: &Arguments) -> Result<String, ToolError> {
        // an empty currency string quotes USD
        let args = BitcoinPriceArgs::from_arguments(args)?;
        let currency = Currency::resolve(args.currency.as_deref().unwrap_or(""))?;
        tracing::info!(%currency, "fetching bitcoin price");

        let price = self.client.bitcoin_price(currency)?;
        Ok(format!(
            "The current Bitcoin price in {} is {:.2} (as of {})",
            currency,
            price,
            chrono::Utc::now().format("%a, %d %b %Y %H:%M:%S UTC")
        ))
    }
}
