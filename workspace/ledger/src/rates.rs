//! Historical exchange-rate sources.
//!
//! The conversion engine only sees the [`RateProvider`] trait; the HTTP
//! implementation talks to the Frankfurter (ECB) date endpoint and keeps
//! fetched rates in a moka cache, since a published historical rate never
//! changes.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use moka::future::Cache;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::{LedgerError, Result};

/// A source of exchange rates applicable to a specific past date.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// The `from` -> `to` rate valid on `date`.
    async fn rate(&self, date: NaiveDate, from: &str, to: &str) -> Result<Decimal>;
}

const FRANKFURTER_URL: &str = "https://api.frankfurter.dev";
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct FrankfurterResponse {
    rates: HashMap<String, f64>,
}

/// Frankfurter (ECB) client: `GET /{date}?from=EUR&to=USD`.
pub struct FrankfurterRateProvider {
    client: reqwest::Client,
    base_url: String,
    cache: Cache<(NaiveDate, String, String), Decimal>,
}

impl FrankfurterRateProvider {
    pub fn new() -> Result<Self> {
        Self::with_base_url(FRANKFURTER_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| LedgerError::ExternalService(format!("rate client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            cache: Cache::new(10_000),
        })
    }

    async fn fetch(&self, date: NaiveDate, from: &str, to: &str) -> Result<Decimal> {
        let url = format!("{}/{date}?from={from}&to={to}", self.base_url);
        debug!(%url, "Fetching historical exchange rate");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| LedgerError::ExternalService(format!("rate fetch failed: {e}")))?
            .error_for_status()
            .map_err(|e| LedgerError::ExternalService(format!("rate source returned: {e}")))?;
        let body: FrankfurterResponse = response
            .json()
            .await
            .map_err(|e| LedgerError::ExternalService(format!("rate response malformed: {e}")))?;
        let raw = body.rates.get(to).copied().ok_or_else(|| {
            LedgerError::ExternalService(format!("no {from}->{to} rate for {date}"))
        })?;
        Decimal::try_from(raw).map_err(|e| {
            LedgerError::ExternalService(format!("rate {raw} not representable: {e}"))
        })
    }
}

#[async_trait]
impl RateProvider for FrankfurterRateProvider {
    #[instrument(skip(self))]
    async fn rate(&self, date: NaiveDate, from: &str, to: &str) -> Result<Decimal> {
        let key = (date, from.to_string(), to.to_string());
        if let Some(cached) = self.cache.get(&key).await {
            return Ok(cached);
        }
        let fetched = self.fetch(date, from, to).await?;
        self.cache.insert(key, fetched).await;
        Ok(fetched)
    }
}

/// Fixed-table provider for tests and offline use: one default rate,
/// optionally overridden per date.
#[derive(Debug, Clone)]
pub struct FixedRateProvider {
    default_rate: Decimal,
    per_date: HashMap<NaiveDate, Decimal>,
}

impl FixedRateProvider {
    pub fn new(default_rate: Decimal) -> Self {
        Self {
            default_rate,
            per_date: HashMap::new(),
        }
    }

    pub fn with_rate_on(mut self, date: NaiveDate, rate: Decimal) -> Self {
        self.per_date.insert(date, rate);
        self
    }
}

#[async_trait]
impl RateProvider for FixedRateProvider {
    async fn rate(&self, date: NaiveDate, _from: &str, _to: &str) -> Result<Decimal> {
        Ok(self.per_date.get(&date).copied().unwrap_or(self.default_rate))
    }
}
