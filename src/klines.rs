use crate::error::ProviderError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use reqwest::{Client, StatusCode};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::time::Duration;
use tracing::debug;

const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// One daily OHLCV bar.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Daily bars for one ticker, dates strictly ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    pub ticker: String,
    pub bars: Vec<Bar>,
}

impl PriceSeries {
    /// Sorts the bars by date. When a date repeats, the bar seen last wins
    /// (the provider appends today's partial bar after the settled one).
    pub fn new(ticker: impl Into<String>, mut bars: Vec<Bar>) -> Self {
        bars.sort_by_key(|b| b.date);
        let mut unique: Vec<Bar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match unique.last_mut() {
                Some(last) if last.date == bar.date => *last = bar,
                _ => unique.push(bar),
            }
        }
        Self {
            ticker: ticker.into(),
            bars: unique,
        }
    }

    pub fn empty(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            bars: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }
}

/// Lookback keywords understood by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookbackPeriod {
    OneMonth,
    ThreeMonths,
    SixMonths,
    OneYear,
    TwoYears,
}

impl LookbackPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            LookbackPeriod::OneMonth => "1mo",
            LookbackPeriod::ThreeMonths => "3mo",
            LookbackPeriod::SixMonths => "6mo",
            LookbackPeriod::OneYear => "1y",
            LookbackPeriod::TwoYears => "2y",
        }
    }

    /// Approximate number of calendar days covered.
    pub fn days(&self) -> usize {
        match self {
            LookbackPeriod::OneMonth => 30,
            LookbackPeriod::ThreeMonths => 91,
            LookbackPeriod::SixMonths => 182,
            LookbackPeriod::OneYear => 365,
            LookbackPeriod::TwoYears => 730,
        }
    }
}

impl fmt::Display for LookbackPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of daily price history.
///
/// Implementations must return an empty series, not an error, when the
/// symbol has no data.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    async fn fetch_history(
        &self,
        ticker: &str,
        period: LookbackPeriod,
    ) -> Result<PriceSeries, ProviderError>;
}

/// Runs one provider call under a deadline. Expiry is reported as
/// `ProviderError::Timeout` for that ticker only.
pub async fn fetch_with_timeout(
    provider: &dyn PriceProvider,
    ticker: &str,
    period: LookbackPeriod,
    limit: Duration,
) -> Result<PriceSeries, ProviderError> {
    match tokio::time::timeout(limit, provider.fetch_history(ticker, period)).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout {
            ticker: ticker.to_string(),
            secs: limit.as_secs(),
        }),
    }
}

// --- Yahoo chart payload ---

#[derive(Deserialize, Debug)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Deserialize, Debug)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Deserialize, Debug)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Deserialize, Debug, Default)]
struct Quote {
    #[serde(default)]
    open: Vec<LenientF64>,
    #[serde(default)]
    high: Vec<LenientF64>,
    #[serde(default)]
    low: Vec<LenientF64>,
    #[serde(default)]
    close: Vec<LenientF64>,
    #[serde(default)]
    volume: Vec<LenientF64>,
}

/// A number that may arrive as a float, an integer, a numeric string or null.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct LenientF64(Option<f64>);

struct LenientF64Visitor;

impl<'de> Visitor<'de> for LenientF64Visitor {
    type Value = Option<f64>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a float, an integer, or a string representing a number")
    }

    fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E> {
        Ok(Some(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Some(v as f64))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Some(v as f64))
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        if v.trim().is_empty() {
            Ok(None)
        } else {
            v.parse::<f64>().map(Some).map_err(E::custom)
        }
    }

    fn visit_none<E>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E> {
        Ok(None)
    }
}

impl<'de> Deserialize<'de> for LenientF64 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(LenientF64Visitor).map(LenientF64)
    }
}

fn column(values: &[LenientF64], i: usize) -> Option<f64> {
    values.get(i).and_then(|v| v.0).filter(|v| v.is_finite())
}

fn bars_from_chart(result: ChartResult) -> Vec<Bar> {
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();

    result
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, &ts)| {
            let close = column(&quote.close, i)?;
            let date = DateTime::from_timestamp(ts, 0)?.date_naive();
            Some(Bar {
                date,
                open: column(&quote.open, i).unwrap_or(close),
                high: column(&quote.high, i).unwrap_or(close),
                low: column(&quote.low, i).unwrap_or(close),
                close,
                volume: column(&quote.volume, i).unwrap_or(0.0),
            })
        })
        .collect()
}

/// Daily bars from the public Yahoo Finance chart endpoint.
pub struct YahooChartProvider {
    client: Client,
}

impl YahooChartProvider {
    pub fn new(request_timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (compatible; crypto-engine/0.1)")
            .timeout(request_timeout)
            .pool_max_idle_per_host(16)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PriceProvider for YahooChartProvider {
    async fn fetch_history(
        &self,
        ticker: &str,
        period: LookbackPeriod,
    ) -> Result<PriceSeries, ProviderError> {
        let url = format!("{}/{}", CHART_URL, ticker);
        let query = [("range", period.as_str()), ("interval", "1d")];

        let response = self.client.get(&url).query(&query).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            debug!(ticker, "provider has no such symbol");
            return Ok(PriceSeries::empty(ticker));
        }
        if status == StatusCode::IM_A_TEAPOT || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited(ticker.to_string()));
        }
        if !status.is_success() {
            return Err(ProviderError::Status {
                ticker: ticker.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        let payload: ChartResponse =
            serde_json::from_slice(&bytes).map_err(|e| ProviderError::Decode {
                ticker: ticker.to_string(),
                reason: e.to_string(),
            })?;

        let bars = payload
            .chart
            .result
            .and_then(|r| r.into_iter().next())
            .map(bars_from_chart)
            .unwrap_or_default();

        debug!(ticker, period = %period, bars = bars.len(), "fetched price history");
        Ok(PriceSeries::new(ticker, bars))
    }
}
