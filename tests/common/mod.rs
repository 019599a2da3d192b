#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use crypto_engine::error::{NotifyError, ProviderError};
use crypto_engine::klines::{Bar, LookbackPeriod, PriceProvider, PriceSeries};
use crypto_engine::notifier::NotificationSink;
use crypto_engine::storage_utils::EngineConfig;
use std::collections::{HashMap, HashSet};
use std::f64::consts::PI;
use std::sync::Mutex;
use std::time::Duration;

/// Serves canned histories, trimmed to the requested lookback.
/// Unknown tickers get an empty series, like a real provider.
#[derive(Default)]
pub struct StaticProvider {
    series: HashMap<String, PriceSeries>,
    failing: HashSet<String>,
    stalled: HashSet<String>,
}

impl StaticProvider {
    pub fn with(mut self, ticker: &str, closes: Vec<f64>) -> Self {
        self.series.insert(ticker.to_string(), daily_series(ticker, &closes));
        self
    }

    pub fn failing(mut self, ticker: &str) -> Self {
        self.failing.insert(ticker.to_string());
        self
    }

    pub fn stalled(mut self, ticker: &str) -> Self {
        self.stalled.insert(ticker.to_string());
        self
    }
}

#[async_trait]
impl PriceProvider for StaticProvider {
    async fn fetch_history(
        &self,
        ticker: &str,
        period: LookbackPeriod,
    ) -> Result<PriceSeries, ProviderError> {
        if self.stalled.contains(ticker) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.failing.contains(ticker) {
            return Err(ProviderError::Status {
                ticker: ticker.to_string(),
                status: 500,
            });
        }
        let Some(series) = self.series.get(ticker) else {
            return Ok(PriceSeries::empty(ticker));
        };
        let start = series.bars.len().saturating_sub(period.days());
        Ok(PriceSeries::new(ticker, series.bars[start..].to_vec()))
    }
}

/// Keeps every (subject, body) it was handed.
#[derive(Default)]
pub struct RecordingSink {
    pub sent: Mutex<Vec<(String, String)>>,
    pub fail: bool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn messages(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((subject.to_string(), body.to_string()));
        if self.fail {
            Err(NotifyError::Transport("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

pub fn daily_series(ticker: &str, closes: &[f64]) -> PriceSeries {
    let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Bar {
            date: start + Days::new(i as u64),
            open: close,
            high: close * 1.01,
            low: close * 0.99,
            close,
            volume: 1_000.0,
        })
        .collect();
    PriceSeries::new(ticker, bars)
}

/// Alternating up/down days: RSI hovers near 50.
pub fn zigzag(n: usize, base: f64) -> Vec<f64> {
    (0..n).map(|i| base + (i % 2) as f64).collect()
}

/// Steady 0.5% daily decline: RSI pinned at 0.
pub fn falling(n: usize, start: f64) -> Vec<f64> {
    (0..n).map(|i| start * 0.995f64.powi(i as i32)).collect()
}

pub fn cycle(n: usize, period: f64) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let jitter = ((i * 7919 + 13) % 101) as f64 / 1000.0 - 0.05;
            100.0 + 10.0 * (2.0 * PI * i as f64 / period).sin() + jitter
        })
        .collect()
}

pub fn config(tickers: &[&str]) -> EngineConfig {
    EngineConfig {
        tickers: tickers.iter().map(|t| t.to_string()).collect(),
        benchmark: "BTC-USD".to_string(),
        correlation_peers: vec!["ETH-USD".to_string(), "SOL-USD".to_string()],
        request_timeout_secs: 1,
        ..EngineConfig::default()
    }
}
