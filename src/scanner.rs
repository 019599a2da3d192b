//! Per-asset momentum and trend scan.

use crate::error::ScanError;
use crate::indicators::IndicatorFrame;
use crate::klines::{LookbackPeriod, PriceProvider, fetch_with_timeout};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{info, warn};

pub const SCAN_PERIOD: LookbackPeriod = LookbackPeriod::OneYear;
pub const RSI_OVERBOUGHT: f64 = 70.0;
pub const RSI_OVERSOLD: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RsiSignal {
    Overbought,
    Oversold,
    Neutral,
}

impl RsiSignal {
    /// First matching rule wins: above 70, then below 30, else neutral.
    pub fn classify(rsi: f64) -> Self {
        if rsi > RSI_OVERBOUGHT {
            RsiSignal::Overbought
        } else if rsi < RSI_OVERSOLD {
            RsiSignal::Oversold
        } else {
            RsiSignal::Neutral
        }
    }
}

impl fmt::Display for RsiSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RsiSignal::Overbought => "Overbought",
            RsiSignal::Oversold => "Oversold",
            RsiSignal::Neutral => "Neutral",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    #[serde(rename = "Strong Bullish")]
    StrongBullish,
    Bullish,
    Bearish,
}

impl Trend {
    /// Above both averages is strong, above SMA-200 alone is bullish,
    /// anything else (including above SMA-50 only) is bearish.
    pub fn classify(close: f64, sma_50: f64, sma_200: f64) -> Self {
        if close > sma_50 && close > sma_200 {
            Trend::StrongBullish
        } else if close > sma_200 {
            Trend::Bullish
        } else {
            Trend::Bearish
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Trend::StrongBullish => "Strong Bullish",
            Trend::Bullish => "Bullish",
            Trend::Bearish => "Bearish",
        };
        f.write_str(label)
    }
}

/// One asset's snapshot as persisted in the scan file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRow {
    pub ticker: String,
    pub last_price: f64,
    pub daily_change_pct: f64,
    pub rsi_14: f64,
    pub rsi_signal: RsiSignal,
    pub trend: Trend,
    pub distance_from_sma200_pct: f64,
}

/// Rows in configured ticker order, failed tickers left out.
pub type ScanTable = Vec<ScanRow>;

/// Builds the snapshot from the last two rows of a warmed-up frame.
pub fn scan_frame(frame: &IndicatorFrame) -> Result<ScanRow, ScanError> {
    let (prev, last) = frame
        .last_pair()
        .ok_or_else(|| ScanError::InsufficientHistory {
            ticker: frame.ticker.clone(),
            rows: frame.len(),
        })?;

    let close = last.bar.close;

    Ok(ScanRow {
        ticker: frame.ticker.clone(),
        last_price: close,
        daily_change_pct: (close / prev.bar.close - 1.0) * 100.0,
        rsi_14: last.rsi_14,
        rsi_signal: RsiSignal::classify(last.rsi_14),
        trend: Trend::classify(close, last.sma_50, last.sma_200),
        distance_from_sma200_pct: (close / last.sma_200 - 1.0) * 100.0,
    })
}

pub async fn scan_ticker(
    provider: &dyn PriceProvider,
    ticker: &str,
    timeout: Duration,
) -> Result<ScanRow, ScanError> {
    let series = fetch_with_timeout(provider, ticker, SCAN_PERIOD, timeout).await?;
    if series.is_empty() {
        return Err(ScanError::NoData(ticker.to_string()));
    }
    scan_frame(&IndicatorFrame::compute(&series))
}

/// Scans every ticker, `batch_size` requests at a time. A failing ticker is
/// logged and skipped; it never aborts the scan.
pub async fn scan_market(
    provider: &dyn PriceProvider,
    tickers: &[String],
    timeout: Duration,
    batch_size: usize,
) -> ScanTable {
    info!(tickers = tickers.len(), "starting market scan");
    let mut table = Vec::with_capacity(tickers.len());

    for batch in tickers.chunks(batch_size.max(1)) {
        let tasks: Vec<_> = batch
            .iter()
            .map(|ticker| scan_ticker(provider, ticker, timeout))
            .collect();
        let results = futures::future::join_all(tasks).await;

        for (ticker, result) in batch.iter().zip(results) {
            match result {
                Ok(row) => {
                    info!(%ticker, "scanned");
                    table.push(row);
                }
                Err(e) => warn!(%ticker, error = %e, "skipping ticker"),
            }
        }
    }

    info!(rows = table.len(), "market scan finished");
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::IndicatorRow;
    use crate::klines::Bar;
    use approx::assert_relative_eq;

    #[test]
    fn rsi_signal_thresholds_are_exclusive() {
        assert_eq!(RsiSignal::classify(70.0), RsiSignal::Neutral);
        assert_eq!(RsiSignal::classify(70.01), RsiSignal::Overbought);
        assert_eq!(RsiSignal::classify(30.0), RsiSignal::Neutral);
        assert_eq!(RsiSignal::classify(29.99), RsiSignal::Oversold);
    }

    #[test]
    fn trend_is_first_match_wins() {
        assert_eq!(Trend::classify(110.0, 100.0, 90.0), Trend::StrongBullish);
        assert_eq!(Trend::classify(95.0, 100.0, 90.0), Trend::Bullish);
        // above SMA-50 but under SMA-200 is not a separate category
        assert_eq!(Trend::classify(95.0, 90.0, 100.0), Trend::Bearish);
        assert_eq!(Trend::classify(80.0, 90.0, 100.0), Trend::Bearish);
        assert_eq!(Trend::classify(100.0, 100.0, 100.0), Trend::Bearish);
    }

    #[test]
    fn trend_classification_is_total() {
        let levels = [90.0, 100.0, 110.0];
        for close in levels {
            for sma_50 in levels {
                for sma_200 in levels {
                    match Trend::classify(close, sma_50, sma_200) {
                        Trend::StrongBullish => assert!(close > sma_50 && close > sma_200),
                        Trend::Bullish => assert!(close > sma_200 && close <= sma_50),
                        Trend::Bearish => assert!(close <= sma_200),
                    }
                }
            }
        }
    }

    fn indicator_row(close: f64, rsi_14: f64) -> IndicatorRow {
        IndicatorRow {
            bar: Bar {
                date: "2024-03-01".parse().unwrap(),
                open: close,
                high: close,
                low: close,
                close,
                volume: 0.0,
            },
            sma_50: 100.0,
            sma_200: 80.0,
            rsi_14,
            bb_upper: 120.0,
            bb_lower: 90.0,
        }
    }

    #[test]
    fn snapshot_uses_the_last_two_rows() {
        let frame = IndicatorFrame {
            ticker: "ETH-USD".into(),
            rows: vec![
                indicator_row(90.0, 40.0),
                indicator_row(100.0, 50.0),
                indicator_row(110.0, 72.0),
            ],
        };
        let row = scan_frame(&frame).unwrap();

        assert_eq!(row.ticker, "ETH-USD");
        assert_relative_eq!(row.last_price, 110.0);
        assert_relative_eq!(row.daily_change_pct, 10.0, epsilon = 1e-9);
        assert_relative_eq!(row.distance_from_sma200_pct, 37.5, epsilon = 1e-9);
        assert_eq!(row.rsi_signal, RsiSignal::Overbought);
        assert_eq!(row.trend, Trend::StrongBullish);
    }

    #[test]
    fn single_row_frame_is_insufficient() {
        let frame = IndicatorFrame {
            ticker: "ETH-USD".into(),
            rows: vec![indicator_row(100.0, 50.0)],
        };
        assert!(matches!(
            scan_frame(&frame),
            Err(ScanError::InsufficientHistory { rows: 1, .. })
        ));
    }

    #[test]
    fn row_serializes_with_stable_keys() {
        let row = ScanRow {
            ticker: "BTC-USD".into(),
            last_price: 100.0,
            daily_change_pct: 1.5,
            rsi_14: 55.0,
            rsi_signal: RsiSignal::Neutral,
            trend: Trend::StrongBullish,
            distance_from_sma200_pct: 12.0,
        };
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["trend"], "Strong Bullish");
        assert_eq!(value["rsi_signal"], "Neutral");
        for key in [
            "ticker",
            "last_price",
            "daily_change_pct",
            "rsi_14",
            "distance_from_sma200_pct",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
    }
}
