use crate::error::ScanError;
use crate::indicators::{IndicatorFrame, IndicatorRow};
use crate::klines::{LookbackPeriod, PriceProvider, fetch_with_timeout};
use crate::scanner::RsiSignal;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Above,
    Below,
}

impl Relation {
    fn of(close: f64, level: f64) -> Self {
        if close > level {
            Relation::Above
        } else {
            Relation::Below
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Relation::Above => "above",
            Relation::Below => "below",
        })
    }
}

/// Where the close sits relative to the Bollinger envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandPosition {
    AboveUpper,
    BelowLower,
    Inside,
}

impl BandPosition {
    pub fn classify(close: f64, upper: f64, lower: f64) -> Self {
        if close > upper {
            BandPosition::AboveUpper
        } else if close < lower {
            BandPosition::BelowLower
        } else {
            BandPosition::Inside
        }
    }
}

impl fmt::Display for BandPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BandPosition::AboveUpper => "breaking the upper band",
            BandPosition::BelowLower => "touching the lower band",
            BandPosition::Inside => "within the bands",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LongTermTrend {
    Bullish,
    Bearish,
}

/// Technical summary of one asset's latest bar.
#[derive(Debug, Clone, PartialEq)]
pub struct DeepDiveSnapshot {
    pub ticker: String,
    pub last_price: f64,
    pub rsi_14: f64,
    pub rsi_signal: RsiSignal,
    pub vs_sma_50: Relation,
    pub vs_sma_200: Relation,
    pub bands: BandPosition,
    pub trend: LongTermTrend,
}

impl DeepDiveSnapshot {
    pub fn from_row(ticker: &str, row: &IndicatorRow) -> Self {
        let close = row.bar.close;
        let vs_sma_200 = Relation::of(close, row.sma_200);
        Self {
            ticker: ticker.to_string(),
            last_price: close,
            rsi_14: row.rsi_14,
            rsi_signal: RsiSignal::classify(row.rsi_14),
            vs_sma_50: Relation::of(close, row.sma_50),
            vs_sma_200,
            bands: BandPosition::classify(close, row.bb_upper, row.bb_lower),
            trend: match vs_sma_200 {
                Relation::Above => LongTermTrend::Bullish,
                Relation::Below => LongTermTrend::Bearish,
            },
        }
    }

    pub fn from_frame(frame: &IndicatorFrame) -> Option<Self> {
        frame.last().map(|row| Self::from_row(&frame.ticker, row))
    }
}

pub async fn deep_dive(
    provider: &dyn PriceProvider,
    ticker: &str,
    period: LookbackPeriod,
    timeout: Duration,
) -> Result<DeepDiveSnapshot, ScanError> {
    let series = fetch_with_timeout(provider, ticker, period, timeout).await?;
    if series.is_empty() {
        return Err(ScanError::NoData(ticker.to_string()));
    }
    let frame = IndicatorFrame::compute(&series);
    DeepDiveSnapshot::from_frame(&frame).ok_or(ScanError::InsufficientHistory {
        ticker: ticker.to_string(),
        rows: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::klines::Bar;

    fn row(close: f64, sma_50: f64, sma_200: f64, upper: f64, lower: f64) -> IndicatorRow {
        IndicatorRow {
            bar: Bar {
                date: "2024-05-01".parse().unwrap(),
                open: close,
                high: close,
                low: close,
                close,
                volume: 0.0,
            },
            sma_50,
            sma_200,
            rsi_14: 75.0,
            bb_upper: upper,
            bb_lower: lower,
        }
    }

    #[test]
    fn breakout_above_everything() {
        let snap = DeepDiveSnapshot::from_row("SOL-USD", &row(120.0, 100.0, 90.0, 115.0, 95.0));
        assert_eq!(snap.rsi_signal, RsiSignal::Overbought);
        assert_eq!(snap.vs_sma_50, Relation::Above);
        assert_eq!(snap.vs_sma_200, Relation::Above);
        assert_eq!(snap.bands.to_string(), "breaking the upper band");
        assert_eq!(snap.trend, LongTermTrend::Bullish);
    }

    #[test]
    fn short_term_strength_under_long_average_is_bearish() {
        let snap = DeepDiveSnapshot::from_row("ADA-USD", &row(0.9, 0.8, 1.0, 0.95, 0.85));
        assert_eq!(snap.vs_sma_50, Relation::Above);
        assert_eq!(snap.vs_sma_200, Relation::Below);
        assert_eq!(snap.bands, BandPosition::Inside);
        assert_eq!(snap.trend, LongTermTrend::Bearish);
    }

    #[test]
    fn close_under_lower_band() {
        assert_eq!(BandPosition::classify(9.0, 12.0, 10.0), BandPosition::BelowLower);
        assert_eq!(BandPosition::classify(10.0, 12.0, 10.0), BandPosition::Inside);
    }
}
