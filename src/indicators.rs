use crate::klines::{Bar, PriceSeries};
use ta::Next;
use ta::indicators::{BollingerBands, SimpleMovingAverage};

pub const SMA_FAST: usize = 50;
pub const SMA_SLOW: usize = 200;
pub const RSI_PERIOD: usize = 14;
pub const BOLLINGER_LENGTH: usize = 20;
pub const BOLLINGER_STD: f64 = 2.0;

/// Simple moving average of `closes`. `None` for the first `window - 1` rows.
pub fn sma(closes: &[f64], window: usize) -> Vec<Option<f64>> {
    let Ok(mut indicator) = SimpleMovingAverage::new(window) else {
        return vec![None; closes.len()];
    };

    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let value = indicator.next(close);
            (i + 1 >= window).then_some(value)
        })
        .collect()
}

/// Wilder's running moving average: `avg += (x - avg) / n`, seeded with
/// the first observation.
#[derive(Debug)]
struct Rma {
    length: f64,
    value: Option<f64>,
}

impl Rma {
    fn new(length: usize) -> Self {
        Self {
            length: length as f64,
            value: None,
        }
    }

    fn next(&mut self, x: f64) -> f64 {
        let value = match self.value {
            Some(prev) => prev + (x - prev) / self.length,
            None => x,
        };
        self.value = Some(value);
        value
    }
}

/// Relative Strength Index with Wilder smoothing of day-over-day gains and
/// losses. `None` for the first `period` rows; a window with neither gains
/// nor losses reads 50.
pub fn rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if period == 0 {
        return out;
    }

    let mut gains = Rma::new(period);
    let mut losses = Rma::new(period);

    for i in 1..closes.len() {
        let delta = closes[i] - closes[i - 1];
        let avg_gain = gains.next(delta.max(0.0));
        let avg_loss = losses.next((-delta).max(0.0));

        if i >= period {
            let total = avg_gain + avg_loss;
            let value = if total > 0.0 {
                100.0 * avg_gain / total
            } else {
                50.0
            };
            out[i] = Some(value.clamp(0.0, 100.0));
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Bollinger envelope: SMA(length) ± k standard deviations of close.
/// `None` for the first `length - 1` rows.
pub fn bollinger(closes: &[f64], length: usize, k: f64) -> Vec<Option<Band>> {
    let Ok(mut indicator) = BollingerBands::new(length, k) else {
        return vec![None; closes.len()];
    };

    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let out = indicator.next(close);
            (i + 1 >= length).then_some(Band {
                upper: out.upper,
                middle: out.average,
                lower: out.lower,
            })
        })
        .collect()
}

/// A bar together with every derived column.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorRow {
    pub bar: Bar,
    pub sma_50: f64,
    pub sma_200: f64,
    pub rsi_14: f64,
    pub bb_upper: f64,
    pub bb_lower: f64,
}

/// Price series extended with indicators, truncated to the rows where
/// every indicator is defined.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorFrame {
    pub ticker: String,
    pub rows: Vec<IndicatorRow>,
}

impl IndicatorFrame {
    pub fn compute(series: &PriceSeries) -> Self {
        let closes = series.closes();
        let fast = sma(&closes, SMA_FAST);
        let slow = sma(&closes, SMA_SLOW);
        let strength = rsi(&closes, RSI_PERIOD);
        let bands = bollinger(&closes, BOLLINGER_LENGTH, BOLLINGER_STD);

        let rows = series
            .bars
            .iter()
            .enumerate()
            .filter_map(|(i, bar)| {
                let band = bands[i]?;
                Some(IndicatorRow {
                    bar: bar.clone(),
                    sma_50: fast[i]?,
                    sma_200: slow[i]?,
                    rsi_14: strength[i]?,
                    bb_upper: band.upper,
                    bb_lower: band.lower,
                })
            })
            .collect();

        Self {
            ticker: series.ticker.clone(),
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn last(&self) -> Option<&IndicatorRow> {
        self.rows.last()
    }

    /// The last two rows, oldest first.
    pub fn last_pair(&self) -> Option<(&IndicatorRow, &IndicatorRow)> {
        match self.rows.as_slice() {
            [.., prev, last] => Some((prev, last)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Days, NaiveDate};

    fn series_from(closes: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                date: start + Days::new(i as u64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1.0,
            })
            .collect();
        PriceSeries::new("TEST-USD", bars)
    }

    #[test]
    fn sma_is_undefined_until_window_fills() {
        let out = sma(&[1.0, 2.0, 3.0, 4.0], 3);
        assert_eq!(out[0], None);
        assert_eq!(out[1], None);
        assert_relative_eq!(out[2].unwrap(), 2.0);
        assert_relative_eq!(out[3].unwrap(), 3.0);
    }

    #[test]
    fn rsi_on_flat_prices_settles_at_fifty() {
        let closes = vec![100.0; 40];
        let out = rsi(&closes, RSI_PERIOD);
        assert!(out[..RSI_PERIOD].iter().all(Option::is_none));
        assert!(out[RSI_PERIOD..].iter().all(|v| *v == Some(50.0)));
    }

    #[test]
    fn rsi_saturates_on_one_way_moves() {
        let rising: Vec<f64> = (1..=30).map(f64::from).collect();
        assert_relative_eq!(rsi(&rising, RSI_PERIOD)[29].unwrap(), 100.0);

        let falling: Vec<f64> = (1..=30).rev().map(f64::from).collect();
        assert_relative_eq!(rsi(&falling, RSI_PERIOD)[29].unwrap(), 0.0);
    }

    #[test]
    fn rsi_stays_bounded_on_zigzag() {
        let closes: Vec<f64> = (0..100)
            .map(|i| {
                let step = if i % 3 == 0 { 5.0 } else { -2.0 };
                100.0 + step * (i % 7) as f64
            })
            .collect();
        for value in rsi(&closes, RSI_PERIOD).into_iter().flatten() {
            assert!((0.0..=100.0).contains(&value));
        }
    }

    #[test]
    fn bollinger_collapses_on_constant_prices() {
        let out = bollinger(&[10.0; 25], BOLLINGER_LENGTH, BOLLINGER_STD);
        assert!(out[..BOLLINGER_LENGTH - 1].iter().all(Option::is_none));
        let band = out[BOLLINGER_LENGTH - 1].unwrap();
        assert_relative_eq!(band.upper, 10.0);
        assert_relative_eq!(band.lower, 10.0);
    }

    #[test]
    fn frame_keeps_only_the_fully_defined_tail() {
        let closes: Vec<f64> = (0..250).map(|i| 100.0 + (i as f64 * 0.3).sin()).collect();
        let series = series_from(&closes);
        let frame = IndicatorFrame::compute(&series);

        assert_eq!(frame.len(), 250 - (SMA_SLOW - 1));
        assert_eq!(frame.rows[0].bar, series.bars[SMA_SLOW - 1]);
        let (prev, last) = frame.last_pair().unwrap();
        assert_eq!(prev.bar, series.bars[248]);
        assert_eq!(last.bar, series.bars[249]);
    }

    #[test]
    fn frame_is_empty_without_enough_history() {
        let frame = IndicatorFrame::compute(&series_from(&[1.0; 150]));
        assert!(frame.is_empty());
        assert!(frame.last_pair().is_none());
    }
}
