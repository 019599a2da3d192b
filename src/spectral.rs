//! Cyclical decomposition of a long close series.
//!
//! The close series is mean-removed and transformed with an FFT. The
//! one-sided amplitude spectrum (scaled by 2/N) is re-indexed by period in
//! days, band-limited, and scanned for dominant peaks: strict local maxima
//! whose amplitude clears mean + one standard deviation of the band.

use crate::error::AnalysisError;
use crate::klines::{LookbackPeriod, PriceProvider, fetch_with_timeout};
use rustfft::FftPlanner;
use rustfft::num_complex::Complex;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::time::Duration;
use tracing::info;

pub const SPECTRAL_PERIOD: LookbackPeriod = LookbackPeriod::TwoYears;
pub const MIN_OBSERVATIONS: usize = 100;
pub const MIN_PERIOD_DAYS: f64 = 7.0;
pub const MAX_PERIOD_DAYS: f64 = 365.0;

/// Band-limited spectrum plus the detected peaks, as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectralAnalysis {
    /// Periods in days, ascending.
    #[serde(rename = "fft_periods")]
    pub periods: Vec<f64>,
    #[serde(rename = "fft_power")]
    pub power: Vec<f64>,
    /// Descending.
    #[serde(rename = "dominant_periods_days")]
    pub dominant_periods: Vec<f64>,
}

/// One-sided amplitude spectrum of the mean-removed input, bins `0..N/2`.
fn amplitude_spectrum(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mean = values.iter().mean();

    let mut buffer: Vec<Complex<f64>> = values
        .iter()
        .map(|&v| Complex::new(v - mean, 0.0))
        .collect();
    FftPlanner::<f64>::new()
        .plan_fft_forward(n)
        .process(&mut buffer);

    let scale = 2.0 / n as f64;
    buffer[..n / 2].iter().map(|c| scale * c.norm()).collect()
}

/// Indices of strict local maxima above `threshold`. Endpoints and
/// plateaus never qualify.
pub fn find_peaks(values: &[f64], threshold: f64) -> Vec<usize> {
    values
        .windows(3)
        .enumerate()
        .filter(|(_, w)| w[1] > w[0] && w[1] > w[2] && w[1] > threshold)
        .map(|(i, _)| i + 1)
        .collect()
}

/// Runs the full decomposition over daily closes (1-day sampling).
pub fn compute_spectrum(closes: &[f64]) -> Result<SpectralAnalysis, AnalysisError> {
    let n = closes.len();
    if n < MIN_OBSERVATIONS {
        return Err(AnalysisError::InsufficientObservations {
            required: MIN_OBSERVATIONS,
            actual: n,
        });
    }

    let amplitude = amplitude_spectrum(closes);
    let bin_width = 1.0 / n as f64;

    // walk bins high to low so periods come out ascending; bin 0 is dropped
    let (periods, power): (Vec<f64>, Vec<f64>) = (1..amplitude.len())
        .rev()
        .map(|k| (1.0 / (k as f64 * bin_width), amplitude[k]))
        .filter(|(period, _)| (MIN_PERIOD_DAYS..=MAX_PERIOD_DAYS).contains(period))
        .unzip();

    let mut dominant_periods: Vec<f64> = if power.is_empty() {
        Vec::new()
    } else {
        let threshold = power.iter().mean() + power.iter().population_std_dev();
        find_peaks(&power, threshold)
            .into_iter()
            .map(|i| periods[i])
            .collect()
    };
    dominant_periods.sort_by(|a, b| b.total_cmp(a));

    Ok(SpectralAnalysis {
        periods,
        power,
        dominant_periods,
    })
}

pub async fn analyze_cycles(
    provider: &dyn PriceProvider,
    benchmark: &str,
    timeout: Duration,
) -> Result<SpectralAnalysis, AnalysisError> {
    info!("calculating FFT");
    let series = fetch_with_timeout(provider, benchmark, SPECTRAL_PERIOD, timeout).await?;
    let analysis = compute_spectrum(&series.closes())?;
    info!(
        bins = analysis.periods.len(),
        dominant = ?analysis.dominant_periods,
        "spectral analysis finished"
    );
    Ok(analysis)
}
