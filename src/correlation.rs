//! Rolling return correlation between the benchmark and its peers.

use crate::alerts::base_symbol;
use crate::error::AnalysisError;
use crate::klines::{LookbackPeriod, PriceProvider, PriceSeries, fetch_with_timeout};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, warn};

pub const CORRELATION_PERIOD: LookbackPeriod = LookbackPeriod::ThreeMonths;

/// Pair key -> latest rolling correlation, `None` when not computable.
pub type CorrelationMap = BTreeMap<String, Option<f64>>;

/// Day-over-day fractional returns; one shorter than the input.
pub fn pct_returns(closes: &[f64]) -> Vec<f64> {
    closes.windows(2).map(|w| w[1] / w[0] - 1.0).collect()
}

/// Closes of both series restricted to the dates they share.
pub fn align_closes(a: &PriceSeries, b: &PriceSeries) -> (Vec<f64>, Vec<f64>) {
    let (mut xs, mut ys) = (Vec::new(), Vec::new());
    let (mut i, mut j) = (0, 0);

    while i < a.bars.len() && j < b.bars.len() {
        let (left, right) = (&a.bars[i], &b.bars[j]);
        match left.date.cmp(&right.date) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                xs.push(left.close);
                ys.push(right.close);
                i += 1;
                j += 1;
            }
        }
    }
    (xs, ys)
}

/// Pearson correlation; `None` for mismatched lengths or a flat input.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let cov = x.iter().population_covariance(y.iter());
    let denom = x.iter().population_std_dev() * y.iter().population_std_dev();
    let r = cov / denom;
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}

/// Correlation over the trailing `window` observations of both inputs.
pub fn rolling_correlation_last(x: &[f64], y: &[f64], window: usize) -> Option<f64> {
    if window < 2 || x.len() != y.len() || x.len() < window {
        return None;
    }
    let start = x.len() - window;
    pearson(&x[start..], &y[start..])
}

/// `btc_eth_30d` style key.
pub fn pair_key(benchmark: &str, peer: &str, window: usize) -> String {
    format!(
        "{}_{}_{}d",
        base_symbol(benchmark).to_lowercase(),
        base_symbol(peer).to_lowercase(),
        window
    )
}

pub fn pair_correlation(benchmark: &PriceSeries, peer: &PriceSeries, window: usize) -> Option<f64> {
    let (bench_closes, peer_closes) = align_closes(benchmark, peer);
    rolling_correlation_last(
        &pct_returns(&bench_closes),
        &pct_returns(&peer_closes),
        window,
    )
}

/// Fails only when the benchmark itself is unavailable; a peer without
/// enough history maps to `None`.
pub async fn analyze_correlation(
    provider: &dyn PriceProvider,
    benchmark: &str,
    peers: &[String],
    window: usize,
    timeout: Duration,
) -> Result<CorrelationMap, AnalysisError> {
    info!("calculating correlation");
    let bench = fetch_with_timeout(provider, benchmark, CORRELATION_PERIOD, timeout).await?;
    if bench.is_empty() {
        return Err(AnalysisError::NoData(benchmark.to_string()));
    }

    let fetches = peers
        .iter()
        .map(|peer| fetch_with_timeout(provider, peer, CORRELATION_PERIOD, timeout));
    let series = futures::future::join_all(fetches).await;

    let mut out = CorrelationMap::new();
    for (peer, fetched) in peers.iter().zip(series) {
        let value = match fetched {
            Ok(peer_series) => {
                let value = pair_correlation(&bench, &peer_series, window);
                if value.is_none() {
                    warn!(%peer, window, bars = peer_series.len(), "correlation undefined");
                }
                value
            }
            Err(e) => {
                warn!(%peer, error = %e, "peer history unavailable");
                None
            }
        };
        out.insert(pair_key(benchmark, peer, window), value);
    }
    Ok(out)
}
