//! This module contains the engine pass: scan, alert, then the advanced
//! correlation and spectral sections, each persisted on its own.

use crate::alerts::{self, Alert};
use crate::correlation::{self, CorrelationMap};
use crate::error::AnalysisError;
use crate::klines::PriceProvider;
use crate::notifier::NotificationSink;
use crate::scanner::{self, ScanTable};
use crate::spectral::{self, SpectralAnalysis};
use crate::storage_utils::{AsyncStorageManager, EngineConfig};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Persisted advanced-analysis result. A section that failed is left out
/// and its reason recorded in `error`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdvancedAnalysis {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation: Option<CorrelationMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fft_analysis: Option<SpectralAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AdvancedAnalysis {
    pub fn assemble(
        correlation: Result<CorrelationMap, AnalysisError>,
        spectral: Result<SpectralAnalysis, AnalysisError>,
    ) -> Self {
        let mut errors = Vec::new();

        let correlation = correlation
            .inspect_err(|e| warn!(error = %e, "correlation section failed"))
            .map_err(|e| errors.push(e.to_string()))
            .ok();
        let fft_analysis = spectral
            .inspect_err(|e| warn!(error = %e, "spectral section failed"))
            .map_err(|e| errors.push(e.to_string()))
            .ok();

        Self {
            correlation,
            fft_analysis,
            error: (!errors.is_empty()).then(|| errors.join("; ")),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            error: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn is_partial(&self) -> bool {
        self.error.is_some()
    }
}

/// Runs both advanced sections concurrently. Never fails: section errors
/// end up in the returned value.
pub async fn run_advanced_analysis(
    provider: &dyn PriceProvider,
    config: &EngineConfig,
) -> AdvancedAnalysis {
    info!("starting advanced analysis");
    let timeout = config.request_timeout();

    let (correlation, spectral) = tokio::join!(
        correlation::analyze_correlation(
            provider,
            &config.benchmark,
            &config.correlation_peers,
            config.correlation_window,
            timeout,
        ),
        spectral::analyze_cycles(provider, &config.benchmark, timeout),
    );

    let result = AdvancedAnalysis::assemble(correlation, spectral);
    info!(partial = result.is_partial(), "advanced analysis finished");
    result
}

/// What one engine pass produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub scan: ScanTable,
    pub alerts: Vec<Alert>,
    pub notified: bool,
    pub advanced: AdvancedAnalysis,
}

/// Run coordinator. Tickers, file names and collaborators are fixed at
/// construction; every `run` is an independent pass.
pub struct Engine {
    provider: Arc<dyn PriceProvider>,
    sink: Arc<dyn NotificationSink>,
    storage: AsyncStorageManager,
    config: EngineConfig,
}

impl Engine {
    pub fn new(
        provider: Arc<dyn PriceProvider>,
        sink: Arc<dyn NotificationSink>,
        storage: AsyncStorageManager,
        config: EngineConfig,
    ) -> Self {
        Self {
            provider,
            sink,
            storage,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// One full pass. The scan branch and the advanced branch run side by
    /// side; nothing here aborts the run.
    pub async fn run(&self) -> RunReport {
        let ((scan, alerts, notified), advanced) =
            tokio::join!(self.scan_and_alert(), self.advanced_guarded());

        info!("engine run finished");
        RunReport {
            scan,
            alerts,
            notified,
            advanced,
        }
    }

    async fn scan_and_alert(&self) -> (ScanTable, Vec<Alert>, bool) {
        let table = scanner::scan_market(
            self.provider.as_ref(),
            &self.config.tickers,
            self.config.request_timeout(),
            self.config.max_concurrent_requests,
        )
        .await;

        if table.is_empty() {
            warn!("no scan data was generated");
            return (table, Vec::new(), false);
        }

        match self.storage.save(&self.config.scan_output, &table).await {
            Ok(()) => info!(path = ?self.storage.path_for(&self.config.scan_output), "scan results saved"),
            Err(e) => error!(error = %e, "could not persist scan results"),
        }

        let alerts = alerts::evaluate(&table, &self.config.benchmark);
        let notified = alerts::dispatch(&alerts, self.sink.as_ref()).await;
        (table, alerts, notified)
    }

    /// The advanced pipeline runs on its own task so that even a panic
    /// inside it becomes an `error` entry instead of ending the run.
    async fn advanced_guarded(&self) -> AdvancedAnalysis {
        let provider = Arc::clone(&self.provider);
        let config = self.config.clone();

        let handle =
            tokio::spawn(async move { run_advanced_analysis(provider.as_ref(), &config).await });
        let advanced = match handle.await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "advanced analysis aborted");
                AdvancedAnalysis::failed(format!("advanced analysis aborted: {e}"))
            }
        };

        match self.storage.save(&self.config.advanced_output, &advanced).await {
            Ok(()) => info!(path = ?self.storage.path_for(&self.config.advanced_output), "advanced analysis saved"),
            Err(e) => error!(error = %e, "could not persist advanced analysis"),
        }
        advanced
    }
}
