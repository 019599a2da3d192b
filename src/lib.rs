//! Daily crypto signal engine: technical scan with alerting, plus
//! cross-asset correlation and cyclical (FFT) analysis of the benchmark.

pub mod alerts;
pub mod analysis;
pub mod comfy_table;
pub mod correlation;
pub mod deep_dive;
pub mod error;
pub mod indicators;
pub mod klines;
pub mod notifier;
pub mod scanner;
pub mod spectral;
pub mod storage_utils;
