use thiserror::Error;

/// Errors raised while fetching price history from a provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network failure or an unreadable response body.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("provider returned HTTP {status} for {ticker}")]
    Status { ticker: String, status: u16 },

    /// HTTP 418/429: the provider is throttling us.
    #[error("rate limited while fetching {0}")]
    RateLimited(String),

    /// The payload parsed but did not have the expected shape.
    #[error("malformed response for {ticker}: {reason}")]
    Decode { ticker: String, reason: String },

    #[error("timed out after {secs}s fetching {ticker}")]
    Timeout { ticker: String, secs: u64 },
}

/// Why a single ticker produced no scan row.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("no price data for {0}")]
    NoData(String),

    /// Fewer than two rows survived the indicator warm-up.
    #[error("{ticker}: only {rows} usable rows after indicator warm-up")]
    InsufficientHistory { ticker: String, rows: usize },
}

/// Failure of one section of the advanced analysis.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("no price data for {0}")]
    NoData(String),

    #[error("Not enough data for FFT analysis (minimum {required} days, got {actual})")]
    InsufficientObservations { required: usize, actual: usize },
}

/// Failure to hand a message to the notification transport.
#[derive(Debug, Clone, Error)]
pub enum NotifyError {
    /// One or more of the out-of-band credentials is not set.
    #[error("missing notification credentials: {}", .0.join(", "))]
    MissingCredentials(Vec<&'static str>),

    #[error("could not build message: {0}")]
    Message(String),

    #[error("transport error: {0}")]
    Transport(String),
}
