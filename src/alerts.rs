use crate::notifier::NotificationSink;
use crate::scanner::{RSI_OVERBOUGHT, RSI_OVERSOLD, RsiSignal, ScanRow};
use std::fmt;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    /// Benchmark RSI under the oversold line.
    Oversold,
    /// Benchmark RSI over the overbought line.
    Overbought,
    /// Any other asset flagged oversold by the scan.
    Opportunity,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub kind: AlertKind,
    pub ticker: String,
    pub rsi: f64,
}

/// "BTC-USD" -> "BTC"
pub fn base_symbol(ticker: &str) -> &str {
    ticker.split('-').next().unwrap_or(ticker)
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            AlertKind::Oversold => write!(
                f,
                "{} Alert: Oversold! RSI: {:.2}",
                base_symbol(&self.ticker),
                self.rsi
            ),
            AlertKind::Overbought => write!(
                f,
                "{} Alert: Overbought! RSI: {:.2}",
                base_symbol(&self.ticker),
                self.rsi
            ),
            AlertKind::Opportunity => write!(
                f,
                "Opportunity Alert: {} is Oversold. RSI: {:.2}",
                self.ticker, self.rsi
            ),
        }
    }
}

/// Derives alerts from a finished scan. Benchmark rules run first, then
/// every other oversold row in table order.
pub fn evaluate(table: &[ScanRow], benchmark: &str) -> Vec<Alert> {
    let mut alerts = Vec::new();

    if let Some(row) = table.iter().find(|r| r.ticker == benchmark) {
        if row.rsi_14 < RSI_OVERSOLD {
            alerts.push(Alert {
                kind: AlertKind::Oversold,
                ticker: row.ticker.clone(),
                rsi: row.rsi_14,
            });
        }
        if row.rsi_14 > RSI_OVERBOUGHT {
            alerts.push(Alert {
                kind: AlertKind::Overbought,
                ticker: row.ticker.clone(),
                rsi: row.rsi_14,
            });
        }
    }

    alerts.extend(
        table
            .iter()
            .filter(|r| r.rsi_signal == RsiSignal::Oversold && r.ticker != benchmark)
            .map(|r| Alert {
                kind: AlertKind::Opportunity,
                ticker: r.ticker.clone(),
                rsi: r.rsi_14,
            }),
    );

    alerts
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMessage {
    pub subject: String,
    pub body: String,
}

/// One composite message for the whole batch, or `None` when quiet.
pub fn compose(alerts: &[Alert]) -> Option<AlertMessage> {
    if alerts.is_empty() {
        return None;
    }

    let lines: Vec<String> = alerts.iter().map(Alert::to_string).collect();
    let subject = format!("Crypto Alert: {} New Events", alerts.len());
    let body = format!(
        "The monitoring system has detected the following alerts:\n\n{}\n\n-- End of message --",
        lines.join("\n")
    );

    Some(AlertMessage { subject, body })
}

/// Logs the batch and hands it to the sink. Sink failures are logged and
/// swallowed. Returns whether the sink accepted the message.
pub async fn dispatch(alerts: &[Alert], sink: &dyn NotificationSink) -> bool {
    let Some(message) = compose(alerts) else {
        info!("no new alerts");
        return false;
    };

    info!(count = alerts.len(), "found new alerts\n{}", message.body);

    match sink.send(&message.subject, &message.body).await {
        Ok(()) => {
            info!("alert notification sent");
            true
        }
        Err(e) => {
            error!(error = %e, "could not send alert notification");
            false
        }
    }
}
