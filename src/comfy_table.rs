use crate::analysis::{AdvancedAnalysis, RunReport};
use crate::scanner::{RsiSignal, ScanRow, Trend};
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ContentArrangement, Table,
    modifiers::UTF8_ROUND_CORNERS, presets::UTF8_BORDERS_ONLY,
};

fn signal_color(signal: RsiSignal) -> Color {
    match signal {
        RsiSignal::Overbought => Color::Rgb { r: 255, g: 140, b: 0 },
        RsiSignal::Oversold => Color::Rgb { r: 0, g: 200, b: 0 },
        RsiSignal::Neutral => Color::DarkGrey,
    }
}

fn trend_color(trend: Trend) -> Color {
    match trend {
        Trend::StrongBullish => Color::Rgb { r: 0, g: 255, b: 0 },
        Trend::Bullish => Color::Rgb { r: 0, g: 160, b: 0 },
        Trend::Bearish => Color::Rgb { r: 220, g: 0, b: 0 },
    }
}

fn pct_cell(value: f64) -> Cell {
    let color = if value >= 0.0 {
        Color::Rgb { r: 0, g: 200, b: 0 }
    } else {
        Color::Rgb { r: 220, g: 0, b: 0 }
    };
    Cell::new(format!("{:.2}%", value))
        .fg(color)
        .set_alignment(CellAlignment::Right)
}

pub fn scan_table(rows: &[ScanRow]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_BORDERS_ONLY)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Asset").add_attribute(Attribute::Bold),
            Cell::new("Last Price")
                .add_attribute(Attribute::Bold)
                .set_alignment(CellAlignment::Right),
            Cell::new("Daily Change (%)")
                .add_attribute(Attribute::Bold)
                .set_alignment(CellAlignment::Right),
            Cell::new("RSI (14)")
                .add_attribute(Attribute::Bold)
                .set_alignment(CellAlignment::Right),
            Cell::new("RSI Signal").add_attribute(Attribute::Bold),
            Cell::new("Trend").add_attribute(Attribute::Bold),
            Cell::new("From SMA200 (%)")
                .add_attribute(Attribute::Bold)
                .set_alignment(CellAlignment::Right),
        ]);

    for row in rows {
        table.add_row(vec![
            Cell::new(&row.ticker).fg(Color::Cyan),
            Cell::new(format!("{:.4}", row.last_price)).set_alignment(CellAlignment::Right),
            pct_cell(row.daily_change_pct),
            Cell::new(format!("{:.1}", row.rsi_14)).set_alignment(CellAlignment::Right),
            Cell::new(row.rsi_signal).fg(signal_color(row.rsi_signal)),
            Cell::new(row.trend).fg(trend_color(row.trend)),
            pct_cell(row.distance_from_sma200_pct),
        ]);
    }
    table
}

pub fn advanced_summary(advanced: &AdvancedAnalysis) -> String {
    let mut lines = Vec::new();

    if let Some(error) = &advanced.error {
        lines.push(format!("Advanced analysis incomplete: {}", error));
    }

    if let Some(correlation) = &advanced.correlation {
        for (pair, value) in correlation {
            match value {
                Some(v) => lines.push(format!("Correlation {}: {:.3}", pair, v)),
                None => lines.push(format!("Correlation {}: n/a", pair)),
            }
        }
    }

    if let Some(fft) = &advanced.fft_analysis {
        let cycles: Vec<String> = fft
            .dominant_periods
            .iter()
            .map(|p| format!("{:.1}", p))
            .collect();
        lines.push(format!("Dominant cycles (days): [{}]", cycles.join(", ")));
    }

    lines.join("\n")
}

pub fn render(report: &RunReport) -> String {
    let scan = if report.scan.is_empty() {
        "No scan data found.".to_string()
    } else {
        scan_table(&report.scan).to_string()
    };
    format!(
        "\n{}\nAlerts: {}\n{}\n",
        scan,
        report.alerts.len(),
        advanced_summary(&report.advanced)
    )
}
