use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use crate::analysis::types::AnalysisRecord;

const HEADER: &str = "timestamp,checkin,checkout,nights,adults,market_source,competitors,suggested_price,discount_pct,reference_avg,adjusted_price,avg_rain_pct,auto_generated,strategy";

/// Append-only CSV audit log, one row per analysis.
pub struct CsvLogger {
    log_path: String,
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

impl CsvLogger {
    pub fn new(log_path: String) -> Result<Self> {
        // Create CSV file with headers if it doesn't exist
        if !Path::new(&log_path).exists() {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .open(&log_path)
                .with_context(|| format!("Failed to create CSV log: {}", log_path))?;

            writeln!(file, "{}", HEADER)?;
        }

        Ok(Self { log_path })
    }

    pub fn log_analysis(&self, record: &AnalysisRecord) -> Result<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.log_path)
            .with_context(|| format!("Failed to open CSV log: {}", self.log_path))?;

        let (adjusted, rain) = match &record.weather_adjustment {
            Some(adj) => (format!("{:.2}", adj.adjusted_price), format!("{:.1}", adj.avg_rain_probability)),
            None => (String::new(), String::new()),
        };

        writeln!(
            file,
            "{},{},{},{},{},{},{},{:.2},{:.1},{:.2},{},{},{},{}",
            record.created_at.to_rfc3339(),
            record.request.stay.checkin,
            record.request.stay.checkout,
            record.nights,
            record.request.adults,
            record.market_source.as_str(),
            record.competitors.len(),
            record.pricing.suggested_price,
            record.pricing.discount_percentage,
            record.pricing.reference_avg,
            adjusted,
            rain,
            record.request.auto_generated,
            quote(&record.pricing.strategy_label),
        )?;

        Ok(())
    }
}
