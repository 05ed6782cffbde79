use anyhow::Context;
use collector_engine::{
    Collector, CollectorConfig, Completion, ExportOutcome, LogProgressSink, RunReport,
};
use collector_logging::{collector_info, collector_warn};

/// Loads the configuration, collects every page and writes the spreadsheet.
pub fn run() -> anyhow::Result<RunReport> {
    let config = CollectorConfig::from_env().context("configuration error")?;
    collector_info!(
        "starting collection from {} ({} rows per page)",
        config.base_url,
        config.num_of_rows
    );

    let collector = Collector::from_config(config).context("failed to set up the HTTP client")?;
    let today = chrono::Local::now().date_naive();
    collector
        .run_blocking(&LogProgressSink, today)
        .context("data collection failed")
}

pub fn log_report(report: &RunReport) {
    let message = summary(report);
    if report.is_partial() {
        collector_warn!("{message}");
    } else {
        collector_info!("{message}");
    }
}

fn summary(report: &RunReport) -> String {
    let mut message = format!("collected {} of {} records", report.fetched, report.expected);
    match &report.export {
        ExportOutcome::Written(summary) => {
            message.push_str(&format!("; saved to '{}'", summary.output_path.display()));
        }
        ExportOutcome::Skipped => message.push_str("; no data to save"),
    }
    if let Completion::Exhausted { page, attempts, .. } = &report.completion {
        message.push_str(&format!(
            "; page {page} failed after {attempts} attempts, fewer records than expected may be present"
        ));
    }
    message
}
