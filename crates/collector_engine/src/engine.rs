use chrono::NaiveDate;
use collector_logging::{collector_info, collector_warn};

use crate::export::{export_records, ExportOutcome};
use crate::fetch::{ApiClient, ProgressSink, ReqwestApiClient};
use crate::paginate::fetch_all_pages;
use crate::{CollectError, CollectorConfig, Completion, FetchError, FetchOutcome};

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub fetched: usize,
    /// `totalCount` announced by the discovery probe.
    pub expected: u64,
    pub completion: Completion,
    pub export: ExportOutcome,
}

impl RunReport {
    /// True when the page loop stopped early and the export may be short.
    pub fn is_partial(&self) -> bool {
        !self.completion.is_complete()
    }
}

/// Drives one collection run: fetch every page, then export.
pub struct Collector<C = ReqwestApiClient> {
    client: C,
    config: CollectorConfig,
}

impl Collector<ReqwestApiClient> {
    pub fn from_config(config: CollectorConfig) -> Result<Self, FetchError> {
        let client = ReqwestApiClient::new(&config.base_url, config.fetch.clone())?;
        Ok(Self::with_client(client, config))
    }
}

impl<C: ApiClient> Collector<C> {
    pub fn with_client(client: C, config: CollectorConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    pub async fn collect(&self, sink: &dyn ProgressSink) -> Result<FetchOutcome, CollectError> {
        fetch_all_pages(
            &self.client,
            self.config.request_params(),
            &self.config.retry,
            sink,
        )
        .await
    }

    pub async fn run(
        &self,
        sink: &dyn ProgressSink,
        today: NaiveDate,
    ) -> Result<RunReport, CollectError> {
        let outcome = self.collect(sink).await?;
        collector_info!(
            "collected {} of {} records",
            outcome.items.len(),
            outcome.total_count
        );
        if let Completion::Exhausted { page, .. } = &outcome.completion {
            collector_warn!(
                "collection stopped at page {page}/{}; fewer records than expected may be present",
                outcome.total_pages
            );
        }

        let export = export_records(&outcome.items, &self.config.export, today)?;
        Ok(RunReport {
            fetched: outcome.items.len(),
            expected: outcome.total_count,
            completion: outcome.completion,
            export,
        })
    }

    /// Runs on a fresh current-thread runtime; requests stay strictly
    /// sequential.
    pub fn run_blocking(
        &self,
        sink: &dyn ProgressSink,
        today: NaiveDate,
    ) -> Result<RunReport, CollectError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(CollectError::Runtime)?;
        runtime.block_on(self.run(sink, today))
    }
}
