//! Collector engine: paginated fetch with retries, and spreadsheet export.
mod config;
mod engine;
mod envelope;
mod export;
mod fetch;
mod paginate;
mod params;
mod persist;
mod types;

pub use config::{
    CollectorConfig, ConfigError, DEFAULT_BASE_URL, ENV_API_KEY, ENV_BASE_URL, ENV_MAX_RETRIES,
    ENV_NUM_OF_ROWS, ENV_OUTPUT_DIR, ENV_REQUEST_TIMEOUT_SECS, ENV_RETRY_DELAY_MS,
};
pub use engine::{Collector, RunReport};
pub use envelope::{decode_page, ApiEnvelope, Page, SUCCESS_CODE};
pub use export::{
    build_workbook, clean_text, export_filename, export_records, project_record, CellValue,
    ExportError, ExportOptions, ExportOutcome, ExportSummary, DEFAULT_FIELDS, MAX_CELL_CHARS,
};
pub use fetch::{
    ApiClient, ChannelProgressSink, FetchSettings, LogProgressSink, ProgressSink,
    ReqwestApiClient,
};
pub use paginate::{fetch_all_pages, page_count, RetryPolicy};
pub use params::RequestParams;
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use types::{
    CollectError, CollectEvent, Completion, FailureKind, FetchError, FetchOutcome, ItemRecord,
    PageNo,
};
