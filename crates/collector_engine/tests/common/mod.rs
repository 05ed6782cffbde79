#![allow(dead_code)]

use std::path::Path;
use std::sync::Once;
use std::time::Duration;

use collector_engine::{CollectorConfig, DEFAULT_FIELDS};
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockBuilder, MockServer, ResponseTemplate};

pub const API_PATH: &str = "/1471000/HtfsInfoService03/getHtfsItem01";
pub const TEST_KEY: &str = "test-service-key";

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(collector_logging::initialize_for_tests);
}

/// Record with every exported field filled as `<FIELD>-<n>`.
pub fn full_item(n: u64) -> Value {
    let mut item = json!({ "SEQ": n });
    for field in DEFAULT_FIELDS {
        item[field] = json!(format!("{field}-{n}"));
    }
    item
}

pub fn ok_envelope(total_count: u64, num_of_rows: u64, items: Vec<Value>) -> Value {
    let wrappers: Vec<Value> = items.into_iter().map(|item| json!({ "item": item })).collect();
    json!({
        "header": { "resultCode": "00", "resultMsg": "NORMAL SERVICE." },
        "body": {
            "totalCount": total_count,
            "numOfRows": num_of_rows,
            "items": wrappers
        }
    })
}

pub fn error_envelope(code: &str, msg: &str) -> Value {
    json!({ "header": { "resultCode": code, "resultMsg": msg } })
}

/// Items on `page` for a collection of `total_count` records split by `rows`.
pub fn page_items(page: u64, rows: u64, total_count: u64) -> Vec<Value> {
    let start = (page - 1) * rows;
    let end = (start + rows).min(total_count);
    (start..end).map(full_item).collect()
}

pub fn page_request(page: u64) -> MockBuilder {
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(query_param("pageNo", page.to_string()))
}

pub fn page_mock(page: u64, body: Value) -> Mock {
    page_request(page).respond_with(ResponseTemplate::new(200).set_body_json(body))
}

/// Mounts one successful response per page of the collection.
pub async fn mount_collection(server: &MockServer, total_count: u64, rows: u64) {
    let pages = total_count.div_ceil(rows);
    for page in 1..=pages {
        page_mock(page, ok_envelope(total_count, rows, page_items(page, rows, total_count)))
            .expect(1)
            .mount(server)
            .await;
    }
}

pub fn test_config(server: &MockServer, rows: u32, output_dir: &Path) -> CollectorConfig {
    let mut config = CollectorConfig::new(TEST_KEY);
    config.base_url = format!("{}{}", server.uri(), API_PATH);
    config.num_of_rows = rows;
    config.retry.delay = Duration::from_millis(10);
    config.export.output_dir = output_dir.to_path_buf();
    config
}

pub fn seqs(items: &[collector_engine::ItemRecord]) -> Vec<u64> {
    items
        .iter()
        .map(|item| item["SEQ"].as_u64().expect("SEQ"))
        .collect()
}
