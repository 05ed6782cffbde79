//! The page loop: discovery probe, then every page in order with bounded
//! per-page retries.
use std::time::Duration;

use crate::fetch::{ApiClient, ProgressSink};
use crate::{
    CollectError, CollectEvent, Completion, FailureKind, FetchError, FetchOutcome, ItemRecord,
    PageNo, RequestParams,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per page, including the first one.
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(1),
        }
    }
}

struct PageFailure {
    attempts: u32,
    error: FetchError,
}

/// Fetches every page of the collection and concatenates the items in page
/// order.
///
/// The probe response doubles as page 1, so `N` pages cost `N` requests when
/// nothing fails. A failing probe is fatal. A later page that runs out of
/// attempts ends the loop and the items gathered so far are returned with
/// [`Completion::Exhausted`].
pub async fn fetch_all_pages(
    client: &dyn ApiClient,
    mut params: RequestParams,
    policy: &RetryPolicy,
    sink: &dyn ProgressSink,
) -> Result<FetchOutcome, CollectError> {
    params.set_page(1);
    let probe = client
        .get_page(&params)
        .await
        .map_err(CollectError::Discovery)?;
    let mut requests = 1;

    let total_pages =
        page_count(probe.total_count, probe.num_of_rows).map_err(CollectError::Discovery)?;
    sink.emit(CollectEvent::Discovered {
        total_count: probe.total_count,
        num_of_rows: probe.num_of_rows,
        total_pages,
    });

    let capacity = usize::try_from(probe.total_count).unwrap_or(usize::MAX).min(1 << 16);
    let mut items: Vec<ItemRecord> = Vec::with_capacity(capacity);
    let mut first_page = Some(probe.items);
    let mut completion = Completion::Complete;

    for page in 1..=total_pages {
        params.set_page(page);
        let page_items = match first_page.take() {
            Some(probed) => probed,
            None => match fetch_page(client, &params, page, policy, sink, &mut requests).await {
                Ok(page_items) => page_items,
                Err(PageFailure { attempts, error }) => {
                    sink.emit(CollectEvent::PageAbandoned {
                        page,
                        attempts,
                        error: error.clone(),
                    });
                    completion = Completion::Exhausted {
                        page,
                        attempts,
                        last_error: error,
                    };
                    break;
                }
            },
        };
        sink.emit(CollectEvent::PageFetched {
            page,
            total_pages,
            items: page_items.len(),
        });
        items.extend(page_items);
    }

    Ok(FetchOutcome {
        items,
        total_count: probe.total_count,
        total_pages,
        requests,
        completion,
    })
}

async fn fetch_page(
    client: &dyn ApiClient,
    params: &RequestParams,
    page: PageNo,
    policy: &RetryPolicy,
    sink: &dyn ProgressSink,
    requests: &mut u32,
) -> Result<Vec<ItemRecord>, PageFailure> {
    let max_retries = policy.max_retries.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        *requests += 1;
        match client.get_page(params).await {
            Ok(fetched) => return Ok(fetched.items),
            Err(error) if error.is_retryable() && attempt < max_retries => {
                sink.emit(CollectEvent::RetryScheduled {
                    page,
                    attempt,
                    max_retries,
                    error,
                });
                tokio::time::sleep(policy.delay).await;
            }
            Err(error) => {
                return Err(PageFailure {
                    attempts: attempt,
                    error,
                })
            }
        }
    }
}

/// `ceil(total_count / num_of_rows)`; zero when there is nothing to fetch.
pub fn page_count(total_count: u64, num_of_rows: u64) -> Result<PageNo, FetchError> {
    if total_count == 0 {
        return Ok(0);
    }
    if num_of_rows == 0 {
        return Err(FetchError::new(
            FailureKind::Decode,
            format!("numOfRows is 0 but totalCount is {total_count}"),
        ));
    }
    PageNo::try_from(total_count.div_ceil(num_of_rows)).map_err(|_| {
        FetchError::new(
            FailureKind::Decode,
            format!("page count for totalCount {total_count} does not fit"),
        )
    })
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;
    use crate::envelope::Page;

    /// Replies per page from a queue of scripted results; an empty queue
    /// means success with `rows` generated items.
    struct ScriptedClient {
        total_count: u64,
        rows: u64,
        script: Mutex<Vec<(PageNo, VecDeque<Result<(), FetchError>>)>>,
        calls: Mutex<Vec<PageNo>>,
    }

    impl ScriptedClient {
        fn new(total_count: u64, rows: u64) -> Self {
            Self {
                total_count,
                rows,
                script: Mutex::new(Vec::new()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing(self, page: PageNo, failures: usize) -> Self {
            let queue: VecDeque<Result<(), FetchError>> = (0..failures)
                .map(|_| Err(FetchError::new(FailureKind::HttpStatus(503), "unavailable")))
                .collect();
            self.script.lock().unwrap().push((page, queue));
            self
        }

        fn calls(&self) -> Vec<PageNo> {
            self.calls.lock().unwrap().clone()
        }

        fn page_items(&self, page: PageNo) -> Vec<ItemRecord> {
            let start = (u64::from(page) - 1) * self.rows;
            let end = (start + self.rows).min(self.total_count);
            (start..end)
                .map(|n| {
                    let mut record = ItemRecord::new();
                    record.insert("SEQ".to_string(), json!(n));
                    record
                })
                .collect()
        }
    }

    #[async_trait::async_trait]
    impl ApiClient for ScriptedClient {
        async fn get_page(&self, params: &RequestParams) -> Result<Page, FetchError> {
            let page = params.page().expect("pageNo set");
            self.calls.lock().unwrap().push(page);
            let scripted = self
                .script
                .lock()
                .unwrap()
                .iter_mut()
                .find(|(p, _)| *p == page)
                .and_then(|(_, queue)| queue.pop_front());
            if let Some(Err(err)) = scripted {
                return Err(err);
            }
            Ok(Page {
                total_count: self.total_count,
                num_of_rows: self.rows,
                items: self.page_items(page),
            })
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<CollectEvent>>,
    }

    impl ProgressSink for RecordingSink {
        fn emit(&self, event: CollectEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    fn params() -> RequestParams {
        RequestParams::new("key", 100, "json")
    }

    fn seqs(items: &[ItemRecord]) -> Vec<u64> {
        items.iter().map(|r| r["SEQ"].as_u64().unwrap()).collect()
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            delay: Duration::from_millis(500),
        }
    }

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(page_count(250, 100).unwrap(), 3);
        assert_eq!(page_count(200, 100).unwrap(), 2);
        assert_eq!(page_count(1, 100).unwrap(), 1);
        assert_eq!(page_count(0, 0).unwrap(), 0);
        assert_eq!(page_count(5, 0).unwrap_err().kind, FailureKind::Decode);
    }

    #[tokio::test]
    async fn empty_collection_returns_no_items() {
        let client = ScriptedClient::new(0, 100);
        let sink = RecordingSink::default();
        let outcome = fetch_all_pages(&client, params(), &fast_policy(), &sink)
            .await
            .unwrap();
        assert!(outcome.items.is_empty());
        assert_eq!(outcome.total_pages, 0);
        assert!(outcome.completion.is_complete());
        assert_eq!(client.calls(), vec![1]);
    }

    #[tokio::test]
    async fn multi_page_collection_keeps_page_order() {
        let client = ScriptedClient::new(250, 100);
        let sink = RecordingSink::default();
        let outcome = fetch_all_pages(&client, params(), &fast_policy(), &sink)
            .await
            .unwrap();
        assert_eq!(outcome.items.len(), 250);
        assert_eq!(seqs(&outcome.items), (0..250).collect::<Vec<_>>());
        assert_eq!(outcome.total_pages, 3);
        assert_eq!(outcome.requests, 3);
        assert_eq!(client.calls(), vec![1, 2, 3]);

        let fetched: Vec<_> = sink
            .events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                CollectEvent::PageFetched { page, items, .. } => Some((*page, *items)),
                _ => None,
            })
            .collect();
        assert_eq!(fetched, vec![(1, 100), (2, 100), (3, 50)]);
    }

    #[tokio::test(start_paused = true)]
    async fn page_recovers_after_two_failures() {
        let client = ScriptedClient::new(250, 100).failing(2, 2);
        let sink = RecordingSink::default();
        let policy = fast_policy();

        let started = tokio::time::Instant::now();
        let outcome = fetch_all_pages(&client, params(), &policy, &sink)
            .await
            .unwrap();

        assert_eq!(started.elapsed(), policy.delay * 2);
        assert_eq!(outcome.items.len(), 250);
        assert!(outcome.completion.is_complete());
        assert_eq!(client.calls(), vec![1, 2, 2, 2, 3]);

        let retries: Vec<_> = sink
            .events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                CollectEvent::RetryScheduled { page, attempt, .. } => Some((*page, *attempt)),
                _ => None,
            })
            .collect();
        assert_eq!(retries, vec![(2, 1), (2, 2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_page_stops_the_loop() {
        let client = ScriptedClient::new(500, 100).failing(3, 3);
        let sink = RecordingSink::default();

        let outcome = fetch_all_pages(&client, params(), &fast_policy(), &sink)
            .await
            .unwrap();

        assert_eq!(seqs(&outcome.items), (0..200).collect::<Vec<_>>());
        assert_eq!(client.calls(), vec![1, 2, 3, 3, 3]);
        assert_eq!(outcome.requests, 5);
        match outcome.completion {
            Completion::Exhausted {
                page,
                attempts,
                last_error,
            } => {
                assert_eq!(page, 3);
                assert_eq!(attempts, 3);
                assert_eq!(last_error.kind, FailureKind::HttpStatus(503));
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert!(sink
            .events
            .lock()
            .unwrap()
            .iter()
            .any(|e| matches!(e, CollectEvent::PageAbandoned { page: 3, .. })));
    }

    #[tokio::test]
    async fn failing_probe_is_fatal_and_not_retried() {
        let client = ScriptedClient::new(250, 100).failing(1, 1);
        let sink = RecordingSink::default();

        let err = fetch_all_pages(&client, params(), &fast_policy(), &sink)
            .await
            .unwrap_err();

        match err {
            CollectError::Discovery(inner) => {
                assert_eq!(inner.kind, FailureKind::HttpStatus(503))
            }
            other => panic!("expected discovery error, got {other:?}"),
        }
        assert_eq!(client.calls(), vec![1]);
        assert!(sink.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_page_size_with_records_is_discovery_error() {
        let client = ScriptedClient::new(10, 0);
        let err = fetch_all_pages(&client, params(), &fast_policy(), &RecordingSink::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CollectError::Discovery(e) if e.kind == FailureKind::Decode));
    }
}
