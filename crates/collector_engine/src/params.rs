use std::fmt;

use crate::PageNo;

pub const SERVICE_KEY: &str = "ServiceKey";
pub const PAGE_NO: &str = "pageNo";
pub const NUM_OF_ROWS: &str = "numOfRows";
pub const RESPONSE_TYPE: &str = "type";

/// Query parameters sent with every request, in insertion order.
///
/// Only `pageNo` changes between requests of a run.
#[derive(Clone, PartialEq, Eq)]
pub struct RequestParams {
    pairs: Vec<(String, String)>,
}

impl RequestParams {
    pub fn new(service_key: &str, num_of_rows: u32, response_type: &str) -> Self {
        let mut params = Self { pairs: Vec::new() };
        params.set(SERVICE_KEY, service_key);
        params.set(PAGE_NO, "1");
        params.set(NUM_OF_ROWS, num_of_rows.to_string());
        params.set(RESPONSE_TYPE, response_type);
        params
    }

    /// Inserts or replaces `key`, keeping the original position on replace.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = value,
            None => self.pairs.push((key.to_string(), value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_page(&mut self, page: PageNo) {
        self.set(PAGE_NO, page.to_string());
    }

    pub fn page(&self) -> Option<PageNo> {
        self.get(PAGE_NO).and_then(|p| p.parse().ok())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Debug for RequestParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in self.iter() {
            if key == SERVICE_KEY {
                map.entry(&key, &"<redacted>");
            } else {
                map.entry(&key, &value);
            }
        }
        map.finish()
    }
}
