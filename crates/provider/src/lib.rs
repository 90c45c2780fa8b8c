pub mod grok;
pub mod ndjson;
pub mod retry;

use std::collections::HashMap;

/// Extract response headers from a reqwest Response into a HashMap.
///
/// Header names are already lower-case in `http`; non-UTF-8 values are skipped.
pub fn extract_headers(resp: &reqwest::Response) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    for (key, value) in resp.headers().iter() {
        if let Ok(v) = value.to_str() {
            headers.insert(key.as_str().to_string(), v.to_string());
        }
    }
    headers
}
