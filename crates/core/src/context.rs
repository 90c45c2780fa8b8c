use std::time::Instant;

/// Per-request metadata, inserted as an axum `Extension` by the logging middleware.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// UUID v4, also returned to the client as `x-request-id`.
    pub request_id: String,
    pub start_time: Instant,
    pub client_ip: Option<String>,
}

impl RequestContext {
    pub fn new(client_ip: Option<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            start_time: Instant::now(),
            client_ip,
        }
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.start_time.elapsed().as_millis()
    }
}
