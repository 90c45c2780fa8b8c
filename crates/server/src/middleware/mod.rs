pub mod rate_limit;
pub mod request_context;
pub mod request_logging;
