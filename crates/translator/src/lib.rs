pub mod aggregate;
pub mod links;
pub mod request;
pub mod stream;
pub mod thinking;

pub use aggregate::Aggregator;
pub use request::{build_grok_request, extract_messages};
pub use stream::{ChunkMeta, Frame, StreamTranslator};
pub use thinking::ThinkingState;
