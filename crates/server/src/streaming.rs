use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use futures::stream::StreamExt;
use grok_bridge_translator::Frame;
use std::convert::Infallible;
use std::time::Duration;

/// Build an SSE response from a stream of frames.
///
/// Every frame becomes one `data:` event; `Frame::Done` renders as
/// `data: [DONE]`. Idle periods are filled with comment keep-alives.
pub fn build_sse_response(
    frames: impl Stream<Item = Frame> + Send + 'static,
    keepalive_seconds: u64,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = frames.map(|frame| Ok(Event::default().data(frame.data())));

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(keepalive_seconds.max(1)))
            .text(""),
    )
}
