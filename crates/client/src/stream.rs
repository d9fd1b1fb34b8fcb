//! The read loop: response chunks in, ordered events out.

use futures::{Stream, StreamExt};
use shared::events::RunEvent;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{BoxError, StreamError};
use crate::sse::SseParser;

/// Default bound for the event channel between the pump and its
/// subscriber. The pump reads one chunk at a time and waits on the
/// channel, so a slow subscriber delays the next read instead of
/// growing a queue.
pub const EVENT_CHANNEL_CAPACITY: usize = 32;

/// How a finished pump ended; failures are reported separately through
/// [`StreamError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The source was read to the end and the trailing frame flushed.
    Completed,
    /// The subscriber cancelled (token fired or receiver dropped). The
    /// source was released without a flush.
    Cancelled,
}

/// Drive one response body to completion, decoding frames into events
/// and delivering them to `tx` in arrival order.
///
/// One read-decode-emit cycle at a time: events of a chunk are sent
/// before the next chunk is read, so at most one chunk plus one partial
/// frame is buffered here. The source is dropped, and with it released,
/// on every exit path.
pub async fn pump_events<S, B, E>(
    source: S,
    tx: &mpsc::Sender<RunEvent>,
    cancel: &CancellationToken,
) -> Result<StreamOutcome, StreamError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<BoxError>,
{
    tokio::pin!(source);
    let mut parser = SseParser::new();

    loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("stream cancelled, discarding buffered state");
                return Ok(StreamOutcome::Cancelled);
            }
            chunk = source.next() => chunk,
        };

        match chunk {
            None => break,
            Some(Err(err)) => return Err(StreamError::Transport(err.into())),
            Some(Ok(bytes)) => {
                for payload in parser.feed(bytes.as_ref()) {
                    if !deliver(tx, cancel, RunEvent::decode(&payload)).await {
                        return Ok(StreamOutcome::Cancelled);
                    }
                }
            }
        }
    }

    if let Some(payload) = parser.finish() {
        if !deliver(tx, cancel, RunEvent::decode(&payload)).await {
            return Ok(StreamOutcome::Cancelled);
        }
    }
    Ok(StreamOutcome::Completed)
}

/// Send one event, giving up if cancellation wins the race or the
/// subscriber has gone away. `false` means the pump should stop.
async fn deliver(tx: &mpsc::Sender<RunEvent>, cancel: &CancellationToken, event: RunEvent) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        sent = tx.send(event) => sent.is_ok(),
    }
}
