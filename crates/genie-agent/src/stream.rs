use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use crate::Result;

/// Buffer between a producing runtime task and the consumer.
pub const DELTA_CHANNEL_CAPACITY: usize = 32;

// ─── DeltaStream ──────────────────────────────────────────────────────────

/// A lazy, finite, forward-only sequence of text deltas from one agent call.
///
/// Backed by a Tokio mpsc channel. The runtime that produced it owns a
/// background task that forwards deltas until the upstream call finishes.
/// Dropping `DeltaStream` closes the receiver, so the producer exits on its
/// next send and the upstream call is abandoned. A stream cannot be
/// restarted; issue a fresh invocation instead.
///
/// ```rust,ignore
/// use futures::StreamExt;
///
/// let mut stream = runtime.stream(&call).await?;
/// while let Some(delta) = stream.next().await {
///     print!("{}", delta?);
/// }
/// ```
pub struct DeltaStream {
    rx: mpsc::Receiver<Result<String>>,
}

impl DeltaStream {
    /// A connected sender/stream pair for runtimes that produce deltas from a
    /// spawned task.
    pub fn channel() -> (mpsc::Sender<Result<String>>, Self) {
        let (tx, rx) = mpsc::channel(DELTA_CHANNEL_CAPACITY);
        (tx, Self { rx })
    }

    /// A stream whose deltas are all known up front.
    pub fn ready<I>(chunks: I) -> Self
    where
        I: IntoIterator<Item = Result<String>>,
    {
        let chunks: Vec<_> = chunks.into_iter().collect();
        let (tx, rx) = mpsc::channel(chunks.len().max(1));
        for chunk in chunks {
            // Capacity equals the item count, so this cannot fail.
            let _ = tx.try_send(chunk);
        }
        Self { rx }
    }
}

impl Stream for DeltaStream {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
