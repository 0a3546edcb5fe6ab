use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::stream::DeltaStream;
use crate::{AgentError, Result};

// ─── Public API ───────────────────────────────────────────────────────────

/// Drain a [`DeltaStream`] into one string.
pub async fn concat(stream: DeltaStream) -> Result<String> {
    collect(stream, &CancellationToken::new(), |_| {}).await
}

/// Consume a [`DeltaStream`], forwarding each delta to `on_delta`, and
/// return the concatenated text.
///
/// If `cancel` fires first, the stream is dropped (abandoning the upstream
/// call) and [`AgentError::Cancelled`] is returned. Partial text is never
/// returned as a result.
pub async fn collect<F>(stream: DeltaStream, cancel: &CancellationToken, mut on_delta: F) -> Result<String>
where
    F: FnMut(&str),
{
    let mut stream = stream;
    let mut text = String::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            next = stream.next() => next,
        };
        match next {
            None => break,
            Some(delta) => {
                let delta = delta?;
                on_delta(&delta);
                text.push_str(&delta);
            }
        }
    }

    Ok(text)
}

// ─── Tests ────────────────────────────────────────────────────────────────
