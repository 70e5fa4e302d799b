use crate::traits::PodWatch;
use bytes::{Bytes, BytesMut};
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use kestrel_core::{ClusterError, Result, WatchEvent};
use std::fmt;

/// Buffers raw chunks until a full line is available
struct LineBuffer<E> {
    inner: BoxStream<'static, std::result::Result<Bytes, E>>,
    buffer: BytesMut,
    finished: bool,
}

/// Trimmed line text; invalid UTF-8 is a decode error for that line only
fn line_text(raw: &[u8]) -> Result<String> {
    std::str::from_utf8(raw)
        .map(|text| text.trim().to_string())
        .map_err(|e| ClusterError::decode(format!("Watch line is not valid UTF-8: {}", e)))
}

impl<E> LineBuffer<E> {
    fn next_line(&mut self) -> Option<Result<String>> {
        let pos = self.buffer.iter().position(|b| *b == b'\n')?;
        let line = self.buffer.split_to(pos + 1);
        Some(line_text(&line))
    }

    fn remainder(&mut self) -> Option<Result<String>> {
        let rest = self.buffer.split();
        match line_text(&rest) {
            Ok(text) if text.is_empty() => None,
            other => Some(other),
        }
    }
}

/// Turn a newline-delimited JSON body into watch events.
///
/// Chunk boundaries do not have to line up with event boundaries. A line
/// that does not parse yields `ClusterError::Decode` and decoding continues
/// with the next line; a transport failure yields `ClusterError::Transport`
/// and ends the stream.
pub fn decode_watch_stream<S, E>(body: S) -> PodWatch
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let state = LineBuffer {
        inner: body.boxed(),
        buffer: BytesMut::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(line) = state.next_line() {
                match line {
                    Ok(line) if line.is_empty() => continue,
                    Ok(line) => return Some((WatchEvent::from_line(&line), state)),
                    Err(e) => return Some((Err(e), state)),
                }
            }

            if state.finished {
                let rest = state.remainder()?;
                return Some((rest.and_then(|line| WatchEvent::from_line(&line)), state));
            }

            match state.inner.next().await {
                Some(Ok(chunk)) => state.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    state.finished = true;
                    state.buffer.clear();
                    return Some((
                        Err(ClusterError::transport(format!("Watch stream failed: {}", e))),
                        state,
                    ));
                }
                None => state.finished = true,
            }
        }
    })
    .boxed()
}
