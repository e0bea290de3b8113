//! Regroups streamed text deltas into whole lines.

use super::generator::TextStream;
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;

/// Buffers text and hands back complete lines.
#[derive(Debug, Default)]
pub struct LineChunker {
    buffer: String,
}

impl LineChunker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a delta; returns every line it completed, without the newline.
    pub fn push(&mut self, delta: &str) -> Vec<String> {
        self.buffer.push_str(delta);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            lines.push(line[..line.len() - 1].to_string());
        }
        lines
    }

    /// The trailing partial line, if any text is left.
    pub fn finish(self) -> Option<String> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.buffer)
        }
    }
}

struct LineState {
    deltas: TextStream,
    chunker: Option<LineChunker>,
    ready: VecDeque<String>,
}

/// Turn a delta stream into a line stream.
///
/// An error ends the stream after it is yielded.
pub fn into_lines(deltas: TextStream) -> TextStream {
    let state = LineState {
        deltas,
        chunker: Some(LineChunker::new()),
        ready: VecDeque::new(),
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(line) = state.ready.pop_front() {
                return Some((Ok(line), state));
            }
            if state.chunker.is_none() {
                return None;
            }

            match state.deltas.next().await {
                Some(Ok(delta)) => {
                    if let Some(chunker) = state.chunker.as_mut() {
                        state.ready.extend(chunker.push(&delta));
                    }
                }
                Some(Err(e)) => {
                    state.chunker = None;
                    return Some((Err(e), state));
                }
                None => {
                    if let Some(rest) = state.chunker.take().and_then(LineChunker::finish) {
                        state.ready.push_back(rest);
                    }
                }
            }
        }
    })
    .boxed()
}
