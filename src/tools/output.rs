//! Output Aggregation
//!
//! Accumulates the byte chunks a child process writes to stdout and stderr.
//! Three views are kept:
//!
//! - raw per-stream text, control codes included (for humans)
//! - ANSI-stripped per-stream text (for the calling agent)
//! - one raw combined buffer preserving arrival order across both streams
//!
//! The aggregator has a single owner. The process runner funnels every chunk
//! through one consumer loop, so no locking happens here.

use super::ansi::AnsiStripper;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default minimum interval between progress snapshots
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(1000);

/// Which output stream a chunk came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamKind::Stdout => write!(f, "stdout"),
            StreamKind::Stderr => write!(f, "stderr"),
        }
    }
}

/// Incremental UTF-8 decoder
///
/// Holds back an incomplete multi-byte sequence at the end of a chunk until
/// the next chunk completes it. Invalid bytes decode to U+FFFD.
#[derive(Debug, Default)]
struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::new();

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + bad);
                        }
                        None => {
                            // Incomplete sequence at the end: wait for more bytes
                            self.pending.drain(..valid);
                            break;
                        }
                    }
                }
            }
        }

        out
    }

    fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}

/// Per-stream buffers
#[derive(Debug, Default)]
struct StreamBuffer {
    decoder: Utf8Decoder,
    stripper: AnsiStripper,
    raw: String,
    stripped: String,
}

impl StreamBuffer {
    /// Decode a chunk, returning the newly decoded raw text
    fn append(&mut self, chunk: &[u8]) -> String {
        let text = self.decoder.decode(chunk);
        self.push_text(&text);
        text
    }

    fn push_text(&mut self, text: &str) {
        self.raw.push_str(text);
        self.stripper.feed(text, &mut self.stripped);
    }
}

/// Output Aggregator for one execution
#[derive(Debug)]
pub struct OutputAggregator {
    stdout: StreamBuffer,
    stderr: StreamBuffer,
    combined: String,
    progress_interval: Duration,
    last_update: Instant,
    exited: bool,
    discarded_chunks: usize,
}

impl OutputAggregator {
    /// Create an aggregator whose throttle window starts at `started`
    pub fn new(progress_interval: Duration, started: Instant) -> Self {
        Self {
            stdout: StreamBuffer::default(),
            stderr: StreamBuffer::default(),
            combined: String::new(),
            progress_interval,
            last_update: started,
            exited: false,
            discarded_chunks: 0,
        }
    }

    /// Append a chunk that arrived at `now`
    ///
    /// Returns the combined raw output when a progress snapshot is due, that
    /// is when at least `progress_interval` has passed since the previous
    /// snapshot (or since the aggregator was created). Chunks arriving after
    /// [`mark_exited`](Self::mark_exited) are discarded.
    pub fn push(&mut self, kind: StreamKind, chunk: &[u8], now: Instant) -> Option<&str> {
        if self.exited {
            self.discarded_chunks += 1;
            debug!("Discarding {} byte {} chunk after exit", chunk.len(), kind);
            return None;
        }

        let text = match kind {
            StreamKind::Stdout => self.stdout.append(chunk),
            StreamKind::Stderr => self.stderr.append(chunk),
        };
        self.combined.push_str(&text);

        if now.saturating_duration_since(self.last_update) >= self.progress_interval {
            self.last_update = now;
            Some(&self.combined)
        } else {
            None
        }
    }

    /// Mark the process as exited; later chunks are dropped
    ///
    /// Flushes any bytes still held by the UTF-8 decoders.
    pub fn mark_exited(&mut self) {
        if self.exited {
            return;
        }
        self.exited = true;

        let tail = self.stdout.decoder.finish();
        if !tail.is_empty() {
            self.stdout.push_text(&tail);
            self.combined.push_str(&tail);
        }
        let tail = self.stderr.decoder.finish();
        if !tail.is_empty() {
            self.stderr.push_text(&tail);
            self.combined.push_str(&tail);
        }
    }

    /// Whether the process has been marked exited
    pub fn is_exited(&self) -> bool {
        self.exited
    }

    /// Number of chunks dropped because they arrived after exit
    pub fn discarded_chunks(&self) -> usize {
        self.discarded_chunks
    }

    /// Raw stdout, control codes included
    pub fn raw_stdout(&self) -> &str {
        &self.stdout.raw
    }

    /// Raw stderr, control codes included
    pub fn raw_stderr(&self) -> &str {
        &self.stderr.raw
    }

    /// ANSI-stripped stdout with trailing newlines trimmed
    pub fn stdout(&self) -> &str {
        trim_trailing_newlines(&self.stdout.stripped)
    }

    /// ANSI-stripped stderr with trailing newlines trimmed
    pub fn stderr(&self) -> &str {
        trim_trailing_newlines(&self.stderr.stripped)
    }

    /// Combined raw output with trailing newlines trimmed
    pub fn combined(&self) -> &str {
        trim_trailing_newlines(&self.combined)
    }
}

/// Trim trailing line terminators
pub fn trim_trailing_newlines(text: &str) -> &str {
    text.trim_end_matches(['\n', '\r'])
}
