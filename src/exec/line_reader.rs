// src/exec/line_reader.rs

//! Record splitting for redirected child output.
//!
//! Media tools redraw their status line with a bare `\r`, so a record ends at
//! `\n`, `\r` or `\r\n`. Bytes are decoded as lossy UTF-8; a single invalid
//! byte must not stop the drain of a pipe.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::types::{OutputLine, OutputStream};

pub struct LineReader<R> {
    inner: R,
    /// The previous record ended on `\r` at a buffer boundary; a leading `\n`
    /// in the next chunk belongs to that delimiter.
    skip_lf: bool,
}

impl<R: AsyncBufRead + Unpin> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            skip_lf: false,
        }
    }

    /// Read the next record, or `None` at end-of-stream.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        let mut buf: Vec<u8> = Vec::new();

        loop {
            let available = self.inner.fill_buf().await?;
            if available.is_empty() {
                if buf.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(String::from_utf8_lossy(&buf).into_owned()));
            }

            let mut start = 0;
            if self.skip_lf {
                self.skip_lf = false;
                if available[0] == b'\n' {
                    start = 1;
                }
            }

            let delimiter = available[start..]
                .iter()
                .position(|b| *b == b'\n' || *b == b'\r');

            match delimiter {
                Some(offset) => {
                    let end = start + offset;
                    buf.extend_from_slice(&available[start..end]);

                    let mut consumed = end + 1;
                    if available[end] == b'\r' {
                        match available.get(consumed) {
                            Some(b'\n') => consumed += 1,
                            Some(_) => {}
                            None => self.skip_lf = true,
                        }
                    }

                    self.inner.consume(consumed);
                    return Ok(Some(String::from_utf8_lossy(&buf).into_owned()));
                }
                None => {
                    buf.extend_from_slice(&available[start..]);
                    let len = available.len();
                    self.inner.consume(len);
                }
            }
        }
    }
}

/// Drain one child stream into the invocation's line channel.
///
/// The task ends at end-of-stream, on a read error, or when the receiving
/// side has gone away. Dropping its sender is how the engine learns that the
/// stream is fully drained.
pub(crate) fn spawn_reader<R>(
    pipe: R,
    stream: OutputStream,
    tx: mpsc::Sender<OutputLine>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = LineReader::new(BufReader::new(pipe));

        loop {
            match reader.next_line().await {
                Ok(Some(text)) => {
                    if tx.send(OutputLine { stream, text }).await.is_err() {
                        debug!(%stream, "line receiver dropped; stopping reader");
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(%stream, error = %e, "error reading child output");
                    break;
                }
            }
        }

        debug!(%stream, "reader reached end of stream");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(reader: impl AsyncBufRead + Unpin) -> Vec<String> {
        let mut lines = LineReader::new(reader);
        let mut out = Vec::new();
        while let Some(line) = lines.next_line().await.unwrap() {
            out.push(line);
        }
        out
    }

    #[tokio::test]
    async fn splits_on_all_delimiters() {
        let data: &[u8] = b"one\ntwo\r\nthree\rfour";
        assert_eq!(collect(data).await, vec!["one", "two", "three", "four"]);
    }

    #[tokio::test]
    async fn crlf_split_across_buffer_boundary_is_one_delimiter() {
        let data: &[u8] = b"ab\r\ncd\r\n\r\nef";
        let reader = BufReader::with_capacity(1, data);
        assert_eq!(collect(reader).await, vec!["ab", "cd", "", "ef"]);
    }

    #[tokio::test]
    async fn empty_input_yields_nothing() {
        let data: &[u8] = b"";
        assert!(collect(data).await.is_empty());
    }

    #[tokio::test]
    async fn invalid_utf8_is_replaced_not_fatal() {
        let data: &[u8] = b"ok\n\xff\xfe\nafter\n";
        let lines = collect(data).await;
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "ok");
        assert!(lines[1].contains('\u{fffd}'));
        assert_eq!(lines[2], "after");
    }
}
