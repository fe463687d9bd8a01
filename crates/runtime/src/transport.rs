//! Stdio pipe transport to the admin shell.
//!
//! The shell emits free text, not framed messages, so the reader forwards
//! raw chunks in emission order and leaves line assembly and sentinel
//! matching to the protocol layer. The writer sends command text to stdin.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::error::{Error, Result};

const READ_BUF_SIZE: usize = 8 * 1024;

/// Bidirectional text transport over a child process's stdio pipes.
///
/// Splits into a sender (writes to stdin) and a receiver (pumps stdout
/// chunks onto an unbounded channel). Per-pipe ordering is preserved;
/// nothing is ordered across different transports.
pub struct PipeTransport<W, R> {
    sender: PipeTransportSender<W>,
    receiver: PipeTransportReceiver<R>,
}

/// Writer half: sends command text to the child's stdin.
pub struct PipeTransportSender<W> {
    stdin: W,
}

/// Reader half: pumps stdout chunks onto the channel until EOF.
pub struct PipeTransportReceiver<R> {
    stdout: R,
    chunk_tx: mpsc::UnboundedSender<String>,
}

impl<W, R> PipeTransport<W, R>
where
    W: AsyncWrite + Unpin + Send,
    R: AsyncRead + Unpin + Send,
{
    /// Creates a transport over the given pipe handles. Returns the transport
    /// and the receiving end of the output chunk channel.
    pub fn new(stdin: W, stdout: R) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();
        (
            Self {
                sender: PipeTransportSender { stdin },
                receiver: PipeTransportReceiver { stdout, chunk_tx },
            },
            chunk_rx,
        )
    }

    /// Splits into independently owned halves.
    pub fn into_parts(self) -> (PipeTransportSender<W>, PipeTransportReceiver<R>) {
        (self.sender, self.receiver)
    }
}

impl<W> PipeTransportSender<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Sends one block of command text, newline-terminated, and flushes.
    pub async fn send(&mut self, text: &str) -> Result<()> {
        self.stdin
            .write_all(text.as_bytes())
            .await
            .map_err(|e| Error::Transport(format!("failed to write to stdin: {e}")))?;
        if !text.ends_with('\n') {
            self.stdin
                .write_all(b"\n")
                .await
                .map_err(|e| Error::Transport(format!("failed to write to stdin: {e}")))?;
        }
        self.stdin
            .flush()
            .await
            .map_err(|e| Error::Transport(format!("failed to flush stdin: {e}")))?;
        Ok(())
    }
}

impl<R> PipeTransportReceiver<R>
where
    R: AsyncRead + Unpin + Send,
{
    /// Receiver over a single output pipe with no paired writer. Used for
    /// stderr, which has no input half.
    pub fn standalone(pipe: R) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();
        (
            Self {
                stdout: pipe,
                chunk_tx,
            },
            chunk_rx,
        )
    }

    /// Reads the pipe until EOF, forwarding each chunk in order. Returns when
    /// the pipe closes or the channel's receiver is dropped.
    ///
    /// A multi-byte character split by the read buffer boundary is held back
    /// until its remaining bytes arrive, so forwarded chunks are always
    /// complete UTF-8.
    pub async fn run(&mut self) -> Result<()> {
        let mut buf = vec![0u8; READ_BUF_SIZE];
        let mut pending: Vec<u8> = Vec::new();
        loop {
            let n = self
                .stdout
                .read(&mut buf)
                .await
                .map_err(|e| Error::Transport(format!("failed to read from stdout: {e}")))?;
            if n == 0 {
                if !pending.is_empty() {
                    // Stream ended mid-character; nothing more is coming.
                    let _ = self
                        .chunk_tx
                        .send(String::from_utf8_lossy(&pending).into_owned());
                }
                return Ok(());
            }

            pending.extend_from_slice(&buf[..n]);
            let chunk = drain_complete_utf8(&mut pending);
            if chunk.is_empty() {
                continue;
            }
            if self.chunk_tx.send(chunk).is_err() {
                // Subscriber went away; stop pumping.
                return Ok(());
            }
        }
    }
}

/// Drains the longest decodable prefix of `pending`, leaving at most one
/// partial trailing character behind. Invalid byte sequences inside the
/// prefix become replacement characters; only an incomplete final character
/// is held back.
fn drain_complete_utf8(pending: &mut Vec<u8>) -> String {
    let mut out = String::new();
    loop {
        let (valid, invalid) = match std::str::from_utf8(pending) {
            Ok(_) => (pending.len(), None),
            Err(e) => (e.valid_up_to(), e.error_len()),
        };
        out.push_str(&String::from_utf8_lossy(&pending[..valid]));
        match invalid {
            Some(len) => {
                out.push(char::REPLACEMENT_CHARACTER);
                pending.drain(..valid + len);
            }
            None => {
                pending.drain(..valid);
                return out;
            }
        }
    }
}
