//! Terminal sink abstraction and the stdio-backed implementation.
//!
//! A [`TerminalSink`] is anything that can show text and report typed input.
//! Session channels write decoded output into it and, for interactive
//! sessions, install an input handler that forwards keystrokes upstream.
//!
//! [`StdioTerminal`] drives the process's own stdin/stdout. Stdin is read by
//! a task on the current runtime, started the first time an input handler is
//! installed; it lives until stdin closes. Pressing `Ctrl-]` fires the detach
//! signal instead of being forwarded.

use std::io::{IsTerminal, Write};
use std::sync::{Arc, Mutex};

use nix::sys::termios::{cfmakeraw, tcgetattr, tcsetattr, SetArg, Termios};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::Notify;

use crate::util::lock;

/// Callback receiving raw input bytes typed into the terminal.
pub type InputHandler = Box<dyn FnMut(&[u8]) + Send>;

/// Byte produced by `Ctrl-]`.
pub const DETACH_KEY: u8 = 0x1d;

/// Display surface for session output.
pub trait TerminalSink: Send {
    /// Append text to the display.
    fn write(&mut self, text: &str);

    /// Install (or with `None`, clear) the handler for typed input.
    /// At most one handler is installed at a time.
    fn set_input_handler(&mut self, handler: Option<InputHandler>);
}

/// Incremental UTF-8 decoder for binary frames.
///
/// A multi-byte sequence split across frames is held back until the rest
/// arrives; invalid bytes become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();
        let mut rest: &[u8] = &self.pending;
        loop {
            match std::str::from_utf8(rest) {
                Ok(s) => {
                    out.push_str(s);
                    rest = &[];
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            rest = after;
                            break;
                        }
                    }
                }
            }
        }
        let tail = rest.to_vec();
        self.pending = tail;
        out
    }
    /// Give up on a held-back partial sequence, yielding U+FFFD for it.
    pub fn flush(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        self.pending.clear();
        char::REPLACEMENT_CHARACTER.to_string()
    }
}

type SharedHandler = Arc<Mutex<Option<InputHandler>>>;

/// Terminal sink on the process's stdin/stdout.
pub struct StdioTerminal {
    handler: SharedHandler,
    detach: Arc<Notify>,
    reader_started: bool,
}

impl StdioTerminal {
    pub fn new() -> Self {
        Self {
            handler: Arc::new(Mutex::new(None)),
            detach: Arc::new(Notify::new()),
            reader_started: false,
        }
    }

    /// Signalled when the user presses the detach key or stdin closes.
    pub fn detach_signal(&self) -> Arc<Notify> {
        self.detach.clone()
    }

    /// Must be called within a Tokio runtime.
    fn start_reader(&mut self) {
        if self.reader_started {
            return;
        }
        self.reader_started = true;
        tokio::spawn(input_loop(
            tokio::io::stdin(),
            self.handler.clone(),
            self.detach.clone(),
        ));
    }
}

impl Default for StdioTerminal {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalSink for StdioTerminal {
    fn write(&mut self, text: &str) {
        let mut out = std::io::stdout().lock();
        if let Err(e) = out.write_all(text.as_bytes()).and_then(|()| out.flush()) {
            tracing::debug!(error = %e, "stdout write failed");
        }
    }

    fn set_input_handler(&mut self, handler: Option<InputHandler>) {
        let install = handler.is_some();
        *lock(&self.handler) = handler;
        if install {
            self.start_reader();
        }
    }
}

/// Forward bytes from `input` to the installed handler until EOF or the
/// detach key.
async fn input_loop<R>(mut input: R, handler: SharedHandler, detach: Arc<Notify>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; 1024];
    loop {
        let n = match input.read(&mut buf).await {
            Ok(0) => {
                detach.notify_one();
                return;
            }
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::debug!(error = %e, "stdin read failed");
                detach.notify_one();
                return;
            }
        };
        let chunk = &buf[..n];
        let (input, detached) = match chunk.iter().position(|&b| b == DETACH_KEY) {
            Some(pos) => (&chunk[..pos], true),
            None => (chunk, false),
        };
        if !input.is_empty() {
            if let Some(h) = lock(&handler).as_mut() {
                h(input);
            }
        }
        if detached {
            detach.notify_one();
        }
    }
}

/// Puts stdin into raw mode for the guard's lifetime.
pub struct RawModeGuard {
    original: Termios,
}

impl RawModeGuard {
    /// Enable raw mode. Returns `Ok(None)` when stdin is not a terminal.
    pub fn enable() -> Result<Option<Self>, nix::Error> {
        let stdin = std::io::stdin();
        if !stdin.is_terminal() {
            return Ok(None);
        }
        let original = tcgetattr(&stdin)?;
        let mut raw = original.clone();
        cfmakeraw(&mut raw);
        tcsetattr(&stdin, SetArg::TCSANOW, &raw)?;
        Ok(Some(Self { original }))
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = tcsetattr(std::io::stdin(), SetArg::TCSANOW, &self.original) {
            tracing::warn!(error = %e, "Failed to restore terminal mode");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plain_ascii() {
        let mut d = Utf8Decoder::default();
        assert_eq!(d.decode(b"ls -la\r\n"), "ls -la\r\n");
    }

    #[test]
    fn holds_back_split_sequence() {
        let mut d = Utf8Decoder::default();
        let bytes = "é✓".as_bytes();
        assert_eq!(d.decode(&bytes[..1]), "");
        assert_eq!(d.decode(&bytes[1..3]), "é");
        assert_eq!(d.decode(&bytes[3..]), "✓");
    }

    #[test]
    fn flush_replaces_unfinished_sequence() {
        let mut d = Utf8Decoder::default();
        assert_eq!(d.flush(), "");
        assert_eq!(d.decode(&[0xe2, 0x9c]), "");
        assert_eq!(d.flush(), "\u{fffd}");
        assert_eq!(d.decode(b"ok"), "ok");
    }

    #[tokio::test]
    async fn input_stops_at_detach_key() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler: SharedHandler = Arc::new(Mutex::new(Some(Box::new(move |b: &[u8]| {
            lock(&sink).extend_from_slice(b);
        }) as InputHandler)));
        let detach = Arc::new(Notify::new());
        input_loop(&b"ls\x1dignored"[..], handler, detach.clone()).await;
        assert_eq!(lock(&seen).as_slice(), b"ls");
        detach.notified().await;
    }

    #[test]
    fn replaces_invalid_bytes() {
        let mut d = Utf8Decoder::default();
        assert_eq!(d.decode(&[b'a', 0xff, b'b']), "a\u{fffd}b");
    }
}
