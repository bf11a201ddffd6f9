//! Terminal session channel over WebSocket.
//!
//! A [`SessionChannel`] binds one [`TerminalSink`] to at most one live remote
//! session at a time. Sessions are either interactive shells (keystrokes go
//! upstream, output comes back) or read-only log tails (output only).
//!
//! ## Lifecycle
//!
//! ```text
//! open() ──▶ Connecting ──▶ Open ──▶ Ended(RemoteClosed | Failed)
//!                 │            │
//!                 └──── close() ──▶ Ended(Closed)
//! ```
//!
//! `open` returns immediately; the connection runs on a spawned task. Closing
//! happens synchronously with respect to the terminal: once `close` returns,
//! the input handler is gone and no further output is written, even if
//! frames are still in flight.
//!
//! ## Delivery
//!
//! Text frames are written as-is; binary frames are decoded as UTF-8 with a
//! streaming decoder so a character split across frames still renders. The
//! decoder is per connection; a text frame flushes any unfinished sequence
//! as U+FFFD first. Keystrokes are sent in the order typed, as text frames
//! when valid UTF-8 and binary frames otherwise.
//!
//! Reconnection is opt-in ([`SessionOptions::reconnect_attempts`]) and only
//! applies to abnormal disconnects; a clean close from the remote ends the
//! session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::endpoint::{Backend, Endpoint, SessionMode};
use crate::terminal::{InputHandler, TerminalSink, Utf8Decoder};
use crate::util::{backoff_delay, lock};

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// Closed locally via [`SessionChannel::close`].
    Closed,
    /// The remote side sent a close frame.
    RemoteClosed,
    /// Connect failed or the connection dropped.
    Failed(String),
}

impl std::fmt::Display for EndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndReason::Closed => f.write_str("closed"),
            EndReason::RemoteClosed => f.write_str("closed by remote"),
            EndReason::Failed(msg) => write!(f, "failed: {msg}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Open,
    Ended(EndReason),
}

impl SessionState {
    pub fn is_ended(&self) -> bool {
        matches!(self, SessionState::Ended(_))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    /// Consecutive reconnect attempts after an abnormal disconnect.
    /// Zero disables reconnection.
    pub reconnect_attempts: u32,
    pub reconnect_delay: Duration,
    pub reconnect_max_delay: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            reconnect_attempts: 0,
            reconnect_delay: Duration::from_secs(1),
            reconnect_max_delay: Duration::from_secs(30),
        }
    }
}

/// Caller's view of one session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: u64,
    endpoint: Endpoint,
    state: watch::Receiver<SessionState>,
}

impl SessionHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Wait until the session is open. Fails with the end reason if it ends
    /// first.
    pub async fn opened(&self) -> Result<(), EndReason> {
        let mut rx = self.state.clone();
        loop {
            match &*rx.borrow_and_update() {
                SessionState::Open => return Ok(()),
                SessionState::Ended(reason) => return Err(reason.clone()),
                SessionState::Connecting => {}
            }
            if rx.changed().await.is_err() {
                return Err(EndReason::Closed);
            }
        }
    }

    /// Wait until the session ends.
    pub async fn ended(&self) -> EndReason {
        let mut rx = self.state.clone();
        loop {
            if let SessionState::Ended(reason) = &*rx.borrow_and_update() {
                return reason.clone();
            }
            if rx.changed().await.is_err() {
                return EndReason::Closed;
            }
        }
    }
}

/// The terminal plus the id of the session allowed to touch it.
struct TerminalSlot {
    sink: Box<dyn TerminalSink>,
    owner: Option<u64>,
}

type SharedTerminal = Arc<Mutex<TerminalSlot>>;

struct LiveSession {
    handle: SessionHandle,
    cancel: CancellationToken,
    state_tx: Arc<watch::Sender<SessionState>>,
}

/// Binds a terminal to at most one remote session.
pub struct SessionChannel {
    backend: Backend,
    options: SessionOptions,
    terminal: SharedTerminal,
    live: Mutex<Option<LiveSession>>,
    next_id: AtomicU64,
}

impl SessionChannel {
    pub fn new(backend: Backend, terminal: Box<dyn TerminalSink>, options: SessionOptions) -> Self {
        Self {
            backend,
            options,
            terminal: Arc::new(Mutex::new(TerminalSlot {
                sink: terminal,
                owner: None,
            })),
            live: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// Open a session to `endpoint`.
    ///
    /// If a session is already live (connecting or open) this does nothing
    /// and returns that session's handle. Must be called within a Tokio
    /// runtime.
    pub fn open(&self, endpoint: Endpoint) -> SessionHandle {
        let mut live = lock(&self.live);
        if let Some(current) = live.as_ref() {
            if !current.state_tx.borrow().is_ended() {
                if current.handle.endpoint != endpoint {
                    tracing::warn!(
                        current = %current.handle.endpoint,
                        requested = %endpoint,
                        "Session already open, ignoring open request"
                    );
                }
                return current.handle.clone();
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (state_tx, state_rx) = watch::channel(SessionState::Connecting);
        let state_tx = Arc::new(state_tx);
        let cancel = CancellationToken::new();
        let handle = SessionHandle {
            id,
            endpoint: endpoint.clone(),
            state: state_rx,
        };

        lock(&self.terminal).owner = Some(id);

        let task = SessionTask {
            id,
            url: endpoint.url(&self.backend),
            mode: endpoint.mode(),
            terminal: self.terminal.clone(),
            state_tx: state_tx.clone(),
            cancel: cancel.clone(),
            options: self.options,
        };
        tracing::info!(session = id, endpoint = %endpoint, "Opening session");
        tokio::spawn(task.run());

        *live = Some(LiveSession {
            handle: handle.clone(),
            cancel,
            state_tx,
        });
        handle
    }

    /// Close a session. A handle for a session that is no longer the
    /// channel's current one is ignored.
    pub fn close(&self, handle: &SessionHandle) {
        let mut live = lock(&self.live);
        if live.as_ref().map(|s| s.handle.id) != Some(handle.id) {
            tracing::debug!(session = handle.id, "close on stale session handle");
            return;
        }
        if let Some(session) = live.take() {
            shutdown(&self.terminal, session);
        }
    }

    /// Handle of the current session, if any (possibly already ended).
    pub fn current(&self) -> Option<SessionHandle> {
        lock(&self.live).as_ref().map(|s| s.handle.clone())
    }
}

impl Drop for SessionChannel {
    fn drop(&mut self) {
        if let Some(session) = lock(&self.live).take() {
            shutdown(&self.terminal, session);
        }
    }
}

fn shutdown(terminal: &SharedTerminal, session: LiveSession) {
    release_terminal(terminal, session.handle.id);
    session.cancel.cancel();
    mark_ended(&session.state_tx, EndReason::Closed);
    tracing::info!(session = session.handle.id, "Session closed");
}

/// Drop `id`'s claim on the terminal and clear its input handler.
fn release_terminal(terminal: &SharedTerminal, id: u64) {
    let mut slot = lock(terminal);
    if slot.owner == Some(id) {
        slot.owner = None;
        slot.sink.set_input_handler(None);
    }
}

fn mark_ended(state_tx: &watch::Sender<SessionState>, reason: EndReason) {
    state_tx.send_if_modified(|state| {
        if state.is_ended() {
            false
        } else {
            *state = SessionState::Ended(reason);
            true
        }
    });
}

fn set_state(state_tx: &watch::Sender<SessionState>, next: SessionState) {
    state_tx.send_if_modified(|state| {
        if state.is_ended() || *state == next {
            false
        } else {
            *state = next;
            true
        }
    });
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// How one connection ended.
enum Disconnect {
    Cancelled,
    Remote,
    Lost(String),
}

struct SessionTask {
    id: u64,
    url: String,
    mode: SessionMode,
    terminal: SharedTerminal,
    state_tx: Arc<watch::Sender<SessionState>>,
    cancel: CancellationToken,
    options: SessionOptions,
}

impl SessionTask {
    async fn run(self) {
        let (input_tx, mut input_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let mut failures = 0u32;

        let reason = loop {
            let connected = tokio::select! {
                () = self.cancel.cancelled() => return,
                result = tokio_tungstenite::connect_async(self.url.as_str()) => result,
            };
            let disconnect = match connected {
                Ok((ws, _)) => {
                    failures = 0;
                    if self.mode == SessionMode::Interactive && !self.attach_input(&input_tx) {
                        return;
                    }
                    set_state(&self.state_tx, SessionState::Open);
                    tracing::info!(session = self.id, "Session open");
                    // Keystrokes typed while disconnected are stale.
                    while input_rx.try_recv().is_ok() {}
                    self.io_loop(ws, &mut input_rx).await
                }
                Err(e) => Disconnect::Lost(format!("connect failed: {e}")),
            };

            match disconnect {
                Disconnect::Cancelled => return,
                Disconnect::Remote => break EndReason::RemoteClosed,
                Disconnect::Lost(msg) => {
                    failures += 1;
                    if failures > self.options.reconnect_attempts {
                        break EndReason::Failed(msg);
                    }
                    let delay = backoff_delay(
                        self.options.reconnect_delay,
                        self.options.reconnect_max_delay,
                        failures,
                    );
                    tracing::warn!(
                        session = self.id,
                        error = %msg,
                        attempt = failures,
                        "Session connection lost, retrying in {delay:?}"
                    );
                    set_state(&self.state_tx, SessionState::Connecting);
                    tokio::select! {
                        () = self.cancel.cancelled() => return,
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        };

        tracing::info!(session = self.id, reason = %reason, "Session ended");
        release_terminal(&self.terminal, self.id);
        mark_ended(&self.state_tx, reason);
    }

    /// Install the keystroke forwarder. Returns `false` if the session lost
    /// the terminal in the meantime.
    fn attach_input(&self, input_tx: &mpsc::UnboundedSender<Vec<u8>>) -> bool {
        let mut slot = lock(&self.terminal);
        if slot.owner != Some(self.id) {
            return false;
        }
        let tx = input_tx.clone();
        let handler: InputHandler = Box::new(move |bytes: &[u8]| {
            let _ = tx.send(bytes.to_vec());
        });
        slot.sink.set_input_handler(Some(handler));
        true
    }

    /// Write to the terminal if this session still owns it.
    fn deliver(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        let mut slot = lock(&self.terminal);
        if slot.owner == Some(self.id) {
            slot.sink.write(text);
        }
    }

    async fn io_loop(
        &self,
        ws: WsStream,
        input_rx: &mut mpsc::UnboundedReceiver<Vec<u8>>,
    ) -> Disconnect {
        let (mut ws_sink, mut ws_reader) = ws.split();
        let mut decoder = Utf8Decoder::default();
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    let _ = ws_sink.send(Message::Close(None)).await;
                    return Disconnect::Cancelled;
                }
                msg = ws_reader.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        let mut out = decoder.flush();
                        out.push_str(text.as_str());
                        self.deliver(&out);
                    }
                    Some(Ok(Message::Binary(bytes))) => self.deliver(&decoder.decode(&bytes)),
                    Some(Ok(Message::Close(_))) => return Disconnect::Remote,
                    Some(Ok(_)) => {} // Ping/Pong/Frame
                    Some(Err(e)) => return Disconnect::Lost(e.to_string()),
                    None => return Disconnect::Lost("connection closed without close frame".into()),
                },
                Some(bytes) = input_rx.recv() => {
                    let frame = match String::from_utf8(bytes) {
                        Ok(text) => Message::Text(text.into()),
                        Err(e) => Message::Binary(e.into_bytes().into()),
                    };
                    if let Err(e) = ws_sink.send(frame).await {
                        return Disconnect::Lost(format!("send failed: {e}"));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{spawn_backend, wait_until, CaptureTerminal};
    use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
    use axum::routing::get;
    use axum::Router;
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    fn shell() -> Endpoint {
        Endpoint::MachineShell {
            ip: "10.0.0.1".into(),
        }
    }

    fn logs() -> Endpoint {
        Endpoint::ContainerLogs {
            ip: "10.0.0.1".into(),
            container_id: "c1".into(),
        }
    }

    async fn echo(mut socket: WebSocket) {
        while let Some(Ok(msg)) = socket.recv().await {
            if let WsMessage::Text(_) | WsMessage::Binary(_) = msg {
                if socket.send(msg).await.is_err() {
                    return;
                }
            }
        }
    }

    async fn echo_channel(
        options: SessionOptions,
    ) -> (SessionChannel, CaptureTerminal, Arc<AtomicUsize>) {
        let connections = Arc::new(AtomicUsize::new(0));
        let count = connections.clone();
        let app = Router::new().route(
            "/machine/exec",
            get(move |ws: WebSocketUpgrade| {
                let count = count.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    ws.on_upgrade(echo)
                }
            }),
        );
        let fake = spawn_backend(app).await;
        let term = CaptureTerminal::default();
        let channel = SessionChannel::new(fake.backend.clone(), Box::new(term.clone()), options);
        (channel, term, connections)
    }

    #[tokio::test]
    async fn keystrokes_echo_in_order() {
        let (channel, term, _) = echo_channel(SessionOptions::default()).await;
        let handle = channel.open(shell());
        handle.opened().await.unwrap();
        assert!(term.has_handler());

        for key in ["l", "s", " ", "-", "l", "\r"] {
            assert!(term.type_input(key.as_bytes()));
        }
        wait_until(|| term.output() == "ls -l\r").await;
    }

    #[tokio::test]
    async fn invalid_utf8_input_goes_out_as_binary_and_decodes_back() {
        let (channel, term, _) = echo_channel(SessionOptions::default()).await;
        let handle = channel.open(shell());
        handle.opened().await.unwrap();
        term.type_input(&[b'x', 0xff]);
        wait_until(|| term.output() == "x\u{fffd}").await;
    }

    #[tokio::test]
    async fn second_open_while_live_is_a_no_op() {
        let (channel, _term, connections) = echo_channel(SessionOptions::default()).await;
        let first = channel.open(shell());
        let second = channel.open(shell());
        assert_eq!(first.id(), second.id());
        first.opened().await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(connections.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn read_only_session_installs_no_handler() {
        let received = Arc::new(AtomicBool::new(false));
        let flag = received.clone();
        let app = Router::new().route(
            "/container/log",
            get(move |ws: WebSocketUpgrade| {
                let flag = flag.clone();
                async move {
                    ws.on_upgrade(move |mut socket| async move {
                        let _ = socket.send(WsMessage::Text("line 1\n".into())).await;
                        while let Some(Ok(msg)) = socket.recv().await {
                            if matches!(msg, WsMessage::Text(_) | WsMessage::Binary(_)) {
                                flag.store(true, Ordering::SeqCst);
                            }
                        }
                    })
                }
            }),
        );
        let fake = spawn_backend(app).await;
        let term = CaptureTerminal::default();
        let channel = SessionChannel::new(
            fake.backend.clone(),
            Box::new(term.clone()),
            SessionOptions::default(),
        );
        let handle = channel.open(logs());
        wait_until(|| term.output() == "line 1\n").await;
        assert_eq!(handle.state(), SessionState::Open);
        assert!(!term.has_handler());
        assert!(!term.type_input(b"q"));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!received.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn nothing_is_written_after_close() {
        let app = Router::new().route(
            "/machine/exec",
            get(|ws: WebSocketUpgrade| async move {
                ws.on_upgrade(|mut socket| async move {
                    loop {
                        if socket.send(WsMessage::Text("tick\n".into())).await.is_err() {
                            return;
                        }
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                })
            }),
        );
        let fake = spawn_backend(app).await;
        let term = CaptureTerminal::default();
        let channel = SessionChannel::new(
            fake.backend.clone(),
            Box::new(term.clone()),
            SessionOptions::default(),
        );
        let handle = channel.open(shell());
        wait_until(|| term.output().contains("tick")).await;

        channel.close(&handle);
        assert!(!term.has_handler());
        assert_eq!(handle.state(), SessionState::Ended(EndReason::Closed));
        let frozen = term.output();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(term.output(), frozen);
    }

    #[tokio::test]
    async fn binary_frames_are_decoded_across_boundaries() {
        let app = Router::new().route(
            "/container/exec",
            get(|ws: WebSocketUpgrade| async move {
                ws.on_upgrade(|mut socket| async move {
                    let bytes = "héllo".as_bytes().to_vec();
                    let _ = socket
                        .send(WsMessage::Binary(bytes[..2].to_vec().into()))
                        .await;
                    let _ = socket
                        .send(WsMessage::Binary(bytes[2..].to_vec().into()))
                        .await;
                    while socket.recv().await.is_some() {}
                })
            }),
        );
        let fake = spawn_backend(app).await;
        let term = CaptureTerminal::default();
        let channel = SessionChannel::new(
            fake.backend.clone(),
            Box::new(term.clone()),
            SessionOptions::default(),
        );
        channel.open(Endpoint::ContainerShell {
            ip: "10.0.0.1".into(),
            container_id: "c1".into(),
        });
        wait_until(|| term.output() == "héllo").await;
    }

    #[tokio::test]
    async fn text_frame_flushes_unfinished_binary_sequence() {
        let app = Router::new().route(
            "/machine/exec",
            get(|ws: WebSocketUpgrade| async move {
                ws.on_upgrade(|mut socket| async move {
                    let _ = socket.send(WsMessage::Binary(vec![0xc3].into())).await;
                    let _ = socket.send(WsMessage::Text("ok".into())).await;
                    while socket.recv().await.is_some() {}
                })
            }),
        );
        let fake = spawn_backend(app).await;
        let term = CaptureTerminal::default();
        let channel = SessionChannel::new(
            fake.backend.clone(),
            Box::new(term.clone()),
            SessionOptions::default(),
        );
        channel.open(shell());
        wait_until(|| term.output() == "\u{fffd}ok").await;
    }

    #[tokio::test]
    async fn partial_sequence_does_not_leak_into_next_connection() {
        let connections = Arc::new(AtomicUsize::new(0));
        let count = connections.clone();
        let app = Router::new().route(
            "/machine/exec",
            get(move |ws: WebSocketUpgrade| {
                let count = count.clone();
                async move {
                    let n = count.fetch_add(1, Ordering::SeqCst);
                    ws.on_upgrade(move |mut socket| async move {
                        if n == 0 {
                            let _ = socket.send(WsMessage::Binary(vec![0xc3].into())).await;
                            return;
                        }
                        let _ = socket.send(WsMessage::Binary(b"A".to_vec().into())).await;
                        while socket.recv().await.is_some() {}
                    })
                }
            }),
        );
        let fake = spawn_backend(app).await;
        let term = CaptureTerminal::default();
        let channel = SessionChannel::new(
            fake.backend.clone(),
            Box::new(term.clone()),
            SessionOptions {
                reconnect_attempts: 3,
                reconnect_delay: Duration::from_millis(10),
                reconnect_max_delay: Duration::from_millis(50),
            },
        );
        channel.open(shell());
        wait_until(|| !term.output().is_empty()).await;
        assert_eq!(term.output(), "A");
    }

    #[tokio::test]
    async fn remote_close_ends_session_and_clears_handler() {
        let app = Router::new().route(
            "/machine/exec",
            get(|ws: WebSocketUpgrade| async move {
                ws.on_upgrade(|mut socket| async move {
                    let _ = socket.send(WsMessage::Text("logout\r\n".into())).await;
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    let _ = socket.send(WsMessage::Close(None)).await;
                    while socket.recv().await.is_some() {}
                })
            }),
        );
        let fake = spawn_backend(app).await;
        let term = CaptureTerminal::default();
        let channel = SessionChannel::new(
            fake.backend.clone(),
            Box::new(term.clone()),
            SessionOptions::default(),
        );
        let first = channel.open(shell());
        assert_eq!(first.ended().await, EndReason::RemoteClosed);
        assert_eq!(term.output(), "logout\r\n");
        assert!(!term.has_handler());

        // An ended session can be replaced; its stale handle no longer closes anything.
        let second = channel.open(shell());
        assert_ne!(first.id(), second.id());
        second.opened().await.unwrap();
        channel.close(&first);
        assert_eq!(second.state(), SessionState::Open);
    }

    #[tokio::test]
    async fn connect_failure_ends_and_allows_reopen() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let term = CaptureTerminal::default();
        let channel = SessionChannel::new(
            Backend::parse(&addr.to_string()).unwrap(),
            Box::new(term.clone()),
            SessionOptions::default(),
        );
        let first = channel.open(shell());
        assert!(matches!(first.ended().await, EndReason::Failed(_)));
        assert!(!term.has_handler());

        let second = channel.open(shell());
        assert_ne!(first.id(), second.id());
        assert!(matches!(second.opened().await, Err(EndReason::Failed(_))));
    }

    #[tokio::test]
    async fn reconnects_after_abnormal_disconnect() {
        let connections = Arc::new(AtomicUsize::new(0));
        let count = connections.clone();
        let app = Router::new().route(
            "/machine/exec",
            get(move |ws: WebSocketUpgrade| {
                let count = count.clone();
                async move {
                    let n = count.fetch_add(1, Ordering::SeqCst);
                    ws.on_upgrade(move |mut socket| async move {
                        if n == 0 {
                            // Drop without a close frame.
                            return;
                        }
                        let _ = socket.send(WsMessage::Text("back\r\n".into())).await;
                        while socket.recv().await.is_some() {}
                    })
                }
            }),
        );
        let fake = spawn_backend(app).await;
        let term = CaptureTerminal::default();
        let channel = SessionChannel::new(
            fake.backend.clone(),
            Box::new(term.clone()),
            SessionOptions {
                reconnect_attempts: 3,
                reconnect_delay: Duration::from_millis(10),
                reconnect_max_delay: Duration::from_millis(50),
            },
        );
        let handle = channel.open(shell());
        wait_until(|| term.output() == "back\r\n").await;
        assert_eq!(connections.load(Ordering::SeqCst), 2);
        assert_eq!(handle.state(), SessionState::Open);
        assert!(term.has_handler());
    }

    #[tokio::test]
    async fn dropping_channel_closes_session() {
        let (channel, term, _) = echo_channel(SessionOptions::default()).await;
        let handle = channel.open(shell());
        handle.opened().await.unwrap();
        drop(channel);
        assert_eq!(handle.state(), SessionState::Ended(EndReason::Closed));
        assert!(!term.has_handler());
    }
}
