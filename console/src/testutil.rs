//! Test helpers: in-process fake backends and a capturing terminal.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;

use crate::endpoint::Backend;
use crate::terminal::{InputHandler, TerminalSink};
use crate::util::lock;

pub(crate) struct FakeBackend {
    pub backend: Backend,
}

/// Serve `app` on an ephemeral localhost port for the rest of the test.
pub(crate) async fn spawn_backend(app: Router) -> FakeBackend {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    FakeBackend {
        backend: Backend::parse(&addr.to_string()).unwrap(),
    }
}

/// Poll `condition` every 10ms; panic after 5s.
pub(crate) async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within 5s"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Terminal sink that records output and lets a test type input.
/// Clones share state.
#[derive(Clone, Default)]
pub(crate) struct CaptureTerminal {
    output: Arc<Mutex<String>>,
    handler: Arc<Mutex<Option<InputHandler>>>,
}

impl CaptureTerminal {
    pub fn output(&self) -> String {
        lock(&self.output).clone()
    }

    pub fn has_handler(&self) -> bool {
        lock(&self.handler).is_some()
    }

    /// Feed `bytes` to the installed handler. Returns `false` if none is
    /// installed.
    pub fn type_input(&self, bytes: &[u8]) -> bool {
        match lock(&self.handler).as_mut() {
            Some(handler) => {
                handler(bytes);
                true
            }
            None => false,
        }
    }
}

impl TerminalSink for CaptureTerminal {
    fn write(&mut self, text: &str) {
        lock(&self.output).push_str(text);
    }

    fn set_input_handler(&mut self, handler: Option<InputHandler>) {
        *lock(&self.handler) = handler;
    }
}
