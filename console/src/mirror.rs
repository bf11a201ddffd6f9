//! Live mirrors of remote resource state.
//!
//! A [`StateMirror`] turns a [`FeedDescriptor`] into a [`Subscription`] that
//! always holds the most recent full snapshot of the resource. Every frame
//! replaces the previous snapshot wholesale; there is no diffing or merging.
//!
//! Two transports feed a mirror:
//!
//! - **stream**: the backend pushes one JSON frame per snapshot over a
//!   WebSocket (single container, single image). Frames are array-wrapped and
//!   only the first element is used.
//! - **poll**: collections (containers, images, machines) are re-fetched
//!   from their one-shot endpoint every `poll_interval`.
//!
//! Bad input never clears a mirror: a malformed frame, a backend error or a
//! dropped connection is logged and the last snapshot stays current. Dropped
//! streams are retried with exponential backoff.
//!
//! Failures also reach the [`Notifier`]: the connectivity message once each
//! time a feed goes from live (or starting) to down, and a backend `Error`
//! verbatim whenever it differs from the last one reported.
//!
//! Unsubscribing (or dropping the subscription) is synchronous: no snapshot
//! is published and no handler is called after it returns.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::client::BackendClient;
use crate::endpoint::{FeedDescriptor, FeedTransport};
use crate::error::ClientError;
use crate::notify::{Notifier, CONNECTIVITY_MESSAGE};
use crate::util::{backoff_delay, lock};

/// Observable state of a mirror.
#[derive(Debug)]
pub enum MirrorState<T> {
    /// No snapshot received yet.
    Loading,
    Loaded(Arc<T>),
}

impl<T> Clone for MirrorState<T> {
    fn clone(&self) -> Self {
        match self {
            MirrorState::Loading => MirrorState::Loading,
            MirrorState::Loaded(snapshot) => MirrorState::Loaded(Arc::clone(snapshot)),
        }
    }
}

impl<T> MirrorState<T> {
    pub fn snapshot(&self) -> Option<&Arc<T>> {
        match self {
            MirrorState::Loading => None,
            MirrorState::Loaded(snapshot) => Some(snapshot),
        }
    }
}

/// Callback invoked with every accepted snapshot.
///
/// Runs on the feed task while the subscription's delivery lock is held, so
/// it must not drop or unsubscribe its own subscription.
pub type SnapshotHandler<T> = Box<dyn FnMut(&Arc<T>) + Send>;

#[derive(Debug, Clone, Copy)]
pub struct MirrorOptions {
    /// Refresh period for polled collection feeds.
    pub poll_interval: Duration,
    /// First retry delay after a stream drops; doubles up to `retry_max_delay`.
    pub retry_delay: Duration,
    pub retry_max_delay: Duration,
}

impl Default for MirrorOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            retry_delay: Duration::from_secs(1),
            retry_max_delay: Duration::from_secs(30),
        }
    }
}

/// Factory for state subscriptions against one backend.
#[derive(Clone)]
pub struct StateMirror {
    client: BackendClient,
    notifier: Notifier,
    options: MirrorOptions,
}

impl StateMirror {
    pub fn new(client: BackendClient, notifier: Notifier, options: MirrorOptions) -> Self {
        Self {
            client,
            notifier,
            options,
        }
    }

    /// Start following `feed`. The subscription begins in
    /// [`MirrorState::Loading`]. Must be called within a Tokio runtime.
    pub fn subscribe<T>(
        &self,
        feed: FeedDescriptor,
        on_snapshot: Option<SnapshotHandler<T>>,
    ) -> Subscription<T>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let (state_tx, state_rx) = watch::channel(MirrorState::Loading);
        let delivery = Arc::new(Mutex::new(Delivery {
            attached: true,
            handler: on_snapshot,
            state_tx,
        }));
        let (live_tx, live_rx) = watch::channel(false);
        let cancel = CancellationToken::new();

        let task = FeedTask {
            feed: feed.clone(),
            client: self.client.clone(),
            notifier: self.notifier.clone(),
            options: self.options,
            delivery: delivery.clone(),
            live: live_tx,
            down_reported: false,
            last_error: None,
            cancel: cancel.clone(),
        };
        tracing::debug!(feed = %feed, "Subscribing");
        tokio::spawn(task.run());

        Subscription {
            feed,
            delivery,
            state_rx,
            live: live_rx,
            cancel,
        }
    }
}

struct Delivery<T> {
    attached: bool,
    handler: Option<SnapshotHandler<T>>,
    state_tx: watch::Sender<MirrorState<T>>,
}

/// A live view of one feed.
pub struct Subscription<T> {
    feed: FeedDescriptor,
    delivery: Arc<Mutex<Delivery<T>>>,
    state_rx: watch::Receiver<MirrorState<T>>,
    live: watch::Receiver<bool>,
    cancel: CancellationToken,
}

impl<T> Subscription<T> {
    pub fn feed(&self) -> &FeedDescriptor {
        &self.feed
    }

    /// The most recent snapshot, or `None` while loading.
    pub fn current(&self) -> Option<Arc<T>> {
        self.state_rx.borrow().snapshot().cloned()
    }

    pub fn is_loading(&self) -> bool {
        matches!(*self.state_rx.borrow(), MirrorState::Loading)
    }

    /// Whether the underlying connection is currently up. A mirror that is
    /// not live still holds its last snapshot.
    pub fn is_live(&self) -> bool {
        *self.live.borrow()
    }

    /// Liveness as a channel, for views that mark stale snapshots.
    pub fn watch_live(&self) -> watch::Receiver<bool> {
        self.live.clone()
    }

    pub fn watch(&self) -> watch::Receiver<MirrorState<T>> {
        self.state_rx.clone()
    }

    /// Wait for the next snapshot after the last one observed through this
    /// method.
    pub async fn changed(&mut self) -> Option<Arc<T>> {
        if self.state_rx.changed().await.is_err() {
            return None;
        }
        self.state_rx.borrow_and_update().snapshot().cloned()
    }

    /// Stop following the feed. Equivalent to dropping the subscription.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        {
            let mut delivery = lock(&self.delivery);
            delivery.attached = false;
            delivery.handler = None;
        }
        self.cancel.cancel();
        tracing::debug!(feed = %self.feed, "Unsubscribed");
    }
}

struct FeedTask<T> {
    feed: FeedDescriptor,
    client: BackendClient,
    notifier: Notifier,
    options: MirrorOptions,
    delivery: Arc<Mutex<Delivery<T>>>,
    live: watch::Sender<bool>,
    /// Connectivity already reported for the current outage.
    down_reported: bool,
    /// Last backend `Error` reported, cleared by an accepted reply.
    last_error: Option<String>,
    cancel: CancellationToken,
}

impl<T> FeedTask<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    async fn run(mut self) {
        match self.feed.transport(self.client.backend()) {
            FeedTransport::Stream(url) => self.stream(&url).await,
            FeedTransport::Poll(url) => self.poll(url).await,
        }
        self.live.send_replace(false);
    }

    fn mark_up(&mut self) {
        self.down_reported = false;
        self.live.send_if_modified(|live| !std::mem::replace(live, true));
    }

    fn mark_down(&mut self) {
        self.live.send_if_modified(|live| std::mem::replace(live, false));
        if !self.down_reported && !self.cancel.is_cancelled() {
            self.down_reported = true;
            self.notifier.error(CONNECTIVITY_MESSAGE);
        }
    }

    async fn stream(&mut self, url: &str) {
        let mut failures = 0u32;
        loop {
            let connected = tokio::select! {
                () = self.cancel.cancelled() => return,
                result = tokio_tungstenite::connect_async(url) => result,
            };
            match connected {
                Ok((mut ws, _)) => {
                    failures = 0;
                    self.mark_up();
                    tracing::debug!(feed = %self.feed, "Feed connected");
                    loop {
                        tokio::select! {
                            () = self.cancel.cancelled() => {
                                let _ = ws.close(None).await;
                                return;
                            }
                            msg = ws.next() => match msg {
                                Some(Ok(Message::Text(text))) => self.on_text(text.as_str()),
                                Some(Ok(Message::Binary(bytes))) => {
                                    self.on_text(&String::from_utf8_lossy(&bytes));
                                }
                                Some(Ok(Message::Close(_))) | None => {
                                    tracing::warn!(feed = %self.feed, "Feed closed by backend");
                                    break;
                                }
                                Some(Ok(_)) => {} // Ping/Pong/Frame
                                Some(Err(e)) => {
                                    tracing::warn!(feed = %self.feed, error = %e, "Feed connection lost");
                                    break;
                                }
                            },
                        }
                    }
                    self.mark_down();
                }
                Err(e) => {
                    tracing::warn!(feed = %self.feed, error = %e, "Feed connect failed");
                    self.mark_down();
                }
            }

            failures += 1;
            let delay = backoff_delay(
                self.options.retry_delay,
                self.options.retry_max_delay,
                failures,
            );
            tokio::select! {
                () = self.cancel.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn poll(&mut self, url: reqwest::Url) {
        let mut ticker = tokio::time::interval(self.options.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => return,
                _ = ticker.tick() => {}
            }
            let result = tokio::select! {
                () = self.cancel.cancelled() => return,
                result = self.client.get_envelope(url.clone()) => result,
            };
            match result {
                Ok(frame) => {
                    self.mark_up();
                    self.ingest(frame);
                }
                Err(e) => {
                    tracing::warn!(feed = %self.feed, error = %e, "Feed refresh failed");
                    self.mark_down();
                }
            }
        }
    }

    fn on_text(&mut self, text: &str) {
        match serde_json::from_str::<Value>(text) {
            Ok(frame) => self.ingest(frame),
            Err(e) => tracing::warn!(feed = %self.feed, error = %e, "Discarding malformed frame"),
        }
    }

    fn ingest(&mut self, frame: Value) {
        let payload = match self.feed.extract(frame) {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                tracing::debug!(feed = %self.feed, "Empty frame");
                return;
            }
            Err(ClientError::Backend(msg)) => {
                tracing::warn!(feed = %self.feed, error = %msg, "Backend reported an error");
                if self.last_error.as_deref() != Some(msg.as_str()) {
                    self.notifier.error(msg.clone());
                    self.last_error = Some(msg);
                }
                return;
            }
            Err(e) => {
                tracing::warn!(feed = %self.feed, error = %e, "Discarding frame");
                return;
            }
        };
        match serde_json::from_value::<T>(payload) {
            Ok(snapshot) => {
                self.last_error = None;
                self.publish(snapshot);
            }
            Err(e) => {
                tracing::warn!(feed = %self.feed, error = %e, "Snapshot does not match the expected shape");
            }
        }
    }

    fn publish(&self, snapshot: T) {
        let mut delivery = lock(&self.delivery);
        if !delivery.attached {
            return;
        }
        let snapshot = Arc::new(snapshot);
        delivery
            .state_tx
            .send_replace(MirrorState::Loaded(snapshot.clone()));
        if let Some(handler) = delivery.handler.as_mut() {
            handler(&snapshot);
        }
    }
}
