#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::redundant_closure_for_method_calls)]

//! fleet-console library: the building blocks of the operator console.
//!
//! - `session`: terminal session channel (remote shells, log tails)
//! - `mirror`: live state mirrors fed by streams or polling
//! - `dispatch`: one-shot container actions, one in flight per control
//! - `inventory`: fleet host list and reachability
//! - `client`: HTTP client for the backend's one-shot routes
//! - `endpoint`: backend addressing for sessions and feeds
//! - `terminal`: terminal sink trait and the stdio implementation
//! - `model`: wire types
//! - `view`: plain-text rendering
//! - `config`: CLI and TOML configuration
//!
//! ```text
//!            ┌────────────┐ snapshots  ┌──────────────┐
//! backend ──▶│ StateMirror│──────────▶ │ view / caller│
//!   │        └────────────┘            └──────┬───────┘
//!   │        ┌──────────────┐  text           │ intent
//!   ├───────▶│SessionChannel│────────▶ TerminalSink
//!   │◀───────│              │◀──────── keystrokes
//!   │        └──────────────┘                 │
//!   │        ┌──────────────────┐             │
//!   └───────▶│ ActionDispatcher │◀────────────┘
//!            └──────────────────┘──▶ Notifier
//! ```

pub mod client;
pub mod config;
pub mod dispatch;
pub mod endpoint;
pub mod error;
pub mod inventory;
pub mod mirror;
pub mod model;
pub mod notify;
pub mod session;
pub mod terminal;
mod util;
pub mod view;

#[cfg(test)]
mod testutil;

pub use client::BackendClient;
pub use dispatch::{ActionControl, ActionDispatcher, ActionRequest, Outcome};
pub use endpoint::{Backend, Endpoint, FeedDescriptor};
pub use error::ClientError;
pub use mirror::{MirrorState, StateMirror, Subscription};
pub use notify::{Notification, Notifier, Severity};
pub use session::{SessionChannel, SessionHandle, SessionState};
pub use terminal::{StdioTerminal, TerminalSink};
