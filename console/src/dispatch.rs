//! One-shot container actions with at-most-one-in-flight semantics.
//!
//! Each UI surface that can trigger actions owns an [`ActionControl`]. A
//! dispatch disables the control before any network activity and re-enables
//! it when the request resolves, whatever the outcome. Re-enabling is tied
//! to a guard's `Drop`, so a dispatch future that is cancelled or dropped
//! midway also releases the control.
//!
//! Every resolved dispatch produces exactly one notification:
//!
//! | outcome           | notification                                  |
//! |-------------------|-----------------------------------------------|
//! | success           | `Container <verb>ed successfully`             |
//! | business error    | the backend's `Error` text, verbatim          |
//! | transport error   | [`CONNECTIVITY_MESSAGE`]                      |

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::client::BackendClient;
use crate::error::ClientError;
use crate::model::CreateContainerPayload;
use crate::notify::{Notifier, CONNECTIVITY_MESSAGE};

/// Validation message for a `create` with blank arguments.
pub const EMPTY_ARGS_MESSAGE: &str = "Please enter args.";

/// Message shown when a control is triggered while its action is pending.
pub const IN_FLIGHT_MESSAGE: &str = "Another action is still in progress.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Start,
    Stop,
    Restart,
    Create,
}

impl Verb {
    /// Wire name used in the `action` query parameter.
    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Start => "start",
            Verb::Stop => "stop",
            Verb::Restart => "restart",
            Verb::Create => "create",
        }
    }

    pub fn past_tense(self) -> &'static str {
        match self {
            Verb::Start => "started",
            Verb::Stop => "stopped",
            Verb::Restart => "restarted",
            Verb::Create => "created",
        }
    }
}

impl std::fmt::Display for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A container on a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRef {
    pub ip: String,
    pub container_id: String,
}

/// Parameters for creating a container from an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRequest {
    pub ip: String,
    pub image: String,
    /// Free-form `docker run` arguments.
    pub args: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionRequest {
    Start(ContainerRef),
    Stop(ContainerRef),
    Restart(ContainerRef),
    Create(CreateRequest),
}

impl ActionRequest {
    pub fn verb(&self) -> Verb {
        match self {
            ActionRequest::Start(_) => Verb::Start,
            ActionRequest::Stop(_) => Verb::Stop,
            ActionRequest::Restart(_) => Verb::Restart,
            ActionRequest::Create(_) => Verb::Create,
        }
    }
}

/// How a dispatched request resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// `detail` carries the new container id for `create`.
    Success { verb: Verb, detail: Option<String> },
    BusinessError(String),
    TransportError(String),
}

/// Why a request was refused before reaching the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejected {
    /// The control already has a request in flight.
    InFlight,
    InvalidArgs(String),
}

impl std::fmt::Display for Rejected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejected::InFlight => f.write_str(IN_FLIGHT_MESSAGE),
            Rejected::InvalidArgs(msg) => f.write_str(msg),
        }
    }
}

/// Enabled/disabled state of one triggering control.
#[derive(Debug, Clone, Default)]
pub struct ActionControl {
    busy: Arc<AtomicBool>,
}

impl ActionControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        !self.busy.load(Ordering::SeqCst)
    }

    fn try_acquire(&self) -> Option<InFlight> {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| InFlight {
                busy: self.busy.clone(),
            })
    }
}

/// Holds a control disabled until dropped.
struct InFlight {
    busy: Arc<AtomicBool>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

#[derive(Clone)]
pub struct ActionDispatcher {
    client: BackendClient,
    notifier: Notifier,
}

impl ActionDispatcher {
    pub fn new(client: BackendClient, notifier: Notifier) -> Self {
        Self { client, notifier }
    }

    /// Run `request` on behalf of `control`.
    ///
    /// Returns `Err` only when the request never reached the network; the
    /// user has already been notified in that case too.
    pub async fn dispatch(
        &self,
        control: &ActionControl,
        request: ActionRequest,
    ) -> Result<Outcome, Rejected> {
        let Some(_in_flight) = control.try_acquire() else {
            self.notifier.warning(IN_FLIGHT_MESSAGE);
            return Err(Rejected::InFlight);
        };

        if let ActionRequest::Create(create) = &request {
            if create.args.trim().is_empty() {
                self.notifier.warning(EMPTY_ARGS_MESSAGE);
                return Err(Rejected::InvalidArgs(EMPTY_ARGS_MESSAGE.into()));
            }
        }

        let verb = request.verb();
        tracing::info!(verb = %verb, request = ?request, "Dispatching action");
        let result = match &request {
            ActionRequest::Start(target)
            | ActionRequest::Stop(target)
            | ActionRequest::Restart(target) => self
                .client
                .container_action(&target.ip, &target.container_id, verb.as_str())
                .await
                .map(|()| None),
            ActionRequest::Create(create) => self
                .client
                .create_container(&CreateContainerPayload {
                    image: create.image.clone(),
                    ip: create.ip.clone(),
                    args: create.args.trim().to_string(),
                })
                .await
                .map(Some),
        };

        Ok(match result {
            Ok(detail) => {
                self.notifier.success(success_message(verb, detail.as_deref()));
                Outcome::Success { verb, detail }
            }
            Err(ClientError::Backend(message)) => {
                self.notifier.error(message.clone());
                Outcome::BusinessError(message)
            }
            Err(e) => {
                tracing::warn!(verb = %verb, error = %e, "Action failed in transport");
                self.notifier.error(CONNECTIVITY_MESSAGE);
                Outcome::TransportError(e.to_string())
            }
        })
    }
}

fn success_message(verb: Verb, detail: Option<&str>) -> String {
    match detail.filter(|id| !id.is_empty()) {
        Some(id) => {
            let short: String = id.chars().take(12).collect();
            format!("Container {} successfully: {short}", verb.past_tense())
        }
        None => format!("Container {} successfully", verb.past_tense()),
    }
}
