//! Wire types consumed from the backend.
//!
//! Field names follow the backend's PascalCase JSON. Resources (containers and
//! images) carry a small typed core plus an open [`Document`] holding every
//! other field verbatim: the schema is whatever `docker inspect` returns on
//! the remote host and is not fixed here.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Open key/value document for backend-defined fields.
pub type Document = serde_json::Map<String, Value>;

/// Reachability of a host as last observed by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum MachineStatus {
    #[default]
    Unreachable,
    Reachable,
}

impl From<i64> for MachineStatus {
    fn from(v: i64) -> Self {
        if v == 1 {
            Self::Reachable
        } else {
            Self::Unreachable
        }
    }
}

impl From<MachineStatus> for i64 {
    fn from(s: MachineStatus) -> Self {
        match s {
            MachineStatus::Unreachable => 0,
            MachineStatus::Reachable => 1,
        }
    }
}

/// A managed machine, as listed by `GET /machines`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Host {
    pub ip: String,
    pub host_name: String,
    pub os: String,
    pub status: MachineStatus,
    /// Login shell used for machine exec sessions.
    pub shell: String,
    /// Last error the backend hit while talking to this machine.
    pub error: String,
}

impl Host {
    pub fn is_reachable(&self) -> bool {
        self.status == MachineStatus::Reachable
    }
}

/// Full container document streamed by `/container/stream`.
///
/// Status is read from `State.Status` (inspect shape) and falls back to a
/// top-level `Status` field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Container {
    #[serde(rename = "Id", default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Status", default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "State", default, skip_serializing_if = "Option::is_none")]
    pub state: Option<ContainerState>,
    #[serde(rename = "RestartCount", default)]
    pub restart_count: u64,
    #[serde(rename = "Config", default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ContainerConfig>,
    #[serde(flatten)]
    pub extra: Document,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerState {
    #[serde(rename = "Status", default)]
    pub status: String,
    #[serde(flatten)]
    pub extra: Document,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerConfig {
    #[serde(rename = "Image", default)]
    pub image: String,
    #[serde(flatten)]
    pub extra: Document,
}

impl Container {
    pub fn status(&self) -> &str {
        self.state
            .as_ref()
            .map(|s| s.status.as_str())
            .filter(|s| !s.is_empty())
            .or(self.status.as_deref())
            .unwrap_or("")
    }

    /// Container name without the leading `/` docker prepends.
    pub fn display_name(&self) -> &str {
        self.name.trim_start_matches('/')
    }

    /// Image reference the container was declared with.
    pub fn image(&self) -> &str {
        self.config.as_ref().map_or("", |c| c.image.as_str())
    }
}

/// Full image document streamed by `/image/stream`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Image {
    #[serde(rename = "Id", default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "Architecture", default)]
    pub architecture: String,
    #[serde(rename = "Os", default)]
    pub os: String,
    #[serde(rename = "Size", default)]
    pub size: u64,
    #[serde(rename = "RepoTags", default, skip_serializing_if = "Vec::is_empty")]
    pub repo_tags: Vec<String>,
    #[serde(flatten)]
    pub extra: Document,
}

/// One row of `GET /containers` (a `docker container ls` line).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ContainerSummary {
    #[serde(rename = "ID")]
    pub id: String,
    pub names: String,
    pub image: String,
    pub state: String,
    pub status: String,
    pub ports: String,
    #[serde(flatten)]
    pub extra: Document,
}

/// One row of `GET /images` (a `docker image ls` line).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ImageSummary {
    #[serde(rename = "ID")]
    pub id: String,
    pub repository: String,
    pub tag: String,
    pub size: String,
    pub containers: String,
    #[serde(flatten)]
    pub extra: Document,
}

/// Replies that carry the backend's `Error` field.
///
/// A reply is a business failure iff this returns a non-empty string.
pub trait Envelope {
    fn error(&self) -> &str;
}

impl Envelope for Value {
    fn error(&self) -> &str {
        self.get("Error").and_then(Value::as_str).unwrap_or("")
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MachineList {
    pub machines: Option<Vec<Host>>,
    pub error: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ContainerList {
    pub containers: Option<Vec<ContainerSummary>>,
    pub error: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ImageList {
    pub images: Option<Vec<ImageSummary>>,
    pub error: String,
}

/// Reply of `GET /container/action`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ActionReply {
    pub error: String,
}

/// Reply of `POST /container/create`; `msg` is the new container id.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CreateReply {
    pub msg: String,
    pub error: String,
}

/// Body of `POST /container/create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateContainerPayload {
    pub image: String,
    pub ip: String,
    pub args: String,
}

macro_rules! envelope {
    ($($ty:ty),*) => {
        $(impl Envelope for $ty {
            fn error(&self) -> &str {
                &self.error
            }
        })*
    };
}

envelope!(MachineList, ContainerList, ImageList, ActionReply, CreateReply);
