//! Backend addressing: base address, session endpoints and state feeds.
//!
//! Every remote resource is addressed by a host `ip` plus an optional resource
//! id, carried as query parameters. [`Endpoint`] describes a terminal session
//! target, [`FeedDescriptor`] a state feed. Both are opaque to the components
//! that consume them; only this module knows the routes.

use reqwest::Url;
use serde_json::Value;

use crate::error::ClientError;
use crate::model::Envelope;

/// Base address of the backend API server.
///
/// Accepts either a full `http://`/`https://` URL or a bare `host:port`,
/// which is treated as plain HTTP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backend {
    base: Url,
}

impl Backend {
    pub fn parse(address: &str) -> Result<Self, String> {
        let trimmed = address.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err("Backend address is empty".into());
        }
        let with_scheme = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("http://{trimmed}")
        };
        let base = Url::parse(&with_scheme)
            .map_err(|e| format!("Invalid backend address '{address}': {e}"))?;
        match base.scheme() {
            "http" | "https" => Ok(Self { base }),
            other => Err(format!(
                "Unsupported scheme '{other}' in backend address '{address}'"
            )),
        }
    }

    /// HTTP URL for a one-shot route.
    pub fn http_url(&self, path: &str, query: &[(&str, &str)]) -> Url {
        let mut url = self.base.clone();
        let prefix = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{prefix}{path}"));
        url.set_query(None);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        url
    }

    /// WebSocket URL for a streaming route (`ws://` or `wss://`).
    pub fn ws_url(&self, path: &str, query: &[(&str, &str)]) -> String {
        let http = self.http_url(path, query).to_string();
        if let Some(rest) = http.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = http.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            http
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.base.as_str().trim_end_matches('/'))
    }
}

/// Whether a session relays keystrokes upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Interactive,
    ReadOnly,
}

/// Target of a terminal session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Login shell on the machine itself.
    MachineShell { ip: String },
    /// Shell inside a running container.
    ContainerShell { ip: String, container_id: String },
    /// Read-only tail of a container's log.
    ContainerLogs { ip: String, container_id: String },
}

impl Endpoint {
    pub fn mode(&self) -> SessionMode {
        match self {
            Self::MachineShell { .. } | Self::ContainerShell { .. } => SessionMode::Interactive,
            Self::ContainerLogs { .. } => SessionMode::ReadOnly,
        }
    }

    pub fn ip(&self) -> &str {
        match self {
            Self::MachineShell { ip }
            | Self::ContainerShell { ip, .. }
            | Self::ContainerLogs { ip, .. } => ip,
        }
    }

    pub fn url(&self, backend: &Backend) -> String {
        match self {
            Self::MachineShell { ip } => backend.ws_url("/machine/exec", &[("ip", ip)]),
            Self::ContainerShell { ip, container_id } => backend.ws_url(
                "/container/exec",
                &[("ip", ip), ("containerID", container_id)],
            ),
            Self::ContainerLogs { ip, container_id } => backend.ws_url(
                "/container/log",
                &[("ip", ip), ("containerID", container_id)],
            ),
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MachineShell { ip } => write!(f, "shell on {ip}"),
            Self::ContainerShell { ip, container_id } => {
                write!(f, "shell in {container_id} on {ip}")
            }
            Self::ContainerLogs { ip, container_id } => write!(f, "logs of {container_id} on {ip}"),
        }
    }
}

/// A resource-state feed a [`StateMirror`](crate::mirror::StateMirror) can follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedDescriptor {
    /// Pushed `docker container inspect` snapshots.
    Container { ip: String, container_id: String },
    /// Pushed `docker image inspect` snapshots.
    Image { ip: String, image_id: String },
    /// All containers on a host (polled).
    Containers { ip: String },
    /// All images on a host (polled).
    Images { ip: String },
    /// The fleet inventory (polled).
    Machines,
}

/// How a feed's frames reach the mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FeedTransport {
    /// Server-push WebSocket; one text frame per snapshot.
    Stream(String),
    /// Repeated one-shot GET; one reply per snapshot.
    Poll(Url),
}

impl FeedDescriptor {
    pub(crate) fn transport(&self, backend: &Backend) -> FeedTransport {
        match self {
            Self::Container { ip, container_id } => FeedTransport::Stream(backend.ws_url(
                "/container/stream",
                &[("ip", ip), ("containerID", container_id)],
            )),
            Self::Image { ip, image_id } => FeedTransport::Stream(
                backend.ws_url("/image/stream", &[("ip", ip), ("imageID", image_id)]),
            ),
            Self::Containers { ip } => {
                FeedTransport::Poll(backend.http_url("/containers", &[("ip", ip)]))
            }
            Self::Images { ip } => FeedTransport::Poll(backend.http_url("/images", &[("ip", ip)])),
            Self::Machines => FeedTransport::Poll(backend.http_url("/machines", &[])),
        }
    }

    /// Collection key inside a polled reply envelope.
    fn collection_key(&self) -> Option<&'static str> {
        match self {
            Self::Containers { .. } => Some("Containers"),
            Self::Images { .. } => Some("Images"),
            Self::Machines => Some("Machines"),
            Self::Container { .. } | Self::Image { .. } => None,
        }
    }

    /// Pull the snapshot payload out of one decoded frame.
    ///
    /// Returns `Ok(None)` when the frame carries no data (an empty or `null`
    /// single-resource frame). A `null` collection is an empty collection.
    pub fn extract(&self, frame: Value) -> Result<Option<Value>, ClientError> {
        match self.collection_key() {
            None => match frame {
                Value::Array(items) => Ok(items.into_iter().next().filter(|v| !v.is_null())),
                other => Err(ClientError::Protocol(format!(
                    "expected an array-wrapped snapshot, got {}",
                    kind_of(&other)
                ))),
            },
            Some(key) => {
                if !frame.is_object() {
                    return Err(ClientError::Protocol(format!(
                        "expected a reply object, got {}",
                        kind_of(&frame)
                    )));
                }
                let error = frame.error();
                if !error.is_empty() {
                    return Err(ClientError::Backend(error.to_string()));
                }
                match frame.get(key) {
                    None | Some(Value::Null) => Ok(Some(Value::Array(Vec::new()))),
                    Some(rows) => Ok(Some(rows.clone())),
                }
            }
        }
    }
}

impl std::fmt::Display for FeedDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Container { ip, container_id } => write!(f, "container {container_id} on {ip}"),
            Self::Image { ip, image_id } => write!(f, "image {image_id} on {ip}"),
            Self::Containers { ip } => write!(f, "containers on {ip}"),
            Self::Images { ip } => write!(f, "images on {ip}"),
            Self::Machines => f.write_str("machines"),
        }
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_address_defaults_to_http() {
        let b = Backend::parse("127.0.0.1:8080").unwrap();
        assert_eq!(
            b.http_url("/machines", &[]).as_str(),
            "http://127.0.0.1:8080/machines"
        );
        assert_eq!(b.to_string(), "http://127.0.0.1:8080");
    }

    #[test]
    fn rejects_unsupported_scheme() {
        assert!(Backend::parse("ftp://example.com").is_err());
        assert!(Backend::parse("   ").is_err());
    }

    #[test]
    fn ws_scheme_follows_http_scheme() {
        let plain = Backend::parse("http://api.local:8080/").unwrap();
        let tls = Backend::parse("https://api.example.com").unwrap();
        let ep = Endpoint::MachineShell {
            ip: "10.0.0.5".into(),
        };
        assert_eq!(ep.url(&plain), "ws://api.local:8080/machine/exec?ip=10.0.0.5");
        assert_eq!(ep.url(&tls), "wss://api.example.com/machine/exec?ip=10.0.0.5");
    }

    #[test]
    fn base_path_prefix_is_kept() {
        let b = Backend::parse("https://ops.example.com/fleet/").unwrap();
        assert_eq!(
            b.http_url("/images", &[("ip", "10.0.0.1")]).as_str(),
            "https://ops.example.com/fleet/images?ip=10.0.0.1"
        );
    }

    #[test]
    fn query_values_are_encoded() {
        let b = Backend::parse("localhost:9000").unwrap();
        let ep = Endpoint::ContainerLogs {
            ip: "10.0.0.1".into(),
            container_id: "a b&c".into(),
        };
        assert_eq!(
            ep.url(&b),
            "ws://localhost:9000/container/log?ip=10.0.0.1&containerID=a+b%26c"
        );
        assert_eq!(ep.mode(), SessionMode::ReadOnly);
    }

    #[test]
    fn shell_endpoints_are_interactive() {
        let shell = Endpoint::ContainerShell {
            ip: "h".into(),
            container_id: "c".into(),
        };
        assert_eq!(shell.mode(), SessionMode::Interactive);
        assert_eq!(shell.ip(), "h");
    }

    #[test]
    fn feed_routes() {
        let b = Backend::parse("localhost:9000").unwrap();
        let image = FeedDescriptor::Image {
            ip: "h".into(),
            image_id: "sha256:1".into(),
        };
        assert_eq!(
            image.transport(&b),
            FeedTransport::Stream("ws://localhost:9000/image/stream?ip=h&imageID=sha256%3A1".into())
        );
        match FeedDescriptor::Machines.transport(&b) {
            FeedTransport::Poll(url) => assert_eq!(url.as_str(), "http://localhost:9000/machines"),
            FeedTransport::Stream(_) => panic!("machines feed should poll"),
        }
    }

    #[test]
    fn stream_frame_takes_first_element() {
        let feed = FeedDescriptor::Container {
            ip: "h".into(),
            container_id: "c".into(),
        };
        let payload = feed
            .extract(json!([{"Name": "/web"}, {"Name": "/ignored"}]))
            .unwrap();
        assert_eq!(payload, Some(json!({"Name": "/web"})));
        assert_eq!(feed.extract(json!([])).unwrap(), None);
        assert_eq!(feed.extract(json!([null])).unwrap(), None);
        assert!(feed.extract(json!({"Name": "/web"})).is_err());
    }

    #[test]
    fn polled_frame_unwraps_envelope() {
        let feed = FeedDescriptor::Containers { ip: "h".into() };
        assert_eq!(
            feed.extract(json!({"Containers": [{"ID": "1"}], "Error": ""}))
                .unwrap(),
            Some(json!([{"ID": "1"}]))
        );
        assert_eq!(
            feed.extract(json!({"Containers": null, "Error": ""})).unwrap(),
            Some(json!([]))
        );
        match feed.extract(json!({"Containers": null, "Error": "ssh: handshake failed"})) {
            Err(ClientError::Backend(msg)) => assert_eq!(msg, "ssh: handshake failed"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
