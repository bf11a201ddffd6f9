//! Fleet inventory: which hosts exist and whether they can be reached.

use crate::client::BackendClient;
use crate::error::ClientError;
use crate::model::Host;
use crate::notify::{Notifier, CONNECTIVITY_MESSAGE};

/// Shown when the operator picks a host the backend cannot reach.
pub const OFFLINE_MESSAGE: &str =
    "Sorry, this machine is currently offline and cannot be accessed.";

/// Fetch the host list once.
///
/// Failures are reported through `notifier` and yield an empty list, so a
/// caller always has something to render.
pub async fn fetch_inventory(client: &BackendClient, notifier: &Notifier) -> Vec<Host> {
    match client.machines().await {
        Ok(hosts) => {
            tracing::debug!(count = hosts.len(), "Fetched inventory");
            hosts
        }
        Err(ClientError::Backend(message)) => {
            notifier.error(message);
            Vec::new()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Inventory fetch failed");
            notifier.error(CONNECTIVITY_MESSAGE);
            Vec::new()
        }
    }
}

/// Why a host cannot be used as a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostUnavailable {
    Unknown(String),
    Offline(String),
}

impl std::fmt::Display for HostUnavailable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostUnavailable::Unknown(ip) => write!(f, "Unknown machine: {ip}"),
            HostUnavailable::Offline(_) => f.write_str(OFFLINE_MESSAGE),
        }
    }
}

/// Look up `ip` and require it to be reachable.
pub fn require_reachable<'a>(hosts: &'a [Host], ip: &str) -> Result<&'a Host, HostUnavailable> {
    let host = hosts
        .iter()
        .find(|h| h.ip == ip)
        .ok_or_else(|| HostUnavailable::Unknown(ip.to_string()))?;
    if host.is_reachable() {
        Ok(host)
    } else {
        Err(HostUnavailable::Offline(ip.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Timeouts;
    use crate::model::MachineStatus;
    use crate::notify;
    use crate::testutil::spawn_backend;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    fn host(ip: &str, status: MachineStatus) -> Host {
        Host {
            ip: ip.into(),
            status,
            ..Host::default()
        }
    }

    #[test]
    fn offline_host_is_refused() {
        let hosts = [
            host("10.0.0.1", MachineStatus::Reachable),
            host("10.0.0.2", MachineStatus::Unreachable),
        ];
        assert_eq!(require_reachable(&hosts, "10.0.0.1").unwrap().ip, "10.0.0.1");
        let err = require_reachable(&hosts, "10.0.0.2").unwrap_err();
        assert_eq!(err.to_string(), OFFLINE_MESSAGE);
        assert_eq!(
            require_reachable(&hosts, "10.9.9.9").unwrap_err(),
            HostUnavailable::Unknown("10.9.9.9".into())
        );
    }

    #[tokio::test]
    async fn backend_error_yields_empty_list_and_notification() {
        let app = Router::new().route(
            "/machines",
            get(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"Machines": null, "Error": "sql: database is closed"})),
                )
            }),
        );
        let fake = spawn_backend(app).await;
        let client = BackendClient::new(fake.backend.clone(), Timeouts::default()).unwrap();
        let (notifier, mut rx) = notify::channel();
        assert!(fetch_inventory(&client, &notifier).await.is_empty());
        assert_eq!(rx.try_recv().unwrap().message, "sql: database is closed");
    }

    #[tokio::test]
    async fn unreachable_backend_yields_connectivity_message() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let backend = crate::endpoint::Backend::parse(&addr.to_string()).unwrap();
        let client = BackendClient::new(backend, Timeouts::default()).unwrap();
        let (notifier, mut rx) = notify::channel();
        assert!(fetch_inventory(&client, &notifier).await.is_empty());
        assert_eq!(rx.try_recv().unwrap().message, CONNECTIVITY_MESSAGE);
    }
}
