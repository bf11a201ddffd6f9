//! HTTP client for the backend's one-shot endpoints.
//!
//! [`BackendClient`] wraps `reqwest::Client` and provides typed methods for
//! each REST route the console uses. It is cheap to clone; clones share the
//! connection pool.
//!
//! ## Error handling
//!
//! The backend signals business failures with an `Error` field in the JSON
//! body, sometimes with HTTP 200 and sometimes with HTTP 500. The body is
//! therefore decoded regardless of status: a non-empty `Error` becomes
//! [`ClientError::Backend`]; a body that does not decode becomes
//! [`ClientError::Protocol`] (naming the status when it was not a success).

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::endpoint::Backend;
use crate::error::ClientError;
use crate::model::{
    ActionReply, ContainerList, ContainerSummary, CreateContainerPayload, CreateReply, Envelope,
    Host, ImageList, ImageSummary, MachineList,
};

/// Connect and total-request timeouts.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub connect: Duration,
    pub request: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            request: Duration::from_secs(30),
        }
    }
}

/// HTTP client for one backend API server.
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    backend: Backend,
}

impl BackendClient {
    pub fn new(backend: Backend, timeouts: Timeouts) -> Result<Self, ClientError> {
        let mut default_headers = reqwest::header::HeaderMap::new();
        default_headers.insert(
            reqwest::header::HeaderName::from_static("x-fleet-client"),
            reqwest::header::HeaderValue::from_static("console"),
        );
        let http = reqwest::Client::builder()
            .default_headers(default_headers)
            .connect_timeout(timeouts.connect)
            .timeout(timeouts.request)
            .build()
            .map_err(ClientError::Request)?;
        Ok(Self { http, backend })
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// `GET /machines`: fleet inventory.
    pub async fn machines(&self) -> Result<Vec<Host>, ClientError> {
        let list: MachineList = self.get("/machines", &[]).await?;
        Ok(list.machines.unwrap_or_default())
    }

    /// `GET /containers?ip=`: containers on one host.
    pub async fn containers(&self, ip: &str) -> Result<Vec<ContainerSummary>, ClientError> {
        let list: ContainerList = self.get("/containers", &[("ip", ip)]).await?;
        Ok(list.containers.unwrap_or_default())
    }

    /// `GET /images?ip=`: images on one host.
    pub async fn images(&self, ip: &str) -> Result<Vec<ImageSummary>, ClientError> {
        let list: ImageList = self.get("/images", &[("ip", ip)]).await?;
        Ok(list.images.unwrap_or_default())
    }

    /// `GET /container/action`: start, stop or restart a container.
    pub async fn container_action(
        &self,
        ip: &str,
        container_id: &str,
        action: &str,
    ) -> Result<(), ClientError> {
        let _: ActionReply = self
            .get(
                "/container/action",
                &[("ip", ip), ("containerID", container_id), ("action", action)],
            )
            .await?;
        Ok(())
    }

    /// `POST /container/create`: create and start a container from an image.
    ///
    /// Returns the new container's id as reported by the backend.
    pub async fn create_container(
        &self,
        payload: &CreateContainerPayload,
    ) -> Result<String, ClientError> {
        let resp = self
            .http
            .post(self.backend.http_url("/container/create", &[]))
            .json(payload)
            .send()
            .await
            .map_err(ClientError::Request)?;
        let reply: CreateReply = Self::handle_response(resp).await?;
        Ok(reply.msg.trim().to_string())
    }

    /// Fetch a raw reply envelope. Used by polled state feeds, which decide
    /// for themselves which field holds the payload.
    pub(crate) async fn get_envelope(
        &self,
        url: reqwest::Url,
    ) -> Result<serde_json::Value, ClientError> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(ClientError::Request)?;
        Self::decode(resp).await
    }

    async fn get<T: DeserializeOwned + Envelope>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ClientError> {
        let resp = self
            .http
            .get(self.backend.http_url(path, query))
            .send()
            .await
            .map_err(ClientError::Request)?;
        Self::handle_response(resp).await
    }

    /// Decode a reply and surface a non-empty `Error` field as
    /// [`ClientError::Backend`].
    async fn handle_response<T: DeserializeOwned + Envelope>(
        resp: reqwest::Response,
    ) -> Result<T, ClientError> {
        let reply: T = Self::decode(resp).await?;
        let error = reply.error();
        if error.is_empty() {
            Ok(reply)
        } else {
            Err(ClientError::Backend(error.to_string()))
        }
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ClientError> {
        let status = resp.status();
        let body = resp.text().await.map_err(ClientError::Request)?;
        serde_json::from_str(&body).map_err(|e| {
            if status.is_success() {
                ClientError::Protocol(format!("Invalid JSON from backend: {e}"))
            } else {
                let snippet: String = body.chars().take(200).collect();
                ClientError::Protocol(format!("HTTP {}: {snippet}", status.as_u16()))
            }
        })
    }
}
