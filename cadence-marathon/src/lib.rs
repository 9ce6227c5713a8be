//! # cadence-marathon
//!
//! HTTP implementation of [`Orchestrator`] for Marathon.
//!
//! - `GET /v2/apps?embed=apps.tasks` lists every app with its tasks in one
//!   round trip.
//! - `GET /v2/events` is a server-sent event stream; each SSE `event:` name is
//!   the Marathon event type.
//!
//! Only the first configured endpoint is used.

use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::{Event, Eventsource};
use futures::{future, StreamExt};
use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;

use cadence_core::config::MarathonConfig;
use cadence_core::{AppsResponse, Application, ChangeEvent, EventStream, Orchestrator, OrchestratorError};

/// Marathon REST + SSE client.
#[derive(Debug, Clone)]
pub struct MarathonClient {
    http: Client,
    endpoint: String,
    credentials: Option<(String, Option<String>)>,
    request_timeout: Duration,
}

impl MarathonClient {
    /// Build a client from configuration.
    ///
    /// No whole-request timeout is set on the underlying client because the
    /// event stream is long-lived; the app listing gets a per-request timeout.
    pub fn new(config: &MarathonConfig) -> Result<Self, OrchestratorError> {
        let request_timeout = config.request_timeout();
        let http = Client::builder()
            .connect_timeout(request_timeout)
            .build()
            .map_err(|e| OrchestratorError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            credentials: config.credentials(),
            request_timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn apps_url(&self) -> String {
        format!("{}/v2/apps?embed=apps.tasks", self.endpoint)
    }

    pub fn events_url(&self) -> String {
        format!("{}/v2/events", self.endpoint)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some((user, password)) => request.basic_auth(user, password.as_ref()),
            None => request,
        }
    }

    fn transport_err(&self, err: reqwest::Error) -> OrchestratorError {
        if err.is_timeout() {
            OrchestratorError::Timeout(self.request_timeout)
        } else {
            OrchestratorError::Transport(err.to_string())
        }
    }

    async fn ensure_success(response: Response) -> Result<Response, OrchestratorError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(OrchestratorError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl Orchestrator for MarathonClient {
    async fn list_applications(&self) -> Result<Vec<Application>, OrchestratorError> {
        let request = self
            .authorize(self.http.get(self.apps_url()))
            .header(ACCEPT, "application/json")
            .timeout(self.request_timeout);
        let response = request.send().await.map_err(|e| self.transport_err(e))?;
        let response = Self::ensure_success(response).await?;
        let body = response.bytes().await.map_err(|e| self.transport_err(e))?;
        let apps: AppsResponse =
            serde_json::from_slice(&body).map_err(|e| OrchestratorError::Decode(e.to_string()))?;
        tracing::debug!(apps = apps.apps.len(), "listed applications");
        Ok(apps.apps)
    }

    async fn subscribe_events(&self) -> Result<EventStream, OrchestratorError> {
        let request = self
            .authorize(self.http.get(self.events_url()))
            .header(ACCEPT, "text/event-stream");
        let response = request.send().await.map_err(|e| self.transport_err(e))?;
        let response = Self::ensure_success(response).await?;
        tracing::info!(url = %self.events_url(), "event stream attached");

        let stream = response
            .bytes_stream()
            .eventsource()
            .filter_map(|item| {
                future::ready(match item {
                    Ok(event) => change_event(&event).map(Ok),
                    Err(err) => Some(Err(OrchestratorError::Stream(err.to_string()))),
                })
            });
        Ok(Box::pin(stream))
    }
}

/// Event type from the SSE `event:` field, falling back to the `eventType`
/// in the JSON payload when the server sent an unnamed event.
fn change_event(event: &Event) -> Option<ChangeEvent> {
    if !event.event.is_empty() && event.event != "message" {
        return Some(ChangeEvent::new(event.event.as_str()));
    }
    let payload: Value = serde_json::from_str(&event.data).ok()?;
    payload
        .get("eventType")
        .and_then(Value::as_str)
        .map(ChangeEvent::new)
}
