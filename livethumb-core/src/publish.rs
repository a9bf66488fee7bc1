//! HTTP fan-out of frame payloads to subscriber hosts.
//!
//! Every host gets one bounded POST per frame. Attempts run concurrently and
//! are isolated: a timeout or error on one host never affects the others.
//! Outcomes are collected per host and only ever logged.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use futures::future::join_all;
use reqwest::StatusCode;
use tracing::{debug, error, warn};

use crate::error::{BroadcastError, Result};
use crate::filter::ChannelFilter;

pub const DEFAULT_URL_TEMPLATE: &str = "http://{host}:{port}/pub?id={channel}";

/// Destination URL template with `{channel}`, `{host}` and `{port}`
/// placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate(String);

impl UrlTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn expand(&self, channel: &str, host: &str, port: u16) -> String {
        self.0
            .replace("{channel}", channel)
            .replace("{host}", host)
            .replace("{port}", &port.to_string())
    }
}

impl Default for UrlTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_URL_TEMPLATE)
    }
}

#[derive(Debug, Clone)]
pub struct PublisherSettings {
    pub hosts: Vec<String>,
    pub port: u16,
    pub url_template: UrlTemplate,
    pub filter: ChannelFilter,
    pub timeout: Duration,
}

impl Default for PublisherSettings {
    fn default() -> Self {
        Self {
            hosts: vec!["localhost".to_string()],
            port: 9080,
            url_template: UrlTemplate::default(),
            filter: ChannelFilter::allow_all(),
            timeout: Duration::from_millis(500),
        }
    }
}

/// Result of a single POST to a single host.
#[derive(Debug)]
pub enum DeliveryOutcome {
    Delivered,
    Rejected { status: StatusCode },
    Failed { error: BroadcastError },
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered)
    }
}

#[derive(Debug)]
pub struct HostDelivery {
    pub host: String,
    pub url: String,
    pub outcome: DeliveryOutcome,
}

#[derive(Debug)]
pub enum PublishReport {
    /// The channel did not match the configured filter; nothing was sent.
    Filtered,
    Attempted(Vec<HostDelivery>),
}

impl PublishReport {
    pub fn delivered(&self) -> usize {
        match self {
            PublishReport::Filtered => 0,
            PublishReport::Attempted(deliveries) => deliveries
                .iter()
                .filter(|delivery| delivery.outcome.is_delivered())
                .count(),
        }
    }

    pub fn attempted(&self) -> usize {
        match self {
            PublishReport::Filtered => 0,
            PublishReport::Attempted(deliveries) => deliveries.len(),
        }
    }
}

#[derive(Clone)]
pub struct HttpPublisher {
    client: reqwest::Client,
    settings: PublisherSettings,
}

impl fmt::Debug for HttpPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpPublisher")
            .field("hosts", &self.settings.hosts)
            .field("port", &self.settings.port)
            .field("url_template", &self.settings.url_template)
            .field("filtered", &self.settings.filter.is_restricted())
            .field("timeout", &self.settings.timeout)
            .finish()
    }
}

impl HttpPublisher {
    pub fn new(settings: PublisherSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()?;
        Ok(Self::with_client(client, settings))
    }

    pub fn with_client(
        client: reqwest::Client,
        mut settings: PublisherSettings,
    ) -> Self {
        settings.hosts.retain(|host| !host.trim().is_empty());
        Self { client, settings }
    }

    pub fn hosts(&self) -> &[String] {
        &self.settings.hosts
    }

    /// POST `payload` to every configured host for `channel`.
    pub async fn publish(
        &self,
        channel: &str,
        payload: Bytes,
        source: &Path,
    ) -> PublishReport {
        if !self.settings.filter.admits(channel) {
            debug!(
                channel,
                path = %source.display(),
                "channel filtered out of HTTP fan-out"
            );
            return PublishReport::Filtered;
        }

        let attempts = self.settings.hosts.iter().map(|host| {
            let url = self.settings.url_template.expand(
                channel,
                host,
                self.settings.port,
            );
            let body = payload.clone();
            async move {
                let outcome = self.post(&url, body).await;
                log_delivery(source, host, &url, &outcome);
                HostDelivery {
                    host: host.clone(),
                    url,
                    outcome,
                }
            }
        });

        PublishReport::Attempted(join_all(attempts).await)
    }

    async fn post(&self, url: &str, body: Bytes) -> DeliveryOutcome {
        let request = self.client.post(url).body(body).send();
        let response = match tokio::time::timeout(self.settings.timeout, request)
            .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                return DeliveryOutcome::Failed { error: err.into() };
            }
            Err(_) => {
                return DeliveryOutcome::Failed {
                    error: BroadcastError::Timeout(format!(
                        "POST {url} exceeded {:?}",
                        self.settings.timeout
                    )),
                };
            }
        };

        let status = response.status();
        if status == StatusCode::OK {
            DeliveryOutcome::Delivered
        } else {
            DeliveryOutcome::Rejected { status }
        }
    }
}

fn log_delivery(source: &Path, host: &str, url: &str, outcome: &DeliveryOutcome) {
    match outcome {
        DeliveryOutcome::Delivered => {
            debug!(path = %source.display(), url, "pushed frame");
        }
        DeliveryOutcome::Rejected { status } => {
            error!(
                path = %source.display(),
                host,
                url,
                status = status.as_u16(),
                "subscriber rejected frame"
            );
        }
        DeliveryOutcome::Failed { error } => {
            warn!(
                path = %source.display(),
                host,
                url,
                error = %error,
                "frame delivery failed"
            );
        }
    }
}
