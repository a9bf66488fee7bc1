use std::fmt;

use tracing::info;
use url::Url;

use crate::error::{ConfigLoadError, HostListError};

/// Where a destination host list comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum HostSource {
    /// Hosts given directly in configuration. May be empty.
    Static(Vec<String>),
    /// Fetched once at startup; the body must be a JSON array of strings.
    ListUrl(Url),
}

impl fmt::Debug for HostSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostSource::Static(hosts) => f.debug_tuple("Static").field(hosts).finish(),
            HostSource::ListUrl(url) => f.debug_tuple("ListUrl").field(&url.as_str()).finish(),
        }
    }
}

impl HostSource {
    /// A single host, or no hosts when `host` is blank.
    pub fn single(host: impl Into<String>) -> Self {
        Self::Static(clean(vec![host.into()]))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, HostSource::Static(hosts) if hosts.is_empty())
    }

    /// Resolve to a concrete list of non-blank host names.
    pub async fn resolve(
        &self,
        client: &reqwest::Client,
    ) -> Result<Vec<String>, ConfigLoadError> {
        match self {
            HostSource::Static(hosts) => Ok(clean(hosts.clone())),
            HostSource::ListUrl(url) => {
                let hosts = fetch(client, url).await.map_err(|source| {
                    ConfigLoadError::HostList {
                        url: url.to_string(),
                        source,
                    }
                })?;
                info!(url = %url, hosts = hosts.len(), "resolved host list");
                Ok(hosts)
            }
        }
    }
}

async fn fetch(
    client: &reqwest::Client,
    url: &Url,
) -> Result<Vec<String>, HostListError> {
    let response = client.get(url.clone()).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(HostListError::Status(status));
    }
    let body = response.bytes().await?;
    let hosts: Vec<String> =
        serde_json::from_slice(&body).map_err(HostListError::Body)?;
    Ok(clean(hosts))
}

fn clean(hosts: Vec<String>) -> Vec<String> {
    hosts
        .into_iter()
        .map(|host| host.trim().to_string())
        .filter(|host| !host.is_empty())
        .collect()
}
