//! Blocking HTTP client bound to one dashboard server.

#![allow(missing_docs)]

use reqwest::Url;
use reqwest::blocking::Client;
use serde_json::Value;

use crate::core::config::ServerConfig;
use crate::core::errors::{Result, TtvError};

use super::listing::{
    BrokerRow, GridRow, GroupRow, MemberRow, OffsetRow, PartitionRow, TopicRow, decode_page,
};

const USER_AGENT: &str = concat!("ttv/", env!("CARGO_PKG_VERSION"));

/// Shared connection pool plus the server base URL.
#[derive(Debug, Clone)]
pub struct DashboardClient {
    http: Client,
    base: Url,
}

impl DashboardClient {
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url).map_err(|err| TtvError::InvalidConfig {
            details: format!("server.base_url {:?}: {err}", config.base_url),
        })?;
        if base.cannot_be_a_base() {
            return Err(TtvError::InvalidConfig {
                details: format!("server.base_url {:?} cannot carry a path", config.base_url),
            });
        }
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self { http, base })
    }

    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base
    }

    /// Base URL extended by percent-encoded path segments.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| TtvError::InvalidConfig {
                details: format!("server.base_url {} cannot carry a path", self.base),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET `url` and decode the body as JSON.
    pub fn get_json(&self, url: Url) -> Result<Value> {
        let response = self.http.get(url).send()?.error_for_status()?;
        Ok(response.json::<Value>()?)
    }

    /// GET one of the `{"data": [...]}` grids under `segments`.
    pub fn grid<T: GridRow>(&self, segments: &[&str]) -> Result<Vec<T>> {
        let url = self.endpoint(segments)?;
        let endpoint = url.to_string();
        let body = self.get_json(url)?;
        decode_page(&body).ok_or(TtvError::MalformedPayload {
            endpoint,
            details: "expected an object with a \"data\" array".to_string(),
        })
    }

    /// `GET /api/clusters/{cluster}/topics`
    pub fn topics(&self, cluster: &str) -> Result<Vec<TopicRow>> {
        self.grid(&["api", "clusters", cluster, "topics"])
    }

    /// `GET /api/clusters/{cluster}/brokers`
    pub fn brokers(&self, cluster: &str) -> Result<Vec<BrokerRow>> {
        self.grid(&["api", "clusters", cluster, "brokers"])
    }

    /// Consumer groups of a cluster, or only those with offsets on `topic`.
    pub fn groups(&self, cluster: &str, topic: Option<&str>) -> Result<Vec<GroupRow>> {
        match topic {
            Some(topic) => self.grid(&["api", "clusters", cluster, "topics", topic, "groups"]),
            None => self.grid(&["api", "clusters", cluster, "groups"]),
        }
    }

    /// `GET /api/clusters/{cluster}/groups/{group}/members`
    pub fn group_members(&self, cluster: &str, group: &str) -> Result<Vec<MemberRow>> {
        self.grid(&["api", "clusters", cluster, "groups", group, "members"])
    }

    /// `GET /api/clusters/{cluster}/groups/{group}/offsets`
    pub fn group_offsets(&self, cluster: &str, group: &str) -> Result<Vec<OffsetRow>> {
        self.grid(&["api", "clusters", cluster, "groups", group, "offsets"])
    }

    /// `GET /api/clusters/{cluster}/topics/{topic}/topology`
    pub fn topology(&self, cluster: &str, topic: &str) -> Result<Vec<PartitionRow>> {
        self.grid(&["api", "clusters", cluster, "topics", topic, "topology"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(base_url: &str) -> ServerConfig {
        ServerConfig {
            base_url: base_url.to_string(),
            ..ServerConfig::default()
        }
    }

    #[test]
    fn endpoint_appends_segments() {
        let client = DashboardClient::new(&server("http://localhost:8080")).unwrap();
        let url = client.endpoint(&["api", "tailer", "prod", "orders", "42"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/tailer/prod/orders/42");
    }

    #[test]
    fn endpoint_keeps_base_path_prefix() {
        let client = DashboardClient::new(&server("https://ops.example.com/kafka/")).unwrap();
        let url = client.endpoint(&["api", "clusters", "c1", "topics"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://ops.example.com/kafka/api/clusters/c1/topics"
        );
    }

    #[test]
    fn endpoint_escapes_topic_names() {
        let client = DashboardClient::new(&server("http://localhost:8080")).unwrap();
        let url = client.endpoint(&["api", "tailer", "c", "a/b c", "1"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/tailer/c/a%2Fb%20c/1");
    }

    #[test]
    fn rejects_unparseable_base_url() {
        let err = DashboardClient::new(&server("not a url")).unwrap_err();
        assert_eq!(err.code(), "TTV-1001");
    }

    #[test]
    fn unreachable_server_is_transport_error() {
        // Port 9 (discard) on localhost is closed in test environments.
        let mut config = server("http://127.0.0.1:9");
        config.request_timeout_ms = 2_000;
        let client = DashboardClient::new(&config).unwrap();
        let err = client.topics("c1").unwrap_err();
        assert!(matches!(err, TtvError::Transport { .. }), "got {err}");
        assert!(err.is_retryable());
    }
}
