use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sftrace_tooling::{ApiError, QueryResult, Record, SaveResult, Select, Surface, ToolingApi};
use ureq::ErrorKind;

use crate::config::OrgProfile;

/// Error entry in a REST API failure body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteError {
    #[serde(default)]
    error_code: String,
    #[serde(default)]
    message: String,
}

/// `ToolingApi` over the org's REST endpoints.
///
/// ureq is blocking, so each call runs on tokio's blocking pool.
#[derive(Debug, Clone)]
pub struct RestClient {
    base_url: String,
    api_version: String,
    username: String,
    access_token: String,
    agent: ureq::Agent,
}

impl RestClient {
    pub fn from_profile(profile: &OrgProfile) -> Result<Self> {
        let access_token = profile.access_token()?;
        Ok(Self::new_with_timeouts(
            &profile.instance_url,
            &profile.api_version,
            &profile.username,
            access_token,
            Duration::from_secs(5),
            Duration::from_secs(30),
            Duration::from_secs(30),
        ))
    }

    pub fn new_with_timeouts(
        instance_url: &str,
        api_version: &str,
        username: &str,
        access_token: String,
        connect_timeout: Duration,
        read_timeout: Duration,
        write_timeout: Duration,
    ) -> Self {
        let base_url = if instance_url.starts_with("http://") || instance_url.starts_with("https://") {
            instance_url.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", instance_url.trim_end_matches('/'))
        };

        Self {
            base_url,
            api_version: api_version.trim_start_matches('v').to_string(),
            username: username.to_string(),
            access_token,
            agent: ureq::AgentBuilder::new()
                .timeout_connect(connect_timeout)
                .timeout_read(read_timeout)
                .timeout_write(write_timeout)
                .build(),
        }
    }

    fn surface_url(&self, surface: Surface) -> String {
        match surface {
            Surface::Data => format!("{}/services/data/v{}", self.base_url, self.api_version),
            Surface::Tooling => format!(
                "{}/services/data/v{}/tooling",
                self.base_url, self.api_version
            ),
        }
    }

    fn query_url(&self, surface: Surface) -> String {
        format!("{}/query", self.surface_url(surface))
    }

    fn sobject_url(&self, surface: Surface, sobject: &str, id: Option<&str>) -> String {
        let base = format!("{}/sobjects/{sobject}", self.surface_url(surface));
        match id {
            Some(id) => format!("{base}/{id}"),
            None => base,
        }
    }

    fn request(&self, method: &str, url: &str) -> ureq::Request {
        self.agent
            .request(method, url)
            .set("Authorization", &format!("Bearer {}", self.access_token))
            .set("Accept", "application/json")
    }

    async fn blocking<T, F>(&self, call: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(RestClient) -> Result<T, ApiError> + Send + 'static,
    {
        let client = self.clone();
        tokio::task::spawn_blocking(move || call(client))
            .await
            .map_err(|err| ApiError::transport(format!("request task failed: {err}")))?
    }

    fn query_blocking(&self, surface: Surface, soql: &str) -> Result<QueryResult, ApiError> {
        let url = self.query_url(surface);
        log::debug!("{} query: {soql}", surface.as_str());
        let response = self
            .request("GET", &url)
            .query("q", soql)
            .call()
            .map_err(map_http_error)?;
        let mut result: QueryResult = read_json(response)?;

        let mut next = result.next_records_url.take();
        while let Some(path) = next {
            let url = format!("{}{path}", self.base_url);
            let response = self.request("GET", &url).call().map_err(map_http_error)?;
            let mut page: QueryResult = read_json(response)?;
            result.records.append(&mut page.records);
            next = page.next_records_url.take();
        }
        Ok(result)
    }

    fn create_blocking(
        &self,
        surface: Surface,
        sobject: &str,
        fields: Record,
    ) -> Result<SaveResult, ApiError> {
        let url = self.sobject_url(surface, sobject, None);
        let response = self
            .request("POST", &url)
            .send_json(serde_json::Value::Object(fields))
            .map_err(map_http_error)?;
        let saved: SaveResult = read_json(response)?;
        if !saved.success || saved.id.is_empty() {
            return Err(ApiError::Api {
                code: "CREATE_FAILED".into(),
                message: format!("{sobject} was not created"),
            });
        }
        Ok(saved)
    }

    fn update_blocking(
        &self,
        surface: Surface,
        sobject: &str,
        id: &str,
        fields: Record,
    ) -> Result<(), ApiError> {
        let url = self.sobject_url(surface, sobject, Some(id));
        self.request("PATCH", &url)
            .send_json(serde_json::Value::Object(fields))
            .map_err(map_http_error)?;
        Ok(())
    }
}

#[async_trait]
impl ToolingApi for RestClient {
    fn username(&self) -> &str {
        &self.username
    }

    async fn query(&self, surface: Surface, query: &Select) -> Result<QueryResult, ApiError> {
        let soql = query.to_soql();
        self.blocking(move |client| client.query_blocking(surface, &soql))
            .await
    }

    async fn create(
        &self,
        surface: Surface,
        sobject: &str,
        fields: Record,
    ) -> Result<SaveResult, ApiError> {
        let sobject = sobject.to_string();
        self.blocking(move |client| client.create_blocking(surface, &sobject, fields))
            .await
    }

    async fn update(
        &self,
        surface: Surface,
        sobject: &str,
        id: &str,
        fields: Record,
    ) -> Result<(), ApiError> {
        let (sobject, id) = (sobject.to_string(), id.to_string());
        self.blocking(move |client| client.update_blocking(surface, &sobject, &id, fields))
            .await
    }
}

fn read_json<T: DeserializeOwned>(response: ureq::Response) -> Result<T, ApiError> {
    response
        .into_json()
        .map_err(|err| ApiError::decode(err.to_string()))
}

fn map_http_error(err: ureq::Error) -> ApiError {
    match err {
        ureq::Error::Status(status, response) => {
            let body = response.into_string().unwrap_or_default();
            remote_error(status, &body)
        }
        ureq::Error::Transport(transport) => {
            ApiError::transport(summarize_transport_error(&transport))
        }
    }
}

/// Map an error response body to the first reported API error, if any.
fn remote_error(status: u16, body: &str) -> ApiError {
    match serde_json::from_str::<Vec<RemoteError>>(body) {
        Ok(errors) => match errors.into_iter().next() {
            Some(first) if !first.error_code.is_empty() => ApiError::Api {
                code: first.error_code,
                message: first.message,
            },
            _ => ApiError::Status {
                status,
                message: String::new(),
            },
        },
        Err(_) => ApiError::Status {
            status,
            message: body.trim().to_string(),
        },
    }
}

fn summarize_transport_error(transport: &ureq::Transport) -> String {
    let category = match transport.kind() {
        ErrorKind::ConnectionFailed => "connection refused or org unavailable",
        ErrorKind::Dns => "dns lookup failed",
        ErrorKind::Io => "network i/o error",
        ErrorKind::InvalidUrl => "invalid instance url",
        ErrorKind::UnknownScheme => "unsupported instance url scheme",
        ErrorKind::TooManyRedirects => "too many redirects",
        ErrorKind::ProxyConnect => "proxy connect failed",
        ErrorKind::ProxyUnauthorized => "proxy authentication failed",
        ErrorKind::InvalidProxyUrl => "invalid proxy url",
        ErrorKind::BadStatus => "bad status line from server",
        ErrorKind::BadHeader => "bad header from server",
        ErrorKind::InsecureRequestHttpsOnly => "insecure request blocked by https-only setting",
        ErrorKind::HTTP => "http status error",
    };

    let mut details = Vec::new();
    if let Some(message) = transport.message() {
        let cleaned = clean_transport_text(message);
        if !cleaned.is_empty() {
            details.push(cleaned);
        }
    }
    if let Some(source) = std::error::Error::source(transport) {
        let cleaned = clean_transport_text(&source.to_string());
        if !cleaned.is_empty() && !details.contains(&cleaned) {
            details.push(cleaned);
        }
    }

    if details.is_empty() {
        category.to_string()
    } else {
        format!("{category}: {}", details.join(": "))
    }
}

fn clean_transport_text(input: &str) -> String {
    let mut text = input.trim();
    for prefix in [
        "Network Error:",
        "network error:",
        "Connection Failed:",
        "connection failed:",
        "Error encountered:",
    ] {
        while let Some(rest) = text.strip_prefix(prefix) {
            text = rest.trim_start();
        }
    }
    text.to_string()
}
