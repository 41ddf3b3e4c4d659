//! API client for communicating with the cost optimizer server

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use url::Url;

/// API client for the cost optimizer server
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).context("Invalid path")
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = send(self.client.get(self.url(path)?)).await?;
        response.json().await.context("Failed to parse response")
    }

    /// Make a GET request for a status report
    ///
    /// Health endpoints answer 503 with the full report when a component is
    /// down, so any body that parses as `T` is returned whatever the status.
    pub async fn get_report<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(self.url(path)?)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        let body = response.text().await.context("Failed to read response")?;

        match serde_json::from_str(&body) {
            Ok(report) => Ok(report),
            Err(_) if !status.is_success() => Err(api_error(status, body)),
            Err(e) => Err(e).context("Failed to parse response"),
        }
    }

    /// Make a GET request and return the raw body, e.g. a CSV export
    pub async fn get_text(&self, path: &str) -> Result<String> {
        let response = send(self.client.get(self.url(path)?)).await?;
        response.text().await.context("Failed to read response")
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let response = send(self.client.post(self.url(path)?).json(body)).await?;
        response.json().await.context("Failed to parse response")
    }

    /// Make a POST request without a body
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = send(self.client.post(self.url(path)?)).await?;
        response.json().await.context("Failed to parse response")
    }
}

async fn send(request: RequestBuilder) -> Result<Response> {
    let response = request.send().await.context("Failed to send request")?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(api_error(status, body));
    }

    Ok(response)
}

fn api_error(status: StatusCode, body: String) -> anyhow::Error {
    let message = match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(err) if err.retryable => format!("{} (retryable)", err.detail),
        Ok(err) => err.detail,
        Err(_) => body,
    };
    anyhow::anyhow!("API error ({}): {}", status, message)
}

// API response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub id: i64,
    pub name: String,
    pub utilization: f64,
    pub status: String,
    pub cost: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: u64,
    pub resource_id: i64,
    pub action: String,
    pub old_utilization: f64,
    pub old_status: String,
    pub new_utilization: f64,
    pub new_status: String,
    pub timestamp: String,
    pub actor: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionResponse {
    pub updated: Instance,
    pub audit: AuditEntry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    /// Numeric for instances, provider ids for usage records
    pub resource_id: serde_json::Value,
    pub name: String,
    pub recommendation: String,
    pub saving: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUsage {
    pub cloud_provider: String,
    pub service_name: String,
    pub resource_id: String,
    pub usage_amount: f64,
    pub cost: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    pub id: u64,
    pub cloud_provider: String,
    pub service_name: String,
    pub resource_id: String,
    pub usage_amount: f64,
    pub cost: f64,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReseedResponse {
    pub resources: Vec<Instance>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub components: std::collections::HashMap<String, ComponentReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentReport {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
    #[serde(default)]
    pub retryable: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_parses_instances() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/instances")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[{"id":1,"name":"dev-server","utilization":3.0,"status":"running","cost":25.0}]"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let instances: Vec<Instance> = client.get("instances").await.unwrap();

        mock.assert_async().await;
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].name, "dev-server");
    }

    #[tokio::test]
    async fn test_error_detail_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/make_idle/99")
            .with_status(404)
            .with_body(r#"{"detail":"Resource 99 not found","kind":"not_found","retryable":false}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client
            .post_empty::<TransitionResponse>("make_idle/99")
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("404"));
        assert!(message.contains("Resource 99 not found"));
    }

    #[tokio::test]
    async fn test_get_text_returns_csv_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/export/recommendations")
            .with_status(200)
            .with_header("content-type", "text/csv")
            .with_body("instance_id,name,recommendation,saving\n")
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let body = client.get_text("export/recommendations").await.unwrap();

        assert!(body.starts_with("instance_id,name"));
    }

    #[tokio::test]
    async fn test_unhealthy_report_is_returned_not_raised() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/healthz")
            .with_status(503)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"status":"unhealthy","components":{"store":{"status":"unhealthy","message":"disk full","last_check_timestamp":0}}}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let report: HealthReport = client.get_report("healthz").await.unwrap();

        assert_eq!(report.status, "unhealthy");
        assert_eq!(report.components["store"].message.as_deref(), Some("disk full"));
    }

    #[tokio::test]
    async fn test_report_with_unparseable_error_body_still_fails() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/healthz")
            .with_status(502)
            .with_body("Bad Gateway")
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client.get_report::<HealthReport>("healthz").await.unwrap_err();

        assert!(err.to_string().contains("502"));
    }

    #[test]
    fn test_invalid_url_rejected() {
        assert!(ApiClient::new("not a url").is_err());
    }
}
