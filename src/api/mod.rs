//! HTTP client for the course list endpoint

use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

use crate::grid::protocol::{DrawRequest, Page};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned HTTP {0}")]
    Status(u16),
    #[error("could not read response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("server error: {0}")]
    Server(String),
}

/// Client bound to one API host
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    auth_token: Option<String>,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(
        base_url: &str,
        auth_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("coursegrid/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token: auth_token.filter(|t| !t.is_empty()),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL of a site path such as `/courses/7/`
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Fetch the rows for one draw
    pub async fn fetch_page<R: DeserializeOwned>(
        &self,
        request: &DrawRequest,
    ) -> Result<Page<R>, ApiError> {
        let url = self.url(&request.path);
        tracing::debug!("GET {} (draw {})", url, request.draw);

        let mut builder = self
            .http
            .get(&url)
            .query(&request.params)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(token) = &self.auth_token {
            builder = builder.header(reqwest::header::AUTHORIZATION, format!("JWT {}", token));
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!("{} returned {}", url, status);
            return Err(ApiError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let page: Page<R> = serde_json::from_slice(&body)?;
        if let Some(error) = page.error {
            return Err(ApiError::Server(error));
        }

        tracing::debug!(
            "Draw {}: {} rows ({} of {})",
            page.draw,
            page.data.len(),
            page.records_filtered,
            page.records_total
        );
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::courses::{Course, COURSES_ENDPOINT};
    use serde_json::json;
    use wiremock::{
        matchers::{header, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    fn request(draw: u64) -> DrawRequest {
        DrawRequest {
            draw,
            path: COURSES_ENDPOINT.to_string(),
            params: vec![
                ("draw".to_string(), draw.to_string()),
                ("start".to_string(), "0".to_string()),
                ("length".to_string(), "10".to_string()),
                ("search[value]".to_string(), "intro".to_string()),
            ],
        }
    }

    fn client(server: &MockServer, token: Option<&str>) -> ApiClient {
        ApiClient::new(
            &format!("{}/", server.uri()),
            token.map(str::to_string),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_page_sends_draw_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/courses/"))
            .and(query_param("format", "datatables"))
            .and(query_param("draw", "1"))
            .and(query_param("search[value]", "intro"))
            .and(header("authorization", "JWT secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "draw": 1,
                "recordsTotal": 2,
                "recordsFiltered": 1,
                "data": [{
                    "id": "course-v1:edX+T101+2021",
                    "name": "Intro to Testing",
                    "type": "verified",
                    "last_edited": "2021-03-05T14:30:00Z"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let page: Page<Course> = client(&server, Some("secret"))
            .fetch_page(&request(1))
            .await
            .unwrap();

        assert_eq!(page.draw, 1);
        assert_eq!(page.records_total, 2);
        assert_eq!(page.records_filtered, 1);
        assert_eq!(page.data[0].name, "Intro to Testing");
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let err = client(&server, None)
            .fetch_page::<Course>(&request(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Status(403)));
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
            .mount(&server)
            .await;

        let err = client(&server, None)
            .fetch_page::<Course>(&request(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[tokio::test]
    async fn test_server_reported_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "draw": 1,
                "recordsTotal": 0,
                "recordsFiltered": 0,
                "data": [],
                "error": "Unknown ordering field"
            })))
            .mount(&server)
            .await;

        let err = client(&server, None)
            .fetch_page::<Course>(&request(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Server(ref msg) if msg == "Unknown ordering field"));
    }

    #[test]
    fn test_url_joining() {
        let client = ApiClient::new("https://ecommerce.example.com/", None, Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "https://ecommerce.example.com");
        assert_eq!(
            client.url("/courses/7/"),
            "https://ecommerce.example.com/courses/7/"
        );
        assert_eq!(client.url("health/"), "https://ecommerce.example.com/health/");
    }
}
