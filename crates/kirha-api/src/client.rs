use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::types::{CreatePlanRequest, RunPlanRequest, SearchRequest};

/// Production endpoint of the Kirha API.
pub const DEFAULT_BASE_URL: &str = "https://api.kirha.ai";

const SEARCH_PATH: &str = "/chat/v1/search";
const CREATE_PLAN_PATH: &str = "/chat/v1/search/plan";
const RUN_PLAN_PATH: &str = "/chat/v1/search/plan/run";

#[derive(Debug, Clone)]
pub struct KirhaClientOptions {
    pub base_url: Url,
    pub timeout: Duration,
}

impl KirhaClientOptions {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Error)]
pub enum KirhaApiError {
    #[error("invalid endpoint url: {0}")]
    Endpoint(#[from] url::ParseError),
    #[error("kirha api returned HTTP status {status}")]
    Status { status: StatusCode, body: String },
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("invalid response from api: {0}")]
    Decode(#[source] serde_json::Error),
}

/// HTTP client for the Kirha search API.
///
/// Responses are passed through as raw JSON: the gateway serializes them
/// verbatim into tool results and never interprets their shape.
#[derive(Clone)]
pub struct KirhaClient {
    http: reqwest::Client,
    base_url: Url,
}

impl KirhaClient {
    pub fn new(opts: KirhaClientOptions) -> Result<Self, KirhaApiError> {
        let http = reqwest::Client::builder()
            .timeout(opts.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            http,
            base_url: opts.base_url,
        })
    }

    pub async fn search(
        &self,
        api_key: &str,
        req: &SearchRequest,
    ) -> Result<Value, KirhaApiError> {
        self.post_json(SEARCH_PATH, api_key, req).await
    }

    pub async fn create_plan(
        &self,
        api_key: &str,
        req: &CreatePlanRequest,
    ) -> Result<Value, KirhaApiError> {
        self.post_json(CREATE_PLAN_PATH, api_key, req).await
    }

    pub async fn run_plan(
        &self,
        api_key: &str,
        req: &RunPlanRequest,
    ) -> Result<Value, KirhaApiError> {
        self.post_json(RUN_PLAN_PATH, api_key, req).await
    }

    async fn post_json<B: Serialize>(
        &self,
        path: &str,
        api_key: &str,
        body: &B,
    ) -> Result<Value, KirhaApiError> {
        let endpoint = self.base_url.join(path)?;

        let resp = self
            .http
            .post(endpoint)
            .bearer_auth(api_key)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        debug!(%status, path, "kirha api response");

        if !status.is_success() {
            return Err(KirhaApiError::Status { status, body: text });
        }

        serde_json::from_str(&text).map_err(KirhaApiError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SummarizationOptions;

    fn client_for(server: &mockito::ServerGuard) -> KirhaClient {
        let base = Url::parse(&server.url()).expect("mock server url");
        KirhaClient::new(KirhaClientOptions::new(base)).expect("build client")
    }

    #[tokio::test]
    async fn search_posts_bearer_credential_and_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/v1/search")
            .match_header("authorization", "Bearer test-key")
            .match_body(mockito::Matcher::Json(serde_json::json!({
                "query": "BTC price",
                "vertical_id": "crypto",
            })))
            .with_status(200)
            .with_body(r#"{"answer":"..."}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let out = client
            .search(
                "test-key",
                &SearchRequest {
                    query: "BTC price".to_string(),
                    vertical_id: "crypto".to_string(),
                    summarization: None,
                },
            )
            .await
            .expect("search");

        mock.assert_async().await;
        assert_eq!(out.get("answer").and_then(|a| a.as_str()), Some("..."));
    }

    #[tokio::test]
    async fn non_2xx_surfaces_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/v1/search")
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client
            .search(
                "test-key",
                &SearchRequest {
                    query: "q".to_string(),
                    vertical_id: "crypto".to_string(),
                    summarization: None,
                },
            )
            .await
            .expect_err("must fail");

        match err {
            KirhaApiError::Status { status, body } => {
                assert_eq!(status.as_u16(), 503);
                assert_eq!(body, "overloaded");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn run_plan_posts_plan_id_with_summarization() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/v1/search/plan/run")
            .match_body(mockito::Matcher::Json(serde_json::json!({
                "plan_id": "plan-7",
                "summarization": { "enable": true, "model": "kirha-flash" },
            })))
            .with_status(200)
            .with_body(r#"{"result":{}}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        client
            .run_plan(
                "k",
                &RunPlanRequest {
                    plan_id: "plan-7".to_string(),
                    summarization: SummarizationOptions::new("kirha-flash"),
                },
            )
            .await
            .expect("run plan");

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn malformed_upstream_json_is_a_decode_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/v1/search/plan")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client
            .create_plan(
                "k",
                &CreatePlanRequest {
                    query: "q".to_string(),
                    vertical_id: "crypto".to_string(),
                },
            )
            .await
            .expect_err("must fail");
        assert!(matches!(err, KirhaApiError::Decode(_)));
    }
}
