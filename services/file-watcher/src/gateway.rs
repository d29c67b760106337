use crate::config::{BodyEncoding, GatewayConfig};
use crate::payload::IngestJobRequest;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::Form;
use reqwest::StatusCode;
use tracing::{debug, info, instrument};

/// Outcome of a single job submission
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionResult {
    /// Gateway answered 201 Created
    Success { job_id: Option<String> },
    /// Gateway answered with any other status
    Rejected { status: u16, body: String },
    /// Request never produced a response
    TransportError(String),
}

impl SubmissionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, SubmissionResult::Success { .. })
    }
}

/// Submits ingest jobs. Implementations issue exactly one request per call
/// and never retry internally.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobSubmitter: Send + Sync {
    async fn submit(&self, request: &IngestJobRequest) -> SubmissionResult;
}

/// HTTP client for the ingest gateway's `/job` endpoint
pub struct GatewayClient {
    http_client: reqwest::Client,
    job_url: String,
    body_encoding: BodyEncoding,
    basic_auth: Option<(String, Option<String>)>,
}

impl GatewayClient {
    /// Create a new gateway client
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("Failed to build HTTP client")?;

        let basic_auth = config
            .basic_auth_user
            .clone()
            .map(|user| (user, config.basic_auth_password.clone()));

        let job_url = config.job_url();

        info!(
            job_url = %job_url,
            encoding = ?config.body_encoding,
            basic_auth = basic_auth.is_some(),
            "Gateway client initialized"
        );

        Ok(Self {
            http_client,
            job_url,
            body_encoding: config.body_encoding,
            basic_auth,
        })
    }

    pub fn job_url(&self) -> &str {
        &self.job_url
    }
}

#[async_trait]
impl JobSubmitter for GatewayClient {
    #[instrument(skip(self, request), fields(file_name = %request.file_name()))]
    async fn submit(&self, request: &IngestJobRequest) -> SubmissionResult {
        let document = match request.to_json() {
            Ok(document) => document,
            Err(e) => return SubmissionResult::TransportError(format!("Failed to encode job: {}", e)),
        };

        let mut builder = self.http_client.post(&self.job_url);

        builder = match self.body_encoding {
            BodyEncoding::Multipart => builder.multipart(Form::new().text("body", document)),
            BodyEncoding::Json => builder
                .header(CONTENT_TYPE, "application/json")
                .body(document),
        };

        if let Some((ref user, ref password)) = self.basic_auth {
            builder = builder.basic_auth(user, password.as_ref());
        }

        debug!(job_url = %self.job_url, "Submitting ingest job");

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => return SubmissionResult::TransportError(e.to_string()),
        };

        let status = response.status();
        // An unreadable body does not change the outcome
        let body = response.text().await.unwrap_or_default();

        if status == StatusCode::CREATED {
            SubmissionResult::Success {
                job_id: extract_job_id(&body),
            }
        } else {
            SubmissionResult::Rejected {
                status: status.as_u16(),
                body,
            }
        }
    }
}

/// Pull the job id out of a gateway response, if there is one
fn extract_job_id(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/data/jobId")
        .or_else(|| value.get("jobId"))
        .and_then(|id| id.as_str())
        .map(String::from)
}
