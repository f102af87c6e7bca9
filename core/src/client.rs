use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode, Url};
use tracing::{debug, warn};

use crate::config::BedrockSettings;
use crate::errors::{KbChatError, KbChatResult};
use crate::sigv4::{self, SignableRequest, SigningParams};
use crate::types::*;

/// Service name used in the SigV4 credential scope
const SIGNING_SERVICE: &str = "bedrock";
const OPERATION_PATH: &str = "retrieveAndGenerate";

/// Anything that can answer a question against a knowledge base
#[async_trait]
pub trait AnswerService: Send + Sync {
    /// Returns the generated answer text
    async fn generate(&self, request: &GenerationRequest) -> KbChatResult<String>;
}

/// Client for the Bedrock agent runtime `RetrieveAndGenerate` operation
#[derive(Debug, Clone)]
pub struct BedrockKbClient {
    client: Client,
    settings: BedrockSettings,
    endpoint: Url,
}

impl BedrockKbClient {
    /// Create a new client from validated settings
    pub fn new(settings: BedrockSettings) -> KbChatResult<Self> {
        let endpoint = operation_url(&settings.endpoint_url)?;
        let client = Client::new();

        Ok(Self {
            client,
            settings,
            endpoint,
        })
    }

    pub fn settings(&self) -> &BedrockSettings {
        &self.settings
    }

    /// Sends one signed `RetrieveAndGenerate` call and decodes the response
    pub async fn retrieve_and_generate(
        &self,
        request: &GenerationRequest,
    ) -> KbChatResult<RetrieveAndGenerateResponse> {
        let body = serde_json::to_vec(&RetrieveAndGenerateRequest::from(request))?;

        let signed_headers = sigv4::sign(
            &SignableRequest {
                method: "POST",
                url: &self.endpoint,
                headers: &[("content-type", "application/json")],
                payload: &body,
            },
            &SigningParams {
                credentials: &self.settings.credentials,
                region: &self.settings.region,
                service: SIGNING_SERVICE,
                timestamp: Utc::now(),
            },
        )?;

        let mut builder = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json");
        for (name, value) in signed_headers {
            builder = builder.header(name, value);
        }

        debug!(
            endpoint = %self.endpoint,
            knowledge_base_id = %request.knowledge_base_identifier,
            question_len = request.question.len(),
            "Sending RetrieveAndGenerate request"
        );

        let response = builder
            .body(body)
            .send()
            .await
            .map_err(|e| KbChatError::TransportError(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_type = response
                .headers()
                .get("x-amzn-errortype")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let error_body = response.text().await.map_err(|e| {
                KbChatError::TransportError(format!("Failed to read error response: {}", e))
            })?;
            let error = service_error(status, error_type.as_deref(), &error_body);
            warn!(status = status.as_u16(), error = %error, "Knowledge base request failed");
            return Err(error);
        }

        let raw = response.text().await.map_err(|e| {
            KbChatError::TransportError(format!("Failed to read response: {}", e))
        })?;
        let parsed: RetrieveAndGenerateResponse = serde_json::from_str(&raw)
            .map_err(|e| KbChatError::ParsingError(format!("Failed to parse response: {}", e)))?;

        debug!(
            session_id = parsed.session_id.as_deref().unwrap_or("-"),
            citations = parsed.citations.len(),
            answer_len = parsed.output.text.len(),
            "Received RetrieveAndGenerate response"
        );

        Ok(parsed)
    }
}

#[async_trait]
impl AnswerService for BedrockKbClient {
    async fn generate(&self, request: &GenerationRequest) -> KbChatResult<String> {
        let response = self.retrieve_and_generate(request).await?;
        Ok(response.output.text)
    }
}

fn operation_url(endpoint_url: &str) -> KbChatResult<Url> {
    let raw = format!("{}/{}", endpoint_url.trim_end_matches('/'), OPERATION_PATH);
    Url::parse(&raw).map_err(|e| {
        KbChatError::ConfigError(format!("Invalid endpoint URL '{}': {}", endpoint_url, e))
    })
}

/// Builds a service error from a failed response.
///
/// AWS puts the error code in `x-amzn-ErrorType` (possibly followed by
/// `:<uri>`) or in the body's `__type` (possibly prefixed by `<namespace>#`).
fn service_error(status: StatusCode, error_type: Option<&str>, body: &str) -> KbChatError {
    let parsed: ServiceErrorBody = serde_json::from_str(body).unwrap_or_default();

    let code = error_type
        .map(|t| t.split(':').next().unwrap_or(t).to_string())
        .or_else(|| {
            parsed
                .error_type
                .as_deref()
                .map(|t| t.rsplit('#').next().unwrap_or(t).to_string())
        })
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

    let message = parsed
        .message
        .filter(|m| !m.trim().is_empty())
        .or_else(|| Some(body.trim().to_string()).filter(|b| !b.is_empty()))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });

    KbChatError::ServiceError { code, message }
}
