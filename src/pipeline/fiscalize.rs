//! Fiscalization client: submit a payload, get back the QR URL.
//!
//! One POST per document, no retry and no backoff. The response body is
//! parsed as a [`FiscalizationResult`] whatever the HTTP status, because the
//! service reports rejections in the body.

use crate::config::PipelineConfig;
use crate::error::{DocumentError, FiscalError};
use crate::receipt::{FiscalizationResult, ReceiptPayload};
use futures::future::BoxFuture;
use std::time::Duration;
use tracing::{debug, info};

/// Submits a payload and resolves to the QR URL on success.
///
/// Object-safe so a pre-built client can be injected through
/// [`crate::config::PipelineConfig::fiscalizer`].
pub trait Fiscalizer: Send + Sync {
    fn submit<'a>(&'a self, payload: &'a ReceiptPayload) -> BoxFuture<'a, Result<String, DocumentError>>;
}

/// [`Fiscalizer`] posting JSON over HTTP.
#[derive(Debug, Clone)]
pub struct HttpFiscalizer {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpFiscalizer {
    pub fn new(endpoint: impl Into<String>, timeout_secs: Option<u64>) -> Result<Self, FiscalError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| FiscalError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self, FiscalError> {
        Self::new(config.endpoint.clone(), config.request_timeout_secs)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(&self, payload: &ReceiptPayload) -> Result<String, DocumentError> {
        debug!("POST {} ({:?})", self.endpoint, payload.receipt_type);

        let response = self
            .client
            .post(&self.endpoint)
            .json(payload)
            .send()
            .await
            .map_err(|e| DocumentError::Transport {
                detail: if e.is_timeout() {
                    format!("request to {} timed out", self.endpoint)
                } else {
                    e.to_string()
                },
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| DocumentError::Transport {
            detail: e.to_string(),
        })?;

        let result: FiscalizationResult =
            serde_json::from_str(&body).map_err(|e| DocumentError::Transport {
                detail: format!("HTTP {status}: unreadable response ({e})"),
            })?;

        let qr_url = interpret_result(result)?;
        info!("Fiscalized {:?}, QR {}", payload.receipt_type, qr_url);
        Ok(qr_url)
    }
}

impl Fiscalizer for HttpFiscalizer {
    fn submit<'a>(&'a self, payload: &'a ReceiptPayload) -> BoxFuture<'a, Result<String, DocumentError>> {
        Box::pin(self.post(payload))
    }
}

/// Turn the service's answer into the QR URL or a labelled error.
pub fn interpret_result(result: FiscalizationResult) -> Result<String, DocumentError> {
    if !result.success {
        return Err(DocumentError::Rejected {
            message: result.error.unwrap_or_else(|| "Unknown error".to_string()),
        });
    }
    result.qr_url.ok_or_else(|| DocumentError::Rejected {
        message: "response missing qr_url".to_string(),
    })
}
