//! Blocking client for the remote invoice service.
//!
//! The service renders and mails invoices on the server side. Every call is
//! a single request; nothing is retried.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{InvoiceError, Result};
use crate::model::InvoiceRequest;

/// Where the service lives and how to authenticate against it.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Base URL without a trailing slash, e.g. `http://localhost:8000`.
    pub base_url: String,
    /// Bearer token sent on every authenticated call.
    pub token: String,
    pub timeout: Duration,
}

impl ServiceConfig {
    pub const DEFAULT_URL: &'static str = "http://localhost:8000";

    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Response of `/generate-proforma-invoice`. Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProformaReceipt {
    pub invoice_number: String,
    pub pdf_filename: String,
    pub pdf_size_kb: f64,
    /// Display amount; the service may send it as a string or a number.
    #[serde(deserialize_with = "string_or_number")]
    pub total_aed: String,
    #[serde(default)]
    pub emails_sent_to: Vec<String>,
}

fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    match Value::deserialize(d)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

pub struct InvoiceServiceClient {
    http: Client,
    config: ServiceConfig,
}

impl InvoiceServiceClient {
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn send(&self, request: RequestBuilder, path: &str) -> Result<Response> {
        log::debug!("Calling {}", self.url(path));
        let response = request.send().map_err(|e| {
            log::error!("Request to {} failed: {}", self.url(path), e);
            InvoiceError::from(e)
        })?;
        check_status(response)
    }

    /// `GET /health`: liveness payload.
    pub fn health(&self) -> Result<Value> {
        let path = "/health";
        let resp = self.send(self.http.get(self.url(path)), path)?;
        Ok(resp.json()?)
    }

    /// `POST /test-token`: confirm the bearer token is accepted.
    pub fn test_token(&self) -> Result<Value> {
        let path = "/test-token";
        let req = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.config.token);
        Ok(self.send(req, path)?.json()?)
    }

    /// `POST /generate-invoice`: render and mail a tax invoice.
    pub fn generate_invoice(&self, request: &InvoiceRequest) -> Result<Value> {
        let path = "/generate-invoice";
        let req = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.config.token)
            .json(request);
        Ok(self.send(req, path)?.json()?)
    }

    /// `POST /generate-proforma-invoice`.
    pub fn generate_proforma_invoice(&self, request: &InvoiceRequest) -> Result<ProformaReceipt> {
        let path = "/generate-proforma-invoice";
        let req = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.config.token)
            .json(request);
        Ok(self.send(req, path)?.json()?)
    }
}

fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    let detail = error_detail(&body);
    log::warn!("Service answered {status}: {detail}");
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => InvoiceError::Auth(detail),
        _ => InvoiceError::Service {
            status: status.as_u16(),
            detail,
        },
    })
}

/// The `detail` field of a JSON error body, else the body itself.
fn error_detail(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| match v.get("detail") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
            None => None,
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_is_extracted_from_json() {
        assert_eq!(error_detail(r#"{"detail":"Invalid token"}"#), "Invalid token");
        assert_eq!(error_detail("Internal Server Error\n"), "Internal Server Error");
        assert_eq!(error_detail(r#"{"detail":[{"loc":"items"}]}"#), r#"[{"loc":"items"}]"#);
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let cfg = ServiceConfig::new("http://localhost:8000/", "t");
        assert_eq!(cfg.base_url, "http://localhost:8000");
    }

    #[test]
    fn receipt_accepts_numeric_total() {
        let r: ProformaReceipt = serde_json::from_str(
            r#"{"invoice_number":"P-1","pdf_filename":"P-1.pdf","pdf_size_kb":12.5,
                "total_aed":12600.0,"emails_sent_to":["a@example.com"],"extra":true}"#,
        )
        .unwrap();
        assert_eq!(r.total_aed, "12600.0");
        assert_eq!(r.emails_sent_to.len(), 1);
    }
}
