//! HTTP client for the Veristat pipeline service

use std::time::Duration;

use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

use crate::error::{CliError, Result};

/// Long enough for the service to run an emulator pass to completion
/// before responding; run creation blocks server-side for the full
/// requested duration.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(330);

#[derive(Clone)]
pub struct VeristatClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
pub struct RunRequest {
    pub profile: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_sec: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hz: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RunCreated {
    pub run_id: String,
    pub created_at: String,
    pub profile: String,
    pub samples: usize,
    pub parse_failures: u64,
}

#[derive(Debug, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub created_at: String,
    pub meta: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct Report {
    pub run_id: String,
    pub kpis: serde_json::Value,
    pub bottlenecks: Vec<String>,
    pub ml: MlVerdict,
}

#[derive(Debug, Deserialize)]
pub struct MlVerdict {
    pub anomaly_score: f64,
    pub is_anomalous: u8,
}

impl VeristatClient {
    pub fn new(base_url: String) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, base_url })
    }

    pub async fn health(&self) -> Result<serde_json::Value> {
        let response = self
            .client
            .get(format!("{}/v1/health", self.base_url))
            .send()
            .await?;
        self.decode(response).await
    }

    pub async fn create_run(&self, request: &RunRequest) -> Result<RunCreated> {
        let response = self
            .client
            .post(format!("{}/v1/runs", self.base_url))
            .json(request)
            .send()
            .await?;
        self.decode(response).await
    }

    pub async fn list_runs(&self) -> Result<Vec<RunSummary>> {
        let response = self
            .client
            .get(format!("{}/v1/runs", self.base_url))
            .send()
            .await?;
        self.decode(response).await
    }

    pub async fn report(&self, run_id: &str) -> Result<Report> {
        let response = self
            .client
            .get(format!("{}/v1/runs/{}/report", self.base_url, run_id))
            .send()
            .await?;
        self.decode(response).await
    }

    /// Decode a 2xx body, or surface the service's `{ "error": ... }`
    /// payload with its status code.
    async fn decode<T: serde::de::DeserializeOwned>(&self, response: Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let message = match response.json::<serde_json::Value>().await {
            Ok(body) => body["error"]
                .as_str()
                .unwrap_or("unknown service error")
                .to_string(),
            Err(_) => status
                .canonical_reason()
                .unwrap_or("unknown service error")
                .to_string(),
        };

        Err(CliError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

/// Profiles the service understands, in batch execution order
pub const PROFILES: [&str; 3] = ["baseline", "cache_stress", "timing_bug"];
