/// Single-request client for the performance service
use crate::request::{PerformanceRequest, PerformanceResult};
use crate::ComputeError;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Anything that can turn a [`PerformanceRequest`] into a result.
#[async_trait]
pub trait PerformanceCalculator: Send + Sync {
    async fn try_calculate(
        &self,
        request: &PerformanceRequest,
    ) -> Result<PerformanceResult, ComputeError>;

    /// Like [`try_calculate`](Self::try_calculate), but any failure becomes
    /// [`PerformanceResult::zero`].
    async fn calculate(&self, request: &PerformanceRequest) -> PerformanceResult {
        match self.try_calculate(request).await {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    "Performance calculation for beatmap {} failed, using zero: {}",
                    request.beatmap_id, e
                );
                PerformanceResult::zero()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputeConfig {
    /// Service root, e.g. `http://127.0.0.1:8665`
    pub base_url: String,
    /// Deadline for one request including the response body
    pub timeout: Duration,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8665".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Deserialize)]
struct CalculateResponse {
    data: PerformanceResult,
}

#[derive(Debug, Clone)]
pub struct ComputeClient {
    http: reqwest::Client,
    endpoint: String,
}

impl ComputeClient {
    pub fn new(config: ComputeConfig) -> Result<Self, ComputeError> {
        let base = config.base_url.trim_end_matches('/');
        if base.is_empty() {
            return Err(ComputeError::Config("empty base url".to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ComputeError::Config(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: format!("{base}/calculate"),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl PerformanceCalculator for ComputeClient {
    /// Only a 200 response with a decodable body counts as success.
    async fn try_calculate(
        &self,
        request: &PerformanceRequest,
    ) -> Result<PerformanceResult, ComputeError> {
        let response = self
            .http
            .get(&self.endpoint)
            .query(&request.for_wire())
            .send()
            .await
            .map_err(ComputeError::Request)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ComputeError::Status(status.as_u16()));
        }

        let body: CalculateResponse = response.json().await.map_err(ComputeError::Decode)?;
        debug!(
            "Beatmap {} mode {}: {:.2} stars, {:.2}pp",
            request.beatmap_id, request.mode, body.data.stars, body.data.pp
        );
        Ok(body.data)
    }
}
