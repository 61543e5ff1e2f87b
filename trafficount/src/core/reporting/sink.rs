//! Report delivery
//!
//! The scheduler hands finished reports to a [`ReportSink`]. The production
//! sink POSTs them to the ingestion service over HTTP.

use std::time::Duration;

use async_trait::async_trait;

use crate::core::{CoreError, CoreResult, Report};

/// Destination for interval reports
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Returns the sink name (used in logs)
    fn name(&self) -> &str;

    /// Delivers one report. Any error means the report was not accepted.
    async fn deliver(&self, report: &Report) -> CoreResult<()>;
}

// =============================================================================
// HTTP Sink
// =============================================================================

/// Posts reports as JSON to the ingestion endpoint
pub struct HttpReportSink {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpReportSink {
    /// Default request timeout in seconds
    pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

    pub fn new(endpoint: &str, timeout: Duration) -> CoreResult<Self> {
        if endpoint.trim().is_empty() {
            return Err(CoreError::Validation(
                "Report endpoint cannot be empty".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.to_string(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ReportSink for HttpReportSink {
    fn name(&self) -> &str {
        "http"
    }

    async fn deliver(&self, report: &Report) -> CoreResult<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(report)
            .send()
            .await
            .map_err(|e| CoreError::Delivery(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::Delivery(format!(
                "Ingestion endpoint returned {}: {}",
                status, body
            )));
        }

        Ok(())
    }
}

// =============================================================================
// Test Sink
// =============================================================================


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_endpoint_rejected() {
        assert!(HttpReportSink::new("  ", Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_delivery_error() {
        // Port 9 (discard) on loopback is closed on test hosts.
        let sink =
            HttpReportSink::new("http://127.0.0.1:9/api/report", Duration::from_secs(2)).unwrap();
        let report = Report {
            timestamp: "14:00".to_string(),
            count: 1,
            location: "Test".to_string(),
        };

        let err = sink.deliver(&report).await.unwrap_err();
        assert!(matches!(err, CoreError::Delivery(_)));
    }
}
