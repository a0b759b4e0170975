//! REST client for the historical telemetry API

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use telesync_core::{MetricId, SeriesPoint, Timestamp};
use tracing::{debug, instrument};

use crate::types::{CountResponse, ResampleResponse, ValuesResponse};
use crate::{AggregateRequest, HistoricalSource, HistoryConfig, HistoryError, Result};

const AUTH_HEADER: &str = "X-Auth-Token";

/// Historical source backed by the platform's REST API
#[derive(Clone)]
pub struct RestHistoricalSource {
    base_url: String,
    token: String,
    http_client: reqwest::Client,
}

impl RestHistoricalSource {
    /// Create a new client
    pub fn new(config: &HistoryConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| HistoryError::Configuration(e.to_string()))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            http_client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HistoryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| HistoryError::Parse(e.to_string()))
    }
}

#[async_trait]
impl HistoricalSource for RestHistoricalSource {
    #[instrument(skip(self, metric), fields(metric = %metric))]
    async fn count(&self, metric: &MetricId, start: Timestamp, end: Timestamp) -> Result<u64> {
        let url = self.url(&format!(
            "variables/{}/statistics/count/{}/{}",
            metric, start, end
        ));

        let response = self
            .http_client
            .get(url)
            .header(AUTH_HEADER, &self.token)
            .send()
            .await?;

        let body: CountResponse = Self::read_json(response).await?;
        debug!(count = body.count, "Counted stored points");
        Ok(body.count)
    }

    #[instrument(skip(self, metric), fields(metric = %metric))]
    async fn raw_points(
        &self,
        metric: &MetricId,
        start: Timestamp,
        end: Timestamp,
        page_size: u64,
    ) -> Result<Vec<SeriesPoint>> {
        let url = self.url(&format!("variables/{}/values", metric));

        let response = self
            .http_client
            .get(url)
            .header(AUTH_HEADER, &self.token)
            .query(&[
                ("start", start.to_string()),
                ("end", end.to_string()),
                ("page_size", page_size.to_string()),
            ])
            .send()
            .await?;

        let body: ValuesResponse = Self::read_json(response).await?;
        debug!(points = body.results.len(), "Fetched raw points");
        Ok(body.results)
    }

    #[instrument(skip(self, request), fields(period = %request.period))]
    async fn aggregate(&self, request: &AggregateRequest) -> Result<Vec<Vec<SeriesPoint>>> {
        let response = self
            .http_client
            .post(self.url("data/stats/resample/"))
            .header(AUTH_HEADER, &self.token)
            .json(request)
            .send()
            .await?;

        let body: ResampleResponse = Self::read_json(response).await?;
        let series = body.into_series();
        if series.len() != request.variables.len() {
            return Err(HistoryError::Parse(format!(
                "resample returned {} series for {} variables",
                series.len(),
                request.variables.len()
            )));
        }
        Ok(series)
    }
}
