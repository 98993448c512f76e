use crate::backend::types::{
    Datapoint, Dimension, EventsQuery, FilterQuery, MetricDescriptor, RawAlarm, RawInstance,
    RawInstanceStatus, RawLogEvent, RawLogGroup, RawLogStream, RawRegion, StatisticsQuery,
    StreamsQuery,
};
use crate::backend::{Backend, ComputeApi, LogsApi, MetricsApi};
use crate::error::BackendError;
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Error codes the gateway uses for missing resources
const NOT_FOUND_CODES: &[&str] = &[
    "InvalidInstanceID.NotFound",
    "ResourceNotFoundException",
    "NoSuchEntity",
];

/// Error codes the gateway uses for credential and permission failures
const ACCESS_DENIED_CODES: &[&str] = &[
    "UnauthorizedOperation",
    "AccessDenied",
    "AccessDeniedException",
    "AuthFailure",
    "UnrecognizedClientException",
];

/// Backend that talks to a telemetry gateway over JSON/HTTP
///
/// Every route lives under `{endpoint}/v1/{region}/`, so one `HttpBackend`
/// serves exactly one region. Reads are `GET`s with query parameters; calls
/// carrying structured parameters `POST` the query type as a JSON body.
/// Failures come back as `{"code": ..., "message": ...}` with a non-2xx status.
pub struct HttpBackend {
    client: Client,
    endpoint: Url,
    region: String,
    timeout: Duration,
}

/// Error payload returned by the gateway
#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeInstancesResponse {
    #[serde(default)]
    reservations: Vec<Reservation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Reservation {
    #[serde(default)]
    instances: Vec<RawInstance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstanceStatusResponse {
    #[serde(default)]
    instance_statuses: Vec<RawInstanceStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ConsoleOutputResponse {
    output: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RegionsResponse {
    #[serde(default)]
    regions: Vec<RawRegion>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StatisticsResponse {
    #[serde(default)]
    datapoints: Vec<Datapoint>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ListMetricsRequest<'a> {
    namespace: &'a str,
    dimensions: [&'a Dimension; 1],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListMetricsResponse {
    #[serde(default)]
    metrics: Vec<MetricDescriptor>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AlarmsResponse {
    #[serde(default)]
    metric_alarms: Vec<RawAlarm>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogGroupsResponse {
    #[serde(default)]
    log_groups: Vec<RawLogGroup>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogStreamsResponse {
    #[serde(default)]
    log_streams: Vec<RawLogStream>,
}

#[derive(Debug, Deserialize)]
struct LogEventsResponse {
    #[serde(default)]
    events: Vec<RawLogEvent>,
}

impl HttpBackend {
    /// Create a backend for one region of the gateway at `endpoint`
    ///
    /// # Arguments
    /// * `endpoint` - Gateway base URL (e.g., "http://localhost:4510")
    /// * `region` - Region every request is scoped to
    /// * `timeout` - Upper bound for a single HTTP request
    ///
    /// # Example
    /// ```
    /// use cloudscope::backend::HttpBackend;
    /// use std::time::Duration;
    ///
    /// let backend = HttpBackend::new(
    ///     "http://localhost:4510",
    ///     "us-east-1",
    ///     Duration::from_secs(10),
    /// ).unwrap();
    /// ```
    pub fn new(
        endpoint: &str,
        region: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| BackendError::InvalidEndpoint(format!("{}: {}", endpoint, e)))?;
        if endpoint.cannot_be_a_base() {
            return Err(BackendError::InvalidEndpoint(endpoint.to_string()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::InvalidEndpoint(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            region: region.into(),
            timeout,
        })
    }

    /// Build the URL for a region-scoped route
    fn url(&self, segments: &[&str]) -> Result<Url, BackendError> {
        let mut url = self.endpoint.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| BackendError::InvalidEndpoint(self.endpoint.to_string()))?;
            path.pop_if_empty().push("v1").push(&self.region);
            path.extend(segments);
        }
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, BackendError> {
        debug!("GET {}", url);
        self.execute(self.client.get(url)).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<T, BackendError> {
        debug!("POST {}", url);
        self.execute(self.client.post(url).json(body)).await
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, BackendError> {
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return Err(BackendError::Timeout(self.timeout)),
            Err(e) => return Err(e.into()),
        };
        let status = response.status();

        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| BackendError::InvalidResponse(format!("Failed to parse response: {}", e)));
        }

        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                debug!("Failed to read {} error body: {}", status, e);
                String::new()
            }
        };
        let body = serde_json::from_str::<ErrorBody>(&text).ok();
        Err(classify_failure(status, body, &text))
    }
}

/// Map a non-success gateway response onto a backend error category
fn classify_failure(status: StatusCode, body: Option<ErrorBody>, raw: &str) -> BackendError {
    let (code, message) = match body {
        Some(body) => (body.code, body.message),
        None => (
            status.as_u16().to_string(),
            if raw.is_empty() {
                status.canonical_reason().unwrap_or("unknown error").to_string()
            } else {
                raw.to_string()
            },
        ),
    };

    if NOT_FOUND_CODES.contains(&code.as_str()) || code.ends_with(".NotFound") {
        BackendError::NotFound(message)
    } else if ACCESS_DENIED_CODES.contains(&code.as_str())
        || status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
    {
        BackendError::AccessDenied(message)
    } else if status == StatusCode::NOT_FOUND {
        BackendError::NotFound(message)
    } else if status.is_server_error() {
        BackendError::Unavailable(format!("{} {}: {}", status.as_u16(), code, message))
    } else {
        BackendError::Api { code, message }
    }
}

#[async_trait]
impl Backend for HttpBackend {
    fn region(&self) -> &str {
        &self.region
    }

    async fn probe(&self) -> Result<(), BackendError> {
        let url = self.url(&["identity"])?;
        let _: serde_json::Value = self.get(url).await?;
        Ok(())
    }
}

#[async_trait]
impl ComputeApi for HttpBackend {
    async fn describe_instances(
        &self,
        instance_ids: &[String],
    ) -> Result<Vec<RawInstance>, BackendError> {
        let mut url = self.url(&["instances"])?;
        if !instance_ids.is_empty() {
            let mut query = url.query_pairs_mut();
            for id in instance_ids {
                query.append_pair("instance_id", id);
            }
        }

        let response: DescribeInstancesResponse = self.get(url).await?;
        Ok(response
            .reservations
            .into_iter()
            .flat_map(|reservation| reservation.instances)
            .collect())
    }

    async fn describe_instance_status(
        &self,
        instance_id: &str,
    ) -> Result<Vec<RawInstanceStatus>, BackendError> {
        let url = self.url(&["instances", instance_id, "status"])?;
        let response: InstanceStatusResponse = self.get(url).await?;
        Ok(response.instance_statuses)
    }

    async fn get_console_output(&self, instance_id: &str) -> Result<Option<String>, BackendError> {
        let url = self.url(&["instances", instance_id, "console"])?;
        let response: ConsoleOutputResponse = self.get(url).await?;
        Ok(response.output)
    }

    async fn describe_regions(&self) -> Result<Vec<RawRegion>, BackendError> {
        let url = self.url(&["regions"])?;
        let response: RegionsResponse = self.get(url).await?;
        Ok(response.regions)
    }
}

#[async_trait]
impl MetricsApi for HttpBackend {
    async fn get_metric_statistics(
        &self,
        query: &StatisticsQuery,
    ) -> Result<Vec<Datapoint>, BackendError> {
        let url = self.url(&["metrics", "statistics"])?;
        let response: StatisticsResponse = self.post(url, query).await?;
        Ok(response.datapoints)
    }

    async fn list_metrics(
        &self,
        namespace: &str,
        dimension: &Dimension,
    ) -> Result<Vec<MetricDescriptor>, BackendError> {
        let url = self.url(&["metrics", "list"])?;
        let request = ListMetricsRequest {
            namespace,
            dimensions: [dimension],
        };
        let response: ListMetricsResponse = self.post(url, &request).await?;
        Ok(response.metrics)
    }

    async fn describe_alarms(&self, name_prefix: &str) -> Result<Vec<RawAlarm>, BackendError> {
        let mut url = self.url(&["alarms"])?;
        url.query_pairs_mut().append_pair("prefix", name_prefix);
        let response: AlarmsResponse = self.get(url).await?;
        Ok(response.metric_alarms)
    }
}

#[async_trait]
impl LogsApi for HttpBackend {
    async fn describe_log_groups(
        &self,
        name_prefix: Option<&str>,
    ) -> Result<Vec<RawLogGroup>, BackendError> {
        let mut url = self.url(&["log-groups"])?;
        if let Some(prefix) = name_prefix {
            url.query_pairs_mut().append_pair("prefix", prefix);
        }
        let response: LogGroupsResponse = self.get(url).await?;
        Ok(response.log_groups)
    }

    async fn describe_log_streams(
        &self,
        query: &StreamsQuery,
    ) -> Result<Vec<RawLogStream>, BackendError> {
        let url = self.url(&["logs", "streams"])?;
        let response: LogStreamsResponse = self.post(url, query).await?;
        Ok(response.log_streams)
    }

    async fn get_log_events(&self, query: &EventsQuery) -> Result<Vec<RawLogEvent>, BackendError> {
        let url = self.url(&["logs", "events"])?;
        let response: LogEventsResponse = self.post(url, query).await?;
        Ok(response.events)
    }

    async fn filter_log_events(
        &self,
        query: &FilterQuery,
    ) -> Result<Vec<RawLogEvent>, BackendError> {
        let url = self.url(&["logs", "filter"])?;
        let response: LogEventsResponse = self.post(url, query).await?;
        Ok(response.events)
    }
}
