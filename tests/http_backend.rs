use chrono::{TimeZone, Utc};
use cloudscope::backend::types::{Dimension, StatisticsQuery, StreamsQuery};
use cloudscope::backend::{Backend, ComputeApi, HttpBackend, LogsApi, MetricsApi};
use cloudscope::error::BackendError;
use cloudscope::providers::{InventoryProvider, ProviderSettings, RetryPolicy};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Serve exactly one HTTP response, returning the raw request that was received
async fn serve_once(status: &str, body: &str) -> (String, JoinHandle<String>) {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    serve_raw(response).await
}

/// Serve one response written verbatim, so tests can send malformed framing
async fn serve_raw(response: String) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        request
    });

    (endpoint, handle)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut data = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        data.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&data).to_string();
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if data.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&data).to_string()
}

fn backend(endpoint: &str) -> HttpBackend {
    HttpBackend::new(endpoint, "us-east-1", Duration::from_secs(5)).unwrap()
}

fn fast_settings() -> ProviderSettings {
    ProviderSettings {
        retry: RetryPolicy::new(1, Duration::from_millis(1), Duration::from_secs(5)),
        ..ProviderSettings::default()
    }
}

#[tokio::test]
async fn test_describe_instances_request_and_parse() {
    let (endpoint, server) = serve_once(
        "200 OK",
        r#"{"Reservations": [{"Instances": [
            {"InstanceId": "i-1", "InstanceType": "t3.micro", "State": {"Name": "running"},
             "Tags": [{"Key": "Name", "Value": "web"}]}
        ]}]}"#,
    )
    .await;

    let instances = backend(&endpoint)
        .describe_instances(&["i-1".to_string()])
        .await
        .unwrap();
    let request = server.await.unwrap();

    assert!(request.starts_with("GET /v1/us-east-1/instances?instance_id=i-1 HTTP/1.1"));
    assert_eq!(instances.len(), 1);
    assert_eq!(instances[0].tags[0].value, "web");
}

#[tokio::test]
async fn test_statistics_query_is_posted_as_json() {
    let (endpoint, server) = serve_once(
        "200 OK",
        r#"{"Datapoints": [{"Timestamp": "2024-03-01T11:55:00Z", "Average": 42.5, "Unit": "Percent"}]}"#,
    )
    .await;

    let end = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let query = StatisticsQuery {
        namespace: "AWS/EC2".to_string(),
        metric_name: "CPUUtilization".to_string(),
        dimensions: vec![Dimension::instance("i-1")],
        start_time: end - chrono::Duration::hours(1),
        end_time: end,
        period: 300,
        statistics: vec!["Average".to_string()],
    };
    let points = backend(&endpoint)
        .get_metric_statistics(&query)
        .await
        .unwrap();
    let request = server.await.unwrap();

    assert!(request.starts_with("POST /v1/us-east-1/metrics/statistics HTTP/1.1"));
    assert!(request.contains(r#""MetricName":"CPUUtilization""#));
    assert!(request.contains(r#""Period":300"#));
    assert_eq!(points[0].average, Some(42.5));
    assert_eq!(points[0].maximum, None);
}

#[tokio::test]
async fn test_missing_log_group_is_not_found() {
    let (endpoint, server) = serve_once(
        "400 Bad Request",
        r#"{"code": "ResourceNotFoundException", "message": "The specified log group does not exist."}"#,
    )
    .await;

    let result = backend(&endpoint)
        .describe_log_streams(&StreamsQuery {
            log_group_name: "/aws/ec2/i-1".to_string(),
            descending: true,
            limit: 50,
        })
        .await;
    let request = server.await.unwrap();

    assert!(request.contains(r#""logGroupName":"/aws/ec2/i-1""#));
    assert_eq!(
        result,
        Err(BackendError::NotFound(
            "The specified log group does not exist.".to_string()
        ))
    );
}

#[tokio::test]
async fn test_forbidden_is_access_denied() {
    let (endpoint, _server) = serve_once(
        "403 Forbidden",
        r#"{"code": "AccessDeniedException", "message": "not authorized"}"#,
    )
    .await;

    let result = backend(&endpoint).describe_alarms("i-1").await;
    assert!(matches!(result, Err(BackendError::AccessDenied(_))));
}

#[tokio::test]
async fn test_unparsable_body_is_invalid_response() {
    let (endpoint, _server) = serve_once("200 OK", "this is not json").await;

    let result = backend(&endpoint).describe_regions().await;
    assert!(matches!(result, Err(BackendError::InvalidResponse(_))));
}

#[tokio::test]
async fn test_truncated_error_body_falls_back_to_status() {
    // Promises more body than it sends, then hangs up
    let (endpoint, _server) = serve_raw(
        "HTTP/1.1 502 Bad Gateway\r\nContent-Length: 500\r\nConnection: close\r\n\r\n{\"code\":".to_string(),
    )
    .await;

    let result = backend(&endpoint).describe_regions().await;
    assert_eq!(
        result,
        Err(BackendError::Unavailable("502 502: Bad Gateway".to_string()))
    );
}

#[tokio::test]
async fn test_probe_success_keeps_provider_live() {
    let (endpoint, server) = serve_once("200 OK", r#"{"account": "123456789012"}"#).await;

    let provider = InventoryProvider::connect(Arc::new(backend(&endpoint)), &fast_settings()).await;
    let request = server.await.unwrap();

    assert!(request.starts_with("GET /v1/us-east-1/identity HTTP/1.1"));
    assert!(!provider.is_offline());
}

#[tokio::test]
async fn test_server_error_on_probe_goes_offline() {
    let (endpoint, _server) = serve_once(
        "503 Service Unavailable",
        r#"{"code": "ServiceUnavailable", "message": "try later"}"#,
    )
    .await;

    let http = backend(&endpoint);
    assert!(matches!(http.probe().await, Err(BackendError::Unavailable(_))));

    let (endpoint, _server) = serve_once("503 Service Unavailable", "").await;
    let provider = InventoryProvider::connect(Arc::new(backend(&endpoint)), &fast_settings()).await;
    assert!(provider.is_offline());
    assert_eq!(provider.list_instances().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_unreachable_gateway_goes_offline() {
    // Grab a free port, then close it so nothing is listening
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let provider = InventoryProvider::connect(Arc::new(backend(&endpoint)), &fast_settings()).await;
    assert!(provider.is_offline());
}
