use crate::backend::types::{
    EventsQuery, FilterQuery, RawLogEvent, RawLogGroup, RawLogStream, StreamsQuery,
};
use crate::backend::LogsApi;
use crate::error::{BackendError, ProviderError};
use crate::model::{Collected, InstanceLogs, LogEvent, LogGroup, LogStream, Skipped};
use crate::normalize::{sanitize_log_message, TimeWindow};
use crate::providers::{probe_backend, ProviderSettings, RetryPolicy};
use chrono::Utc;
use log::{debug, info, warn};
use std::sync::Arc;

/// Streams listed per group, most recently active first
pub const STREAM_LIST_LIMIT: usize = 50;

/// Events returned by a single stream fetch unless the caller asks otherwise
pub const DEFAULT_EVENT_LIMIT: usize = 100;

/// Matches returned by a filter search
pub const SEARCH_LIMIT: usize = 100;

/// Streams sampled by [`LogsProvider::recent_logs`]
pub const RECENT_STREAM_COUNT: usize = 5;

const INSTANCE_LOG_LIMIT: usize = 50;
const APPLICATION_LOG_LIMIT: usize = 100;

enum Mode {
    Live(Arc<dyn LogsApi>),
    Offline,
}

/// Log groups, streams and events, plus best-effort correlation to instances
///
/// Offline, every listing is empty and lookups find nothing.
pub struct LogsProvider {
    mode: Mode,
    region: String,
    retry: RetryPolicy,
    max_message_length: usize,
}

impl LogsProvider {
    /// Probe `backend` and build a live provider, or an offline one if the probe fails
    pub async fn connect(backend: Arc<dyn LogsApi>, settings: &ProviderSettings) -> Self {
        if probe_backend(backend.as_ref(), &settings.retry, "Logs").await {
            Self {
                mode: Mode::Live(backend),
                region: settings.region.clone(),
                retry: settings.retry.clone(),
                max_message_length: settings.max_message_length,
            }
        } else {
            Self::offline(settings)
        }
    }

    pub fn offline(settings: &ProviderSettings) -> Self {
        info!("Logs provider running offline for {}", settings.region);
        Self {
            mode: Mode::Offline,
            region: settings.region.clone(),
            retry: settings.retry.clone(),
            max_message_length: settings.max_message_length,
        }
    }

    pub fn is_offline(&self) -> bool {
        matches!(self.mode, Mode::Offline)
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub async fn list_log_groups(&self) -> Result<Vec<LogGroup>, ProviderError> {
        let api = match &self.mode {
            Mode::Offline => return Ok(Vec::new()),
            Mode::Live(api) => api.as_ref(),
        };

        let groups = self
            .retry
            .run("describe_log_groups", move || api.describe_log_groups(None))
            .await?;
        Ok(groups.into_iter().map(to_log_group).collect())
    }

    /// Look up one log group by name prefix, returning the first match
    pub async fn describe_log_group(&self, name: &str) -> Result<Option<LogGroup>, ProviderError> {
        let api = match &self.mode {
            Mode::Offline => return Ok(None),
            Mode::Live(api) => api.as_ref(),
        };

        match self
            .retry
            .run("describe_log_groups", move || {
                api.describe_log_groups(Some(name))
            })
            .await
        {
            Ok(groups) => Ok(groups.into_iter().next().map(to_log_group)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Up to 50 streams of `group`, most recent event first
    pub async fn list_log_streams(&self, group: &str) -> Result<Vec<LogStream>, ProviderError> {
        let api = match &self.mode {
            Mode::Offline => return Ok(Vec::new()),
            Mode::Live(api) => api.as_ref(),
        };

        let query = StreamsQuery {
            log_group_name: group.to_string(),
            descending: true,
            limit: STREAM_LIST_LIMIT,
        };
        let query = &query;
        let mut streams: Vec<LogStream> = self
            .retry
            .run("describe_log_streams", move || {
                api.describe_log_streams(query)
            })
            .await?
            .into_iter()
            .map(to_log_stream)
            .collect();

        streams.sort_by(|a, b| b.last_event_time.cmp(&a.last_event_time));
        streams.truncate(STREAM_LIST_LIMIT);
        Ok(streams)
    }

    /// Events of one stream, optionally bounded by epoch milliseconds
    pub async fn log_events(
        &self,
        group: &str,
        stream: &str,
        start_ms: Option<i64>,
        end_ms: Option<i64>,
        limit: usize,
    ) -> Result<Vec<LogEvent>, ProviderError> {
        let api = match &self.mode {
            Mode::Offline => return Ok(Vec::new()),
            Mode::Live(api) => api.as_ref(),
        };
        Ok(self
            .fetch_events(api, group, stream, start_ms, end_ms, limit)
            .await?)
    }

    /// Newest events across the most recently active streams of `group`
    ///
    /// The `limit` is split evenly over at most five streams (remainder dropped).
    /// A stream that fails to load is recorded in `skipped`; failing to list the
    /// streams fails the whole call.
    pub async fn recent_logs(
        &self,
        group: &str,
        window: &TimeWindow,
        limit: usize,
    ) -> Result<Collected<LogEvent>, ProviderError> {
        let api = match &self.mode {
            Mode::Offline => return Ok(Collected::default()),
            Mode::Live(api) => api.as_ref(),
        };

        let per_stream = limit / RECENT_STREAM_COUNT;
        if per_stream == 0 {
            debug!("Limit {} too small to sample {} streams", limit, group);
            return Ok(Collected::default());
        }

        let streams = self.list_log_streams(group).await?;
        let mut collected = Collected::default();

        for stream in streams.iter().take(RECENT_STREAM_COUNT) {
            collected.attempted += 1;
            match self
                .fetch_events(
                    api,
                    group,
                    &stream.log_stream_name,
                    Some(window.start_millis()),
                    Some(window.end_millis()),
                    per_stream,
                )
                .await
            {
                Ok(events) => collected.items.extend(events),
                Err(e) => {
                    warn!(
                        "Skipping stream {} in {}: {}",
                        stream.log_stream_name, group, e
                    );
                    collected.skip(stream.log_stream_name.clone(), e);
                }
            }
        }

        collected
            .items
            .sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        collected.items.truncate(limit);
        Ok(collected)
    }

    /// Events matching a filter pattern within the window, at most 100
    pub async fn search_logs(
        &self,
        group: &str,
        pattern: &str,
        window: &TimeWindow,
    ) -> Result<Vec<LogEvent>, ProviderError> {
        let api = match &self.mode {
            Mode::Offline => return Ok(Vec::new()),
            Mode::Live(api) => api.as_ref(),
        };

        let query = FilterQuery {
            log_group_name: group.to_string(),
            filter_pattern: pattern.to_string(),
            start_time: window.start_millis(),
            end_time: window.end_millis(),
            limit: SEARCH_LIMIT,
        };
        let query = &query;
        let events = self
            .retry
            .run("filter_log_events", move || api.filter_log_events(query))
            .await?;

        Ok(events
            .into_iter()
            .take(SEARCH_LIMIT)
            .map(|e| self.to_log_event(e))
            .collect())
    }

    /// Best-effort collection of logs that look related to an instance
    ///
    /// Groups named after the instance feed `system_logs`; groups whose name
    /// mentions errors are searched for the quoted instance id and feed
    /// `error_logs`. Nothing is deduplicated. Groups that fail are listed in
    /// `skipped`.
    pub async fn correlate_instance_logs(
        &self,
        instance_id: &str,
        window: &TimeWindow,
    ) -> Result<InstanceLogs, ProviderError> {
        let mut logs = InstanceLogs {
            instance_id: instance_id.to_string(),
            generated_at: Utc::now(),
            duration_hours: window.hours,
            system_logs: Vec::new(),
            error_logs: Vec::new(),
            attempted: 0,
            skipped: Vec::new(),
        };
        if self.is_offline() {
            return Ok(logs);
        }

        let groups = self.list_log_groups().await?;

        for pattern in correlation_patterns(instance_id) {
            for group in groups.iter().filter(|g| g.log_group_name.contains(&pattern)) {
                match self
                    .recent_logs(&group.log_group_name, window, INSTANCE_LOG_LIMIT)
                    .await
                {
                    Ok(recent) => {
                        logs.system_logs.extend(recent.items);
                        logs.attempted += recent.attempted;
                        logs.skipped.extend(recent.skipped);
                    }
                    Err(e) => {
                        warn!("Skipping log group {}: {}", group.log_group_name, e);
                        logs.attempted += 1;
                        logs.skipped.push(skipped(&group.log_group_name, e));
                    }
                }
            }
        }

        let filter = format!("\"{}\"", instance_id);
        for group in groups.iter().filter(|g| is_error_group(&g.log_group_name)) {
            logs.attempted += 1;
            match self
                .search_logs(&group.log_group_name, &filter, window)
                .await
            {
                Ok(events) => logs.error_logs.extend(events),
                Err(e) => {
                    warn!("Skipping error group {}: {}", group.log_group_name, e);
                    logs.skipped.push(skipped(&group.log_group_name, e));
                }
            }
        }

        debug!(
            "Correlated {} system and {} error events for {}",
            logs.system_logs.len(),
            logs.error_logs.len(),
            instance_id
        );
        Ok(logs)
    }

    /// Recent logs of every group whose name contains `application` (any case)
    ///
    /// `attempted` counts streams sampled plus groups that failed outright.
    pub async fn application_logs(
        &self,
        application: &str,
        window: &TimeWindow,
    ) -> Result<Collected<LogEvent>, ProviderError> {
        let mut found = Collected::default();
        if self.is_offline() {
            return Ok(found);
        }

        let needle = application.to_lowercase();
        for group in self.list_log_groups().await? {
            if !group.log_group_name.to_lowercase().contains(&needle) {
                continue;
            }
            match self
                .recent_logs(&group.log_group_name, window, APPLICATION_LOG_LIMIT)
                .await
            {
                Ok(recent) => found.absorb(recent),
                Err(e) => {
                    warn!("Skipping log group {}: {}", group.log_group_name, e);
                    found.attempted += 1;
                    found.skip(group.log_group_name, e);
                }
            }
        }

        Ok(found)
    }

    async fn fetch_events(
        &self,
        api: &dyn LogsApi,
        group: &str,
        stream: &str,
        start_ms: Option<i64>,
        end_ms: Option<i64>,
        limit: usize,
    ) -> Result<Vec<LogEvent>, BackendError> {
        let query = EventsQuery {
            log_group_name: group.to_string(),
            log_stream_name: stream.to_string(),
            start_time: start_ms,
            end_time: end_ms,
            limit,
        };
        let query = &query;
        let events = self
            .retry
            .run("get_log_events", move || api.get_log_events(query))
            .await?;

        Ok(events
            .into_iter()
            .map(|e| RawLogEvent {
                log_stream_name: e.log_stream_name.or_else(|| Some(stream.to_string())),
                ..e
            })
            .map(|e| self.to_log_event(e))
            .collect())
    }

    fn to_log_event(&self, raw: RawLogEvent) -> LogEvent {
        LogEvent {
            timestamp: raw.timestamp,
            message: sanitize_log_message(&raw.message, self.max_message_length),
            log_stream_name: raw.log_stream_name,
            ingestion_time: raw.ingestion_time,
        }
    }
}

/// Group name fragments that identify an instance's own logs
fn correlation_patterns(instance_id: &str) -> [String; 4] {
    [
        format!("/aws/ec2/{}", instance_id),
        format!("ec2-{}", instance_id),
        format!("instance-{}", instance_id),
        format!("/aws/ec2/instances/{}", instance_id),
    ]
}

/// Case-insensitive "err", which also covers "error"
fn is_error_group(name: &str) -> bool {
    name.to_lowercase().contains("err")
}

fn skipped(item: &str, reason: ProviderError) -> Skipped {
    Skipped {
        item: item.to_string(),
        reason: reason.to_string(),
    }
}

fn to_log_group(raw: RawLogGroup) -> LogGroup {
    LogGroup {
        log_group_name: raw.log_group_name,
        creation_time: raw.creation_time,
        stored_bytes: raw.stored_bytes.unwrap_or(0),
        metric_filter_count: raw.metric_filter_count.unwrap_or(0),
        arn: raw.arn,
        retention_in_days: raw.retention_in_days,
    }
}

fn to_log_stream(raw: RawLogStream) -> LogStream {
    LogStream {
        log_stream_name: raw.log_stream_name,
        creation_time: raw.creation_time,
        first_event_time: raw.first_event_time,
        last_event_time: raw.last_event_time,
        stored_bytes: raw.stored_bytes.unwrap_or(0),
        arn: raw.arn,
    }
}
