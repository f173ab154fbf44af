//! Log window retrieval from the logging backend.
//!
//! Enhanced Monitoring writes one JSON snapshot per granularity tick into
//! the `RDSOSMetrics` log group, in a stream named after the instance's
//! resource id. An invocation reads every event since the start of its
//! window and hands the raw payloads to the decoder.

use anyhow::{Context, Result};
use tracing::debug;

/// One raw entry from the monitoring log stream.
#[derive(Debug, Clone)]
pub struct RawLogEvent {
    pub timestamp_millis: i64,
    pub message: String,
}

/// Log retrieval boundary.
pub trait LogSource: Send + Sync {
    /// Fetch every event in `stream` at or after `since_millis`.
    fn fetch_since(
        &self,
        stream: &str,
        since_millis: i64,
    ) -> impl std::future::Future<Output = Result<Vec<RawLogEvent>>> + Send;
}

/// CloudWatch Logs-backed source.
pub struct CloudWatchLogSource {
    client: aws_sdk_cloudwatchlogs::Client,
    log_group: String,
}

impl CloudWatchLogSource {
    pub fn new(client: aws_sdk_cloudwatchlogs::Client, log_group: String) -> Self {
        Self { client, log_group }
    }
}

impl LogSource for CloudWatchLogSource {
    async fn fetch_since(&self, stream: &str, since_millis: i64) -> Result<Vec<RawLogEvent>> {
        let mut events = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get_log_events()
                .log_group_name(&self.log_group)
                .log_stream_name(stream)
                .start_time(since_millis)
                .start_from_head(true);

            if let Some(t) = &token {
                request = request.next_token(t);
            }

            let output = request
                .send()
                .await
                .with_context(|| format!("fetching log events from stream {stream}"))?;

            for event in output.events() {
                let (Some(timestamp), Some(message)) = (event.timestamp(), event.message())
                else {
                    continue;
                };

                events.push(RawLogEvent {
                    timestamp_millis: timestamp,
                    message: message.to_string(),
                });
            }

            // The forward token repeats once the end of the stream is
            // reached.
            match output.next_forward_token() {
                Some(next) if token.as_deref() != Some(next) => token = Some(next.to_string()),
                _ => break,
            }
        }

        debug!(
            stream,
            since_millis,
            count = events.len(),
            "fetched log window",
        );

        Ok(events)
    }
}
