//! Analytics log records and sinks
//!
//! Records are fire-and-forget: a sink may drop, buffer or forward them, the
//! player never waits on it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

/// One analytics event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Unique record ID
    pub id: Uuid,
    /// Timestamp
    pub timestamp: DateTime<Utc>,
    /// Sequence number within the player
    pub sequence: u64,
    /// Event name, e.g. `play_video`
    pub event_name: String,
    /// Event payload (`id`, `code`, `duration` plus event fields)
    pub payload: Map<String, Value>,
}

impl LogRecord {
    /// Payload field by name
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.payload.get(name)
    }
}

/// Destination of analytics records
pub trait AnalyticsSink: Send {
    fn log(&mut self, record: LogRecord);
}

/// Numbers records and hands them to the sink
pub(crate) struct Logger {
    sink: Box<dyn AnalyticsSink>,
    sequence: u64,
}

impl Logger {
    pub(crate) fn new(sink: Box<dyn AnalyticsSink>) -> Self {
        Self { sink, sequence: 0 }
    }

    pub(crate) fn log(&mut self, event_name: &str, payload: Map<String, Value>) {
        self.sequence += 1;
        debug!(event = event_name, sequence = self.sequence, "Analytics event");

        self.sink.log(LogRecord {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            sequence: self.sequence,
            event_name: event_name.to_string(),
            payload,
        });
    }
}

/// Keeps records in memory; clones share the same buffer
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LogRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.lock().clone()
    }

    /// Event names in logging order
    pub fn names(&self) -> Vec<String> {
        self.lock().iter().map(|r| r.event_name.clone()).collect()
    }

    /// Number of records logged under `event_name`
    pub fn count(&self, event_name: &str) -> usize {
        self.lock().iter().filter(|r| r.event_name == event_name).count()
    }

    pub fn last(&self, event_name: &str) -> Option<LogRecord> {
        self.lock().iter().rev().find(|r| r.event_name == event_name).cloned()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl AnalyticsSink for MemorySink {
    fn log(&mut self, record: LogRecord) {
        self.lock().push(record);
    }
}

/// Writes records to the tracing subscriber
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl AnalyticsSink for TracingSink {
    fn log(&mut self, record: LogRecord) {
        info!(
            event = %record.event_name,
            sequence = record.sequence,
            payload = %serde_json::Value::Object(record.payload),
            "Video event"
        );
    }
}

/// Forwards records to an async consumer
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<LogRecord>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<LogRecord>) -> Self {
        Self { tx }
    }
}

impl AnalyticsSink for ChannelSink {
    fn log(&mut self, record: LogRecord) {
        if self.tx.send(record).is_err() {
            debug!("Analytics consumer gone, dropping record");
        }
    }
}

/// Spawn a task that batches records and posts them to `beacon_url`
///
/// The task ends, after a final flush, once every clone of the returned sink
/// is dropped.
pub fn spawn_beacon(beacon_url: Url, max_batch: usize) -> (ChannelSink, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<LogRecord>();
    let client = reqwest::Client::new();
    let max_batch = max_batch.max(1);

    let handle = tokio::spawn(async move {
        let mut batch = Vec::with_capacity(max_batch);

        while let Some(record) = rx.recv().await {
            batch.push(record);
            if batch.len() >= max_batch {
                flush_batch(&client, &beacon_url, &mut batch).await;
            }
        }

        flush_batch(&client, &beacon_url, &mut batch).await;
    });

    (ChannelSink::new(tx), handle)
}

async fn flush_batch(client: &reqwest::Client, url: &Url, batch: &mut Vec<LogRecord>) {
    if batch.is_empty() {
        return;
    }

    info!(count = batch.len(), "Flushing analytics events");
    let events: Vec<LogRecord> = batch.drain(..).collect();

    if let Err(e) = client.post(url.clone()).json(&events).send().await {
        warn!(error = %e, "Analytics beacon failed");
    }
}
