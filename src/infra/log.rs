use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Notify;
use tracing::debug;

use crate::backend::{EventLog, LogConsumer, LogMessage};
use crate::error::{BoxError, CommitError, DependencyError};

#[derive(Default)]
struct Partition {
    messages: Vec<Bytes>,
    // next offset to deliver, per consumer group
    committed: HashMap<String, u64>,
}

struct Inner {
    topic: String,
    partition: Mutex<Partition>,
    appended: Notify,
}

/// Single-partition topic kept in process memory.
///
/// Consumer groups track one committed offset each. A group is always handed
/// the message at its committed offset, so anything not yet committed is
/// delivered again on the next fetch.
#[derive(Clone)]
pub struct MemoryLog {
    inner: Arc<Inner>,
}

impl MemoryLog {
    pub fn new(topic: &str) -> Self {
        Self {
            inner: Arc::new(Inner {
                topic: topic.to_string(),
                partition: Mutex::new(Partition::default()),
                appended: Notify::new(),
            }),
        }
    }

    pub fn topic(&self) -> &str {
        &self.inner.topic
    }

    /// Number of messages ever appended.
    pub fn len(&self) -> usize {
        self.partition().map(|p| p.messages.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Offset the group will read next.
    pub fn committed_offset(&self, group_id: &str) -> u64 {
        self.partition()
            .ok()
            .and_then(|p| p.committed.get(group_id).copied())
            .unwrap_or(0)
    }

    /// Joins (or rejoins) a consumer group, resuming from its committed offset.
    pub fn consumer(&self, group_id: &str) -> MemoryLogConsumer {
        MemoryLogConsumer {
            log: self.clone(),
            group_id: group_id.to_string(),
        }
    }

    fn partition(&self) -> Result<MutexGuard<'_, Partition>, BoxError> {
        self.inner.partition.lock().map_err(|_| "partition lock poisoned".into())
    }
}

#[async_trait]
impl EventLog for MemoryLog {
    async fn append(&self, payload: Bytes) -> Result<(), DependencyError> {
        let offset = {
            let mut partition = self.partition().map_err(DependencyError::Log)?;
            partition.messages.push(payload);
            partition.messages.len() - 1
        };
        debug!(topic = %self.inner.topic, offset, "Appended message");
        self.inner.appended.notify_waiters();
        Ok(())
    }
}

/// A consumer-group member reading from a [`MemoryLog`].
pub struct MemoryLogConsumer {
    log: MemoryLog,
    group_id: String,
}

impl MemoryLogConsumer {
    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    fn next_uncommitted(&self) -> Result<Option<LogMessage>, DependencyError> {
        let partition = self.log.partition().map_err(DependencyError::Log)?;
        let offset = partition.committed.get(&self.group_id).copied().unwrap_or(0);

        Ok(partition.messages.get(offset as usize).map(|payload| LogMessage {
            offset,
            payload: payload.clone(),
        }))
    }
}

#[async_trait]
impl LogConsumer for MemoryLogConsumer {
    async fn fetch(&self) -> Result<LogMessage, DependencyError> {
        loop {
            // registered before the check so an append in between is not missed
            let appended = self.log.inner.appended.notified();
            if let Some(message) = self.next_uncommitted()? {
                return Ok(message);
            }
            appended.await;
        }
    }

    async fn commit(&self, message: &LogMessage) -> Result<(), CommitError> {
        let mut partition = self.log.partition().map_err(|source| CommitError {
            offset: message.offset,
            source,
        })?;
        let next = message.offset + 1;
        let committed = partition.committed.entry(self.group_id.clone()).or_insert(0);
        if next > *committed {
            *committed = next;
        }
        Ok(())
    }
}
