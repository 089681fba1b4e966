//! In-process broker with partitioned topics and consumer groups.
//!
//! Topics are append-only partition logs. Each consumer group tracks a
//! read position and a committed offset per partition; partitions are
//! assigned round-robin across the group's live members. Joining or
//! leaving a group rewinds every position to the last commit, so records
//! that were in flight at a rebalance are delivered again.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tracing::{debug, info};

use medinsight_core::{AppError, AppResult};

use crate::record::{ConsumerRecord, OutboundRecord};
use crate::traits::{MessageBroker, MessageConsumer, MessageProducer};

type PartitionKey = (String, i32);

#[derive(Debug)]
struct StoredRecord {
    key: Option<String>,
    payload: Vec<u8>,
    headers: Vec<(String, String)>,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct GroupState {
    members: Vec<u64>,
    positions: HashMap<PartitionKey, i64>,
    committed: HashMap<PartitionKey, i64>,
    in_flight: HashSet<PartitionKey>,
}

impl GroupState {
    fn rebalance(&mut self) {
        self.positions = self.committed.clone();
        self.in_flight.clear();
    }
}

#[derive(Debug, Default)]
struct Inner {
    topics: HashMap<String, Vec<Vec<StoredRecord>>>,
    groups: HashMap<String, GroupState>,
    next_member: u64,
}

impl Inner {
    fn create_topic(&mut self, topic: &str, partitions: u32) {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| (0..partitions).map(|_| Vec::new()).collect());
    }
}

#[derive(Debug)]
struct Shared {
    inner: Mutex<Inner>,
    notify: Notify,
    partitions: u32,
    round_robin: AtomicU32,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn partition_for(&self, key: Option<&str>, partitions: usize) -> usize {
        match key {
            Some(key) => (fnv1a(key.as_bytes()) % partitions as u64) as usize,
            None => self.round_robin.fetch_add(1, Ordering::Relaxed) as usize % partitions,
        }
    }
}

/// FNV-1a, stable across processes so a key always maps to one partition.
fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

/// In-process broker.
#[derive(Debug, Clone)]
pub struct InMemoryBroker {
    shared: Arc<Shared>,
}

impl InMemoryBroker {
    /// Create a broker whose auto-created topics have `partitions` partitions.
    pub fn new(partitions: u32) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner::default()),
                notify: Notify::new(),
                partitions: partitions.max(1),
                round_robin: AtomicU32::new(0),
            }),
        }
    }

    /// Every record on `topic`, partition by partition in offset order.
    pub fn records(&self, topic: &str) -> Vec<ConsumerRecord> {
        let inner = self.shared.lock();
        let Some(partitions) = inner.topics.get(topic) else {
            return Vec::new();
        };
        partitions
            .iter()
            .enumerate()
            .flat_map(|(partition, log)| {
                log.iter()
                    .enumerate()
                    .map(move |(offset, stored)| to_consumer_record(topic, partition, offset, stored))
            })
            .collect()
    }

    /// Next offset `group` will resume from on `topic`/`partition` after a
    /// restart.
    pub fn committed_offset(&self, group: &str, topic: &str, partition: i32) -> Option<i64> {
        let inner = self.shared.lock();
        inner
            .groups
            .get(group)?
            .committed
            .get(&(topic.to_string(), partition))
            .copied()
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new(1)
    }
}

fn to_consumer_record(
    topic: &str,
    partition: usize,
    offset: usize,
    stored: &StoredRecord,
) -> ConsumerRecord {
    ConsumerRecord {
        topic: topic.to_string(),
        partition: partition as i32,
        offset: offset as i64,
        key: stored.key.clone(),
        payload: stored.payload.clone(),
        headers: stored.headers.clone(),
        timestamp: stored.timestamp,
    }
}

#[async_trait]
impl MessageProducer for InMemoryBroker {
    async fn send(&self, record: OutboundRecord) -> AppResult<()> {
        let (partition, offset) = {
            let mut inner = self.shared.lock();
            inner.create_topic(&record.topic, self.shared.partitions);
            let partitions = inner
                .topics
                .get_mut(&record.topic)
                .ok_or_else(|| AppError::internal("Topic vanished while appending"))?;
            let partition = self.shared.partition_for(record.key.as_deref(), partitions.len());
            let log = &mut partitions[partition];
            log.push(StoredRecord {
                key: record.key,
                payload: record.payload,
                headers: record.headers,
                timestamp: Utc::now(),
            });
            (partition, log.len() - 1)
        };
        debug!(topic = %record.topic, partition, offset, "Appended record");
        self.shared.notify.notify_waiters();
        Ok(())
    }
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn producer(&self) -> Arc<dyn MessageProducer> {
        Arc::new(self.clone())
    }

    async fn subscribe(
        &self,
        group: &str,
        topics: &[String],
    ) -> AppResult<Box<dyn MessageConsumer>> {
        if topics.is_empty() {
            return Err(AppError::validation("A consumer must subscribe to at least one topic"));
        }
        let member_id = {
            let mut inner = self.shared.lock();
            for topic in topics {
                inner.create_topic(topic, self.shared.partitions);
            }
            inner.next_member += 1;
            let member_id = inner.next_member;
            let state = inner.groups.entry(group.to_string()).or_default();
            state.members.push(member_id);
            state.rebalance();
            member_id
        };
        info!(group, member_id, topics = ?topics, "Consumer joined group");
        self.shared.notify.notify_waiters();

        Ok(Box::new(MemoryConsumer {
            shared: self.shared.clone(),
            group: group.to_string(),
            member_id,
            topics: topics.to_vec(),
            cursor: AtomicUsize::new(0),
        }))
    }

    async fn ensure_topics(&self, topics: &[String]) -> AppResult<()> {
        let mut inner = self.shared.lock();
        for topic in topics {
            inner.create_topic(topic, self.shared.partitions);
        }
        Ok(())
    }

    async fn topic_depth(&self, topic: &str) -> AppResult<Option<u64>> {
        let inner = self.shared.lock();
        Ok(inner
            .topics
            .get(topic)
            .map(|partitions| partitions.iter().map(|log| log.len() as u64).sum()))
    }
}

/// One member of an in-process consumer group.
#[derive(Debug)]
struct MemoryConsumer {
    shared: Arc<Shared>,
    group: String,
    member_id: u64,
    topics: Vec<String>,
    cursor: AtomicUsize,
}

impl MemoryConsumer {
    fn assigned(&self, inner: &Inner, state: &GroupState) -> Vec<PartitionKey> {
        let Some(slot) = state.members.iter().position(|m| *m == self.member_id) else {
            return Vec::new();
        };
        let mut all: Vec<PartitionKey> = self
            .topics
            .iter()
            .flat_map(|topic| {
                let count = inner.topics.get(topic).map_or(0, Vec::len);
                (0..count as i32).map(move |p| (topic.clone(), p))
            })
            .collect();
        all.sort();
        all.into_iter()
            .enumerate()
            .filter(|(i, _)| i % state.members.len() == slot)
            .map(|(_, key)| key)
            .collect()
    }

    fn try_next(&self) -> Option<ConsumerRecord> {
        let mut guard = self.shared.lock();
        let inner = &mut *guard;
        let state = inner.groups.get(&self.group)?;
        let assigned = self.assigned(inner, state);
        if assigned.is_empty() {
            return None;
        }

        let start = self.cursor.fetch_add(1, Ordering::Relaxed);
        for i in 0..assigned.len() {
            let key = &assigned[(start + i) % assigned.len()];
            if state.in_flight.contains(key) {
                continue;
            }
            let position = state.positions.get(key).copied().unwrap_or(0);
            let Some(stored) = inner
                .topics
                .get(&key.0)
                .and_then(|partitions| partitions.get(key.1 as usize))
                .and_then(|log| log.get(position as usize))
            else {
                continue;
            };
            let record = to_consumer_record(&key.0, key.1 as usize, position as usize, stored);

            let state = inner.groups.get_mut(&self.group)?;
            state.positions.insert(key.clone(), position + 1);
            state.in_flight.insert(key.clone());
            return Some(record);
        }
        None
    }

    fn with_state(&self, record: &ConsumerRecord, apply: impl FnOnce(&mut GroupState, PartitionKey)) {
        let mut inner = self.shared.lock();
        if let Some(state) = inner.groups.get_mut(&self.group) {
            apply(state, (record.topic.clone(), record.partition));
        }
    }
}

#[async_trait]
impl MessageConsumer for MemoryConsumer {
    async fn poll(&self, timeout: Duration) -> AppResult<Option<ConsumerRecord>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.shared.notify.notified();
            if let Some(record) = self.try_next() {
                return Ok(Some(record));
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn commit(&self, record: &ConsumerRecord) -> AppResult<()> {
        self.with_state(record, |state, key| {
            state.in_flight.remove(&key);
            let next = record.offset + 1;
            let committed = state.committed.entry(key).or_insert(0);
            *committed = (*committed).max(next);
        });
        self.shared.notify.notify_waiters();
        Ok(())
    }

    async fn rewind(&self, record: &ConsumerRecord) -> AppResult<()> {
        self.with_state(record, |state, key| {
            state.in_flight.remove(&key);
            state.positions.insert(key, record.offset);
        });
        self.shared.notify.notify_waiters();
        Ok(())
    }
}

impl Drop for MemoryConsumer {
    fn drop(&mut self) {
        let mut inner = self.shared.lock();
        if let Some(state) = inner.groups.get_mut(&self.group) {
            state.members.retain(|m| *m != self.member_id);
            state.rebalance();
        }
        drop(inner);
        self.shared.notify.notify_waiters();
    }
}
