//! In-memory platform connector for tests and dry runs.
//!
//! Inbound messages are scripted per target with `push_inbound` and drained
//! by `poll_new_messages`. Sends are recorded and can be made to fail or to
//! acknowledge late.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::domain::conversation::{Message, PlatformKind};
use crate::domain::foundation::Timestamp;
use crate::ports::{PlatformConnector, PlatformError, SendReceipt};

/// A message handed to `send`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub target: String,
    pub text: String,
    pub sent_at: Timestamp,
}

#[derive(Debug, Clone)]
pub struct InMemoryConnector {
    kind: PlatformKind,
    inbound: Arc<Mutex<HashMap<String, VecDeque<Message>>>>,
    sent: Arc<Mutex<Vec<SentMessage>>>,
    fail_sends: Arc<AtomicBool>,
    blocked: Arc<Mutex<HashSet<String>>>,
    send_delay: Arc<Mutex<Duration>>,
    next_id: Arc<AtomicU64>,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl InMemoryConnector {
    pub fn new(kind: PlatformKind) -> Self {
        Self {
            kind,
            inbound: Arc::new(Mutex::new(HashMap::new())),
            sent: Arc::new(Mutex::new(Vec::new())),
            fail_sends: Arc::new(AtomicBool::new(false)),
            blocked: Arc::new(Mutex::new(HashSet::new())),
            send_delay: Arc::new(Mutex::new(Duration::ZERO)),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Queues a counterpart message for the next poll of `target`.
    pub fn push_inbound(&self, target: impl Into<String>, message: Message) {
        locked(&self.inbound)
            .entry(target.into())
            .or_default()
            .push_back(message);
    }

    /// Makes subsequent sends fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.fail_sends.store(failing, Ordering::SeqCst);
    }

    /// Makes `target` unknown to the platform from now on.
    pub fn block_target(&self, target: impl Into<String>) {
        locked(&self.blocked).insert(target.into());
    }

    /// Delays the acknowledgement of each send. The message counts as
    /// delivered before the delay starts.
    pub fn set_send_delay(&self, delay: Duration) {
        *locked(&self.send_delay) = delay;
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        locked(&self.sent).clone()
    }

    pub fn sent_to(&self, target: &str) -> Vec<SentMessage> {
        locked(&self.sent)
            .iter()
            .filter(|m| m.target == target)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl PlatformConnector for InMemoryConnector {
    fn kind(&self) -> PlatformKind {
        self.kind
    }

    async fn send(&self, target: &str, text: &str) -> Result<SendReceipt, PlatformError> {
        if target.trim().is_empty() || locked(&self.blocked).contains(target) {
            return Err(PlatformError::UnknownTarget(target.to_string()));
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(PlatformError::SendFailed(format!(
                "{} connector is set to fail",
                self.kind
            )));
        }
        locked(&self.sent).push(SentMessage {
            target: target.to_string(),
            text: text.to_string(),
            sent_at: Timestamp::now(),
        });
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let delay = *locked(&self.send_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(SendReceipt::delivered(format!("{}-{}", self.kind, id)))
    }

    async fn poll_new_messages(&self, target: &str) -> Result<Vec<Message>, PlatformError> {
        Ok(locked(&self.inbound)
            .get_mut(target)
            .map(|queue| queue.drain(..).collect())
            .unwrap_or_default())
    }
}
