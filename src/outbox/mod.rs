//! In-memory outbox for batched delivery.
//!
//! Messages wait here until the next flush, which hands the whole sequence to
//! the batch endpoint. The outbox is bounded by the API's batch size limit and
//! is lost on restart.

use tokio::sync::Mutex;

use crate::config::OutboxConfig;
use crate::error::{MailError, Result};
use crate::message::Message;
use crate::metrics::OutboxMetrics;

/// Largest batch the API accepts
pub const MAX_BATCH_SIZE: usize = 500;

/// What happens to a flushed batch whose dispatch fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutboxPolicy {
    /// The batch is lost
    #[default]
    Discard,
    /// The batch goes back to the front of the outbox, capacity permitting
    Requeue,
}

impl OutboxPolicy {
    pub fn from_config(config: &OutboxConfig) -> Self {
        if config.requeue_on_failure {
            Self::Requeue
        } else {
            Self::Discard
        }
    }
}

/// Bounded, ordered queue of prepared messages.
///
/// Enqueue, flush and requeue take the same lock, so a flush sees a consistent
/// snapshot and no enqueue is lost to a concurrent flush.
pub struct Outbox {
    messages: Mutex<Vec<Message>>,
    capacity: usize,
}

impl Outbox {
    pub fn new() -> Self {
        Self::with_capacity(MAX_BATCH_SIZE)
    }

    /// Capacities above [`MAX_BATCH_SIZE`] are clamped to it.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            capacity: capacity.min(MAX_BATCH_SIZE),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a message and return the new length.
    ///
    /// A full outbox rejects the message and stays unchanged.
    pub async fn enqueue(&self, message: Message) -> Result<usize> {
        let mut messages = self.messages.lock().await;

        if messages.len() >= self.capacity {
            OutboxMetrics::record_rejected();
            tracing::debug!(
                outbox_size = messages.len(),
                capacity = self.capacity,
                "Outbox full, message rejected"
            );
            return Err(MailError::BatchLimitExceeded {
                limit: self.capacity,
            });
        }

        messages.push(message);
        OutboxMetrics::set_size(messages.len());

        tracing::debug!(outbox_size = messages.len(), "Message added to outbox");

        Ok(messages.len())
    }

    /// Take every queued message and leave the outbox empty.
    pub async fn flush(&self) -> Vec<Message> {
        let mut messages = self.messages.lock().await;
        let taken = std::mem::take(&mut *messages);
        OutboxMetrics::set_size(0);

        tracing::debug!(message_count = taken.len(), "Outbox flushed");

        taken
    }

    /// Put a failed batch back ahead of anything queued since the flush.
    ///
    /// Only as many messages as fit under the capacity are restored, in their
    /// original order; the rest are dropped. Returns the number restored.
    pub async fn requeue(&self, failed: Vec<Message>) -> usize {
        let mut messages = self.messages.lock().await;

        let room = self.capacity.saturating_sub(messages.len());
        let restored = failed.len().min(room);
        let dropped = failed.len() - restored;

        let mut merged: Vec<Message> = failed.into_iter().take(restored).collect();
        merged.append(&mut messages);
        *messages = merged;

        OutboxMetrics::set_size(messages.len());
        OutboxMetrics::record_requeued(restored as u64);

        if dropped > 0 {
            OutboxMetrics::record_dropped(dropped as u64);
            tracing::warn!(
                restored = restored,
                dropped = dropped,
                capacity = self.capacity,
                "Outbox full, dropped part of a failed batch"
            );
        } else {
            tracing::debug!(restored = restored, "Failed batch returned to outbox");
        }

        restored
    }

    pub async fn len(&self) -> usize {
        self.messages.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.lock().await.is_empty()
    }
}

impl Default for Outbox {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn create_test_message(n: usize) -> Message {
        Message::new()
            .to(format!("user-{}@example.com", n))
            .subject("Test")
    }

    fn recipient(message: &Message) -> &str {
        message.get("To").and_then(|v| v.as_str()).unwrap()
    }

    #[tokio::test]
    async fn test_enqueue_returns_new_length() {
        let outbox = Outbox::new();

        for i in 1..=5 {
            let len = outbox.enqueue(create_test_message(i)).await.unwrap();
            assert_eq!(len, i);
        }

        assert_eq!(outbox.len().await, 5);
    }

    #[tokio::test]
    async fn test_enqueue_rejects_beyond_capacity() {
        let outbox = Outbox::new();

        for i in 1..=MAX_BATCH_SIZE {
            assert_eq!(outbox.enqueue(create_test_message(i)).await.unwrap(), i);
        }

        let result = outbox.enqueue(create_test_message(501)).await;
        assert!(matches!(
            result,
            Err(MailError::BatchLimitExceeded { limit: 500 })
        ));
        assert_eq!(outbox.len().await, 500);
    }

    #[tokio::test]
    async fn test_capacity_is_clamped() {
        assert_eq!(Outbox::with_capacity(10_000).capacity(), MAX_BATCH_SIZE);
        assert_eq!(Outbox::with_capacity(3).capacity(), 3);
    }

    #[tokio::test]
    async fn test_flush_takes_everything_in_order() {
        let outbox = Outbox::new();
        for i in 0..3 {
            outbox.enqueue(create_test_message(i)).await.unwrap();
        }

        let flushed = outbox.flush().await;
        assert_eq!(flushed.len(), 3);
        assert_eq!(recipient(&flushed[0]), "user-0@example.com");
        assert_eq!(recipient(&flushed[2]), "user-2@example.com");

        assert!(outbox.is_empty().await);
        assert!(outbox.flush().await.is_empty());
    }

    #[tokio::test]
    async fn test_requeue_goes_to_front() {
        let outbox = Outbox::new();
        outbox.enqueue(create_test_message(0)).await.unwrap();
        outbox.enqueue(create_test_message(1)).await.unwrap();
        let failed = outbox.flush().await;

        outbox.enqueue(create_test_message(2)).await.unwrap();
        let restored = outbox.requeue(failed).await;
        assert_eq!(restored, 2);

        let all = outbox.flush().await;
        let order: Vec<&str> = all.iter().map(recipient).collect();
        assert_eq!(
            order,
            vec!["user-0@example.com", "user-1@example.com", "user-2@example.com"]
        );
    }

    #[tokio::test]
    async fn test_requeue_respects_capacity() {
        let outbox = Outbox::with_capacity(3);
        for i in 0..3 {
            outbox.enqueue(create_test_message(i)).await.unwrap();
        }
        let failed = outbox.flush().await;

        outbox.enqueue(create_test_message(9)).await.unwrap();
        let restored = outbox.requeue(failed).await;

        assert_eq!(restored, 2);
        assert_eq!(outbox.len().await, 3);

        let all = outbox.flush().await;
        assert_eq!(recipient(&all[0]), "user-0@example.com");
        assert_eq!(recipient(&all[2]), "user-9@example.com");
    }

    #[tokio::test]
    async fn test_concurrent_enqueue_and_flush_lose_nothing() {
        let outbox = Arc::new(Outbox::new());

        let mut handles = Vec::new();
        for i in 0..200 {
            let outbox = outbox.clone();
            handles.push(tokio::spawn(async move {
                outbox.enqueue(create_test_message(i)).await.unwrap();
            }));
        }

        let mut flushed = 0;
        for _ in 0..10 {
            flushed += outbox.flush().await.len();
            tokio::task::yield_now().await;
        }

        for handle in handles {
            handle.await.unwrap();
        }
        flushed += outbox.flush().await.len();

        assert_eq!(flushed, 200);
    }

    #[test]
    fn test_policy_from_config() {
        let config = OutboxConfig {
            requeue_on_failure: true,
        };
        assert_eq!(OutboxPolicy::from_config(&config), OutboxPolicy::Requeue);
        assert_eq!(
            OutboxPolicy::from_config(&OutboxConfig::default()),
            OutboxPolicy::Discard
        );
    }
}
