use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use super::request::Batch;
use crate::error::PublishError;

/// A batch the worker gave up on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure {
    pub uri: String,
    pub channel: String,
    pub items: usize,
    pub error_code: String,
    pub message: String,
}

impl DeliveryFailure {
    pub(crate) fn new(batch: &Batch, err: &PublishError) -> Self {
        Self {
            uri: batch.uri.clone(),
            channel: batch.channel.clone(),
            items: batch.items.len(),
            error_code: err.error_code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Observer for dropped batches. Called on the worker thread; keep it cheap.
pub trait FailureSink: Send + Sync {
    fn record(&self, failure: &DeliveryFailure);
}

/// Counts failures and remembers the most recent one.
#[derive(Debug, Default)]
pub struct FailureCounter {
    count: AtomicU64,
    last: Mutex<Option<DeliveryFailure>>,
}

impl FailureCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn last(&self) -> Option<DeliveryFailure> {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl FailureSink for FailureCounter {
    fn record(&self, failure: &DeliveryFailure) {
        self.count.fetch_add(1, Ordering::Relaxed);
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(failure.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_records() {
        let counter = FailureCounter::new();
        assert_eq!(counter.count(), 0);
        assert!(counter.last().is_none());

        let batch = Batch {
            uri: "http://h".into(),
            realm: None,
            secret: None,
            channel: "c".into(),
            items: vec![serde_json::json!(1), serde_json::json!(2)],
        };
        counter.record(&DeliveryFailure::new(&batch, &PublishError::Status(502)));
        counter.record(&DeliveryFailure::new(&batch, &PublishError::Status(503)));

        assert_eq!(counter.count(), 2);
        let last = counter.last().unwrap();
        assert_eq!(last.items, 2);
        assert_eq!(last.error_code, "status");
        assert!(last.message.contains("503"));
    }
}
