use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::sink::DeliveryFailure;

/// Outcome handed to a publish callback: `Err` lists every endpoint that
/// failed to take the item.
pub type PublishOutcome = Result<(), Vec<DeliveryFailure>>;

/// Called once, on the worker thread, after a publish was attempted on every endpoint.
pub type PublishCallback = Box<dyn FnOnce(PublishOutcome) + Send>;

/// Shared by the per-endpoint requests of one publish; fires the callback
/// when the last of them has been attempted.
pub(crate) struct Completion {
    remaining: AtomicUsize,
    failures: Mutex<Vec<DeliveryFailure>>,
    callback: Mutex<Option<PublishCallback>>,
}

impl Completion {
    pub(crate) fn new(endpoints: usize, callback: PublishCallback) -> Arc<Self> {
        Arc::new(Self {
            remaining: AtomicUsize::new(endpoints),
            failures: Mutex::new(Vec::new()),
            callback: Mutex::new(Some(callback)),
        })
    }

    pub(crate) fn finish(&self, failure: Option<DeliveryFailure>) {
        if let Some(failure) = failure {
            self.failures
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(failure);
        }
        if self.remaining.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }

        let failures =
            std::mem::take(&mut *self.failures.lock().unwrap_or_else(PoisonError::into_inner));
        let callback = self
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(callback) = callback {
            callback(if failures.is_empty() { Ok(()) } else { Err(failures) });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn failure(uri: &str) -> DeliveryFailure {
        DeliveryFailure {
            uri: uri.into(),
            channel: "c".into(),
            items: 1,
            error_code: "status".into(),
            message: "bad status 500".into(),
        }
    }

    #[test]
    fn fires_after_last_endpoint() {
        let (tx, rx) = mpsc::channel();
        let completion = Completion::new(2, Box::new(move |outcome| tx.send(outcome).unwrap()));

        completion.finish(None);
        assert!(rx.try_recv().is_err());

        completion.finish(None);
        assert_eq!(rx.try_recv().unwrap(), Ok(()));
    }

    #[test]
    fn collects_failures() {
        let (tx, rx) = mpsc::channel();
        let completion = Completion::new(3, Box::new(move |outcome| tx.send(outcome).unwrap()));

        completion.finish(Some(failure("http://a")));
        completion.finish(None);
        completion.finish(Some(failure("http://c")));

        let failures = rx.try_recv().unwrap().unwrap_err();
        let uris: Vec<&str> = failures.iter().map(|f| f.uri.as_str()).collect();
        assert_eq!(uris, vec!["http://a", "http://c"]);
        assert!(rx.try_recv().is_err());
    }
}
