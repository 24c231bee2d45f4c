//! Asynchronous, batching delivery of published items to proxy control endpoints.
//!
//! ```text
//! Publisher::publish ──► one request per endpoint ──► unbounded queue ──► worker thread
//!                                                       │ wait for 1, drain up to 99 more
//!                                                       │ group adjacent same-destination requests
//!                                                       └► POST <uri>/publish/<channel>/ {"items": [...]}
//! ```
//!
//! Delivery is best-effort: no retries, ordering only within one destination.
//! [`Publisher::publish_blocking`] skips the queue and reports the result directly.

mod completion;
mod deliver;
mod pipeline;
mod request;
mod sink;

pub use completion::{PublishCallback, PublishOutcome};
pub use deliver::send_batch;
pub use pipeline::{MAX_CYCLE, Publisher};
pub use request::{Batch, PublishRequest, batches};
pub use sink::{DeliveryFailure, FailureCounter, FailureSink};
