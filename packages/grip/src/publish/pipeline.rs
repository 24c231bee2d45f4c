use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::completion::{Completion, PublishCallback, PublishOutcome};
use super::deliver::send_batch;
use super::request::{Batch, PublishRequest, batches};
use super::sink::{DeliveryFailure, FailureSink};
use crate::config::GripConfig;
use crate::error::PublishError;
use crate::format::{
    Content, HttpResponseFormat, HttpStreamFormat, Item, ItemIds, WebSocketMessageFormat,
};

/// Most requests handled in one wake of the worker.
pub const MAX_CYCLE: usize = 100;

/// A request on the worker queue, with the publish it belongs to.
struct Queued {
    request: PublishRequest,
    completion: Option<Arc<Completion>>,
}

/// Best-effort, batching publisher.
///
/// Construct one per process and share it. Every publish goes to each
/// configured endpoint. The background worker thread is started by the first
/// [`enqueue`](Self::enqueue) and delivers until the publisher is dropped.
/// Failed batches are logged, reported to the failure sink if one is set, and
/// dropped.
pub struct Publisher {
    endpoints: Vec<GripConfig>,
    sink: Option<Arc<dyn FailureSink>>,
    queue: OnceLock<mpsc::UnboundedSender<Queued>>,
    start_lock: Mutex<()>,
    client: OnceLock<reqwest::Client>,
}

impl Publisher {
    /// `endpoints` are the destinations for [`publish`](Self::publish) and friends.
    pub fn new(endpoints: Vec<GripConfig>) -> Self {
        Self {
            endpoints,
            sink: None,
            queue: OnceLock::new(),
            start_lock: Mutex::new(()),
            client: OnceLock::new(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: GripConfig) -> Self {
        self.endpoints.push(endpoint);
        self
    }

    pub fn with_failure_sink(mut self, sink: Arc<dyn FailureSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn endpoints(&self) -> &[GripConfig] {
        &self.endpoints
    }

    /// Whether the worker has been started.
    pub fn is_started(&self) -> bool {
        self.queue.get().is_some()
    }

    /// Queue `request` for delivery. Never touches the network.
    pub fn enqueue(&self, request: PublishRequest) -> Result<(), PublishError> {
        self.push(Queued {
            request,
            completion: None,
        })
    }

    /// Queue `item` for `channel` on every endpoint.
    pub fn publish(&self, channel: &str, item: Item) -> Result<(), PublishError> {
        self.fan_out(channel, &item, None)
    }

    /// Like [`publish`](Self::publish), then run `callback` on the worker thread
    /// once every endpoint has been attempted.
    pub fn publish_with_callback(
        &self,
        channel: &str,
        item: Item,
        callback: impl FnOnce(PublishOutcome) + Send + 'static,
    ) -> Result<(), PublishError> {
        self.fan_out(channel, &item, Some(Box::new(callback)))
    }

    /// Deliver `item` to every endpoint now, bypassing the queue.
    ///
    /// Every endpoint is tried; the first failure is returned.
    pub async fn publish_blocking(&self, channel: &str, item: Item) -> Result<(), PublishError> {
        let requests = self.requests_for(channel, &item)?;
        let client = self.client()?;

        let mut first_err = None;
        for request in requests {
            let batch = Batch::from(request);
            if let Err(e) = send_batch(client, &batch).await {
                warn!("failed to publish to {}/{}: {}", batch.uri, batch.channel, e);
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    pub fn publish_http_response(
        &self,
        channel: &str,
        response: impl Into<Content<HttpResponseFormat>>,
        ids: ItemIds,
    ) -> Result<(), PublishError> {
        self.publish(channel, Item::from_content(response).with_ids(ids))
    }

    pub fn publish_http_stream(
        &self,
        channel: &str,
        stream: impl Into<Content<HttpStreamFormat>>,
        ids: ItemIds,
    ) -> Result<(), PublishError> {
        self.publish(channel, Item::from_content(stream).with_ids(ids))
    }

    pub fn publish_ws_message(
        &self,
        channel: &str,
        message: impl Into<Content<WebSocketMessageFormat>>,
        ids: ItemIds,
    ) -> Result<(), PublishError> {
        self.publish(channel, Item::from_content(message).with_ids(ids))
    }

    /// One request per endpoint. Fails without queueing anything when no
    /// endpoint is configured or one lacks a control uri.
    fn requests_for(&self, channel: &str, item: &Item) -> Result<Vec<PublishRequest>, PublishError> {
        if self.endpoints.is_empty()
            || self.endpoints.iter().any(|e| e.control_uri.is_empty())
        {
            return Err(PublishError::NoControlUri);
        }
        let payload = item.export();
        Ok(self
            .endpoints
            .iter()
            .map(|endpoint| PublishRequest {
                uri: endpoint.control_uri.clone(),
                realm: endpoint.control_iss.clone(),
                secret: endpoint.key.clone(),
                channel: channel.to_string(),
                payload: payload.clone(),
            })
            .collect())
    }

    fn fan_out(
        &self,
        channel: &str,
        item: &Item,
        callback: Option<PublishCallback>,
    ) -> Result<(), PublishError> {
        let requests = self.requests_for(channel, item)?;
        let completion = callback.map(|cb| Completion::new(requests.len(), cb));
        for request in requests {
            self.push(Queued {
                request,
                completion: completion.clone(),
            })?;
        }
        Ok(())
    }

    fn push(&self, queued: Queued) -> Result<(), PublishError> {
        self.sender()?
            .send(queued)
            .map_err(|_| PublishError::WorkerGone)
    }

    fn sender(&self) -> Result<&mpsc::UnboundedSender<Queued>, PublishError> {
        if let Some(tx) = self.queue.get() {
            return Ok(tx);
        }
        let _guard = self.start_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(tx) = self.queue.get() {
            return Ok(tx);
        }
        let tx = spawn_worker(self.sink.clone())?;
        Ok(self.queue.get_or_init(|| tx))
    }

    fn client(&self) -> Result<&reqwest::Client, PublishError> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = reqwest::Client::builder().build()?;
        Ok(self.client.get_or_init(|| client))
    }
}

fn spawn_worker(sink: Option<Arc<dyn FailureSink>>) -> Result<mpsc::UnboundedSender<Queued>, PublishError> {
    let (tx, rx) = mpsc::unbounded_channel();

    std::thread::Builder::new()
        .name("grip-publish".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    error!("publish worker failed to start runtime: {}", e);
                    return;
                }
            };
            runtime.block_on(async move {
                let client = match reqwest::Client::builder().build() {
                    Ok(client) => client,
                    Err(e) => {
                        error!("publish worker failed to build http client: {}", e);
                        return;
                    }
                };
                Worker { client, sink }.run(rx).await;
            });
        })
        .map_err(PublishError::Spawn)?;

    info!("publish worker started");
    Ok(tx)
}

struct Worker {
    client: reqwest::Client,
    sink: Option<Arc<dyn FailureSink>>,
}

impl Worker {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<Queued>) {
        while let Some(queued) = next_cycle(&mut rx).await {
            self.deliver(queued).await;
        }
        info!("publish worker exiting");
    }

    async fn deliver(&self, queued: Vec<Queued>) {
        let (requests, completions): (Vec<_>, Vec<_>) = queued
            .into_iter()
            .map(|q| (q.request, q.completion))
            .unzip();
        let mut completions = completions.into_iter();

        for batch in batches(requests) {
            let failure = match send_batch(&self.client, &batch).await {
                Ok(()) => None,
                Err(e) => {
                    warn!(
                        "failed to publish {} item(s) to {}/{}: {}",
                        batch.items.len(),
                        batch.uri,
                        batch.channel,
                        e
                    );
                    let failure = DeliveryFailure::new(&batch, &e);
                    if let Some(sink) = &self.sink {
                        sink.record(&failure);
                    }
                    Some(failure)
                }
            };
            // batches keep request order, one item per request
            for completion in completions.by_ref().take(batch.items.len()).flatten() {
                completion.finish(failure.clone());
            }
        }
    }
}

/// Wait for one request, then take whatever else is already queued, up to
/// [`MAX_CYCLE`] in total. `None` once every sender is gone and the queue is empty.
async fn next_cycle<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> Option<Vec<T>> {
    let first = rx.recv().await?;
    let mut requests = vec![first];
    while requests.len() < MAX_CYCLE {
        match rx.try_recv() {
            Ok(request) => requests.push(request),
            Err(_) => break,
        }
    }
    Some(requests)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::sink::FailureCounter;
    use crate::token::validate_sig;
    use serde_json::{Value, json};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn req(uri: &str, channel: &str, n: usize) -> PublishRequest {
        PublishRequest {
            uri: uri.into(),
            realm: None,
            secret: None,
            channel: channel.into(),
            payload: json!({"n": n}),
        }
    }

    fn queued(requests: Vec<PublishRequest>) -> Vec<Queued> {
        requests
            .into_iter()
            .map(|request| Queued {
                request,
                completion: None,
            })
            .collect()
    }

    fn worker(sink: Option<Arc<dyn FailureSink>>) -> Worker {
        Worker {
            client: reqwest::Client::new(),
            sink,
        }
    }

    async fn ok_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn cycle_takes_at_most_max() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        for n in 0..MAX_CYCLE + 5 {
            tx.send(req("http://h", "a", n)).unwrap();
        }

        let first = next_cycle(&mut rx).await.unwrap();
        assert_eq!(first.len(), MAX_CYCLE);
        assert_eq!(first[0].payload, json!({"n": 0}));

        let second = next_cycle(&mut rx).await.unwrap();
        assert_eq!(second.len(), 5);
        assert_eq!(second[0].payload, json!({"n": MAX_CYCLE}));
    }

    #[tokio::test]
    async fn cycle_ends_when_senders_dropped() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(req("http://h", "a", 0)).unwrap();
        drop(tx);
        assert_eq!(next_cycle(&mut rx).await.unwrap().len(), 1);
        assert!(next_cycle(&mut rx).await.is_none());
    }

    #[tokio::test]
    async fn deliver_batches_adjacent_requests() {
        let server = ok_server().await;
        let uri = server.uri();

        worker(None)
            .deliver(queued(vec![
                req(&uri, "a", 1),
                req(&uri, "a", 2),
                req(&uri, "b", 3),
                req(&uri, "a", 4),
            ]))
            .await;

        let received = server.received_requests().await.unwrap();
        assert_eq!(received.len(), 3);

        let paths: Vec<&str> = received.iter().map(|r| r.url.path()).collect();
        assert_eq!(paths, vec!["/publish/a/", "/publish/b/", "/publish/a/"]);

        let items: Vec<Value> = received
            .iter()
            .map(|r| r.body_json::<Value>().unwrap()["items"].clone())
            .collect();
        assert_eq!(items[0], json!([{"n": 1}, {"n": 2}]));
        assert_eq!(items[1], json!([{"n": 3}]));
        assert_eq!(items[2], json!([{"n": 4}]));

        assert!(received[0].headers.get("authorization").is_none());
        assert_eq!(
            received[0].headers.get("content-type").unwrap(),
            "application/json"
        );
    }

    #[tokio::test]
    async fn deliver_signs_when_realm_set() {
        let server = ok_server().await;
        let mut request = req(&server.uri(), "a", 1);
        request.realm = Some("realm".into());
        request.secret = Some(b"secret".to_vec());

        worker(None).deliver(queued(vec![request])).await;

        let received = server.received_requests().await.unwrap();
        let auth = received[0]
            .headers
            .get("authorization")
            .unwrap()
            .to_str()
            .unwrap();
        let token = auth.strip_prefix("Bearer ").unwrap();
        assert!(validate_sig(token, b"secret"));
    }

    #[tokio::test]
    async fn failures_are_reported_and_dropped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/publish/broken/"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/publish/fine/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        let uri = server.uri();

        let counter = Arc::new(FailureCounter::new());
        worker(Some(counter.clone() as Arc<dyn FailureSink>))
            .deliver(queued(vec![
                req(&uri, "broken", 1),
                req(&uri, "broken", 2),
                req(&uri, "fine", 3),
            ]))
            .await;

        assert_eq!(counter.count(), 1);
        let failure = counter.last().unwrap();
        assert_eq!(failure.channel, "broken");
        assert_eq!(failure.items, 2);
        assert_eq!(failure.error_code, "status");

        // the later batch still went out
        let received = server.received_requests().await.unwrap();
        assert_eq!(received.len(), 2);
        assert_eq!(received[1].url.path(), "/publish/fine/");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_reported() {
        let counter = Arc::new(FailureCounter::new());
        worker(Some(counter.clone() as Arc<dyn FailureSink>))
            .deliver(queued(vec![req("http://127.0.0.1:1", "a", 1)]))
            .await;
        assert_eq!(counter.count(), 1);
        assert_eq!(counter.last().unwrap().error_code, "http");
    }

    #[tokio::test]
    async fn completions_follow_their_batches() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/publish/broken/"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/publish/fine/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        let uri = server.uri();

        let (tx, rx) = std::sync::mpsc::channel();
        let outcome = |name: &'static str| {
            let tx = tx.clone();
            Completion::new(1, Box::new(move |result| tx.send((name, result)).unwrap()))
        };
        let requests = vec![
            Queued {
                request: req(&uri, "fine", 1),
                completion: Some(outcome("first")),
            },
            Queued {
                request: req(&uri, "fine", 2),
                completion: None,
            },
            Queued {
                request: req(&uri, "broken", 3),
                completion: Some(outcome("second")),
            },
        ];
        worker(None).deliver(requests).await;

        let (name, first) = rx.try_recv().unwrap();
        assert_eq!((name, first), ("first", Ok(())));
        let (name, second) = rx.try_recv().unwrap();
        assert_eq!(name, "second");
        let failures = second.unwrap_err();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].channel, "broken");
    }

    #[test]
    fn publish_requires_endpoints() {
        let publisher = Publisher::new(Vec::new());
        let err = publisher
            .publish("c", Item::new(HttpStreamFormat::Close))
            .unwrap_err();
        assert!(matches!(err, PublishError::NoControlUri));
        assert!(!publisher.is_started());

        let partial = Publisher::new(vec![
            GripConfig {
                control_uri: "http://h".into(),
                ..Default::default()
            },
            GripConfig::default(),
        ]);
        assert!(matches!(
            partial.publish("c", Item::new(HttpStreamFormat::Close)),
            Err(PublishError::NoControlUri)
        ));
        assert!(!partial.is_started());
    }
}
