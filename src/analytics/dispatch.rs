//! Fans a finished parameter map out to every tracking id.
//!
//! Requests are fire-and-forget: [`Dispatcher::dispatch`] returns once every request has been
//! handed to the runtime, and transport failures are only logged.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, LazyLock};

use bytes::Bytes;

use crate::analytics::params::ParameterMap;
use crate::analytics::transport::{HttpPostSender, HttpRequest};
use crate::platform::runtime;

/// How outbound requests are scheduled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchPolicy {
    /// Every request runs as its own task, with no ordering between them.
    Concurrent,
    /// Every request in the process goes through one FIFO queue with at most one request in
    /// flight. Required on targets whose HTTP stack crashes under concurrent requests.
    Serial,
}

impl DispatchPolicy {
    pub const fn for_current_target() -> Self {
        if cfg!(target_os = "ios") {
            DispatchPolicy::Serial
        } else {
            DispatchPolicy::Concurrent
        }
    }
}

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Process-wide serial queue shared by every client using [`DispatchPolicy::Serial`].
///
/// The worker lives on the background runtime so it survives the runtime of whichever caller
/// happened to start it. Each job runs as its own task, so a panicking transport only loses
/// its own request.
static SERIAL_QUEUE: LazyLock<async_channel::Sender<Job>> = LazyLock::new(|| {
    let (jobs, pending) = async_channel::unbounded::<Job>();
    runtime::spawn_background(async move {
        while let Ok(job) = pending.recv().await {
            if let Err(err) = tokio::spawn(job).await {
                log::debug!("serial dispatch job aborted: {err}");
            }
        }
    });
    jobs
});

fn enqueue_serial(job: Job) {
    // The receiver is owned by a worker that never exits, so this only fails if the
    // background runtime could not be built.
    if SERIAL_QUEUE.try_send(job).is_err() {
        log::warn!("serial dispatch queue is closed; dropping request");
    }
}

pub struct Dispatcher {
    endpoint: String,
    tracking_ids: Vec<String>,
    headers: BTreeMap<String, String>,
    sender: Arc<dyn HttpPostSender>,
    policy: DispatchPolicy,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("endpoint", &self.endpoint)
            .field("tracking_ids", &self.tracking_ids)
            .field("policy", &self.policy)
            .finish()
    }
}

impl Dispatcher {
    pub fn new(
        endpoint: impl Into<String>,
        tracking_ids: Vec<String>,
        headers: BTreeMap<String, String>,
        sender: Arc<dyn HttpPostSender>,
        policy: DispatchPolicy,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            tracking_ids,
            headers,
            sender,
            policy,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn policy(&self) -> DispatchPolicy {
        self.policy
    }

    /// Starts one request per tracking id, each carrying `params` plus its `tid`. Returns the
    /// number of requests started.
    pub fn dispatch(&self, params: &ParameterMap) -> usize {
        for tracking_id in &self.tracking_ids {
            let request = self.request_for(params, tracking_id);
            log::debug!(
                "posting hit to {}: {}",
                request.url,
                request.body_text()
            );

            let sender = Arc::clone(&self.sender);
            let job = async move {
                if let Err(err) = sender.post(request).await {
                    log::debug!("measurement protocol request failed: {err}");
                }
            };
            match self.policy {
                DispatchPolicy::Concurrent => runtime::spawn_detached(job),
                DispatchPolicy::Serial => enqueue_serial(Box::pin(job)),
            }
        }
        self.tracking_ids.len()
    }

    fn request_for(&self, params: &ParameterMap, tracking_id: &str) -> HttpRequest {
        let mut fields = params.clone();
        fields.insert("tid", tracking_id);
        HttpRequest {
            url: self.endpoint.clone(),
            headers: self.headers.clone(),
            body: Bytes::from(fields.to_form_body()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingSender;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn params() -> ParameterMap {
        [("v", "1"), ("t", "event"), ("ec", "menu")].into_iter().collect()
    }

    fn dispatcher(sender: Arc<dyn HttpPostSender>, policy: DispatchPolicy) -> Dispatcher {
        Dispatcher::new(
            "http://localhost/collect",
            vec!["UA-1".into(), "UA-2".into()],
            BTreeMap::from([("User-Agent".to_string(), "agent".to_string())]),
            sender,
            policy,
        )
    }

    #[tokio::test(flavor = "current_thread")]
    async fn one_request_per_tracking_id() {
        let sender = RecordingSender::default();
        let started = dispatcher(Arc::new(sender.clone()), DispatchPolicy::Concurrent).dispatch(&params());
        assert_eq!(started, 2);

        let mut requests = sender.wait_for(2).await;
        requests.sort_by_key(|request| request.body_text());
        assert_eq!(requests[0].body_text(), "ec=menu&t=event&tid=UA-1&v=1");
        assert_eq!(requests[1].body_text(), "ec=menu&t=event&tid=UA-2&v=1");
        for request in &requests {
            assert_eq!(request.url, "http://localhost/collect");
            assert_eq!(request.headers.get("User-Agent").map(String::as_str), Some("agent"));
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn transport_failures_are_swallowed() {
        let sender = RecordingSender::failing();
        let started = dispatcher(Arc::new(sender.clone()), DispatchPolicy::Concurrent).dispatch(&params());
        assert_eq!(started, 2);
        assert_eq!(sender.wait_for(2).await.len(), 2);
    }

    /// Tracks how many posts overlap and the order they started in.
    #[derive(Default)]
    struct OverlapSender {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        started: std::sync::Mutex<Vec<String>>,
        done: RecordingSender,
    }

    #[async_trait::async_trait]
    impl HttpPostSender for OverlapSender {
        async fn post(&self, request: HttpRequest) -> crate::analytics::AnalyticsResult<()> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.started.lock().unwrap().push(request.body_text());
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.done.post(request).await
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn serial_policy_runs_one_request_at_a_time_in_order() {
        let sender = Arc::new(OverlapSender::default());
        let first = dispatcher(sender.clone(), DispatchPolicy::Serial);
        let second = Dispatcher::new(
            "http://localhost/collect",
            vec!["UA-3".into()],
            BTreeMap::new(),
            sender.clone(),
            DispatchPolicy::Serial,
        );

        first.dispatch(&params());
        second.dispatch(&params());

        sender.done.wait_for(3).await;
        assert_eq!(sender.max_in_flight.load(Ordering::SeqCst), 1);
        let started = sender.started.lock().unwrap().clone();
        let tids: Vec<_> = started
            .iter()
            .map(|body| body.split('&').find(|field| field.starts_with("tid=")).unwrap().to_string())
            .collect();
        assert_eq!(tids, ["tid=UA-1", "tid=UA-2", "tid=UA-3"]);
    }

    struct PanickingSender;

    #[async_trait::async_trait]
    impl HttpPostSender for PanickingSender {
        async fn post(&self, _request: HttpRequest) -> crate::analytics::AnalyticsResult<()> {
            panic!("transport failed hard");
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn serial_queue_keeps_running_after_a_panicking_transport() {
        let broken = Dispatcher::new(
            "http://localhost/collect",
            vec!["UA-9".into()],
            BTreeMap::new(),
            Arc::new(PanickingSender),
            DispatchPolicy::Serial,
        );
        broken.dispatch(&params());

        let sender = RecordingSender::default();
        let healthy = Dispatcher::new(
            "http://localhost/collect",
            vec!["UA-10".into()],
            BTreeMap::new(),
            Arc::new(sender.clone()),
            DispatchPolicy::Serial,
        );
        assert_eq!(healthy.dispatch(&params()), 1);

        let requests = sender.wait_for(1).await;
        assert_eq!(requests[0].body_text(), "ec=menu&t=event&tid=UA-10&v=1");
    }

    #[test]
    fn policy_matches_target() {
        let expected = if cfg!(target_os = "ios") {
            DispatchPolicy::Serial
        } else {
            DispatchPolicy::Concurrent
        };
        assert_eq!(DispatchPolicy::for_current_target(), expected);
    }
}
