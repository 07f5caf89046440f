use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::analytics::error::{network_error, AnalyticsResult};
use crate::analytics::{HttpPostSender, HttpRequest};

/// [`HttpPostSender`] that keeps every request and signals each arrival.
#[derive(Clone)]
pub struct RecordingSender {
    requests: Arc<Mutex<Vec<HttpRequest>>>,
    arrivals: (async_channel::Sender<()>, async_channel::Receiver<()>),
    fail: bool,
}

impl Default for RecordingSender {
    fn default() -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            arrivals: async_channel::unbounded(),
            fail: false,
        }
    }
}

impl RecordingSender {
    /// Records requests like the default sender, then reports a network error for each.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Waits until at least `count` requests arrived. Panics after five seconds.
    pub async fn wait_for(&self, count: usize) -> Vec<HttpRequest> {
        let wait = async {
            while self.requests.lock().unwrap().len() < count {
                if self.arrivals.1.recv().await.is_err() {
                    break;
                }
            }
        };
        if tokio::time::timeout(Duration::from_secs(5), wait).await.is_err() {
            panic!(
                "expected {count} requests, got {}",
                self.requests.lock().unwrap().len()
            );
        }
        self.requests()
    }
}

#[async_trait]
impl HttpPostSender for RecordingSender {
    async fn post(&self, request: HttpRequest) -> AnalyticsResult<()> {
        self.requests.lock().unwrap().push(request);
        let _ = self.arrivals.0.send(()).await;
        if self.fail {
            return Err(network_error("simulated transport failure"));
        }
        Ok(())
    }
}
