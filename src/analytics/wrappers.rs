//! Clients that wrap, replace or multiplex other clients.

use std::sync::{Arc, Mutex, PoisonError};

use crate::analytics::api::AnalyticsClient;
use crate::analytics::error::{multiple, AnalyticsResult};
use crate::analytics::hit::{
    AppViewHit, DimensionValues, EventHit, HitFields, ItemHit, Referrer, TimingHit,
};

/// Applies one hit transformation in every capability method, then delegates to `self.inner`.
macro_rules! decorate_client {
    ($decorator:ident, $transform:ident) => {
        impl<C: AnalyticsClient> AnalyticsClient for $decorator<C> {
            fn event(&self, hit: EventHit) -> AnalyticsResult<()> {
                self.inner.event(self.$transform(hit))
            }

            fn app_view(&self, hit: AppViewHit) -> AnalyticsResult<()> {
                self.inner.app_view(self.$transform(hit))
            }

            fn item(&self, hit: ItemHit) -> AnalyticsResult<()> {
                self.inner.item(self.$transform(hit))
            }

            fn timing(&self, hit: TimingHit) -> AnalyticsResult<()> {
                self.inner.timing(self.$transform(hit))
            }
        }
    };
}

/// Discards every hit without looking at it. Used when telemetry is disabled.
///
/// Malformed hits are accepted too, since nothing is encoded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NoOpClient;

impl AnalyticsClient for NoOpClient {
    fn event(&self, _hit: EventHit) -> AnalyticsResult<()> {
        Ok(())
    }

    fn app_view(&self, _hit: AppViewHit) -> AnalyticsResult<()> {
        Ok(())
    }

    fn item(&self, _hit: ItemHit) -> AnalyticsResult<()> {
        Ok(())
    }

    fn timing(&self, _hit: TimingHit) -> AnalyticsResult<()> {
        Ok(())
    }
}

/// Hits received by a [`RecordingClient`], per hit type, in arrival order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordedHits {
    pub events: Vec<EventHit>,
    pub app_views: Vec<AppViewHit>,
    pub items: Vec<ItemHit>,
    pub timings: Vec<TimingHit>,
}

/// Append-only in-memory client for asserting on what a decorator chain produced.
///
/// Clones share the same log.
#[derive(Clone, Debug, Default)]
pub struct RecordingClient {
    hits: Arc<Mutex<RecordedHits>>,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> RecordedHits {
        self.with_hits(|hits| hits.clone())
    }

    pub fn events(&self) -> Vec<EventHit> {
        self.with_hits(|hits| hits.events.clone())
    }

    pub fn app_views(&self) -> Vec<AppViewHit> {
        self.with_hits(|hits| hits.app_views.clone())
    }

    pub fn items(&self) -> Vec<ItemHit> {
        self.with_hits(|hits| hits.items.clone())
    }

    pub fn timings(&self) -> Vec<TimingHit> {
        self.with_hits(|hits| hits.timings.clone())
    }

    pub fn clear(&self) {
        self.with_hits(|hits| *hits = RecordedHits::default());
    }

    fn with_hits<T>(&self, f: impl FnOnce(&mut RecordedHits) -> T) -> T {
        let mut hits = self.hits.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut hits)
    }
}

impl AnalyticsClient for RecordingClient {
    fn event(&self, hit: EventHit) -> AnalyticsResult<()> {
        self.with_hits(|hits| hits.events.push(hit));
        Ok(())
    }

    fn app_view(&self, hit: AppViewHit) -> AnalyticsResult<()> {
        self.with_hits(|hits| hits.app_views.push(hit));
        Ok(())
    }

    fn item(&self, hit: ItemHit) -> AnalyticsResult<()> {
        self.with_hits(|hits| hits.items.push(hit));
        Ok(())
    }

    fn timing(&self, hit: TimingHit) -> AnalyticsResult<()> {
        self.with_hits(|hits| hits.timings.push(hit));
        Ok(())
    }
}

/// Writes every hit to the `log` facade instead of sending it.
#[derive(Clone, Copy, Debug)]
pub struct LoggingClient {
    level: log::Level,
}

impl LoggingClient {
    pub const DEFAULT_LEVEL: log::Level = log::Level::Debug;

    pub fn new(level: log::Level) -> Self {
        Self { level }
    }

    fn log(&self, hit: &dyn std::fmt::Debug) {
        if log::log_enabled!(self.level) {
            log::log!(self.level, "[measurement] {hit:?}");
        }
    }
}

impl Default for LoggingClient {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LEVEL)
    }
}

impl AnalyticsClient for LoggingClient {
    fn event(&self, hit: EventHit) -> AnalyticsResult<()> {
        self.log(&hit);
        Ok(())
    }

    fn app_view(&self, hit: AppViewHit) -> AnalyticsResult<()> {
        self.log(&hit);
        Ok(())
    }

    fn item(&self, hit: ItemHit) -> AnalyticsResult<()> {
        self.log(&hit);
        Ok(())
    }

    fn timing(&self, hit: TimingHit) -> AnalyticsResult<()> {
        self.log(&hit);
        Ok(())
    }
}

/// Sends every hit to each listed client, in list order.
///
/// A failing client does not stop the fan-out. Once every client has been called, the failures
/// are returned together (see [`multiple`](crate::analytics::error::multiple)).
#[derive(Clone, Default)]
pub struct MultiClient {
    clients: Vec<Arc<dyn AnalyticsClient>>,
}

impl MultiClient {
    pub fn new(clients: Vec<Arc<dyn AnalyticsClient>>) -> Self {
        Self { clients }
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    fn fan_out<H: Clone>(
        &self,
        hit: H,
        call: impl Fn(&dyn AnalyticsClient, H) -> AnalyticsResult<()>,
    ) -> AnalyticsResult<()> {
        let mut errors = Vec::new();
        for (position, client) in self.clients.iter().enumerate() {
            if let Err(err) = call(client.as_ref(), hit.clone()) {
                log::warn!("analytics client #{position} rejected hit: {err}");
                errors.push(err);
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(multiple(errors))
        }
    }
}

impl std::fmt::Debug for MultiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiClient")
            .field("clients", &self.clients.len())
            .finish()
    }
}

impl AnalyticsClient for MultiClient {
    fn event(&self, hit: EventHit) -> AnalyticsResult<()> {
        self.fan_out(hit, |client, hit| client.event(hit))
    }

    fn app_view(&self, hit: AppViewHit) -> AnalyticsResult<()> {
        self.fan_out(hit, |client, hit| client.app_view(hit))
    }

    fn item(&self, hit: ItemHit) -> AnalyticsResult<()> {
        self.fan_out(hit, |client, hit| client.item(hit))
    }

    fn timing(&self, hit: TimingHit) -> AnalyticsResult<()> {
        self.fan_out(hit, |client, hit| client.timing(hit))
    }
}

/// Merges a fixed dimension set into every hit. Dimensions already on the hit win.
#[derive(Clone, Debug)]
pub struct DefaultDimensions<C> {
    inner: C,
    dimensions: DimensionValues,
}

impl<C> DefaultDimensions<C> {
    pub fn new(inner: C, dimensions: DimensionValues) -> Self {
        Self { inner, dimensions }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn dimensions(&self) -> &DimensionValues {
        &self.dimensions
    }

    fn merge<H: HitFields>(&self, mut hit: H) -> H {
        let mut merged = self.dimensions.clone();
        merged.append(hit.dimensions_mut());
        *hit.dimensions_mut() = merged;
        hit
    }
}

decorate_client!(DefaultDimensions, merge);

/// Supplies a fallback referrer to hits that carry none.
#[derive(Clone, Debug)]
pub struct DefaultReferrer<C> {
    inner: C,
    referrer: Referrer,
}

impl<C> DefaultReferrer<C> {
    pub fn new(inner: C, referrer: Referrer) -> Self {
        Self { inner, referrer }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn referrer(&self) -> &Referrer {
        &self.referrer
    }

    fn fill<H: HitFields>(&self, mut hit: H) -> H {
        if hit.referrer().is_none() {
            *hit.referrer_mut() = Some(self.referrer.clone());
        }
        hit
    }
}

decorate_client!(DefaultReferrer, fill);
