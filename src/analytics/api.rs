use std::fmt;
use std::sync::Arc;

use crate::analytics::builder::{HitBuilder, SessionFields};
use crate::analytics::config::ClientConfig;
use crate::analytics::dispatch::{DispatchPolicy, Dispatcher};
use crate::analytics::error::AnalyticsResult;
use crate::analytics::hit::{AppViewHit, DimensionValues, EventHit, Hit, ItemHit, Referrer, TimingHit};
use crate::analytics::params::ParameterMap;
use crate::analytics::transport::{HttpPostSender, ReqwestSender};
use crate::analytics::wrappers::{DefaultDimensions, DefaultReferrer};

/// The capability shared by live clients, test doubles and decorators.
///
/// Every method returns once the hit has been handed off; network delivery is never awaited
/// and never reported back. Errors describe hits that could not be encoded.
pub trait AnalyticsClient: Send + Sync {
    /// Posts an event.
    fn event(&self, hit: EventHit) -> AnalyticsResult<()>;

    /// Registers an app view that shows up under the screens report.
    fn app_view(&self, hit: AppViewHit) -> AnalyticsResult<()>;

    /// Registers an item purchase.
    fn item(&self, hit: ItemHit) -> AnalyticsResult<()>;

    /// Reports a user timing sample.
    fn timing(&self, hit: TimingHit) -> AnalyticsResult<()>;

    fn record(&self, hit: Hit) -> AnalyticsResult<()> {
        match hit {
            Hit::Event(hit) => self.event(hit),
            Hit::AppView(hit) => self.app_view(hit),
            Hit::Item(hit) => self.item(hit),
            Hit::Timing(hit) => self.timing(hit),
        }
    }
}

macro_rules! forward_client {
    ($($wrapper:ty),* $(,)?) => {
        $(
            impl<C: AnalyticsClient + ?Sized> AnalyticsClient for $wrapper {
                fn event(&self, hit: EventHit) -> AnalyticsResult<()> {
                    (**self).event(hit)
                }

                fn app_view(&self, hit: AppViewHit) -> AnalyticsResult<()> {
                    (**self).app_view(hit)
                }

                fn item(&self, hit: ItemHit) -> AnalyticsResult<()> {
                    (**self).item(hit)
                }

                fn timing(&self, hit: TimingHit) -> AnalyticsResult<()> {
                    (**self).timing(hit)
                }
            }
        )*
    };
}

forward_client!(&C, Box<C>, Arc<C>);

/// Decorator shorthands available on every client.
pub trait AnalyticsClientExt: AnalyticsClient + Sized {
    /// Dimensions that are added to every hit. Values set on the hit itself take precedence.
    fn with_base_dimensions(self, dimensions: DimensionValues) -> DefaultDimensions<Self> {
        DefaultDimensions::new(self, dimensions)
    }

    /// Attaches `referrer` to hits that do not carry one.
    fn with_default_referrer(self, referrer: Referrer) -> DefaultReferrer<Self> {
        DefaultReferrer::new(self, referrer)
    }
}

impl<C: AnalyticsClient> AnalyticsClientExt for C {}

/// Client that encodes hits and posts them to the collection endpoint.
#[derive(Clone)]
pub struct LiveClient {
    inner: Arc<LiveClientInner>,
}

struct LiveClientInner {
    builder: HitBuilder,
    dispatcher: Dispatcher,
}

impl fmt::Debug for LiveClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveClient")
            .field("client_id", &self.inner.builder.session().client_id)
            .field("endpoint", &self.inner.dispatcher.endpoint())
            .field("policy", &self.inner.dispatcher.policy())
            .finish()
    }
}

impl LiveClient {
    /// Creates a client that posts through `reqwest`.
    pub fn new(config: ClientConfig) -> AnalyticsResult<Self> {
        Self::with_sender(config, Arc::new(ReqwestSender::new()?))
    }

    /// Creates a client that hands requests to a custom transport.
    pub fn with_sender(config: ClientConfig, sender: Arc<dyn HttpPostSender>) -> AnalyticsResult<Self> {
        config.validate()?;

        let session = SessionFields {
            client_id: config.client_id().to_string(),
            app_name: config.app_name().to_string(),
            app_version: config.app_version().to_string(),
            screen_resolution: config.screen_resolution(),
        };
        let builder = HitBuilder::new(
            session,
            config.metric_registry().cloned(),
            config.dimension_registry().cloned(),
        );
        let dispatcher = Dispatcher::new(
            config.endpoint().resolve(),
            config.tracking_ids().to_vec(),
            config.headers().clone(),
            sender,
            config.dispatch_policy(),
        );
        log::debug!(
            "measurement client ready: endpoint={}, tracking ids={:?}, policy={:?}",
            dispatcher.endpoint(),
            config.tracking_ids(),
            dispatcher.policy()
        );

        Ok(Self {
            inner: Arc::new(LiveClientInner { builder, dispatcher }),
        })
    }

    /// Screen name reported with every hit, as set by the most recent app view.
    pub fn current_screen(&self) -> String {
        self.inner.builder.current_screen()
    }

    pub fn dispatch_policy(&self) -> DispatchPolicy {
        self.inner.dispatcher.policy()
    }

    fn send(&self, params: AnalyticsResult<ParameterMap>) -> AnalyticsResult<()> {
        let params = params?;
        self.inner.dispatcher.dispatch(&params);
        Ok(())
    }
}

impl AnalyticsClient for LiveClient {
    fn event(&self, hit: EventHit) -> AnalyticsResult<()> {
        self.send(self.inner.builder.event(&hit))
    }

    fn app_view(&self, hit: AppViewHit) -> AnalyticsResult<()> {
        self.send(self.inner.builder.app_view(&hit))
    }

    fn item(&self, hit: ItemHit) -> AnalyticsResult<()> {
        self.send(self.inner.builder.item(&hit))
    }

    fn timing(&self, hit: TimingHit) -> AnalyticsResult<()> {
        self.send(self.inner.builder.timing(&hit))
    }
}
