mod api;
pub mod builder;
mod config;
mod dispatch;
pub mod error;
mod hit;
mod keys;
mod params;
mod transport;
mod wrappers;

pub use api::{AnalyticsClient, AnalyticsClientExt, LiveClient};
pub use builder::{HitBuilder, SessionFields};
pub use config::{
    random_client_id, ClientConfig, ClientSettings, CollectEndpoint, ScreenResolution,
    ENDPOINT_OVERRIDE_ENV,
};
pub use dispatch::{DispatchPolicy, Dispatcher};
pub use error::{AnalyticsError, AnalyticsErrorCode, AnalyticsResult};
pub use hit::{
    AppViewHit, DimensionValues, EventHit, Hit, HitFields, ItemHit, MetricValues, Referrer,
    TimingHit,
};
pub use keys::{
    DimensionKey, DimensionRegistry, IndexRegistry, IndexedKey, MetricKey, MetricRegistry,
};
pub use params::ParameterMap;
pub use transport::{HttpPostSender, HttpRequest, ReqwestSender, FORM_CONTENT_TYPE};
pub use wrappers::{
    DefaultDimensions, DefaultReferrer, LoggingClient, MultiClient, NoOpClient, RecordedHits,
    RecordingClient,
};
