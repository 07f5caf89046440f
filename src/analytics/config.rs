use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;

use crate::analytics::dispatch::DispatchPolicy;
use crate::analytics::error::{invalid_argument, AnalyticsResult};
use crate::analytics::keys::{DimensionRegistry, MetricRegistry};

/// Environment variable that, when set, replaces the configured collection URL.
pub const ENDPOINT_OVERRIDE_ENV: &str = "MEASUREMENT_PROTOCOL_ENDPOINT";

/// Supported collection endpoints.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CollectEndpoint {
    /// Production collection endpoint: <http://www.google-analytics.com/collect>
    #[default]
    Collect,
    /// Validation endpoint: <https://www.google-analytics.com/debug/collect>
    DebugCollect,
    /// Custom endpoint (proxies, tests).
    Custom(String),
}

impl CollectEndpoint {
    pub fn as_str(&self) -> &str {
        match self {
            CollectEndpoint::Collect => "http://www.google-analytics.com/collect",
            CollectEndpoint::DebugCollect => "https://www.google-analytics.com/debug/collect",
            CollectEndpoint::Custom(url) => url,
        }
    }

    /// The URL requests are posted to, honoring [`ENDPOINT_OVERRIDE_ENV`].
    pub(crate) fn resolve(&self) -> String {
        self.resolve_with(std::env::var(ENDPOINT_OVERRIDE_ENV).ok())
    }

    fn resolve_with(&self, override_url: Option<String>) -> String {
        match override_url {
            Some(url) if !url.trim().is_empty() => url,
            _ => self.as_str().to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ScreenResolution {
    pub width: u32,
    pub height: u32,
}

impl ScreenResolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for ScreenResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Construction-time configuration for a [`LiveClient`](crate::analytics::LiveClient).
#[derive(Clone, Debug)]
pub struct ClientConfig {
    tracking_ids: Vec<String>,
    client_id: String,
    app_name: String,
    app_version: String,
    endpoint: CollectEndpoint,
    metrics: Option<MetricRegistry>,
    dimensions: Option<DimensionRegistry>,
    screen_resolution: ScreenResolution,
    headers: BTreeMap<String, String>,
    dispatch_policy: DispatchPolicy,
}

impl ClientConfig {
    /// `tracking_ids` are the properties every hit is reported to; one request is sent per id.
    pub fn new<I, S>(
        tracking_ids: I,
        client_id: impl Into<String>,
        app_name: impl Into<String>,
        app_version: impl Into<String>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tracking_ids: tracking_ids.into_iter().map(Into::into).collect(),
            client_id: client_id.into(),
            app_name: app_name.into(),
            app_version: app_version.into(),
            endpoint: CollectEndpoint::default(),
            metrics: None,
            dimensions: None,
            screen_resolution: ScreenResolution::default(),
            headers: BTreeMap::new(),
            dispatch_policy: DispatchPolicy::for_current_target(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: CollectEndpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn with_metric_registry(mut self, registry: MetricRegistry) -> Self {
        self.metrics = Some(registry);
        self
    }

    pub fn with_dimension_registry(mut self, registry: DimensionRegistry) -> Self {
        self.dimensions = Some(registry);
        self
    }

    pub fn with_screen_resolution(mut self, resolution: ScreenResolution) -> Self {
        self.screen_resolution = resolution;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_user_agent(self, user_agent: impl Into<String>) -> Self {
        self.with_header("User-Agent", user_agent)
    }

    /// Overrides the policy picked for the compilation target.
    pub fn with_dispatch_policy(mut self, policy: DispatchPolicy) -> Self {
        self.dispatch_policy = policy;
        self
    }

    pub fn tracking_ids(&self) -> &[String] {
        &self.tracking_ids
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn app_version(&self) -> &str {
        &self.app_version
    }

    pub fn endpoint(&self) -> &CollectEndpoint {
        &self.endpoint
    }

    pub fn screen_resolution(&self) -> ScreenResolution {
        self.screen_resolution
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn dispatch_policy(&self) -> DispatchPolicy {
        self.dispatch_policy
    }

    pub(crate) fn metric_registry(&self) -> Option<&MetricRegistry> {
        self.metrics.as_ref()
    }

    pub(crate) fn dimension_registry(&self) -> Option<&DimensionRegistry> {
        self.dimensions.as_ref()
    }

    pub(crate) fn validate(&self) -> AnalyticsResult<()> {
        if self.tracking_ids.is_empty() {
            return Err(invalid_argument("at least one tracking id is required"));
        }
        if self.tracking_ids.iter().any(|id| id.trim().is_empty()) {
            return Err(invalid_argument("tracking ids must not be empty"));
        }
        if self.client_id.trim().is_empty() {
            return Err(invalid_argument("client id must not be empty"));
        }
        check_length("app name", &self.app_name, crate::analytics::builder::MAX_APP_FIELD_LENGTH)?;
        check_length(
            "app version",
            &self.app_version,
            crate::analytics::builder::MAX_APP_FIELD_LENGTH,
        )?;
        Ok(())
    }
}

fn check_length(name: &str, value: &str, max_len: usize) -> AnalyticsResult<()> {
    if value.len() > max_len {
        return Err(invalid_argument(format!(
            "{name} cannot exceed {max_len} bytes, but it was {} bytes: {value}",
            value.len()
        )));
    }
    Ok(())
}

/// Serializable subset of [`ClientConfig`], e.g. loaded from a bundled JSON file.
///
/// Registries and dispatch policy are code-level concerns and are attached to the resulting
/// config afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSettings {
    pub tracking_ids: Vec<String>,
    pub client_id: String,
    pub app_name: String,
    pub app_version: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub screen_resolution: Option<ScreenResolution>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl ClientSettings {
    pub fn from_json_str(raw: &str) -> AnalyticsResult<Self> {
        serde_json::from_str(raw)
            .map_err(|err| invalid_argument(format!("invalid client settings: {err}")))
    }

    pub fn into_config(self) -> ClientConfig {
        let mut config = ClientConfig::new(
            self.tracking_ids,
            self.client_id,
            self.app_name,
            self.app_version,
        );
        if let Some(endpoint) = self.endpoint {
            config = config.with_endpoint(CollectEndpoint::Custom(endpoint));
        }
        if let Some(resolution) = self.screen_resolution {
            config = config.with_screen_resolution(resolution);
        }
        if let Some(user_agent) = self.user_agent {
            config = config.with_user_agent(user_agent);
        }
        config
    }
}

/// Generates a random version 4 UUID suitable as an anonymous client id.
///
/// Persist the value so the same device keeps reporting under one id.
pub fn random_client_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
