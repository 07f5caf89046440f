//! Typed hits accepted by every [`AnalyticsClient`](crate::analytics::AnalyticsClient).
//!
//! Hits are plain values. Constructing one never validates it; required-field checks run when a
//! live client turns the hit into wire parameters, so disabled clients accept anything.

use std::collections::BTreeMap;

use crate::analytics::keys::{DimensionKey, MetricKey};

pub type MetricValues = BTreeMap<MetricKey, u32>;
pub type DimensionValues = BTreeMap<DimensionKey, String>;

/// Traffic source attribution attached to a hit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Referrer {
    /// Referral source URL (`dr`).
    pub document_referrer: Option<String>,
    pub campaign_name: Option<String>,
    pub campaign_source: Option<String>,
    pub campaign_medium: Option<String>,
    pub campaign_keyword: Option<String>,
    pub campaign_content: Option<String>,
    pub campaign_id: Option<String>,
}

impl Referrer {
    /// Reads the `utm_*` campaign parameters out of an install or deep-link query string.
    ///
    /// A leading `?` is ignored and values are percent-decoded. Unknown keys are skipped; when a
    /// key repeats, the last occurrence wins.
    pub fn from_query_string(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut referrer = Referrer::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let slot = match &*key {
                "utm_campaign" => &mut referrer.campaign_name,
                "utm_source" => &mut referrer.campaign_source,
                "utm_medium" => &mut referrer.campaign_medium,
                "utm_term" => &mut referrer.campaign_keyword,
                "utm_content" => &mut referrer.campaign_content,
                _ => continue,
            };
            *slot = Some(value.into_owned());
        }
        referrer
    }

    pub fn with_document_referrer(mut self, url: impl Into<String>) -> Self {
        self.document_referrer = Some(url.into());
        self
    }

    pub fn with_campaign_name(mut self, name: impl Into<String>) -> Self {
        self.campaign_name = Some(name.into());
        self
    }

    pub fn with_campaign_source(mut self, source: impl Into<String>) -> Self {
        self.campaign_source = Some(source.into());
        self
    }

    pub fn with_campaign_medium(mut self, medium: impl Into<String>) -> Self {
        self.campaign_medium = Some(medium.into());
        self
    }

    pub fn with_campaign_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.campaign_keyword = Some(keyword.into());
        self
    }

    pub fn with_campaign_content(mut self, content: impl Into<String>) -> Self {
        self.campaign_content = Some(content.into());
        self
    }

    pub fn with_campaign_id(mut self, id: impl Into<String>) -> Self {
        self.campaign_id = Some(id.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &Referrer::default()
    }
}

/// Accessors shared by all hit variants, used by the decorators.
pub trait HitFields: Clone {
    fn metrics(&self) -> &MetricValues;
    fn dimensions(&self) -> &DimensionValues;
    fn dimensions_mut(&mut self) -> &mut DimensionValues;
    fn referrer(&self) -> Option<&Referrer>;
    fn referrer_mut(&mut self) -> &mut Option<Referrer>;

    /// Returns a copy carrying `referrer`. The receiver is left untouched.
    fn with_referrer(&self, referrer: Option<Referrer>) -> Self {
        let mut copy = self.clone();
        *copy.referrer_mut() = referrer;
        copy
    }
}

macro_rules! impl_hit_fields {
    ($($hit:ty),* $(,)?) => {
        $(
            impl HitFields for $hit {
                fn metrics(&self) -> &MetricValues {
                    &self.metrics
                }

                fn dimensions(&self) -> &DimensionValues {
                    &self.dimensions
                }

                fn dimensions_mut(&mut self) -> &mut DimensionValues {
                    &mut self.dimensions
                }

                fn referrer(&self) -> Option<&Referrer> {
                    self.referrer.as_ref()
                }

                fn referrer_mut(&mut self) -> &mut Option<Referrer> {
                    &mut self.referrer
                }
            }

            impl $hit {
                pub fn with_metric(mut self, key: MetricKey, value: u32) -> Self {
                    self.metrics.insert(key, value);
                    self
                }

                pub fn with_dimension(mut self, key: DimensionKey, value: impl Into<String>) -> Self {
                    self.dimensions.insert(key, value.into());
                    self
                }
            }
        )*
    };
}

/// A custom event. At least one of `category`, `action`, `label` or `value` must be set before
/// the hit reaches a live client.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventHit {
    pub category: Option<String>,
    pub action: Option<String>,
    pub label: Option<String>,
    pub value: Option<i64>,
    pub metrics: MetricValues,
    pub dimensions: DimensionValues,
    pub referrer: Option<Referrer>,
}

impl EventHit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn value(mut self, value: i64) -> Self {
        self.value = Some(value);
        self
    }

    pub(crate) fn has_payload(&self) -> bool {
        self.category.is_some() || self.action.is_some() || self.label.is_some() || self.value.is_some()
    }
}

/// A screen view. Processing one also updates the client's current screen name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AppViewHit {
    pub screen_name: String,
    pub metrics: MetricValues,
    pub dimensions: DimensionValues,
    pub referrer: Option<Referrer>,
}

impl AppViewHit {
    pub fn new(screen_name: impl Into<String>) -> Self {
        Self {
            screen_name: screen_name.into(),
            ..Default::default()
        }
    }
}

/// An item purchase.
///
/// `currency_code` should be an ISO 4217 code when present.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ItemHit {
    pub name: String,
    pub price: Option<f64>,
    pub quantity: Option<i64>,
    /// SKU or item code.
    pub code: Option<String>,
    pub category: Option<String>,
    pub currency_code: Option<String>,
    pub metrics: MetricValues,
    pub dimensions: DimensionValues,
    pub referrer: Option<Referrer>,
}

impl ItemHit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn quantity(mut self, quantity: i64) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn currency_code(mut self, currency_code: impl Into<String>) -> Self {
        self.currency_code = Some(currency_code.into());
        self
    }
}

/// A user timing sample, in milliseconds.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimingHit {
    pub category: String,
    pub name: String,
    pub time_ms: u64,
    pub label: Option<String>,
    pub metrics: MetricValues,
    pub dimensions: DimensionValues,
    pub referrer: Option<Referrer>,
}

impl TimingHit {
    pub fn new(category: impl Into<String>, name: impl Into<String>, time_ms: u64) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
            time_ms,
            ..Default::default()
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

impl_hit_fields!(EventHit, AppViewHit, ItemHit, TimingHit);

#[derive(Clone, Debug, PartialEq)]
pub enum Hit {
    Event(EventHit),
    AppView(AppViewHit),
    Item(ItemHit),
    Timing(TimingHit),
}

impl From<EventHit> for Hit {
    fn from(hit: EventHit) -> Self {
        Hit::Event(hit)
    }
}

impl From<AppViewHit> for Hit {
    fn from(hit: AppViewHit) -> Self {
        Hit::AppView(hit)
    }
}

impl From<ItemHit> for Hit {
    fn from(hit: ItemHit) -> Self {
        Hit::Item(hit)
    }
}

impl From<TimingHit> for Hit {
    fn from(hit: TimingHit) -> Self {
        Hit::Timing(hit)
    }
}
