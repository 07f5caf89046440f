//! Turns typed hits into Measurement Protocol wire parameters.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use crate::analytics::config::ScreenResolution;
use crate::analytics::error::{invalid_hit, missing_registry, unregistered_key, AnalyticsResult};
use crate::analytics::hit::{AppViewHit, EventHit, Hit, HitFields, ItemHit, Referrer, TimingHit};
use crate::analytics::keys::{DimensionRegistry, IndexRegistry, IndexedKey, MetricRegistry};
use crate::analytics::params::ParameterMap;

pub const PROTOCOL_VERSION: &str = "1";
pub const INITIAL_SCREEN_NAME: &str = "Not Set";

pub const MAX_CATEGORY_LENGTH: usize = 150;
pub const MAX_ACTION_LENGTH: usize = 500;
pub const MAX_LABEL_LENGTH: usize = 500;
pub const MAX_ITEM_FIELD_LENGTH: usize = 500;
pub const MAX_CURRENCY_CODE_LENGTH: usize = 10;
pub const MAX_TIMING_CATEGORY_LENGTH: usize = 150;
pub const MAX_TIMING_NAME_LENGTH: usize = 500;
pub const MAX_TIMING_LABEL_LENGTH: usize = 500;
pub const MAX_DIMENSION_VALUE_LENGTH: usize = 150;
pub const MAX_SCREEN_NAME_LENGTH: usize = 2048;
pub const MAX_DOCUMENT_REFERRER_LENGTH: usize = 2048;
pub const MAX_CAMPAIGN_NAME_LENGTH: usize = 100;
pub const MAX_CAMPAIGN_SOURCE_LENGTH: usize = 100;
pub const MAX_CAMPAIGN_MEDIUM_LENGTH: usize = 50;
pub const MAX_CAMPAIGN_KEYWORD_LENGTH: usize = 500;
pub const MAX_CAMPAIGN_CONTENT_LENGTH: usize = 500;
pub const MAX_CAMPAIGN_ID_LENGTH: usize = 100;
pub const MAX_APP_FIELD_LENGTH: usize = 100;

/// Identity fields fixed for the lifetime of a client and sent with every hit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionFields {
    pub client_id: String,
    pub app_name: String,
    pub app_version: String,
    pub screen_resolution: ScreenResolution,
}

/// Builds one [`ParameterMap`] per hit.
///
/// Textual fields longer than their protocol limit are truncated, never rejected.
///
/// The builder is stateless apart from the current screen name, which every processed app view
/// replaces and every hit reports as `cd`. Concurrent callers sharing one builder race on that
/// field; the last app view to take the lock wins.
#[derive(Debug)]
pub struct HitBuilder {
    session: SessionFields,
    metrics: Option<MetricRegistry>,
    dimensions: Option<DimensionRegistry>,
    current_screen: Mutex<String>,
}

impl HitBuilder {
    pub fn new(
        session: SessionFields,
        metrics: Option<MetricRegistry>,
        dimensions: Option<DimensionRegistry>,
    ) -> Self {
        Self {
            session,
            metrics,
            dimensions,
            current_screen: Mutex::new(INITIAL_SCREEN_NAME.to_string()),
        }
    }

    pub fn session(&self) -> &SessionFields {
        &self.session
    }

    pub fn current_screen(&self) -> String {
        self.current_screen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn build(&self, hit: &Hit) -> AnalyticsResult<ParameterMap> {
        match hit {
            Hit::Event(hit) => self.event(hit),
            Hit::AppView(hit) => self.app_view(hit),
            Hit::Item(hit) => self.item(hit),
            Hit::Timing(hit) => self.timing(hit),
        }
    }

    pub fn event(&self, hit: &EventHit) -> AnalyticsResult<ParameterMap> {
        if !hit.has_payload() {
            return Err(invalid_hit(
                "event hit needs at least one of category, action, label or value",
            ));
        }
        let custom = self.custom_fields(hit)?;

        let mut params = self.base_params(&self.current_screen());
        params.insert("t", "event");
        params.insert_limited("ec", hit.category.as_deref(), MAX_CATEGORY_LENGTH);
        params.insert_limited("ea", hit.action.as_deref(), MAX_ACTION_LENGTH);
        params.insert_limited("el", hit.label.as_deref(), MAX_LABEL_LENGTH);
        if let Some(value) = hit.value {
            params.insert("ev", value.to_string());
        }
        params.append(custom);
        Ok(params)
    }

    pub fn app_view(&self, hit: &AppViewHit) -> AnalyticsResult<ParameterMap> {
        let custom = self.custom_fields(hit)?;

        // `cd` is taken from this hit while the lock is held.
        let mut params = {
            let mut current = self
                .current_screen
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            current.clone_from(&hit.screen_name);
            self.base_params(&current)
        };
        params.insert("t", "screenview");
        params.append(custom);
        Ok(params)
    }

    pub fn item(&self, hit: &ItemHit) -> AnalyticsResult<ParameterMap> {
        if hit.name.is_empty() {
            return Err(invalid_hit("item hit requires a non-empty name"));
        }
        let custom = self.custom_fields(hit)?;

        let mut params = self.base_params(&self.current_screen());
        params.insert_limited("in", Some(hit.name.as_str()), MAX_ITEM_FIELD_LENGTH);
        if let Some(price) = hit.price {
            params.insert("ip", price.to_string());
        }
        if let Some(quantity) = hit.quantity {
            params.insert("iq", quantity.to_string());
        }
        params.insert_limited("ic", hit.code.as_deref(), MAX_ITEM_FIELD_LENGTH);
        params.insert_limited("iv", hit.category.as_deref(), MAX_ITEM_FIELD_LENGTH);
        params.insert_limited("cu", hit.currency_code.as_deref(), MAX_CURRENCY_CODE_LENGTH);
        params.append(custom);
        Ok(params)
    }

    pub fn timing(&self, hit: &TimingHit) -> AnalyticsResult<ParameterMap> {
        let custom = self.custom_fields(hit)?;

        let mut params = self.base_params(&self.current_screen());
        params.insert("t", "timing");
        params.insert_limited("utc", Some(hit.category.as_str()), MAX_TIMING_CATEGORY_LENGTH);
        params.insert_limited("utv", Some(hit.name.as_str()), MAX_TIMING_NAME_LENGTH);
        params.insert("utt", hit.time_ms.to_string());
        params.insert_limited("utl", hit.label.as_deref(), MAX_TIMING_LABEL_LENGTH);
        params.append(custom);
        Ok(params)
    }

    fn base_params(&self, screen_name: &str) -> ParameterMap {
        let mut params = ParameterMap::new();
        params.insert("v", PROTOCOL_VERSION);
        params.insert("cid", self.session.client_id.as_str());
        params.insert_limited("an", Some(self.session.app_name.as_str()), MAX_APP_FIELD_LENGTH);
        params.insert_limited("av", Some(self.session.app_version.as_str()), MAX_APP_FIELD_LENGTH);
        params.insert("sr", self.session.screen_resolution.to_string());
        params.insert_limited("cd", Some(screen_name), MAX_SCREEN_NAME_LENGTH);
        params
    }

    /// Custom metrics, custom dimensions and referrer fields. Runs before any state changes so
    /// a rejected hit leaves the builder untouched.
    fn custom_fields<H: HitFields>(&self, hit: &H) -> AnalyticsResult<ParameterMap> {
        let mut params = ParameterMap::new();
        append_custom(&mut params, hit.metrics(), self.metrics.as_ref(), None)?;
        append_custom(
            &mut params,
            hit.dimensions(),
            self.dimensions.as_ref(),
            Some(MAX_DIMENSION_VALUE_LENGTH),
        )?;
        if let Some(referrer) = hit.referrer() {
            append_referrer(&mut params, referrer);
        }
        Ok(params)
    }
}

fn append_custom<K: IndexedKey>(
    params: &mut ParameterMap,
    values: &BTreeMap<K, K::Value>,
    registry: Option<&IndexRegistry<K>>,
    max_len: Option<usize>,
) -> AnalyticsResult<()> {
    if values.is_empty() {
        return Ok(());
    }
    let registry = registry.ok_or_else(|| missing_registry(K::FAMILY))?;
    for (key, value) in values {
        let index = registry
            .index_of(key)
            .ok_or_else(|| unregistered_key(K::FAMILY, key))?;
        let name = format!("{}{index}", K::WIRE_PREFIX);
        let value = value.to_string();
        match max_len {
            Some(max_len) => params.insert_limited(&name, Some(value.as_str()), max_len),
            None => params.insert(name, value),
        }
    }
    Ok(())
}

fn append_referrer(params: &mut ParameterMap, referrer: &Referrer) {
    params.insert_limited("dr", referrer.document_referrer.as_deref(), MAX_DOCUMENT_REFERRER_LENGTH);
    params.insert_limited("cn", referrer.campaign_name.as_deref(), MAX_CAMPAIGN_NAME_LENGTH);
    params.insert_limited("cs", referrer.campaign_source.as_deref(), MAX_CAMPAIGN_SOURCE_LENGTH);
    params.insert_limited("cm", referrer.campaign_medium.as_deref(), MAX_CAMPAIGN_MEDIUM_LENGTH);
    params.insert_limited("ck", referrer.campaign_keyword.as_deref(), MAX_CAMPAIGN_KEYWORD_LENGTH);
    params.insert_limited("cc", referrer.campaign_content.as_deref(), MAX_CAMPAIGN_CONTENT_LENGTH);
    params.insert_limited("ci", referrer.campaign_id.as_deref(), MAX_CAMPAIGN_ID_LENGTH);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::error::AnalyticsErrorCode;
    use crate::analytics::keys::{DimensionKey, MetricKey};

    const SCORE: MetricKey = MetricKey::from_static("score");
    const LEVEL: DimensionKey = DimensionKey::from_static("level");
    const MODE: DimensionKey = DimensionKey::from_static("mode");

    fn session() -> SessionFields {
        SessionFields {
            client_id: "client-1".into(),
            app_name: "Dungeon".into(),
            app_version: "1.2.0".into(),
            screen_resolution: ScreenResolution::new(1280, 720),
        }
    }

    fn builder() -> HitBuilder {
        HitBuilder::new(
            session(),
            Some(MetricRegistry::from_entries([(SCORE, 1)]).unwrap()),
            Some(DimensionRegistry::from_entries([(LEVEL, 2), (MODE, 3)]).unwrap()),
        )
    }

    #[test]
    fn base_fields_are_always_present() {
        let params = builder().event(&EventHit::new().action("start")).unwrap();
        assert_eq!(params.get("v"), Some("1"));
        assert_eq!(params.get("cid"), Some("client-1"));
        assert_eq!(params.get("an"), Some("Dungeon"));
        assert_eq!(params.get("av"), Some("1.2.0"));
        assert_eq!(params.get("sr"), Some("1280x720"));
        assert_eq!(params.get("cd"), Some(INITIAL_SCREEN_NAME));
        assert_eq!(params.get("t"), Some("event"));
        assert!(!params.contains("tid"));
    }

    #[test]
    fn empty_event_is_rejected() {
        let err = builder().event(&EventHit::new()).unwrap_err();
        assert_eq!(err.code, AnalyticsErrorCode::InvalidHit);
    }

    #[test]
    fn event_with_only_value_is_accepted() {
        let params = builder().event(&EventHit::new().value(-3)).unwrap();
        assert_eq!(params.get("ev"), Some("-3"));
        assert!(!params.contains("ec"));
        assert!(!params.contains("ea"));
        assert!(!params.contains("el"));
    }

    #[test]
    fn event_fields_are_truncated_not_rejected() {
        let hit = EventHit::new()
            .category("c".repeat(151))
            .action("a".repeat(501))
            .label("short");
        let params = builder().event(&hit).unwrap();
        assert_eq!(params.get("ec").map(str::len), Some(MAX_CATEGORY_LENGTH));
        assert_eq!(params.get("ea").map(str::len), Some(MAX_ACTION_LENGTH));
        assert_eq!(params.get("el"), Some("short"));
    }

    #[test]
    fn metric_is_expanded_to_its_slot() {
        let hit = EventHit::new().category("game").with_metric(SCORE, 42);
        let params = builder().event(&hit).unwrap();
        assert_eq!(params.get("cm1"), Some("42"));
    }

    #[test]
    fn dimensions_are_expanded_and_truncated() {
        let hit = EventHit::new()
            .category("game")
            .with_dimension(LEVEL, "cave")
            .with_dimension(MODE, "m".repeat(200));
        let params = builder().event(&hit).unwrap();
        assert_eq!(params.get("cd2"), Some("cave"));
        assert_eq!(params.get("cd3").map(str::len), Some(MAX_DIMENSION_VALUE_LENGTH));
        let cave_fields: Vec<_> = params
            .iter()
            .filter(|(name, value)| name.starts_with("cd") && *value == "cave")
            .collect();
        assert_eq!(cave_fields, vec![("cd2", "cave")]);
    }

    #[test]
    fn unregistered_key_is_rejected() {
        let hit = EventHit::new()
            .category("game")
            .with_metric(MetricKey::new("unknown"), 1);
        let err = builder().event(&hit).unwrap_err();
        assert_eq!(err.code, AnalyticsErrorCode::UnregisteredKey);
        assert!(err.message().contains("`unknown`"));
    }

    #[test]
    fn missing_registry_is_rejected() {
        let builder = HitBuilder::new(session(), None, None);
        let hit = ItemHit::new("Sword").with_dimension(LEVEL, "cave");
        let err = builder.item(&hit).unwrap_err();
        assert_eq!(err.code, AnalyticsErrorCode::MissingRegistry);

        // An empty map never needs a registry.
        assert!(builder.item(&ItemHit::new("Sword")).is_ok());
    }

    #[test]
    fn app_view_updates_current_screen() {
        let builder = builder();
        let params = builder.app_view(&AppViewHit::new("Inventory")).unwrap();
        assert_eq!(params.get("t"), Some("screenview"));
        assert_eq!(params.get("cd"), Some("Inventory"));

        let params = builder.timing(&TimingHit::new("load", "level", 350)).unwrap();
        assert_eq!(params.get("cd"), Some("Inventory"));
        assert_eq!(builder.current_screen(), "Inventory");
    }

    #[test]
    fn rejected_app_view_keeps_previous_screen() {
        let builder = builder();
        let hit = AppViewHit::new("Shop").with_metric(MetricKey::new("unknown"), 1);
        assert!(builder.app_view(&hit).is_err());
        assert_eq!(builder.current_screen(), INITIAL_SCREEN_NAME);
    }

    #[test]
    fn item_fields_map_to_wire_names() {
        let hit = ItemHit::new("Sword")
            .price(9.99)
            .quantity(2)
            .code("SKU-1")
            .category("weapons")
            .currency_code("EURO-DOLLARS");
        let params = builder().item(&hit).unwrap();
        assert_eq!(params.get("in"), Some("Sword"));
        assert_eq!(params.get("ip"), Some("9.99"));
        assert_eq!(params.get("iq"), Some("2"));
        assert_eq!(params.get("ic"), Some("SKU-1"));
        assert_eq!(params.get("iv"), Some("weapons"));
        assert_eq!(params.get("cu"), Some("EURO-DOLLA"));
        assert!(!params.contains("t"));
    }

    #[test]
    fn item_without_name_is_rejected() {
        let err = builder().item(&ItemHit::new("")).unwrap_err();
        assert_eq!(err.code, AnalyticsErrorCode::InvalidHit);
    }

    #[test]
    fn timing_fields_map_to_wire_names() {
        let params = builder()
            .timing(&TimingHit::new("load", "assets", 1250).label("cold"))
            .unwrap();
        assert_eq!(params.get("t"), Some("timing"));
        assert_eq!(params.get("utc"), Some("load"));
        assert_eq!(params.get("utv"), Some("assets"));
        assert_eq!(params.get("utt"), Some("1250"));
        assert_eq!(params.get("utl"), Some("cold"));
    }

    #[test]
    fn referrer_emits_only_present_fields() {
        let referrer = Referrer::default()
            .with_document_referrer("https://example.com/landing")
            .with_campaign_medium("m".repeat(80))
            .with_campaign_id("spring");
        let hit = EventHit::new().action("install").with_referrer(Some(referrer));
        let params = builder().event(&hit).unwrap();
        assert_eq!(params.get("dr"), Some("https://example.com/landing"));
        assert_eq!(params.get("cm").map(str::len), Some(MAX_CAMPAIGN_MEDIUM_LENGTH));
        assert_eq!(params.get("ci"), Some("spring"));
        for absent in ["cn", "cs", "ck", "cc"] {
            assert!(!params.contains(absent), "{absent} should be absent");
        }
    }

    #[test]
    fn long_screen_name_is_truncated() {
        let builder = builder();
        builder.app_view(&AppViewHit::new("s".repeat(3000))).unwrap();
        let params = builder.event(&EventHit::new().label("x")).unwrap();
        assert_eq!(params.get("cd").map(str::len), Some(MAX_SCREEN_NAME_LENGTH));
    }

    #[test]
    fn every_text_field_is_truncated_to_its_limit() {
        fn referred(referrer: Referrer) -> Hit {
            EventHit::new().action("install").with_referrer(Some(referrer)).into()
        }

        let cases: &[(&str, usize, fn(String) -> Hit)] = &[
            ("ec", MAX_CATEGORY_LENGTH, |v| EventHit::new().category(v).into()),
            ("ea", MAX_ACTION_LENGTH, |v| EventHit::new().action(v).into()),
            ("el", MAX_LABEL_LENGTH, |v| EventHit::new().label(v).into()),
            ("cd", MAX_SCREEN_NAME_LENGTH, |v| AppViewHit::new(v).into()),
            ("in", MAX_ITEM_FIELD_LENGTH, |v| ItemHit::new(v).into()),
            ("ic", MAX_ITEM_FIELD_LENGTH, |v| ItemHit::new("Sword").code(v).into()),
            ("iv", MAX_ITEM_FIELD_LENGTH, |v| ItemHit::new("Sword").category(v).into()),
            ("cu", MAX_CURRENCY_CODE_LENGTH, |v| ItemHit::new("Sword").currency_code(v).into()),
            ("utc", MAX_TIMING_CATEGORY_LENGTH, |v| TimingHit::new(v, "assets", 1).into()),
            ("utv", MAX_TIMING_NAME_LENGTH, |v| TimingHit::new("load", v, 1).into()),
            ("utl", MAX_TIMING_LABEL_LENGTH, |v| TimingHit::new("load", "assets", 1).label(v).into()),
            ("cd2", MAX_DIMENSION_VALUE_LENGTH, |v| {
                EventHit::new().action("start").with_dimension(LEVEL, v).into()
            }),
            ("dr", MAX_DOCUMENT_REFERRER_LENGTH, |v| {
                referred(Referrer::default().with_document_referrer(v))
            }),
            ("cn", MAX_CAMPAIGN_NAME_LENGTH, |v| referred(Referrer::default().with_campaign_name(v))),
            ("cs", MAX_CAMPAIGN_SOURCE_LENGTH, |v| referred(Referrer::default().with_campaign_source(v))),
            ("cm", MAX_CAMPAIGN_MEDIUM_LENGTH, |v| referred(Referrer::default().with_campaign_medium(v))),
            ("ck", MAX_CAMPAIGN_KEYWORD_LENGTH, |v| {
                referred(Referrer::default().with_campaign_keyword(v))
            }),
            ("cc", MAX_CAMPAIGN_CONTENT_LENGTH, |v| {
                referred(Referrer::default().with_campaign_content(v))
            }),
            ("ci", MAX_CAMPAIGN_ID_LENGTH, |v| referred(Referrer::default().with_campaign_id(v))),
        ];

        for (field, limit, make) in cases {
            let exact = builder().build(&make("x".repeat(*limit))).unwrap();
            let long = builder().build(&make("x".repeat(limit + 1))).unwrap();
            assert_eq!(long.get(field).map(str::len), Some(*limit), "{field}");
            // Everything else, including the shortened field itself, matches a hit at the limit.
            assert_eq!(long, exact, "{field}");
        }
    }

    #[test]
    fn app_view_reports_its_own_screen_under_contention() {
        let builder = builder();
        std::thread::scope(|scope| {
            for worker in 0..4 {
                let builder = &builder;
                scope.spawn(move || {
                    for round in 0..200 {
                        let name = format!("screen-{worker}-{round}");
                        let params = builder.app_view(&AppViewHit::new(name.as_str())).unwrap();
                        assert_eq!(params.get("cd"), Some(name.as_str()));
                    }
                });
            }
        });
    }
}
