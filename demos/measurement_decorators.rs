//! Composes decorators over a local recorder and a logger, without any network traffic.

use std::sync::Arc;

use measurement_protocol::analytics::{
    AnalyticsClient, AnalyticsClientExt, DimensionKey, DimensionValues, EventHit, LoggingClient,
    MultiClient, RecordingClient, Referrer, TimingHit,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let recorder = RecordingClient::new();
    let terminal = MultiClient::new(vec![
        Arc::new(recorder.clone()) as Arc<dyn AnalyticsClient>,
        Arc::new(LoggingClient::new(log::Level::Info)) as Arc<dyn AnalyticsClient>,
    ]);

    let base = DimensionValues::from([(DimensionKey::from_static("Build"), "nightly".to_string())]);
    let client = terminal
        .with_default_referrer(Referrer::from_query_string(
            "utm_source=newsletter&utm_medium=email&utm_campaign=spring",
        ))
        .with_base_dimensions(base);

    client.event(EventHit::new().category("Menu").action("Open"))?;
    client.timing(TimingHit::new("Loading", "Level 1", 850).label("cold start"))?;

    for hit in recorder.events() {
        println!("event: {hit:?}");
    }
    for hit in recorder.timings() {
        println!("timing: {hit:?}");
    }
    Ok(())
}
