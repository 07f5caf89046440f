//! Sends an app view, an event and an item purchase through the Measurement Protocol.
//! Replace the tracking id with one of your own properties before running.

use std::time::Duration;

use measurement_protocol::analytics::{
    random_client_id, AnalyticsClient, AppViewHit, ClientConfig, CollectEndpoint, EventHit,
    ItemHit, LiveClient, MetricKey, MetricRegistry, ScreenResolution,
};

const GOLD_SPENT: MetricKey = MetricKey::from_static("GoldSpent");

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // The debug endpoint validates hits without recording them.
    let config = ClientConfig::new(["UA-XXXXXXXX-1"], random_client_id(), "Dungeon Crawler", "1.0.0")
        .with_endpoint(CollectEndpoint::DebugCollect)
        .with_screen_resolution(ScreenResolution::new(1920, 1080))
        .with_user_agent("measurement-protocol-demo/1.0")
        .with_metric_registry(MetricRegistry::from_entries([(GOLD_SPENT, 1)])?);
    let client = LiveClient::new(config)?;

    client.app_view(AppViewHit::new("Main Menu"))?;
    client.event(
        EventHit::new()
            .category("Sword")
            .action("Swing")
            .label("Critical")
            .value(12)
            .with_metric(GOLD_SPENT, 42),
    )?;
    client.item(ItemHit::new("Iron Sword").price(9.99).quantity(1).currency_code("EUR"))?;

    // Requests run as detached tasks; give them a moment before the runtime shuts down.
    tokio::time::sleep(Duration::from_secs(2)).await;
    println!("current screen: {}", client.current_screen());
    Ok(())
}
