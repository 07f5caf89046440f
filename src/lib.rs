//! Client library for sending mobile app analytics hits over the Google Analytics Measurement
//! Protocol (v1).
//!
//! Hits are typed values ([`analytics::EventHit`], [`analytics::AppViewHit`],
//! [`analytics::ItemHit`], [`analytics::TimingHit`]) accepted by any
//! [`analytics::AnalyticsClient`]. The [`analytics::LiveClient`] encodes them into protocol
//! fields and posts one request per configured tracking id without blocking the caller.
//! Decorators such as [`analytics::DefaultDimensions`] and [`analytics::MultiClient`] compose
//! on top of any client.
//!
//! ```no_run
//! use measurement_protocol::analytics::{
//!     random_client_id, AnalyticsClient, ClientConfig, EventHit, LiveClient,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::new(["UA-12345-1"], random_client_id(), "Sample", "1.0.0");
//! let client = LiveClient::new(config)?;
//! client.event(EventHit::new().category("Sword").action("Swing"))?;
//! # Ok(())
//! # }
//! ```

pub mod analytics;
pub mod platform;

#[cfg(test)]
pub mod test_support;
