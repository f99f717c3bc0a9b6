//! Tunables for the saga handlers.

use std::time::Duration;

/// Knobs shared by the saga step handlers.
#[derive(Debug, Clone)]
pub struct SagaConfig {
    /// How long a stock reservation is held before its recorded expiry.
    pub reservation_ttl: chrono::Duration,

    /// Initial stock seeded when a reserve hits an unknown SKU.
    pub seed_stock: u32,

    /// Delay before a queued notification is delivered, giving the
    /// triggering transition time to settle.
    pub notification_delay: Duration,
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self {
            reservation_ttl: chrono::Duration::minutes(15),
            seed_stock: 1000,
            notification_delay: Duration::from_secs(5),
        }
    }
}

impl SagaConfig {
    /// Config with no notification delay, for tests that drain the queue.
    pub fn immediate() -> Self {
        Self {
            notification_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}
