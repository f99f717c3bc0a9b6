//! Payment gateway trait and simulation stub.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use common::Money;
use rand::Rng;
use rand::distributions::Alphanumeric;
use thiserror::Error;

/// Errors returned by a payment gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The gateway declined the charge or refund.
    #[error("gateway declined: {reason}")]
    Declined { reason: String },
}

/// Generates an uppercase alphanumeric reference token.
pub fn reference_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect::<String>()
        .to_uppercase()
}

/// External payment gateway.
///
/// Implementations return a transaction id on success and never touch
/// order or refund state; persisting the outcome is the caller's job.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Charges the order amount. Returns the gateway transaction id.
    async fn charge(
        &self,
        order_ref: &str,
        amount: Money,
        currency: &str,
    ) -> Result<String, GatewayError>;

    /// Returns money for a refund. Returns the gateway transaction id.
    async fn refund(&self, refund_ref: &str, amount: Money) -> Result<String, GatewayError>;
}

/// Simulated gateway with bounded random latency and fixed success
/// probabilities (charges ≈ 90 %, refunds ≈ 95 % by default).
pub struct StubGateway {
    charge_success_rate: f64,
    refund_success_rate: f64,
    min_latency: Duration,
    max_latency: Duration,
}

impl Default for StubGateway {
    fn default() -> Self {
        Self {
            charge_success_rate: 0.90,
            refund_success_rate: 0.95,
            min_latency: Duration::from_secs(1),
            max_latency: Duration::from_secs(3),
        }
    }
}

impl StubGateway {
    /// Creates a stub with explicit rates and latency bounds.
    pub fn new(
        charge_success_rate: f64,
        refund_success_rate: f64,
        min_latency: Duration,
        max_latency: Duration,
    ) -> Self {
        Self {
            charge_success_rate: charge_success_rate.clamp(0.0, 1.0),
            refund_success_rate: refund_success_rate.clamp(0.0, 1.0),
            min_latency,
            max_latency: max_latency.max(min_latency),
        }
    }

    /// Zero-latency stub with the given rates, for tests.
    pub fn instant(charge_success_rate: f64, refund_success_rate: f64) -> Self {
        Self::new(
            charge_success_rate,
            refund_success_rate,
            Duration::ZERO,
            Duration::ZERO,
        )
    }

    async fn simulate_latency(&self) {
        if self.max_latency.is_zero() {
            return;
        }
        let min = self.min_latency.as_millis() as u64;
        let max = self.max_latency.as_millis() as u64;
        let latency = rand::thread_rng().gen_range(min..=max);
        tokio::time::sleep(Duration::from_millis(latency)).await;
    }

    fn roll(&self, rate: f64) -> bool {
        rate >= 1.0 || (rate > 0.0 && rand::thread_rng().gen_bool(rate))
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn charge(
        &self,
        order_ref: &str,
        amount: Money,
        currency: &str,
    ) -> Result<String, GatewayError> {
        self.simulate_latency().await;
        if self.roll(self.charge_success_rate) {
            let transaction_id = format!("TXN-{}", reference_token(16));
            tracing::debug!(order_ref, %amount, currency, transaction_id, "charge accepted");
            Ok(transaction_id)
        } else {
            Err(GatewayError::Declined {
                reason: "payment declined by gateway".to_string(),
            })
        }
    }

    async fn refund(&self, refund_ref: &str, amount: Money) -> Result<String, GatewayError> {
        self.simulate_latency().await;
        if self.roll(self.refund_success_rate) {
            let transaction_id = format!("REF-{}", reference_token(12));
            tracing::debug!(refund_ref, %amount, transaction_id, "refund accepted");
            Ok(transaction_id)
        } else {
            Err(GatewayError::Declined {
                reason: "payment gateway declined the refund".to_string(),
            })
        }
    }
}

/// Zero-latency gateway that counts calls and can be told to decline,
/// for tests that assert on gateway traffic.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    fail_charges: AtomicBool,
    fail_refunds: AtomicBool,
    charges: AtomicU32,
    refunds: AtomicU32,
}

impl RecordingGateway {
    /// Creates a gateway that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent charges decline.
    pub fn set_fail_on_charge(&self, fail: bool) {
        self.fail_charges.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent refunds decline.
    pub fn set_fail_on_refund(&self, fail: bool) {
        self.fail_refunds.store(fail, Ordering::SeqCst);
    }

    /// Number of charge calls seen (accepted or declined).
    pub fn charge_count(&self) -> u32 {
        self.charges.load(Ordering::SeqCst)
    }

    /// Number of refund calls seen (accepted or declined).
    pub fn refund_count(&self) -> u32 {
        self.refunds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for RecordingGateway {
    async fn charge(
        &self,
        _order_ref: &str,
        _amount: Money,
        _currency: &str,
    ) -> Result<String, GatewayError> {
        let call = self.charges.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_charges.load(Ordering::SeqCst) {
            return Err(GatewayError::Declined {
                reason: "payment declined by gateway".to_string(),
            });
        }
        Ok(format!("TXN-{call:04}"))
    }

    async fn refund(&self, _refund_ref: &str, _amount: Money) -> Result<String, GatewayError> {
        let call = self.refunds.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_refunds.load(Ordering::SeqCst) {
            return Err(GatewayError::Declined {
                reason: "payment gateway declined the refund".to_string(),
            });
        }
        Ok(format!("REF-{call:04}"))
    }
}
