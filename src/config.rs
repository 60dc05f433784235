//! Per-exchange configuration.
use std::time::Duration;

use crate::error::ExchangeError;
use crate::handle::Qos;
use crate::policy::SecretLengthPolicy;

/// Default bound on the rendezvous with the peer.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for QKD-backed key exchanges.
///
/// Every switch is explicit; nothing is inferred from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeConfig {
    /// Bypass the QKD provider and use deterministic key material. Insecure; for
    /// end-to-end testing of the surrounding handshake only.
    pub use_fixed_test_key: bool,
    /// The provider is a simulator and only short secrets are requested.
    pub simulated: bool,
    /// Check that the responder echoed the initiator's handle. Diagnostic only.
    pub verify_handle_echo: bool,
    /// Big-endian DH prime that production secret sizing is derived from.
    pub dh_modulus: Option<Vec<u8>>,
    /// Maximum key bitrate passed in the QoS.
    pub max_bps: u32,
    /// Session priority passed in the QoS.
    pub priority: u32,
    /// Bound on `connect`.
    pub timeout: Duration,
}

impl ExchangeConfig {
    /// Production sizing from the given DH prime.
    pub fn production(dh_modulus: impl Into<Vec<u8>>) -> Self {
        Self {
            use_fixed_test_key: false,
            simulated: false,
            verify_handle_echo: true,
            dh_modulus: Some(dh_modulus.into()),
            max_bps: 0,
            priority: 0,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Reduced sizing for a simulated provider.
    pub fn simulated() -> Self {
        Self {
            simulated: true,
            dh_modulus: None,
            ..Self::production(Vec::new())
        }
    }

    /// Deterministic key material with no provider involved.
    pub fn fixed_test_key() -> Self {
        Self {
            use_fixed_test_key: true,
            ..Self::simulated()
        }
    }

    /// Set the rendezvous timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable or disable the handle echo check.
    pub fn with_handle_echo_check(mut self, enabled: bool) -> Self {
        self.verify_handle_echo = enabled;
        self
    }

    /// Set the bitrate and priority passed to the provider.
    pub fn with_rate(mut self, max_bps: u32, priority: u32) -> Self {
        self.max_bps = max_bps;
        self.priority = priority;
        self
    }

    /// Build the QoS for a new exchange.
    pub fn qos(&self) -> Result<Qos, ExchangeError> {
        let requested_length = SecretLengthPolicy::new(self.dh_modulus.as_deref())
            .required_secret_length(self.simulated)?;
        Ok(Qos {
            requested_length,
            max_bps: self.max_bps,
            priority: self.priority,
            timeout: self.timeout,
        })
    }
}
