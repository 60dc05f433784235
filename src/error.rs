//! Errors that end a key exchange.
use thiserror::Error;

use crate::qkd::QkdError;

/// Why a key exchange failed.
///
/// Every variant is fatal to the exchange it came from; nothing is retried.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// The QKD provider reported an error.
    #[error("QKD provider error: {0}")]
    Qkd(#[from] QkdError),

    /// The peer did not echo the handle this side issued.
    ///
    /// This is a correctness check only. The handle is visible on the wire, so an active
    /// attacker can echo it trivially; it provides no authentication.
    #[error("peer echoed a different key handle")]
    HandleMismatch,

    /// The role of this endpoint in the handshake could not be determined.
    #[error("handshake role could not be determined")]
    RoleUndetermined,

    /// The production secret length could not be computed.
    #[error("secret length policy unavailable: {0}")]
    PolicyUnavailable(String),

    /// The peer's public value is not a key handle.
    #[error("peer public value has {0} octets, expected a key handle")]
    InvalidPublicValue(usize),

    /// An entry point was called in a state where it is not allowed.
    #[error("{0}")]
    OutOfOrder(&'static str),
}

impl ExchangeError {
    /// Whether the failure came from the external QKD provider rather than protocol logic.
    pub fn is_provider_error(&self) -> bool {
        matches!(self, Self::Qkd(_))
    }
}

impl From<ExchangeError> for rustls::Error {
    fn from(e: ExchangeError) -> Self {
        rustls::Error::General(format!("QKD key exchange error: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_errors_are_distinguishable() {
        assert!(ExchangeError::from(QkdError::Timeout).is_provider_error());
        assert!(!ExchangeError::HandleMismatch.is_provider_error());
        assert!(!ExchangeError::RoleUndetermined.is_provider_error());
        assert!(!ExchangeError::PolicyUnavailable("no modulus".into()).is_provider_error());
    }

    #[test]
    fn maps_to_general_rustls_error() {
        let e: rustls::Error = ExchangeError::HandleMismatch.into();
        assert_eq!(
            e,
            rustls::Error::General(
                "QKD key exchange error: peer echoed a different key handle".into()
            )
        );
    }
}
