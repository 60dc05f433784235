//! The interface to a QKD key management service.
use rustls::crypto::SharedSecret;
use thiserror::Error;

use crate::handle::{KeyHandle, PeerAddress, Qos};

/// Errors reported by a QKD provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QkdError {
    /// The provider could not be reached.
    #[error("QKD provider unreachable: {0}")]
    ProviderUnreachable(String),
    /// The peer did not rendezvous within the QoS timeout.
    #[error("timed out waiting for peer")]
    Timeout,
    /// The provider cannot deliver a secret of the requested length.
    #[error("unsupported key length of {0} bits")]
    UnsupportedLength(u32),
    /// The provider has no session for the handle.
    #[error("unknown key handle")]
    UnknownHandle,
    /// Key material was requested before the rendezvous completed.
    #[error("key handle is not connected")]
    NotConnected,
}

/// Blocking open/connect/get-key/close operations of a QKD provider.
///
/// Implementations must allow independent sessions to be driven concurrently from
/// different threads.
pub trait QkdProvider: Send + Sync + std::fmt::Debug {
    /// Open a session towards `peer`.
    ///
    /// Without a handle the provider allocates a new one; with a handle it binds to the
    /// session the peer already opened.
    fn open(
        &self,
        peer: &PeerAddress,
        qos: &Qos,
        handle: Option<KeyHandle>,
    ) -> Result<KeyHandle, QkdError>;

    /// Block until the peer has joined the session, for at most the session's timeout.
    fn connect(&self, handle: &KeyHandle) -> Result<(), QkdError>;

    /// Retrieve the secret for a connected session. Both ends get identical bytes.
    fn get_key(&self, handle: &KeyHandle, length_bits: u32) -> Result<SharedSecret, QkdError>;

    /// Release this end of the session.
    fn close(&self, handle: &KeyHandle) -> Result<(), QkdError>;
}
