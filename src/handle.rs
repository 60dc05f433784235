//! Values that travel between the handshake and the QKD provider.
use std::fmt;
use std::time::Duration;

use crate::error::ExchangeError;

/// Length in octets of a QKD key handle.
pub const KEY_HANDLE_LEN: usize = 64;

/// An opaque identifier for a QKD provider session.
///
/// The handle is sent in the clear in place of a Diffie-Hellman public value, so it is
/// never secret and no key material may be derived from it.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyHandle([u8; KEY_HANDLE_LEN]);

impl KeyHandle {
    /// Wrap raw handle bytes.
    pub const fn new(bytes: [u8; KEY_HANDLE_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse a handle from a peer's public value.
    pub fn from_public_value(value: &[u8]) -> Result<Self, ExchangeError> {
        <[u8; KEY_HANDLE_LEN]>::try_from(value)
            .map(Self)
            .map_err(|_| ExchangeError::InvalidPublicValue(value.len()))
    }

    /// The bytes placed in the public value slot of the handshake.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // the first few octets are enough to tell sessions apart in logs
        write!(f, "KeyHandle(")?;
        for b in &self.0[..8] {
            write!(f, "{b:02x}")?;
        }
        write!(f, "..)")
    }
}

/// Network identity of the remote endpoint of the QKD link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct PeerAddress(String);

impl PeerAddress {
    /// An empty address, for providers where both ends share a host.
    pub fn unspecified() -> Self {
        Self::default()
    }

    /// The address as given by the transport.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PeerAddress {
    fn from(address: &str) -> Self {
        Self(address.to_owned())
    }
}

impl From<String> for PeerAddress {
    fn from(address: String) -> Self {
        Self(address)
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("<unspecified>")
        } else {
            f.write_str(&self.0)
        }
    }
}

/// Quality of service requested from the QKD provider for one exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Qos {
    /// Length of shared secret to request, in bits.
    pub requested_length: u32,
    /// Maximum key bitrate, zero meaning "provider default".
    pub max_bps: u32,
    /// Session priority.
    pub priority: u32,
    /// Upper bound on the rendezvous with the peer.
    pub timeout: Duration,
}

impl Qos {
    /// The requested length rounded up to whole octets.
    pub fn requested_bytes(&self) -> usize {
        (self.requested_length as usize).div_ceil(8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_value_must_be_exactly_one_handle() {
        let handle = KeyHandle::from_public_value(&[0xaa; KEY_HANDLE_LEN]).unwrap();
        assert_eq!(handle.as_bytes(), &[0xaa; KEY_HANDLE_LEN][..]);

        for len in [0, 32, KEY_HANDLE_LEN + 1] {
            match KeyHandle::from_public_value(&vec![0; len]) {
                Err(ExchangeError::InvalidPublicValue(got)) => assert_eq!(got, len),
                other => panic!("unexpected result for {len} octets: {other:?}"),
            }
        }
    }

    #[test]
    fn debug_output_is_abbreviated() {
        let handle = KeyHandle::new([0xab; KEY_HANDLE_LEN]);
        assert_eq!(format!("{handle:?}"), "KeyHandle(abababababababab..)");
    }

    #[test]
    fn requested_bytes_rounds_up() {
        let qos = Qos {
            requested_length: 65,
            max_bps: 0,
            priority: 0,
            timeout: Duration::from_secs(1),
        };
        assert_eq!(qos.requested_bytes(), 9);
    }
}
