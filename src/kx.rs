//! QKD key exchange as a rustls key exchange group.
use std::sync::Arc;

use rustls::crypto::{ActiveKeyExchange, CompletedKeyExchange, SharedSecret, SupportedKxGroup};
use rustls::{Error, NamedGroup, ProtocolVersion};

use crate::config::ExchangeConfig;
use crate::exchange::KeyExchange;
use crate::handle::{KeyHandle, PeerAddress};
use crate::qkd::QkdProvider;
use crate::role::Role;

/// Code point from the TLS private use range used by default for the QKD group.
pub const QKD_NAMED_GROUP: NamedGroup = NamedGroup::Unknown(0xfe51);

/// A key exchange group whose public values are QKD key handles.
///
/// The client's `start` makes it the initiator and the server's `start_and_complete`
/// makes it the responder, so the role always comes from the handshake itself.
#[derive(Debug, Clone)]
pub struct QkdKxGroup {
    named_group: NamedGroup,
    provider: Arc<dyn QkdProvider>,
    config: Arc<ExchangeConfig>,
    peer: PeerAddress,
}

impl QkdKxGroup {
    /// Create a group that reaches `peer` through `provider`.
    pub fn new(provider: Arc<dyn QkdProvider>, config: ExchangeConfig, peer: PeerAddress) -> Self {
        Self {
            named_group: QKD_NAMED_GROUP,
            provider,
            config: Arc::new(config),
            peer,
        }
    }

    /// Advertise the group under a different code point.
    pub fn with_named_group(mut self, named_group: NamedGroup) -> Self {
        self.named_group = named_group;
        self
    }

    /// Leak the group to get the `'static` reference a rustls `CryptoProvider` stores.
    pub fn leak(self) -> &'static dyn SupportedKxGroup {
        Box::leak(Box::new(self))
    }

    fn exchange(&self, role: Role) -> KeyExchange {
        KeyExchange::new(
            Arc::clone(&self.provider),
            Arc::clone(&self.config),
            Arc::new(role),
            self.peer.clone(),
        )
    }
}

struct QkdActiveKeyExchange {
    exchange: KeyExchange,
    handle: KeyHandle,
    named_group: NamedGroup,
}

impl SupportedKxGroup for QkdKxGroup {
    fn start(&self) -> Result<Box<dyn ActiveKeyExchange>, Error> {
        let mut exchange = self.exchange(Role::Initiator);
        let handle = exchange.produce_local_public_value()?;
        Ok(Box::new(QkdActiveKeyExchange {
            exchange,
            handle,
            named_group: self.named_group,
        }))
    }

    fn start_and_complete(&self, peer_pub_key: &[u8]) -> Result<CompletedKeyExchange, Error> {
        let mut exchange = self.exchange(Role::Responder);
        let secret = exchange.compute_shared_secret(peer_pub_key)?;
        let handle = exchange.produce_local_public_value()?;
        Ok(CompletedKeyExchange {
            group: self.named_group,
            pub_key: handle.as_bytes().to_vec(),
            secret,
        })
    }

    fn name(&self) -> NamedGroup {
        self.named_group
    }

    fn usable_for_version(&self, version: ProtocolVersion) -> bool {
        version == ProtocolVersion::TLSv1_3
    }
}

impl ActiveKeyExchange for QkdActiveKeyExchange {
    fn complete(mut self: Box<Self>, peer_pub_key: &[u8]) -> Result<SharedSecret, Error> {
        Ok(self.exchange.compute_shared_secret(peer_pub_key)?)
    }

    fn pub_key(&self) -> &[u8] {
        self.handle.as_bytes()
    }

    fn group(&self) -> NamedGroup {
        self.named_group
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated::SimulatedQkd;

    fn group(qkd: &Arc<SimulatedQkd>, config: ExchangeConfig) -> QkdKxGroup {
        QkdKxGroup::new(qkd.clone(), config, PeerAddress::unspecified())
    }

    #[test]
    fn client_and_server_agree() {
        let qkd = Arc::new(SimulatedQkd::default());
        let client = group(&qkd, ExchangeConfig::simulated());
        let server = group(&qkd, ExchangeConfig::simulated());

        let client_kx = client.start().unwrap();
        assert_eq!(client_kx.group(), QKD_NAMED_GROUP);
        let completed = server.start_and_complete(client_kx.pub_key()).unwrap();
        assert_eq!(completed.pub_key, client_kx.pub_key());
        let client_secret = client_kx.complete(&completed.pub_key).unwrap();

        assert_eq!(
            client_secret.secret_bytes(),
            completed.secret.secret_bytes()
        );
        assert_eq!(qkd.open_sessions(), 0);
    }

    #[test]
    fn errors_become_rustls_errors() {
        let qkd = Arc::new(SimulatedQkd::default());
        let client = group(&qkd, ExchangeConfig::simulated());
        let client_kx = client.start().unwrap();
        assert!(matches!(
            client_kx.complete(&[0u8; 64]),
            Err(Error::General(_))
        ));

        let server = group(&qkd, ExchangeConfig::simulated());
        assert!(matches!(
            server.start_and_complete(&[0u8; 64]),
            Err(Error::General(_))
        ));
        assert_eq!(qkd.open_sessions(), 0);
    }

    #[test]
    fn tls13_only() {
        let qkd = Arc::new(SimulatedQkd::default());
        let kx = group(&qkd, ExchangeConfig::simulated())
            .with_named_group(NamedGroup::Unknown(0xfe52));
        assert_eq!(kx.name(), NamedGroup::Unknown(0xfe52));
        assert!(kx.usable_for_version(ProtocolVersion::TLSv1_3));
        assert!(!kx.usable_for_version(ProtocolVersion::TLSv1_2));
    }
}
