//! The QKD-backed key exchange state machine.
//!
//! An exchange replaces Diffie-Hellman with a QKD key handle:
//!
//! 1. The initiator opens a session at its QKD provider and publishes the returned handle
//!    as its public value ([`KeyExchange::produce_local_public_value`]).
//! 2. The responder binds to that handle, rendezvouses with the initiator, retrieves the
//!    secret ([`KeyExchange::compute_shared_secret`]) and then publishes the same handle
//!    back ([`KeyExchange::produce_local_public_value`]).
//! 3. The initiator checks the echoed handle, rendezvouses and retrieves the same secret.
//!
//! Provider handles are closed on every exit path. An error before the secret is handed
//! out leaves the exchange in [`ExchangeState::Failed`]; later calls are rejected without
//! leaving the terminal state.
use std::sync::Arc;

use log::{debug, warn};
use rustls::crypto::SharedSecret;

use crate::config::ExchangeConfig;
use crate::error::ExchangeError;
use crate::fixed;
use crate::handle::{KeyHandle, PeerAddress, Qos};
use crate::qkd::{QkdError, QkdProvider};
use crate::role::{Role, RoleResolver};

/// Progress of one exchange. States only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExchangeState {
    /// Nothing has happened yet.
    Idle,
    /// The role is resolved and the key handle is being established.
    HandleEstablishing,
    /// The key handle is fixed.
    HandleReady,
    /// Waiting for the peer at the QKD provider.
    Rendezvousing,
    /// Retrieving the shared secret.
    SecretRetrieving,
    /// The shared secret was handed out.
    SecretReady,
    /// The exchange failed.
    Failed,
}

/// A provider session that is closed when dropped.
struct OpenHandle {
    provider: Arc<dyn QkdProvider>,
    handle: KeyHandle,
}

impl OpenHandle {
    fn open(
        provider: &Arc<dyn QkdProvider>,
        peer: &PeerAddress,
        qos: &Qos,
        handle: Option<KeyHandle>,
    ) -> Result<Self, QkdError> {
        let handle = provider.open(peer, qos, handle)?;
        Ok(Self {
            provider: Arc::clone(provider),
            handle,
        })
    }
}

impl Drop for OpenHandle {
    fn drop(&mut self) {
        // close errors never replace the outcome of the exchange
        match self.provider.close(&self.handle) {
            Ok(()) => debug!("closed {:?}", self.handle),
            Err(e) => warn!("failed to close QKD key handle {:?}: {e}", self.handle),
        }
    }
}

struct InitiatorState {
    handle: KeyHandle,
    qos: Qos,
    /// `None` in fixed test key mode, and once the handle has been released.
    session: Option<OpenHandle>,
}

struct ResponderState {
    handle: KeyHandle,
}

enum RoleState {
    Unresolved,
    Initiator(InitiatorState),
    Responder(ResponderState),
}

/// One key exchange between this endpoint and a peer.
///
/// An exchange is used for exactly one handshake and then dropped. Dropping it releases
/// any provider session it still holds.
pub struct KeyExchange {
    provider: Arc<dyn QkdProvider>,
    config: Arc<ExchangeConfig>,
    roles: Arc<dyn RoleResolver>,
    peer: PeerAddress,
    state: ExchangeState,
    role: RoleState,
}

impl KeyExchange {
    /// Create an idle exchange with `peer`.
    pub fn new(
        provider: Arc<dyn QkdProvider>,
        config: Arc<ExchangeConfig>,
        roles: Arc<dyn RoleResolver>,
        peer: PeerAddress,
    ) -> Self {
        Self {
            provider,
            config,
            roles,
            peer,
            state: ExchangeState::Idle,
            role: RoleState::Unresolved,
        }
    }

    /// Current state.
    pub fn state(&self) -> ExchangeState {
        self.state
    }

    /// The role, once resolved.
    pub fn role(&self) -> Option<Role> {
        match self.role {
            RoleState::Unresolved => None,
            RoleState::Initiator(_) => Some(Role::Initiator),
            RoleState::Responder(_) => Some(Role::Responder),
        }
    }

    /// The key handle, once fixed.
    pub fn key_handle(&self) -> Option<KeyHandle> {
        match &self.role {
            RoleState::Unresolved => None,
            RoleState::Initiator(s) => Some(s.handle),
            RoleState::Responder(s) => Some(s.handle),
        }
    }

    /// Produce the value for the outgoing public value slot.
    ///
    /// An initiator calls this first: it opens a provider session and returns the new
    /// handle. A responder calls this after [`compute_shared_secret`] and gets back the
    /// handle it bound to; calling it earlier fails with [`ExchangeError::OutOfOrder`].
    ///
    /// [`compute_shared_secret`]: Self::compute_shared_secret
    pub fn produce_local_public_value(&mut self) -> Result<KeyHandle, ExchangeError> {
        let result = self.try_produce();
        self.fail_on_error(result)
    }

    /// Compute the shared secret given the peer's public value.
    ///
    /// A responder calls this first, with the initiator's handle. An initiator calls this
    /// after [`produce_local_public_value`], with the handle echoed by the responder.
    /// May block for up to the configured timeout while waiting for the peer.
    ///
    /// [`produce_local_public_value`]: Self::produce_local_public_value
    pub fn compute_shared_secret(
        &mut self,
        peer_public_value: &[u8],
    ) -> Result<SharedSecret, ExchangeError> {
        let result = self.try_compute(peer_public_value);
        self.fail_on_error(result)
    }

    fn try_produce(&mut self) -> Result<KeyHandle, ExchangeError> {
        match (self.state, &self.role) {
            (ExchangeState::Idle, _) => {}
            (ExchangeState::SecretReady, RoleState::Responder(s)) => return Ok(s.handle),
            _ => {
                return Err(ExchangeError::OutOfOrder(
                    "local public value already produced",
                ))
            }
        }

        let (role, qos) = self.begin()?;
        if role == Role::Responder {
            return Err(ExchangeError::OutOfOrder(
                "responder must see the initiator's key handle first",
            ));
        }

        let (handle, session) = if self.config.use_fixed_test_key {
            (fixed::test_handle(), None)
        } else {
            let session = OpenHandle::open(&self.provider, &self.peer, &qos, None)?;
            (session.handle, Some(session))
        };
        self.role = RoleState::Initiator(InitiatorState {
            handle,
            qos,
            session,
        });
        self.advance(ExchangeState::HandleReady);
        Ok(handle)
    }

    fn try_compute(&mut self, peer_public_value: &[u8]) -> Result<SharedSecret, ExchangeError> {
        match (self.state, &self.role) {
            (ExchangeState::Idle, _) => {
                let (role, qos) = self.begin()?;
                match role {
                    Role::Responder => self.respond(peer_public_value, qos),
                    Role::Initiator => Err(ExchangeError::OutOfOrder(
                        "initiator must publish its key handle first",
                    )),
                }
            }
            (ExchangeState::HandleReady, RoleState::Initiator(s)) => {
                let (handle, qos) = (s.handle, s.qos);
                if self.config.verify_handle_echo && peer_public_value != handle.as_bytes() {
                    return Err(ExchangeError::HandleMismatch);
                }
                let secret = self.retrieve(&handle, &qos)?;
                self.release();
                Ok(secret)
            }
            _ => Err(ExchangeError::OutOfOrder("shared secret already computed")),
        }
    }

    fn respond(
        &mut self,
        peer_public_value: &[u8],
        qos: Qos,
    ) -> Result<SharedSecret, ExchangeError> {
        let handle = KeyHandle::from_public_value(peer_public_value)?;
        self.role = RoleState::Responder(ResponderState { handle });

        let session = if self.config.use_fixed_test_key {
            None
        } else {
            let session = OpenHandle::open(&self.provider, &self.peer, &qos, Some(handle))?;
            if session.handle != handle {
                return Err(ExchangeError::HandleMismatch);
            }
            Some(session)
        };
        self.advance(ExchangeState::HandleReady);

        let secret = self.retrieve(&handle, &qos)?;
        drop(session);
        Ok(secret)
    }

    /// Resolve the role and size the secret.
    fn begin(&mut self) -> Result<(Role, Qos), ExchangeError> {
        self.advance(ExchangeState::HandleEstablishing);
        let role = self
            .roles
            .resolve_role()
            .ok_or(ExchangeError::RoleUndetermined)?;
        let qos = self.config.qos()?;
        if self.config.use_fixed_test_key {
            warn!("QKD key exchange using fixed test key material; this is insecure");
        }
        debug!(
            "QKD key exchange as {role} with {}, {} bit secret",
            self.peer, qos.requested_length
        );
        Ok((role, qos))
    }

    fn retrieve(&mut self, handle: &KeyHandle, qos: &Qos) -> Result<SharedSecret, ExchangeError> {
        self.advance(ExchangeState::Rendezvousing);
        if !self.config.use_fixed_test_key {
            self.provider.connect(handle)?;
        }

        self.advance(ExchangeState::SecretRetrieving);
        let secret = if self.config.use_fixed_test_key {
            fixed::test_secret(handle, qos.requested_length)
        } else {
            self.provider.get_key(handle, qos.requested_length)?
        };
        if secret.secret_bytes().len() != qos.requested_bytes() {
            return Err(QkdError::UnsupportedLength(qos.requested_length).into());
        }

        self.advance(ExchangeState::SecretReady);
        Ok(secret)
    }

    fn advance(&mut self, next: ExchangeState) {
        debug_assert!(next > self.state, "{:?} -> {next:?}", self.state);
        self.state = next;
    }

    /// Close the initiator's provider session, if still open.
    fn release(&mut self) {
        if let RoleState::Initiator(s) = &mut self.role {
            s.session.take();
        }
    }

    fn fail_on_error<T>(&mut self, result: Result<T, ExchangeError>) -> Result<T, ExchangeError> {
        if let Err(e) = &result {
            debug!("QKD key exchange failed in {:?}: {e}", self.state);
            // terminal states stay put
            if self.state < ExchangeState::SecretReady {
                self.state = ExchangeState::Failed;
                self.release();
            }
        }
        result
    }
}
