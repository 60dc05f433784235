//! An in-memory QKD provider standing in for a simulated quantum network.
//!
//! Both ends of a link share one [`SimulatedQkd`] (typically through an `Arc`). Handles and
//! key material come from the OpenSSL random number generator.
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::debug;
use openssl::rand::rand_bytes;
use rustls::crypto::SharedSecret;
use zeroize::Zeroizing;

use crate::handle::{KeyHandle, PeerAddress, Qos, KEY_HANDLE_LEN};
use crate::policy::SIMULATED_SECRET_BITS;
use crate::qkd::{QkdError, QkdProvider};

#[derive(Debug)]
struct Session {
    /// Endpoints that have opened the handle and not yet closed it.
    open: u32,
    /// Endpoints that have ever opened the handle.
    joined: u32,
    timeout: Duration,
    key: Option<Zeroizing<Vec<u8>>>,
}

/// A thread-safe simulated QKD provider.
#[derive(Debug)]
pub struct SimulatedQkd {
    sessions: Mutex<HashMap<KeyHandle, Session>>,
    joined: Condvar,
    reachable: AtomicBool,
    max_key_bits: u32,
}

impl Default for SimulatedQkd {
    fn default() -> Self {
        Self::new(SIMULATED_SECRET_BITS)
    }
}

impl SimulatedQkd {
    /// A provider that delivers secrets of at most `max_key_bits` bits.
    pub fn new(max_key_bits: u32) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            joined: Condvar::new(),
            reachable: AtomicBool::new(true),
            max_key_bits,
        }
    }

    /// Make every subsequent call fail with [`QkdError::ProviderUnreachable`], or undo that.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Number of sessions with at least one endpoint still open.
    pub fn open_sessions(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<KeyHandle, Session>>, QkdError> {
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(QkdError::ProviderUnreachable("simulator offline".into()));
        }
        self.sessions
            .lock()
            .map_err(|_| QkdError::ProviderUnreachable("simulator state poisoned".into()))
    }

    fn check_length(&self, length_bits: u32) -> Result<(), QkdError> {
        if length_bits == 0 || length_bits > self.max_key_bits {
            return Err(QkdError::UnsupportedLength(length_bits));
        }
        Ok(())
    }
}

fn random(out: &mut [u8]) -> Result<(), QkdError> {
    rand_bytes(out).map_err(|e| QkdError::ProviderUnreachable(format!("OpenSSL error: {e}")))
}

impl QkdProvider for SimulatedQkd {
    fn open(
        &self,
        peer: &PeerAddress,
        qos: &Qos,
        handle: Option<KeyHandle>,
    ) -> Result<KeyHandle, QkdError> {
        self.check_length(qos.requested_length)?;
        let mut sessions = self.lock()?;

        let handle = match handle {
            Some(handle) => {
                let session = sessions.get_mut(&handle).ok_or(QkdError::UnknownHandle)?;
                session.open += 1;
                session.joined += 1;
                session.timeout = session.timeout.min(qos.timeout);
                self.joined.notify_all();
                handle
            }
            None => {
                let mut bytes = [0u8; KEY_HANDLE_LEN];
                let handle = loop {
                    random(&mut bytes)?;
                    let handle = KeyHandle::new(bytes);
                    if !sessions.contains_key(&handle) {
                        break handle;
                    }
                };
                sessions.insert(
                    handle,
                    Session {
                        open: 1,
                        joined: 1,
                        timeout: qos.timeout,
                        key: None,
                    },
                );
                handle
            }
        };
        debug!("simulator: opened {handle:?} towards {peer}");
        Ok(handle)
    }

    fn connect(&self, handle: &KeyHandle) -> Result<(), QkdError> {
        let mut sessions = self.lock()?;
        let timeout = sessions
            .get(handle)
            .ok_or(QkdError::UnknownHandle)?
            .timeout;
        let deadline = Instant::now() + timeout;

        loop {
            match sessions.get(handle) {
                None => return Err(QkdError::UnknownHandle),
                Some(session) if session.joined >= 2 => return Ok(()),
                Some(_) => {}
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(QkdError::Timeout);
            }
            sessions = self
                .joined
                .wait_timeout(sessions, deadline - now)
                .map_err(|_| QkdError::ProviderUnreachable("simulator state poisoned".into()))?
                .0;
        }
    }

    fn get_key(&self, handle: &KeyHandle, length_bits: u32) -> Result<SharedSecret, QkdError> {
        self.check_length(length_bits)?;
        let mut sessions = self.lock()?;
        let session = sessions.get_mut(handle).ok_or(QkdError::UnknownHandle)?;
        if session.joined < 2 {
            return Err(QkdError::NotConnected);
        }

        let len = (length_bits as usize).div_ceil(8);
        if session.key.is_none() {
            let mut key = Zeroizing::new(vec![0u8; len]);
            random(&mut key)?;
            session.key = Some(key);
        }
        match &session.key {
            Some(key) if key.len() == len => Ok(SharedSecret::from(key.as_slice())),
            // the first endpoint fixed a different length
            _ => Err(QkdError::UnsupportedLength(length_bits)),
        }
    }

    fn close(&self, handle: &KeyHandle) -> Result<(), QkdError> {
        let mut sessions = self.lock()?;
        let session = sessions.get_mut(handle).ok_or(QkdError::UnknownHandle)?;
        session.open -= 1;
        if session.open == 0 {
            sessions.remove(handle);
            debug!("simulator: released {handle:?}");
        }
        Ok(())
    }
}
