//! Experimental rustls key exchange that takes its shared secret from Quantum Key Distribution.
//!
//! The public values exchanged in the handshake are QKD key handles rather than
//! Diffie-Hellman shares: the initiator opens a session at its QKD provider and sends the
//! handle, the responder binds to the same handle and echoes it, and both ends then fetch
//! the identical secret from the provider.
//!
//! The handle is not secret and the echo check is not authentication. The security of the
//! exchange rests entirely on the QKD link and on the handshake's own authentication.
#![deny(missing_docs)]
mod config;
mod error;
mod exchange;
mod fixed;
mod handle;
mod kx;
mod policy;
mod qkd;
mod role;
mod simulated;

pub use config::{ExchangeConfig, DEFAULT_TIMEOUT};
pub use error::ExchangeError;
pub use exchange::{ExchangeState, KeyExchange};
pub use handle::{KeyHandle, PeerAddress, Qos, KEY_HANDLE_LEN};
pub use kx::{QkdKxGroup, QKD_NAMED_GROUP};
pub use policy::{SecretLengthPolicy, SIMULATED_SECRET_BITS};
pub use qkd::{QkdError, QkdProvider};
pub use role::{Role, RoleResolver};
pub use simulated::SimulatedQkd;
