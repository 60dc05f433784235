//! Deterministic key material for testing a handshake without a QKD provider.
use openssl::sha::Sha256;
use rustls::crypto::SharedSecret;
use zeroize::Zeroize;

use crate::handle::{KeyHandle, KEY_HANDLE_LEN};

const HANDLE_LABEL: &[u8] = b"rustls-qkd-kx fixed test handle";
const SECRET_LABEL: &[u8] = b"rustls-qkd-kx fixed test secret";

/// SHA-256 in counter mode over `label || context || counter`.
fn expand(label: &[u8], context: &[u8], out: &mut [u8]) {
    for (counter, chunk) in out.chunks_mut(32).enumerate() {
        let mut hasher = Sha256::new();
        hasher.update(label);
        hasher.update(context);
        hasher.update(&(counter as u32).to_be_bytes());
        let mut block = hasher.finish();
        chunk.copy_from_slice(&block[..chunk.len()]);
        block.zeroize();
    }
}

/// The handle an initiator publishes in fixed test key mode.
pub(crate) fn test_handle() -> KeyHandle {
    let mut bytes = [0u8; KEY_HANDLE_LEN];
    expand(HANDLE_LABEL, &[], &mut bytes);
    KeyHandle::new(bytes)
}

/// The secret both ends derive for `handle` in fixed test key mode.
pub(crate) fn test_secret(handle: &KeyHandle, length_bits: u32) -> SharedSecret {
    let mut secret = vec![0u8; (length_bits as usize).div_ceil(8)];
    expand(SECRET_LABEL, handle.as_bytes(), &mut secret);
    SharedSecret::from(secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        assert_eq!(test_handle(), test_handle());
        let a = test_secret(&test_handle(), 2048);
        let b = test_secret(&test_handle(), 2048);
        assert_eq!(a.secret_bytes().len(), 256);
        assert_eq!(a.secret_bytes(), b.secret_bytes());
    }

    #[test]
    fn secret_depends_on_handle() {
        let other = KeyHandle::new([7; KEY_HANDLE_LEN]);
        assert_ne!(
            test_secret(&test_handle(), 64).secret_bytes(),
            test_secret(&other, 64).secret_bytes()
        );
        assert_ne!(test_handle().as_bytes(), test_secret(&test_handle(), 512).secret_bytes());
    }
}
