//! How much shared secret an exchange asks the QKD provider for.
use openssl::bn::BigNum;
use rustls::ffdhe_groups::FfdheGroup;

use crate::error::ExchangeError;

/// Secret length used against a simulated provider, which cannot produce long keys in
/// reasonable time.
pub const SIMULATED_SECRET_BITS: u32 = 64;

/// Computes the secret length matching the strength of the Diffie-Hellman group the
/// exchange stands in for.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretLengthPolicy<'a> {
    dh_modulus: Option<&'a [u8]>,
}

impl<'a> SecretLengthPolicy<'a> {
    /// A policy sized from a big-endian DH prime.
    pub fn new(dh_modulus: Option<&'a [u8]>) -> Self {
        Self { dh_modulus }
    }

    /// A policy sized from a finite field group known to rustls.
    pub fn for_ffdhe_group(group: &FfdheGroup<'a>) -> Self {
        Self::new(Some(group.p))
    }

    /// Number of bits of shared secret to request.
    ///
    /// Production sizing is twice the bit length of the prime. There is no fallback to
    /// the simulated length when the prime is missing.
    pub fn required_secret_length(&self, is_simulated: bool) -> Result<u32, ExchangeError> {
        if is_simulated {
            return Ok(SIMULATED_SECRET_BITS);
        }

        let modulus = self.dh_modulus.ok_or_else(|| {
            ExchangeError::PolicyUnavailable(
                "no DH modulus configured for production sizing".into(),
            )
        })?;
        let bits = BigNum::from_slice(modulus)
            .map(|p| p.num_bits())
            .map_err(|e| ExchangeError::PolicyUnavailable(format!("OpenSSL error: {e}")))?;
        if bits <= 0 {
            return Err(ExchangeError::PolicyUnavailable("DH modulus is zero".into()));
        }
        Ok(bits as u32 * 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_ignores_modulus() {
        let p = [0xffu8; 256];
        for policy in [SecretLengthPolicy::default(), SecretLengthPolicy::new(Some(&p[..]))] {
            assert_eq!(policy.required_secret_length(true).unwrap(), 64);
        }
    }

    #[test]
    fn production_is_twice_prime_bits() {
        let p = [0xffu8; 128];
        let policy = SecretLengthPolicy::new(Some(&p[..]));
        assert_eq!(policy.required_secret_length(false).unwrap(), 2048);

        // leading zero octets do not count
        let mut padded = vec![0; 4];
        padded.extend_from_slice(&p);
        let policy = SecretLengthPolicy::new(Some(&padded[..]));
        assert_eq!(policy.required_secret_length(false).unwrap(), 2048);

        let policy = SecretLengthPolicy::for_ffdhe_group(&rustls::ffdhe_groups::FFDHE2048);
        assert_eq!(policy.required_secret_length(false).unwrap(), 4096);
    }

    #[test]
    fn production_without_modulus_fails() {
        assert!(matches!(
            SecretLengthPolicy::default().required_secret_length(false),
            Err(ExchangeError::PolicyUnavailable(_))
        ));
        assert!(matches!(
            SecretLengthPolicy::new(Some(&[0u8, 0][..])).required_secret_length(false),
            Err(ExchangeError::PolicyUnavailable(_))
        ));
    }
}
