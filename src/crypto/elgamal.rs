use num::BigUint;
use serde::{Deserialize, Serialize};

use super::group::{Element, Exponent, Group};

/// A value encrypted with exponential ElGamal: `(alpha, beta) = (g^ξ, K^(ξ+v))` for nonce `ξ`,
/// public key `K` and plaintext `v`.
///
/// Putting the plaintext in the exponent of `K` makes the scheme additively homomorphic:
/// multiplying two ciphertexts component-wise encrypts the sum of their plaintexts under the sum
/// of their nonces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ciphertext {
    /// The one-time public key `g^ξ`.
    pub alpha: Element,
    /// The blinded plaintext `K^(ξ+v)`.
    pub beta: Element,
}

impl Ciphertext {
    pub fn encrypt(group: &Group, public_key: &Element, value: u32, nonce: &Exponent) -> Ciphertext {
        let alpha = group.g_pow(nonce);
        let beta = group.pow_p(public_key, &group.add_q(nonce, &value.into()));
        Ciphertext { alpha, beta }
    }

    /// `(1, 1)`, the encryption of zero with a zero nonce.  It is the identity for `h_add`.
    pub fn identity() -> Ciphertext {
        Ciphertext {
            alpha: Element::one(),
            beta: Element::one(),
        }
    }

    /// Homomorphic addition of the underlying plaintexts.
    pub fn h_add(&self, group: &Group, other: &Ciphertext) -> Ciphertext {
        Ciphertext {
            alpha: group.mul_p(&self.alpha, &other.alpha),
            beta: group.mul_p(&self.beta, &other.beta),
        }
    }

    /// Homomorphic scaling of the plaintext by an integer weight.
    pub fn scale(&self, group: &Group, weight: u32) -> Ciphertext {
        let weight = BigUint::from(weight);
        Ciphertext {
            alpha: group.pow_uint(&self.alpha, &weight),
            beta: group.pow_uint(&self.beta, &weight),
        }
    }

    /// Recover the plaintext given the encryption nonce, searching `0..=bound`.
    pub fn decrypt_with_nonce(
        &self,
        group: &Group,
        public_key: &Element,
        nonce: &Exponent,
        bound: u32,
    ) -> Option<u32> {
        let blinding = group.pow_p(public_key, nonce);
        let target = group.div_p(&self.beta, &blinding);
        group
            .bounded_log(public_key, &target, bound.into())
            .map(|v| v as u32)
    }

    /// Recover the plaintext given the secret key `s` with `K = g^s`, searching `0..=bound`.
    pub fn decrypt_with_secret(
        &self,
        group: &Group,
        public_key: &Element,
        secret_key: &Exponent,
        bound: u32,
    ) -> Option<u32> {
        let blinding = group.pow_p(&self.alpha, secret_key);
        let target = group.div_p(&self.beta, &blinding);
        group
            .bounded_log(public_key, &target, bound.into())
            .map(|v| v as u32)
    }
}

#[cfg(test)]
pub mod test {
    use super::*;
    use crate::parameters::CryptographicParameters;
    use proptest::prelude::*;

    pub fn group() -> &'static Group {
        CryptographicParameters::test_group().group()
    }

    pub fn secret_key() -> Exponent {
        group().exponent(BigUint::from(0x5eed_u32) << 200)
    }

    pub fn public_key() -> Element {
        group().g_pow(&secret_key())
    }

    #[test]
    fn homomorphic_sum_decrypts_to_sum() {
        let group = group();
        let key = public_key();
        let a = Ciphertext::encrypt(group, &key, 2, &11_u32.into());
        let b = Ciphertext::encrypt(group, &key, 3, &31_u32.into());
        let sum = a.h_add(group, &b);
        assert_eq!(sum.decrypt_with_nonce(group, &key, &42_u32.into(), 10), Some(5));
        assert_eq!(sum.decrypt_with_secret(group, &key, &secret_key(), 10), Some(5));
    }

    #[test]
    fn scaled_ciphertext_multiplies_plaintext() {
        let group = group();
        let key = public_key();
        let ct = Ciphertext::encrypt(group, &key, 1, &9_u32.into()).scale(group, 4);
        assert_eq!(ct.decrypt_with_secret(group, &key, &secret_key(), 10), Some(4));
    }

    #[test]
    fn identity_is_neutral() {
        let group = group();
        let ct = Ciphertext::encrypt(group, &public_key(), 1, &5_u32.into());
        assert_eq!(Ciphertext::identity().h_add(group, &ct), ct);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn decrypt_inverts_encrypt(value in 0_u32..=5, nonce in any::<u64>()) {
            let group = group();
            let key = public_key();
            let nonce = group.exponent(BigUint::from(nonce));
            let ct = Ciphertext::encrypt(group, &key, value, &nonce);
            prop_assert_eq!(ct.decrypt_with_nonce(group, &key, &nonce, 5), Some(value));
        }
    }
}
