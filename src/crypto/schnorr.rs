use rand::{CryptoRng, Rng};
use serde::{Deserialize, Serialize};

use super::group::{Element, Exponent, Group};
use crate::errors::Result;

/// A proof of posession of a secret exponent.
///
/// A non-interactive zero-knowledge proof of knowledge of an exponent `s` with `K = g^s`.  Only
/// the challenge and response are stored: the commitment is recovered by the verifier as
/// `g^v K^c`, and the proof holds if hashing that commitment reproduces `c`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    /// The challenge `c`, produced by hashing the commitment `g^u` together with whatever context
    /// the caller binds the proof to.
    pub challenge: Exponent,

    /// The response `v = u - c s mod q`.
    pub response: Exponent,
}

impl Proof {
    /// Prove knowledge of `secret`.  `gen_challenge` receives the commitment `g^u` and returns the
    /// challenge.
    pub fn prove<R: Rng + CryptoRng>(
        group: &Group,
        secret: &Exponent,
        rng: &mut R,
        gen_challenge: impl FnOnce(&Element) -> Result<Exponent>,
    ) -> Result<Proof> {
        let u = group.random_exponent(rng);
        let commitment = group.g_pow(&u);
        let challenge = gen_challenge(&commitment)?;
        let response = group.sub_q(&u, &group.mul_q(&challenge, secret));
        Ok(Proof {
            challenge,
            response,
        })
    }

    /// The commitment implied by this transcript for `public_key`: `g^v K^c`.
    pub fn commitment(&self, group: &Group, public_key: &Element) -> Element {
        group.mul_p(
            &group.g_pow(&self.response),
            &group.pow_p(public_key, &self.challenge),
        )
    }

    /// Check the proof against `public_key` by recomputing the commitment and the challenge.
    pub fn check(
        &self,
        group: &Group,
        public_key: &Element,
        gen_challenge: impl FnOnce(&Element) -> Result<Exponent>,
    ) -> Result<bool> {
        let commitment = self.commitment(group, public_key);
        Ok(gen_challenge(&commitment)? == self.challenge)
    }
}

/// Knowledge of several secrets `s_0 .. s_n` at once, sharing a single challenge.  Guardians use
/// this to prove possession of all their polynomial coefficients and their communication key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchProof {
    pub challenge: Exponent,
    /// `v_j = u_j - c s_j`, in the same order as the secrets.
    pub responses: Vec<Exponent>,
}

impl BatchProof {
    pub fn prove<R: Rng + CryptoRng>(
        group: &Group,
        secrets: &[&Exponent],
        rng: &mut R,
        gen_challenge: impl FnOnce(&[Element]) -> Result<Exponent>,
    ) -> Result<BatchProof> {
        let nonces = secrets
            .iter()
            .map(|_| group.random_exponent(rng))
            .collect::<Vec<_>>();
        let commitments = nonces.iter().map(|u| group.g_pow(u)).collect::<Vec<_>>();
        let challenge = gen_challenge(&commitments)?;
        let responses = nonces
            .iter()
            .zip(secrets)
            .map(|(u, s)| group.sub_q(u, &group.mul_q(&challenge, s)))
            .collect();
        Ok(BatchProof {
            challenge,
            responses,
        })
    }

    /// Recompute `h_j = g^{v_j} K_j^c` for each public key.  Returns `None` if the number of
    /// responses does not match the number of keys.
    pub fn commitments(&self, group: &Group, public_keys: &[&Element]) -> Option<Vec<Element>> {
        if public_keys.len() != self.responses.len() {
            return None;
        }
        Some(
            self.responses
                .iter()
                .zip(public_keys)
                .map(|(v, k)| {
                    group.mul_p(&group.g_pow(v), &group.pow_p(k, &self.challenge))
                })
                .collect(),
        )
    }
}
