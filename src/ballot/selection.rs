use rand::{CryptoRng, Rng};
use serde::{Deserialize, Serialize};

use crate::crypto::chaum_pedersen::{RangeProof, Status};
use crate::crypto::elgamal::Ciphertext;
use crate::crypto::group::{Element, Exponent, Group};
use crate::crypto::hash::{hash_to_exponent, HashInput, HashValue};
use crate::errors::Result;

/// A ciphertext together with a proof that it encrypts a value in `0..=limit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedValueWithProofs {
    #[serde(flatten)]
    pub ciphertext: Ciphertext,
    pub proof: RangeProof,
}

/// The encryption of one choice on a ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedSelection {
    pub choice_id: String,
    #[serde(flatten)]
    pub value: EncryptedValueWithProofs,
}

/// Where a range proof sits on the ballot: the contest index, and the choice index for
/// selections.  Contest totals and the metadata counters have no choice index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofContext<'a> {
    pub selection_identifier_hash: &'a HashValue,
    pub contest_index: u32,
    pub choice_index: Option<u32>,
}

impl ProofContext<'_> {
    /// `c = H_q(H_I; 0x24, contest index, [choice index], alpha, beta, a_0, b_0, ..., a_L, b_L)`.
    pub fn challenge(
        &self,
        group: &Group,
        ciphertext: &Ciphertext,
        commitments: &[(Element, Element)],
    ) -> Result<Exponent> {
        let mut parts: Vec<&dyn HashInput> = vec![&0x24_u8, &self.contest_index];
        if let Some(choice_index) = &self.choice_index {
            parts.push(choice_index);
        }
        parts.push(&ciphertext.alpha);
        parts.push(&ciphertext.beta);
        for (a, b) in commitments {
            parts.push(a);
            parts.push(b);
        }
        Ok(hash_to_exponent(
            group,
            self.selection_identifier_hash.as_ref(),
            &parts,
        )?)
    }
}

impl EncryptedValueWithProofs {
    /// Encrypt `value` under `public_key` with `nonce` and prove it lies in `0..=limit`.
    pub fn encrypt<R: Rng + CryptoRng>(
        group: &Group,
        public_key: &Element,
        context: ProofContext<'_>,
        value: u32,
        limit: u32,
        nonce: &Exponent,
        rng: &mut R,
    ) -> Result<EncryptedValueWithProofs> {
        let ciphertext = Ciphertext::encrypt(group, public_key, value, nonce);
        let proof = RangeProof::prove(
            group,
            public_key,
            &ciphertext,
            nonce,
            value,
            limit,
            rng,
            |commitments| context.challenge(group, &ciphertext, commitments),
        )?;
        Ok(EncryptedValueWithProofs { ciphertext, proof })
    }

    /// Prove that an already-formed ciphertext (such as a homomorphic sum of selections) holds
    /// `value`, given its aggregate `nonce`.
    pub fn prove_existing<R: Rng + CryptoRng>(
        group: &Group,
        public_key: &Element,
        context: ProofContext<'_>,
        ciphertext: Ciphertext,
        value: u32,
        limit: u32,
        nonce: &Exponent,
        rng: &mut R,
    ) -> Result<RangeProof> {
        RangeProof::prove(
            group,
            public_key,
            &ciphertext,
            nonce,
            value,
            limit,
            rng,
            |commitments| context.challenge(group, &ciphertext, commitments),
        )
    }

    pub fn check(
        &self,
        group: &Group,
        public_key: &Element,
        context: ProofContext<'_>,
        limit: u32,
    ) -> Result<Status> {
        self.proof
            .check(group, public_key, &self.ciphertext, limit, |commitments| {
                context.challenge(group, &self.ciphertext, commitments)
            })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::elgamal::test::{group, public_key};

    #[test]
    fn context_binds_choice_index() {
        let group = group();
        let key = public_key();
        let h_i = HashValue::from_bytes([2; 32]);
        let mut rng = rand::thread_rng();
        let nonce = group.random_exponent(&mut rng);
        let context = ProofContext {
            selection_identifier_hash: &h_i,
            contest_index: 1,
            choice_index: Some(2),
        };

        let value =
            EncryptedValueWithProofs::encrypt(group, &key, context, 1, 1, &nonce, &mut rng).unwrap();
        let status = value.check(group, &key, context, 1).unwrap();
        dbg!(&status);
        assert!(status.is_ok());

        let moved = ProofContext {
            choice_index: Some(3),
            ..context
        };
        assert!(!value.check(group, &key, moved, 1).unwrap().challenge);

        let contest_level = ProofContext {
            choice_index: None,
            ..context
        };
        assert!(!value.check(group, &key, contest_level, 1).unwrap().challenge);
    }
}
