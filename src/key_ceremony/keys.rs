use rand::{CryptoRng, Rng};
use serde::{Deserialize, Serialize};

use crate::crypto::group::{Element, Exponent, Group};
use crate::crypto::hash::{hash_to_exponent, HashInput, HashValue};
use crate::crypto::schnorr::BatchProof;
use crate::errors::Result;

/// Labels distinguishing the two key purposes in the key proof challenge.
pub(crate) const VOTE_LABEL: &str = "pk_vote";
pub(crate) const DATA_LABEL: &str = "pk_data";

/// A secret exponent with its public key `g^secret`.
#[derive(Debug, Clone)]
pub struct KeyPair {
    secret: Exponent,
    public: Element,
}

impl KeyPair {
    pub fn random<R: Rng + CryptoRng>(group: &Group, rng: &mut R) -> KeyPair {
        let secret = group.random_exponent(rng);
        let public = group.g_pow(&secret);
        KeyPair { secret, public }
    }

    pub fn secret(&self) -> &Exponent {
        &self.secret
    }

    pub fn public(&self) -> &Element {
        &self.public
    }
}

/// Everything a guardian generates at the start of the ceremony.
///
/// The `k` vote encryption key pairs are the coefficients `a_{i,j}` of the guardian's secret
/// sharing polynomial `P_i` and their commitments `K_{i,j} = g^{a_{i,j}}`; the other ballot data
/// keys play the same role for `P̂_i`.  The communication key pair is only used to receive
/// shares from the other guardians.  Never leaves the guardian: the public half is shared as a
/// `GuardianPublicView`.
#[derive(Debug, Clone)]
pub struct GuardianKeys {
    index: u32,
    vote_encryption_keys: Vec<KeyPair>,
    other_ballot_data_keys: Vec<KeyPair>,
    communication_key: KeyPair,
    vote_encryption_proof: BatchProof,
    other_data_encryption_proof: BatchProof,
}

/// The public keys and proofs of one guardian, as sent to the other guardians and published in
/// the guardian record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardianPublicView {
    /// The 1-based guardian index `i`.
    pub index: u32,
    /// `K_{i,0} .. K_{i,k-1}`.
    pub vote_encryption_commitments: Vec<Element>,
    /// `K̂_{i,0} .. K̂_{i,k-1}`.
    pub other_ballot_data_encryption_commitments: Vec<Element>,
    /// `κ_i`.
    pub communication_public_key: Element,
    /// Proof of knowledge of all `a_{i,j}` and the communication secret.
    pub vote_encryption_proof: BatchProof,
    /// Proof of knowledge of all `â_{i,j}` and the communication secret.
    pub other_data_encryption_proof: BatchProof,
}

/// The joint election public keys `K = Π K_{i,0}` and `K̂ = Π K̂_{i,0}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionPublicKeys {
    pub vote_encryption_key: Element,
    pub other_ballot_data_encryption_key: Element,
}

impl GuardianKeys {
    /// Sample `k` coefficients for each polynomial plus a communication key, and prove knowledge
    /// of all of them.
    pub fn generate<R: Rng + CryptoRng>(
        group: &Group,
        parameter_base_hash: &HashValue,
        index: u32,
        k: u32,
        rng: &mut R,
    ) -> Result<GuardianKeys> {
        let vote_encryption_keys = (0..k).map(|_| KeyPair::random(group, rng)).collect::<Vec<_>>();
        let other_ballot_data_keys = (0..k).map(|_| KeyPair::random(group, rng)).collect::<Vec<_>>();
        let communication_key = KeyPair::random(group, rng);

        let vote_encryption_proof = prove_keys(
            group,
            parameter_base_hash,
            VOTE_LABEL,
            index,
            &vote_encryption_keys,
            &communication_key,
            rng,
        )?;
        let other_data_encryption_proof = prove_keys(
            group,
            parameter_base_hash,
            DATA_LABEL,
            index,
            &other_ballot_data_keys,
            &communication_key,
            rng,
        )?;

        Ok(GuardianKeys {
            index,
            vote_encryption_keys,
            other_ballot_data_keys,
            communication_key,
            vote_encryption_proof,
            other_data_encryption_proof,
        })
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn to_public_view(&self) -> GuardianPublicView {
        GuardianPublicView {
            index: self.index,
            vote_encryption_commitments: publics(&self.vote_encryption_keys),
            other_ballot_data_encryption_commitments: publics(&self.other_ballot_data_keys),
            communication_public_key: self.communication_key.public().clone(),
            vote_encryption_proof: self.vote_encryption_proof.clone(),
            other_data_encryption_proof: self.other_data_encryption_proof.clone(),
        }
    }

    pub(crate) fn vote_coefficients(&self) -> impl DoubleEndedIterator<Item = &Exponent> {
        self.vote_encryption_keys.iter().map(KeyPair::secret)
    }

    pub(crate) fn data_coefficients(&self) -> impl DoubleEndedIterator<Item = &Exponent> {
        self.other_ballot_data_keys.iter().map(KeyPair::secret)
    }

    pub(crate) fn communication_key(&self) -> &KeyPair {
        &self.communication_key
    }
}

fn publics(pairs: &[KeyPair]) -> Vec<Element> {
    pairs.iter().map(|p| p.public().clone()).collect()
}

fn prove_keys<R: Rng + CryptoRng>(
    group: &Group,
    parameter_base_hash: &HashValue,
    label: &str,
    index: u32,
    coefficients: &[KeyPair],
    communication_key: &KeyPair,
    rng: &mut R,
) -> Result<BatchProof> {
    let secrets = coefficients
        .iter()
        .chain(Some(communication_key))
        .map(KeyPair::secret)
        .collect::<Vec<_>>();
    let commitments = coefficients.iter().map(KeyPair::public).collect::<Vec<_>>();

    BatchProof::prove(group, &secrets, rng, |h| {
        key_proof_challenge(
            group,
            parameter_base_hash,
            label,
            index,
            &commitments,
            communication_key.public(),
            h,
        )
    })
}

/// `c_i = H_q(H_P; 0x10, label, i, K_{i,0} .. K_{i,k-1}, κ_i, h_{i,0} .. h_{i,k})`.
pub(crate) fn key_proof_challenge(
    group: &Group,
    parameter_base_hash: &HashValue,
    label: &str,
    index: u32,
    commitments: &[&Element],
    communication_key: &Element,
    h: &[Element],
) -> Result<Exponent> {
    let mut parts: Vec<&dyn HashInput> = vec![&0x10_u8, &label, &index];
    parts.extend(commitments.iter().map(|c| c as &dyn HashInput));
    parts.push(communication_key);
    parts.extend(h.iter().map(|h| h as &dyn HashInput));
    Ok(hash_to_exponent(group, parameter_base_hash.as_ref(), &parts)?)
}

impl GuardianPublicView {
    /// The public keys each proof covers: the commitments followed by the communication key.
    pub fn vote_proof_keys(&self) -> Vec<&Element> {
        self.vote_encryption_commitments
            .iter()
            .chain(Some(&self.communication_public_key))
            .collect()
    }

    pub fn data_proof_keys(&self) -> Vec<&Element> {
        self.other_ballot_data_encryption_commitments
            .iter()
            .chain(Some(&self.communication_public_key))
            .collect()
    }
}

impl ElectionPublicKeys {
    /// Combine the constant-term commitments of every guardian.
    pub fn from_guardians(group: &Group, guardians: &[GuardianPublicView]) -> ElectionPublicKeys {
        ElectionPublicKeys {
            vote_encryption_key: group.product_p(
                guardians
                    .iter()
                    .filter_map(|g| g.vote_encryption_commitments.first()),
            ),
            other_ballot_data_encryption_key: group.product_p(
                guardians
                    .iter()
                    .filter_map(|g| g.other_ballot_data_encryption_commitments.first()),
            ),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::elgamal::test::group;

    #[test]
    fn generated_proofs_recompute() {
        let group = group();
        let h_p = HashValue::from_bytes([1; 32]);
        let keys = GuardianKeys::generate(group, &h_p, 2, 3, &mut rand::thread_rng()).unwrap();
        let view = keys.to_public_view();
        assert_eq!(view.index, 2);
        assert_eq!(view.vote_encryption_commitments.len(), 3);
        assert_eq!(view.vote_encryption_proof.responses.len(), 4);

        let h = view
            .vote_encryption_proof
            .commitments(group, &view.vote_proof_keys())
            .unwrap();
        let commitments = view.vote_encryption_commitments.iter().collect::<Vec<_>>();
        let c = key_proof_challenge(
            group,
            &h_p,
            VOTE_LABEL,
            2,
            &commitments,
            &view.communication_public_key,
            &h,
        )
        .unwrap();
        assert_eq!(c, view.vote_encryption_proof.challenge);
    }

    #[test]
    fn joint_key_is_product_of_constant_terms() {
        let group = group();
        let h_p = HashValue::from_bytes([1; 32]);
        let mut rng = rand::thread_rng();
        let a = GuardianKeys::generate(group, &h_p, 1, 2, &mut rng).unwrap();
        let b = GuardianKeys::generate(group, &h_p, 2, 2, &mut rng).unwrap();
        let joint = ElectionPublicKeys::from_guardians(group, &[a.to_public_view(), b.to_public_view()]);

        let secret = group.add_q(
            a.vote_coefficients().next().unwrap(),
            b.vote_coefficients().next().unwrap(),
        );
        assert_eq!(joint.vote_encryption_key, group.g_pow(&secret));
    }
}
