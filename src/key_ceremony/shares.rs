use num::BigUint;
use rand::{CryptoRng, Rng};
use serde::{Deserialize, Serialize};

use super::keys::KeyPair;
use crate::crypto::group::{Element, Exponent, Group, EXPONENT_BYTES};
use crate::crypto::hash::{hash, hash_to_exponent, xor, HashValue};
use crate::crypto::schnorr::Proof;
use crate::errors::{Error, Result};

/// The shares `P_i(l)` and `P̂_i(l)` of guardian `i`'s two secrets, intended for guardian `l`.
///
/// `c0 = g^ξ` is an ephemeral key, `c1` holds both shares XORed with keystreams derived from
/// `κ_l^ξ`, and `proof` shows the sender knows `ξ` (binding the ciphertext to the sender and
/// recipient indices).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardianEncryptedShare {
    pub source_index: u32,
    pub destination_index: u32,
    pub c0: Element,
    #[serde(with = "crate::serialize::hash::bytes")]
    pub c1: Vec<u8>,
    pub proof: Proof,
}

/// A decrypted pair of share values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ShareValues {
    pub vote: Exponent,
    pub data: Exponent,
}

/// Evaluate the polynomial with the given coefficients (constant term first) at `x`, mod q.
pub(crate) fn evaluate<'a>(
    group: &Group,
    coefficients: impl DoubleEndedIterator<Item = &'a Exponent>,
    x: u32,
) -> Exponent {
    let x = Exponent::from(x);
    coefficients
        .rev()
        .fold(Exponent::zero(), |acc, a| group.add_q(&group.mul_q(&acc, &x), a))
}

/// Check a share against the sender's commitments: `g^{P(x)} == Π_j K_j^{x^j}`.
pub(crate) fn matches_commitments(
    group: &Group,
    share: &Exponent,
    commitments: &[Element],
    x: u32,
) -> bool {
    let x = Exponent::from(x);
    let mut power = Exponent::from(1);
    let mut expected = Element::one();
    for commitment in commitments {
        expected = group.mul_p(&expected, &group.pow_p(commitment, &power));
        power = group.mul_q(&power, &x);
    }
    group.g_pow(share) == expected
}

pub(crate) fn encrypt<R: Rng + CryptoRng>(
    group: &Group,
    parameter_base_hash: &HashValue,
    source_index: u32,
    destination_index: u32,
    destination_key: &Element,
    values: &ShareValues,
    rng: &mut R,
) -> Result<GuardianEncryptedShare> {
    let ephemeral = KeyPair::random(group, rng);
    let alpha = ephemeral.public().clone();
    let beta = group.pow_p(destination_key, ephemeral.secret());

    let (k1, k2) = keystreams(
        parameter_base_hash,
        source_index,
        destination_index,
        destination_key,
        &alpha,
        &beta,
    )?;
    let mut c1 = xor(&values.vote.to_bytes_be(), k1.as_ref());
    c1.extend(xor(&values.data.to_bytes_be(), k2.as_ref()));

    let proof = Proof::prove(group, ephemeral.secret(), rng, |commitment| {
        challenge(
            group,
            parameter_base_hash,
            source_index,
            destination_index,
            commitment,
            &alpha,
            &c1,
        )
    })?;

    Ok(GuardianEncryptedShare {
        source_index,
        destination_index,
        c0: alpha,
        c1,
        proof,
    })
}

/// Decrypt a share addressed to the holder of `communication_key`, checking the sender's proof
/// first.
pub(crate) fn decrypt(
    group: &Group,
    parameter_base_hash: &HashValue,
    share: &GuardianEncryptedShare,
    communication_key: &KeyPair,
) -> Result<ShareValues> {
    let failed = || Error::ShareDecryptionFailed {
        source_index: share.source_index,
    };

    if share.c1.len() != 2 * EXPONENT_BYTES || !group.is_valid_residue(&share.c0) {
        return Err(failed());
    }
    let proof_ok = share.proof.check(group, &share.c0, |commitment| {
        challenge(
            group,
            parameter_base_hash,
            share.source_index,
            share.destination_index,
            commitment,
            &share.c0,
            &share.c1,
        )
    })?;
    if !proof_ok {
        return Err(failed());
    }

    let beta = group.pow_p(&share.c0, communication_key.secret());
    let (k1, k2) = keystreams(
        parameter_base_hash,
        share.source_index,
        share.destination_index,
        communication_key.public(),
        &share.c0,
        &beta,
    )?;

    let (vote, data) = share.c1.split_at(EXPONENT_BYTES);
    let decode = |bytes: Vec<u8>| {
        let n = BigUint::from_bytes_be(&bytes);
        if &n < group.q() {
            Ok(group.exponent(n))
        } else {
            Err(failed())
        }
    };
    Ok(ShareValues {
        vote: decode(xor(vote, k1.as_ref()))?,
        data: decode(xor(data, k2.as_ref()))?,
    })
}

/// The two 32-byte keystreams, one per share.
fn keystreams(
    parameter_base_hash: &HashValue,
    source_index: u32,
    destination_index: u32,
    destination_key: &Element,
    alpha: &Element,
    beta: &Element,
) -> Result<(HashValue, HashValue)> {
    let secret = hash(
        parameter_base_hash.as_ref(),
        &[&0x11_u8, &source_index, &destination_index, destination_key, alpha, beta],
    )?;
    let block = |label: u8| {
        hash(
            secret.as_ref(),
            &[
                &label,
                &"share_enc_keys",
                &0x00_u8,
                &"share_encrypt",
                &source_index,
                &destination_index,
                &[0x02_u8, 0x00],
            ],
        )
    };
    Ok((block(0x01)?, block(0x02)?))
}

fn challenge(
    group: &Group,
    parameter_base_hash: &HashValue,
    source_index: u32,
    destination_index: u32,
    commitment: &Element,
    c0: &Element,
    c1: &[u8],
) -> Result<Exponent> {
    Ok(hash_to_exponent(
        group,
        parameter_base_hash.as_ref(),
        &[&0x12_u8, &source_index, &destination_index, commitment, c0, &c1],
    )?)
}
