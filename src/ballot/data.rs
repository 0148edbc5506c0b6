//! Symmetric encryption of ballot data that is not a vote: the ballot nonce, and free-text
//! contest data such as write-in names.
//!
//! Both follow the same pattern.  A one-time ElGamal key `(alpha, beta) = (g^ξ, K̂^ξ)` against the
//! other-ballot-data key `K̂` is hashed into a secret, the secret is expanded into a keystream
//! XORed with the plaintext, and a Schnorr proof of knowledge of `ξ` is bound to the ciphertext.
//! Anyone holding `ξ`, or the secret key behind `K̂`, can recompute `beta` and decrypt.

use rand::{CryptoRng, Rng};
use serde::{Deserialize, Serialize};

use crate::crypto::group::{Element, Exponent, Group};
use crate::crypto::hash::{hash, hash_to_exponent, xor, HashValue, HASH_BYTES};
use crate::crypto::schnorr::Proof;
use crate::errors::{Error, Result};

const BLOCK_BYTES: usize = HASH_BYTES;

/// A symmetric ciphertext with the one-time key `c0 = g^ξ` and a proof of knowledge of `ξ`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedData {
    pub c0: Element,
    #[serde(with = "crate::serialize::hash::bytes")]
    pub c1: Vec<u8>,
    pub challenge: Exponent,
    pub response: Exponent,
}

impl EncryptedData {
    fn proof(&self) -> Proof {
        Proof {
            challenge: self.challenge.clone(),
            response: self.response.clone(),
        }
    }

    /// Check the proof of knowledge of `ξ` against the challenge function the ciphertext was
    /// created with.
    fn check(
        &self,
        group: &Group,
        gen_challenge: impl FnOnce(&Element) -> Result<Exponent>,
    ) -> Result<bool> {
        Ok(group.is_valid_residue(&self.c0) && self.proof().check(group, &self.c0, gen_challenge)?)
    }
}

/// How to recompute `beta = K̂^ξ` for decryption.
#[derive(Debug, Clone, Copy)]
pub enum DataKey<'a> {
    /// The encryption nonce `ξ` and the public key `K̂`.
    Nonce {
        nonce: &'a Exponent,
        public_key: &'a Element,
    },
    /// The secret key behind `K̂`.
    Secret(&'a Exponent),
}

impl DataKey<'_> {
    fn beta(&self, group: &Group, c0: &Element) -> Element {
        match self {
            DataKey::Nonce { nonce, public_key } => group.pow_p(public_key, nonce),
            DataKey::Secret(secret) => group.pow_p(c0, secret),
        }
    }
}

// Ballot nonce

/// Encrypt the 32-byte ballot nonce to the other-ballot-data key.
pub fn encrypt_ballot_nonce<R: Rng + CryptoRng>(
    group: &Group,
    public_key: &Element,
    selection_identifier_hash: &HashValue,
    ballot_nonce: &[u8; 32],
    rng: &mut R,
) -> Result<EncryptedData> {
    let xi = group.random_exponent(rng);
    let alpha = group.g_pow(&xi);
    let beta = group.pow_p(public_key, &xi);

    let k1 = ballot_nonce_keystream(selection_identifier_hash, &alpha, &beta)?;
    let c1 = xor(ballot_nonce, k1.as_ref());
    let proof = Proof::prove(group, &xi, rng, |commitment| {
        ballot_nonce_challenge(group, selection_identifier_hash, commitment, &alpha, &c1)
    })?;

    Ok(EncryptedData {
        c0: alpha,
        c1,
        challenge: proof.challenge,
        response: proof.response,
    })
}

/// Recover the ballot nonce, checking the proof first.
pub fn decrypt_ballot_nonce(
    group: &Group,
    selection_identifier_hash: &HashValue,
    data: &EncryptedData,
    key: DataKey<'_>,
) -> Result<[u8; 32]> {
    let invalid = || Error::InvalidParameters("encrypted ballot nonce is malformed".to_owned());
    let proof_ok = data.check(group, |commitment| {
        ballot_nonce_challenge(group, selection_identifier_hash, commitment, &data.c0, &data.c1)
    })?;
    if !proof_ok || data.c1.len() != 32 {
        return Err(invalid());
    }

    let beta = key.beta(group, &data.c0);
    let k1 = ballot_nonce_keystream(selection_identifier_hash, &data.c0, &beta)?;
    xor(&data.c1, k1.as_ref()).try_into().map_err(|_| invalid())
}

fn ballot_nonce_keystream(
    selection_identifier_hash: &HashValue,
    alpha: &Element,
    beta: &Element,
) -> Result<HashValue> {
    let secret = hash(selection_identifier_hash.as_ref(), &[&0x22_u8, alpha, beta])?;
    Ok(hash(
        secret.as_ref(),
        &[
            &0x01_u8,
            &"ballot_nonce",
            &0x00_u8,
            &"ballot_nonce_encrypt",
            &[0x01_u8, 0x00],
        ],
    )?)
}

fn ballot_nonce_challenge(
    group: &Group,
    selection_identifier_hash: &HashValue,
    commitment: &Element,
    c0: &Element,
    c1: &[u8],
) -> Result<Exponent> {
    Ok(hash_to_exponent(
        group,
        selection_identifier_hash.as_ref(),
        &[&0x23_u8, commitment, c0, &c1],
    )?)
}

// Contest data

/// The number of 32-byte blocks contest data is padded to.  Every contest carries the same
/// number of blocks regardless of how much text was entered.
pub fn contest_data_blocks(max_length: u32) -> usize {
    (max_length as usize).div_ceil(BLOCK_BYTES).max(1)
}

/// Encrypt `text` (already checked against the manifest's length limit) for the contest with
/// index `contest_index`, using the contest data nonce `nonce`.
pub fn encrypt_contest_data<R: Rng + CryptoRng>(
    group: &Group,
    public_key: &Element,
    selection_identifier_hash: &HashValue,
    contest_index: u32,
    text: &str,
    blocks: usize,
    nonce: &Exponent,
    rng: &mut R,
) -> Result<EncryptedData> {
    let mut padded = text.as_bytes().to_vec();
    if padded.len() > blocks * BLOCK_BYTES {
        return Err(Error::InvalidParameters(format!(
            "contest data does not fit in {blocks} blocks"
        )));
    }
    padded.resize(blocks * BLOCK_BYTES, 0);

    let alpha = group.g_pow(nonce);
    let beta = group.pow_p(public_key, nonce);
    let keystream =
        contest_data_keystream(selection_identifier_hash, contest_index, blocks, &alpha, &beta)?;
    let c1 = xor(&padded, &keystream);

    let proof = Proof::prove(group, nonce, rng, |commitment| {
        contest_data_challenge(
            group,
            selection_identifier_hash,
            contest_index,
            commitment,
            &alpha,
            &c1,
        )
    })?;

    Ok(EncryptedData {
        c0: alpha,
        c1,
        challenge: proof.challenge,
        response: proof.response,
    })
}

/// Recover contest data text, checking the proof first and stripping the zero padding.
pub fn decrypt_contest_data(
    group: &Group,
    selection_identifier_hash: &HashValue,
    contest_index: u32,
    data: &EncryptedData,
    key: DataKey<'_>,
) -> Result<String> {
    let invalid = || Error::InvalidParameters("encrypted contest data is malformed".to_owned());
    let proof_ok = data.check(group, |commitment| {
        contest_data_challenge(
            group,
            selection_identifier_hash,
            contest_index,
            commitment,
            &data.c0,
            &data.c1,
        )
    })?;
    if !proof_ok || data.c1.is_empty() || data.c1.len() % BLOCK_BYTES != 0 {
        return Err(invalid());
    }

    let blocks = data.c1.len() / BLOCK_BYTES;
    let beta = key.beta(group, &data.c0);
    let keystream =
        contest_data_keystream(selection_identifier_hash, contest_index, blocks, &data.c0, &beta)?;
    let mut plaintext = xor(&data.c1, &keystream);
    while plaintext.last() == Some(&0) {
        plaintext.pop();
    }
    String::from_utf8(plaintext).map_err(|_| invalid())
}

/// `k = H(H_I; 0x25, contest index, alpha, beta)`, expanded one block at a time as
/// `H(k; b, "data_enc_keys", 0x00, "contest_data_encrypt", contest index, 256 * blocks)` for
/// blocks `b = 1, 2, ...`.
fn contest_data_keystream(
    selection_identifier_hash: &HashValue,
    contest_index: u32,
    blocks: usize,
    alpha: &Element,
    beta: &Element,
) -> Result<Vec<u8>> {
    let secret = hash(
        selection_identifier_hash.as_ref(),
        &[&0x25_u8, &contest_index, alpha, beta],
    )?;
    let bit_length = u32::try_from(blocks * BLOCK_BYTES * 8)
        .map_err(|_| Error::InvalidParameters("contest data is too long".to_owned()))?;

    let mut keystream = Vec::with_capacity(blocks * BLOCK_BYTES);
    for block in 1..=blocks as u32 {
        let key = hash(
            secret.as_ref(),
            &[
                &block,
                &"data_enc_keys",
                &0x00_u8,
                &"contest_data_encrypt",
                &contest_index,
                &bit_length,
            ],
        )?;
        keystream.extend_from_slice(key.as_ref());
    }
    Ok(keystream)
}

fn contest_data_challenge(
    group: &Group,
    selection_identifier_hash: &HashValue,
    contest_index: u32,
    commitment: &Element,
    c0: &Element,
    c1: &[u8],
) -> Result<Exponent> {
    Ok(hash_to_exponent(
        group,
        selection_identifier_hash.as_ref(),
        &[&0x26_u8, &contest_index, commitment, c0, &c1],
    )?)
}
