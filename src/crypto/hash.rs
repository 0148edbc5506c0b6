use digest::Mac;
use hmac::Hmac;
use num::BigUint;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use thiserror::Error;

use super::group::{Element, Exponent, Group};

type HmacSha256 = Hmac<Sha256>;

/// Width of a hash output, and of every hash key.
pub const HASH_BYTES: usize = 32;

/// A 32-byte output of the domain hash `H`.  Hash values double as keys for the next link of the
/// hash chain (`H_P -> H_B -> H_E -> H_I`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashValue(#[serde(with = "crate::serialize::hash")] [u8; HASH_BYTES]);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HashError {
    #[error("invalid hash input: {0}")]
    InvalidInput(&'static str),
}

impl HashValue {
    pub fn from_bytes(bytes: [u8; HASH_BYTES]) -> HashValue {
        HashValue(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_BYTES] {
        &self.0
    }

    /// The hash interpreted as a big-endian integer and reduced into `Z_q`.
    pub fn to_exponent(&self, group: &Group) -> Exponent {
        group.exponent(BigUint::from_bytes_be(&self.0))
    }
}

impl AsRef<[u8]> for HashValue {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for HashValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HashValue({})", hex::encode_upper(self.0))
    }
}

impl fmt::Display for HashValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(self.0))
    }
}

/// A value that can be fed to the domain hash.  Every implementation writes a canonical,
/// fixed-layout encoding: the byte order and widths are part of what verifiers reproduce.
pub trait HashInput {
    fn write_to(&self, buf: &mut Vec<u8>);
}

/// One-byte domain separation tags and the `0x00` label separators.
impl HashInput for u8 {
    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.push(*self);
    }
}

/// Indices, counts, and lengths are 4-byte big-endian.
impl HashInput for u32 {
    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.to_be_bytes());
    }
}

impl HashInput for str {
    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.as_bytes());
    }
}

impl HashInput for [u8] {
    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self);
    }
}

impl<const N: usize> HashInput for [u8; N] {
    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self);
    }
}

impl HashInput for Vec<u8> {
    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self);
    }
}

impl HashInput for Element {
    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.to_bytes_be());
    }
}

impl HashInput for Exponent {
    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.to_bytes_be());
    }
}

impl HashInput for HashValue {
    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.0);
    }
}

impl<T: HashInput + ?Sized> HashInput for &T {
    fn write_to(&self, buf: &mut Vec<u8>) {
        (**self).write_to(buf)
    }
}

/// The domain hash `H(key; parts...)`: HMAC-SHA-256 keyed with a 32-byte key over the
/// concatenation of the parts.  Callers put the one-byte domain separation tag first.
pub fn hash(key: &[u8], parts: &[&dyn HashInput]) -> Result<HashValue, HashError> {
    if key.is_empty() {
        return Err(HashError::InvalidInput("missing hash key"));
    }
    if key.len() != HASH_BYTES {
        return Err(HashError::InvalidInput("hash key must be 32 bytes"));
    }
    if parts.is_empty() {
        return Err(HashError::InvalidInput("no data to hash"));
    }

    let mut data = Vec::new();
    for part in parts {
        part.write_to(&mut data);
    }

    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|_| HashError::InvalidInput("hash key must be 32 bytes"))?;
    mac.update(&data);
    let digest: [u8; HASH_BYTES] = mac.finalize().into_bytes().into();
    Ok(HashValue(digest))
}

/// `H_q(key; parts...)`: the domain hash reduced into `Z_q`.
pub fn hash_to_exponent(
    group: &Group,
    key: &[u8],
    parts: &[&dyn HashInput],
) -> Result<Exponent, HashError> {
    Ok(hash(key, parts)?.to_exponent(group))
}

/// XOR `data` with a keystream of the same length.
pub(crate) fn xor(data: &[u8], keystream: &[u8]) -> Vec<u8> {
    data.iter().zip(keystream).map(|(d, k)| d ^ k).collect()
}
