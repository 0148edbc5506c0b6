use num::BigUint;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::crypto::group::{to_fixed_width, ELEMENT_BYTES, EXPONENT_BYTES};

fn serialize_fixed<S>(value: &BigUint, width: usize, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    hex::encode_upper(to_fixed_width(value, width)).serialize(serializer)
}

fn deserialize_fixed<'de, D>(width: usize, deserializer: D) -> Result<BigUint, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    let bytes = hex::decode(&s).map_err(de::Error::custom)?;
    if bytes.len() != width {
        return Err(de::Error::invalid_length(
            bytes.len(),
            &format!("{width} bytes").as_str(),
        ));
    }
    Ok(BigUint::from_bytes_be(&bytes))
}

/// Group elements: 512 bytes, 1024 hex digits.
pub mod element {
    use super::*;

    pub fn serialize<S>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serialize_fixed(value, ELEMENT_BYTES, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BigUint, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserialize_fixed(ELEMENT_BYTES, deserializer)
    }
}

/// Exponents: 32 bytes, 64 hex digits.
pub mod exponent {
    use super::*;

    pub fn serialize<S>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serialize_fixed(value, EXPONENT_BYTES, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BigUint, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserialize_fixed(EXPONENT_BYTES, deserializer)
    }
}
