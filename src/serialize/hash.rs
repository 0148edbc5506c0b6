use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::crypto::hash::HASH_BYTES;

pub fn serialize<S>(value: &[u8; HASH_BYTES], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    hex::encode_upper(value).serialize(serializer)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; HASH_BYTES], D::Error>
where
    D: Deserializer<'de>,
{
    let bytes = bytes::deserialize(deserializer)?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| de::Error::invalid_length(len, &"32 bytes"))
}

/// Variable-length byte strings such as ciphertext bodies.
pub mod bytes {
    use super::*;

    pub fn serialize<S>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        hex::encode_upper(value).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        hex::decode(s).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use crate::crypto::hash::HashValue;

    #[test]
    fn hash_value_hex() {
        let value = HashValue::from_bytes([0xA5; 32]);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, format!("\"{}\"", "A5".repeat(32)));
        assert_eq!(serde_json::from_str::<HashValue>(&json).unwrap(), value);
        assert!(serde_json::from_str::<HashValue>("\"A5A5\"").is_err());
    }
}
