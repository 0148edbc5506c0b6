use lazy_static::*;
use num::traits::Num;
use num::BigUint;
use serde::{Deserialize, Serialize};

use crate::crypto::group::{to_fixed_width, Group, ELEMENT_BYTES, EXPONENT_BYTES};
use crate::crypto::hash::{hash, HashValue, HASH_BYTES};
use crate::errors::{Error, Result};
use crate::key_ceremony::ElectionPublicKeys;

/// The protocol version bound into the parameter base hash.
pub const VERSION: &str = "v2.1.0";

/// The group and protocol version every other component works in.
///
/// There is no process-wide instance: each component receives the parameters it should use,
/// usually `CryptographicParameters::standard()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ParameterFields")]
pub struct CryptographicParameters {
    pub version: String,
    #[serde(flatten)]
    group: Group,
}

#[derive(Deserialize)]
struct ParameterFields {
    version: String,
    #[serde(flatten)]
    group: Group,
}

impl TryFrom<ParameterFields> for CryptographicParameters {
    type Error = Error;

    fn try_from(fields: ParameterFields) -> Result<CryptographicParameters> {
        if fields.version.len() > HASH_BYTES {
            return Err(Error::InvalidParameters(format!(
                "version {:?} is longer than {HASH_BYTES} bytes",
                fields.version
            )));
        }
        Ok(CryptographicParameters {
            version: fields.version,
            group: fields.group,
        })
    }
}

/// The number of guardians `n` and the decryption threshold `k`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardianParameters {
    pub n: u32,
    pub k: u32,
}

lazy_static! {
    static ref STANDARD: CryptographicParameters = CryptographicParameters {
        version: VERSION.to_owned(),
        group: Group::new(
            parse_biguint_hex_or_panic(P_HEX_4096),
            parse_biguint_hex_or_panic(Q_HEX_4096),
            parse_biguint_hex_or_panic(G_HEX_4096),
        ),
    };

    static ref TEST_GROUP: CryptographicParameters = CryptographicParameters {
        version: VERSION.to_owned(),
        group: Group::new(
            parse_biguint_hex_or_panic(P_HEX_512),
            parse_biguint_hex_or_panic(Q_HEX_256),
            parse_biguint_hex_or_panic(G_HEX_512),
        ),
    };
}

impl CryptographicParameters {
    /// The 4096-bit production group.
    pub fn standard() -> &'static CryptographicParameters {
        &STANDARD
    }

    /// A 512-bit group with the production-sized 256-bit `q`.  Hash and encoding widths are the
    /// same as in the standard group, but exponentiation is much cheaper.  Not for real
    /// elections.
    pub fn test_group() -> &'static CryptographicParameters {
        &TEST_GROUP
    }

    /// Build parameters for a custom group, checking the moduli as `Group::checked` does.
    /// Primality of `p` and `q` is the caller's responsibility.
    pub fn new(version: &str, p: BigUint, q: BigUint, g: BigUint) -> Result<CryptographicParameters> {
        if version.len() > HASH_BYTES {
            return Err(Error::InvalidParameters(format!(
                "version {version:?} is longer than {HASH_BYTES} bytes"
            )));
        }
        Ok(CryptographicParameters {
            version: version.to_owned(),
            group: Group::checked(p, q, g)?,
        })
    }

    pub fn group(&self) -> &Group {
        &self.group
    }

    /// The version string as a hash key: its UTF-8 bytes right-aligned in 32 zero bytes.  A
    /// version longer than 32 bytes yields an oversized key, which `hash` rejects.
    pub fn version_key(&self) -> Vec<u8> {
        let bytes = self.version.as_bytes();
        let mut key = vec![0_u8; HASH_BYTES.saturating_sub(bytes.len())];
        key.extend_from_slice(bytes);
        key
    }

    /// `H_P = H(ver; 0x00, p, q, g, n, k)`.
    pub fn parameter_base_hash(&self, guardians: &GuardianParameters) -> Result<HashValue> {
        let group = &self.group;
        let p = to_fixed_width(group.p(), ELEMENT_BYTES);
        let q = to_fixed_width(group.q(), EXPONENT_BYTES);
        Ok(hash(
            &self.version_key(),
            &[&0x00_u8, &p, &q, group.generator(), &guardians.n, &guardians.k],
        )?)
    }
}

impl GuardianParameters {
    pub fn new(n: u32, k: u32) -> Result<GuardianParameters> {
        if k == 0 || k > n {
            return Err(Error::InvalidParameters(format!(
                "threshold {k} must be between 1 and the guardian count {n}"
            )));
        }
        Ok(GuardianParameters { n, k })
    }
}

/// `H_B = H(H_P; 0x01, manifest)`.
pub fn election_base_hash(parameter_base_hash: &HashValue, manifest: &[u8]) -> Result<HashValue> {
    Ok(hash(parameter_base_hash.as_ref(), &[&0x01_u8, &manifest])?)
}

/// `H_E = H(H_B; 0x14, K, K̂)`.
pub fn extended_base_hash(
    election_base_hash: &HashValue,
    keys: &ElectionPublicKeys,
) -> Result<HashValue> {
    Ok(hash(
        election_base_hash.as_ref(),
        &[&0x14_u8, &keys.vote_encryption_key, &keys.other_ballot_data_encryption_key],
    )?)
}

/// The voting device hash `H_DI = H(H_E; 0x2A, len(id), id)`.
pub fn device_hash(extended_base_hash: &HashValue, device_id: &str) -> Result<HashValue> {
    let len = u32::try_from(device_id.len())
        .map_err(|_| Error::InvalidParameters("device id is too long".to_owned()))?;
    Ok(hash(
        extended_base_hash.as_ref(),
        &[&0x2A_u8, &len, &device_id],
    )?)
}

/// Parse a hex string (which might contain spaces or newlines) into a BigUint or panic if it
/// can't be done.  This is meant for the hard-coded constants below.
fn parse_biguint_hex_or_panic(hex: &str) -> BigUint {
    BigUint::from_str_radix(&hex.replace([' ', '\n', '\t'], ""), 16)
        .expect("Invalid hex input for parse_biguint_hex_or_panic")
}

/// The 4096-bit prime modulus `p`
const P_HEX_4096: &str = "FFFFFFFF FFFFFFFF FFFFFFFF FFFFFFFF FFFFFFFF FFFFFFFF FFFFFFFF FFFFFFFF
     B17217F7 D1CF79AB C9E3B398 03F2F6AF 40F34326 7298B62D 8A0D175B 8BAAFA2B
     E7B87620 6DEBAC98 559552FB 4AFA1B10 ED2EAE35 C1382144 27573B29 1169B825
     3E96CA16 224AE8C5 1ACBDA11 317C387E B9EA9BC3 B136603B 256FA0EC 7657F74B
     72CE87B1 9D6548CA F5DFA6BD 38303248 655FA187 2F20E3A2 DA2D97C5 0F3FD5C6
     07F4CA11 FB5BFB90 610D30F8 8FE551A2 EE569D6D FC1EFA15 7D2E23DE 1400B396
     17460775 DB8990E5 C943E732 B479CD33 CCCC4E65 9393514C 4C1A1E0B D1D6095D
     25669B33 3564A337 6A9C7F8A 5E148E82 074DB601 5CFE7AA3 0C480A54 17350D2C
     955D5179 B1E17B9D AE313CDB 6C606CB1 078F735D 1B2DB31B 5F50B518 5064C18B
     4D162DB3 B365853D 7598A195 1AE273EE 5570B6C6 8F969834 96D4E6D3 30AF889B
     44A02554 731CDC8E A17293D1 228A4EF9 8D6F5177 FBCF0755 268A5C1F 9538B982
     61AFFD44 6B1CA3CF 5E9222B8 8C66D3C5 422183ED C9942109 0BBB16FA F3D949F2
     36E02B20 CEE886B9 05C128D5 3D0BD2F9 62136319 6AF50302 0060E499 08391A0C
     57339BA2 BEBA7D05 2AC5B61C C4E9207C EF2F0CE2 D7373958 D7622658 90445744
     FB5F2DA4 B7510058 92D35689 0DEFE9CA D9B9D4B7 13E06162 A2D8FDD0 DF2FD608
     FFFFFFFF FFFFFFFF FFFFFFFF FFFFFFFF FFFFFFFF FFFFFFFF FFFFFFFF FFFFFFFF";

/// The 256-bit subgroup order `q`
const Q_HEX_4096: &str = "FFFFFFFF FFFFFFFF FFFFFFFF FFFFFFFF FFFFFFFF FFFFFFFF FFFFFFFF FFFFFF43";

/// The generator `g = 2^r mod p`
const G_HEX_4096: &str = "36036FED 214F3B50 DC566D3A 312FE413 1FEE1C2B CE6D02EA 39B477AC 05F7F885
     F38CFE77 A7E45ACF 4029114C 4D7A9BFE 058BF2F9 95D2479D 3DDA618F FD910D3C
     4236AB2C FDD783A5 016F7465 CF59BBF4 5D24A22F 130F2D04 FE93B2D5 8BB9C1D1
     D27FC9A1 7D2AF49A 779F3FFB DCA22900 C14202EE 6C996160 34BE35CB CDD3E7BB
     7996ADFE 534B63CC A41E21FF 5DC778EB B1B86C53 BFBE9998 7D7AEA07 56237FB4
     0922139F 90A62F2A A8D9AD34 DFF799E3 3C857A64 68D001AC F3B681DB 87DC4242
     755E2AC5 A5027DB8 1984F033 C4D17837 1F273DBB 4FCEA1E6 28C23E52 759BC776
     5728035C EA26B44C 49A65666 889820A4 5C33DD37 EA4A1D00 CB62305C D541BE1E
     8A92685A 07012B1A 20A746C3 591A2DB3 815000D2 AACCFE43 DC49E828 C1ED7387
     466AFD8E 4BF19355 93B2A442 EEC271C5 0AD39F73 3797A1EA 11802A25 57916534
     662A6B7E 9A9E449A 24C8CFF8 09E79A4D 806EB681 119330E6 C57985E3 9B200B48
     93639FDF DEA49F76 AD1ACD99 7EBA1365 7541E79E C57437E5 04EDA9DD 01106151
     6C643FB3 0D6D58AF CCD28B73 FEDA29EC 12B01A5E B86399A5 93A9D5F4 50DE39CB
     92962C5E C6925348 DB54D128 FD99C14B 457F883E C20112A7 5A6A0581 D3D80A3B
     4EF09EC8 6F9552FF DA1653F1 33AA2534 983A6F31 B0EE4697 935A6B1E A2F75B85
     E7EBA151 BA486094 D68722B0 54633FEC 51CA3F29 B31E77E3 17B178B6 B9D8AE0F";

/// A 512-bit prime with `p = q r + 1` for the 256-bit `q` below.
const P_HEX_512: &str = "80000000 00000000 00000000 00000000 00000000 00000000 00000000 0000012F
     7FFFFFFF FFFFFFFF FFFFFFFF FFFFFFFF FFFFFFFF FFFFFFFF FFFFFFFF FFFEDA2B";

/// `2^256 - 189`, the largest 256-bit prime.
const Q_HEX_256: &str = "FFFFFFFF FFFFFFFF FFFFFFFF FFFFFFFF FFFFFFFF FFFFFFFF FFFFFFFF FFFFFF43";

const G_HEX_512: &str = "5E5A77A0 64CD91C8 D0F58910 3B6E9547 4D441FA6 121D06BB FF57C02C B4AD1E92
     5974B4B1 D7F525AC 22749107 899E9255 C9479ABB A3E08808 41D7639E F1B26A52";

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn standard_group_is_consistent() {
        let params = CryptographicParameters::standard();
        let group = params.group();
        assert_eq!(group.p().bits(), 4096);
        assert_eq!(group.q().bits(), 256);
        let rebuilt = CryptographicParameters::new(
            VERSION,
            group.p().clone(),
            group.q().clone(),
            group.generator().as_uint().clone(),
        );
        assert_eq!(rebuilt.as_ref(), Ok(params));
        assert!(group.is_valid_residue(group.generator()));
    }

    #[test]
    fn test_group_is_consistent() {
        let params = CryptographicParameters::test_group();
        let group = params.group();
        let rebuilt = CryptographicParameters::new(
            VERSION,
            group.p().clone(),
            group.q().clone(),
            group.generator().as_uint().clone(),
        );
        assert_eq!(rebuilt.as_ref(), Ok(params));
    }

    #[test]
    fn wrong_generator_is_rejected() {
        let group = CryptographicParameters::test_group().group();
        let result = CryptographicParameters::new(
            VERSION,
            group.p().clone(),
            group.q().clone(),
            BigUint::from(3_u8),
        );
        assert!(matches!(result, Err(Error::InvalidParameters(_))));
    }

    #[test]
    fn guardian_parameters_bounds() {
        assert!(GuardianParameters::new(3, 2).is_ok());
        assert!(GuardianParameters::new(3, 3).is_ok());
        assert!(GuardianParameters::new(3, 0).is_err());
        assert!(GuardianParameters::new(3, 4).is_err());
    }

    #[test]
    fn version_key_is_right_aligned() {
        let key = CryptographicParameters::test_group().version_key();
        assert_eq!(key.len(), 32);
        assert_eq!(&key[26..], b"v2.1.0");
        assert!(key[..26].iter().all(|&b| b == 0));
    }

    #[test]
    fn parameter_base_hash_depends_on_threshold() {
        let params = CryptographicParameters::test_group();
        let a = params.parameter_base_hash(&GuardianParameters { n: 3, k: 2 }).unwrap();
        let b = params.parameter_base_hash(&GuardianParameters { n: 3, k: 3 }).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn oversized_version_fails_to_hash() {
        let mut params = CryptographicParameters::test_group().clone();
        params.version = "x".repeat(40);
        let result = params.parameter_base_hash(&GuardianParameters { n: 1, k: 1 });
        assert!(matches!(result, Err(Error::Hash(_))));
    }

    #[test]
    fn parsed_parameters_round_trip() {
        let params = CryptographicParameters::test_group();
        let json = serde_json::to_string(params).unwrap();
        let parsed: CryptographicParameters = serde_json::from_str(&json).unwrap();
        assert_eq!(&parsed, params);
    }

    #[test]
    fn parsed_zero_q_is_rejected() {
        let mut json = serde_json::to_value(CryptographicParameters::test_group()).unwrap();
        json["q"] = serde_json::Value::String("0".repeat(2 * EXPONENT_BYTES));
        assert!(serde_json::from_value::<CryptographicParameters>(json).is_err());
    }

    #[test]
    fn parsed_inconsistent_cofactor_is_rejected() {
        let mut json = serde_json::to_value(CryptographicParameters::test_group()).unwrap();
        let mut r = "0".repeat(2 * ELEMENT_BYTES - 1);
        r.push('3');
        json["r"] = serde_json::Value::String(r);
        assert!(serde_json::from_value::<CryptographicParameters>(json).is_err());
    }

    #[test]
    fn parsed_group_checks_generator() {
        let mut json = serde_json::to_value(CryptographicParameters::test_group().group()).unwrap();
        let mut g = "0".repeat(2 * ELEMENT_BYTES - 1);
        g.push('5');
        json["g"] = serde_json::Value::String(g);
        assert!(serde_json::from_value::<Group>(json).is_err());
    }
}
