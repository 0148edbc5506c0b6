use serde::{Deserialize, Serialize};

use crate::crypto::hash::HashValue;
use crate::errors::Result;
use crate::key_ceremony::{ElectionPublicKeys, GuardianPublicView, GuardianRecord};
use crate::manifest::Manifest;
use crate::parameters::{
    election_base_hash, extended_base_hash, CryptographicParameters, GuardianParameters,
};

/// Everything needed to encrypt ballots for an election, and to verify them afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionRecord {
    pub parameters: CryptographicParameters,
    pub guardian_parameters: GuardianParameters,
    pub guardians: Vec<GuardianPublicView>,
    pub election_public_keys: ElectionPublicKeys,
    pub parameter_base_hash: HashValue,
    pub election_base_hash: HashValue,
    pub extended_base_hash: HashValue,
    pub manifest: Manifest,
}

impl EncryptionRecord {
    /// Bind a validated manifest to the outcome of the key ceremony, deriving `H_B` and `H_E`.
    pub fn new(guardian_record: &GuardianRecord, manifest: Manifest) -> Result<EncryptionRecord> {
        manifest.validate()?;
        let election_base_hash = election_base_hash(
            &guardian_record.parameter_base_hash,
            &manifest.canonical_bytes()?,
        )?;
        let extended_base_hash =
            extended_base_hash(&election_base_hash, &guardian_record.election_public_keys)?;

        Ok(EncryptionRecord {
            parameters: guardian_record.parameters.clone(),
            guardian_parameters: guardian_record.guardian_parameters,
            guardians: guardian_record.guardians.clone(),
            election_public_keys: guardian_record.election_public_keys.clone(),
            parameter_base_hash: guardian_record.parameter_base_hash,
            election_base_hash,
            extended_base_hash,
            manifest,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::key_ceremony::test::ceremony;
    use crate::manifest::test::two_choice_manifest;

    #[test]
    fn base_hashes_depend_on_manifest() {
        let (guardian_record, _) = ceremony(CryptographicParameters::test_group(), 2, 2);
        let a = EncryptionRecord::new(&guardian_record, two_choice_manifest()).unwrap();

        let mut manifest = two_choice_manifest();
        manifest.contests[0].selection_limit = 2;
        let b = EncryptionRecord::new(&guardian_record, manifest).unwrap();

        assert_eq!(a.parameter_base_hash, b.parameter_base_hash);
        assert_ne!(a.election_base_hash, b.election_base_hash);
        assert_ne!(a.extended_base_hash, b.extended_base_hash);
    }

    #[test]
    fn invalid_manifest_is_rejected() {
        let (guardian_record, _) = ceremony(CryptographicParameters::test_group(), 1, 1);
        let mut manifest = two_choice_manifest();
        manifest.contests[0].option_selection_limit = 0;
        assert!(EncryptionRecord::new(&guardian_record, manifest).is_err());
    }
}
