use serde::{Deserialize, Serialize};

use super::keys::{ElectionPublicKeys, GuardianPublicView};
use crate::crypto::hash::{hash, HashInput, HashValue};
use crate::errors::{Error, Result};
use crate::parameters::{CryptographicParameters, GuardianParameters};

/// The published outcome of the key ceremony: everything a verifier needs to check the guardian
/// keys and everything an encryptor needs to start encrypting ballots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardianRecord {
    pub parameters: CryptographicParameters,
    pub guardian_parameters: GuardianParameters,
    pub parameter_base_hash: HashValue,
    /// Public views of all `n` guardians, ordered by index.
    pub guardians: Vec<GuardianPublicView>,
    pub election_public_keys: ElectionPublicKeys,
    /// Binds the election keys to every guardian's commitments and communication key.
    pub commitment_hash: HashValue,
}

impl GuardianRecord {
    /// Assemble the record from the public views of all guardians.  Fails unless there is exactly
    /// one view for each index `1..=n`.
    pub fn new(
        parameters: &CryptographicParameters,
        guardian_parameters: GuardianParameters,
        mut guardians: Vec<GuardianPublicView>,
    ) -> Result<GuardianRecord> {
        guardians.sort_by_key(|g| g.index);
        let indices_ok = guardians.len() == guardian_parameters.n as usize
            && guardians.iter().zip(1..).all(|(g, i)| g.index == i);
        if !indices_ok {
            return Err(Error::InvalidParameters(format!(
                "expected one public view for each guardian 1..={}",
                guardian_parameters.n
            )));
        }

        let parameter_base_hash = parameters.parameter_base_hash(&guardian_parameters)?;
        let election_public_keys =
            ElectionPublicKeys::from_guardians(parameters.group(), &guardians);
        let commitment_hash =
            commitment_hash(&parameter_base_hash, &election_public_keys, &guardians)?;

        Ok(GuardianRecord {
            parameters: parameters.clone(),
            guardian_parameters,
            parameter_base_hash,
            guardians,
            election_public_keys,
            commitment_hash,
        })
    }

    pub fn guardian(&self, index: u32) -> Option<&GuardianPublicView> {
        self.guardians.iter().find(|g| g.index == index)
    }
}

/// `H(H_P; 0x13, K, K̂, K_{i,j} for all i, j, K̂_{i,j} for all i, j, κ_i for all i)`.
pub(crate) fn commitment_hash(
    parameter_base_hash: &HashValue,
    keys: &ElectionPublicKeys,
    guardians: &[GuardianPublicView],
) -> Result<HashValue> {
    let mut parts: Vec<&dyn HashInput> = vec![
        &0x13_u8,
        &keys.vote_encryption_key,
        &keys.other_ballot_data_encryption_key,
    ];
    for g in guardians {
        parts.extend(g.vote_encryption_commitments.iter().map(|c| c as &dyn HashInput));
    }
    for g in guardians {
        parts.extend(
            g.other_ballot_data_encryption_commitments
                .iter()
                .map(|c| c as &dyn HashInput),
        );
    }
    parts.extend(guardians.iter().map(|g| &g.communication_public_key as &dyn HashInput));
    Ok(hash(parameter_base_hash.as_ref(), &parts)?)
}
