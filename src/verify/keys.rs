//! Verifications 1 to 4, over the parameters and the outcome of the key ceremony.

use crate::crypto::group::{Element, Group};
use crate::crypto::hash::HashValue;
use crate::errors::{Error, Result};
use crate::key_ceremony::{
    key_proof_challenge, ElectionPublicKeys, GuardianPublicView, DATA_LABEL, VOTE_LABEL,
};
use crate::parameters::{self, CryptographicParameters, GuardianParameters};
use crate::record::EncryptionRecord;

/// Verification 1: the record uses the expected group and version, and its parameter and
/// election base hashes recompute.
pub fn parameters(expected: &CryptographicParameters, record: &EncryptionRecord) -> Result<()> {
    let actual = &record.parameters;
    if actual.version != expected.version {
        return Err(Error::verification(
            "1.A",
            format!("version {:?}, expected {:?}", actual.version, expected.version),
        ));
    }
    let (group, trusted) = (actual.group(), expected.group());
    if group.p() != trusted.p() {
        return Err(Error::verification("1.B", "p differs from the expected modulus"));
    }
    if group.q() != trusted.q() {
        return Err(Error::verification("1.C", "q differs from the expected subgroup order"));
    }
    if group.generator() != trusted.generator() {
        return Err(Error::verification("1.D", "g differs from the expected generator"));
    }

    let h_p = actual.parameter_base_hash(&record.guardian_parameters)?;
    if h_p != record.parameter_base_hash {
        return Err(Error::verification(
            "1.E",
            format!("parameter base hash {}, recomputed {h_p}", record.parameter_base_hash),
        ));
    }
    let h_b = parameters::election_base_hash(&h_p, &record.manifest.canonical_bytes()?)?;
    if h_b != record.election_base_hash {
        return Err(Error::verification(
            "1.F",
            format!("election base hash {}, recomputed {h_b}", record.election_base_hash),
        ));
    }
    Ok(())
}

/// Verification 2 for one guardian: every public key is a group member, and both key proofs
/// check out against the parameter base hash.
pub fn guardian_public_keys(
    group: &Group,
    parameter_base_hash: &HashValue,
    guardian_parameters: &GuardianParameters,
    view: &GuardianPublicView,
) -> Result<()> {
    let k = guardian_parameters.k as usize;
    let index = view.index;
    if view.vote_encryption_commitments.len() != k
        || view.other_ballot_data_encryption_commitments.len() != k
    {
        return Err(Error::verification(
            "2",
            format!("guardian {index} does not publish {k} commitments per key"),
        ));
    }

    let all_keys = view
        .vote_encryption_commitments
        .iter()
        .chain(&view.other_ballot_data_encryption_commitments)
        .chain(Some(&view.communication_public_key));
    for key in all_keys {
        if !group.is_valid_residue(key) {
            return Err(Error::verification(
                "2.A",
                format!("guardian {index} published a key outside the group"),
            ));
        }
    }

    let proofs = [
        (VOTE_LABEL, &view.vote_encryption_proof, view.vote_proof_keys()),
        (DATA_LABEL, &view.other_data_encryption_proof, view.data_proof_keys()),
    ];
    for (label, proof, keys) in proofs {
        let in_range = group.is_in_zq(&proof.challenge)
            && proof.responses.iter().all(|v| group.is_in_zq(v));
        if !in_range {
            return Err(Error::verification(
                "2.B",
                format!("guardian {index} {label} proof has a value outside Z_q"),
            ));
        }
        let h = proof.commitments(group, &keys).ok_or_else(|| {
            Error::verification(
                "2.B",
                format!("guardian {index} {label} proof has the wrong number of responses"),
            )
        })?;
        let expected = key_proof_challenge(
            group,
            parameter_base_hash,
            label,
            index,
            &keys[..k],
            &view.communication_public_key,
            &h,
        )?;
        if expected != proof.challenge {
            return Err(Error::verification(
                "2.C",
                format!("guardian {index} {label} proof challenge does not recompute"),
            ));
        }
    }
    Ok(())
}

/// Verification 3: the election keys are the products of the guardians' constant-term
/// commitments.
pub fn election_public_keys(
    group: &Group,
    guardians: &[GuardianPublicView],
    keys: &ElectionPublicKeys,
) -> Result<()> {
    let vote_key = constant_term_product(
        group,
        guardians.iter().map(|g| &g.vote_encryption_commitments),
    );
    if vote_key != keys.vote_encryption_key {
        return Err(Error::verification(
            "3.A",
            "vote encryption key is not the product of the guardian commitments",
        ));
    }
    let data_key = constant_term_product(
        group,
        guardians
            .iter()
            .map(|g| &g.other_ballot_data_encryption_commitments),
    );
    if data_key != keys.other_ballot_data_encryption_key {
        return Err(Error::verification(
            "3.B",
            "other ballot data key is not the product of the guardian commitments",
        ));
    }
    Ok(())
}

fn constant_term_product<'a>(
    group: &Group,
    commitments: impl Iterator<Item = &'a Vec<Element>>,
) -> Element {
    group.product_p(commitments.filter_map(|c| c.first()))
}

/// Verification 4: `H_E` recomputes from `H_B` and the election keys.
pub fn extended_base_hash(record: &EncryptionRecord) -> Result<()> {
    let h_e = parameters::extended_base_hash(&record.election_base_hash, &record.election_public_keys)?;
    if h_e != record.extended_base_hash {
        return Err(Error::verification(
            "4.A",
            format!("extended base hash {}, recomputed {h_e}", record.extended_base_hash),
        ));
    }
    Ok(())
}
