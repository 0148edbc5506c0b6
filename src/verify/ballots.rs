//! Verifications 5 to 8, over the cast ballots.

use std::collections::{BTreeMap, HashSet};

use crate::ballot::confirmation::{chaining_field, confirmation_code, contest_hash};
use crate::ballot::{EncryptedBallot, ProofContext};
use crate::crypto::chaum_pedersen::Status;
use crate::crypto::elgamal::Ciphertext;
use crate::crypto::group::Group;
use crate::crypto::hash::{hash, HashValue};
use crate::errors::{Error, Result};
use crate::manifest::Contest;
use crate::parameters::device_hash;
use crate::record::EncryptionRecord;

/// The subsection codes a range proof failure is reported under.
struct Codes {
    structure: &'static str,
    residue: &'static str,
    challenge_range: &'static str,
    response_range: &'static str,
    challenge: &'static str,
}

const SELECTION: Codes = Codes {
    structure: "6",
    residue: "6.A",
    challenge_range: "6.B",
    response_range: "6.C",
    challenge: "6.D",
};

const CONTEST: Codes = Codes {
    structure: "7",
    residue: "7.A",
    challenge_range: "7.B",
    response_range: "7.C",
    challenge: "7.D",
};

/// Verification 5: no two ballots share a selection encryption identifier, and every ballot's
/// `H_I` recomputes from its identifier.
pub fn selection_identifiers(record: &EncryptionRecord, ballots: &[EncryptedBallot]) -> Result<()> {
    let mut seen = HashSet::new();
    for ballot in ballots {
        if !seen.insert(ballot.selection_identifier) {
            return Err(Error::verification(
                "5.A",
                format!(
                    "ballot {} reuses selection encryption identifier {}",
                    ballot.id, ballot.selection_identifier
                ),
            ));
        }
        let h_i = hash(
            record.extended_base_hash.as_ref(),
            &[&0x20_u8, &ballot.selection_identifier],
        )?;
        if h_i != ballot.selection_identifier_hash {
            return Err(Error::verification(
                "5.B",
                format!("ballot {} selection identifier hash does not recompute", ballot.id),
            ));
        }
    }
    Ok(())
}

/// Verification 6 for one ballot: the ballot holds exactly the contests of its style, in order,
/// and every selection and every metadata counter is a well-formed encryption of a value within
/// its limit.
pub fn selection_encryptions(record: &EncryptionRecord, ballot: &EncryptedBallot) -> Result<()> {
    let group = record.parameters.group();
    let key = &record.election_public_keys.vote_encryption_key;
    let h_i = &ballot.selection_identifier_hash;

    let style = record.manifest.ballot_style(&ballot.ballot_style_id).ok_or_else(|| {
        Error::verification(
            SELECTION.structure,
            format!("ballot {} has unknown ballot style {}", ballot.id, ballot.ballot_style_id),
        )
    })?;
    let contest_ids = ballot.contests.iter().map(|c| &c.contest_id);
    if !contest_ids.eq(&style.contest_ids) {
        return Err(Error::verification(
            SELECTION.structure,
            format!(
                "ballot {} contests do not match ballot style {}",
                ballot.id, style.id
            ),
        ));
    }

    for contest in &ballot.contests {
        let manifest_contest = manifest_contest(record, ballot, &contest.contest_id, &SELECTION)?;
        let structure = |what: &str| {
            Error::verification(
                SELECTION.structure,
                format!("ballot {} contest {}: {what}", ballot.id, contest.contest_id),
            )
        };

        if contest.choices.len() != manifest_contest.choices.len() {
            return Err(structure("wrong number of selections"));
        }
        for (selection, choice) in contest.choices.iter().zip(&manifest_contest.choices) {
            if selection.choice_id != choice.id {
                return Err(structure("selections out of manifest order"));
            }
            let context = ProofContext {
                selection_identifier_hash: h_i,
                contest_index: manifest_contest.index,
                choice_index: Some(choice.index),
            };
            let value = &selection.value;
            let what = || format!("ballot {} selection {}", ballot.id, choice.id);
            residues(group, &value.ciphertext, &SELECTION, what)?;
            let status = value.check(group, key, context, manifest_contest.option_selection_limit)?;
            report(status, &SELECTION, what)?;
        }

        let context = ProofContext {
            selection_identifier_hash: h_i,
            contest_index: manifest_contest.index,
            choice_index: None,
        };
        for (counter, value) in contest.metadata() {
            let value = match (counter.included(&record.manifest), value) {
                (true, Some(value)) => value,
                (false, None) => continue,
                (true, None) => return Err(structure(&format!("{} is missing", counter.label()))),
                (false, Some(_)) => {
                    return Err(structure(&format!("{} is not expected", counter.label())))
                }
            };
            let what = || format!("ballot {} contest {} {}", ballot.id, contest.contest_id, counter.label());
            residues(group, &value.ciphertext, &SELECTION, what)?;
            let status = value.check(group, key, context, counter.limit(manifest_contest))?;
            report(status, &SELECTION, what)?;
        }
    }
    Ok(())
}

/// Verification 7 for one ballot: the product of each contest's selections encrypts at most the
/// contest's selection limit.
pub fn vote_limits(record: &EncryptionRecord, ballot: &EncryptedBallot) -> Result<()> {
    let group = record.parameters.group();
    let key = &record.election_public_keys.vote_encryption_key;

    for contest in &ballot.contests {
        let manifest_contest = manifest_contest(record, ballot, &contest.contest_id, &CONTEST)?;
        let total = contest.total(group);
        let context = ProofContext {
            selection_identifier_hash: &ballot.selection_identifier_hash,
            contest_index: manifest_contest.index,
            choice_index: None,
        };
        let what = || format!("ballot {} contest {}", ballot.id, contest.contest_id);
        residues(group, &total, &CONTEST, what)?;
        let status = contest.proof.check(
            group,
            key,
            &total,
            manifest_contest.selection_limit,
            |commitments| context.challenge(group, &total, commitments),
        )?;
        report(status, &CONTEST, what)?;
    }
    Ok(())
}

/// Verification 8: contest hashes and confirmation codes recompute, and each device's ballots
/// form an unbroken chain starting at its device hash.
///
/// Ballots must be given in the order each device cast them.
pub fn confirmation_codes(
    record: &EncryptionRecord,
    ballots: &[EncryptedBallot],
    device_hashes: &BTreeMap<String, HashValue>,
) -> Result<()> {
    super::for_each_ballot(ballots, |ballot| ballot_codes(record, ballot))?;

    for (device_id, claimed) in device_hashes {
        let recomputed = device_hash(&record.extended_base_hash, device_id)?;
        if &recomputed != claimed {
            return Err(Error::verification(
                "8.C",
                format!("device hash of {device_id} does not recompute"),
            ));
        }
    }

    let mode = record.manifest.chaining_mode;
    let mut last_code: BTreeMap<&str, &HashValue> = BTreeMap::new();
    for ballot in ballots {
        let device = ballot.device_id.as_str();
        let device_hash = device_hashes.get(device).ok_or_else(|| {
            Error::verification(
                "8.C",
                format!("ballot {} comes from unknown device {device}", ballot.id),
            )
        })?;
        let expected = chaining_field(mode, device_hash, last_code.get(device).copied());
        if expected != ballot.chaining_field {
            return Err(Error::verification(
                "8.C",
                format!("ballot {} breaks the chain of device {device}", ballot.id),
            ));
        }
        last_code.insert(device, &ballot.confirmation_code);
    }
    Ok(())
}

fn ballot_codes(record: &EncryptionRecord, ballot: &EncryptedBallot) -> Result<()> {
    let h_i = &ballot.selection_identifier_hash;
    for contest in &ballot.contests {
        let index = record
            .manifest
            .contest(&contest.contest_id)
            .map(|c| c.index)
            .ok_or_else(|| {
                Error::verification("8.A", format!("unknown contest {}", contest.contest_id))
            })?;
        if contest_hash(h_i, index, contest)? != contest.contest_hash {
            return Err(Error::verification(
                "8.A",
                format!(
                    "ballot {} contest {} hash does not recompute",
                    ballot.id, contest.contest_id
                ),
            ));
        }
    }

    let code = confirmation_code(
        h_i,
        ballot.contests.iter().map(|c| &c.contest_hash),
        &ballot.chaining_field,
    )?;
    if code != ballot.confirmation_code {
        return Err(Error::verification(
            "8.B",
            format!("ballot {} confirmation code does not recompute", ballot.id),
        ));
    }
    Ok(())
}

fn manifest_contest<'a>(
    record: &'a EncryptionRecord,
    ballot: &EncryptedBallot,
    contest_id: &str,
    codes: &Codes,
) -> Result<&'a Contest> {
    record.manifest.contest(contest_id).ok_or_else(|| {
        Error::verification(
            codes.structure,
            format!("ballot {} has unknown contest {contest_id}", ballot.id),
        )
    })
}

fn residues(group: &Group, ciphertext: &Ciphertext, codes: &Codes, what: impl Fn() -> String) -> Result<()> {
    if group.is_valid_residue(&ciphertext.alpha) && group.is_valid_residue(&ciphertext.beta) {
        Ok(())
    } else {
        Err(Error::verification(codes.residue, format!("{}: ciphertext outside the group", what())))
    }
}

fn report(status: Status, codes: &Codes, what: impl Fn() -> String) -> Result<()> {
    let failure = if !status.length {
        (codes.structure, "wrong number of proof branches")
    } else if !status.challenges_in_range {
        (codes.challenge_range, "challenge outside Z_q")
    } else if !status.responses_in_range {
        (codes.response_range, "response outside Z_q")
    } else if !status.challenge {
        (codes.challenge, "branch challenges do not sum to the proof challenge")
    } else {
        return Ok(());
    };
    Err(Error::verification(failure.0, format!("{}: {}", what(), failure.1)))
}
