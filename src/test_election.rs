use std::collections::BTreeMap;

use crate::ballot::test::ballot;
use crate::ballot::{BallotEncryptor, EncryptedBallot};
use crate::crypto::group::Group;
use crate::errors::Error;
use crate::key_ceremony::test::ceremony;
use crate::key_ceremony::GuardianSecretShares;
use crate::manifest::test::two_choice_manifest;
use crate::parameters::CryptographicParameters;
use crate::record::EncryptionRecord;
use crate::tally::{EncryptedTally, PartialTallyDecryption, TallyAdmin, TallyGuardian};
use crate::verify;

struct Election {
    record: EncryptionRecord,
    shares: Vec<GuardianSecretShares>,
    ballots: Vec<EncryptedBallot>,
    tally: EncryptedTally,
    device_hashes: BTreeMap<String, crate::crypto::hash::HashValue>,
}

/// Three guardians with threshold two, and two chained ballots with one vote for each choice.
fn election() -> Election {
    log4rs_test_utils::test_logging::init_logging_once_for(["electionguard_core"], None, None);

    let (guardian_record, shares) = ceremony(CryptographicParameters::test_group(), 3, 2);
    let record = EncryptionRecord::new(&guardian_record, two_choice_manifest()).unwrap();
    let encryptor = BallotEncryptor::new(&record, "precinct-7").unwrap();
    let mut rng = rand::thread_rng();
    let first = encryptor.encrypt(&ballot("b1", 1, 0), None, &mut rng).unwrap();
    let second = encryptor
        .encrypt(&ballot("b2", 0, 1), Some(&first.confirmation_code), &mut rng)
        .unwrap();
    let ballots = vec![first, second];
    let tally = EncryptedTally::from_ballots(group(&record), &record.manifest, &ballots).unwrap();
    let device_hashes = BTreeMap::from([("precinct-7".to_owned(), *encryptor.device_hash())]);

    Election {
        record,
        shares,
        ballots,
        tally,
        device_hashes,
    }
}

fn group(record: &EncryptionRecord) -> &Group {
    record.parameters.group()
}

fn partials(e: &Election, indices: &[u32]) -> Vec<PartialTallyDecryption> {
    indices
        .iter()
        .map(|&i| TallyGuardian::new(group(&e.record), &e.shares[i as usize - 1]).decrypt(&e.tally))
        .collect()
}

#[test]
fn test_normal() {
    let e = election();

    let status = verify::verify_election(
        CryptographicParameters::test_group(),
        &e.record,
        &e.ballots,
        &e.tally,
        &e.device_hashes,
    );
    dbg!(&status);
    assert!(status.is_ok());

    let admin = TallyAdmin::new(&e.record);
    let with_1_2 = admin.decrypt(&partials(&e, &[1, 2]), &e.tally).unwrap();
    let with_1_3 = admin.decrypt(&partials(&e, &[1, 3]), &e.tally).unwrap();
    assert_eq!(with_1_2.count("mayor", "alice"), Some(1));
    assert_eq!(with_1_2.count("mayor", "bob"), Some(1));
    assert_eq!(with_1_2, with_1_3);
}

#[test]
fn second_confirmation_code_depends_on_first() {
    let e = election();
    let (first, second) = (&e.ballots[0], &e.ballots[1]);
    assert_eq!(&second.chaining_field[4..], first.confirmation_code.as_bytes());

    // Re-chaining the second ballot onto anything else changes its code.
    let mut rechained = second.clone();
    rechained.chaining_field = crate::ballot::confirmation::chaining_field(
        e.record.manifest.chaining_mode,
        &e.device_hashes["precinct-7"],
        None,
    );
    let recomputed = crate::ballot::confirmation::confirmation_code(
        &rechained.selection_identifier_hash,
        rechained.contests.iter().map(|c| &c.contest_hash),
        &rechained.chaining_field,
    )
    .unwrap();
    assert_ne!(recomputed, second.confirmation_code);
}

#[test]
fn below_threshold_cannot_decrypt() {
    let e = election();
    let status = TallyAdmin::new(&e.record).decrypt(&partials(&e, &[3]), &e.tally);
    assert!(matches!(status, Err(Error::InsufficientGuardians { .. })));
}

#[test]
fn aggregation_order_is_irrelevant() {
    let e = election();
    let reversed = e.ballots.iter().rev();
    let tally = EncryptedTally::from_ballots(group(&e.record), &e.record.manifest, reversed).unwrap();
    assert_eq!(tally, e.tally);
}

#[test]
fn tampered_ballot_fails_verification() {
    let mut e = election();
    let group = e.record.parameters.group().clone();
    let branch = &mut e.ballots[1].contests[0].choices[0].value.proof.branches[1];
    branch.response = group.add_q(&branch.response, &1_u32.into());

    let status = verify::verify_election(
        CryptographicParameters::test_group(),
        &e.record,
        &e.ballots,
        &e.tally,
        &e.device_hashes,
    );
    assert_eq!(status.unwrap_err().subsection(), Some("6.D"));
}

#[test]
fn stuffed_contest_fails_verification() {
    let mut e = election();
    let last = e.ballots.len() - 1;
    let ballot = &mut e.ballots[last];
    let copy = ballot.contests[0].clone();
    ballot.contests.push(copy);
    ballot.confirmation_code = crate::ballot::confirmation::confirmation_code(
        &ballot.selection_identifier_hash,
        ballot.contests.iter().map(|c| &c.contest_hash),
        &ballot.chaining_field,
    )
    .unwrap();

    let status = verify::verify_election(
        CryptographicParameters::test_group(),
        &e.record,
        &e.ballots,
        &e.tally,
        &e.device_hashes,
    );
    assert_eq!(status.unwrap_err().subsection(), Some("6"));

    let stuffed = EncryptedTally::from_ballots(group(&e.record), &e.record.manifest, &e.ballots);
    assert!(matches!(stuffed, Err(Error::Validation(_))));
}
