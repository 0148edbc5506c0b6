#![allow(dead_code)]

use electionguard_core::ballot::{Ballot, BallotChoice, BallotContest};
use electionguard_core::key_ceremony::{Guardian, GuardianRecord, GuardianSecretShares};
use electionguard_core::manifest::{BallotStyle, ChainingMode, Choice, Contest, Manifest};
use electionguard_core::parameters::{CryptographicParameters, GuardianParameters};

pub fn init_logging() {
    log4rs_test_utils::test_logging::init_logging_once_for(["electionguard_core"], None, None);
}

pub fn parameters() -> &'static CryptographicParameters {
    CryptographicParameters::test_group()
}

/// An honest ceremony between `n` guardians with threshold `k`.
pub fn ceremony(n: u32, k: u32) -> (GuardianRecord, Vec<GuardianSecretShares>) {
    let mut rng = rand::thread_rng();
    let gp = GuardianParameters::new(n, k).unwrap();
    let mut guardians: Vec<Guardian> = (1..=n)
        .map(|i| Guardian::new(parameters(), gp, i).unwrap())
        .collect();
    let views: Vec<_> = guardians
        .iter_mut()
        .map(|g| g.generate_keys(&mut rng).unwrap().to_public_view())
        .collect();
    let sent: Vec<_> = guardians
        .iter_mut()
        .flat_map(|g| g.encrypt_shares(&views, &mut rng).unwrap())
        .collect();
    for g in guardians.iter_mut() {
        let mine: Vec<_> = sent
            .iter()
            .filter(|s| s.destination_index == g.index())
            .cloned()
            .collect();
        g.decrypt_shares(&mine).unwrap();
    }
    let record = GuardianRecord::new(parameters(), gp, views).unwrap();
    for g in guardians.iter_mut() {
        g.verify(&record).unwrap();
    }
    let shares = guardians
        .iter()
        .map(|g| g.secret_shares().unwrap().clone())
        .collect();
    (record, shares)
}

/// Two contests: a vote-for-one between two candidates and a vote-for-two between three.
pub fn manifest() -> Manifest {
    let choice = |id: &str, index| Choice {
        id: id.to_owned(),
        name: id.to_uppercase(),
        index,
    };
    Manifest {
        election_id: "county-2026".to_owned(),
        contests: vec![
            Contest {
                id: "mayor".to_owned(),
                name: "Mayor".to_owned(),
                selection_limit: 1,
                option_selection_limit: 1,
                index: 1,
                choices: vec![choice("alice", 1), choice("bob", 2)],
            },
            Contest {
                id: "council".to_owned(),
                name: "City council".to_owned(),
                selection_limit: 2,
                option_selection_limit: 1,
                index: 2,
                choices: vec![choice("carol", 1), choice("dave", 2), choice("erin", 3)],
            },
        ],
        ballot_styles: vec![BallotStyle {
            id: "city".to_owned(),
            name: "City residents".to_owned(),
            contest_ids: vec!["mayor".to_owned(), "council".to_owned()],
        }],
        optional_contest_data_max_length: 40,
        include_overvotes: true,
        include_nullvotes: true,
        include_undervotes: true,
        include_writeins: true,
        chaining_mode: ChainingMode::Simple,
    }
}

pub fn ballot(id: &str, mayor: &[u32; 2], council: &[u32; 3]) -> Ballot {
    let contest = |contest_id: &str, ids: &[&str], values: &[u32]| BallotContest {
        contest_id: contest_id.to_owned(),
        choices: ids
            .iter()
            .zip(values)
            .map(|(id, &selection)| BallotChoice {
                choice_id: (*id).to_owned(),
                selection,
            })
            .collect(),
        write_ins: 0,
        contest_data: None,
    };
    Ballot {
        id: id.to_owned(),
        ballot_style_id: "city".to_owned(),
        contests: vec![
            contest("mayor", &["alice", "bob"], mayor),
            contest("council", &["carol", "dave", "erin"], council),
        ],
        weight: 1,
    }
}
