//! Homomorphic aggregation of encrypted ballots, and the threshold decryption of the result.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::ballot::EncryptedBallot;
use crate::crypto::elgamal::Ciphertext;
use crate::crypto::group::Group;
use crate::errors::{Error, Result, ValidationError};
use crate::manifest::Manifest;

mod decryption;

pub use decryption::{DecryptedTally, PartialTallyDecryption, TallyAdmin, TallyGuardian};

/// The running product of every cast ballot's selections, per contest and choice.
///
/// Every choice of the manifest starts at the encryption of zero, so choices nobody voted for
/// still decrypt.  Aggregation is commutative and associative; shards built from disjoint sets of
/// ballots can be combined with `merge`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedTally {
    /// Contest id to choice id to aggregate ciphertext `(A, B)`.
    pub contests: BTreeMap<String, BTreeMap<String, Ciphertext>>,
    pub ballots_cast: u64,
    /// Sum of the weights of the cast ballots; bounds every count in the tally.
    pub total_weight: u64,
}

impl EncryptedTally {
    pub fn new(manifest: &Manifest) -> EncryptedTally {
        let contests = manifest
            .contests
            .iter()
            .map(|contest| {
                let choices = contest
                    .choices
                    .iter()
                    .map(|choice| (choice.id.clone(), Ciphertext::identity()))
                    .collect();
                (contest.id.clone(), choices)
            })
            .collect();
        EncryptedTally {
            contests,
            ballots_cast: 0,
            total_weight: 0,
        }
    }

    /// Aggregate a batch of ballots into a fresh tally.
    pub fn from_ballots<'a>(
        group: &Group,
        manifest: &Manifest,
        ballots: impl IntoIterator<Item = &'a EncryptedBallot>,
    ) -> Result<EncryptedTally> {
        let mut tally = EncryptedTally::new(manifest);
        for ballot in ballots {
            tally.add_ballot(group, ballot)?;
        }
        info!(
            "aggregated {} ballots with total weight {}",
            tally.ballots_cast, tally.total_weight
        );
        Ok(tally)
    }

    /// Multiply the ballot's selections, each raised to the ballot's weight, into the tally.
    ///
    /// Fails without touching the tally if the ballot names a contest or choice the tally does
    /// not have, or names one twice.
    pub fn add_ballot(&mut self, group: &Group, ballot: &EncryptedBallot) -> Result<()> {
        let mut seen_contests = HashSet::new();
        for contest in &ballot.contests {
            let choices = self
                .contests
                .get(&contest.contest_id)
                .ok_or_else(|| Error::UnknownContest(contest.contest_id.clone()))?;
            if !seen_contests.insert(contest.contest_id.as_str()) {
                return Err(ValidationError::contest(&contest.contest_id, "contest appears twice").into());
            }
            let mut seen_choices = HashSet::new();
            for selection in &contest.choices {
                if !choices.contains_key(&selection.choice_id) {
                    return Err(Error::UnknownChoice {
                        contest_id: contest.contest_id.clone(),
                        choice_id: selection.choice_id.clone(),
                    });
                }
                if !seen_choices.insert(selection.choice_id.as_str()) {
                    return Err(ValidationError::choice(
                        &contest.contest_id,
                        &selection.choice_id,
                        "choice appears twice",
                    )
                    .into());
                }
            }
        }

        for contest in &ballot.contests {
            for selection in &contest.choices {
                self.accumulate(
                    group,
                    &contest.contest_id,
                    &selection.choice_id,
                    &selection.value.ciphertext,
                    ballot.weight,
                );
            }
        }
        self.ballots_cast += 1;
        self.total_weight += u64::from(ballot.weight);
        debug!("added ballot {} with weight {}", ballot.id, ballot.weight);
        Ok(())
    }

    pub(crate) fn accumulate(
        &mut self,
        group: &Group,
        contest_id: &str,
        choice_id: &str,
        ciphertext: &Ciphertext,
        weight: u32,
    ) {
        let weighted = match weight {
            1 => ciphertext.clone(),
            w => ciphertext.scale(group, w),
        };
        let aggregate = self
            .contests
            .entry(contest_id.to_owned())
            .or_default()
            .entry(choice_id.to_owned())
            .or_insert_with(Ciphertext::identity);
        *aggregate = aggregate.h_add(group, &weighted);
    }

    /// Fold another shard's aggregate into this one.
    pub fn merge(&mut self, group: &Group, other: &EncryptedTally) {
        for (contest_id, choices) in &other.contests {
            for (choice_id, ciphertext) in choices {
                self.accumulate(group, contest_id, choice_id, ciphertext, 1);
            }
        }
        self.ballots_cast += other.ballots_cast;
        self.total_weight += other.total_weight;
    }

    pub fn choice(&self, contest_id: &str, choice_id: &str) -> Option<&Ciphertext> {
        self.contests.get(contest_id)?.get(choice_id)
    }
}
