use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::EncryptedTally;
use crate::crypto::group::{Element, Exponent, Group};
use crate::errors::{Error, Result};
use crate::key_ceremony::GuardianSecretShares;
use crate::record::EncryptionRecord;

/// One guardian's share `M_i = A^{z_i}` of the decryption of every aggregate in a tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialTallyDecryption {
    pub guardian_index: u32,
    pub contests: BTreeMap<String, BTreeMap<String, Element>>,
}

/// The plaintext counts, per contest and choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptedTally {
    pub contests: BTreeMap<String, BTreeMap<String, u64>>,
    pub ballots_cast: u64,
}

impl DecryptedTally {
    pub fn count(&self, contest_id: &str, choice_id: &str) -> Option<u64> {
        self.contests.get(contest_id)?.get(choice_id).copied()
    }
}

/// A guardian taking part in decrypting the tally.
pub struct TallyGuardian<'a> {
    group: &'a Group,
    shares: &'a GuardianSecretShares,
}

impl<'a> TallyGuardian<'a> {
    pub fn new(group: &'a Group, shares: &'a GuardianSecretShares) -> TallyGuardian<'a> {
        TallyGuardian { group, shares }
    }

    pub fn decrypt(&self, tally: &EncryptedTally) -> PartialTallyDecryption {
        let share = self.shares.vote_encryption_key_share();
        let contests = tally
            .contests
            .iter()
            .map(|(contest_id, choices)| {
                let partials = choices
                    .iter()
                    .map(|(choice_id, ct)| (choice_id.clone(), self.group.pow_p(&ct.alpha, share)))
                    .collect();
                (contest_id.clone(), partials)
            })
            .collect();
        info!("guardian {} computed its partial decryption", self.shares.index());
        PartialTallyDecryption {
            guardian_index: self.shares.index(),
            contests,
        }
    }
}

/// Combines partial decryptions from at least `k` guardians into the plaintext tally.
pub struct TallyAdmin<'a> {
    record: &'a EncryptionRecord,
}

impl<'a> TallyAdmin<'a> {
    pub fn new(record: &'a EncryptionRecord) -> TallyAdmin<'a> {
        TallyAdmin { record }
    }

    pub fn decrypt(
        &self,
        partials: &[PartialTallyDecryption],
        tally: &EncryptedTally,
    ) -> Result<DecryptedTally> {
        let group = self.record.parameters.group();
        let gp = self.record.guardian_parameters;
        let key = &self.record.election_public_keys.vote_encryption_key;

        let mut indices = BTreeSet::new();
        for partial in partials {
            let index = partial.guardian_index;
            if index == 0 || index > gp.n {
                return Err(Error::InvalidGuardianIndex { index, n: gp.n });
            }
            if !indices.insert(index) {
                return Err(Error::InvalidParameters(format!(
                    "two partial decryptions from guardian {index}"
                )));
            }
        }
        if partials.len() < gp.k as usize {
            return Err(Error::InsufficientGuardians {
                available: partials.len(),
                threshold: gp.k,
            });
        }

        let coefficients = partials
            .iter()
            .map(|p| lagrange_coefficient(group, p.guardian_index, &indices))
            .collect::<Vec<_>>();

        let mut contests = BTreeMap::new();
        for (contest_id, choices) in &tally.contests {
            let limit = self
                .record
                .manifest
                .contest(contest_id)
                .map(|c| u64::from(c.option_selection_limit))
                .ok_or_else(|| Error::UnknownContest(contest_id.clone()))?;
            let bound = limit.checked_mul(tally.total_weight).ok_or_else(|| {
                Error::InvalidParameters(format!(
                    "total weight {} overflows the search bound of contest {contest_id}",
                    tally.total_weight
                ))
            })?;

            let mut counts = BTreeMap::new();
            for (choice_id, aggregate) in choices {
                let mut m = Element::one();
                for (partial, w) in partials.iter().zip(&coefficients) {
                    let m_i = partial
                        .contests
                        .get(contest_id)
                        .and_then(|c| c.get(choice_id))
                        .ok_or_else(|| Error::UnknownChoice {
                            contest_id: contest_id.clone(),
                            choice_id: choice_id.clone(),
                        })?;
                    m = group.mul_p(&m, &group.pow_p(m_i, w));
                }
                let t = group.div_p(&aggregate.beta, &m);
                let count = group.bounded_log(key, &t, bound).ok_or_else(|| {
                    warn!("no count up to {bound} for {contest_id}/{choice_id}");
                    Error::TallyDecryptionFailed {
                        contest_id: contest_id.clone(),
                        choice_id: choice_id.clone(),
                    }
                })?;
                counts.insert(choice_id.clone(), count);
            }
            contests.insert(contest_id.clone(), counts);
        }

        info!(
            "decrypted tally of {} ballots with guardians {:?}",
            tally.ballots_cast, indices
        );
        Ok(DecryptedTally {
            contests,
            ballots_cast: tally.ballots_cast,
        })
    }
}

/// `w_i = Π l / Π (l - i)` over the other guardians `l` taking part, mod q.
fn lagrange_coefficient(group: &Group, index: u32, available: &BTreeSet<u32>) -> Exponent {
    let i = Exponent::from(index);
    let mut numerator = Exponent::from(1);
    let mut denominator = Exponent::from(1);
    for &l in available.iter().filter(|&&l| l != index) {
        let l = Exponent::from(l);
        numerator = group.mul_q(&numerator, &l);
        denominator = group.mul_q(&denominator, &group.sub_q(&l, &i));
    }
    group.div_q(&numerator, &denominator)
}
