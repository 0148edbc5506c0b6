use crate::ballot::EncryptedBallot;
use crate::errors::{Error, Result};
use crate::record::EncryptionRecord;
use crate::tally::EncryptedTally;

/// Verification 9: re-aggregating the ballots reproduces the claimed tally, choice by choice.
pub fn ballot_aggregation(
    record: &EncryptionRecord,
    ballots: &[EncryptedBallot],
    tally: &EncryptedTally,
) -> Result<()> {
    let group = record.parameters.group();
    let expected = EncryptedTally::from_ballots(group, &record.manifest, ballots)
        .map_err(|e| Error::verification("9", e.to_string()))?;

    if expected.ballots_cast != tally.ballots_cast || expected.total_weight != tally.total_weight {
        return Err(Error::verification(
            "9",
            format!(
                "tally claims {} ballots of weight {}, found {} of weight {}",
                tally.ballots_cast, tally.total_weight, expected.ballots_cast, expected.total_weight
            ),
        ));
    }
    if expected.contests.len() != tally.contests.len() {
        return Err(Error::verification("9", "tally does not cover the manifest's contests"));
    }

    for (contest_id, choices) in &expected.contests {
        for (choice_id, aggregate) in choices {
            let claimed = tally.choice(contest_id, choice_id).ok_or_else(|| {
                Error::verification("9", format!("tally has no entry for {contest_id}/{choice_id}"))
            })?;
            if claimed.alpha != aggregate.alpha {
                return Err(Error::verification(
                    "9.A",
                    format!("aggregate A of {contest_id}/{choice_id} does not recompute"),
                ));
            }
            if claimed.beta != aggregate.beta {
                return Err(Error::verification(
                    "9.B",
                    format!("aggregate B of {contest_id}/{choice_id} does not recompute"),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ballot::test::ballot;
    use crate::ballot::BallotEncryptor;
    use crate::key_ceremony::test::ceremony;
    use crate::manifest::test::two_choice_manifest;
    use crate::parameters::CryptographicParameters;

    fn election() -> (EncryptionRecord, Vec<EncryptedBallot>, EncryptedTally) {
        let (guardian_record, _) = ceremony(CryptographicParameters::test_group(), 1, 1);
        let record = EncryptionRecord::new(&guardian_record, two_choice_manifest()).unwrap();
        let ballots = BallotEncryptor::new(&record, "device-1")
            .unwrap()
            .encrypt_all(&[ballot("b1", 1, 0), ballot("b2", 0, 1)])
            .unwrap();
        let tally =
            EncryptedTally::from_ballots(record.parameters.group(), &record.manifest, &ballots)
                .unwrap();
        (record, ballots, tally)
    }

    #[test]
    fn honest_tally_passes() {
        let (record, ballots, tally) = election();
        let status = ballot_aggregation(&record, &ballots, &tally);
        dbg!(&status);
        assert!(status.is_ok());
    }

    #[test]
    fn substituted_aggregate_is_caught() {
        let (record, ballots, mut tally) = election();
        let bob = ballots[1].contests[0].choice("bob").unwrap().value.ciphertext.clone();
        let entry = tally.contests.get_mut("mayor").unwrap().get_mut("alice").unwrap();
        entry.alpha = bob.alpha;
        let status = ballot_aggregation(&record, &ballots, &tally);
        assert_eq!(status.unwrap_err().subsection(), Some("9.A"));
    }

    #[test]
    fn uncounted_ballot_is_caught() {
        let (record, ballots, _) = election();
        let partial =
            EncryptedTally::from_ballots(record.parameters.group(), &record.manifest, &ballots[..1])
                .unwrap();
        let status = ballot_aggregation(&record, &ballots, &partial);
        assert_eq!(status.unwrap_err().subsection(), Some("9"));
    }
}
