//! The nine independent checks of an election record.
//!
//! Each check recomputes something from the published data and compares it with what was
//! claimed.  A failure is an `Error::VerificationFailed` carrying the numbered subsection that
//! caught it; nothing is ever corrected or retried.

use log::{info, warn};
use std::collections::BTreeMap;

use crate::ballot::EncryptedBallot;
use crate::crypto::hash::HashValue;
use crate::errors::Result;
use crate::parameters::CryptographicParameters;
use crate::record::EncryptionRecord;
use crate::tally::EncryptedTally;

mod ballots;
mod keys;
mod tally;

pub use ballots::{confirmation_codes, selection_encryptions, selection_identifiers, vote_limits};
pub use keys::{election_public_keys, extended_base_hash, guardian_public_keys, parameters};
pub use tally::ballot_aggregation;

/// Run verifications 1 through 9 over a whole election, stopping at the first failure.
///
/// `expected` are the parameters the verifier trusts, which the record's parameters must equal.
/// `device_hashes` maps each voting device id to its published device hash.
pub fn verify_election(
    expected: &CryptographicParameters,
    record: &EncryptionRecord,
    ballots: &[EncryptedBallot],
    tally: &EncryptedTally,
    device_hashes: &BTreeMap<String, HashValue>,
) -> Result<()> {
    let group = record.parameters.group();

    step(1, || parameters(expected, record))?;
    step(2, || {
        record.guardians.iter().try_for_each(|view| {
            guardian_public_keys(
                group,
                &record.parameter_base_hash,
                &record.guardian_parameters,
                view,
            )
        })
    })?;
    step(3, || {
        election_public_keys(group, &record.guardians, &record.election_public_keys)
    })?;
    step(4, || extended_base_hash(record))?;
    step(5, || selection_identifiers(record, ballots))?;
    step(6, || for_each_ballot(ballots, |b| selection_encryptions(record, b)))?;
    step(7, || for_each_ballot(ballots, |b| vote_limits(record, b)))?;
    step(8, || confirmation_codes(record, ballots, device_hashes))?;
    step(9, || ballot_aggregation(record, ballots, tally))?;

    info!("election record verified: {} ballots", ballots.len());
    Ok(())
}

fn step(number: u32, check: impl FnOnce() -> Result<()>) -> Result<()> {
    match check() {
        Ok(()) => {
            info!("verification {number} passed");
            Ok(())
        }
        Err(e) => {
            warn!("verification {number} failed: {e}");
            Err(e)
        }
    }
}

#[cfg(feature = "parallel")]
fn for_each_ballot<F>(ballots: &[EncryptedBallot], check: F) -> Result<()>
where
    F: Fn(&EncryptedBallot) -> Result<()> + Sync + Send,
{
    use rayon::prelude::*;
    ballots.par_iter().try_for_each(check)
}

#[cfg(not(feature = "parallel"))]
fn for_each_ballot<F>(ballots: &[EncryptedBallot], check: F) -> Result<()>
where
    F: Fn(&EncryptedBallot) -> Result<()>,
{
    ballots.iter().try_for_each(check)
}
