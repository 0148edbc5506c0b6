use log::{debug, info};
use rand::{CryptoRng, Rng};

use super::confirmation::{chaining_field, confirmation_code, contest_hash};
use super::data::{contest_data_blocks, encrypt_ballot_nonce, encrypt_contest_data};
use super::encrypted::{Counter, EncryptedBallot, EncryptedContest};
use super::selection::{EncryptedSelection, EncryptedValueWithProofs, ProofContext};
use super::{Ballot, BallotContest};
use crate::crypto::elgamal::Ciphertext;
use crate::crypto::group::{random_bytes, Exponent, Group};
use crate::crypto::hash::{hash, hash_to_exponent, HashValue};
use crate::errors::{Error, Result, ValidationError};
use crate::manifest::{ChainingMode, Contest};
use crate::parameters::device_hash;
use crate::record::EncryptionRecord;

/// Label of the contest data nonce, alongside the `Counter` labels.
const CONTEST_DATA_LABEL: &str = "contest_data";

/// Encrypts ballots for one election on one voting device.
///
/// The encryptor holds no mutable state: any number of ballots can be encrypted concurrently.
/// Chaining is the caller's business; `encrypt` takes the previous confirmation code from the
/// same device, and `encrypt_all` threads it through a batch.
pub struct BallotEncryptor<'a> {
    record: &'a EncryptionRecord,
    device_id: String,
    device_hash: HashValue,
}

/// The per-ballot secrets every nonce and hash on the ballot is derived from.
struct BallotKeys {
    selection_identifier_hash: HashValue,
    ballot_nonce: [u8; 32],
}

impl<'a> BallotEncryptor<'a> {
    pub fn new(record: &'a EncryptionRecord, device_id: &str) -> Result<BallotEncryptor<'a>> {
        let device_hash = device_hash(&record.extended_base_hash, device_id)?;
        Ok(BallotEncryptor {
            record,
            device_id: device_id.to_owned(),
            device_hash,
        })
    }

    pub fn device_hash(&self) -> &HashValue {
        &self.device_hash
    }

    fn group(&self) -> &'a Group {
        self.record.parameters.group()
    }

    /// Validate and encrypt `ballot`.  `previous` is the confirmation code of the last ballot
    /// encrypted on this device; it is ignored unless the manifest asks for chaining.
    pub fn encrypt<R: Rng + CryptoRng>(
        &self,
        ballot: &Ballot,
        previous: Option<&HashValue>,
        rng: &mut R,
    ) -> Result<EncryptedBallot> {
        let manifest = &self.record.manifest;
        ballot.validate(manifest)?;
        let style = manifest
            .ballot_style(&ballot.ballot_style_id)
            .ok_or_else(|| ValidationError::ballot("unknown ballot style"))?;

        let selection_identifier = HashValue::from_bytes(random_bytes(rng));
        let keys = BallotKeys {
            selection_identifier_hash: hash(
                self.record.extended_base_hash.as_ref(),
                &[&0x20_u8, &selection_identifier],
            )?,
            ballot_nonce: random_bytes(rng),
        };

        let mut contests = Vec::with_capacity(style.contest_ids.len());
        for contest_id in &style.contest_ids {
            let contest = manifest
                .contest(contest_id)
                .ok_or_else(|| Error::UnknownContest(contest_id.clone()))?;
            let plaintext = ballot
                .contest(contest_id)
                .ok_or_else(|| Error::UnknownContest(contest_id.clone()))?;
            contests.push(self.encrypt_contest(&keys, contest, plaintext, rng)?);
        }

        let encrypted_ballot_nonce = encrypt_ballot_nonce(
            self.group(),
            &self.record.election_public_keys.other_ballot_data_encryption_key,
            &keys.selection_identifier_hash,
            &keys.ballot_nonce,
            rng,
        )?;

        let chaining_field = chaining_field(manifest.chaining_mode, &self.device_hash, previous);
        let confirmation_code = confirmation_code(
            &keys.selection_identifier_hash,
            contests.iter().map(|c| &c.contest_hash),
            &chaining_field,
        )?;
        debug!(
            "encrypted ballot {} on device {}: confirmation code {}",
            ballot.id, self.device_id, confirmation_code
        );

        Ok(EncryptedBallot {
            id: ballot.id.clone(),
            ballot_style_id: ballot.ballot_style_id.clone(),
            device_id: self.device_id.clone(),
            weight: ballot.weight,
            selection_identifier,
            selection_identifier_hash: keys.selection_identifier_hash,
            contests,
            encrypted_ballot_nonce,
            chaining_field,
            confirmation_code,
        })
    }

    fn encrypt_contest<R: Rng + CryptoRng>(
        &self,
        keys: &BallotKeys,
        contest: &Contest,
        plaintext: &BallotContest,
        rng: &mut R,
    ) -> Result<EncryptedContest> {
        let group = self.group();
        let manifest = &self.record.manifest;
        let vote_key = &self.record.election_public_keys.vote_encryption_key;
        let h_i = &keys.selection_identifier_hash;

        let votes = plaintext.votes();
        let overvoted = votes > u64::from(contest.selection_limit);
        if overvoted {
            info!(
                "ballot overvotes contest {}; recording selections as zero",
                contest.id
            );
        }

        let mut choices = Vec::with_capacity(contest.choices.len());
        let mut total_value = 0;
        let mut total_nonce = Exponent::zero();
        for choice in &contest.choices {
            let value = match overvoted {
                true => 0,
                false => plaintext.selection(&choice.id).unwrap_or(0),
            };
            let nonce = selection_nonce(
                group,
                h_i,
                contest.index,
                choice.index,
                &keys.ballot_nonce,
            )?;
            let context = ProofContext {
                selection_identifier_hash: h_i,
                contest_index: contest.index,
                choice_index: Some(choice.index),
            };
            let encrypted = EncryptedValueWithProofs::encrypt(
                group,
                vote_key,
                context,
                value,
                contest.option_selection_limit,
                &nonce,
                rng,
            )?;
            total_value += value;
            total_nonce = group.add_q(&total_nonce, &nonce);
            choices.push(EncryptedSelection {
                choice_id: choice.id.clone(),
                value: encrypted,
            });
        }

        let total = choices.iter().fold(Ciphertext::identity(), |acc, s| {
            acc.h_add(group, &s.value.ciphertext)
        });
        let contest_context = ProofContext {
            selection_identifier_hash: h_i,
            contest_index: contest.index,
            choice_index: None,
        };
        let proof = EncryptedValueWithProofs::prove_existing(
            group,
            vote_key,
            contest_context,
            total,
            total_value,
            contest.selection_limit,
            &total_nonce,
            rng,
        )?;

        let mut counters = [None, None, None, None];
        for (slot, counter) in counters.iter_mut().zip(Counter::ALL) {
            if !counter.included(manifest) {
                continue;
            }
            let value = counter_value(counter, contest, plaintext, overvoted);
            let nonce =
                labelled_nonce(group, h_i, contest.index, counter.label(), &keys.ballot_nonce)?;
            *slot = Some(EncryptedValueWithProofs::encrypt(
                group,
                vote_key,
                contest_context,
                value,
                counter.limit(contest),
                &nonce,
                rng,
            )?);
        }
        let [overvote, nullvote, undervote, write_ins] = counters;

        let contest_data = match manifest.optional_contest_data_max_length {
            0 => None,
            max_length => {
                let nonce = labelled_nonce(
                    group,
                    h_i,
                    contest.index,
                    CONTEST_DATA_LABEL,
                    &keys.ballot_nonce,
                )?;
                Some(encrypt_contest_data(
                    group,
                    &self.record.election_public_keys.other_ballot_data_encryption_key,
                    h_i,
                    contest.index,
                    plaintext.contest_data.as_deref().unwrap_or(""),
                    contest_data_blocks(max_length),
                    &nonce,
                    rng,
                )?)
            }
        };

        let mut encrypted = EncryptedContest {
            contest_id: contest.id.clone(),
            choices,
            proof,
            overvote,
            nullvote,
            undervote,
            write_ins,
            contest_data,
            contest_hash: HashValue::from_bytes([0; 32]),
        };
        encrypted.contest_hash = contest_hash(h_i, contest.index, &encrypted)?;
        Ok(encrypted)
    }

    /// Encrypt a batch of ballots from this device.  With chaining on, the ballots are chained
    /// in order starting from the device hash; otherwise they are independent and, with the
    /// `parallel` feature, encrypted on the rayon thread pool.
    pub fn encrypt_all(&self, ballots: &[Ballot]) -> Result<Vec<EncryptedBallot>> {
        if self.record.manifest.chaining_mode == ChainingMode::Simple {
            let mut rng = rand::thread_rng();
            let mut previous: Option<HashValue> = None;
            let mut encrypted = Vec::with_capacity(ballots.len());
            for ballot in ballots {
                let e = self.encrypt(ballot, previous.as_ref(), &mut rng)?;
                previous = Some(e.confirmation_code);
                encrypted.push(e);
            }
            return Ok(encrypted);
        }

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            ballots
                .par_iter()
                .map(|ballot| self.encrypt(ballot, None, &mut rand::thread_rng()))
                .collect()
        }

        #[cfg(not(feature = "parallel"))]
        {
            let mut rng = rand::thread_rng();
            ballots
                .iter()
                .map(|ballot| self.encrypt(ballot, None, &mut rng))
                .collect()
        }
    }
}

fn counter_value(counter: Counter, contest: &Contest, plaintext: &BallotContest, overvoted: bool) -> u32 {
    if overvoted {
        return u32::from(counter == Counter::Overvote);
    }
    match counter {
        Counter::Overvote => 0,
        Counter::Nullvote => u32::from(plaintext.votes() == 0),
        // Not overvoted, so votes fit under the limit.
        Counter::Undervote => contest.selection_limit - plaintext.votes() as u32,
        Counter::WriteIns => plaintext.write_ins,
    }
}

/// `ξ_{i,j} = H_q(H_I; 0x21, contest index, choice index, ballot nonce)`.
pub fn selection_nonce(
    group: &Group,
    selection_identifier_hash: &HashValue,
    contest_index: u32,
    choice_index: u32,
    ballot_nonce: &[u8; 32],
) -> Result<Exponent> {
    Ok(hash_to_exponent(
        group,
        selection_identifier_hash.as_ref(),
        &[&0x21_u8, &contest_index, &choice_index, ballot_nonce],
    )?)
}

/// The nonce of a contest-level value: `H_q(H_I; 0x21, contest index, label, ballot nonce)`.
pub fn labelled_nonce(
    group: &Group,
    selection_identifier_hash: &HashValue,
    contest_index: u32,
    label: &str,
    ballot_nonce: &[u8; 32],
) -> Result<Exponent> {
    Ok(hash_to_exponent(
        group,
        selection_identifier_hash.as_ref(),
        &[&0x21_u8, &contest_index, &label, ballot_nonce],
    )?)
}

/// The nonce of a contest's encrypted data.
pub fn contest_data_nonce(
    group: &Group,
    selection_identifier_hash: &HashValue,
    contest_index: u32,
    ballot_nonce: &[u8; 32],
) -> Result<Exponent> {
    labelled_nonce(
        group,
        selection_identifier_hash,
        contest_index,
        CONTEST_DATA_LABEL,
        ballot_nonce,
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ballot::data::{decrypt_ballot_nonce, decrypt_contest_data, DataKey};
    use crate::ballot::test::ballot;
    use crate::key_ceremony::test::ceremony;
    use crate::manifest::test::two_choice_manifest;
    use crate::parameters::CryptographicParameters;

    /// An election with a single guardian, whose key share is the whole secret key.
    fn single_guardian() -> (EncryptionRecord, Exponent, Exponent) {
        let (record, shares) = ceremony(CryptographicParameters::test_group(), 1, 1);
        let encryption = EncryptionRecord::new(&record, two_choice_manifest()).unwrap();
        (
            encryption,
            shares[0].vote_encryption_key_share().clone(),
            shares[0].other_ballot_data_key_share().clone(),
        )
    }

    fn decrypt(record: &EncryptionRecord, secret: &Exponent, ct: &Ciphertext, bound: u32) -> Option<u32> {
        ct.decrypt_with_secret(
            record.parameters.group(),
            &record.election_public_keys.vote_encryption_key,
            secret,
            bound,
        )
    }

    #[test]
    fn encrypts_selections_and_counters() {
        let (record, secret, _) = single_guardian();
        let encryptor = BallotEncryptor::new(&record, "device-1").unwrap();
        let encrypted = encryptor
            .encrypt(&ballot("b1", 0, 1), None, &mut rand::thread_rng())
            .unwrap();

        let contest = &encrypted.contests[0];
        assert_eq!(contest.choices.len(), 2);
        assert_eq!(decrypt(&record, &secret, &contest.choices[0].value.ciphertext, 1), Some(0));
        assert_eq!(decrypt(&record, &secret, &contest.choices[1].value.ciphertext, 1), Some(1));

        let counter = |c: &Option<EncryptedValueWithProofs>| {
            decrypt(&record, &secret, &c.as_ref().unwrap().ciphertext, 1)
        };
        assert_eq!(counter(&contest.overvote), Some(0));
        assert_eq!(counter(&contest.nullvote), Some(0));
        assert_eq!(counter(&contest.undervote), Some(0));
        assert_eq!(counter(&contest.write_ins), Some(0));
    }

    #[test]
    fn overvote_zeroes_selections() {
        let (record, secret, _) = single_guardian();
        let encryptor = BallotEncryptor::new(&record, "device-1").unwrap();
        let encrypted = encryptor
            .encrypt(&ballot("b1", 1, 1), None, &mut rand::thread_rng())
            .unwrap();

        let contest = &encrypted.contests[0];
        for selection in &contest.choices {
            assert_eq!(decrypt(&record, &secret, &selection.value.ciphertext, 1), Some(0));
        }
        let overvote = contest.overvote.as_ref().unwrap();
        assert_eq!(decrypt(&record, &secret, &overvote.ciphertext, 1), Some(1));
    }

    #[test]
    fn empty_ballot_is_a_null_vote_and_undervote() {
        let (record, secret, _) = single_guardian();
        let encryptor = BallotEncryptor::new(&record, "device-1").unwrap();
        let encrypted = encryptor
            .encrypt(&ballot("b1", 0, 0), None, &mut rand::thread_rng())
            .unwrap();
        let contest = &encrypted.contests[0];
        let nullvote = contest.nullvote.as_ref().unwrap();
        let undervote = contest.undervote.as_ref().unwrap();
        assert_eq!(decrypt(&record, &secret, &nullvote.ciphertext, 1), Some(1));
        assert_eq!(decrypt(&record, &secret, &undervote.ciphertext, 1), Some(1));
    }

    #[test]
    fn invalid_ballot_is_rejected_before_encryption() {
        let (record, _, _) = single_guardian();
        let encryptor = BallotEncryptor::new(&record, "device-1").unwrap();
        let status = encryptor.encrypt(&ballot("b1", 3, 0), None, &mut rand::thread_rng());
        assert!(matches!(status, Err(Error::Validation(_))));
    }

    #[test]
    fn ballot_nonce_and_contest_data_are_recoverable() {
        let (record, _, data_secret) = single_guardian();
        let group = record.parameters.group();
        let encryptor = BallotEncryptor::new(&record, "device-1").unwrap();
        let mut plaintext = ballot("b1", 1, 0);
        plaintext.contests[0].contest_data = Some("Ford Prefect".to_owned());
        let encrypted = encryptor
            .encrypt(&plaintext, None, &mut rand::thread_rng())
            .unwrap();
        let h_i = &encrypted.selection_identifier_hash;

        let ballot_nonce = decrypt_ballot_nonce(
            group,
            h_i,
            &encrypted.encrypted_ballot_nonce,
            DataKey::Secret(&data_secret),
        )
        .unwrap();

        // The recovered ballot nonce regenerates every selection nonce.
        let contest = &encrypted.contests[0];
        let nonce = selection_nonce(group, h_i, 1, 1, &ballot_nonce).unwrap();
        assert_eq!(
            contest.choices[0].value.ciphertext.decrypt_with_nonce(
                group,
                &record.election_public_keys.vote_encryption_key,
                &nonce,
                1
            ),
            Some(1)
        );

        let data = contest.contest_data.as_ref().unwrap();
        assert_eq!(data.c1.len(), 64);
        let data_nonce = contest_data_nonce(group, h_i, 1, &ballot_nonce).unwrap();
        let text = decrypt_contest_data(
            group,
            h_i,
            1,
            data,
            DataKey::Nonce {
                nonce: &data_nonce,
                public_key: &record.election_public_keys.other_ballot_data_encryption_key,
            },
        )
        .unwrap();
        assert_eq!(text, "Ford Prefect");
    }

    #[test]
    fn encrypt_all_chains_in_order() {
        let (record, _, _) = single_guardian();
        let encryptor = BallotEncryptor::new(&record, "device-1").unwrap();
        let ballots = [ballot("b1", 1, 0), ballot("b2", 0, 1), ballot("b3", 0, 0)];
        let encrypted = encryptor.encrypt_all(&ballots).unwrap();

        assert_eq!(&encrypted[0].chaining_field[4..], encryptor.device_hash().as_bytes());
        for pair in encrypted.windows(2) {
            assert_eq!(&pair[1].chaining_field[4..], pair[0].confirmation_code.as_bytes());
        }
    }

    #[test]
    fn unchained_ballots_bind_device() {
        let (guardian_record, _) = ceremony(CryptographicParameters::test_group(), 1, 1);
        let mut manifest = two_choice_manifest();
        manifest.chaining_mode = ChainingMode::None;
        manifest.include_nullvotes = false;
        manifest.optional_contest_data_max_length = 0;
        let record = EncryptionRecord::new(&guardian_record, manifest).unwrap();

        let encryptor = BallotEncryptor::new(&record, "device-2").unwrap();
        let encrypted = encryptor
            .encrypt_all(&[ballot("b1", 1, 0), ballot("b2", 0, 1)])
            .unwrap();
        for e in &encrypted {
            assert_eq!(&e.chaining_field[..4], &[0, 0, 0, 0]);
            assert_eq!(&e.chaining_field[4..], encryptor.device_hash().as_bytes());
            assert!(e.contests[0].nullvote.is_none());
            assert!(e.contests[0].contest_data.is_none());
        }
    }
}
