//! The guardian key ceremony: each guardian shares two secrets with a `k`-of-`n` polynomial
//! scheme, proves knowledge of its coefficients, and sends every other guardian an encrypted
//! evaluation of its polynomials.

use log::{debug, info};
use rand::{CryptoRng, Rng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::crypto::group::Exponent;
use crate::crypto::hash::HashValue;
use crate::errors::{Error, Result};
use crate::parameters::{CryptographicParameters, GuardianParameters};
use crate::verify;

mod keys;
mod record;
mod shares;

pub use keys::{ElectionPublicKeys, GuardianKeys, GuardianPublicView, KeyPair};
pub use record::GuardianRecord;
pub use shares::GuardianEncryptedShare;

pub(crate) use keys::{key_proof_challenge, DATA_LABEL, VOTE_LABEL};
pub(crate) use record::commitment_hash;

use shares::ShareValues;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuardianState {
    Uninitialized,
    KeysGenerated,
    SharesEncrypted,
    SharesDecrypted,
    Verified,
}

/// A guardian's shares of the two joint secrets: `z_i = Σ_l P_l(i)` and `ẑ_i = Σ_l P̂_l(i)`.
/// These are what the guardian uses for every later partial decryption.
#[derive(Debug, Clone)]
pub struct GuardianSecretShares {
    index: u32,
    vote_encryption_key_share: Exponent,
    other_ballot_data_key_share: Exponent,
}

impl GuardianSecretShares {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn vote_encryption_key_share(&self) -> &Exponent {
        &self.vote_encryption_key_share
    }

    pub fn other_ballot_data_key_share(&self) -> &Exponent {
        &self.other_ballot_data_key_share
    }
}

/// One guardian's side of the ceremony.
///
/// The steps must happen in order: `generate_keys`, then `encrypt_shares` once the public views
/// of all other guardians are in, then `decrypt_shares` once all shares addressed to this
/// guardian are in, and finally `verify` against the published `GuardianRecord`.  Calling a step
/// out of order fails with `Error::InvalidState`; `reset` starts over.
pub struct Guardian<'a> {
    parameters: &'a CryptographicParameters,
    guardian_parameters: GuardianParameters,
    parameter_base_hash: HashValue,
    index: u32,
    state: GuardianState,
    keys: Option<GuardianKeys>,
    /// The other guardians' public views as received at the share exchange.
    peers: Vec<GuardianPublicView>,
    /// Decrypted share values by sender index.
    received: BTreeMap<u32, ShareValues>,
    secret_shares: Option<GuardianSecretShares>,
}

impl<'a> Guardian<'a> {
    pub fn new(
        parameters: &'a CryptographicParameters,
        guardian_parameters: GuardianParameters,
        index: u32,
    ) -> Result<Guardian<'a>> {
        if index == 0 || index > guardian_parameters.n {
            return Err(Error::InvalidGuardianIndex {
                index,
                n: guardian_parameters.n,
            });
        }
        let parameter_base_hash = parameters.parameter_base_hash(&guardian_parameters)?;
        Ok(Guardian {
            parameters,
            guardian_parameters,
            parameter_base_hash,
            index,
            state: GuardianState::Uninitialized,
            keys: None,
            peers: Vec::new(),
            received: BTreeMap::new(),
            secret_shares: None,
        })
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn state(&self) -> GuardianState {
        self.state
    }

    pub fn keys(&self) -> Option<&GuardianKeys> {
        self.keys.as_ref()
    }

    pub fn secret_shares(&self) -> Option<&GuardianSecretShares> {
        self.secret_shares.as_ref()
    }

    /// Discard everything and return to `Uninitialized`.
    pub fn reset(&mut self) {
        self.state = GuardianState::Uninitialized;
        self.keys = None;
        self.peers.clear();
        self.received.clear();
        self.secret_shares = None;
    }

    fn expect_state(&self, expected: GuardianState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(Error::InvalidState {
                guardian: self.index,
                expected,
                actual: self.state,
            })
        }
    }

    fn generated_keys(&self) -> Result<&GuardianKeys> {
        self.keys.as_ref().ok_or(Error::InvalidState {
            guardian: self.index,
            expected: GuardianState::KeysGenerated,
            actual: self.state,
        })
    }

    pub fn generate_keys<R: Rng + CryptoRng>(&mut self, rng: &mut R) -> Result<&GuardianKeys> {
        self.expect_state(GuardianState::Uninitialized)?;
        let keys = GuardianKeys::generate(
            self.parameters.group(),
            &self.parameter_base_hash,
            self.index,
            self.guardian_parameters.k,
            rng,
        )?;
        info!(
            "guardian {} generated {} key pairs per purpose",
            self.index, self.guardian_parameters.k
        );
        self.state = GuardianState::KeysGenerated;
        Ok(self.keys.insert(keys))
    }

    /// Check the public views of the other guardians and encrypt a pair of shares for each.
    /// `peers` must hold one view for every other guardian; this guardian's own view may be
    /// included and is skipped.
    pub fn encrypt_shares<R: Rng + CryptoRng>(
        &mut self,
        peers: &[GuardianPublicView],
        rng: &mut R,
    ) -> Result<Vec<GuardianEncryptedShare>> {
        self.expect_state(GuardianState::KeysGenerated)?;
        let group = self.parameters.group();

        let mut views = BTreeMap::new();
        for view in peers.iter().filter(|v| v.index != self.index) {
            if view.index == 0 || view.index > self.guardian_parameters.n {
                return Err(Error::InvalidGuardianIndex {
                    index: view.index,
                    n: self.guardian_parameters.n,
                });
            }
            verify::guardian_public_keys(
                group,
                &self.parameter_base_hash,
                &self.guardian_parameters,
                view,
            )
            .map_err(|e| Error::InvalidGuardianKeys {
                guardian: view.index,
                subsection: e.subsection().unwrap_or("2"),
            })?;
            views.insert(view.index, view.clone());
        }
        if let Some(missing) = self.other_indices().find(|l| !views.contains_key(l)) {
            return Err(Error::InvalidParameters(format!(
                "no public view received from guardian {missing}"
            )));
        }

        let keys = self.generated_keys()?;
        let mut encrypted = Vec::with_capacity(views.len());
        for (&l, view) in &views {
            let values = ShareValues {
                vote: shares::evaluate(group, keys.vote_coefficients(), l),
                data: shares::evaluate(group, keys.data_coefficients(), l),
            };
            encrypted.push(shares::encrypt(
                group,
                &self.parameter_base_hash,
                self.index,
                l,
                &view.communication_public_key,
                &values,
                rng,
            )?);
            debug!("guardian {} encrypted shares for guardian {}", self.index, l);
        }

        self.peers = views.into_values().collect();
        self.state = GuardianState::SharesEncrypted;
        Ok(encrypted)
    }

    /// Decrypt the shares sent to this guardian and combine them with its own evaluation into
    /// `GuardianSecretShares`.  Every other guardian must have sent exactly one share.
    pub fn decrypt_shares(
        &mut self,
        received: &[GuardianEncryptedShare],
    ) -> Result<&GuardianSecretShares> {
        self.expect_state(GuardianState::SharesEncrypted)?;
        let group = self.parameters.group();
        let keys = self.generated_keys()?;

        let mut values = BTreeMap::new();
        for share in received {
            let known_sender = self.peers.iter().any(|p| p.index == share.source_index);
            if share.destination_index != self.index
                || !known_sender
                || values.contains_key(&share.source_index)
            {
                return Err(Error::ShareDecryptionFailed {
                    source_index: share.source_index,
                });
            }
            let decrypted = shares::decrypt(
                group,
                &self.parameter_base_hash,
                share,
                keys.communication_key(),
            )?;
            values.insert(share.source_index, decrypted);
        }
        if let Some(missing) = self.other_indices().find(|l| !values.contains_key(l)) {
            return Err(Error::MissingShare {
                source_index: missing,
            });
        }

        let own_vote = shares::evaluate(group, keys.vote_coefficients(), self.index);
        let own_data = shares::evaluate(group, keys.data_coefficients(), self.index);
        let secret_shares = GuardianSecretShares {
            index: self.index,
            vote_encryption_key_share: group.add_q(
                &own_vote,
                &group.sum_q(values.values().map(|v| &v.vote)),
            ),
            other_ballot_data_key_share: group.add_q(
                &own_data,
                &group.sum_q(values.values().map(|v| &v.data)),
            ),
        };
        info!("guardian {} decrypted {} shares", self.index, values.len());

        self.received = values;
        self.state = GuardianState::SharesDecrypted;
        Ok(self.secret_shares.insert(secret_shares))
    }

    /// Check the published record against the public views this guardian received during the
    /// exchange, then check every received share against its sender's commitments.
    pub fn verify(&mut self, record: &GuardianRecord) -> Result<()> {
        self.expect_state(GuardianState::SharesDecrypted)?;
        let group = self.parameters.group();

        let mut views = self.peers.clone();
        views.push(self.generated_keys()?.to_public_view());
        views.sort_by_key(|v| v.index);

        // Blame the first guardian whose published view differs from the one received.
        let altered = views
            .iter()
            .zip(&record.guardians)
            .find(|(received, published)| received != published)
            .map(|(received, _)| received.index)
            .or_else(|| {
                let (longer, shorter) = match record.guardians.len() > views.len() {
                    true => (&record.guardians, &views),
                    false => (&views, &record.guardians),
                };
                longer.get(shorter.len()).map(|v| v.index)
            });
        if let Some(guardian) = altered {
            return Err(Error::GuardianRecordMismatch { guardian });
        }

        let keys = ElectionPublicKeys::from_guardians(group, &views);
        let expected_hash = commitment_hash(&self.parameter_base_hash, &keys, &views)?;
        let matches = record.parameter_base_hash == self.parameter_base_hash
            && record.guardian_parameters == self.guardian_parameters
            && record.election_public_keys == keys
            && record.commitment_hash == expected_hash;
        if !matches {
            return Err(Error::GuardianRecordMismatch {
                guardian: self.index,
            });
        }

        for peer in &self.peers {
            let values = self.received.get(&peer.index).ok_or(Error::MissingShare {
                source_index: peer.index,
            })?;
            let vote_ok = shares::matches_commitments(
                group,
                &values.vote,
                &peer.vote_encryption_commitments,
                self.index,
            );
            let data_ok = shares::matches_commitments(
                group,
                &values.data,
                &peer.other_ballot_data_encryption_commitments,
                self.index,
            );
            if !(vote_ok && data_ok) {
                return Err(Error::ShareVerificationFailed {
                    source_index: peer.index,
                });
            }
        }

        info!("guardian {} verified the guardian record", self.index);
        self.state = GuardianState::Verified;
        Ok(())
    }

    fn other_indices(&self) -> impl Iterator<Item = u32> + '_ {
        (1..=self.guardian_parameters.n).filter(move |&l| l != self.index)
    }
}
