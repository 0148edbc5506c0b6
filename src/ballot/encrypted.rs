use serde::{Deserialize, Serialize};

use super::data::EncryptedData;
use super::selection::{EncryptedSelection, EncryptedValueWithProofs};
use crate::crypto::chaum_pedersen::RangeProof;
use crate::crypto::elgamal::Ciphertext;
use crate::crypto::group::Group;
use crate::crypto::hash::HashValue;
use crate::manifest::{Contest, Manifest};

/// An encrypted ballot, as published after casting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedBallot {
    pub id: String,
    pub ballot_style_id: String,
    pub device_id: String,
    pub weight: u32,
    /// The random selection encryption identifier `id_B`.
    pub selection_identifier: HashValue,
    /// `H_I = H(H_E; 0x20, id_B)`, the key for every hash on this ballot.
    pub selection_identifier_hash: HashValue,
    /// Contests in ballot style order.
    pub contests: Vec<EncryptedContest>,
    pub encrypted_ballot_nonce: EncryptedData,
    #[serde(with = "crate::serialize::hash::bytes")]
    pub chaining_field: Vec<u8>,
    pub confirmation_code: HashValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedContest {
    pub contest_id: String,
    /// Selections in manifest order.
    pub choices: Vec<EncryptedSelection>,
    /// Proves the sum of the selections is within the contest's selection limit.
    pub proof: RangeProof,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overvote: Option<EncryptedValueWithProofs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullvote: Option<EncryptedValueWithProofs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub undervote: Option<EncryptedValueWithProofs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_ins: Option<EncryptedValueWithProofs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contest_data: Option<EncryptedData>,
    pub contest_hash: HashValue,
}

/// The encrypted counters a contest may carry besides its selections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    Overvote,
    Nullvote,
    Undervote,
    WriteIns,
}

impl Counter {
    pub const ALL: [Counter; 4] = [
        Counter::Overvote,
        Counter::Nullvote,
        Counter::Undervote,
        Counter::WriteIns,
    ];

    /// The label hashed into the counter's nonce.
    pub fn label(self) -> &'static str {
        match self {
            Counter::Overvote => "overvote",
            Counter::Nullvote => "nullvote",
            Counter::Undervote => "undervote",
            Counter::WriteIns => "write_in",
        }
    }

    /// The largest value the counter can hold: the two flags are 0 or 1, the counts are bounded
    /// by the contest's selection limit.
    pub fn limit(self, contest: &Contest) -> u32 {
        match self {
            Counter::Overvote | Counter::Nullvote => 1,
            Counter::Undervote | Counter::WriteIns => contest.selection_limit,
        }
    }

    pub fn included(self, manifest: &Manifest) -> bool {
        match self {
            Counter::Overvote => manifest.include_overvotes,
            Counter::Nullvote => manifest.include_nullvotes,
            Counter::Undervote => manifest.include_undervotes,
            Counter::WriteIns => manifest.include_writeins,
        }
    }
}

impl EncryptedContest {
    /// The counters in hashing order, each `None` when the manifest leaves it out.
    pub fn metadata(&self) -> [(Counter, Option<&EncryptedValueWithProofs>); 4] {
        [
            (Counter::Overvote, self.overvote.as_ref()),
            (Counter::Nullvote, self.nullvote.as_ref()),
            (Counter::Undervote, self.undervote.as_ref()),
            (Counter::WriteIns, self.write_ins.as_ref()),
        ]
    }

    /// The homomorphic sum of the selections, which the contest proof is about.
    pub fn total(&self, group: &Group) -> Ciphertext {
        self.choices
            .iter()
            .fold(Ciphertext::identity(), |acc, s| acc.h_add(group, &s.value.ciphertext))
    }

    pub fn choice(&self, choice_id: &str) -> Option<&EncryptedSelection> {
        self.choices.iter().find(|c| c.choice_id == choice_id)
    }
}

impl EncryptedBallot {
    pub fn contest(&self, contest_id: &str) -> Option<&EncryptedContest> {
        self.contests.iter().find(|c| c.contest_id == contest_id)
    }
}
