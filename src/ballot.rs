//! Plaintext ballots, their validation against the manifest, and their encryption.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::errors::ValidationError;
use crate::manifest::Manifest;

pub mod confirmation;
pub mod data;
pub mod encrypted;
pub mod encryptor;
pub mod selection;

pub use data::{DataKey, EncryptedData};
pub use encrypted::{Counter, EncryptedBallot, EncryptedContest};
pub use encryptor::BallotEncryptor;
pub use selection::{EncryptedSelection, EncryptedValueWithProofs, ProofContext};

/// A voter's ballot before encryption.  Never stored or published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    pub id: String,
    pub ballot_style_id: String,
    pub contests: Vec<BallotContest>,
    /// How many times the ballot counts in the tally.
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotContest {
    pub contest_id: String,
    pub choices: Vec<BallotChoice>,
    /// The number of write-in candidates the voter filled in.
    #[serde(default)]
    pub write_ins: u32,
    /// Free text attached to the contest, such as the names written in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contest_data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotChoice {
    pub choice_id: String,
    pub selection: u32,
}

impl Ballot {
    /// Check the ballot against its style: every contest of the style appears exactly once and
    /// nothing else does, every choice of each contest appears exactly once, and no value exceeds
    /// what the manifest allows.
    ///
    /// Voting for more choices than the selection limit is not a validation error; the encryptor
    /// records it as an overvote.
    pub fn validate(&self, manifest: &Manifest) -> Result<(), ValidationError> {
        if self.weight == 0 {
            return Err(ValidationError::ballot("weight must be at least 1"));
        }
        let style = manifest.ballot_style(&self.ballot_style_id).ok_or_else(|| {
            ValidationError::ballot(format!("unknown ballot style {:?}", self.ballot_style_id))
        })?;

        let mut seen = HashSet::new();
        for contest in &self.contests {
            let id = contest.contest_id.as_str();
            if !style.contest_ids.iter().any(|c| c == id) {
                return Err(ValidationError::contest(id, "not on the ballot style"));
            }
            if !seen.insert(id) {
                return Err(ValidationError::contest(id, "appears more than once"));
            }
        }
        if let Some(missing) = style.contest_ids.iter().find(|c| !seen.contains(c.as_str())) {
            return Err(ValidationError::contest(missing, "missing from the ballot"));
        }

        for contest in &self.contests {
            contest.validate(manifest)?;
        }
        Ok(())
    }

    pub fn contest(&self, contest_id: &str) -> Option<&BallotContest> {
        self.contests.iter().find(|c| c.contest_id == contest_id)
    }
}

impl BallotContest {
    fn validate(&self, manifest: &Manifest) -> Result<(), ValidationError> {
        let id = self.contest_id.as_str();
        let contest = manifest
            .contest(id)
            .ok_or_else(|| ValidationError::contest(id, "not in the manifest"))?;

        let mut seen = HashSet::new();
        for choice in &self.choices {
            let choice_id = choice.choice_id.as_str();
            if contest.choice(choice_id).is_none() {
                return Err(ValidationError::choice(id, choice_id, "not a choice of the contest"));
            }
            if !seen.insert(choice_id) {
                return Err(ValidationError::choice(id, choice_id, "appears more than once"));
            }
            if choice.selection > contest.option_selection_limit {
                return Err(ValidationError::choice(
                    id,
                    choice_id,
                    format!(
                        "selection {} exceeds the option selection limit {}",
                        choice.selection, contest.option_selection_limit
                    ),
                ));
            }
        }
        if let Some(missing) = contest.choices.iter().find(|c| !seen.contains(c.id.as_str())) {
            return Err(ValidationError::choice(id, &missing.id, "missing from the ballot"));
        }

        if self.write_ins > contest.selection_limit {
            return Err(ValidationError::contest(
                id,
                format!(
                    "{} write-ins exceed the selection limit {}",
                    self.write_ins, contest.selection_limit
                ),
            ));
        }
        if let Some(data) = &self.contest_data {
            if data.len() > manifest.optional_contest_data_max_length as usize {
                return Err(ValidationError::contest(
                    id,
                    format!(
                        "contest data is longer than {} bytes",
                        manifest.optional_contest_data_max_length
                    ),
                ));
            }
        }
        Ok(())
    }

    pub fn selection(&self, choice_id: &str) -> Option<u32> {
        self.choices
            .iter()
            .find(|c| c.choice_id == choice_id)
            .map(|c| c.selection)
    }

    /// Votes cast in the contest, including write-ins.
    pub fn votes(&self) -> u64 {
        self.choices
            .iter()
            .map(|c| u64::from(c.selection))
            .sum::<u64>()
            + u64::from(self.write_ins)
    }
}

#[cfg(test)]
pub mod test {
    use super::*;
    use crate::manifest::test::two_choice_manifest;
    use rstest::rstest;

    /// A ballot for the two-choice manifest with the given selections for alice and bob.
    pub fn ballot(id: &str, alice: u32, bob: u32) -> Ballot {
        Ballot {
            id: id.to_owned(),
            ballot_style_id: "style-1".to_owned(),
            contests: vec![BallotContest {
                contest_id: "mayor".to_owned(),
                choices: vec![
                    BallotChoice {
                        choice_id: "alice".to_owned(),
                        selection: alice,
                    },
                    BallotChoice {
                        choice_id: "bob".to_owned(),
                        selection: bob,
                    },
                ],
                write_ins: 0,
                contest_data: None,
            }],
            weight: 1,
        }
    }

    #[rstest]
    #[case(1, 0)]
    #[case(0, 1)]
    #[case(0, 0)]
    #[case(1, 1)]
    fn conforming_ballots_validate(#[case] alice: u32, #[case] bob: u32) {
        let status = ballot("b", alice, bob).validate(&two_choice_manifest());
        dbg!(&status);
        assert!(status.is_ok());
    }

    #[test]
    fn selection_above_option_limit_names_choice() {
        let status = ballot("b", 2, 0).validate(&two_choice_manifest());
        let error = status.unwrap_err();
        assert_eq!(error.contest_id.as_deref(), Some("mayor"));
        assert_eq!(error.choice_id.as_deref(), Some("alice"));
    }

    #[test]
    fn missing_choice_is_rejected() {
        let mut b = ballot("b", 1, 0);
        b.contests[0].choices.pop();
        let error = b.validate(&two_choice_manifest()).unwrap_err();
        assert_eq!(error.choice_id.as_deref(), Some("bob"));
    }

    #[test]
    fn duplicate_contest_is_rejected() {
        let mut b = ballot("b", 1, 0);
        b.contests.push(b.contests[0].clone());
        assert!(b.validate(&two_choice_manifest()).is_err());
    }

    #[test]
    fn missing_contest_is_rejected() {
        let mut b = ballot("b", 1, 0);
        b.contests.clear();
        let error = b.validate(&two_choice_manifest()).unwrap_err();
        assert_eq!(error.contest_id.as_deref(), Some("mayor"));
    }

    #[test]
    fn unknown_style_and_zero_weight_are_rejected() {
        let mut b = ballot("b", 1, 0);
        b.weight = 0;
        assert!(b.validate(&two_choice_manifest()).is_err());

        let mut b = ballot("b", 1, 0);
        b.ballot_style_id = "nope".to_owned();
        assert!(b.validate(&two_choice_manifest()).is_err());
    }

    #[test]
    fn long_contest_data_is_rejected() {
        let mut b = ballot("b", 0, 0);
        b.contests[0].contest_data = Some("x".repeat(65));
        assert!(b.validate(&two_choice_manifest()).is_err());
        b.contests[0].contest_data = Some("x".repeat(64));
        assert!(b.validate(&two_choice_manifest()).is_ok());
    }

    #[test]
    fn weight_defaults_to_one() {
        let json = r#"{"id": "b", "ballot_style_id": "style-1", "contests": []}"#;
        let b: Ballot = serde_json::from_str(json).unwrap();
        assert_eq!(b.weight, 1);
    }
}
