use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::errors::{Error, Result};

/// How the confirmation code of each ballot is chained to its predecessor on the same device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ChainingMode {
    /// Every ballot is bound to the device hash only.
    #[default]
    None,
    /// Every ballot after the first is bound to the previous ballot's confirmation code.
    Simple,
}

impl ChainingMode {
    /// The identifier hashed into the chaining field.
    pub fn identifier(self) -> u32 {
        match self {
            ChainingMode::None => 0,
            ChainingMode::Simple => 1,
        }
    }
}

/// The structure of an election: its contests, their choices, and which contests appear on which
/// ballot styles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub election_id: String,
    pub contests: Vec<Contest>,
    pub ballot_styles: Vec<BallotStyle>,

    /// The longest free-text contest data, in bytes, a voter may attach to a contest.
    #[serde(default)]
    pub optional_contest_data_max_length: u32,

    /// Whether each encrypted contest carries an overvote flag.
    #[serde(default)]
    pub include_overvotes: bool,
    #[serde(default)]
    pub include_nullvotes: bool,
    #[serde(default)]
    pub include_undervotes: bool,
    #[serde(default)]
    pub include_writeins: bool,

    #[serde(default)]
    pub chaining_mode: ChainingMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contest {
    pub id: String,
    pub name: String,
    /// The maximum number of votes `L` across all choices of the contest.
    pub selection_limit: u32,
    /// The maximum number of votes `R` for any single choice.
    pub option_selection_limit: u32,
    /// The position of the contest, hashed into nonces, proofs, and confirmation codes.
    pub index: u32,
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub id: String,
    pub name: String,
    pub index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotStyle {
    pub id: String,
    pub name: String,
    pub contest_ids: Vec<String>,
}

impl Manifest {
    /// Check that ids and indices are unique, limits are positive, and ballot styles only name
    /// known contests.
    pub fn validate(&self) -> Result<()> {
        let mut contest_ids = HashSet::new();
        let mut contest_indices = HashSet::new();
        for contest in &self.contests {
            if !contest_ids.insert(contest.id.as_str()) {
                return Err(invalid(format!("duplicate contest id {:?}", contest.id)));
            }
            if !contest_indices.insert(contest.index) {
                return Err(invalid(format!("duplicate contest index {}", contest.index)));
            }
            contest.validate()?;
        }

        let mut style_ids = HashSet::new();
        for style in &self.ballot_styles {
            if !style_ids.insert(style.id.as_str()) {
                return Err(invalid(format!("duplicate ballot style id {:?}", style.id)));
            }
            let mut seen = HashSet::new();
            for contest_id in &style.contest_ids {
                if !contest_ids.contains(contest_id.as_str()) {
                    return Err(invalid(format!(
                        "ballot style {:?} names unknown contest {:?}",
                        style.id, contest_id
                    )));
                }
                if !seen.insert(contest_id.as_str()) {
                    return Err(invalid(format!(
                        "ballot style {:?} lists contest {:?} twice",
                        style.id, contest_id
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn contest(&self, id: &str) -> Option<&Contest> {
        self.contests.iter().find(|c| c.id == id)
    }

    pub fn ballot_style(&self, id: &str) -> Option<&BallotStyle> {
        self.ballot_styles.iter().find(|s| s.id == id)
    }

    /// The bytes hashed into the election base hash: the manifest's JSON serialization.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::InvalidManifest(e.to_string()))
    }
}

impl Contest {
    fn validate(&self) -> Result<()> {
        if self.selection_limit == 0 {
            return Err(invalid(format!("contest {:?} has a zero selection limit", self.id)));
        }
        if self.option_selection_limit == 0 {
            return Err(invalid(format!(
                "contest {:?} has a zero option selection limit",
                self.id
            )));
        }

        let mut ids = HashSet::new();
        let mut indices = HashSet::new();
        for choice in &self.choices {
            if !ids.insert(choice.id.as_str()) {
                return Err(invalid(format!(
                    "contest {:?} has duplicate choice id {:?}",
                    self.id, choice.id
                )));
            }
            if !indices.insert(choice.index) {
                return Err(invalid(format!(
                    "contest {:?} has duplicate choice index {}",
                    self.id, choice.index
                )));
            }
        }
        Ok(())
    }

    pub fn choice(&self, id: &str) -> Option<&Choice> {
        self.choices.iter().find(|c| c.id == id)
    }
}

fn invalid(message: String) -> Error {
    Error::InvalidManifest(message)
}
