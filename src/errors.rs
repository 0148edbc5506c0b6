use thiserror::Error;

use crate::crypto::hash::HashError;
use crate::key_ceremony::GuardianState;

pub type Result<T> = std::result::Result<T, Error>;

/// A plaintext ballot that does not conform to the manifest.  The ballot is rejected before any
/// cryptography happens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("ballot rejected{}: {reason}", location(.contest_id, .choice_id))]
pub struct ValidationError {
    pub contest_id: Option<String>,
    pub choice_id: Option<String>,
    pub reason: String,
}

fn location(contest_id: &Option<String>, choice_id: &Option<String>) -> String {
    match (contest_id, choice_id) {
        (Some(contest), Some(choice)) => format!(" at contest {contest:?}, choice {choice:?}"),
        (Some(contest), None) => format!(" at contest {contest:?}"),
        _ => String::new(),
    }
}

impl ValidationError {
    pub fn ballot(reason: impl Into<String>) -> ValidationError {
        ValidationError {
            contest_id: None,
            choice_id: None,
            reason: reason.into(),
        }
    }

    pub fn contest(contest_id: &str, reason: impl Into<String>) -> ValidationError {
        ValidationError {
            contest_id: Some(contest_id.to_owned()),
            choice_id: None,
            reason: reason.into(),
        }
    }

    pub fn choice(contest_id: &str, choice_id: &str, reason: impl Into<String>) -> ValidationError {
        ValidationError {
            contest_id: Some(contest_id.to_owned()),
            choice_id: Some(choice_id.to_owned()),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Hash(#[from] HashError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("guardian {guardian} is {actual:?}, expected {expected:?}")]
    InvalidState {
        guardian: u32,
        expected: GuardianState,
        actual: GuardianState,
    },

    #[error("guardian index {index} is outside 1..={n}")]
    InvalidGuardianIndex { index: u32, n: u32 },

    #[error("public keys of guardian {guardian} failed check {subsection}")]
    InvalidGuardianKeys {
        guardian: u32,
        subsection: &'static str,
    },

    #[error("no share received from guardian {source_index}")]
    MissingShare { source_index: u32 },

    #[error("share from guardian {source_index} failed to decrypt")]
    ShareDecryptionFailed { source_index: u32 },

    #[error("share from guardian {source_index} does not match its public commitments")]
    ShareVerificationFailed { source_index: u32 },

    #[error("guardian record does not match the public keys exchanged for guardian {guardian}")]
    GuardianRecordMismatch { guardian: u32 },

    #[error("value {value} is outside the provable range 0..={limit}")]
    ValueOutOfRange { value: u32, limit: u32 },

    #[error("{available} partial decryptions available, threshold is {threshold}")]
    InsufficientGuardians { available: usize, threshold: u32 },

    #[error("tally for contest {contest_id:?}, choice {choice_id:?} did not decrypt")]
    TallyDecryptionFailed {
        contest_id: String,
        choice_id: String,
    },

    #[error("unknown contest {0:?}")]
    UnknownContest(String),

    #[error("unknown choice {choice_id:?} in contest {contest_id:?}")]
    UnknownChoice {
        contest_id: String,
        choice_id: String,
    },

    #[error("verification {subsection} failed: {message}")]
    VerificationFailed {
        subsection: &'static str,
        message: String,
    },
}

impl Error {
    pub(crate) fn verification(subsection: &'static str, message: impl Into<String>) -> Error {
        Error::VerificationFailed {
            subsection,
            message: message.into(),
        }
    }

    /// The numbered verification step that failed, if this is a verification failure.
    pub fn subsection(&self) -> Option<&'static str> {
        match self {
            Error::VerificationFailed { subsection, .. } => Some(*subsection),
            _ => None,
        }
    }
}
