use crate::ballot::encrypted::EncryptedContest;
use crate::crypto::hash::{hash, HashInput, HashValue};
use crate::errors::Result;
use crate::manifest::ChainingMode;

/// `H(H_I; 0x28, contest index, every selection's alpha and beta, every present metadata
/// counter's alpha and beta, [c0, c1, challenge, response of the contest data])`.
pub fn contest_hash(
    selection_identifier_hash: &HashValue,
    contest_index: u32,
    contest: &EncryptedContest,
) -> Result<HashValue> {
    let mut parts: Vec<&dyn HashInput> = vec![&0x28_u8, &contest_index];
    for selection in &contest.choices {
        parts.push(&selection.value.ciphertext.alpha);
        parts.push(&selection.value.ciphertext.beta);
    }
    for counter in contest.metadata().into_iter().filter_map(|(_, c)| c) {
        parts.push(&counter.ciphertext.alpha);
        parts.push(&counter.ciphertext.beta);
    }
    if let Some(data) = &contest.contest_data {
        parts.push(&data.c0);
        parts.push(&data.c1);
        parts.push(&data.challenge);
        parts.push(&data.response);
    }
    Ok(hash(selection_identifier_hash.as_ref(), &parts)?)
}

/// The field that links a confirmation code to the device, and in `Simple` mode to the previous
/// ballot cast on it: the 4-byte chaining mode identifier followed by the previous confirmation
/// code, or by the device hash for the first ballot and whenever chaining is off.
pub fn chaining_field(
    mode: ChainingMode,
    device_hash: &HashValue,
    previous: Option<&HashValue>,
) -> Vec<u8> {
    let link = match (mode, previous) {
        (ChainingMode::Simple, Some(previous)) => previous,
        _ => device_hash,
    };
    let mut field = mode.identifier().to_be_bytes().to_vec();
    field.extend_from_slice(link.as_ref());
    field
}

/// `H(H_I; 0x29, contest hashes, chaining field)`.
pub fn confirmation_code<'a>(
    selection_identifier_hash: &HashValue,
    contest_hashes: impl IntoIterator<Item = &'a HashValue>,
    chaining_field: &[u8],
) -> Result<HashValue> {
    let mut parts: Vec<&dyn HashInput> = vec![&0x29_u8];
    parts.extend(contest_hashes.into_iter().map(|h| h as &dyn HashInput));
    parts.push(&chaining_field);
    Ok(hash(selection_identifier_hash.as_ref(), &parts)?)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn chaining_field_layout() {
        let device = HashValue::from_bytes([0xDD; 32]);
        let previous = HashValue::from_bytes([0xAA; 32]);

        let first = chaining_field(ChainingMode::Simple, &device, None);
        assert_eq!(&first[..4], &[0, 0, 0, 1]);
        assert_eq!(&first[4..], device.as_bytes());

        let chained = chaining_field(ChainingMode::Simple, &device, Some(&previous));
        assert_eq!(&chained[4..], previous.as_bytes());

        let unchained = chaining_field(ChainingMode::None, &device, Some(&previous));
        assert_eq!(&unchained[..4], &[0, 0, 0, 0]);
        assert_eq!(&unchained[4..], device.as_bytes());
    }

    #[test]
    fn confirmation_code_depends_on_chain() {
        let h_i = HashValue::from_bytes([1; 32]);
        let contest = HashValue::from_bytes([2; 32]);
        let device = HashValue::from_bytes([3; 32]);
        let a = confirmation_code(
            &h_i,
            [&contest],
            &chaining_field(ChainingMode::Simple, &device, None),
        )
        .unwrap();
        let b = confirmation_code(
            &h_i,
            [&contest],
            &chaining_field(ChainingMode::Simple, &device, Some(&a)),
        )
        .unwrap();
        assert_ne!(a, b);
    }
}
