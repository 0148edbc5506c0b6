// Many variables have names that mimic the names in the ElectionGuard design, like `K` for the
// vote encryption key or `H_I` for the selection identifier hash.  These names don't fit Rust's
// normal style guidelines.
#![allow(non_snake_case)]

pub mod ballot;
pub mod crypto;
pub mod errors;
pub mod key_ceremony;
pub mod manifest;
pub mod parameters;
pub mod record;
pub mod serialize;
pub mod tally;
pub mod verify;

#[cfg(test)]
mod test_election;
