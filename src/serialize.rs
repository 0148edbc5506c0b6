//! Serde adapters for the wire formats: group values and hashes travel as fixed-width uppercase
//! hexadecimal strings.

pub mod big_uint;
pub mod hash;
