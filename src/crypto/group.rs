use num::bigint::RandomBits;
use num::traits::{One, Zero};
use num::BigUint;
use rand::{CryptoRng, Rng};
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Width of the canonical big-endian encoding of a group element.
pub const ELEMENT_BYTES: usize = 512;

/// Width of the canonical big-endian encoding of an exponent.
pub const EXPONENT_BYTES: usize = 32;

/// An element of `Z_p^*`.  Values produced by protocol operations lie in the order-`q` subgroup;
/// that is checked by verification rather than enforced here.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Element {
    #[serde(with = "crate::serialize::big_uint::element")]
    element: BigUint,
}

/// An exponent in `Z_q`, the additive group of integers modulo the subgroup order.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Exponent {
    #[serde(with = "crate::serialize::big_uint::exponent")]
    exponent: BigUint,
}

impl Element {
    /// The multiplicative identity, a member of every subgroup.
    pub fn one() -> Element {
        Element::unchecked(BigUint::one())
    }

    /// Construct an element without reducing modulo `p`.  Only `Group` and deserialization should
    /// produce elements, so that every value is canonical.
    fn unchecked(element: BigUint) -> Element {
        Element { element }
    }

    pub fn as_uint(&self) -> &BigUint {
        &self.element
    }

    /// The canonical `ELEMENT_BYTES`-wide big-endian encoding used in every hash.
    pub fn to_bytes_be(&self) -> Vec<u8> {
        to_fixed_width(&self.element, ELEMENT_BYTES)
    }
}

impl Exponent {
    fn unchecked(exponent: BigUint) -> Exponent {
        Exponent { exponent }
    }

    pub fn zero() -> Exponent {
        Exponent::unchecked(BigUint::zero())
    }

    pub fn is_zero(&self) -> bool {
        self.exponent.is_zero()
    }

    pub fn as_uint(&self) -> &BigUint {
        &self.exponent
    }

    /// The canonical `EXPONENT_BYTES`-wide big-endian encoding used in every hash.
    pub fn to_bytes_be(&self) -> Vec<u8> {
        to_fixed_width(&self.exponent, EXPONENT_BYTES)
    }
}

impl From<u32> for Exponent {
    /// Small integers are always below `q`, which `CryptographicParameters` requires to be wider
    /// than 32 bits.
    fn from(number: u32) -> Self {
        Exponent::unchecked(BigUint::from(number))
    }
}

/// Left-pad the big-endian bytes of `n` with zeros to `width`.
pub(crate) fn to_fixed_width(n: &BigUint, width: usize) -> Vec<u8> {
    let raw = n.to_bytes_be();
    let mut out = vec![0_u8; width.saturating_sub(raw.len())];
    out.extend_from_slice(&raw);
    out
}

/// The order-`q` subgroup of `Z_p^*` generated by `g`, with `p = q r + 1`.
///
/// All arithmetic on `Element`s and `Exponent`s goes through a `Group`, which carries the moduli
/// explicitly instead of reading them from global state.
///
/// A deserialized group passes the same checks as `Group::checked`.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GroupFields")]
pub struct Group {
    #[serde(with = "crate::serialize::big_uint::element")]
    p: BigUint,
    #[serde(with = "crate::serialize::big_uint::exponent")]
    q: BigUint,
    #[serde(with = "crate::serialize::big_uint::element")]
    r: BigUint,
    g: Element,
}

/// The serialized form of a `Group`, before its moduli are checked.
#[derive(Deserialize)]
struct GroupFields {
    #[serde(with = "crate::serialize::big_uint::element")]
    p: BigUint,
    #[serde(with = "crate::serialize::big_uint::exponent")]
    q: BigUint,
    #[serde(with = "crate::serialize::big_uint::element")]
    r: BigUint,
    g: Element,
}

impl TryFrom<GroupFields> for Group {
    type Error = Error;

    fn try_from(fields: GroupFields) -> Result<Group> {
        let group = Group::checked(fields.p, fields.q, fields.g.element)?;
        if group.r != fields.r {
            return Err(Error::InvalidParameters("r is not (p - 1) / q".to_owned()));
        }
        Ok(group)
    }
}

impl Group {
    /// Assemble a group from its moduli without checking them.  Only for the built-in constants.
    pub(crate) fn new(p: BigUint, q: BigUint, g: BigUint) -> Group {
        let r = (&p - BigUint::one()) / &q;
        let g = Element::unchecked(g % &p);
        Group { p, q, r, g }
    }

    /// Assemble a group, checking that `q` is wider than 32 bits and fits an exponent, that `p`
    /// fits an element, that `p = q r + 1` and that `g = 2^r mod p` is not 1.  Primality of `p`
    /// and `q` is the caller's responsibility.
    pub fn checked(p: BigUint, q: BigUint, g: BigUint) -> Result<Group> {
        if q.bits() <= 32 || q.bits() as usize > EXPONENT_BYTES * 8 {
            return Err(Error::InvalidParameters(
                "q must be wider than 32 bits and fit in 256 bits".to_owned(),
            ));
        }
        if p.bits() as usize > ELEMENT_BYTES * 8 {
            return Err(Error::InvalidParameters("p must fit in 4096 bits".to_owned()));
        }
        let p_minus_one = &p - BigUint::one();
        if !(&p_minus_one % &q).is_zero() {
            return Err(Error::InvalidParameters("q does not divide p - 1".to_owned()));
        }
        let r = &p_minus_one / &q;
        if BigUint::from(2_u8).modpow(&r, &p) != g || g.is_one() {
            return Err(Error::InvalidParameters("g is not 2^r mod p".to_owned()));
        }
        Ok(Group::new(p, q, g))
    }

    pub fn p(&self) -> &BigUint {
        &self.p
    }

    pub fn q(&self) -> &BigUint {
        &self.q
    }

    pub fn r(&self) -> &BigUint {
        &self.r
    }

    pub fn generator(&self) -> &Element {
        &self.g
    }

    /// Inject an integer into `Z_p`, wrapping modulo `p`.
    pub fn element(&self, n: BigUint) -> Element {
        Element::unchecked(n % &self.p)
    }

    /// Inject an integer into `Z_q`, wrapping modulo `q`.
    pub fn exponent(&self, n: BigUint) -> Exponent {
        Exponent::unchecked(n % &self.q)
    }

    pub fn exponent_from_bytes(&self, bytes: &[u8]) -> Exponent {
        self.exponent(BigUint::from_bytes_be(bytes))
    }

    // Multiplicative group operations

    pub fn mul_p(&self, a: &Element, b: &Element) -> Element {
        Element::unchecked(&a.element * &b.element % &self.p)
    }

    /// Take the multiplicative inverse of the element.
    pub fn inv_p(&self, a: &Element) -> Element {
        // Fermat: for prime p, a^(p-2) is the inverse of a.
        Element::unchecked(a.element.modpow(&(&self.p - 2_u8), &self.p))
    }

    pub fn div_p(&self, a: &Element, b: &Element) -> Element {
        self.mul_p(a, &self.inv_p(b))
    }

    pub fn pow_p(&self, base: &Element, e: &Exponent) -> Element {
        Element::unchecked(base.element.modpow(&e.exponent, &self.p))
    }

    /// Raise a group element to an arbitrary integer power.
    pub fn pow_uint(&self, base: &Element, e: &BigUint) -> Element {
        Element::unchecked(base.element.modpow(e, &self.p))
    }

    pub fn g_pow(&self, e: &Exponent) -> Element {
        self.pow_p(&self.g, e)
    }

    pub fn product_p<'a>(&self, elements: impl IntoIterator<Item = &'a Element>) -> Element {
        elements
            .into_iter()
            .fold(Element::one(), |acc, e| self.mul_p(&acc, e))
    }

    /// `0 < x < p` and `x^q = 1 mod p`: the element lies in the order-`q` subgroup `Z_p^r`.
    pub fn is_valid_residue(&self, a: &Element) -> bool {
        !a.element.is_zero() && a.element < self.p && a.element.modpow(&self.q, &self.p).is_one()
    }

    // Additive exponent group operations

    pub fn add_q(&self, a: &Exponent, b: &Exponent) -> Exponent {
        Exponent::unchecked((&a.exponent + &b.exponent) % &self.q)
    }

    pub fn sub_q(&self, a: &Exponent, b: &Exponent) -> Exponent {
        // `a + q - b` keeps the intermediate value non-negative.
        Exponent::unchecked((&a.exponent + &self.q - &b.exponent % &self.q) % &self.q)
    }

    pub fn mul_q(&self, a: &Exponent, b: &Exponent) -> Exponent {
        Exponent::unchecked(&a.exponent * &b.exponent % &self.q)
    }

    pub fn neg_q(&self, a: &Exponent) -> Exponent {
        self.sub_q(&Exponent::zero(), a)
    }

    pub fn inv_q(&self, a: &Exponent) -> Exponent {
        Exponent::unchecked(a.exponent.modpow(&(&self.q - 2_u8), &self.q))
    }

    pub fn div_q(&self, a: &Exponent, b: &Exponent) -> Exponent {
        self.mul_q(a, &self.inv_q(b))
    }

    pub fn sum_q<'a>(&self, exponents: impl IntoIterator<Item = &'a Exponent>) -> Exponent {
        exponents
            .into_iter()
            .fold(Exponent::zero(), |acc, e| self.add_q(&acc, e))
    }

    /// `0 <= x < q`.
    pub fn is_in_zq(&self, a: &Exponent) -> bool {
        a.exponent < self.q
    }

    // Sampling

    /// Draw a uniform exponent by rejection sampling: candidates of `q`'s bit length that are not
    /// below `q` are discarded and redrawn.
    pub fn random_exponent<R: Rng + CryptoRng>(&self, rng: &mut R) -> Exponent {
        let bits = self.q.bits();
        loop {
            let x: BigUint = rng.sample(RandomBits::new(bits));
            if x < self.q {
                return Exponent::unchecked(x);
            }
        }
    }

    /// Search `0..=bound` for the `count` with `base^count == target`.  Counts recovered this way
    /// are small, so a linear scan is all that is needed.
    pub fn bounded_log(&self, base: &Element, target: &Element, bound: u64) -> Option<u64> {
        let mut candidate = Element::one();
        for count in 0..=bound {
            if &candidate == target {
                return Some(count);
            }
            candidate = self.mul_p(&candidate, base);
        }
        None
    }
}

/// 32 uniformly random bytes, used for identifiers and nonces that are hashed rather than
/// exponentiated directly.
pub fn random_bytes<R: Rng + CryptoRng>(rng: &mut R) -> [u8; 32] {
    let mut bytes = [0_u8; 32];
    rng.fill(&mut bytes);
    bytes
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parameters::CryptographicParameters;
    use proptest::prelude::*;

    fn group() -> &'static Group {
        CryptographicParameters::test_group().group()
    }

    #[test]
    fn generator_has_order_q() {
        let group = group();
        assert!(group.is_valid_residue(group.generator()));
        assert_ne!(group.generator(), &Element::one());
    }

    #[test]
    fn inverse_is_inverse() {
        let group = group();
        let a = group.g_pow(&12345_u32.into());
        let product = group.mul_p(&a, &group.inv_p(&a));
        assert_eq!(product, Element::one());
        assert_eq!(group.div_p(&a, &a), Element::one());
    }

    #[test]
    fn encodings_are_fixed_width() {
        let group = group();
        assert_eq!(Element::one().to_bytes_be().len(), ELEMENT_BYTES);
        assert_eq!(group.generator().to_bytes_be().len(), ELEMENT_BYTES);
        assert_eq!(Exponent::zero().to_bytes_be().len(), EXPONENT_BYTES);

        let largest = group.exponent(group.q() - 1_u8);
        assert_eq!(largest.to_bytes_be().len(), EXPONENT_BYTES);
        assert_eq!(BigUint::from_bytes_be(&largest.to_bytes_be()), group.q() - 1_u8);
    }

    #[test]
    fn bounded_log_stops_at_bound() {
        let group = group();
        let g = group.generator();
        let target = group.g_pow(&7_u32.into());
        assert_eq!(group.bounded_log(g, &target, 10), Some(7));
        assert_eq!(group.bounded_log(g, &target, 6), None);
        assert_eq!(group.bounded_log(g, &Element::one(), 0), Some(0));
    }

    #[test]
    fn random_exponents_are_below_q() {
        let group = group();
        let mut rng = rand::thread_rng();
        for _ in 0..64 {
            assert!(group.is_in_zq(&group.random_exponent(&mut rng)));
        }
    }

    #[test]
    fn non_residue_is_rejected() {
        let group = group();
        // p - 1 has order 2, which does not divide q.
        let minus_one = group.element(group.p() - 1_u8);
        assert!(!group.is_valid_residue(&minus_one));
        assert!(!group.is_valid_residue(&group.element(BigUint::zero())));
    }

    proptest! {
        #[test]
        fn exponent_arithmetic_is_consistent(a in any::<u64>(), b in any::<u64>()) {
            let group = group();
            let x = group.exponent(BigUint::from(a));
            let y = group.exponent(BigUint::from(b));

            let sum = group.add_q(&x, &y);
            prop_assert_eq!(group.sub_q(&sum, &y), x.clone());
            prop_assert_eq!(group.add_q(&x, &group.neg_q(&x)), Exponent::zero());

            // g^(x+y) == g^x * g^y
            prop_assert_eq!(
                group.g_pow(&sum),
                group.mul_p(&group.g_pow(&x), &group.g_pow(&y))
            );

            if !y.is_zero() {
                let quotient = group.div_q(&x, &y);
                prop_assert_eq!(group.mul_q(&quotient, &y), x);
            }
        }
    }
}
