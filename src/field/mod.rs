//! Prime field arithmetic over a runtime-selected modulus.
//!
//! All values are canonically reduced into `[0, p)`. Multiplication is
//! fixed-width shift-and-add with a conditional reduction per step, so the
//! same code path serves the 31-bit test prime and the 254-bit BN254 scalar
//! field without widening past 256 bits.

pub mod u256;

pub use u256::U256;

use serde::ser::{Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("division by zero: zero has no multiplicative inverse")]
    DivisionByZero,
    #[error("{0} is not prime")]
    NotPrime(U256),
}

/// A validated prime modulus.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Field {
    modulus: U256,
}

/// BN254 scalar field modulus (254 bits).
const BN254_MODULUS: U256 = U256([
    0x43e1f593f0000001,
    0x2833e84879b97091,
    0xb85045b68181585d,
    0x30644e72e131a029,
]);

/// Mersenne prime 2^31 - 1, small enough to eyeball test vectors.
const TEST_MODULUS: U256 = U256([0x7fffffff, 0, 0, 0]);

impl Field {
    /// The BN254 scalar field. Primality is known, not re-checked.
    pub fn bn254() -> Field {
        Field {
            modulus: BN254_MODULUS,
        }
    }

    /// The field of order 2^31 - 1, for tests and examples.
    pub fn test_prime() -> Field {
        Field {
            modulus: TEST_MODULUS,
        }
    }

    /// A field with a caller-supplied modulus. Rejects non-primes eagerly
    /// so later arithmetic can assume inverses exist.
    pub fn new(modulus: U256) -> Result<Field, FieldError> {
        if !is_prime(modulus) {
            return Err(FieldError::NotPrime(modulus));
        }
        Ok(Field { modulus })
    }

    pub fn modulus(&self) -> U256 {
        self.modulus
    }

    pub fn zero(&self) -> FieldElement {
        self.element(0)
    }

    pub fn one(&self) -> FieldElement {
        self.element(1)
    }

    /// A canonically reduced element from a u64.
    pub fn element(&self, v: u64) -> FieldElement {
        self.from_u256(U256::from_u64(v))
    }

    /// A canonically reduced element from a full-width value.
    pub fn from_u256(&self, v: U256) -> FieldElement {
        FieldElement {
            value: v.rem(self.modulus),
            modulus: self.modulus,
        }
    }
}

impl Serialize for Field {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.modulus)
    }
}

/// An element of a prime field, value and modulus carried together.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct FieldElement {
    value: U256,
    modulus: U256,
}

impl FieldElement {
    pub fn value(&self) -> U256 {
        self.value
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    pub fn add(self, rhs: FieldElement) -> FieldElement {
        debug_assert_eq!(self.modulus, rhs.modulus);
        FieldElement {
            value: add_mod(self.value, rhs.value, self.modulus),
            modulus: self.modulus,
        }
    }

    pub fn sub(self, rhs: FieldElement) -> FieldElement {
        debug_assert_eq!(self.modulus, rhs.modulus);
        FieldElement {
            value: sub_mod(self.value, rhs.value, self.modulus),
            modulus: self.modulus,
        }
    }

    pub fn mul(self, rhs: FieldElement) -> FieldElement {
        debug_assert_eq!(self.modulus, rhs.modulus);
        FieldElement {
            value: mul_mod(self.value, rhs.value, self.modulus),
            modulus: self.modulus,
        }
    }

    pub fn neg(self) -> FieldElement {
        FieldElement {
            value: sub_mod(U256::ZERO, self.value, self.modulus),
            modulus: self.modulus,
        }
    }

    /// Square-and-multiply exponentiation with a full-width exponent.
    pub fn pow(self, exp: U256) -> FieldElement {
        FieldElement {
            value: pow_mod(self.value, exp, self.modulus),
            modulus: self.modulus,
        }
    }

    /// Multiplicative inverse via Fermat: `a^(p-2)`.
    pub fn inv(self) -> Result<FieldElement, FieldError> {
        if self.is_zero() {
            return Err(FieldError::DivisionByZero);
        }
        let exp = self.modulus.wrapping_sub(U256::from_u64(2));
        Ok(self.pow(exp))
    }
}

impl std::fmt::Display for FieldElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl std::fmt::Debug for FieldElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FieldElement({} mod {})", self.value, self.modulus)
    }
}

impl Serialize for FieldElement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.value)
    }
}

fn add_mod(a: U256, b: U256, p: U256) -> U256 {
    let (sum, carry) = a.overflowing_add(b);
    // a, b < p, so a + b < 2p and one subtraction restores the range
    if carry || sum >= p {
        sum.wrapping_sub(p)
    } else {
        sum
    }
}

fn sub_mod(a: U256, b: U256, p: U256) -> U256 {
    let (diff, borrow) = a.borrowing_sub(b);
    if borrow {
        let (wrapped, _) = diff.overflowing_add(p);
        wrapped
    } else {
        diff
    }
}

/// Shift-and-add multiplication: one doubling and one conditional addition
/// per multiplier bit, each followed by a reduction. Never widens past 256
/// bits.
fn mul_mod(a: U256, b: U256, p: U256) -> U256 {
    let mut acc = U256::ZERO;
    for i in (0..b.bits()).rev() {
        acc = add_mod(acc, acc, p);
        if b.bit(i) {
            acc = add_mod(acc, a, p);
        }
    }
    acc
}

fn pow_mod(base: U256, exp: U256, p: U256) -> U256 {
    let mut acc = U256::ONE.rem(p);
    for i in (0..exp.bits()).rev() {
        acc = mul_mod(acc, acc, p);
        if exp.bit(i) {
            acc = mul_mod(acc, base, p);
        }
    }
    acc
}

/// Miller-Rabin witnesses. Deterministic for every modulus below 2^64;
/// a strong probabilistic check for larger caller-supplied moduli.
const MILLER_RABIN_BASES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

fn is_prime(n: U256) -> bool {
    if n < U256::from_u64(2) {
        return false;
    }
    for &b in &MILLER_RABIN_BASES {
        let b = U256::from_u64(b);
        if n == b {
            return true;
        }
        if n.rem(b).is_zero() {
            return false;
        }
    }

    // n - 1 = d * 2^s with d odd
    let n_minus_1 = n.wrapping_sub(U256::ONE);
    let mut d = n_minus_1;
    let mut s = 0u32;
    while d.is_even() {
        d = d.shr1();
        s += 1;
    }

    'witness: for &b in &MILLER_RABIN_BASES {
        let mut x = pow_mod(U256::from_u64(b), d, n);
        if x == U256::ONE || x == n_minus_1 {
            continue;
        }
        for _ in 1..s {
            x = mul_mod(x, x, n);
            if x == n_minus_1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_101() -> Field {
        Field::new(U256::from_u64(101)).unwrap()
    }

    fn test_field_laws(field: Field) {
        let zero = field.zero();
        let one = field.one();
        let a = field.element(42);
        let b = field.element(1337);

        assert_eq!(a.add(zero), a);
        assert_eq!(zero.add(a), a);

        assert_eq!(a.mul(one), a);
        assert_eq!(one.mul(a), a);
        assert_eq!(a.mul(zero), zero);

        assert_eq!(a.add(b), b.add(a));
        assert_eq!(a.mul(b), b.mul(a));

        assert_eq!(a.add(a.neg()), zero);
        assert_eq!(zero.neg(), zero);

        assert_eq!(a.sub(b), a.add(b.neg()));

        let inv_a = a.inv().unwrap();
        assert_eq!(a.mul(inv_a), one);
        assert_eq!(zero.inv(), Err(FieldError::DivisionByZero));

        assert_eq!(a.pow(U256::ZERO), one);
        assert_eq!(a.pow(U256::ONE), a);
        assert_eq!(a.pow(U256::from_u64(3)), a.mul(a).mul(a));

        let neg_one = one.neg();
        assert_eq!(neg_one.mul(neg_one), one);
    }

    #[test]
    fn field_laws_mod_101() {
        test_field_laws(field_101());
    }

    #[test]
    fn field_laws_test_prime() {
        test_field_laws(Field::test_prime());
    }

    #[test]
    fn field_laws_bn254() {
        test_field_laws(Field::bn254());
    }

    #[test]
    fn test_five_times_twenty_is_hundred_mod_101() {
        let field = field_101();
        let product = field.element(5).mul(field.element(20));
        assert_eq!(product, field.element(100));
        // one more and it wraps
        assert_eq!(product.add(field.one()), field.zero());
    }

    #[test]
    fn test_element_reduces_input() {
        let field = field_101();
        assert_eq!(field.element(101), field.zero());
        assert_eq!(field.element(102), field.one());
        assert_eq!(field.element(205), field.element(3));
    }

    #[test]
    fn test_inverse_mod_101() {
        let field = field_101();
        // 2 * 51 = 102 = 1 (mod 101)
        assert_eq!(field.element(2).inv().unwrap(), field.element(51));
    }

    #[test]
    fn test_new_rejects_composites() {
        assert!(matches!(
            Field::new(U256::from_u64(100)),
            Err(FieldError::NotPrime(_))
        ));
        assert!(matches!(
            Field::new(U256::from_u64(1)),
            Err(FieldError::NotPrime(_))
        ));
        assert!(matches!(
            Field::new(U256::ZERO),
            Err(FieldError::NotPrime(_))
        ));
        // 2^31 + 1 = 3 * 715827883
        assert!(matches!(
            Field::new(U256::from_u64(2147483649)),
            Err(FieldError::NotPrime(_))
        ));
    }

    #[test]
    fn test_new_accepts_primes() {
        for p in [2u64, 3, 5, 101, 2147483647] {
            assert!(Field::new(U256::from_u64(p)).is_ok(), "{} is prime", p);
        }
        assert!(Field::new(Field::bn254().modulus()).is_ok());
    }

    #[test]
    fn test_is_prime_strong_pseudoprimes() {
        // Carmichael numbers fool the Fermat test but not Miller-Rabin
        for n in [561u64, 1105, 1729, 2465, 2821, 6601] {
            assert!(!is_prime(U256::from_u64(n)), "{} is composite", n);
        }
    }

    #[test]
    fn test_bn254_modulus_value() {
        assert_eq!(
            Field::bn254().modulus().to_string(),
            "21888242871839275222246405745257275088548364400416034343698204186575808495617"
        );
    }

    #[test]
    fn test_bn254_wide_multiplication() {
        // (p - 1)^2 = 1 since p - 1 = -1
        let field = Field::bn254();
        let p_minus_1 = field.zero().sub(field.one());
        assert_eq!(p_minus_1.mul(p_minus_1), field.one());
        // and its inverse is itself
        assert_eq!(p_minus_1.inv().unwrap(), p_minus_1);
    }

    #[test]
    fn test_mismatched_prime_boundary() {
        let field = Field::test_prime();
        let p_minus_1 = field.element(2147483646);
        assert_eq!(p_minus_1.add(field.one()), field.zero());
        assert_eq!(field.zero().sub(field.one()), p_minus_1);
    }
}
