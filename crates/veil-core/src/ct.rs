//! Constant-time comparison, selection and modular inversion
//!
//! Every comparison that touches secret material in Veil (blind indexes,
//! wire keys, output-decoding hashes, garbled-material digests) goes through
//! this module.
//!
//! # Length side channel
//!
//! [`compare`] returns `false` immediately for inputs of unequal length, so the
//! *length* of the inputs remains observable. Callers compare fixed-width
//! values (32-byte hashes, 16-byte wire keys) where the length is public.

use std::hint::black_box;

use subtle::{Choice, ConditionallySelectable, ConstantTimeEq};

use crate::error::{Error, Result};

/// Result of a comparison together with the number of byte operations it ran.
///
/// The operation count depends only on the input length, never on the
/// position of the first differing byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompareTrace {
    pub equal: bool,
    pub byte_ops: usize,
}

/// Returns true iff `a == b`, in time independent of where a mismatch occurs.
pub fn compare(a: &[u8], b: &[u8]) -> bool {
    compare_traced(a, b).equal
}

/// [`compare`] with its operation count exposed.
pub fn compare_traced(a: &[u8], b: &[u8]) -> CompareTrace {
    if a.len() != b.len() {
        return CompareTrace {
            equal: false,
            byte_ops: 0,
        };
    }

    let mut acc = 0u8;
    let mut byte_ops = 0usize;
    for (x, y) in a.iter().zip(b.iter()) {
        acc |= black_box(x ^ y);
        byte_ops += 1;
    }

    CompareTrace {
        equal: bool::from(acc.ct_eq(&0u8)),
        byte_ops,
    }
}

/// Branch-free conditional selection: `on_true` if `condition`, else `on_false`.
pub fn select(condition: bool, on_true: i64, on_false: i64) -> i64 {
    let choice = Choice::from(u8::from(condition));
    i64::conditional_select(&on_false, &on_true, choice)
}

/// Mask-based select for the 128-bit intermediates of [`mod_inverse`].
fn select_i128(choice: Choice, on_true: i128, on_false: i128) -> i128 {
    let mask = -i128::from(choice.unwrap_u8());
    (on_true & mask) | (on_false & !mask)
}

/// `Choice(1)` iff `x != 0`, without a data-dependent branch.
fn is_nonzero_i128(x: i128) -> Choice {
    let bits = x as u128;
    Choice::from(((bits | bits.wrapping_neg()) >> 127) as u8)
}

/// Number of extended-Euclid rounds [`mod_inverse`] runs for `modulus`.
///
/// Depends only on the bit length of the modulus.
pub fn inverse_rounds(modulus: u64) -> usize {
    let bits = (u64::BITS - modulus.leading_zeros()) as usize;
    2 * bits + 2
}

/// Modular inverse of `a` modulo `modulus` via the extended Euclidean algorithm.
///
/// The loop always runs [`inverse_rounds`] iterations; once the remainder hits
/// zero the remaining rounds become no-ops selected with masks.
///
/// # Errors
/// [`Error::InvalidModulus`] if `modulus <= 1`, [`Error::NoInverse`] if
/// `gcd(a, modulus) != 1`.
pub fn mod_inverse(a: u64, modulus: u64) -> Result<u64> {
    if modulus <= 1 {
        return Err(Error::InvalidModulus(modulus));
    }

    let m = i128::from(modulus);
    let (mut old_r, mut r) = (i128::from(a % modulus), m);
    let (mut old_s, mut s) = (1i128, 0i128);

    for _ in 0..inverse_rounds(modulus) {
        let active = is_nonzero_i128(r);
        let divisor = select_i128(active, r, 1);
        let q = select_i128(active, old_r / divisor, 0);

        let next_r = old_r - q * r;
        let next_s = old_s - q * s;

        old_r = select_i128(active, r, old_r);
        r = select_i128(active, next_r, r);
        old_s = select_i128(active, s, old_s);
        s = select_i128(active, next_s, s);
    }

    if old_r != 1 {
        return Err(Error::NoInverse);
    }

    Ok((((old_s % m) + m) % m) as u64)
}
