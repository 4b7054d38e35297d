//! Wire keys
//!
//! Every circuit wire carries two secret keys, one per boolean value. The
//! evaluator only ever holds one of them per wire.

use rand::{CryptoRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop};

use veil_core::WIRE_KEY_LEN;

/// Index of a wire within a circuit
pub type WireId = usize;

/// 128-bit secret bound to one value of one wire (zeroized on drop)
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct WireKey([u8; WIRE_KEY_LEN]);

impl WireKey {
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; WIRE_KEY_LEN];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; WIRE_KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; WIRE_KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for WireKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WireKey([REDACTED])")
    }
}

/// The two keys of a wire: `zero` encodes false, `one` encodes true
#[derive(Debug, Clone)]
pub struct WireKeyPair {
    zero: WireKey,
    one: WireKey,
}

impl WireKeyPair {
    /// Draw two distinct keys
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let zero = WireKey::random(rng);
        let mut one = WireKey::random(rng);
        while veil_core::compare(zero.as_bytes(), one.as_bytes()) {
            one = WireKey::random(rng);
        }
        Self { zero, one }
    }

    /// Key encoding `bit`
    pub fn key(&self, bit: bool) -> &WireKey {
        if bit {
            &self.one
        } else {
            &self.zero
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_pair_keys_distinct() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        for _ in 0..64 {
            let pair = WireKeyPair::random(&mut rng);
            assert_ne!(pair.key(false), pair.key(true));
        }
    }

    #[test]
    fn test_debug_redacted() {
        let key = WireKey::from_bytes([0xaa; WIRE_KEY_LEN]);
        assert_eq!(format!("{:?}", key), "WireKey([REDACTED])");
    }
}
