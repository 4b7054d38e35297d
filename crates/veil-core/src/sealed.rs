//! Sealed transaction amounts
//!
//! Transaction records never carry plaintext monetary values. Amounts travel
//! as ChaCha20-Poly1305 ciphertexts under an [`AmountKey`] issued by the
//! external key service; only the evaluating party opens them, into a
//! zeroizing buffer that feeds its oblivious-transfer choices.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Nonce,
};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{Error, Result};
use crate::hash::{hex_bytes_12, hex_vec};

/// Associated data binding ciphertexts to their purpose
const SEALED_AMOUNT_AAD: &[u8] = b"veil/sealed-amount/v1";

/// Symmetric key for sealing amounts (zeroized on drop)
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AmountKey([u8; 32]);

impl AmountKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    fn cipher(&self) -> Result<ChaCha20Poly1305> {
        ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| Error::Crypto(format!("Failed to create cipher: {}", e)))
    }
}

impl std::fmt::Debug for AmountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AmountKey([REDACTED])")
    }
}

/// Opaque, authenticated ciphertext of a transaction amount (minor units)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedAmount {
    #[serde(with = "hex_bytes_12")]
    nonce: [u8; 12],
    #[serde(with = "hex_vec")]
    ciphertext: Vec<u8>,
}

impl SealedAmount {
    /// Seal `amount` under `key` with a fresh random nonce
    pub fn seal(key: &AmountKey, amount: u64) -> Result<Self> {
        let mut rng = rand::thread_rng();
        Self::seal_with_rng(key, amount, &mut rng)
    }

    pub fn seal_with_rng<R: RngCore + CryptoRng>(
        key: &AmountKey,
        amount: u64,
        rng: &mut R,
    ) -> Result<Self> {
        let mut nonce = [0u8; 12];
        rng.fill_bytes(&mut nonce);

        let plaintext = Zeroizing::new(amount.to_le_bytes());
        let ciphertext = key
            .cipher()?
            .encrypt(
                &Nonce::from(nonce),
                Payload {
                    msg: plaintext.as_slice(),
                    aad: SEALED_AMOUNT_AAD,
                },
            )
            .map_err(|e| Error::Crypto(format!("Encryption failed: {}", e)))?;

        Ok(Self { nonce, ciphertext })
    }

    /// Open the amount. Fails if the key is wrong or the ciphertext was altered.
    pub fn open(&self, key: &AmountKey) -> Result<Zeroizing<u64>> {
        let plaintext = Zeroizing::new(
            key.cipher()?
                .decrypt(
                    &Nonce::from(self.nonce),
                    Payload {
                        msg: self.ciphertext.as_slice(),
                        aad: SEALED_AMOUNT_AAD,
                    },
                )
                .map_err(|_| Error::Crypto("Sealed amount failed authentication".to_string()))?,
        );

        let bytes: [u8; 8] = plaintext
            .as_slice()
            .try_into()
            .map_err(|_| Error::Crypto("Sealed amount has invalid length".to_string()))?;
        Ok(Zeroizing::new(u64::from_le_bytes(bytes)))
    }
}
