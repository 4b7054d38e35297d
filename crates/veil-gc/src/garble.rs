//! Garbling
//!
//! Each gate is garbled into four authenticated rows, one per input
//! combination, in random order. A row is the ChaCha20-Poly1305 encryption of
//! the output-wire key under a key derived from the two input-wire keys; the
//! associated data binds the row to the gate's position and topology. Holding
//! one key per input wire, the evaluator can open exactly one row.
//!
//! The garbler also publishes a SHA-256 commitment over the whole garbled
//! circuit, delivered to the evaluator out of band from the material itself.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Nonce,
};
use rand::{seq::SliceRandom, CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use tracing::debug;
use zeroize::Zeroizing;

use veil_core::hash::hex_bytes_32;
use veil_core::Digest;

use crate::circuit::{Circuit, Gate, ONE_WIRE, ZERO_WIRE};
use crate::deadline::Deadline;
use crate::error::{ProtocolError, Result};
use crate::wire::{WireId, WireKey, WireKeyPair};

const ROW_KEY_DOMAIN: &[u8] = b"veil-gc/row/v1";
const OUTPUT_TAG_DOMAIN: &[u8] = b"veil-gc/out/v1";
const COMMITMENT_DOMAIN: &[u8] = b"veil-gc/commit/v1";

/// A gate with its four encrypted rows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GarbledGate {
    pub gate: Gate,
    #[serde(with = "hex_rows")]
    pub rows: Vec<Vec<u8>>,
}

/// Hashes that let the evaluator decode one output wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputDecoding {
    pub wire: WireId,
    #[serde(with = "hex_bytes_32")]
    pub zero_tag: [u8; 32],
    #[serde(with = "hex_bytes_32")]
    pub one_tag: [u8; 32],
}

/// Garbled material sent from garbler to evaluator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GarbledCircuit {
    pub name: String,
    pub wire_count: usize,
    pub garbler_inputs: Vec<WireId>,
    pub evaluator_inputs: Vec<WireId>,
    pub gates: Vec<GarbledGate>,
    pub decoding: Vec<OutputDecoding>,
}

impl GarbledCircuit {
    /// Commitment digest over every field of the material
    pub fn digest(&self) -> Digest {
        let mut hasher = Sha256::new();
        hasher.update(COMMITMENT_DOMAIN);
        hasher.update((self.name.len() as u64).to_le_bytes());
        hasher.update(self.name.as_bytes());
        hasher.update((self.wire_count as u64).to_le_bytes());

        for inputs in [&self.garbler_inputs, &self.evaluator_inputs] {
            hasher.update((inputs.len() as u64).to_le_bytes());
            for &w in inputs {
                hasher.update((w as u64).to_le_bytes());
            }
        }

        hasher.update((self.gates.len() as u64).to_le_bytes());
        for garbled in &self.gates {
            hasher.update(gate_header(&garbled.gate));
            hasher.update((garbled.rows.len() as u64).to_le_bytes());
            for row in &garbled.rows {
                hasher.update((row.len() as u64).to_le_bytes());
                hasher.update(row);
            }
        }

        hasher.update((self.decoding.len() as u64).to_le_bytes());
        for d in &self.decoding {
            hasher.update((d.wire as u64).to_le_bytes());
            hasher.update(d.zero_tag);
            hasher.update(d.one_tag);
        }

        Digest::new(hasher.finalize().into())
    }
}

/// Result of garbling: the material, its commitment and the garbler's secrets
pub struct GarbledOutput {
    pub circuit: GarbledCircuit,
    pub commitment: Digest,
    pub session: GarblerSession,
}

/// Secrets the garbler keeps for the rest of one run
pub struct GarblerSession {
    evaluator_offers: Vec<WireKeyPair>,
    garbler_keys: Vec<(WireId, WireKey)>,
}

impl GarblerSession {
    /// Key pairs for the evaluator's input wires, in input order, to be
    /// delivered through oblivious transfer
    pub fn evaluator_offers(&self) -> &[WireKeyPair] {
        &self.evaluator_offers
    }

    /// Active keys for the constant wires and the garbler's own inputs.
    /// Sent to the evaluator in the clear; they reveal nothing about the bits.
    pub fn garbler_keys(&self) -> &[(WireId, WireKey)] {
        &self.garbler_keys
    }
}

impl std::fmt::Debug for GarblerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GarblerSession")
            .field("evaluator_offers", &self.evaluator_offers.len())
            .field("garbler_keys", &self.garbler_keys.len())
            .finish()
    }
}

/// Garbles circuits with keys drawn from `rng`
pub struct Garbler<R> {
    rng: R,
}

impl<R: RngCore + CryptoRng> Garbler<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Garble `circuit` with fresh wire keys and bind the garbler's input bits.
    pub fn garble(
        &mut self,
        circuit: &Circuit,
        garbler_bits: &[bool],
        deadline: &Deadline,
    ) -> Result<GarbledOutput> {
        if garbler_bits.len() != circuit.garbler_inputs().len() {
            return Err(ProtocolError::InvalidCircuit(format!(
                "expected {} garbler input bits, got {}",
                circuit.garbler_inputs().len(),
                garbler_bits.len()
            )));
        }

        let pairs: Vec<WireKeyPair> = (0..circuit.wire_count())
            .map(|_| WireKeyPair::random(&mut self.rng))
            .collect();

        let mut gates = Vec::with_capacity(circuit.gates().len());
        for (index, gate) in circuit.gates().iter().enumerate() {
            deadline.check()?;

            let mut rows = Vec::with_capacity(4);
            for a in [false, true] {
                for b in [false, true] {
                    let output = pairs[gate.output].key(gate.kind.apply(a, b));
                    let cipher = row_cipher(
                        index,
                        pairs[gate.left].key(a),
                        pairs[gate.right].key(b),
                    )?;
                    let row = cipher
                        .encrypt(
                            &row_nonce(index),
                            Payload {
                                msg: output.as_bytes(),
                                aad: &gate_header(gate),
                            },
                        )
                        .map_err(|e| {
                            ProtocolError::Core(veil_core::Error::Crypto(format!(
                                "Row encryption failed: {}",
                                e
                            )))
                        })?;
                    rows.push(row);
                }
            }
            rows.shuffle(&mut self.rng);

            gates.push(GarbledGate { gate: *gate, rows });
        }

        let decoding = circuit
            .outputs()
            .iter()
            .map(|&wire| OutputDecoding {
                wire,
                zero_tag: output_tag(wire, pairs[wire].key(false)),
                one_tag: output_tag(wire, pairs[wire].key(true)),
            })
            .collect();

        let mut garbler_keys = Vec::with_capacity(2 + garbler_bits.len());
        garbler_keys.push((ZERO_WIRE, pairs[ZERO_WIRE].key(false).clone()));
        garbler_keys.push((ONE_WIRE, pairs[ONE_WIRE].key(true).clone()));
        for (&wire, &bit) in circuit.garbler_inputs().iter().zip(garbler_bits) {
            garbler_keys.push((wire, pairs[wire].key(bit).clone()));
        }

        let evaluator_offers = circuit
            .evaluator_inputs()
            .iter()
            .map(|&wire| pairs[wire].clone())
            .collect();

        let garbled = GarbledCircuit {
            name: circuit.name().to_string(),
            wire_count: circuit.wire_count(),
            garbler_inputs: circuit.garbler_inputs().to_vec(),
            evaluator_inputs: circuit.evaluator_inputs().to_vec(),
            gates,
            decoding,
        };
        let commitment = garbled.digest();

        debug!(
            "Garbled circuit {} ({} gates, commitment {})",
            garbled.name,
            garbled.gates.len(),
            commitment.truncated_hex(12)
        );

        Ok(GarbledOutput {
            circuit: garbled,
            commitment,
            session: GarblerSession {
                evaluator_offers,
                garbler_keys,
            },
        })
    }
}

/// AEAD keyed by the two input-wire keys of gate `index`
pub(crate) fn row_cipher(
    index: usize,
    left: &WireKey,
    right: &WireKey,
) -> Result<ChaCha20Poly1305> {
    let key = Zeroizing::new(veil_core::sha256_multi(&[
        ROW_KEY_DOMAIN,
        &(index as u64).to_le_bytes(),
        left.as_bytes(),
        right.as_bytes(),
    ]));
    ChaCha20Poly1305::new_from_slice(key.as_slice()).map_err(|e| {
        ProtocolError::Core(veil_core::Error::Crypto(format!(
            "Failed to create row cipher: {}",
            e
        )))
    })
}

/// Row keys are unique per gate and run, so the gate index is a safe nonce
pub(crate) fn row_nonce(index: usize) -> Nonce {
    let mut nonce = [0u8; 12];
    nonce[..8].copy_from_slice(&(index as u64).to_le_bytes());
    Nonce::from(nonce)
}

/// Associated data for a gate's rows
pub(crate) fn gate_header(gate: &Gate) -> [u8; 25] {
    let mut header = [0u8; 25];
    header[0] = gate.kind.tag();
    header[1..9].copy_from_slice(&(gate.left as u64).to_le_bytes());
    header[9..17].copy_from_slice(&(gate.right as u64).to_le_bytes());
    header[17..25].copy_from_slice(&(gate.output as u64).to_le_bytes());
    header
}

/// Public tag identifying which value an output-wire key encodes
pub(crate) fn output_tag(wire: WireId, key: &WireKey) -> [u8; 32] {
    veil_core::sha256_multi(&[
        OUTPUT_TAG_DOMAIN,
        &(wire as u64).to_le_bytes(),
        key.as_bytes(),
    ])
}

/// Serde helper for garbled rows as a list of hex strings
mod hex_rows {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(rows: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(rows.iter().map(hex::encode))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let rows = Vec::<String>::deserialize(deserializer)?;
        rows.iter()
            .map(|s| hex::decode(s).map_err(serde::de::Error::custom))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn garble(circuit: &Circuit, bits: &[bool], seed: u64) -> GarbledOutput {
        Garbler::new(ChaCha20Rng::seed_from_u64(seed))
            .garble(circuit, bits, &Deadline::unbounded())
            .unwrap()
    }

    #[test]
    fn test_four_rows_per_gate() {
        let circuit = Circuit::greater_than(8).unwrap();
        let out = garble(&circuit, &[false; 8], 1);
        assert_eq!(out.circuit.gates.len(), circuit.gates().len());
        for g in &out.circuit.gates {
            assert_eq!(g.rows.len(), 4);
        }
    }

    #[test]
    fn test_commitment_matches_digest() {
        let circuit = Circuit::greater_than(4).unwrap();
        let out = garble(&circuit, &[true, false, true, false], 2);
        assert_eq!(out.circuit.digest(), out.commitment);
    }

    #[test]
    fn test_fresh_keys_per_run() {
        let circuit = Circuit::greater_than(4).unwrap();
        let a = garble(&circuit, &[false; 4], 3);
        let b = garble(&circuit, &[false; 4], 4);
        assert_ne!(a.commitment, b.commitment);
        assert_ne!(a.session.garbler_keys()[0].1, b.session.garbler_keys()[0].1);
    }

    #[test]
    fn test_session_shape() {
        let circuit = Circuit::membership(16, 3).unwrap();
        let out = garble(&circuit, &[true; 48], 5);
        assert_eq!(out.session.evaluator_offers().len(), 16);
        // two constants plus every garbler input
        assert_eq!(out.session.garbler_keys().len(), 2 + 48);
    }

    #[test]
    fn test_wrong_garbler_input_length() {
        let circuit = Circuit::greater_than(8).unwrap();
        let result = Garbler::new(ChaCha20Rng::seed_from_u64(6)).garble(
            &circuit,
            &[true; 7],
            &Deadline::unbounded(),
        );
        assert!(matches!(result, Err(ProtocolError::InvalidCircuit(_))));
    }

    #[test]
    fn test_serde_roundtrip_preserves_digest() {
        let circuit = Circuit::greater_than(4).unwrap();
        let out = garble(&circuit, &[true; 4], 7);
        let json = serde_json::to_string(&out.circuit).unwrap();
        let back: GarbledCircuit = serde_json::from_str(&json).unwrap();
        assert_eq!(back.digest(), out.commitment);
    }

    #[test]
    fn test_session_debug_hides_keys() {
        let circuit = Circuit::greater_than(4).unwrap();
        let out = garble(&circuit, &[true; 4], 8);
        let rendered = format!("{:?}", out.session);
        assert!(rendered.contains("GarblerSession"));
        assert!(!rendered.contains("WireKey"));
    }
}
