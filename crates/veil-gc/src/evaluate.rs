//! Evaluation
//!
//! The evaluator checks the material against the garbler's commitment,
//! then walks the gates in order, opening exactly one row per gate. Any
//! deviation (a digest mismatch, a row that fails to open, two rows that
//! open, a topology error, an output key matching neither tag) aborts the
//! run with [`ProtocolError::Integrity`]. No partial result is returned.

use chacha20poly1305::aead::{Aead, Payload};
use tracing::debug;

use veil_core::Digest;

use crate::circuit::{ONE_WIRE, ZERO_WIRE};
use crate::deadline::Deadline;
use crate::error::{ProtocolError, Result};
use crate::garble::{gate_header, output_tag, row_cipher, row_nonce, GarbledCircuit};
use crate::wire::{WireId, WireKey};

/// Evaluating party of one run
#[derive(Debug, Clone)]
pub struct Evaluator {
    commitment: Digest,
}

impl Evaluator {
    /// `commitment` is the digest the garbler announced for this run
    pub fn new(commitment: Digest) -> Self {
        Self { commitment }
    }

    /// Evaluate `circuit`, consuming it.
    ///
    /// `garbler_keys` holds the active keys of the constant wires and the
    /// garbler's inputs; `evaluator_keys` the keys obtained by oblivious
    /// transfer, in evaluator-input order.
    pub fn evaluate(
        &self,
        circuit: GarbledCircuit,
        garbler_keys: &[(WireId, WireKey)],
        evaluator_keys: &[WireKey],
        deadline: &Deadline,
    ) -> Result<Vec<bool>> {
        let digest = circuit.digest();
        if !veil_core::compare(digest.as_bytes(), self.commitment.as_bytes()) {
            return Err(integrity("garbled material does not match commitment"));
        }

        if evaluator_keys.len() != circuit.evaluator_inputs.len() {
            return Err(integrity(&format!(
                "expected {} evaluator keys, got {}",
                circuit.evaluator_inputs.len(),
                evaluator_keys.len()
            )));
        }

        let mut active: Vec<Option<WireKey>> = vec![None; circuit.wire_count];

        for (wire, key) in garbler_keys {
            set_wire(&mut active, *wire, key.clone())?;
        }
        for (&wire, key) in circuit.evaluator_inputs.iter().zip(evaluator_keys) {
            set_wire(&mut active, wire, key.clone())?;
        }

        let expected_inputs = [ZERO_WIRE, ONE_WIRE]
            .iter()
            .chain(&circuit.garbler_inputs)
            .chain(&circuit.evaluator_inputs);
        for &wire in expected_inputs {
            if active.get(wire).map_or(true, Option::is_none) {
                return Err(integrity(&format!("missing key for input wire {}", wire)));
            }
        }

        for (index, garbled) in circuit.gates.iter().enumerate() {
            deadline.check()?;

            let gate = &garbled.gate;
            let (Some(left), Some(right)) =
                (wire_key(&active, gate.left), wire_key(&active, gate.right))
            else {
                return Err(integrity(&format!("gate {} reads an unset wire", index)));
            };

            let cipher = row_cipher(index, left, right)?;
            let nonce = row_nonce(index);
            let aad = gate_header(gate);

            let mut opened: Option<WireKey> = None;
            let mut successes = 0usize;
            for row in &garbled.rows {
                if let Ok(plaintext) = cipher.decrypt(
                    &nonce,
                    Payload {
                        msg: row.as_slice(),
                        aad: &aad,
                    },
                ) {
                    successes += 1;
                    let plaintext = zeroize::Zeroizing::new(plaintext);
                    let bytes: [u8; veil_core::WIRE_KEY_LEN] = plaintext
                        .as_slice()
                        .try_into()
                        .map_err(|_| integrity("row plaintext has wrong length"))?;
                    opened = Some(WireKey::from_bytes(bytes));
                }
            }

            let output = match (successes, opened) {
                (1, Some(key)) => key,
                (n, _) => {
                    return Err(integrity(&format!(
                        "gate {} opened {} rows, expected exactly one",
                        index, n
                    )))
                }
            };

            match active.get_mut(gate.output) {
                Some(slot @ None) => *slot = Some(output),
                _ => {
                    return Err(integrity(&format!(
                        "gate {} writes an invalid or already-set wire",
                        index
                    )))
                }
            }
        }

        let mut outputs = Vec::with_capacity(circuit.decoding.len());
        for decoding in &circuit.decoding {
            let key = wire_key(&active, decoding.wire)
                .ok_or_else(|| integrity("output wire was never set"))?;
            let tag = output_tag(decoding.wire, key);

            let is_zero = veil_core::compare(&tag, &decoding.zero_tag);
            let is_one = veil_core::compare(&tag, &decoding.one_tag);
            match (is_zero, is_one) {
                (true, false) => outputs.push(false),
                (false, true) => outputs.push(true),
                _ => return Err(integrity("output key does not decode")),
            }
        }

        debug!(
            "Evaluated circuit {} ({} gates)",
            circuit.name,
            circuit.gates.len()
        );

        Ok(outputs)
    }
}

fn integrity(msg: &str) -> ProtocolError {
    ProtocolError::Integrity(msg.to_string())
}

fn set_wire(active: &mut [Option<WireKey>], wire: WireId, key: WireKey) -> Result<()> {
    match active.get_mut(wire) {
        Some(slot @ None) => {
            *slot = Some(key);
            Ok(())
        }
        Some(Some(_)) => Err(integrity(&format!("duplicate key for wire {}", wire))),
        None => Err(integrity(&format!("wire {} out of range", wire))),
    }
}

fn wire_key(active: &[Option<WireKey>], wire: WireId) -> Option<&WireKey> {
    active.get(wire).and_then(Option::as_ref)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{amount_bits, Circuit};
    use crate::garble::{GarbledOutput, Garbler};
    use crate::ot::{IdealTransfer, ObliviousTransfer};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    struct Run {
        garbled: GarbledOutput,
        evaluator_keys: Vec<WireKey>,
    }

    fn setup(x: u64, y: u64, seed: u64) -> Run {
        let circuit = Circuit::greater_than(16).unwrap();
        let garbled = Garbler::new(ChaCha20Rng::seed_from_u64(seed))
            .garble(&circuit, &amount_bits(y, 16), &Deadline::unbounded())
            .unwrap();
        let evaluator_keys = IdealTransfer
            .transfer(garbled.session.evaluator_offers(), &amount_bits(x, 16))
            .unwrap();
        Run {
            garbled,
            evaluator_keys,
        }
    }

    fn evaluate(run: Run, circuit: GarbledCircuit) -> Result<Vec<bool>> {
        Evaluator::new(run.garbled.commitment).evaluate(
            circuit,
            run.garbled.session.garbler_keys(),
            &run.evaluator_keys,
            &Deadline::unbounded(),
        )
    }

    #[test]
    fn test_honest_evaluation() {
        let run = setup(500, 499, 1);
        let circuit = run.garbled.circuit.clone();
        assert_eq!(evaluate(run, circuit).unwrap(), vec![true]);

        let run = setup(499, 499, 2);
        let circuit = run.garbled.circuit.clone();
        assert_eq!(evaluate(run, circuit).unwrap(), vec![false]);
    }

    #[test]
    fn test_flipped_row_bit_is_integrity_error() {
        let run = setup(7, 3, 3);
        let mut circuit = run.garbled.circuit.clone();
        circuit.gates[0].rows[0][0] ^= 0x01;
        assert!(matches!(
            evaluate(run, circuit),
            Err(ProtocolError::Integrity(_))
        ));
    }

    #[test]
    fn test_tampered_rows_with_forged_commitment() {
        // Even when the commitment is recomputed over the tampered material,
        // no row of the corrupted gate opens
        let run = setup(7, 3, 4);
        let mut circuit = run.garbled.circuit.clone();
        for row in circuit.gates[2].rows.iter_mut() {
            row[0] ^= 0x80;
        }
        let forged = circuit.digest();
        let result = Evaluator::new(forged).evaluate(
            circuit,
            run.garbled.session.garbler_keys(),
            &run.evaluator_keys,
            &Deadline::unbounded(),
        );
        assert!(matches!(result, Err(ProtocolError::Integrity(_))));
    }

    #[test]
    fn test_swapped_decoding_tags_detected_by_commitment() {
        let run = setup(7, 3, 5);
        let mut circuit = run.garbled.circuit.clone();
        let d = &mut circuit.decoding[0];
        std::mem::swap(&mut d.zero_tag, &mut d.one_tag);
        assert!(matches!(
            evaluate(run, circuit),
            Err(ProtocolError::Integrity(_))
        ));
    }

    #[test]
    fn test_wrong_key_count_rejected() {
        let mut run = setup(7, 3, 6);
        run.evaluator_keys.pop();
        let circuit = run.garbled.circuit.clone();
        assert!(matches!(
            evaluate(run, circuit),
            Err(ProtocolError::Integrity(_))
        ));
    }

    #[test]
    fn test_foreign_key_fails_to_open() {
        let mut run = setup(7, 3, 7);
        run.evaluator_keys[0] = WireKey::from_bytes([0x42; veil_core::WIRE_KEY_LEN]);
        let circuit = run.garbled.circuit.clone();
        assert!(matches!(
            evaluate(run, circuit),
            Err(ProtocolError::Integrity(_))
        ));
    }

    #[test]
    fn test_expired_deadline() {
        let run = setup(7, 3, 8);
        let result = Evaluator::new(run.garbled.commitment).evaluate(
            run.garbled.circuit.clone(),
            run.garbled.session.garbler_keys(),
            &run.evaluator_keys,
            &Deadline::after(std::time::Duration::ZERO),
        );
        assert!(matches!(result, Err(ProtocolError::Timeout { .. })));
    }
}
