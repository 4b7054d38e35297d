//! Boolean circuits for screening
//!
//! Wire layout is fixed: wire 0 is the constant false, wire 1 the constant
//! true, then garbler inputs, then evaluator inputs, then one wire per gate
//! output in gate order. Gates only read wires created before them, so gate
//! order is a topological order.

use serde::{Deserialize, Serialize};

use veil_core::{BlindIndex, WatchlistEntry};

use crate::error::{ProtocolError, Result};
use crate::wire::WireId;

/// Wire carrying the constant false
pub const ZERO_WIRE: WireId = 0;

/// Wire carrying the constant true
pub const ONE_WIRE: WireId = 1;

/// Supported gate types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateKind {
    And,
    Xor,
    Or,
}

impl GateKind {
    pub fn apply(self, a: bool, b: bool) -> bool {
        match self {
            GateKind::And => a & b,
            GateKind::Xor => a ^ b,
            GateKind::Or => a | b,
        }
    }

    pub(crate) fn tag(self) -> u8 {
        match self {
            GateKind::And => 0,
            GateKind::Xor => 1,
            GateKind::Or => 2,
        }
    }
}

/// A two-input gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gate {
    pub kind: GateKind,
    pub left: WireId,
    pub right: WireId,
    pub output: WireId,
}

/// Plain (ungarbled) circuit topology
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Circuit {
    name: String,
    wire_count: usize,
    garbler_inputs: Vec<WireId>,
    evaluator_inputs: Vec<WireId>,
    gates: Vec<Gate>,
    outputs: Vec<WireId>,
}

/// Incremental circuit construction
struct Builder {
    wire_count: usize,
    gates: Vec<Gate>,
}

impl Builder {
    fn new() -> Self {
        Self {
            wire_count: 2,
            gates: Vec::new(),
        }
    }

    fn inputs(&mut self, count: usize) -> Vec<WireId> {
        let start = self.wire_count;
        self.wire_count += count;
        (start..self.wire_count).collect()
    }

    fn gate(&mut self, kind: GateKind, left: WireId, right: WireId) -> WireId {
        let output = self.wire_count;
        self.wire_count += 1;
        self.gates.push(Gate {
            kind,
            left,
            right,
            output,
        });
        output
    }

    /// Left fold of `wires` under `kind`; `empty` if there are none
    fn fold(&mut self, kind: GateKind, wires: &[WireId], empty: WireId) -> WireId {
        let Some((&first, rest)) = wires.split_first() else {
            return empty;
        };
        rest.iter().fold(first, |acc, &w| self.gate(kind, acc, w))
    }
}

impl Circuit {
    /// Watchlist membership over the first `ident_bits` bits of each blind index.
    ///
    /// Evaluator input: the candidate's bits. Garbler input: `entries`
    /// consecutive groups of `ident_bits` bits. Output: true iff the candidate
    /// equals some entry.
    pub fn membership(ident_bits: usize, entries: usize) -> Result<Self> {
        if ident_bits == 0 || ident_bits > 256 {
            return Err(ProtocolError::InvalidCircuit(format!(
                "identifier width must be 1..=256 bits, got {}",
                ident_bits
            )));
        }

        let mut b = Builder::new();
        let garbler_inputs = b.inputs(ident_bits * entries);
        let evaluator_inputs = b.inputs(ident_bits);

        let mut entry_differs = Vec::with_capacity(entries);
        for entry in garbler_inputs.chunks(ident_bits) {
            let diffs: Vec<WireId> = entry
                .iter()
                .zip(&evaluator_inputs)
                .map(|(&w, &x)| b.gate(GateKind::Xor, w, x))
                .collect();
            let differs = b.fold(GateKind::Or, &diffs, ZERO_WIRE);
            entry_differs.push(differs);
        }

        // An empty watchlist never matches
        let output = if entry_differs.is_empty() {
            ZERO_WIRE
        } else {
            let differs_from_all = b.fold(GateKind::And, &entry_differs, ONE_WIRE);
            b.gate(GateKind::Xor, differs_from_all, ONE_WIRE)
        };

        Ok(Self {
            name: "watchlist_membership_check".to_string(),
            wire_count: b.wire_count,
            garbler_inputs,
            evaluator_inputs,
            gates: b.gates,
            outputs: vec![output],
        })
    }

    /// Unsigned `x > y` over `bits`-bit values, least significant bit first.
    ///
    /// Evaluator input: `x`. Garbler input: `y`. Uses the carry recurrence
    /// `c' = x ^ ((x ^ c) & (y ^ c))` starting from `c = 0`.
    pub fn greater_than(bits: usize) -> Result<Self> {
        if bits == 0 || bits > 64 {
            return Err(ProtocolError::InvalidCircuit(format!(
                "comparison width must be 1..=64 bits, got {}",
                bits
            )));
        }

        let mut b = Builder::new();
        let garbler_inputs = b.inputs(bits);
        let evaluator_inputs = b.inputs(bits);

        let mut carry = ZERO_WIRE;
        for (&x, &y) in evaluator_inputs.iter().zip(&garbler_inputs) {
            let xc = b.gate(GateKind::Xor, x, carry);
            let yc = b.gate(GateKind::Xor, y, carry);
            let both = b.gate(GateKind::And, xc, yc);
            carry = b.gate(GateKind::Xor, x, both);
        }

        Ok(Self {
            name: "threshold_compare".to_string(),
            wire_count: b.wire_count,
            garbler_inputs,
            evaluator_inputs,
            gates: b.gates,
            outputs: vec![carry],
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn wire_count(&self) -> usize {
        self.wire_count
    }

    pub fn garbler_inputs(&self) -> &[WireId] {
        &self.garbler_inputs
    }

    pub fn evaluator_inputs(&self) -> &[WireId] {
        &self.evaluator_inputs
    }

    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }

    pub fn outputs(&self) -> &[WireId] {
        &self.outputs
    }

    /// Evaluate in the clear. Reference semantics for the garbled evaluation.
    pub fn eval_plain(&self, garbler_bits: &[bool], evaluator_bits: &[bool]) -> Result<Vec<bool>> {
        self.check_input_lengths(garbler_bits, evaluator_bits)?;

        let mut values = vec![false; self.wire_count];
        values[ONE_WIRE] = true;
        for (&w, &bit) in self.garbler_inputs.iter().zip(garbler_bits) {
            values[w] = bit;
        }
        for (&w, &bit) in self.evaluator_inputs.iter().zip(evaluator_bits) {
            values[w] = bit;
        }
        for gate in &self.gates {
            values[gate.output] = gate.kind.apply(values[gate.left], values[gate.right]);
        }

        Ok(self.outputs.iter().map(|&w| values[w]).collect())
    }

    pub(crate) fn check_input_lengths(
        &self,
        garbler_bits: &[bool],
        evaluator_bits: &[bool],
    ) -> Result<()> {
        if garbler_bits.len() != self.garbler_inputs.len() {
            return Err(ProtocolError::InvalidCircuit(format!(
                "expected {} garbler input bits, got {}",
                self.garbler_inputs.len(),
                garbler_bits.len()
            )));
        }
        if evaluator_bits.len() != self.evaluator_inputs.len() {
            return Err(ProtocolError::InvalidCircuit(format!(
                "expected {} evaluator input bits, got {}",
                self.evaluator_inputs.len(),
                evaluator_bits.len()
            )));
        }
        Ok(())
    }
}

/// Garbler-side input bits for a membership circuit
pub fn watchlist_bits(entries: &[WatchlistEntry], ident_bits: usize) -> Vec<bool> {
    entries
        .iter()
        .flat_map(|e| e.name_hash.bits(ident_bits))
        .collect()
}

/// Evaluator-side input bits for a membership circuit
pub fn candidate_bits(candidate: &BlindIndex, ident_bits: usize) -> Vec<bool> {
    candidate.bits(ident_bits)
}

/// `value` as `bits` booleans, least significant first
pub fn amount_bits(value: u64, bits: usize) -> Vec<bool> {
    (0..bits).map(|i| (value >> i) & 1 == 1).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str) -> WatchlistEntry {
        WatchlistEntry::new(name, BlindIndex::create(name, b"salt"))
    }

    #[test]
    fn test_membership_plain() {
        let list = vec![entry("alpha"), entry("bravo"), entry("charlie")];
        let circuit = Circuit::membership(128, list.len()).unwrap();
        let w = watchlist_bits(&list, 128);

        let hit = BlindIndex::create("bravo", b"salt");
        let miss = BlindIndex::create("delta", b"salt");

        assert_eq!(
            circuit.eval_plain(&w, &candidate_bits(&hit, 128)).unwrap(),
            vec![true]
        );
        assert_eq!(
            circuit.eval_plain(&w, &candidate_bits(&miss, 128)).unwrap(),
            vec![false]
        );
    }

    #[test]
    fn test_membership_empty_watchlist() {
        let circuit = Circuit::membership(128, 0).unwrap();
        assert!(circuit.gates().is_empty());
        assert_eq!(circuit.outputs(), &[ZERO_WIRE]);
        let x = candidate_bits(&BlindIndex::create("anyone", b"salt"), 128);
        assert_eq!(circuit.eval_plain(&[], &x).unwrap(), vec![false]);
    }

    #[test]
    fn test_greater_than_plain() {
        let circuit = Circuit::greater_than(16).unwrap();
        let cases = [
            (10_001u64, 10_000u64, true),
            (10_000, 10_000, false),
            (9_999, 10_000, false),
            (0, 0, false),
            (65_535, 0, true),
        ];
        for (x, y, expected) in cases {
            let out = circuit
                .eval_plain(&amount_bits(y, 16), &amount_bits(x, 16))
                .unwrap();
            assert_eq!(out, vec![expected], "{} > {}", x, y);
        }
    }

    #[test]
    fn test_gate_order_is_topological() {
        let circuit = Circuit::membership(8, 3).unwrap();
        for gate in circuit.gates() {
            assert!(gate.left < gate.output);
            assert!(gate.right < gate.output);
        }
    }

    #[test]
    fn test_input_length_mismatch_rejected() {
        let circuit = Circuit::greater_than(8).unwrap();
        assert!(circuit.eval_plain(&[true; 7], &[true; 8]).is_err());
        assert!(circuit.eval_plain(&[true; 8], &[true; 9]).is_err());
    }

    #[test]
    fn test_invalid_widths() {
        assert!(Circuit::membership(0, 3).is_err());
        assert!(Circuit::greater_than(65).is_err());
    }
}
