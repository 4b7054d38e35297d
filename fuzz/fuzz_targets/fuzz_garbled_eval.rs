#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use veil_gc::circuit::amount_bits;
use veil_gc::{
    Circuit, Deadline, Evaluator, Garbler, IdealTransfer, ObliviousTransfer, ProtocolError,
};

#[derive(Debug, Arbitrary)]
struct Input {
    seed: u64,
    threshold: u8,
    amount: u8,
    /// Byte to corrupt, as (gate, row, offset, xor mask)
    flip: Option<(u16, u8, u16, u8)>,
}

fuzz_target!(|input: Input| {
    let circuit = Circuit::greater_than(8).unwrap();
    let deadline = Deadline::unbounded();

    let garbler_bits = amount_bits(u64::from(input.threshold), 8);
    let evaluator_bits = amount_bits(u64::from(input.amount), 8);

    let mut output = Garbler::new(ChaCha20Rng::seed_from_u64(input.seed))
        .garble(&circuit, &garbler_bits, &deadline)
        .unwrap();

    let mut tampered = false;
    if let Some((gate, row, offset, mask)) = input.flip {
        if mask != 0 && !output.circuit.gates.is_empty() {
            let gate_count = output.circuit.gates.len();
            let gate = &mut output.circuit.gates[gate as usize % gate_count];
            let row_count = gate.rows.len();
            let row = &mut gate.rows[row as usize % row_count];
            if !row.is_empty() {
                let offset = offset as usize % row.len();
                row[offset] ^= mask;
                tampered = true;
            }
        }
    }

    let evaluator_keys = IdealTransfer
        .transfer(output.session.evaluator_offers(), &evaluator_bits)
        .unwrap();
    let result = Evaluator::new(output.commitment).evaluate(
        output.circuit,
        output.session.garbler_keys(),
        &evaluator_keys,
        &deadline,
    );

    if tampered {
        // Any corruption is caught; no result bit escapes
        assert!(matches!(result, Err(ProtocolError::Integrity(_))));
    } else {
        assert_eq!(result.unwrap(), vec![input.amount > input.threshold]);
    }
});
