//! Veil GC - Garbled-circuit secure membership protocol
//!
//! A garbler holding the watchlist (or threshold) and an evaluator holding
//! the candidate (or amount) jointly evaluate a boolean circuit. The
//! evaluator learns one bit: `match_flag` or `exceeds_threshold`. Input keys
//! for the evaluator's bits arrive through an [`ObliviousTransfer`]
//! implementation.
//!
//! # Run structure
//!
//! 1. [`Garbler`] draws two fresh [`WireKey`]s per wire, encrypts four rows
//!    per gate and commits to the material.
//! 2. The evaluator's input keys are delivered through OT.
//! 3. [`Evaluator`] verifies the commitment, opens one row per gate and
//!    decodes the output wire.
//!
//! Garbled material is consumed by evaluation and never reused.

pub mod circuit;
pub mod deadline;
pub mod error;
pub mod evaluate;
pub mod garble;
pub mod ot;
pub mod protocol;
pub mod wire;

pub use circuit::{Circuit, Gate, GateKind, ONE_WIRE, ZERO_WIRE};
pub use deadline::Deadline;
pub use error::{ProtocolError, Result};
pub use evaluate::Evaluator;
pub use garble::{
    GarbledCircuit, GarbledGate, GarbledOutput, Garbler, GarblerSession, OutputDecoding,
};
pub use ot::{IdealTransfer, ObliviousTransfer};
pub use protocol::{ScreeningEngine, YaoProtocol, PROTOCOL_NAME};
pub use wire::{WireId, WireKey, WireKeyPair};
