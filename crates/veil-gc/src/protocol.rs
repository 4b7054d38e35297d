//! Two-party screening runs
//!
//! [`ScreeningEngine`] is the seam the service layer calls through, so a
//! vetted garbled-circuit library can replace [`YaoProtocol`] without
//! touching call sites.

use std::time::Duration;

use tracing::debug;

use veil_core::{BlindIndex, WatchlistEntry, AMOUNT_BITS, IDENT_BITS};

use crate::circuit::{amount_bits, candidate_bits, watchlist_bits, Circuit};
use crate::deadline::Deadline;
use crate::error::{ProtocolError, Result};
use crate::evaluate::Evaluator;
use crate::garble::{GarbledOutput, Garbler};
use crate::ot::{IdealTransfer, ObliviousTransfer};

/// Protocol label recorded with every screening result
pub const PROTOCOL_NAME: &str = "Yao-GC";

/// Private screening operations. Each call is one atomic protocol run that
/// reveals only its boolean result.
pub trait ScreeningEngine: Send + Sync {
    fn protocol_name(&self) -> &'static str;

    /// Whether `candidate` appears in `watchlist`
    fn check_membership(
        &self,
        candidate: &BlindIndex,
        watchlist: &[WatchlistEntry],
    ) -> Result<bool>;

    /// Whether `amount > threshold`
    fn exceeds_threshold(&self, amount: u64, threshold: u64) -> Result<bool>;
}

/// Yao garbled-circuit protocol with both roles run in-process
pub struct YaoProtocol<T = IdealTransfer> {
    transfer: T,
    timeout: Duration,
}

impl YaoProtocol<IdealTransfer> {
    /// Protocol over the ideal OT functionality
    pub fn ideal(timeout: Duration) -> Self {
        Self::new(IdealTransfer, timeout)
    }
}

impl<T: ObliviousTransfer> YaoProtocol<T> {
    pub fn new(transfer: T, timeout: Duration) -> Self {
        Self { transfer, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// One full run of `circuit` with fresh wire keys
    pub fn run(
        &self,
        circuit: &Circuit,
        garbler_bits: &[bool],
        evaluator_bits: &[bool],
    ) -> Result<Vec<bool>> {
        let deadline = Deadline::after(self.timeout);
        circuit.check_input_lengths(garbler_bits, evaluator_bits)?;

        debug!(
            "Starting {} run of {} ({} gates)",
            PROTOCOL_NAME,
            circuit.name(),
            circuit.gates().len()
        );

        let GarbledOutput {
            circuit: garbled,
            commitment,
            session,
        } = Garbler::new(rand::thread_rng()).garble(circuit, garbler_bits, &deadline)?;

        deadline.check()?;
        let evaluator_keys = self
            .transfer
            .transfer(session.evaluator_offers(), evaluator_bits)?;
        deadline.check()?;

        Evaluator::new(commitment).evaluate(
            garbled,
            session.garbler_keys(),
            &evaluator_keys,
            &deadline,
        )
    }
}

impl<T: ObliviousTransfer> ScreeningEngine for YaoProtocol<T> {
    fn protocol_name(&self) -> &'static str {
        PROTOCOL_NAME
    }

    fn check_membership(
        &self,
        candidate: &BlindIndex,
        watchlist: &[WatchlistEntry],
    ) -> Result<bool> {
        let circuit = Circuit::membership(IDENT_BITS, watchlist.len())?;
        let outputs = self.run(
            &circuit,
            &watchlist_bits(watchlist, IDENT_BITS),
            &candidate_bits(candidate, IDENT_BITS),
        )?;
        single_output(outputs)
    }

    fn exceeds_threshold(&self, amount: u64, threshold: u64) -> Result<bool> {
        let circuit = Circuit::greater_than(AMOUNT_BITS)?;
        let outputs = self.run(
            &circuit,
            &amount_bits(threshold, AMOUNT_BITS),
            &amount_bits(amount, AMOUNT_BITS),
        )?;
        single_output(outputs)
    }
}

fn single_output(outputs: Vec<bool>) -> Result<bool> {
    match outputs.as_slice() {
        [bit] => Ok(*bit),
        other => Err(ProtocolError::Integrity(format!(
            "expected one output bit, got {}",
            other.len()
        ))),
    }
}
