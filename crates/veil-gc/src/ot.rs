//! Oblivious-transfer seam
//!
//! Input-key delivery for the evaluator's private bits is an external
//! primitive. [`IdealTransfer`] is the in-process ideal functionality: it
//! hands the receiver exactly the chosen key of each pair, nothing else.
//! Deployments plug a networked OT implementation in behind the same trait.

use crate::error::{ProtocolError, Result};
use crate::wire::{WireKey, WireKeyPair};

/// 1-out-of-2 oblivious transfer of wire keys
pub trait ObliviousTransfer: Send + Sync {
    /// Deliver `offers[i].key(choices[i])` to the receiver for every `i`.
    ///
    /// Failures surface as [`ProtocolError::Connection`].
    fn transfer(&self, offers: &[WireKeyPair], choices: &[bool]) -> Result<Vec<WireKey>>;
}

/// Ideal OT functionality for single-process deployments and tests
#[derive(Debug, Default, Clone, Copy)]
pub struct IdealTransfer;

impl ObliviousTransfer for IdealTransfer {
    fn transfer(&self, offers: &[WireKeyPair], choices: &[bool]) -> Result<Vec<WireKey>> {
        if offers.len() != choices.len() {
            return Err(ProtocolError::Connection(format!(
                "transfer shape mismatch: {} offers, {} choices",
                offers.len(),
                choices.len()
            )));
        }

        Ok(offers
            .iter()
            .zip(choices)
            .map(|(pair, &choice)| pair.key(choice).clone())
            .collect())
    }
}
