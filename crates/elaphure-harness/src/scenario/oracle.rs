//! Reusable oracles.

use elaphure_core::session::CONNECT_SUCCEEDED;

use crate::scenario::{OracleFn, Outcome};

/// Session reached relaying and announced it exactly once.
pub fn connected() -> OracleFn {
    Box::new(|outcome: &Outcome| {
        if outcome.connects() == [CONNECT_SUCCEEDED] {
            Ok(())
        } else {
            Err(format!("expected one connect notification, got {:?}", outcome.events))
        }
    })
}

/// Exactly one disconnect notification, containing `needle`.
pub fn disconnected_with(needle: &'static str) -> OracleFn {
    Box::new(move |outcome: &Outcome| match outcome.disconnects().as_slice() {
        [message] if message.contains(needle) => Ok(()),
        other => Err(format!("expected one disconnect mentioning {needle:?}, got {other:?}")),
    })
}

/// No disconnect notification at all.
pub fn no_disconnect() -> OracleFn {
    Box::new(|outcome: &Outcome| {
        if outcome.disconnects().is_empty() {
            Ok(())
        } else {
            Err(format!("unexpected disconnect: {:?}", outcome.disconnects()))
        }
    })
}

/// The probe saw each batch as its own burst, so no two were ever in flight.
pub fn one_batch_in_flight(batches: Vec<Vec<u8>>) -> OracleFn {
    Box::new(move |outcome: &Outcome| {
        let seen = &outcome.probe.batches;
        if seen.len() <= batches.len() && seen.iter().zip(&batches).all(|(a, b)| a == b) {
            Ok(())
        } else {
            Err(format!("probe saw {seen:?}, producer sent {batches:?}"))
        }
    })
}

/// Every oracle must pass.
pub fn all_of(oracles: Vec<OracleFn>) -> OracleFn {
    Box::new(move |outcome: &Outcome| {
        for oracle in oracles {
            oracle(outcome)?;
        }
        Ok(())
    })
}
