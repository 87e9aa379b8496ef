//! Deferred-result settlement.
//!
//! A bridged host method that cannot answer synchronously returns a
//! [`DefermentHandle`]; the engine suspends the running program and later
//! blocks on the handle until the host settles the paired [`Deferment`].
//! Settlement may happen from any thread.

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

use crate::{HostFault, NativeValue};

/// The host-side half: settle exactly once with a value or a fault.
#[derive(Debug)]
pub struct Deferment {
    tx: Sender<Settlement>,
}

/// The engine-side half: awaits settlement.
#[derive(Debug)]
pub struct DefermentHandle {
    rx: Receiver<Settlement>,
}

/// The settled outcome of a deferred operation.
pub type Settlement = Result<NativeValue, HostFault>;

/// Create a linked deferment pair.
pub fn deferment() -> (Deferment, DefermentHandle) {
    let (tx, rx) = bounded(1);
    (Deferment { tx }, DefermentHandle { rx })
}

impl Deferment {
    /// Settle with a value.
    pub fn resolve(self, value: impl Into<NativeValue>) {
        let _ = self.tx.send(Ok(value.into()));
    }

    /// Settle with a fault.
    pub fn reject(self, fault: HostFault) {
        let _ = self.tx.send(Err(fault));
    }
}

impl DefermentHandle {
    /// Block until settlement, up to `timeout`.
    ///
    /// Returns `None` on timeout or if the host dropped its half without
    /// settling.
    pub fn await_settlement(&self, timeout: Duration) -> Option<Settlement> {
        match self.rx.recv_timeout(timeout) {
            Ok(settlement) => Some(settlement),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}
