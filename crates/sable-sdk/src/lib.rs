//! Sable SDK - Lightweight types for embedding the Sable engine
//!
//! This crate provides the host-facing boundary of the engine: the native
//! value representation results are reported in, the host object bridge,
//! deferred-result (pending settlement) handles, output sinks, and host
//! fault types. It deliberately has no dependency on the engine itself so
//! host integrations can be written and tested in isolation.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod bridge;
mod deferment;
mod error;
mod sink;
mod value;

pub use bridge::{BridgeValue, HostObject};
pub use deferment::{deferment, Deferment, DefermentHandle, Settlement};
pub use error::HostFault;
pub use sink::{BufferSink, OutputSink};
pub use value::{NativeKey, NativeValue, TypeTag};
