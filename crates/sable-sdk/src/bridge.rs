//! Host object bridge.

use crate::{DefermentHandle, HostFault, NativeValue};

/// The result of one bridged method call.
pub enum BridgeValue {
    /// The call completed synchronously with this value.
    Ready(NativeValue),
    /// The call cannot complete yet; the engine suspends the running
    /// program and awaits settlement of the handle.
    Deferred(DefermentHandle),
}

impl From<NativeValue> for BridgeValue {
    fn from(value: NativeValue) -> Self {
        BridgeValue::Ready(value)
    }
}

/// An object exposed to running programs by the host.
///
/// Method calls against an exposed object are routed here with their
/// arguments coerced to native values. A method may answer synchronously,
/// raise a fault, or return [`BridgeValue::Deferred`] to settle later.
pub trait HostObject {
    /// Call `method` with positional `args`.
    fn call_method(&self, method: &str, args: Vec<NativeValue>) -> Result<BridgeValue, HostFault>;
}
