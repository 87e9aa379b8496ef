//! Run orchestration: per-pass state, the wall-clock budget, and the
//! suspend/recompile/replay driver.

mod engine;
mod state;
mod timer;

pub use engine::{Engine, EngineOptions};
pub use state::State;
pub use timer::Timer;
