//! Sable Language Engine
//!
//! This crate implements the core of the Sable engine:
//! - **AST**: arena-backed node store built by the (external) parser or an
//!   embedder (`ast` module)
//! - **Compiler**: per-node code generation into a structured instruction
//!   tree, including goto/label resolution (`compiler` module)
//! - **VM**: value/reference layer, scope/call-stack/namespace runtime, and
//!   the instruction evaluator (`vm` module)
//! - **Runtime**: per-run state and the program orchestrator, including the
//!   suspend/recompile/replay protocol for asynchronous host operations
//!   (`runtime` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use sable_engine::ast::AstBuilder;
//! use sable_engine::runtime::Engine;
//!
//! let mut b = AstBuilder::new();
//! let value = b.int(42);
//! let ret = b.return_stmt(Some(value));
//! let ast = b.program(vec![ret]);
//!
//! let mut engine = Engine::default();
//! let (result, tag) = engine.run(&ast)?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod ast;
pub mod compiler;
pub mod error;
pub mod runtime;
pub mod vm;

pub use error::{EngineError, FatalError};
pub use runtime::{Engine, EngineOptions};
pub use sable_sdk::{
    deferment, BridgeValue, BufferSink, Deferment, DefermentHandle, HostFault, HostObject,
    NativeKey, NativeValue, OutputSink, TypeTag,
};
