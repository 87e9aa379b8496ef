//! The program orchestrator.
//!
//! One `run` drives the whole suspend/recompile/replay cycle: compile the
//! program, execute it against fresh state, and — when a bridged call
//! defers — await settlement of its handle, attach resume data, and start
//! the next pass. The orchestrator is the only place an interrupt turns
//! into the run's terminal outcome.

use std::cell::RefCell;
use std::rc::Rc;

use sable_sdk::{HostObject, NativeValue, OutputSink, TypeTag};

use crate::ast::Ast;
use crate::compiler::{self, ResumeData, RESUME_LABEL};
use crate::error::{EngineError, FatalError};
use crate::runtime::state::State;
use crate::runtime::timer::Timer;
use crate::vm::exec::{Executor, Interrupt};
use crate::vm::value::Value;

/// Tunable engine settings.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Wall-clock budget for one program run, in seconds.
    pub max_execution_seconds: u64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            max_execution_seconds: 1,
        }
    }
}

/// The embedder-facing engine.
pub struct Engine {
    options: EngineOptions,
    stdout: Rc<RefCell<dyn OutputSink>>,
    stderr: Rc<RefCell<dyn OutputSink>>,
    exposed: Vec<(String, Rc<dyn HostObject>)>,
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new(EngineOptions::default())
    }
}

impl Engine {
    /// An engine with buffered output sinks.
    pub fn new(options: EngineOptions) -> Self {
        Engine {
            options,
            stdout: Rc::new(RefCell::new(sable_sdk::BufferSink::new())),
            stderr: Rc::new(RefCell::new(sable_sdk::BufferSink::new())),
            exposed: Vec::new(),
        }
    }

    /// Replace the program output sink.
    pub fn set_stdout(&mut self, sink: Rc<RefCell<dyn OutputSink>>) {
        self.stdout = sink;
    }

    /// Replace the diagnostic sink.
    pub fn set_stderr(&mut self, sink: Rc<RefCell<dyn OutputSink>>) {
        self.stderr = sink;
    }

    /// Adjust the wall-clock budget for subsequent runs.
    pub fn set_time_limit(&mut self, seconds: u64) {
        self.options.max_execution_seconds = seconds;
    }

    /// Bind a host object as the global variable `$name`.
    pub fn expose(&mut self, name: impl Into<String>, host: Rc<dyn HostObject>) {
        self.exposed.push((name.into(), host));
    }

    /// Run `ast` to completion, driving resume passes as needed, and
    /// produce the terminal value with its type tag.
    pub fn run(&self, ast: &Ast) -> Result<(NativeValue, TypeTag), EngineError> {
        let timer = Timer::start(self.options.max_execution_seconds);
        let mut resume: Option<ResumeData> = None;

        loop {
            let program = match compiler::compile(ast, resume.as_ref()) {
                Ok(program) => program,
                Err(fatal) => return Err(self.fail(fatal)),
            };

            let state = State::new(
                Rc::clone(&self.stdout),
                Rc::clone(&self.stderr),
                timer,
                &self.exposed,
                resume.as_ref().map(|r| Value::from_native(&r.value)),
            )
            .map_err(|fatal| self.fail(fatal))?;

            let mut executor = Executor::new(&state);
            match executor.run_program(&program) {
                Ok(value) => return Ok((value.to_native(), value.type_tag())),
                Err(Interrupt::Fatal(fatal)) => return Err(self.fail(fatal)),
                Err(Interrupt::Host(fault)) => return Err(EngineError::Host(fault)),
                Err(Interrupt::Suspend(suspension)) => {
                    match suspension.handle.await_settlement(timer.remaining()) {
                        Some(Ok(value)) => {
                            resume = Some(ResumeData {
                                label: RESUME_LABEL.to_owned(),
                                nodes: suspension.path,
                                value,
                            });
                        }
                        Some(Err(fault)) => return Err(EngineError::Host(fault)),
                        None => {
                            return Err(match timer.check() {
                                Err(fatal) => self.fail(fatal),
                                Ok(()) => EngineError::DefermentAbandoned,
                            })
                        }
                    }
                }
            }
        }
    }

    fn fail(&self, fatal: FatalError) -> EngineError {
        self.stderr
            .borrow_mut()
            .write(&format!("Fatal error: {fatal}\n"));
        EngineError::Fatal(fatal)
    }
}
