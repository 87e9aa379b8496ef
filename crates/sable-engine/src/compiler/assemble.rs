//! Block assembler: goto/label resolution for one sibling sequence.
//!
//! The source language allows `goto label;` anywhere the label is visible
//! inside the same function, while the executable form only offers
//! structured exits. The assembler consumes one compiled sibling statement
//! sequence together with the label facts discovered while compiling each
//! statement, and synthesizes the structured wrapping. Every wrap covers a
//! prefix of the sequence, so any two wraps nest:
//!
//! - a label at statement `j` referenced by a goto at `i < j` wraps
//!   statements `0..j` in a [`Instr::LabeledBlock`]; the goto exits the
//!   block and lands exactly at statement `j`;
//! - a label at `j` referenced by a goto at `i > j` wraps `0..=i` in a
//!   [`Instr::LabeledLoop`]; the goto re-enters the loop from the top,
//!   where the label's guard skips everything before statement `j`;
//! - statements before a label-defining statement are guarded by
//!   [`Instr::SkipWhenJumping`] so neither a jump into a construct nested
//!   in that statement nor a loop re-entry re-runs them.
//!
//! Gotos whose labels belong to an enclosing sequence stay pending in the
//! unit's label repository and are resolved by the parent invocation.
//! Resuming a suspended run reuses the same machinery: an implicit goto to
//! the reserved resume label is inserted ahead of the first
//! non-declaration statement whenever the label was discovered inside this
//! sequence.

use rustc_hash::FxHashSet;

use crate::compiler::code::{Instr, Sequence};

/// Per-statement compilation facts the assembler consumes.
#[derive(Debug, Default)]
pub struct StatementFacts {
    /// The statement's compiled instructions.
    pub instrs: Vec<Instr>,
    /// Labels referenced by gotos surfaced while compiling the statement.
    pub gotos: Vec<String>,
    /// Labels defined while compiling the statement (possibly nested).
    pub labels: Vec<String>,
    /// Function declarations are skipped when placing the resume goto.
    pub is_declaration: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum WrapKind {
    Block(String),
    Guard(String),
    Loop(String),
}

/// A prefix wrap over statements `0..end`.
#[derive(Debug, Clone)]
struct Wrap {
    kind: WrapKind,
    /// One past the last statement covered.
    end: usize,
}

impl WrapKind {
    // Lower sorts outer when ends tie.
    fn priority(&self) -> u8 {
        match self {
            WrapKind::Block(_) => 0,
            WrapKind::Guard(_) => 1,
            WrapKind::Loop(_) => 2,
        }
    }
}

/// Assemble one sibling sequence, resolving its internal gotos.
///
/// `resume_label` carries the reserved label during a resume pass; the
/// implicit goto is inserted only when some statement in this sequence
/// discovered the label.
pub fn assemble(mut facts: Vec<StatementFacts>, resume_label: Option<&str>) -> Sequence {
    if let Some(label) = resume_label {
        let found_here = facts.iter().any(|f| f.labels.iter().any(|l| l == label));
        if found_here {
            let insert_at = facts
                .iter()
                .position(|f| !f.is_declaration)
                .unwrap_or(facts.len());
            facts.insert(
                insert_at,
                StatementFacts {
                    instrs: vec![Instr::Goto {
                        label: label.to_owned(),
                    }],
                    gotos: vec![label.to_owned()],
                    labels: Vec::new(),
                    is_declaration: false,
                },
            );
        }
    }

    let mut wraps = Vec::new();

    // Guards: every statement before a label-defining statement is skipped
    // while a jump to that label is in flight.
    for (index, fact) in facts.iter().enumerate() {
        if index == 0 {
            continue;
        }
        for label in &fact.labels {
            wraps.push(Wrap {
                kind: WrapKind::Guard(label.clone()),
                end: index,
            });
        }
    }

    // Jump wrapping. Gotos to the same label share one wrap per direction.
    let mut wrapped: FxHashSet<(String, bool)> = FxHashSet::default();
    for (index, fact) in facts.iter().enumerate() {
        for label in &fact.gotos {
            if fact.labels.iter().any(|l| l == label) {
                // Resolved inside the statement's own nested scope.
                continue;
            }
            let target = facts
                .iter()
                .enumerate()
                .find(|(other, f)| *other != index && f.labels.iter().any(|l| l == label));
            let Some((target_index, _)) = target else {
                // Label lives in an enclosing sequence; stays pending.
                continue;
            };
            if target_index > index {
                // Forward jump: block ending where the label's statement
                // begins, so exiting the block lands on it.
                if wrapped.insert((label.clone(), true)) {
                    wraps.push(Wrap {
                        kind: WrapKind::Block(label.clone()),
                        end: target_index,
                    });
                }
            } else if wrapped.insert((label.clone(), false)) {
                // Backward jump: loop through the last goto's statement.
                let latest = latest_goto(&facts, label, target_index);
                wraps.push(Wrap {
                    kind: WrapKind::Loop(label.clone()),
                    end: latest + 1,
                });
            }
        }
    }

    // Prefix wraps totally order by end; priority breaks ties outermost
    // first, so the list reads outer to inner.
    wraps.sort_by(|a, b| {
        b.end
            .cmp(&a.end)
            .then(a.kind.priority().cmp(&b.kind.priority()))
    });

    let statements: Vec<Vec<Instr>> = facts.into_iter().map(|f| f.instrs).collect();
    let end = statements.len();
    emit(&statements, end, wraps)
}

fn latest_goto(facts: &[StatementFacts], label: &str, after: usize) -> usize {
    facts
        .iter()
        .enumerate()
        .skip(after + 1)
        .filter(|(_, f)| {
            f.gotos.iter().any(|l| l == label) && !f.labels.iter().any(|l| l == label)
        })
        .map(|(index, _)| index)
        .next_back()
        .unwrap_or(after)
}

/// Emit statements `0..end`, installing `wraps` (outer to inner, each a
/// prefix of the one before) around the front of the sequence.
fn emit(statements: &[Vec<Instr>], end: usize, mut wraps: Vec<Wrap>) -> Sequence {
    let mut out = Vec::new();
    let mut tail_from = 0;

    if !wraps.is_empty() {
        let outer = wraps.remove(0);
        tail_from = outer.end;
        let body = emit(statements, outer.end, wraps);
        out.push(match outer.kind {
            WrapKind::Block(label) => Instr::LabeledBlock { label, body },
            WrapKind::Guard(label) => Instr::SkipWhenJumping { label, body },
            WrapKind::Loop(label) => Instr::LabeledLoop { label, body },
        });
    }

    for statement in &statements[tail_from..end] {
        out.extend(statement.iter().cloned());
    }
    out
}
